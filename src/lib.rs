//! # eslog - query templates and log projection for a search-backed log store
//!
//! The crate turns a free-form editor buffer or a request template into a
//! single search request, and reduces the search response to the handful of
//! fields worth looking at.
//!
//! ```text
//! template ──► template::bind ──┐
//!                               ├──► extractor::extract ──► RequestBlock ──► http::HttpClient
//! buffer + cursor line ─────────┘                                                 │
//!                                                                                 ▼
//!                        ProjectedResult ◄── projector::project ◄── raw response text
//! ```
//!
//! [`workbench::Workbench`] wires these steps together. The extractor, the
//! template binder and the projector are pure functions and can be used on
//! their own.

pub mod decoder;
pub mod error;
pub mod extractor;
pub mod globals;
pub mod http;
pub mod profile;
pub mod projector;
pub mod template;
pub mod utils;
pub mod workbench;

pub use error::WorkbenchError;
pub use extractor::{extract, RequestBlock};
pub use projector::{normalize, project, ProjectedResult};
pub use template::{parse, substitute, VariableMap};
pub use workbench::{RequestSource, Workbench};
