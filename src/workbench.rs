//! The run/display pipeline of the workbench.
//!
//! A request comes either from an editor buffer at a cursor line or from a
//! template card. Templates are bound first and then extracted at
//! [`TEMPLATE_CURSOR_LINE`], which is where the body of a card starts.

use crate::error::WorkbenchError;
use crate::extractor::{extract_with, BraceCounting, RequestBlock};
use crate::globals::GlobalParams;
use crate::projector::{parse_field_list, project_with_fallback, ProjectedResult};
use crate::template::bind;

pub const TEMPLATE_CURSOR_LINE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSource {
    Buffer {
        text: String,
        cursor_line: usize,
    },
    Template {
        text: String,
        overrides: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Workbench {
    globals: GlobalParams,
    fields: Vec<String>,
    counting: BraceCounting,
}

impl Workbench {
    pub fn new(globals: GlobalParams, field_spec: &str) -> Self {
        Workbench {
            globals,
            fields: parse_field_list(field_spec),
            counting: BraceCounting::default(),
        }
    }

    pub fn with_counting(mut self, counting: BraceCounting) -> Self {
        self.counting = counting;
        self
    }

    pub fn globals(&self) -> &GlobalParams {
        &self.globals
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Binds the template text if needed and extracts the block to run.
    pub fn resolve(&self, source: &RequestSource) -> Result<RequestBlock, WorkbenchError> {
        let (text, cursor_line) = match source {
            RequestSource::Buffer { text, cursor_line } => (text.clone(), *cursor_line),
            RequestSource::Template { text, overrides } => {
                let overrides = overrides.iter().map(|(n, v)| (n.as_str(), v.as_str()));
                (bind(text, overrides, &self.globals), TEMPLATE_CURSOR_LINE)
            }
        };

        let block = extract_with(&text, cursor_line, self.counting)
            .ok_or(WorkbenchError::NotFound(cursor_line))?;
        tracing::debug!(
            "resolved {} {} at line {}",
            block.method(),
            block.target(),
            cursor_line
        );
        Ok(block)
    }

    /// Projects a raw response for display, falling back to the previously
    /// displayed text when the response has no hits.
    pub fn display(&self, response: &str, previous: Option<&str>) -> ProjectedResult {
        project_with_fallback(response, previous, &self.fields)
    }
}
