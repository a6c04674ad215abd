use thiserror::Error;

/// Failures the query engine recovers from locally.
///
/// None of these abort a run. The degraded operations in
/// [`crate::projector`] turn them into an empty result, and the
/// extractor reports [`WorkbenchError::NotFound`] as "nothing to run".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkbenchError {
    #[error("nothing to run near line {0}")]
    NotFound(usize),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unexpected response shape: missing {0}")]
    ShapeMismatch(&'static str),
}
