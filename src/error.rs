use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a translate / summarize / compare call.
///
/// Callers inside the pipeline never propagate this: the unit that failed keeps its previous
/// content and the run continues.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("backend failed: {0}")]
    Backend(String),
    #[error("empty response for {0}")]
    EmptyResponse(&'static str),
    #[error("capability unavailable: {0}")]
    Unavailable(String),
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

#[derive(Debug, Error)]
pub enum LtError {
    #[error("unsupported format: {extension} (supported: {})", .supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<String>,
    },
    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("malformed capability output: expected {expected} segments, got {got}")]
    MalformedOutput { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_lists_extensions() {
        let err = LtError::UnsupportedFormat {
            extension: ".txt".to_string(),
            supported: vec![".md".to_string(), ".rst".to_string()],
        };
        assert_eq!(err.to_string(), "unsupported format: .txt (supported: .md, .rst)");
    }
}
