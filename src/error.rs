//! Fatal error taxonomy. Every variant aborts the run before any output
//! is written and maps to exit status 2.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("cannot access input path {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid {option} {value:?}, must be one of: {expected}")]
    InvalidOption {
        option: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AnalyzerError {
    pub fn invalid_option(option: &'static str, value: &str, expected: &'static str) -> Self {
        AnalyzerError::InvalidOption {
            option,
            value: value.to_string(),
            expected,
        }
    }

    /// Whether the error comes from the input root rather than options.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Input { .. } | AnalyzerError::NotADirectory(_) | AnalyzerError::Walk(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_option_message() {
        let err = AnalyzerError::invalid_option("call graph algorithm", "bogus", "cha, rta");
        assert_eq!(
            err.to_string(),
            "invalid call graph algorithm \"bogus\", must be one of: cha, rta"
        );
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_input_error_classification() {
        let err = AnalyzerError::NotADirectory(PathBuf::from("main.go"));
        assert!(err.is_input_error());
        assert_eq!(err.to_string(), "input path main.go is not a directory");
    }
}
