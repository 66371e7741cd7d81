//! Output rendering and writing.
//!
//! Two schemas share the same analysis result:
//! - Full: the `model` types serialized as they are, long field names.
//! - Compact: short keys and flattened entities, see `compact`.
//!
//! Rendering happens completely before anything is written, so a failed
//! run never leaves a partial document behind.

mod compact;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AnalyzerError;
use crate::model::AnalysisOutput;

pub use compact::{
    to_compact, CompactAnalysis, CompactCallGraph, CompactFunc, CompactIssue, CompactMeta,
    CompactPackage, CompactPosition, CompactType,
};

/// File name used when writing into an output directory.
pub const OUTPUT_FILE_NAME: &str = "analysis.json";

// =============================================================================
// Rendering
// =============================================================================

/// Render the document in the requested schema as pretty-printed JSON.
pub fn render(output: &AnalysisOutput, compact: bool) -> Result<String, AnalyzerError> {
    let json = if compact {
        serde_json::to_string_pretty(&to_compact(output))?
    } else {
        serde_json::to_string_pretty(output)?
    };
    Ok(json)
}

// =============================================================================
// Writing
// =============================================================================

/// Where the rendered document goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Destination {
    #[default]
    Stdout,
    /// `<dir>/analysis.json`, creating `dir` if needed.
    Directory(PathBuf),
}

impl Destination {
    pub fn from_output_dir(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Destination::Directory(dir.to_path_buf()),
            None => Destination::Stdout,
        }
    }
}

/// Write a rendered document. Returns the file path when one was written.
pub fn write(json: &str, destination: &Destination) -> Result<Option<PathBuf>, AnalyzerError> {
    match destination {
        Destination::Stdout => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            writeln!(lock, "{}", json)?;
            lock.flush()?;
            Ok(None)
        }
        Destination::Directory(dir) => {
            fs::create_dir_all(dir)?;
            let path = dir.join(OUTPUT_FILE_NAME);
            let mut content = String::with_capacity(json.len() + 1);
            content.push_str(json);
            content.push('\n');
            fs::write(&path, content)?;
            info!(path = %path.display(), bytes = json.len(), "wrote analysis");
            Ok(Some(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Issue, Metadata, PositionMode, Severity, SymbolTable};
    use tempfile::TempDir;

    pub(super) fn sample_output() -> AnalysisOutput {
        AnalysisOutput {
            metadata: Metadata {
                analyzer: "codeanalyzer-go".to_string(),
                version: "0.1.0".to_string(),
                language: "go".to_string(),
                analysis_level: "full".to_string(),
                timestamp: "2024-01-01T00:00:00Z".to_string(),
                project_path: "/tmp/project".to_string(),
                go_version: "1.21".to_string(),
                analysis_duration_ms: 12,
            },
            symbol_table: Some(SymbolTable::default()),
            call_graph: None,
            pdg: None,
            sdg: None,
            issues: vec![Issue {
                severity: Severity::Error,
                code: "PARSE_ERROR".to_string(),
                message: "syntax error".to_string(),
                position: PositionMode::Minimal.slot(crate::model::Position {
                    file: "bad.go".to_string(),
                    start_line: 1,
                    start_column: 1,
                    end_line: None,
                    end_column: None,
                }),
            }],
        }
    }

    #[test]
    fn test_full_document_has_all_sections() {
        let json = render(&sample_output(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        for key in ["metadata", "symbol_table", "call_graph", "pdg", "sdg", "issues"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert!(value["call_graph"].is_null());
        assert!(value["pdg"].is_null());
        assert!(value["sdg"].is_null());
        assert_eq!(value["issues"][0]["code"], "PARSE_ERROR");
        assert!(value["issues"][0]["position"].is_null());
    }

    #[test]
    fn test_write_to_directory_creates_it() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested").join("out");
        let written = write("{}", &Destination::Directory(out.clone())).unwrap();

        assert_eq!(written, Some(out.join(OUTPUT_FILE_NAME)));
        assert_eq!(fs::read_to_string(out.join(OUTPUT_FILE_NAME)).unwrap(), "{}\n");
    }

    #[test]
    fn test_destination_from_output_dir() {
        assert_eq!(Destination::from_output_dir(None), Destination::Stdout);
        assert_eq!(
            Destination::from_output_dir(Some(Path::new("out"))),
            Destination::Directory(PathBuf::from("out"))
        );
    }
}
