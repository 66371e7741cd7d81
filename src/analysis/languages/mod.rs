//! Language-specific analyzer implementations.
//!
//! Go is the only analyzed language. Analyzers are created once and
//! shared across rayon workers; each parse builds its own tree-sitter
//! parser.

mod go;

pub use go::{base_type_name, GoAnalyzer};

use super::LanguageAnalyzer;
use once_cell::sync::OnceCell;

static GO_ANALYZER: OnceCell<GoAnalyzer> = OnceCell::new();

fn go_analyzer() -> &'static dyn LanguageAnalyzer {
    GO_ANALYZER.get_or_init(GoAnalyzer::new)
}

/// Create the shared analyzers. Lookups do this lazily as well.
pub fn register_analyzers() {
    go_analyzer();
}

/// Analyzer for a file extension (without the dot).
pub fn get_analyzer(ext: &str) -> Option<&'static dyn LanguageAnalyzer> {
    let analyzer = go_analyzer();
    analyzer.handles_extension(ext).then_some(analyzer)
}

/// Analyzer for a language identifier such as `"go"`.
pub fn get_analyzer_by_id(lang_id: &str) -> Option<&'static dyn LanguageAnalyzer> {
    let analyzer = go_analyzer();
    (analyzer.language_id() == lang_id).then_some(analyzer)
}
