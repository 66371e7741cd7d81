//! Core traits for language analysis.

use std::path::Path;

use super::{DocRule, FileFacts};

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// This is kept separate from FileFacts to allow reusing the tree
/// for multiple analysis passes without re-parsing.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

/// Language-specific analyzer trait.
///
/// The analyzer owns every rule that depends on the source language:
/// grammar, file selection, comment adjacency, and name visibility.
///
/// # Thread Safety
///
/// Note: tree_sitter::Parser is not Sync, so implementations should
/// create parsers as needed or use thread-local storage.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "go").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Returns an error if parsing fails completely (e.g., wrong language).
    /// Partial parse errors are still returned as a valid tree with ERROR nodes.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile>;

    /// Extract all facts from a parsed file.
    ///
    /// Syntax errors do not fail extraction; they are reported through
    /// `FileFacts::parse_error`.
    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts>;

    /// Whether a declared identifier is visible outside its package.
    fn is_exported(&self, name: &str) -> bool;

    /// Comment adjacency rule used for documentation extraction.
    fn doc_rule(&self) -> &'static DocRule;

    /// Whether a file name denotes a test file.
    fn is_test_file(&self, file_name: &str) -> bool;

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
