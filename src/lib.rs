//! codeanalyzer-go - static analysis for Go projects.
//!
//! Produces one JSON document per run with a symbol table of every
//! package (types, functions, methods, variables, constants and their
//! documentation) and, on request, a whole-program call graph.
//!
//! # Architecture
//!
//! The codebase uses tree-sitter for AST-based analysis:
//!
//! - `analysis`: Per-file fact extraction with language analyzers
//! - `loader`: Source discovery, package grouping, parallel parsing
//! - `symbols`: Program index, name resolution, symbol table assembly
//! - `callgraph`: Interface dispatch table, CHA and RTA
//! - `report`: Full and compact output schemas, output writer
//! - `runner`: One analysis run end to end
//!
//! # Example
//!
//! ```no_run
//! use codeanalyzer_go::{AnalysisLevel, Runner};
//!
//! let output = Runner::new()
//!     .level(AnalysisLevel::Full)
//!     .run(std::path::Path::new("."))?;
//! println!("{}", codeanalyzer_go::report::render(&output, false)?);
//! # Ok::<(), codeanalyzer_go::AnalyzerError>(())
//! ```

pub mod analysis;
pub mod callgraph;
pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod report;
pub mod runner;
pub mod symbols;

pub use analysis::{get_analyzer, register_analyzers, FileFacts, GoAnalyzer, LanguageAnalyzer};
pub use callgraph::build_call_graph;
pub use config::AnalyzerConfig;
pub use error::AnalyzerError;
pub use model::{AnalysisLevel, AnalysisOutput, CallGraphAlgorithm, PositionMode};
pub use runner::Runner;
pub use symbols::{build_symbol_table, ProgramIndex, SymbolOptions};
