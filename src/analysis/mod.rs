//! AST-backed code analysis module.
//!
//! This module provides a language-agnostic interface for extracting "facts"
//! from source code using tree-sitter. Facts include:
//! - Package clause, package documentation, imports
//! - Type declarations with fields and interface method lists
//! - Functions and methods with signatures and documentation
//! - Package-level variables and constants
//! - Per-body call sites, local bindings, and instantiated types
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source Files    │────▶│ Analyzers    │────▶│ FileFacts     │
//! └─────────────────┘     │ (Go)         │     │ (Types, Funcs,│
//!                         └──────────────┘     │  Bodies, etc) │
//!                                              └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ Call Graph   │◀────│ Symbol Table  │
//!                         │ (CHA / RTA)  │     │ + Index       │
//!                         └──────────────┘     └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement `LanguageAnalyzer` trait, including `is_exported` and
//!    `doc_rule`, which carry the language's visibility and comment rules
//! 3. Register the analyzer in `languages/mod.rs`
//!
//! See `languages/go.rs` for a reference implementation.

mod docs;
mod facts;
mod languages;
mod traits;

pub use docs::{clean_comments, leading_doc, trailing_doc, DocRule};
pub use facts::{
    Binding, CallFact, CallKind, ExprFact, FieldFact, FileFacts, FunctionBody, FunctionFact,
    Import, InterfaceMethodFact, ParamFact, ParseIssue, ReceiverFact, Span, TypeFact,
    TypeParamFact, TypeShape, ValueFact, ValueRef,
};
pub use languages::{
    base_type_name, get_analyzer, get_analyzer_by_id, register_analyzers, GoAnalyzer,
};
pub use traits::{LanguageAnalyzer, ParsedFile};
