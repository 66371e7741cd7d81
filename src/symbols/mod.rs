//! Symbol table construction.
//!
//! ```text
//! Program ──▶ ProgramIndex ──▶ builder ──▶ SymbolTable
//!                  │              ├─ methods     (interface lists, struct links)
//!                  │              └─ call_sites  (optional call examples)
//!                  └──────────────────────────▶ callgraph
//! ```

mod builder;
mod call_sites;
mod index;
mod methods;

pub use builder::{build_symbol_table, callable_signature, span_position, SymbolOptions};
pub use call_sites::collect_call_examples;
pub use index::{
    signature_key, CallableEntry, Loc, PackageEntry, ProgramIndex, Scope, Target, TypeEntry,
    TypeRef, ValueEntry,
};

#[cfg(test)]
pub(crate) use index::tests::program as test_program;
