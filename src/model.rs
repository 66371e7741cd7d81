//! Entity model shared by the full and compact schemas.
//!
//! Every map is a `BTreeMap` so that serialization order depends only on
//! the analyzed source, never on hashing or worker scheduling.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::analysis::CallKind;
use crate::error::AnalyzerError;

pub const ANALYZER_NAME: &str = "codeanalyzer-go";
pub const ANALYZER_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Options
// =============================================================================

/// Which sections of the output are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisLevel {
    SymbolTable,
    CallGraph,
    Full,
}

impl AnalysisLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisLevel::SymbolTable => "symbol_table",
            AnalysisLevel::CallGraph => "call_graph",
            AnalysisLevel::Full => "full",
        }
    }

    pub fn wants_symbol_table(&self) -> bool {
        matches!(self, AnalysisLevel::SymbolTable | AnalysisLevel::Full)
    }

    pub fn wants_call_graph(&self) -> bool {
        matches!(self, AnalysisLevel::CallGraph | AnalysisLevel::Full)
    }

    /// Parse the value of the deprecated `--mode` flag.
    pub fn from_legacy_mode(mode: &str) -> Result<Self, AnalyzerError> {
        match mode {
            "symbol-table" | "symbol_table" => Ok(AnalysisLevel::SymbolTable),
            "call-graph" | "call_graph" => Ok(AnalysisLevel::CallGraph),
            "full" => Ok(AnalysisLevel::Full),
            other => Err(AnalyzerError::invalid_option(
                "mode",
                other,
                "symbol-table, call-graph, full",
            )),
        }
    }
}

impl FromStr for AnalysisLevel {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symbol_table" => Ok(AnalysisLevel::SymbolTable),
            "call_graph" => Ok(AnalysisLevel::CallGraph),
            "full" => Ok(AnalysisLevel::Full),
            other => Err(AnalyzerError::invalid_option(
                "analysis level",
                other,
                "symbol_table, call_graph, full",
            )),
        }
    }
}

impl fmt::Display for AnalysisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Call graph construction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallGraphAlgorithm {
    Cha,
    Rta,
}

impl CallGraphAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallGraphAlgorithm::Cha => "cha",
            CallGraphAlgorithm::Rta => "rta",
        }
    }
}

impl FromStr for CallGraphAlgorithm {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cha" => Ok(CallGraphAlgorithm::Cha),
            "rta" => Ok(CallGraphAlgorithm::Rta),
            other => Err(AnalyzerError::invalid_option(
                "call graph algorithm",
                other,
                "cha, rta",
            )),
        }
    }
}

impl fmt::Display for CallGraphAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much position information reaches the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionMode {
    /// Position keys are left out.
    None,
    /// Position keys are present with a null value.
    Minimal,
    #[default]
    Detailed,
}

impl PositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionMode::None => "none",
            PositionMode::Minimal => "minimal",
            PositionMode::Detailed => "detailed",
        }
    }

    /// Wrap a position according to the mode.
    pub fn slot<T>(&self, value: T) -> Slot<T> {
        match self {
            PositionMode::None => Slot::Omitted,
            PositionMode::Minimal => Slot::Null,
            PositionMode::Detailed => Slot::At(value),
        }
    }
}

impl FromStr for PositionMode {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PositionMode::None),
            "minimal" => Ok(PositionMode::Minimal),
            "detailed" => Ok(PositionMode::Detailed),
            other => Err(AnalyzerError::invalid_option(
                "position mode",
                other,
                "none, minimal, detailed",
            )),
        }
    }
}

// =============================================================================
// Position slot
// =============================================================================

/// A value that is either left out, explicitly null, or present.
///
/// Fields of this type must carry
/// `#[serde(skip_serializing_if = "Slot::is_omitted")]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Slot<T> {
    #[default]
    Omitted,
    Null,
    At(T),
}

impl<T> Slot<T> {
    pub fn is_omitted(&self) -> bool {
        matches!(self, Slot::Omitted)
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Slot::At(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Slot<U> {
        match self {
            Slot::Omitted => Slot::Omitted,
            Slot::Null => Slot::Null,
            Slot::At(v) => Slot::At(f(v)),
        }
    }
}

impl<T: Serialize> Serialize for Slot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Slot::At(v) => v.serialize(serializer),
            Slot::Omitted | Slot::Null => serializer.serialize_none(),
        }
    }
}

/// Source position. File paths are relative to the input root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub file: String,
    pub start_line: usize,
    pub start_column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<usize>,
}

pub type PositionSlot = Slot<Position>;

// =============================================================================
// Document
// =============================================================================

/// Full-schema output document.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub metadata: Metadata,
    pub symbol_table: Option<SymbolTable>,
    pub call_graph: Option<CallGraph>,
    /// Reserved for program dependence graph output.
    pub pdg: Option<serde_json::Value>,
    /// Reserved for system dependence graph output.
    pub sdg: Option<serde_json::Value>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub analyzer: String,
    pub version: String,
    pub language: String,
    pub analysis_level: String,
    pub timestamp: String,
    pub project_path: String,
    pub go_version: String,
    pub analysis_duration_ms: u64,
}

/// A non-fatal diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub position: PositionSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

// =============================================================================
// Symbol table
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    /// Keyed by package import path.
    pub packages: BTreeMap<String, Package>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub path: String,
    pub name: String,
    pub documentation: String,
    pub files: Vec<String>,
    pub imports: Vec<ImportDecl>,
    pub type_declarations: BTreeMap<String, TypeDeclaration>,
    pub callable_declarations: BTreeMap<String, CallableDeclaration>,
    pub variables: BTreeMap<String, Variable>,
    pub constants: BTreeMap<String, Constant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportDecl {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub position: PositionSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Struct,
    Interface,
    Alias,
    Named,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Struct => "struct",
            TypeKind::Interface => "interface",
            TypeKind::Alias => "alias",
            TypeKind::Named => "named",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeDeclaration {
    pub qualified_name: String,
    pub name: String,
    pub kind: TypeKind,
    pub exported: bool,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub position: PositionSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Struct kinds only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    /// Struct kinds only; keyed by method qualified name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<BTreeMap<String, CallableDeclaration>>,
    /// Interface kinds only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_methods: Option<Vec<InterfaceMethod>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embedded_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<TypeParameter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub exported: bool,
    pub embedded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceMethod {
    pub name: String,
    pub signature: String,
    pub parameters: Vec<Parameter>,
    pub results: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub variadic: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeParameter {
    pub name: String,
    pub constraint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableKind {
    Function,
    Method,
}

impl CallableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallableKind::Function => "function",
            CallableKind::Method => "method",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallableDeclaration {
    pub qualified_name: String,
    pub name: String,
    pub signature: String,
    pub kind: CallableKind,
    /// Present exactly when `kind` is `method`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_type: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub receiver_ptr: bool,
    pub parameters: Vec<Parameter>,
    pub results: Vec<String>,
    pub exported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<TypeParameter>,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub position: PositionSlot,
    /// `None` when bodies were not scanned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_examples: Option<Vec<String>>,
    /// Body summary; `None` when bodies were not scanned or the callable
    /// has no body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<CallableBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallableBody {
    pub start_line: usize,
    pub end_line: usize,
    pub line_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub call_sites: Vec<CallSite>,
}

/// One call expression in a body, in source order.
#[derive(Debug, Clone, Serialize)]
pub struct CallSite {
    /// Qualified name of the callee when it resolves statically,
    /// `<interface>.<method>` for interface calls, otherwise the callee
    /// expression as written.
    pub target: String,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub position: PositionSlot,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    pub qualified_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub exported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub position: PositionSlot,
}

/// Constants carry the same shape as variables.
pub type Constant = Variable;

// =============================================================================
// Call graph
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CallGraph {
    pub algorithm: String,
    pub nodes: Vec<CallGraphNode>,
    pub edges: Vec<CallGraphEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallGraphNode {
    pub id: String,
    pub qualified_name: String,
    pub package: String,
    pub name: String,
    pub kind: CallableKind,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub position: PositionSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Call,
    Go,
    Defer,
}

impl From<CallKind> for EdgeKind {
    fn from(kind: CallKind) -> Self {
        match kind {
            CallKind::Call => EdgeKind::Call,
            CallKind::Go => EdgeKind::Go,
            CallKind::Defer => EdgeKind::Defer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallGraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub call_site: PositionSlot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Holder {
        #[serde(skip_serializing_if = "Slot::is_omitted")]
        position: PositionSlot,
    }

    fn position() -> Position {
        Position {
            file: "main.go".to_string(),
            start_line: 3,
            start_column: 1,
            end_line: Some(5),
            end_column: Some(2),
        }
    }

    #[test]
    fn test_slot_serialization_modes() {
        let none = Holder {
            position: PositionMode::None.slot(position()),
        };
        assert_eq!(serde_json::to_string(&none).unwrap(), "{}");

        let minimal = Holder {
            position: PositionMode::Minimal.slot(position()),
        };
        assert_eq!(serde_json::to_string(&minimal).unwrap(), r#"{"position":null}"#);

        let detailed = Holder {
            position: PositionMode::Detailed.slot(position()),
        };
        let json = serde_json::to_value(&detailed).unwrap();
        assert_eq!(json["position"]["file"], "main.go");
        assert_eq!(json["position"]["start_line"], 3);
        assert_eq!(json["position"]["end_column"], 2);
    }

    #[test]
    fn test_option_parsing() {
        assert_eq!("full".parse::<AnalysisLevel>().unwrap(), AnalysisLevel::Full);
        assert!("invalid_level".parse::<AnalysisLevel>().is_err());
        assert_eq!(
            AnalysisLevel::from_legacy_mode("symbol-table").unwrap(),
            AnalysisLevel::SymbolTable
        );
        assert_eq!("rta".parse::<CallGraphAlgorithm>().unwrap(), CallGraphAlgorithm::Rta);
        assert!("invalid_algo".parse::<CallGraphAlgorithm>().is_err());
        assert!("verbose".parse::<PositionMode>().is_err());
    }
}
