//! Compact schema.
//!
//! Same data as the full document under one- and two-letter keys. Interface
//! methods and struct methods collapse to their signature strings, fields
//! to a `name -> type` map, and documentation is flattened to one line and
//! kept only for exported declarations.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::model::{
    AnalysisOutput, CallGraph, CallableKind, Issue, Metadata, Package, Position, Slot,
    TypeDeclaration,
};

/// Longest documentation string kept, in characters.
const MAX_DOC_CHARS: usize = 200;

// =============================================================================
// Schema
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CompactAnalysis {
    pub m: CompactMeta,
    /// Keyed by import path; null when the symbol table was not computed.
    pub p: Option<BTreeMap<String, CompactPackage>>,
    pub cg: Option<CompactCallGraph>,
    pub pdg: Option<serde_json::Value>,
    pub sdg: Option<serde_json::Value>,
    pub iss: Vec<CompactIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactMeta {
    /// Analyzer version.
    pub v: String,
    /// Language.
    pub l: String,
    /// Analysis level.
    pub a: String,
    /// Duration in milliseconds.
    pub d: u64,
    /// Timestamp.
    pub ts: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactPosition {
    pub f: String,
    pub l: usize,
    pub c: usize,
}

impl From<Position> for CompactPosition {
    fn from(p: Position) -> Self {
        CompactPosition {
            f: p.file,
            l: p.start_line,
            c: p.start_column,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactPackage {
    pub n: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// File base names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub f: Vec<String>,
    /// Import paths.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub i: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub t: BTreeMap<String, CompactType>,
    /// Keyed by `Name` for functions and `Recv.Name` for methods.
    #[serde(rename = "fn", skip_serializing_if = "BTreeMap::is_empty")]
    pub funcs: BTreeMap<String, CompactFunc>,
    /// Exported variables, name to type.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub v: BTreeMap<String, String>,
    /// Exported constants, name to value (or type when there is no value).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub c: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactType {
    pub k: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub f: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub m: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub im: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub e: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub pos: Slot<CompactPosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactFunc {
    pub s: String,
    /// `"m"` for methods, absent for functions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ex: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub pos: Slot<CompactPosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactCallGraph {
    pub a: String,
    /// Node ids.
    pub n: Vec<String>,
    /// `[source, target]` pairs, one per distinct pair.
    pub e: Vec<[String; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactIssue {
    pub s: String,
    pub c: String,
    pub m: String,
    #[serde(skip_serializing_if = "Slot::is_omitted")]
    pub pos: Slot<CompactPosition>,
}

// =============================================================================
// Conversion
// =============================================================================

/// Convert a full document into the compact schema.
pub fn to_compact(full: &AnalysisOutput) -> CompactAnalysis {
    CompactAnalysis {
        m: meta(&full.metadata),
        p: full.symbol_table.as_ref().map(|table| {
            table
                .packages
                .iter()
                .map(|(path, pkg)| (path.clone(), package(pkg)))
                .collect()
        }),
        cg: full.call_graph.as_ref().map(call_graph),
        pdg: None,
        sdg: None,
        iss: full.issues.iter().map(issue).collect(),
    }
}

fn meta(m: &Metadata) -> CompactMeta {
    CompactMeta {
        v: m.version.clone(),
        l: m.language.clone(),
        a: m.analysis_level.clone(),
        d: m.analysis_duration_ms,
        ts: m.timestamp.clone(),
    }
}

fn position(slot: &Slot<Position>) -> Slot<CompactPosition> {
    slot.clone().map(CompactPosition::from)
}

fn issue(i: &Issue) -> CompactIssue {
    CompactIssue {
        s: i.severity.as_str().to_string(),
        c: i.code.clone(),
        m: i.message.clone(),
        pos: position(&i.position),
    }
}

fn package(pkg: &Package) -> CompactPackage {
    let mut imports: Vec<String> = pkg.imports.iter().map(|i| i.path.clone()).collect();
    imports.dedup();

    let types = pkg
        .type_declarations
        .values()
        .map(|t| (t.name.clone(), type_declaration(t)))
        .collect();

    // `Name`, `Recv.Name`, or a disambiguated `init#2`.
    let prefix = format!("{}.", pkg.path);
    let funcs = pkg
        .callable_declarations
        .values()
        .map(|c| {
            let key = c
                .qualified_name
                .strip_prefix(prefix.as_str())
                .unwrap_or(&c.name)
                .to_string();
            let func = CompactFunc {
                s: c.signature.clone(),
                k: (c.kind == CallableKind::Method).then_some("m"),
                r: c.receiver_type.clone(),
                d: exported_doc(c.exported, c.documentation.as_deref()),
                ex: c.call_examples.clone().filter(|ex| !ex.is_empty()),
                pos: position(&c.position),
            };
            (key, func)
        })
        .collect();

    let vars = pkg
        .variables
        .values()
        .filter(|v| v.exported)
        .map(|v| (v.name.clone(), v.type_name.clone()))
        .collect();

    let consts = pkg
        .constants
        .values()
        .filter(|c| c.exported)
        .map(|c| {
            let value = c
                .value
                .clone()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| c.type_name.clone());
            (c.name.clone(), value)
        })
        .collect();

    CompactPackage {
        n: pkg.name.clone(),
        d: flatten_doc(&pkg.documentation),
        f: pkg.files.iter().map(|f| base_name(f)).collect(),
        i: imports,
        t: types,
        funcs,
        v: vars,
        c: consts,
    }
}

fn type_declaration(t: &TypeDeclaration) -> CompactType {
    let fields = t
        .fields
        .iter()
        .flatten()
        .map(|f| (f.name.clone(), f.type_name.clone()))
        .collect();
    let methods = t
        .methods
        .iter()
        .flat_map(|m| m.values())
        .map(|m| m.signature.clone())
        .collect();
    let interface_methods = t
        .interface_methods
        .iter()
        .flatten()
        .map(|m| m.signature.clone())
        .collect();

    CompactType {
        k: t.kind.as_str().to_string(),
        f: fields,
        m: methods,
        im: interface_methods,
        e: t.embedded_types.clone(),
        d: exported_doc(t.exported, t.documentation.as_deref()),
        pos: position(&t.position),
    }
}

fn call_graph(cg: &CallGraph) -> CompactCallGraph {
    let mut edges: Vec<[String; 2]> = cg
        .edges
        .iter()
        .map(|e| [e.source.clone(), e.target.clone()])
        .collect();
    edges.dedup();

    CompactCallGraph {
        a: cg.algorithm.clone(),
        n: cg.nodes.iter().map(|n| n.id.clone()).collect(),
        e: edges,
    }
}

fn exported_doc(exported: bool, doc: Option<&str>) -> Option<String> {
    if !exported {
        return None;
    }
    doc.and_then(flatten_doc)
}

/// Join documentation onto one line and cap its length.
fn flatten_doc(doc: &str) -> Option<String> {
    let line = doc
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if line.is_empty() {
        return None;
    }
    if line.chars().count() <= MAX_DOC_CHARS {
        return Some(line);
    }
    let mut short: String = line.chars().take(MAX_DOC_CHARS - 3).collect();
    short.push_str("...");
    Some(short)
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
