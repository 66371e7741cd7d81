//! Symbol table assembly.
//!
//! Produces one `Package` per analyzed package from the program index.
//! Qualified names come from the index so that the symbol table and the
//! call graph always agree on identifiers.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::analysis::{FunctionFact, LanguageAnalyzer, ParamFact, Span, TypeParamFact, TypeShape};
use crate::model::{
    CallableDeclaration, CallableKind, Field, ImportDecl, Package, Parameter, Position,
    PositionMode, SymbolTable, TypeDeclaration, TypeKind, TypeParameter, Variable,
};

use super::call_sites::{callable_body, collect_call_examples};
use super::index::{ProgramIndex, Scope};
use super::methods::{interface_methods, link_methods};

/// Options that shape the symbol table.
#[derive(Debug, Clone, Default)]
pub struct SymbolOptions {
    pub positions: PositionMode,
    /// Scan bodies for call examples.
    pub include_body: bool,
    pub max_call_examples: Option<usize>,
}

/// Build the symbol table for every package in the index.
pub fn build_symbol_table(
    index: &ProgramIndex,
    analyzer: &dyn LanguageAnalyzer,
    options: &SymbolOptions,
) -> SymbolTable {
    let examples = options
        .include_body
        .then(|| collect_call_examples(index, options.max_call_examples));

    let mut table = SymbolTable::default();
    for pkg in 0..index.packages.len() {
        let package = build_package(index, pkg, analyzer, options, examples.as_ref());
        debug!(
            package = %package.path,
            types = package.type_declarations.len(),
            callables = package.callable_declarations.len(),
            "built package symbols"
        );
        table.packages.insert(package.path.clone(), package);
    }
    table
}

fn build_package(
    index: &ProgramIndex,
    pkg: usize,
    analyzer: &dyn LanguageAnalyzer,
    options: &SymbolOptions,
    examples: Option<&HashMap<String, Vec<String>>>,
) -> Package {
    let entry = &index.packages[pkg];
    let source = entry.source;

    let documentation = source
        .files
        .iter()
        .map(|f| f.package_doc.as_str())
        .find(|doc| !doc.is_empty())
        .unwrap_or_default()
        .to_string();

    let mut imports: BTreeMap<(String, Option<String>), ImportDecl> = BTreeMap::new();
    for file in &source.files {
        for import in &file.imports {
            imports
                .entry((import.path.clone(), import.alias.clone()))
                .or_insert_with(|| ImportDecl {
                    path: import.path.clone(),
                    alias: import.alias.clone(),
                    position: options.positions.slot(span_position(&file.path, &import.span)),
                });
        }
    }

    let mut type_declarations = BTreeMap::new();
    for &t in &entry.types {
        let decl = type_declaration(index, t, analyzer, options.positions);
        type_declarations.insert(decl.qualified_name.clone(), decl);
    }

    let mut callable_declarations = BTreeMap::new();
    for &c in &entry.callables {
        let callable = &index.callables[c];
        let file = index.file(callable.loc);
        let mut decl = callable_declaration(callable.fact, &file.path, analyzer, options.positions);
        decl.qualified_name = callable.qualified_name.clone();
        decl.call_examples =
            examples.map(|m| m.get(&callable.qualified_name).cloned().unwrap_or_default());
        if options.include_body {
            decl.body = callable_body(index, c, options.positions);
        }
        callable_declarations.insert(decl.qualified_name.clone(), decl);
    }

    link_methods(&mut type_declarations, &callable_declarations);

    let mut variables = BTreeMap::new();
    let mut constants = BTreeMap::new();
    for &v in &entry.values {
        let value = &index.values[v];
        let fact = value.fact;
        let file = index.file(value.loc);
        let type_name = fact
            .type_text
            .clone()
            .or_else(|| {
                let expr = fact.value_expr.as_ref()?;
                index.type_of(expr, Scope::package(value.loc)).map(|t| t.text)
            })
            .unwrap_or_default();

        let decl = Variable {
            qualified_name: value.qualified_name.clone(),
            name: fact.name.clone(),
            type_name,
            value: fact.value.clone(),
            exported: analyzer.is_exported(&fact.name),
            documentation: non_empty(&fact.doc),
            position: options.positions.slot(span_position(&file.path, &fact.span)),
        };
        if value.constant {
            constants.insert(value.key.clone(), decl);
        } else {
            variables.insert(value.key.clone(), decl);
        }
    }

    Package {
        path: source.path.clone(),
        name: source.name.clone(),
        documentation,
        files: source.files.iter().map(|f| f.path.clone()).collect(),
        imports: imports.into_values().collect(),
        type_declarations,
        callable_declarations,
        variables,
        constants,
    }
}

fn type_declaration(
    index: &ProgramIndex,
    t: usize,
    analyzer: &dyn LanguageAnalyzer,
    positions: PositionMode,
) -> TypeDeclaration {
    let entry = &index.types[t];
    let fact = entry.fact;
    let file = index.file(entry.loc);

    let kind = match fact.shape {
        TypeShape::Struct => TypeKind::Struct,
        TypeShape::Interface => TypeKind::Interface,
        TypeShape::Alias => TypeKind::Alias,
        TypeShape::Named => TypeKind::Named,
    };

    let fields = (kind == TypeKind::Struct).then(|| {
        fact.fields
            .iter()
            .map(|f| Field {
                name: f.name.clone(),
                type_name: f.type_text.clone(),
                tag: f.tag.clone(),
                exported: analyzer.is_exported(&f.name),
                embedded: f.embedded,
            })
            .collect()
    });

    let embedded_types = match kind {
        TypeKind::Struct => fact
            .fields
            .iter()
            .filter(|f| f.embedded)
            .map(|f| f.type_text.clone())
            .collect(),
        TypeKind::Interface => fact.embedded_interfaces.clone(),
        _ => Vec::new(),
    };

    TypeDeclaration {
        qualified_name: entry.qualified_name.clone(),
        name: fact.name.clone(),
        kind,
        exported: analyzer.is_exported(&fact.name),
        position: positions.slot(span_position(&file.path, &fact.span)),
        documentation: non_empty(&fact.doc),
        fields,
        methods: (kind == TypeKind::Struct).then(BTreeMap::new),
        interface_methods: (kind == TypeKind::Interface).then(|| interface_methods(fact)),
        embedded_types,
        underlying_type: matches!(kind, TypeKind::Alias | TypeKind::Named)
            .then(|| fact.underlying.clone()),
        type_parameters: type_parameters(&fact.type_params),
    }
}

/// Declaration for a function or method. The qualified name is left for
/// the caller to assign.
fn callable_declaration(
    fact: &FunctionFact,
    file: &str,
    analyzer: &dyn LanguageAnalyzer,
    positions: PositionMode,
) -> CallableDeclaration {
    let receiver = fact.receiver.as_ref();
    CallableDeclaration {
        qualified_name: String::new(),
        name: fact.name.clone(),
        signature: callable_signature(fact),
        kind: if receiver.is_some() {
            CallableKind::Method
        } else {
            CallableKind::Function
        },
        receiver_type: receiver.map(|r| r.type_name.clone()),
        receiver_ptr: receiver.map(|r| r.pointer).unwrap_or(false),
        parameters: fact.params.iter().map(parameter).collect(),
        results: fact.results.iter().map(ParamFact::display_type).collect(),
        exported: analyzer.is_exported(&fact.name),
        documentation: non_empty(&fact.doc),
        type_parameters: type_parameters(&fact.type_params),
        position: positions.slot(span_position(file, &fact.span)),
        call_examples: None,
        body: None,
    }
}

/// `func (*Recv) Name[T any](int, ...string) (T, error)`
pub fn callable_signature(fact: &FunctionFact) -> String {
    let mut signature = String::from("func ");
    if let Some(recv) = &fact.receiver {
        signature.push('(');
        signature.push_str(&recv.type_text);
        signature.push_str(") ");
    }
    signature.push_str(&fact.name);
    if !fact.type_params.is_empty() {
        let params: Vec<String> = fact
            .type_params
            .iter()
            .map(|p| format!("{} {}", p.name, p.constraint))
            .collect();
        signature.push('[');
        signature.push_str(&params.join(", "));
        signature.push(']');
    }
    signature.push_str(&params_and_results(&fact.params, &fact.results));
    signature
}

/// `(int, string) error`, `(int) (int, error)`, `()`.
pub(crate) fn params_and_results(params: &[ParamFact], results: &[ParamFact]) -> String {
    let params: Vec<String> = params.iter().map(ParamFact::display_type).collect();
    let result_types: Vec<String> = results.iter().map(ParamFact::display_type).collect();
    let results = match results {
        [] => String::new(),
        [single] if single.name.is_none() => format!(" {}", single.type_text),
        _ => format!(" ({})", result_types.join(", ")),
    };
    format!("({}){}", params.join(", "), results)
}

pub(crate) fn parameter(param: &ParamFact) -> Parameter {
    Parameter {
        name: param.name.clone(),
        type_name: param.type_text.clone(),
        variadic: param.variadic,
    }
}

fn type_parameters(params: &[TypeParamFact]) -> Vec<TypeParameter> {
    params
        .iter()
        .map(|p| TypeParameter {
            name: p.name.clone(),
            constraint: p.constraint.clone(),
        })
        .collect()
}

pub(crate) fn non_empty(doc: &str) -> Option<String> {
    let trimmed = doc.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Detailed position for a span in `file`.
pub fn span_position(file: &str, span: &Span) -> Position {
    Position {
        file: file.to_string(),
        start_line: span.start_line,
        start_column: span.start_col,
        end_line: Some(span.end_line),
        end_column: Some(span.end_col),
    }
}
