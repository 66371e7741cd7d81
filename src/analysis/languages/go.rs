//! Go language analyzer using tree-sitter.
//!
//! Extracts:
//! - Package clause and package documentation
//! - Imports
//! - Type declarations (struct fields, interface methods, aliases)
//! - Function and method declarations with signatures and docs
//! - Package-level variables and constants
//! - Function body details for call resolution (calls, bindings,
//!   instantiated types)

use std::ops::Range;
use std::path::Path;

use phf::phf_map;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::{
    leading_doc, trailing_doc, Binding, CallFact, CallKind, DocRule, ExprFact, FieldFact,
    FileFacts, FunctionBody, FunctionFact, Import, InterfaceMethodFact, LanguageAnalyzer,
    ParamFact, ParseIssue, ParsedFile, ReceiverFact, Span, TypeFact, TypeParamFact, TypeShape,
    ValueFact, ValueRef,
};

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
(import_declaration
  (import_spec
    name: (package_identifier)? @alias
    path: (interpreted_string_literal) @path
  )
) @import

(import_declaration
  (import_spec_list
    (import_spec
      name: (package_identifier)? @alias
      path: (interpreted_string_literal) @path
    ) @import_item
  )
) @import_group
"#;

/// Tree-sitter query for package declaration.
const PACKAGE_QUERY: &str = r#"
(package_clause
  (package_identifier) @package_name
)
"#;

/// Go comment conventions.
static GO_DOC_RULE: DocRule = DocRule {
    comment_kind: "comment",
    line_prefixes: &["//"],
    block_delimiters: &[("/*", "*/")],
    directive_prefixes: &["//go:", "//line ", "//export ", "//extern ", "//nolint", "// +build"],
    max_gap_lines: 0,
};

/// Default types of untyped literal initializers.
static LITERAL_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "int_literal" => "int",
    "float_literal" => "float64",
    "imaginary_literal" => "complex128",
    "rune_literal" => "rune",
    "interpreted_string_literal" => "string",
    "raw_string_literal" => "string",
    "true" => "bool",
    "false" => "bool",
    "iota" => "int",
};

/// Nodes that close the scope of names declared inside them.
const SCOPE_KINDS: &[&str] = &[
    "block",
    "for_statement",
    "if_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "expression_case",
    "type_case",
    "default_case",
    "communication_case",
    "func_literal",
];

/// Go language analyzer.
pub struct GoAnalyzer {
    language: Language,
}

impl GoAnalyzer {
    /// Create a new Go analyzer.
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// Create a new parser for this thread.
    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Extract the package name from a parsed file.
    fn extract_package(&self, parsed: &ParsedFile) -> Option<String> {
        let query = Query::new(&self.language, PACKAGE_QUERY).ok()?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        if let Some(m) = matches.next() {
            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                if name == "package_name" {
                    return Some(parsed.node_text(capture.node).to_string());
                }
            }
        }
        None
    }

    fn package_clause<'t>(&self, parsed: &'t ParsedFile) -> Option<Node<'t>> {
        let root = parsed.tree.root_node();
        let mut walk = root.walk();
        let clause = root
            .named_children(&mut walk)
            .find(|n| n.kind() == "package_clause");
        clause
    }

    /// Extract the comment block directly above the package clause.
    fn extract_package_doc(&self, parsed: &ParsedFile) -> String {
        self.package_clause(parsed)
            .map(|clause| leading_doc(parsed, clause, &GO_DOC_RULE))
            .unwrap_or_default()
    }

    /// Whether a `//go:build ignore` (or legacy `+build ignore`) line
    /// precedes the package clause.
    fn is_build_ignored(&self, parsed: &ParsedFile) -> bool {
        let Some(clause) = self.package_clause(parsed) else {
            return false;
        };
        let root = parsed.tree.root_node();
        let mut walk = root.walk();
        let ignored = root
            .children(&mut walk)
            .take_while(|n| n.start_byte() < clause.start_byte())
            .filter(|n| n.kind() == "comment")
            .any(|n| {
                let text = parsed.node_text(n).trim();
                let constraint = text
                    .strip_prefix("//go:build")
                    .or_else(|| text.strip_prefix("// +build"));
                constraint.map(|c| c.trim() == "ignore").unwrap_or(false)
            });
        ignored
    }

    /// Extract imports from a parsed file.
    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();
        let mut seen = std::collections::HashSet::new();

        while let Some(m) = matches.next() {
            let mut path = String::new();
            let mut alias = None;
            let mut import_node = None;

            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "path" => {
                        // Remove quotes from path
                        let raw = parsed.node_text(capture.node);
                        path = raw.trim_matches('"').to_string();
                        import_node = Some(capture.node);
                    }
                    "alias" => {
                        alias = Some(parsed.node_text(capture.node).to_string());
                    }
                    _ => {}
                }
            }

            if path.is_empty() || !seen.insert((path.clone(), alias.clone())) {
                continue;
            }
            if let Some(node) = import_node {
                imports.push(Import {
                    path,
                    alias,
                    span: Span::from_node(node),
                });
            }
        }

        // Sort for deterministic output
        imports.sort_by(|a, b| (&a.path, &a.alias).cmp(&(&b.path, &b.alias)));

        Ok(imports)
    }

    /// Walk top-level declarations into `facts`.
    fn extract_declarations(&self, parsed: &ParsedFile, facts: &mut FileFacts) {
        let root = parsed.tree.root_node();
        let mut walk = root.walk();

        for node in root.named_children(&mut walk) {
            match node.kind() {
                "function_declaration" | "method_declaration" => {
                    if let Some(func) = self.function_fact(parsed, node) {
                        facts.functions.push(func);
                    }
                }
                "type_declaration" => self.type_facts(parsed, node, &mut facts.types),
                "const_declaration" => self.value_facts(parsed, node, true, &mut facts.constants),
                "var_declaration" => self.value_facts(parsed, node, false, &mut facts.variables),
                _ => {}
            }
        }
    }

    fn function_fact(&self, parsed: &ParsedFile, node: Node) -> Option<FunctionFact> {
        let name = parsed.node_text(node.child_by_field_name("name")?).to_string();
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|r| self.receiver_fact(parsed, r));
        let type_params = node
            .child_by_field_name("type_parameters")
            .map(|tp| self.type_params(parsed, tp))
            .unwrap_or_default();
        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.param_list(parsed, p))
            .unwrap_or_default();
        let results = node
            .child_by_field_name("result")
            .map(|r| self.result_list(parsed, r))
            .unwrap_or_default();
        let body = node
            .child_by_field_name("body")
            .map(|b| self.scan_body(parsed, b, receiver.as_ref(), &params, &results));

        Some(FunctionFact {
            name,
            receiver,
            type_params,
            params,
            results,
            doc: leading_doc(parsed, node, &GO_DOC_RULE),
            span: Span::from_node(node),
            body,
        })
    }

    fn receiver_fact(&self, parsed: &ParsedFile, list: Node) -> Option<ReceiverFact> {
        let mut walk = list.walk();
        let decl = list
            .named_children(&mut walk)
            .find(|n| n.kind() == "parameter_declaration")?;
        let type_node = decl.child_by_field_name("type")?;
        let type_text = parsed.node_text(type_node).to_string();
        let name = decl
            .child_by_field_name("name")
            .map(|n| parsed.node_text(n).to_string());

        Some(ReceiverFact {
            name,
            type_name: base_type_name(&type_text),
            pointer: type_text.trim_start().starts_with('*'),
            type_text,
        })
    }

    fn type_params(&self, parsed: &ParsedFile, list: Node) -> Vec<TypeParamFact> {
        let mut out = Vec::new();
        let mut walk = list.walk();
        for decl in list.named_children(&mut walk) {
            if decl.kind() != "type_parameter_declaration" {
                continue;
            }
            let constraint = decl
                .child_by_field_name("type")
                .map(|t| parsed.node_text(t).to_string())
                .unwrap_or_default();
            let mut names = decl.walk();
            for name in decl.children_by_field_name("name", &mut names) {
                out.push(TypeParamFact {
                    name: parsed.node_text(name).to_string(),
                    constraint: constraint.clone(),
                });
            }
        }
        out
    }

    fn param_list(&self, parsed: &ParsedFile, list: Node) -> Vec<ParamFact> {
        let mut out = Vec::new();
        let mut walk = list.walk();
        for decl in list.named_children(&mut walk) {
            let variadic = match decl.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let type_text = decl
                .child_by_field_name("type")
                .map(|t| parsed.node_text(t).to_string())
                .unwrap_or_default();

            let mut names_walk = decl.walk();
            let names: Vec<String> = decl
                .children_by_field_name("name", &mut names_walk)
                .map(|n| parsed.node_text(n).to_string())
                .collect();

            if names.is_empty() {
                out.push(ParamFact {
                    name: None,
                    type_text,
                    variadic,
                });
            } else {
                out.extend(names.into_iter().map(|name| ParamFact {
                    name: Some(name),
                    type_text: type_text.clone(),
                    variadic,
                }));
            }
        }
        out
    }

    /// A result is either a parenthesized parameter list or a bare type.
    fn result_list(&self, parsed: &ParsedFile, node: Node) -> Vec<ParamFact> {
        if node.kind() == "parameter_list" {
            self.param_list(parsed, node)
        } else {
            vec![ParamFact {
                name: None,
                type_text: parsed.node_text(node).to_string(),
                variadic: false,
            }]
        }
    }

    fn type_facts(&self, parsed: &ParsedFile, decl: Node, out: &mut Vec<TypeFact>) {
        let group_doc = leading_doc(parsed, decl, &GO_DOC_RULE);
        let mut walk = decl.walk();

        for spec in decl.named_children(&mut walk) {
            let is_alias = match spec.kind() {
                "type_spec" => false,
                "type_alias" => true,
                _ => continue,
            };
            let Some(name) = spec.child_by_field_name("name") else {
                continue;
            };
            let Some(type_node) = spec.child_by_field_name("type") else {
                continue;
            };

            let shape = if is_alias {
                TypeShape::Alias
            } else {
                match type_node.kind() {
                    "struct_type" => TypeShape::Struct,
                    "interface_type" => TypeShape::Interface,
                    _ => TypeShape::Named,
                }
            };

            let mut doc = leading_doc(parsed, spec, &GO_DOC_RULE);
            if doc.is_empty() {
                doc = group_doc.clone();
            }

            let mut fact = TypeFact {
                name: parsed.node_text(name).to_string(),
                shape,
                underlying: parsed.node_text(type_node).to_string(),
                type_params: spec
                    .child_by_field_name("type_parameters")
                    .map(|tp| self.type_params(parsed, tp))
                    .unwrap_or_default(),
                fields: Vec::new(),
                interface_methods: Vec::new(),
                embedded_interfaces: Vec::new(),
                doc,
                span: Span::from_node(spec),
            };

            match shape {
                TypeShape::Struct => fact.fields = self.struct_fields(parsed, type_node),
                TypeShape::Interface => self.interface_body(parsed, type_node, &mut fact),
                _ => {}
            }

            out.push(fact);
        }
    }

    fn struct_fields(&self, parsed: &ParsedFile, struct_node: Node) -> Vec<FieldFact> {
        let mut out = Vec::new();
        let mut walk = struct_node.walk();
        let Some(list) = struct_node
            .named_children(&mut walk)
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return out;
        };

        let mut list_walk = list.walk();
        for field in list.named_children(&mut list_walk) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let Some(type_node) = field.child_by_field_name("type") else {
                continue;
            };
            let mut type_text = parsed.node_text(type_node).to_string();
            let tag = field
                .child_by_field_name("tag")
                .map(|t| parsed.node_text(t).to_string());

            let mut names_walk = field.walk();
            let names: Vec<String> = field
                .children_by_field_name("name", &mut names_walk)
                .map(|n| parsed.node_text(n).to_string())
                .collect();

            if names.is_empty() {
                // Embedded field; the optional `*` sits outside the type node.
                let mut star_walk = field.walk();
                let pointer = field
                    .children(&mut star_walk)
                    .any(|c| !c.is_named() && parsed.node_text(c) == "*");
                if pointer && !type_text.starts_with('*') {
                    type_text = format!("*{}", type_text);
                }
                out.push(FieldFact {
                    name: base_type_name(&type_text),
                    type_text,
                    tag,
                    embedded: true,
                });
            } else {
                out.extend(names.into_iter().map(|name| FieldFact {
                    name,
                    type_text: type_text.clone(),
                    tag: tag.clone(),
                    embedded: false,
                }));
            }
        }
        out
    }

    fn interface_body(&self, parsed: &ParsedFile, iface: Node, fact: &mut TypeFact) {
        let mut walk = iface.walk();
        for elem in iface.named_children(&mut walk) {
            match elem.kind() {
                "method_elem" | "method_spec" => {
                    let Some(name) = elem.child_by_field_name("name") else {
                        continue;
                    };
                    let mut doc = leading_doc(parsed, elem, &GO_DOC_RULE);
                    if doc.is_empty() {
                        doc = trailing_doc(parsed, elem, &GO_DOC_RULE);
                    }
                    fact.interface_methods.push(InterfaceMethodFact {
                        name: parsed.node_text(name).to_string(),
                        params: elem
                            .child_by_field_name("parameters")
                            .map(|p| self.param_list(parsed, p))
                            .unwrap_or_default(),
                        results: elem
                            .child_by_field_name("result")
                            .map(|r| self.result_list(parsed, r))
                            .unwrap_or_default(),
                        doc,
                        span: Span::from_node(elem),
                    });
                }
                "type_elem" | "constraint_elem" | "interface_type_name" => {
                    fact.embedded_interfaces
                        .push(parsed.node_text(elem).trim().to_string());
                }
                _ => {}
            }
        }
    }

    fn value_facts(&self, parsed: &ParsedFile, decl: Node, is_const: bool, out: &mut Vec<ValueFact>) {
        let group_doc = leading_doc(parsed, decl, &GO_DOC_RULE);
        let spec_kind = if is_const { "const_spec" } else { "var_spec" };
        let mut specs = Vec::new();
        collect_specs(decl, spec_kind, &mut specs);

        // Implicit repetition in const groups carries the previous type.
        let mut carried_type: Option<String> = None;

        for spec in specs {
            let declared = spec
                .child_by_field_name("type")
                .map(|t| parsed.node_text(t).to_string());
            let values = spec
                .child_by_field_name("value")
                .map(expression_items)
                .unwrap_or_default();

            let mut doc = leading_doc(parsed, spec, &GO_DOC_RULE);
            if doc.is_empty() {
                doc = group_doc.clone();
            }

            let mut names_walk = spec.walk();
            let names: Vec<Node> = spec
                .children_by_field_name("name", &mut names_walk)
                .collect();

            let mut spec_type = None;
            for (i, name) in names.iter().enumerate() {
                let value = values.get(i).copied();
                let inferred = value.and_then(|v| infer_type(parsed, v));
                let type_text = declared.clone().or(inferred).or_else(|| {
                    if is_const && values.is_empty() {
                        carried_type.clone()
                    } else {
                        None
                    }
                });
                if spec_type.is_none() {
                    spec_type = type_text.clone();
                }

                let mut instantiations = Vec::new();
                if let Some(v) = value {
                    collect_instantiations(parsed, v, &mut instantiations);
                }

                out.push(ValueFact {
                    name: parsed.node_text(*name).to_string(),
                    type_text,
                    value: value.map(|v| parsed.node_text(v).to_string()),
                    value_expr: value.map(|v| expr_fact(parsed, v)),
                    instantiations,
                    doc: doc.clone(),
                    span: Span::from_node(spec),
                });
            }

            if is_const && (spec_type.is_some() || !values.is_empty()) {
                carried_type = spec_type;
            }
        }
    }

    /// Collect call sites, local bindings, and instantiated types.
    fn scan_body(
        &self,
        parsed: &ParsedFile,
        block: Node,
        receiver: Option<&ReceiverFact>,
        params: &[ParamFact],
        results: &[ParamFact],
    ) -> FunctionBody {
        let mut body = FunctionBody {
            span: Span::from_node(block),
            calls: Vec::new(),
            instantiations: Vec::new(),
            bindings: Vec::new(),
            value_refs: Vec::new(),
        };

        let whole = block.start_byte()..block.end_byte();
        if let Some(recv) = receiver {
            if let Some(name) = &recv.name {
                body.bindings.push(Binding {
                    name: name.clone(),
                    declared: Some(recv.type_text.clone()),
                    value: None,
                    declared_at: whole.start,
                    visible: whole.clone(),
                });
            }
        }
        bind_params(params.iter().chain(results), whole, &mut body);

        let mut stack = vec![block];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "call_expression" => record_call(parsed, node, &mut body),
                "composite_literal" => {
                    composite_instantiations(parsed, node, &mut body.instantiations)
                }
                "short_var_declaration" => bind_short_var(parsed, node, &mut body),
                "var_spec" => bind_var_spec(parsed, node, &mut body),
                "range_clause" => bind_range(parsed, node, &mut body),
                "func_literal" => {
                    if let Some(list) = node.child_by_field_name("parameters") {
                        let params = self.param_list(parsed, list);
                        bind_params(params.iter(), node.start_byte()..node.end_byte(), &mut body);
                    }
                }
                "type_switch_statement" => {
                    if let Some(alias) = node.child_by_field_name("alias") {
                        let visible = alias.end_byte()..node.end_byte();
                        for item in expression_items(alias) {
                            bind_unknown(parsed, item, visible.clone(), &mut body);
                        }
                    }
                }
                _ => {}
            }

            let mut walk = node.walk();
            let children: Vec<Node> = node.named_children(&mut walk).collect();
            stack.extend(children.into_iter().rev());
        }

        body
    }

    /// Locate the first syntax error in the tree.
    fn first_parse_error(&self, parsed: &ParsedFile) -> Option<ParseIssue> {
        let root = parsed.tree.root_node();
        if !root.has_error() {
            return None;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let pos = node.start_position();
                let message = if node.is_missing() {
                    format!("syntax error: missing {}", node.kind())
                } else {
                    "syntax error: unexpected input".to_string()
                };
                return Some(ParseIssue {
                    message,
                    line: pos.row + 1,
                    col: pos.column + 1,
                });
            }
            let mut walk = node.walk();
            let children: Vec<Node> = node
                .children(&mut walk)
                .filter(|c| c.has_error() || c.is_missing())
                .collect();
            stack.extend(children.into_iter().rev());
        }

        let pos = root.start_position();
        Some(ParseIssue {
            message: "syntax error".to_string(),
            line: pos.row + 1,
            col: pos.column + 1,
        })
    }
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for GoAnalyzer {
    fn language_id(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Go source: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts> {
        let mut facts = FileFacts::empty(&parsed.path, self.language_id());
        facts.package = self.extract_package(parsed);
        facts.package_doc = self.extract_package_doc(parsed);
        facts.build_ignored = self.is_build_ignored(parsed);
        facts.imports = self.extract_imports(parsed)?;
        facts.parse_error = self.first_parse_error(parsed);
        self.extract_declarations(parsed, &mut facts);
        Ok(facts)
    }

    fn is_exported(&self, name: &str) -> bool {
        name.chars().next().map(char::is_uppercase).unwrap_or(false)
    }

    fn doc_rule(&self) -> &'static DocRule {
        &GO_DOC_RULE
    }

    fn is_test_file(&self, file_name: &str) -> bool {
        file_name.ends_with("_test.go")
    }
}

/// `*pkg.List[T]` -> `List`.
pub fn base_type_name(type_text: &str) -> String {
    let trimmed = type_text.trim().trim_start_matches('*').trim();
    let without_args = trimmed.split('[').next().unwrap_or(trimmed);
    let name = without_args.rsplit('.').next().unwrap_or(without_args);
    name.trim_matches(|c| c == '(' || c == ')').trim().to_string()
}

fn collect_specs<'t>(node: Node<'t>, kind: &str, out: &mut Vec<Node<'t>>) {
    let mut walk = node.walk();
    for child in node.named_children(&mut walk) {
        if child.kind() == kind {
            out.push(child);
        } else if child.kind().ends_with("_spec_list") {
            collect_specs(child, kind, out);
        }
    }
}

/// Items of an `expression_list`, or the node itself.
fn expression_items(node: Node) -> Vec<Node> {
    if node.kind() != "expression_list" {
        return vec![node];
    }
    let mut walk = node.walk();
    let items: Vec<Node> = node
        .named_children(&mut walk)
        .filter(|n| n.kind() != "comment")
        .collect();
    items
}

fn infer_type(parsed: &ParsedFile, node: Node) -> Option<String> {
    if let Some(t) = LITERAL_TYPES.get(node.kind()) {
        return Some(t.to_string());
    }
    match node.kind() {
        "composite_literal" => node
            .child_by_field_name("type")
            .map(|t| parsed.node_text(t).to_string()),
        "unary_expression" => {
            let operator = node.child_by_field_name("operator")?;
            if parsed.node_text(operator) != "&" {
                return None;
            }
            let inner = infer_type(parsed, node.child_by_field_name("operand")?)?;
            Some(format!("*{}", inner))
        }
        "call_expression" => new_argument(parsed, node).map(|t| format!("*{}", t)),
        "parenthesized_expression" => infer_type(parsed, node.named_child(0)?),
        _ => None,
    }
}

/// The type argument of a `new(T)` call.
fn new_argument(parsed: &ParsedFile, call: Node) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "identifier" || parsed.node_text(function) != "new" {
        return None;
    }
    let args = call.child_by_field_name("arguments")?;
    let mut walk = args.walk();
    let first = args.named_children(&mut walk).next()?;
    Some(parsed.node_text(first).to_string())
}

/// Summarize an expression node.
pub(crate) fn expr_fact(parsed: &ParsedFile, node: Node) -> ExprFact {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "package_identifier" => {
            ExprFact::Ident(parsed.node_text(node).to_string())
        }
        "selector_expression" => {
            match (
                node.child_by_field_name("operand"),
                node.child_by_field_name("field"),
            ) {
                (Some(operand), Some(field)) => ExprFact::Selector(
                    Box::new(expr_fact(parsed, operand)),
                    parsed.node_text(field).to_string(),
                ),
                _ => ExprFact::Other,
            }
        }
        "call_expression" => {
            if let Some(t) = new_argument(parsed, node) {
                return ExprFact::AddressOf(Box::new(ExprFact::Composite(t)));
            }
            match node.child_by_field_name("function") {
                Some(function) => ExprFact::Call(Box::new(expr_fact(parsed, function)), 0),
                None => ExprFact::Other,
            }
        }
        "composite_literal" => node
            .child_by_field_name("type")
            .map(|t| ExprFact::Composite(parsed.node_text(t).to_string()))
            .unwrap_or(ExprFact::Other),
        "unary_expression" => {
            let operator = node
                .child_by_field_name("operator")
                .map(|o| parsed.node_text(o))
                .unwrap_or("");
            let Some(operand) = node.child_by_field_name("operand") else {
                return ExprFact::Other;
            };
            match operator {
                "&" => ExprFact::AddressOf(Box::new(expr_fact(parsed, operand))),
                "*" => ExprFact::Deref(Box::new(expr_fact(parsed, operand))),
                _ => ExprFact::Other,
            }
        }
        "parenthesized_expression" => node
            .named_child(0)
            .map(|inner| expr_fact(parsed, inner))
            .unwrap_or(ExprFact::Other),
        "index_expression" => node
            .child_by_field_name("operand")
            .map(|operand| ExprFact::Index(Box::new(expr_fact(parsed, operand))))
            .unwrap_or(ExprFact::Other),
        "type_assertion_expression" => node
            .child_by_field_name("type")
            .map(|t| ExprFact::Assert(parsed.node_text(t).to_string()))
            .unwrap_or(ExprFact::Other),
        "func_literal" => ExprFact::FuncLit,
        _ => ExprFact::Other,
    }
}

/// Types a package-level initializer may instantiate. Conversions `T(x)`
/// are recorded by callee name; names that turn out not to be types are
/// dropped during resolution.
fn collect_instantiations(parsed: &ParsedFile, root: Node, out: &mut Vec<String>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "composite_literal" => composite_instantiations(parsed, node, out),
            "call_expression" => {
                if let Some(t) = new_argument(parsed, node) {
                    out.push(t);
                } else if let Some(function) = node.child_by_field_name("function") {
                    if matches!(function.kind(), "identifier" | "selector_expression") {
                        out.push(parsed.node_text(function).to_string());
                    }
                }
            }
            _ => {}
        }
        let mut walk = node.walk();
        let children: Vec<Node> = node.named_children(&mut walk).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// The type of a composite literal, plus the element types of nested
/// literals whose type is elided (`[]Point{{1, 2}}`).
fn composite_instantiations(parsed: &ParsedFile, literal: Node, out: &mut Vec<String>) {
    let Some(type_node) = literal.child_by_field_name("type") else {
        return;
    };
    out.push(parsed.node_text(type_node).to_string());
    if let Some(body) = literal.child_by_field_name("body") {
        elided_instantiations(parsed, type_node, body, out);
    }
}

fn elided_instantiations(parsed: &ParsedFile, type_node: Node, body: Node, out: &mut Vec<String>) {
    let (key_type, element_type) = match type_node.kind() {
        "slice_type" | "array_type" | "implicit_length_array_type" => {
            (None, type_node.child_by_field_name("element"))
        }
        "map_type" => (
            type_node.child_by_field_name("key"),
            type_node.child_by_field_name("value"),
        ),
        _ => return,
    };

    let mut walk = body.walk();
    for item in body.named_children(&mut walk) {
        let (key, value) = match item.kind() {
            "keyed_element" => (
                item.child_by_field_name("key"),
                item.child_by_field_name("value"),
            ),
            "literal_element" => (None, Some(item)),
            _ => continue,
        };
        for (slot, element) in [(key_type, key), (element_type, value)] {
            let (Some(slot), Some(element)) = (slot, element) else {
                continue;
            };
            let Some(inner) = element.named_child(0).filter(|n| n.kind() == "literal_value") else {
                continue;
            };
            out.push(parsed.node_text(slot).to_string());
            elided_instantiations(parsed, slot, inner, out);
        }
    }
}

/// Byte range in which a name declared by `decl` is visible.
fn visible_range(decl: Node) -> Range<usize> {
    let mut current = decl.parent();
    while let Some(node) = current {
        if SCOPE_KINDS.contains(&node.kind()) {
            return decl.end_byte()..node.end_byte();
        }
        current = node.parent();
    }
    decl.end_byte()..decl.end_byte()
}

fn record_call(parsed: &ParsedFile, node: Node, body: &mut FunctionBody) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let kind = match node.parent().map(|p| p.kind()) {
        Some("go_statement") => CallKind::Go,
        Some("defer_statement") => CallKind::Defer,
        _ => CallKind::Call,
    };

    if let Some(t) = new_argument(parsed, node) {
        body.instantiations.push(t);
        return;
    }

    body.calls.push(CallFact {
        callee: expr_fact(parsed, function),
        text: parsed.node_text(function).to_string(),
        kind,
        span: Span::from_node(node),
    });

    if let Some(args) = node.child_by_field_name("arguments") {
        let mut walk = args.walk();
        for arg in args.named_children(&mut walk) {
            if matches!(arg.kind(), "identifier" | "selector_expression") {
                body.value_refs.push(ValueRef {
                    expr: expr_fact(parsed, arg),
                    at: node.start_byte(),
                });
            }
        }
    }
}

fn bind_params<'a>(
    params: impl Iterator<Item = &'a ParamFact>,
    visible: Range<usize>,
    body: &mut FunctionBody,
) {
    for param in params {
        let Some(name) = &param.name else { continue };
        if name == "_" {
            continue;
        }
        let declared = if param.variadic {
            format!("[]{}", param.type_text)
        } else {
            param.type_text.clone()
        };
        body.bindings.push(Binding {
            name: name.clone(),
            declared: Some(declared),
            value: None,
            declared_at: visible.start,
            visible: visible.clone(),
        });
    }
}

fn bind_unknown(parsed: &ParsedFile, ident: Node, visible: Range<usize>, body: &mut FunctionBody) {
    if ident.kind() != "identifier" {
        return;
    }
    let name = parsed.node_text(ident);
    if name == "_" {
        return;
    }
    body.bindings.push(Binding {
        name: name.to_string(),
        declared: None,
        value: None,
        declared_at: visible.start,
        visible,
    });
}

/// Bind `names` declared by `decl` to `values`, splitting a single
/// multi-value call.
fn bind_values(
    parsed: &ParsedFile,
    decl: Node,
    names: &[Node],
    values: &[Node],
    body: &mut FunctionBody,
) {
    let visible = visible_range(decl);
    for (i, name) in names.iter().enumerate() {
        if name.kind() != "identifier" {
            continue;
        }
        let text = parsed.node_text(*name);
        if text == "_" {
            continue;
        }
        let value = if names.len() == values.len() {
            expr_fact(parsed, values[i])
        } else if values.len() == 1 {
            match expr_fact(parsed, values[0]) {
                ExprFact::Call(callee, _) => ExprFact::Call(callee, i),
                other if i == 0 => other,
                _ => ExprFact::Other,
            }
        } else {
            ExprFact::Other
        };
        body.bindings.push(Binding {
            name: text.to_string(),
            declared: None,
            value: Some(value),
            declared_at: decl.start_byte(),
            visible: visible.clone(),
        });
    }
}

fn bind_short_var(parsed: &ParsedFile, node: Node, body: &mut FunctionBody) {
    let names = node
        .child_by_field_name("left")
        .map(expression_items)
        .unwrap_or_default();
    let values = node
        .child_by_field_name("right")
        .map(expression_items)
        .unwrap_or_default();
    bind_values(parsed, node, &names, &values, body);
}

fn bind_var_spec(parsed: &ParsedFile, spec: Node, body: &mut FunctionBody) {
    let mut walk = spec.walk();
    let names: Vec<Node> = spec.children_by_field_name("name", &mut walk).collect();

    if let Some(type_node) = spec.child_by_field_name("type") {
        let declared = parsed.node_text(type_node).to_string();
        if declared.starts_with(|c: char| c.is_alphabetic()) {
            // A zero value of a named type is a usable instance.
            body.instantiations.push(declared.clone());
        }
        let visible = visible_range(spec);
        for name in names {
            let text = parsed.node_text(name);
            if text == "_" {
                continue;
            }
            body.bindings.push(Binding {
                name: text.to_string(),
                declared: Some(declared.clone()),
                value: None,
                declared_at: spec.start_byte(),
                visible: visible.clone(),
            });
        }
        return;
    }

    let values = spec
        .child_by_field_name("value")
        .map(expression_items)
        .unwrap_or_default();
    bind_values(parsed, spec, &names, &values, body);
}

fn bind_range(parsed: &ParsedFile, clause: Node, body: &mut FunctionBody) {
    let mut walk = clause.walk();
    let declares = clause
        .children(&mut walk)
        .any(|c| !c.is_named() && parsed.node_text(c) == ":=");
    if !declares {
        return;
    }
    let (Some(left), Some(right)) = (
        clause.child_by_field_name("left"),
        clause.child_by_field_name("right"),
    ) else {
        return;
    };
    let visible = visible_range(clause);
    let names = expression_items(left);
    for (i, name) in names.iter().enumerate() {
        if name.kind() != "identifier" || parsed.node_text(*name) == "_" {
            continue;
        }
        let value = if i == 1 {
            ExprFact::Index(Box::new(expr_fact(parsed, right)))
        } else {
            ExprFact::Other
        };
        body.bindings.push(Binding {
            name: parsed.node_text(*name).to_string(),
            declared: None,
            value: Some(value),
            declared_at: clause.start_byte(),
            visible: visible.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_go(source: &str) -> (GoAnalyzer, ParsedFile) {
        let analyzer = GoAnalyzer::new();
        let parsed = analyzer
            .parse(Path::new("test.go"), source.as_bytes())
            .unwrap();
        (analyzer, parsed)
    }

    fn facts_for(source: &str) -> FileFacts {
        let (analyzer, parsed) = parse_go(source);
        analyzer.extract_facts(&parsed).unwrap()
    }

    fn bound<'a>(body: &'a FunctionBody, name: &str) -> Option<&'a Binding> {
        body.bindings.iter().find(|b| b.name == name)
    }

    #[test]
    fn test_extract_package() {
        let (analyzer, parsed) = parse_go("package main\n");
        let pkg = analyzer.extract_package(&parsed);
        assert_eq!(pkg, Some("main".to_string()));
    }

    #[test]
    fn test_package_doc() {
        let facts = facts_for(
            r#"// Package main is a sample application.
// It greets people.
package main
"#,
        );
        assert_eq!(
            facts.package_doc,
            "Package main is a sample application.\nIt greets people."
        );
    }

    #[test]
    fn test_package_doc_requires_adjacency() {
        let facts = facts_for(
            r#"// Copyright header.

package main
"#,
        );
        assert_eq!(facts.package_doc, "");
    }

    #[test]
    fn test_extract_functions() {
        let source = r#"
package main

func main() {
    println("hello")
}

// add returns the sum of two ints.
func add(a, b int) int { return a + b }
"#;
        let facts = facts_for(source);

        assert_eq!(facts.functions.len(), 2);
        let add = facts.find_function("add").unwrap();
        assert_eq!(add.params.len(), 2);
        assert_eq!(add.params[0].name.as_deref(), Some("a"));
        assert_eq!(add.params[1].type_text, "int");
        assert_eq!(add.results.len(), 1);
        assert_eq!(add.results[0].type_text, "int");
        assert_eq!(add.doc, "add returns the sum of two ints.");
        assert_eq!(facts.find_function("main").unwrap().doc, "");
    }

    #[test]
    fn test_extract_methods() {
        let source = r#"
package main

type Config struct {
    Name string
}

func (c *Config) Validate() error {
    return nil
}

func (c Config) String() string {
    return c.Name
}
"#;
        let facts = facts_for(source);

        let validate = facts.find_method("Config", "Validate").unwrap();
        let recv = validate.receiver.as_ref().unwrap();
        assert!(recv.pointer);
        assert_eq!(recv.type_text, "*Config");

        let string_method = facts.find_method("Config", "String").unwrap();
        assert!(!string_method.receiver.as_ref().unwrap().pointer);
    }

    #[test]
    fn test_extract_types() {
        let source = r#"
package main

type Handler struct {
    name string
    *Base
    io.Writer
    Tags []string `json:"tags"`
}

type Service interface {
    Run() error
}

type ID int

type Alias = Handler
"#;
        let facts = facts_for(source);

        let handler = facts.find_type("Handler").unwrap();
        assert_eq!(handler.shape, TypeShape::Struct);
        assert_eq!(handler.fields.len(), 4);
        assert!(handler.fields[1].embedded);
        assert_eq!(handler.fields[1].name, "Base");
        assert_eq!(handler.fields[1].type_text, "*Base");
        assert_eq!(handler.fields[2].name, "Writer");
        assert_eq!(handler.fields[3].tag.as_deref(), Some("`json:\"tags\"`"));

        assert_eq!(facts.find_type("Service").unwrap().shape, TypeShape::Interface);
        assert_eq!(facts.find_type("ID").unwrap().shape, TypeShape::Named);
        assert_eq!(facts.find_type("ID").unwrap().underlying, "int");
        assert_eq!(facts.find_type("Alias").unwrap().shape, TypeShape::Alias);
    }

    #[test]
    fn test_interface_methods_with_docs() {
        let source = r#"
package main

// Calculator does arithmetic.
type Calculator interface {
    // Add returns a + b.
    Add(a, b int) int
    Multiply(a, b int) int // Multiply returns a * b.
    fmt.Stringer
}
"#;
        let facts = facts_for(source);
        let calc = facts.find_type("Calculator").unwrap();

        assert_eq!(calc.doc, "Calculator does arithmetic.");
        assert_eq!(calc.interface_methods.len(), 2);
        assert_eq!(calc.interface_methods[0].name, "Add");
        assert_eq!(calc.interface_methods[0].doc, "Add returns a + b.");
        assert_eq!(calc.interface_methods[1].name, "Multiply");
        assert_eq!(calc.interface_methods[1].doc, "Multiply returns a * b.");
        assert_eq!(calc.embedded_interfaces, vec!["fmt.Stringer".to_string()]);
    }

    #[test]
    fn test_extract_constants() {
        let source = r#"
package main

const Version = "1.0.0"

const (
    MaxRetries = 3
    Timeout = 30
)

const (
    Low Level = iota
    High
)
"#;
        let facts = facts_for(source);

        assert_eq!(facts.constants.len(), 5);
        let version = &facts.constants[0];
        assert_eq!(version.type_text.as_deref(), Some("string"));
        assert_eq!(version.value.as_deref(), Some("\"1.0.0\""));
        let high = facts.constants.iter().find(|c| c.name == "High").unwrap();
        assert_eq!(high.type_text.as_deref(), Some("Level"));
        assert!(high.value.is_none());
    }

    #[test]
    fn test_extract_variables() {
        let source = r#"
package main

var (
    count int
    greeter = &ConsoleGreeter{}
    name, title = "a", "b"
)
"#;
        let facts = facts_for(source);

        assert_eq!(facts.variables.len(), 4);
        assert_eq!(facts.variables[0].type_text.as_deref(), Some("int"));
        assert_eq!(facts.variables[1].type_text.as_deref(), Some("*ConsoleGreeter"));
        assert_eq!(facts.variables[1].instantiations, vec!["ConsoleGreeter".to_string()]);
        assert_eq!(facts.variables[3].value.as_deref(), Some("\"b\""));
    }

    #[test]
    fn test_extract_imports() {
        let source = r#"
package main

import (
    "fmt"
    "os"
    log "github.com/sirupsen/logrus"
)
"#;
        let facts = facts_for(source);

        assert_eq!(facts.imports.len(), 3);
        assert!(facts.imports.iter().any(|i| i.path == "fmt" && i.alias.is_none()));
        assert!(facts.imports.iter().any(|i| i.path == "os"));
        assert!(facts
            .imports
            .iter()
            .any(|i| i.path == "github.com/sirupsen/logrus" && i.alias == Some("log".to_string())));
    }

    #[test]
    fn test_body_calls_and_kinds() {
        let source = r#"
package main

func main() {
    g := ConsoleGreeter{Prefix: ">"}
    msg := g.Greet("x")
    go worker()
    defer cleanup()
    fmt.Println(msg)
    p := new(Person)
    p.Birthday()
}
"#;
        let facts = facts_for(source);
        let body = facts.find_function("main").unwrap().body.as_ref().unwrap();

        let kinds: Vec<CallKind> = body.calls.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![CallKind::Call, CallKind::Go, CallKind::Defer, CallKind::Call, CallKind::Call]
        );
        assert_eq!(
            body.calls[0].callee,
            ExprFact::Selector(Box::new(ExprFact::Ident("g".to_string())), "Greet".to_string())
        );
        assert_eq!(body.calls[1].callee, ExprFact::Ident("worker".to_string()));
        assert!(body.instantiations.contains(&"ConsoleGreeter".to_string()));
        assert!(body.instantiations.contains(&"Person".to_string()));

        let p = bound(body, "p").unwrap();
        assert_eq!(
            p.value,
            Some(ExprFact::AddressOf(Box::new(ExprFact::Composite("Person".to_string()))))
        );
    }

    #[test]
    fn test_body_bindings_from_signature() {
        let source = r#"
package main

func DoTwice(fn func(int) int, x int) (out int) {
    a, err := load()
    var g Greeter
    return fn(fn(x))
}
"#;
        let facts = facts_for(source);
        let body = facts.find_function("DoTwice").unwrap().body.as_ref().unwrap();

        assert_eq!(bound(body, "fn").unwrap().declared.as_deref(), Some("func(int) int"));
        assert_eq!(bound(body, "out").unwrap().declared.as_deref(), Some("int"));
        assert_eq!(
            bound(body, "err").unwrap().value,
            Some(ExprFact::Call(Box::new(ExprFact::Ident("load".to_string())), 1))
        );
        assert!(bound(body, "a").is_some());
        assert_eq!(bound(body, "g").unwrap().declared.as_deref(), Some("Greeter"));
    }

    #[test]
    fn test_elided_literal_elements_are_instantiated() {
        let source = r#"
package main

func main() {
    shapes := []Square{{Side: 1}}
    byName := map[string]*Circle{"a": {R: 2}}
    grid := [][]Cell{{{}}}
    named := []Shape{Square{Side: 3}}
}
"#;
        let facts = facts_for(source);
        let body = facts.find_function("main").unwrap().body.as_ref().unwrap();

        assert!(body.instantiations.contains(&"Square".to_string()));
        assert!(body.instantiations.contains(&"*Circle".to_string()));
        assert!(body.instantiations.contains(&"Cell".to_string()));
        assert!(!body.instantiations.contains(&"string".to_string()));
    }

    #[test]
    fn test_package_initializer_records_conversions() {
        let facts = facts_for("package main\n\nvar boiling = Celsius(100)\n");
        assert_eq!(facts.variables[0].instantiations, vec!["Celsius".to_string()]);
    }

    #[test]
    fn test_binding_scopes_follow_blocks() {
        let source = r#"
package main

func main() {
    x := A{}
    x.Run()
    for _, x := range []B{B{}} {
        x.Run()
    }
    x.Run()
}
"#;
        let facts = facts_for(source);
        let body = facts.find_function("main").unwrap().body.as_ref().unwrap();
        assert_eq!(body.calls.len(), 3);

        let at = |i: usize| body.binding_at("x", body.calls[i].span.start_byte).unwrap();
        assert_eq!(at(0).value, Some(ExprFact::Composite("A".to_string())));
        assert!(matches!(at(1).value, Some(ExprFact::Index(_))));
        assert_eq!(at(2).value, Some(ExprFact::Composite("A".to_string())));
    }

    #[test]
    fn test_initializer_sees_outer_binding() {
        let source = r#"
package main

func main() {
    x := A{}
    if x := x.Next(); x.Ok() {
    }
}
"#;
        let facts = facts_for(source);
        let body = facts.find_function("main").unwrap().body.as_ref().unwrap();
        let inner = body.bindings.iter().rfind(|b| b.name == "x").unwrap();
        let outer = body.binding_at("x", inner.declared_at).unwrap();
        assert_eq!(outer.value, Some(ExprFact::Composite("A".to_string())));
        let next = &body.calls[0];
        assert_eq!(body.binding_at("x", next.span.start_byte).unwrap().value, outer.value);
        let ok = &body.calls[1];
        assert!(matches!(
            body.binding_at("x", ok.span.start_byte).unwrap().value,
            Some(ExprFact::Call(_, 0))
        ));
    }

    #[test]
    fn test_value_refs_capture_function_arguments() {
        let source = r#"
package main

func main() {
    run(handler, pkg.Other, 3)
}
"#;
        let facts = facts_for(source);
        let body = facts.find_function("main").unwrap().body.as_ref().unwrap();
        assert_eq!(body.value_refs.len(), 2);
        assert_eq!(body.value_refs[0].expr, ExprFact::Ident("handler".to_string()));
    }

    #[test]
    fn test_parse_error_recorded() {
        let facts = facts_for("package main\n\nfunc broken( {\n");
        let issue = facts.parse_error.expect("syntax error expected");
        assert!(issue.message.starts_with("syntax error"));
        assert!(issue.line >= 3);
    }

    #[test]
    fn test_build_ignore() {
        let facts = facts_for("//go:build ignore\n\npackage main\n");
        assert!(facts.build_ignored);
        let facts = facts_for("//go:build linux\n\npackage main\n");
        assert!(!facts.build_ignored);
    }

    #[test]
    fn test_exported_follows_casing() {
        let analyzer = GoAnalyzer::new();
        assert!(analyzer.is_exported("Greet"));
        assert!(!analyzer.is_exported("add"));
        assert!(!analyzer.is_exported("_"));
    }

    #[test]
    fn test_base_type_name() {
        assert_eq!(base_type_name("*pkg.List[T]"), "List");
        assert_eq!(base_type_name("Person"), "Person");
        assert_eq!(base_type_name("*Person"), "Person");
    }
}
