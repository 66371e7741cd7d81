//! Fact structures extracted from AST analysis.
//!
//! Facts are plain data: everything downstream (symbol table, resolver,
//! call graph) works from these and never touches the syntax tree again.

use std::fmt;
use std::ops::Range;

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Shape of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeShape {
    Struct,
    Interface,
    /// `type A = B`: a transparent synonym.
    Alias,
    /// `type A B` for any non-struct, non-interface B.
    Named,
}

impl TypeShape {
    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeShape::Struct => "struct",
            TypeShape::Interface => "interface",
            TypeShape::Alias => "alias",
            TypeShape::Named => "named",
        }
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parameter or result slot. Grouped declarations (`a, b int`) are
/// expanded into one entry per name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamFact {
    pub name: Option<String>,
    /// Type text as written, without the `...` of a variadic parameter.
    pub type_text: String,
    pub variadic: bool,
}

impl ParamFact {
    /// Type text as it appears in a signature (`...T` for variadics).
    pub fn display_type(&self) -> String {
        if self.variadic {
            format!("...{}", self.type_text)
        } else {
            self.type_text.clone()
        }
    }
}

/// A generic type parameter with its constraint text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParamFact {
    pub name: String,
    pub constraint: String,
}

/// Method receiver, e.g. `(p *Person)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverFact {
    pub name: Option<String>,
    /// Bare type name with pointer and type arguments removed (`Person`).
    pub type_name: String,
    /// Receiver type exactly as written (`*Person`, `List[T]`).
    pub type_text: String,
    pub pointer: bool,
}

/// A struct field. Embedded fields are named after their type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFact {
    pub name: String,
    pub type_text: String,
    pub tag: Option<String>,
    pub embedded: bool,
}

/// A method listed in an interface body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMethodFact {
    pub name: String,
    pub params: Vec<ParamFact>,
    pub results: Vec<ParamFact>,
    pub doc: String,
    pub span: Span,
}

/// A type declaration.
#[derive(Debug, Clone)]
pub struct TypeFact {
    pub name: String,
    pub shape: TypeShape,
    /// Right-hand side type text (`struct{...}`, `int`, `Other`).
    pub underlying: String,
    pub type_params: Vec<TypeParamFact>,
    pub fields: Vec<FieldFact>,
    pub interface_methods: Vec<InterfaceMethodFact>,
    /// Type texts embedded in an interface body (`io.Reader`).
    pub embedded_interfaces: Vec<String>,
    pub doc: String,
    pub span: Span,
}

/// A function or method declaration.
#[derive(Debug, Clone)]
pub struct FunctionFact {
    pub name: String,
    pub receiver: Option<ReceiverFact>,
    pub type_params: Vec<TypeParamFact>,
    pub params: Vec<ParamFact>,
    pub results: Vec<ParamFact>,
    pub doc: String,
    pub span: Span,
    pub body: Option<FunctionBody>,
}

impl FunctionFact {
    pub fn is_method(&self) -> bool {
        self.receiver.is_some()
    }
}

/// A package-level variable or constant.
#[derive(Debug, Clone)]
pub struct ValueFact {
    pub name: String,
    /// Declared type, or a type inferred from a simple initializer.
    pub type_text: Option<String>,
    /// Initializer source text.
    pub value: Option<String>,
    /// Shape of the initializer, for type resolution.
    pub value_expr: Option<ExprFact>,
    /// Types instantiated by the initializer (composite literals, `new`).
    pub instantiations: Vec<String>,
    pub doc: String,
    pub span: Span,
}

/// Structural summary of an expression, enough to follow types through
/// selectors, calls, and literals without a type checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprFact {
    Ident(String),
    Selector(Box<ExprFact>, String),
    /// Result `n` of calling the inner expression.
    Call(Box<ExprFact>, usize),
    /// Composite literal of the given type text.
    Composite(String),
    AddressOf(Box<ExprFact>),
    Deref(Box<ExprFact>),
    /// Element of an indexed slice, array, or map.
    Index(Box<ExprFact>),
    /// Type assertion to the given type text.
    Assert(String),
    FuncLit,
    Other,
}

/// How a call is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallKind {
    Call,
    Go,
    Defer,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Call => "call",
            CallKind::Go => "go",
            CallKind::Defer => "defer",
        }
    }
}

/// A call expression inside a function body.
#[derive(Debug, Clone)]
pub struct CallFact {
    pub callee: ExprFact,
    /// Callee expression as written (`fmt.Println`, `s.Area`).
    pub text: String,
    pub kind: CallKind,
    pub span: Span,
}

/// A local name introduced in a function body (parameter, receiver,
/// named result, `var`, `:=`, range variable).
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// Declared type text, when written.
    pub declared: Option<String>,
    /// Initializer shape, when no type was written.
    pub value: Option<ExprFact>,
    /// Byte offset of the declaring statement. The initializer is resolved
    /// here, where the new name is not yet visible.
    pub declared_at: usize,
    /// Byte range in which the name is visible: from the end of its
    /// declaration to the end of the enclosing block.
    pub visible: Range<usize>,
}

/// An identifier or selector passed as a call argument (a possible
/// function value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRef {
    pub expr: ExprFact,
    /// Byte offset of the call the value is passed to.
    pub at: usize,
}

/// Information about a function/method body used for call resolution.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    /// Span of the body block.
    pub span: Span,
    /// Calls in source order, including those inside function literals.
    pub calls: Vec<CallFact>,
    /// Type texts instantiated in the body.
    pub instantiations: Vec<String>,
    /// Local bindings in source order.
    pub bindings: Vec<Binding>,
    pub value_refs: Vec<ValueRef>,
}

impl FunctionBody {
    /// The binding `name` refers to at byte offset `at`: the innermost one
    /// in scope, or the latest redeclaration within the same scope.
    pub fn binding_at(&self, name: &str, at: usize) -> Option<&Binding> {
        self.bindings
            .iter()
            .filter(|b| b.name == name && b.visible.contains(&at))
            .max_by_key(|b| b.visible.start)
    }
}

/// An import/dependency declaration.
#[derive(Debug, Clone)]
pub struct Import {
    /// The import path or module name.
    pub path: String,
    /// Optional alias (e.g., `import foo "bar"` -> alias is "foo").
    pub alias: Option<String>,
    /// Source span.
    pub span: Span,
}

/// A syntax error location.
#[derive(Debug, Clone)]
pub struct ParseIssue {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// All facts extracted from a single file.
#[derive(Debug, Clone)]
pub struct FileFacts {
    /// File path.
    pub path: String,
    /// Language identifier.
    pub language: String,
    /// Package/module name (if applicable).
    pub package: Option<String>,
    /// Comment block directly above the package clause.
    pub package_doc: String,
    /// All imports in the file.
    pub imports: Vec<Import>,
    pub types: Vec<TypeFact>,
    pub functions: Vec<FunctionFact>,
    pub variables: Vec<ValueFact>,
    pub constants: Vec<ValueFact>,
    /// Whether a leading build constraint excludes the file from builds.
    pub build_ignored: bool,
    /// First syntax error, if any.
    pub parse_error: Option<ParseIssue>,
}

impl FileFacts {
    /// Create empty facts for a file.
    pub fn empty(path: &str, language: &str) -> Self {
        Self {
            path: path.to_string(),
            language: language.to_string(),
            package: None,
            package_doc: String::new(),
            imports: Vec::new(),
            types: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            constants: Vec::new(),
            build_ignored: false,
            parse_error: None,
        }
    }

    pub fn has_parse_errors(&self) -> bool {
        self.parse_error.is_some()
    }

    /// Find a function (not a method) by name.
    pub fn find_function(&self, name: &str) -> Option<&FunctionFact> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.receiver.is_none())
    }

    /// Find a method by receiver type and name.
    pub fn find_method(&self, receiver: &str, name: &str) -> Option<&FunctionFact> {
        self.functions.iter().find(|f| {
            f.name == name
                && f.receiver
                    .as_ref()
                    .map(|r| r.type_name == receiver)
                    .unwrap_or(false)
        })
    }

    /// Find a type declaration by name.
    pub fn find_type(&self, name: &str) -> Option<&TypeFact> {
        self.types.iter().find(|t| t.name == name)
    }
}
