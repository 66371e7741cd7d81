//! Whole-program index over parsed facts.
//!
//! The index assigns every declaration its qualified name, keeps a scope
//! per package and an import table per file, and answers the structural
//! questions the builder and the call graph need: what type does an
//! expression have, which callable does a call expression name, which
//! methods does a type carry, and which interfaces does it satisfy.
//!
//! Resolution is purely textual. Anything it cannot follow (external
//! packages, generics, function values) resolves to `None` and the caller
//! skips it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::analysis::{
    Binding, ExprFact, FileFacts, FunctionBody, FunctionFact, InterfaceMethodFact, ParamFact, TypeFact,
    TypeShape, ValueFact,
};
use crate::loader::{Program, SourcePackage};

/// Bound on recursive resolution steps for a single query.
const MAX_DEPTH: usize = 16;

lazy_static! {
    static ref QUALIFIER: Regex = Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\.").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// A file within a package, used as the context for names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Loc {
    pub pkg: usize,
    pub file: usize,
}

/// Type text together with the file whose imports give it meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub text: String,
    pub loc: Loc,
}

impl TypeRef {
    pub fn new(text: impl Into<String>, loc: Loc) -> Self {
        Self {
            text: text.into(),
            loc,
        }
    }
}

/// Names visible at one point of a file: package scope plus, inside a
/// function body, the locals in scope at byte offset `at`.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub loc: Loc,
    pub body: Option<&'a FunctionBody>,
    pub at: usize,
}

impl<'a> Scope<'a> {
    /// Package scope only, as seen by package-level initializers.
    pub fn package(loc: Loc) -> Self {
        Scope {
            loc,
            body: None,
            at: 0,
        }
    }

    /// Inside `body` at byte offset `at`.
    pub fn body(loc: Loc, body: &'a FunctionBody, at: usize) -> Self {
        Scope {
            loc,
            body: Some(body),
            at,
        }
    }

    fn binding(&self, name: &str) -> Option<&'a Binding> {
        self.body.and_then(|b| b.binding_at(name, self.at))
    }
}

/// Where a call expression goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A known callable (index into `ProgramIndex::callables`).
    Static(usize),
    /// A method called through an interface value.
    Dynamic { iface: usize, method: String },
}

#[derive(Debug, Clone, Copy)]
enum Member {
    Func(usize),
    Type(usize),
    Value(usize),
}

#[derive(Debug)]
pub struct CallableEntry<'p> {
    pub qualified_name: String,
    pub loc: Loc,
    pub fact: &'p FunctionFact,
    /// Receiver type, when declared in the same package.
    pub receiver: Option<usize>,
}

#[derive(Debug)]
pub struct TypeEntry<'p> {
    pub qualified_name: String,
    pub loc: Loc,
    pub fact: &'p TypeFact,
    /// Declared methods by name.
    pub methods: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct ValueEntry<'p> {
    pub qualified_name: String,
    /// Key within the package map (name, plus a suffix for duplicates).
    pub key: String,
    pub loc: Loc,
    pub fact: &'p ValueFact,
    pub constant: bool,
}

#[derive(Debug)]
pub struct PackageEntry<'p> {
    pub source: &'p SourcePackage,
    pub callables: Vec<usize>,
    pub types: Vec<usize>,
    pub values: Vec<usize>,
    /// Analyzed packages imported by any file of this package.
    pub deps: BTreeSet<usize>,
    scope: HashMap<String, Member>,
    /// Per file: import name to package.
    imports: Vec<HashMap<String, usize>>,
    /// Per file: dot-imported packages.
    dot_imports: Vec<Vec<usize>>,
}

impl<'p> PackageEntry<'p> {
    fn new(source: &'p SourcePackage) -> Self {
        Self {
            source,
            callables: Vec::new(),
            types: Vec::new(),
            values: Vec::new(),
            deps: BTreeSet::new(),
            scope: HashMap::new(),
            imports: vec![HashMap::new(); source.files.len()],
            dot_imports: vec![Vec::new(); source.files.len()],
        }
    }
}

/// Read-only view of the whole program.
#[derive(Debug)]
pub struct ProgramIndex<'p> {
    pub program: &'p Program,
    pub packages: Vec<PackageEntry<'p>>,
    pub callables: Vec<CallableEntry<'p>>,
    pub types: Vec<TypeEntry<'p>>,
    pub values: Vec<ValueEntry<'p>>,
    by_path: HashMap<&'p str, usize>,
    callable_by_qn: HashMap<String, usize>,
}

/// Append `#n` to the second and later uses of a qualified name.
fn unique_name(seen: &mut HashMap<String, usize>, qualified_name: String) -> String {
    let count = seen.entry(qualified_name.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        qualified_name
    } else {
        format!("{}#{}", qualified_name, count)
    }
}

impl<'p> ProgramIndex<'p> {
    pub fn build(program: &'p Program) -> Self {
        let mut index = ProgramIndex {
            program,
            packages: Vec::with_capacity(program.packages.len()),
            callables: Vec::new(),
            types: Vec::new(),
            values: Vec::new(),
            by_path: program
                .packages
                .iter()
                .enumerate()
                .map(|(i, p)| (p.path.as_str(), i))
                .collect(),
            callable_by_qn: HashMap::new(),
        };

        for (pi, pkg) in program.packages.iter().enumerate() {
            let entry = index.declare_package(pi, pkg);
            index.packages.push(entry);
        }
        index.link_imports();
        index
    }

    fn declare_package(&mut self, pi: usize, pkg: &'p SourcePackage) -> PackageEntry<'p> {
        let mut entry = PackageEntry::new(pkg);
        let mut type_names = HashMap::new();
        let mut callable_names = HashMap::new();
        let mut value_names = HashMap::new();

        // Types first so that methods in any file find their receiver.
        for (fi, file) in pkg.files.iter().enumerate() {
            let loc = Loc { pkg: pi, file: fi };
            for fact in &file.types {
                let qn = unique_name(&mut type_names, format!("{}.{}", pkg.path, fact.name));
                let idx = self.types.len();
                self.types.push(TypeEntry {
                    qualified_name: qn,
                    loc,
                    fact,
                    methods: BTreeMap::new(),
                });
                entry.types.push(idx);
                entry.scope.entry(fact.name.clone()).or_insert(Member::Type(idx));
            }
        }

        for (fi, file) in pkg.files.iter().enumerate() {
            let loc = Loc { pkg: pi, file: fi };
            for fact in &file.functions {
                let (qn, receiver) = match &fact.receiver {
                    Some(recv) => {
                        let owner = match entry.scope.get(&recv.type_name) {
                            Some(Member::Type(t)) => Some(*t),
                            _ => None,
                        };
                        let qn = format!("{}.{}.{}", pkg.path, recv.type_name, fact.name);
                        (qn, owner)
                    }
                    None => (format!("{}.{}", pkg.path, fact.name), None),
                };
                let qn = unique_name(&mut callable_names, qn);
                let idx = self.callables.len();
                self.callable_by_qn.insert(qn.clone(), idx);
                self.callables.push(CallableEntry {
                    qualified_name: qn,
                    loc,
                    fact,
                    receiver,
                });
                entry.callables.push(idx);

                match receiver {
                    Some(t) => {
                        self.types[t].methods.entry(fact.name.clone()).or_insert(idx);
                    }
                    None if fact.receiver.is_none() && fact.name != "init" => {
                        entry.scope.entry(fact.name.clone()).or_insert(Member::Func(idx));
                    }
                    None => {}
                }
            }

            let values = file
                .variables
                .iter()
                .map(|v| (v, false))
                .chain(file.constants.iter().map(|c| (c, true)));
            for (fact, constant) in values {
                let qn = unique_name(&mut value_names, format!("{}.{}", pkg.path, fact.name));
                let key = qn[pkg.path.len() + 1..].to_string();
                let idx = self.values.len();
                self.values.push(ValueEntry {
                    qualified_name: qn,
                    key,
                    loc,
                    fact,
                    constant,
                });
                entry.values.push(idx);
                if fact.name != "_" {
                    entry.scope.entry(fact.name.clone()).or_insert(Member::Value(idx));
                }
            }
        }

        entry
    }

    fn link_imports(&mut self) {
        for pi in 0..self.packages.len() {
            let source = self.packages[pi].source;
            for (fi, file) in source.files.iter().enumerate() {
                for import in &file.imports {
                    let Some(&target) = self.by_path.get(import.path.as_str()) else {
                        continue;
                    };
                    let default_name = &self.program.packages[target].name;
                    let entry = &mut self.packages[pi];
                    entry.deps.insert(target);
                    match import.alias.as_deref() {
                        Some("_") => {}
                        Some(".") => entry.dot_imports[fi].push(target),
                        Some(alias) => {
                            entry.imports[fi].insert(alias.to_string(), target);
                        }
                        None => {
                            entry.imports[fi].insert(default_name.clone(), target);
                        }
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn package_index(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    pub fn callable_index(&self, qualified_name: &str) -> Option<usize> {
        self.callable_by_qn.get(qualified_name).copied()
    }

    pub fn file(&self, loc: Loc) -> &'p FileFacts {
        &self.packages[loc.pkg].source.files[loc.file]
    }

    pub fn package_path(&self, pkg: usize) -> &'p str {
        &self.packages[pkg].source.path
    }

    /// Whether a package is a program: named `main` with a `main` function.
    pub fn is_main_package(&self, pkg: usize) -> bool {
        let entry = &self.packages[pkg];
        entry.source.name == "main" && matches!(entry.scope.get("main"), Some(Member::Func(_)))
    }

    /// `init` functions of a package in declaration order.
    pub fn init_functions(&self, pkg: usize) -> Vec<usize> {
        self.packages[pkg]
            .callables
            .iter()
            .copied()
            .filter(|&c| {
                let fact = self.callables[c].fact;
                fact.receiver.is_none() && fact.name == "init"
            })
            .collect()
    }

    /// The `main` function of a program package.
    pub fn main_function(&self, pkg: usize) -> Option<usize> {
        if !self.is_main_package(pkg) {
            return None;
        }
        match self.packages[pkg].scope.get("main") {
            Some(Member::Func(c)) => Some(*c),
            _ => None,
        }
    }

    /// Packages reachable from `roots` through analyzed imports.
    pub fn import_closure(&self, roots: &[usize]) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = roots.to_vec();
        while let Some(pkg) = stack.pop() {
            if seen.insert(pkg) {
                stack.extend(self.packages[pkg].deps.iter().copied());
            }
        }
        seen
    }

    fn lookup_member(&self, name: &str, loc: Loc) -> Option<Member> {
        let entry = &self.packages[loc.pkg];
        if let Some(member) = entry.scope.get(name) {
            return Some(*member);
        }
        entry.dot_imports[loc.file]
            .iter()
            .find_map(|&p| self.packages[p].scope.get(name).copied())
    }

    fn import_target(&self, name: &str, loc: Loc) -> Option<usize> {
        self.packages[loc.pkg].imports[loc.file].get(name).copied()
    }

    fn is_local(scope: Scope, name: &str) -> bool {
        scope.binding(name).is_some()
    }

    /// The package an identifier names, unless a local shadows it.
    fn package_qualifier(&self, base: &ExprFact, scope: Scope) -> Option<usize> {
        match base {
            ExprFact::Ident(name) if !Self::is_local(scope, name) => {
                self.import_target(name, scope.loc)
            }
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Types
    // -------------------------------------------------------------------------

    /// Resolve type text to a declared type, following aliases.
    pub fn resolve_type(&self, tr: &TypeRef) -> Option<usize> {
        self.resolve_type_at(&tr.text, tr.loc, 0)
    }

    fn resolve_type_at(&self, text: &str, loc: Loc, depth: usize) -> Option<usize> {
        if depth > MAX_DEPTH {
            return None;
        }
        let name = named_type_text(text)?;
        let idx = match name.split_once('.') {
            Some((qualifier, local)) => {
                let pkg = self.import_target(qualifier, loc)?;
                match self.packages[pkg].scope.get(local)? {
                    Member::Type(t) => *t,
                    _ => return None,
                }
            }
            None => match self.lookup_member(name, loc)? {
                Member::Type(t) => t,
                _ => return None,
            },
        };

        let entry = &self.types[idx];
        if entry.fact.shape == TypeShape::Alias {
            return self.resolve_type_at(&entry.fact.underlying, entry.loc, depth + 1);
        }
        Some(idx)
    }

    /// Element type of an indexable or rangeable type.
    pub fn element(&self, tr: &TypeRef) -> Option<TypeRef> {
        self.element_at(&tr.text, tr.loc, 0)
    }

    fn element_at(&self, text: &str, loc: Loc, depth: usize) -> Option<TypeRef> {
        if depth > MAX_DEPTH {
            return None;
        }
        let t = text.trim().trim_start_matches('*').trim();
        if let Some(rest) = t.strip_prefix("map[") {
            let close = closing_bracket(rest)?;
            return Some(TypeRef::new(rest[close + 1..].trim(), loc));
        }
        if let Some(rest) = t.strip_prefix('[') {
            let close = closing_bracket(rest)?;
            return Some(TypeRef::new(rest[close + 1..].trim(), loc));
        }
        for prefix in ["<-chan", "chan<-", "chan"] {
            if let Some(rest) = t.strip_prefix(prefix) {
                return Some(TypeRef::new(rest.trim(), loc));
            }
        }

        let idx = self.resolve_type_at(t, loc, depth + 1)?;
        let entry = &self.types[idx];
        match entry.fact.shape {
            TypeShape::Named => self.element_at(&entry.fact.underlying, entry.loc, depth + 1),
            _ => None,
        }
    }

    fn field_type(&self, owner: &TypeRef, field: &str, depth: usize) -> Option<TypeRef> {
        let idx = self.resolve_type_at(&owner.text, owner.loc, depth)?;
        self.field_of_type(idx, field, depth)
    }

    fn field_of_type(&self, idx: usize, field: &str, depth: usize) -> Option<TypeRef> {
        if depth > MAX_DEPTH {
            return None;
        }
        let entry = &self.types[idx];
        match entry.fact.shape {
            TypeShape::Struct => {
                if let Some(f) = entry.fact.fields.iter().find(|f| f.name == field) {
                    return Some(TypeRef::new(f.type_text.as_str(), entry.loc));
                }
                entry
                    .fact
                    .fields
                    .iter()
                    .filter(|f| f.embedded)
                    .find_map(|f| {
                        let inner = self.resolve_type_at(&f.type_text, entry.loc, depth + 1)?;
                        self.field_of_type(inner, field, depth + 1)
                    })
            }
            TypeShape::Named => {
                let inner = self.resolve_type_at(&entry.fact.underlying, entry.loc, depth + 1)?;
                self.field_of_type(inner, field, depth + 1)
            }
            _ => None,
        }
    }

    fn value_type(&self, idx: usize, depth: usize) -> Option<TypeRef> {
        let entry = &self.values[idx];
        if let Some(t) = &entry.fact.type_text {
            return Some(TypeRef::new(t.as_str(), entry.loc));
        }
        let expr = entry.fact.value_expr.as_ref()?;
        self.type_of_at(expr, Scope::package(entry.loc), depth)
    }

    /// Static type of an expression, as far as it can be followed.
    pub fn type_of(&self, expr: &ExprFact, scope: Scope) -> Option<TypeRef> {
        self.type_of_at(expr, scope, 0)
    }

    fn type_of_at(&self, expr: &ExprFact, scope: Scope, depth: usize) -> Option<TypeRef> {
        if depth > MAX_DEPTH {
            return None;
        }
        let loc = scope.loc;
        match expr {
            ExprFact::Ident(name) => {
                if let Some(binding) = scope.binding(name) {
                    if let Some(declared) = &binding.declared {
                        return Some(TypeRef::new(declared.as_str(), loc));
                    }
                    let value = binding.value.as_ref()?;
                    let at_declaration = Scope {
                        at: binding.declared_at,
                        ..scope
                    };
                    return self.type_of_at(value, at_declaration, depth + 1);
                }
                match self.lookup_member(name, loc)? {
                    Member::Value(v) => self.value_type(v, depth + 1),
                    _ => None,
                }
            }
            ExprFact::Selector(base, field) => {
                if let Some(pkg) = self.package_qualifier(base, scope) {
                    return match self.packages[pkg].scope.get(field.as_str())? {
                        Member::Value(v) => self.value_type(*v, depth + 1),
                        _ => None,
                    };
                }
                let owner = self.type_of_at(base, scope, depth + 1)?;
                self.field_type(&owner, field, depth + 1)
            }
            ExprFact::Call(callee, n) => self.call_result(callee, *n, scope, depth + 1),
            ExprFact::Composite(text) => Some(TypeRef::new(text.as_str(), loc)),
            ExprFact::AddressOf(inner) => self
                .type_of_at(inner, scope, depth + 1)
                .map(|t| TypeRef::new(format!("*{}", t.text), t.loc)),
            ExprFact::Deref(inner) => self.type_of_at(inner, scope, depth + 1).map(|t| {
                let text = t.text.trim_start();
                let text = text.strip_prefix('*').unwrap_or(text).to_string();
                TypeRef::new(text, t.loc)
            }),
            ExprFact::Index(inner) => {
                let container = self.type_of_at(inner, scope, depth + 1)?;
                self.element_at(&container.text, container.loc, depth + 1)
            }
            ExprFact::Assert(text) => Some(TypeRef::new(text.as_str(), loc)),
            ExprFact::FuncLit | ExprFact::Other => None,
        }
    }

    /// Type text a callee names when the call is a conversion `T(x)`.
    fn conversion_type(&self, callee: &ExprFact, scope: Scope) -> Option<TypeRef> {
        let text = match callee {
            ExprFact::Ident(name) if !Self::is_local(scope, name) => name.clone(),
            ExprFact::Selector(base, name) => match base.as_ref() {
                ExprFact::Ident(q) if self.package_qualifier(base, scope).is_some() => {
                    format!("{}.{}", q, name)
                }
                _ => return None,
            },
            _ => return None,
        };
        self.resolve_type_at(&text, scope.loc, 0)?;
        Some(TypeRef::new(text, scope.loc))
    }

    /// The type a call converts to, when the callee names a type.
    pub fn conversion(&self, callee: &ExprFact, scope: Scope) -> Option<usize> {
        let converted = self.conversion_type(callee, scope)?;
        self.resolve_type(&converted)
    }

    fn call_result(&self, callee: &ExprFact, n: usize, scope: Scope, depth: usize) -> Option<TypeRef> {
        if let Some(converted) = self.conversion_type(callee, scope) {
            return Some(converted);
        }
        match self.resolve_call_at(callee, scope, depth)? {
            Target::Static(c) => {
                let entry = &self.callables[c];
                let result = entry.fact.results.get(n)?;
                Some(TypeRef::new(result.type_text.as_str(), entry.loc))
            }
            Target::Dynamic { iface, method } => {
                let (fact, loc) = self
                    .interface_methods(iface)
                    .into_iter()
                    .find(|(m, _)| m.name == method)?;
                let result = fact.results.get(n)?;
                Some(TypeRef::new(result.type_text.as_str(), loc))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    /// Resolve the callee of a call expression.
    pub fn resolve_call(&self, callee: &ExprFact, scope: Scope) -> Option<Target> {
        self.resolve_call_at(callee, scope, 0)
    }

    fn resolve_call_at(&self, callee: &ExprFact, scope: Scope, depth: usize) -> Option<Target> {
        if depth > MAX_DEPTH {
            return None;
        }
        match callee {
            ExprFact::Ident(name) => {
                if Self::is_local(scope, name) {
                    return None;
                }
                match self.lookup_member(name, scope.loc)? {
                    Member::Func(c) => Some(Target::Static(c)),
                    _ => None,
                }
            }
            ExprFact::Selector(base, method) => {
                if let Some(pkg) = self.package_qualifier(base, scope) {
                    return match self.packages[pkg].scope.get(method.as_str())? {
                        Member::Func(c) => Some(Target::Static(*c)),
                        _ => None,
                    };
                }
                // Method expression `T.Method`
                if let ExprFact::Ident(name) = base.as_ref() {
                    if !Self::is_local(scope, name) {
                        if let Some(Member::Type(t)) = self.lookup_member(name, scope.loc) {
                            return self.method_target(t, method, depth + 1);
                        }
                    }
                }
                let receiver = self.type_of_at(base, scope, depth + 1)?;
                let t = self.resolve_type_at(&receiver.text, receiver.loc, depth + 1)?;
                self.method_target(t, method, depth + 1)
            }
            // Explicit instantiation `Map[int](xs)`
            ExprFact::Index(inner) => match self.resolve_call_at(inner, scope, depth + 1)? {
                Target::Static(c) => Some(Target::Static(c)),
                Target::Dynamic { .. } => None,
            },
            _ => None,
        }
    }

    /// The method `name` on type `t`, including promoted methods.
    fn method_target(&self, t: usize, name: &str, depth: usize) -> Option<Target> {
        if depth > MAX_DEPTH {
            return None;
        }
        let entry = &self.types[t];
        if entry.fact.shape == TypeShape::Interface {
            return self
                .interface_methods(t)
                .iter()
                .any(|(m, _)| m.name == name)
                .then(|| Target::Dynamic {
                    iface: t,
                    method: name.to_string(),
                });
        }
        if let Some(&c) = entry.methods.get(name) {
            return Some(Target::Static(c));
        }
        if entry.fact.shape != TypeShape::Struct {
            return None;
        }
        entry
            .fact
            .fields
            .iter()
            .filter(|f| f.embedded)
            .find_map(|f| {
                let inner = self.resolve_type_at(&f.type_text, entry.loc, depth + 1)?;
                self.method_target(inner, name, depth + 1)
            })
    }

    /// Resolve an expression used as a function value (`http.HandleFunc("/",
    /// handle)`), yielding the callable it names.
    pub fn resolve_function_value(&self, expr: &ExprFact, scope: Scope) -> Option<usize> {
        match self.resolve_call(expr, scope)? {
            Target::Static(c) => Some(c),
            Target::Dynamic { .. } => None,
        }
    }

    // -------------------------------------------------------------------------
    // Method sets and interfaces
    // -------------------------------------------------------------------------

    /// Methods of an interface, including those of embedded interfaces.
    /// The first declaration of a name wins.
    pub fn interface_methods(&self, iface: usize) -> Vec<(&'p InterfaceMethodFact, Loc)> {
        let mut out: Vec<(&'p InterfaceMethodFact, Loc)> = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![iface];
        while let Some(t) = stack.pop() {
            if !visited.insert(t) {
                continue;
            }
            let loc = self.types[t].loc;
            let fact: &'p TypeFact = self.types[t].fact;
            if fact.shape != TypeShape::Interface {
                continue;
            }
            for method in &fact.interface_methods {
                if !out.iter().any(|(m, _)| m.name == method.name) {
                    out.push((method, loc));
                }
            }
            for embedded in fact.embedded_interfaces.iter().rev() {
                if let Some(inner) = self.resolve_type_at(embedded, loc, 0) {
                    stack.push(inner);
                }
            }
        }
        out
    }

    /// Concrete methods of a type by name, including methods promoted
    /// through embedded fields. Declared methods shadow promoted ones.
    pub fn method_set(&self, t: usize) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        self.collect_method_set(t, 0, &mut HashSet::new(), &mut out);
        out
    }

    fn collect_method_set(
        &self,
        t: usize,
        depth: usize,
        visited: &mut HashSet<usize>,
        out: &mut BTreeMap<String, usize>,
    ) {
        if depth > MAX_DEPTH || !visited.insert(t) {
            return;
        }
        let entry = &self.types[t];
        for (name, &c) in &entry.methods {
            out.entry(name.clone()).or_insert(c);
        }
        if entry.fact.shape != TypeShape::Struct {
            return;
        }
        for field in entry.fact.fields.iter().filter(|f| f.embedded) {
            if let Some(inner) = self.resolve_type_at(&field.type_text, entry.loc, 0) {
                self.collect_method_set(inner, depth + 1, visited, out);
            }
        }
    }

    /// Interfaces embedded in struct `t`, directly or through embedded
    /// structs, in field order.
    pub fn embedded_interfaces(&self, t: usize) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_embedded_interfaces(t, 0, &mut HashSet::new(), &mut out);
        out
    }

    fn collect_embedded_interfaces(
        &self,
        t: usize,
        depth: usize,
        visited: &mut HashSet<usize>,
        out: &mut Vec<usize>,
    ) {
        if depth > MAX_DEPTH || !visited.insert(t) {
            return;
        }
        let entry = &self.types[t];
        if entry.fact.shape != TypeShape::Struct {
            return;
        }
        for field in entry.fact.fields.iter().filter(|f| f.embedded) {
            let Some(inner) = self.resolve_type_at(&field.type_text, entry.loc, 0) else {
                continue;
            };
            if self.types[inner].fact.shape == TypeShape::Interface {
                if !out.contains(&inner) {
                    out.push(inner);
                }
            } else {
                self.collect_embedded_interfaces(inner, depth + 1, visited, out);
            }
        }
    }

    /// The embedded interface through which struct `t` gets method `name`.
    /// Only consulted when `t` has no concrete method of that name.
    pub fn promoted_interface(&self, t: usize, name: &str) -> Option<(usize, &'p InterfaceMethodFact)> {
        self.embedded_interfaces(t).into_iter().find_map(|e| {
            self.interface_methods(e)
                .into_iter()
                .find(|(m, _)| m.name == name)
                .map(|(m, _)| (e, m))
        })
    }

    /// Whether concrete type `t` provides every method of `iface` with a
    /// matching signature, either directly or through an embedded
    /// interface. Receiver indirection is ignored.
    pub fn implements(&self, t: usize, iface: usize) -> bool {
        if self.types[t].fact.shape == TypeShape::Interface {
            return false;
        }
        let required = self.interface_methods(iface);
        if required.is_empty() {
            return false;
        }
        let provided = self.method_set(t);
        required.iter().all(|(m, _)| {
            let wanted = signature_key(&m.params, &m.results);
            match provided.get(&m.name) {
                Some(&c) => {
                    let fact = self.callables[c].fact;
                    signature_key(&fact.params, &fact.results) == wanted
                }
                None => self
                    .promoted_interface(t, &m.name)
                    .is_some_and(|(_, p)| signature_key(&p.params, &p.results) == wanted),
            }
        })
    }
}

/// Comparable form of a parameter/result list. Package qualifiers and
/// whitespace are dropped so that `b.Item` declared in package `a` matches
/// `Item` declared in package `b`.
pub fn signature_key(params: &[ParamFact], results: &[ParamFact]) -> String {
    let list = |items: &[ParamFact]| {
        items
            .iter()
            .map(|p| normalize_type(&p.display_type()))
            .collect::<Vec<_>>()
            .join(",")
    };
    format!("({})({})", list(params), list(results))
}

fn normalize_type(text: &str) -> String {
    let unqualified = QUALIFIER.replace_all(text, "");
    WHITESPACE.replace_all(&unqualified, "").into_owned()
}

/// `*pkg.Name[T]` -> `pkg.Name`; `None` for composite type literals.
fn named_type_text(text: &str) -> Option<&str> {
    let mut t = text.trim();
    loop {
        let mut next = t.trim_start_matches('*').trim();
        if next.starts_with('(') && next.ends_with(')') {
            next = next[1..next.len() - 1].trim();
        }
        if next == t {
            break;
        }
        t = next;
    }
    let t = t.split('[').next().unwrap_or("").trim();
    let valid = !t.is_empty() && t.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    valid.then_some(t)
}

/// Index of the `]` closing a bracket whose `[` was already consumed.
fn closing_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' if depth == 0 => return Some(i),
            ']' => depth -= 1,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::{get_analyzer, LanguageAnalyzer};
    use std::path::Path;

    /// Build a program from `(package path, [(file name, source)])`.
    pub(crate) fn program(packages: &[(&str, &[(&str, &str)])]) -> Program {
        let analyzer = get_analyzer("go").unwrap();
        let packages = packages
            .iter()
            .map(|(path, files)| {
                let files: Vec<FileFacts> = files
                    .iter()
                    .map(|(name, source)| {
                        let parsed = analyzer.parse(Path::new(name), source.as_bytes()).unwrap();
                        let mut facts = analyzer.extract_facts(&parsed).unwrap();
                        facts.path = format!("{}/{}", path, name);
                        facts
                    })
                    .collect();
                SourcePackage {
                    path: path.to_string(),
                    name: files[0].package.clone().unwrap_or_default(),
                    dir: path.to_string(),
                    files,
                }
            })
            .collect();
        Program {
            root: std::path::PathBuf::from("/project"),
            modules: Vec::new(),
            packages,
            issues: Vec::new(),
        }
    }

    fn callable<'a>(index: &'a ProgramIndex, qn: &str) -> &'a CallableEntry<'a> {
        &index.callables[index.callable_index(qn).unwrap()]
    }

    fn targets(index: &ProgramIndex, qn: &str) -> Vec<String> {
        let entry = callable(index, qn);
        let body = entry.fact.body.as_ref().unwrap();
        body.calls
            .iter()
            .filter_map(|call| {
                let scope = Scope::body(entry.loc, body, call.span.start_byte);
                index.resolve_call(&call.callee, scope)
            })
            .map(|t| match t {
                Target::Static(c) => index.callables[c].qualified_name.clone(),
                Target::Dynamic { iface, method } => {
                    format!("dyn {}.{}", index.types[iface].qualified_name, method)
                }
            })
            .collect()
    }

    const SHAPES: &str = r#"package shapes

type Shape interface {
	Area() float64
}

type Square struct{ Side float64 }

func (s Square) Area() float64 { return s.Side * s.Side }

type Circle struct{ R float64 }

func (c *Circle) Area() float64 { return 3 * c.R * c.R }

type Labeled struct {
	*Circle
	Label string
}

func New(side float64) *Square { return &Square{Side: side} }
"#;

    const APP: &str = r#"package main

import (
	"fmt"
	geo "example.com/shapes"
)

type Registry struct {
	items []geo.Shape
	byName map[string]*geo.Square
}

func (r *Registry) Total() float64 {
	total := 0.0
	for _, s := range r.items {
		total += s.Area()
	}
	return total
}

func main() {
	sq := geo.New(2)
	sq.Area()
	r := &Registry{}
	r.Total()
	r.byName["x"].Area()
	fmt.Println(r.Total())
	var s geo.Shape = sq
	s.Area()
	helper()
}

func helper() {}
"#;

    fn shapes_program() -> Program {
        program(&[
            ("example.com/app", &[("main.go", APP)]),
            ("example.com/shapes", &[("shapes.go", SHAPES)]),
        ])
    }

    #[test]
    fn test_qualified_names() {
        let program = shapes_program();
        let index = ProgramIndex::build(&program);
        assert!(index.callable_index("example.com/shapes.Square.Area").is_some());
        assert!(index.callable_index("example.com/shapes.Circle.Area").is_some());
        assert!(index.callable_index("example.com/app.Registry.Total").is_some());
        assert!(index.callable_index("example.com/app.main").is_some());
        assert!(index.is_main_package(index.package_index("example.com/app").unwrap()));
    }

    #[test]
    fn test_resolve_calls_in_body() {
        let program = shapes_program();
        let index = ProgramIndex::build(&program);
        let resolved = targets(&index, "example.com/app.main");
        assert_eq!(
            resolved,
            vec![
                "example.com/shapes.New",
                "example.com/shapes.Square.Area",
                "example.com/app.Registry.Total",
                "example.com/shapes.Square.Area",
                "example.com/app.Registry.Total",
                "dyn example.com/shapes.Shape.Area",
                "example.com/app.helper",
            ]
        );
    }

    #[test]
    fn test_range_over_interface_slice() {
        let program = shapes_program();
        let index = ProgramIndex::build(&program);
        let resolved = targets(&index, "example.com/app.Registry.Total");
        assert_eq!(resolved, vec!["dyn example.com/shapes.Shape.Area"]);
    }

    #[test]
    fn test_implements_and_promotion() {
        let program = shapes_program();
        let index = ProgramIndex::build(&program);
        let ty = |name: &str| {
            index
                .types
                .iter()
                .position(|t| t.qualified_name == name)
                .unwrap()
        };
        let shape = ty("example.com/shapes.Shape");
        assert!(index.implements(ty("example.com/shapes.Square"), shape));
        assert!(index.implements(ty("example.com/shapes.Circle"), shape));
        assert!(index.implements(ty("example.com/shapes.Labeled"), shape));
        assert!(!index.implements(ty("example.com/app.Registry"), shape));
        assert_eq!(
            index.method_set(ty("example.com/shapes.Labeled")).get("Area").copied(),
            index.callable_index("example.com/shapes.Circle.Area")
        );
    }

    #[test]
    fn test_embedded_interface_satisfies_interface() {
        let source = r#"package main

type Logger interface {
	Log(msg string)
}

type Store interface {
	Logger
	Get(key string) string
}

type quiet struct{ Logger }

type cache struct {
	quiet
}

func (cache) Get(key string) string { return key }
"#;
        let program = program(&[("app", &[("main.go", source)])]);
        let index = ProgramIndex::build(&program);
        let ty = |name: &str| {
            index
                .types
                .iter()
                .position(|t| t.qualified_name == name)
                .unwrap()
        };

        assert_eq!(index.embedded_interfaces(ty("app.cache")), vec![ty("app.Logger")]);
        assert!(index.implements(ty("app.quiet"), ty("app.Logger")));
        assert!(!index.implements(ty("app.quiet"), ty("app.Store")));
        assert!(index.implements(ty("app.cache"), ty("app.Store")));
        let (via, method) = index.promoted_interface(ty("app.cache"), "Log").unwrap();
        assert_eq!(via, ty("app.Logger"));
        assert_eq!(method.name, "Log");
    }

    #[test]
    fn test_duplicate_init_names() {
        let program = program(&[(
            "p",
            &[
                ("a.go", "package p\n\nfunc init() {}\n"),
                ("b.go", "package p\n\nfunc init() {}\n"),
            ],
        )]);
        let index = ProgramIndex::build(&program);
        assert!(index.callable_index("p.init").is_some());
        assert!(index.callable_index("p.init#2").is_some());
        assert_eq!(index.init_functions(0).len(), 2);
    }

    #[test]
    fn test_signature_key_ignores_qualifiers() {
        let param = |t: &str| ParamFact {
            name: None,
            type_text: t.to_string(),
            variadic: false,
        };
        assert_eq!(
            signature_key(&[param("store.Item")], &[param("error")]),
            signature_key(&[param("Item")], &[param("error")])
        );
        assert_ne!(
            signature_key(&[param("int")], &[]),
            signature_key(&[param("int64")], &[])
        );
    }

    #[test]
    fn test_type_text_helpers() {
        assert_eq!(named_type_text("*pkg.List[T]"), Some("pkg.List"));
        assert_eq!(named_type_text("(*Node)"), Some("Node"));
        assert_eq!(named_type_text("[]Node"), None);
        assert_eq!(named_type_text("func() error"), None);
        assert_eq!(closing_bracket("string][]int"), Some(6));
    }
}
