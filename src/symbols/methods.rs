//! Interface method lists and method-to-struct association.

use std::collections::{BTreeMap, HashMap};

use crate::analysis::{ParamFact, TypeFact};
use crate::model::{CallableDeclaration, CallableKind, InterfaceMethod, TypeDeclaration, TypeKind};

use super::builder::{non_empty, parameter, params_and_results};

/// One entry per method listed in an interface body, in source order.
/// Methods inherited from embedded interfaces are reported through
/// `embedded_types`, not repeated here.
pub fn interface_methods(fact: &TypeFact) -> Vec<InterfaceMethod> {
    fact.interface_methods
        .iter()
        .map(|m| InterfaceMethod {
            name: m.name.clone(),
            signature: format!("{}{}", m.name, params_and_results(&m.params, &m.results)),
            parameters: m.params.iter().map(parameter).collect(),
            results: m.results.iter().map(ParamFact::display_type).collect(),
            documentation: non_empty(&m.doc),
        })
        .collect()
}

/// Attach each method in `callables` to the struct its receiver names.
///
/// Pointer and value receivers land on the same struct. Methods on
/// non-struct types stay in the package callable map only.
pub fn link_methods(
    types: &mut BTreeMap<String, TypeDeclaration>,
    callables: &BTreeMap<String, CallableDeclaration>,
) {
    let by_name: HashMap<String, String> = types
        .values()
        .filter(|t| t.kind == TypeKind::Struct)
        .map(|t| (t.name.clone(), t.qualified_name.clone()))
        .collect();

    for method in callables.values().filter(|c| c.kind == CallableKind::Method) {
        let Some(receiver) = method.receiver_type.as_deref() else {
            continue;
        };
        let Some(owner) = by_name.get(receiver) else {
            continue;
        };
        if let Some(methods) = types.get_mut(owner).and_then(|t| t.methods.as_mut()) {
            methods.insert(method.qualified_name.clone(), method.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::get_analyzer;
    use crate::model::PositionMode;
    use crate::symbols::{build_symbol_table, index::tests::program, ProgramIndex, SymbolOptions};

    const SOURCE: &str = r#"package calc

// Calculator performs arithmetic.
type Calculator interface {
	// Add returns a + b.
	Add(a, b int) int
	Multiply(a, b int) int // Multiply returns a * b.
}

type Basic struct{}

func (Basic) Add(a, b int) int { return a + b }

func (b *Basic) Multiply(a, c int) int { return a * c }

type Celsius float64

func (c Celsius) String() string { return "" }
"#;

    fn table() -> crate::model::SymbolTable {
        let program = program(&[("calc", &[("calc.go", SOURCE)])]);
        let index = ProgramIndex::build(&program);
        let options = SymbolOptions {
            positions: PositionMode::None,
            include_body: false,
            max_call_examples: None,
        };
        build_symbol_table(&index, get_analyzer("go").unwrap(), &options)
    }

    #[test]
    fn test_interface_methods_in_order_with_docs() {
        let table = table();
        let iface = &table.packages["calc"].type_declarations["calc.Calculator"];
        let methods = iface.interface_methods.as_ref().unwrap();
        let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Add", "Multiply"]);
        assert_eq!(methods[0].signature, "Add(int, int) int");
        assert!(methods[0].documentation.as_deref().unwrap().contains("a + b"));
        assert!(methods[1].documentation.as_deref().unwrap().contains("a * b"));
        assert!(iface.methods.is_none());
        assert!(iface.fields.is_none());
    }

    #[test]
    fn test_pointer_and_value_receivers_link_to_struct() {
        let table = table();
        let pkg = &table.packages["calc"];
        let basic = &pkg.type_declarations["calc.Basic"];
        let linked: Vec<&String> = basic.methods.as_ref().unwrap().keys().collect();
        assert_eq!(linked, vec!["calc.Basic.Add", "calc.Basic.Multiply"]);
        assert!(pkg.callable_declarations.contains_key("calc.Basic.Multiply"));
        assert!(basic.interface_methods.is_none());
    }

    #[test]
    fn test_named_type_methods_stay_in_package_map() {
        let table = table();
        let pkg = &table.packages["calc"];
        let celsius = &pkg.type_declarations["calc.Celsius"];
        assert_eq!(celsius.kind, TypeKind::Named);
        assert!(celsius.methods.is_none());
        assert_eq!(celsius.underlying_type.as_deref(), Some("float64"));
        assert!(pkg.callable_declarations.contains_key("calc.Celsius.String"));
    }
}
