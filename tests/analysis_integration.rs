//! Integration tests for the analysis pipeline.
//!
//! These tests run the library end to end against the Go fixtures in
//! `testdata/` and scratch projects built in temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use codeanalyzer_go::model::{CallableKind, EdgeKind, Slot, TypeKind};
use codeanalyzer_go::report;
use codeanalyzer_go::{AnalysisLevel, AnalyzerConfig, CallGraphAlgorithm, PositionMode, Runner};
use tempfile::TempDir;

fn testdata_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn full(algorithm: CallGraphAlgorithm) -> Runner {
    Runner::new().level(AnalysisLevel::Full).algorithm(algorithm)
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_documented_function_is_extracted() {
    let output = Runner::new()
        .run(&testdata_path("sampleapp"))
        .expect("analysis should succeed");
    let table = output.symbol_table.expect("symbol table requested");
    let pkg = &table.packages["example.com/sampleapp"];

    let add = &pkg.callable_declarations["example.com/sampleapp.add"];
    assert_eq!(add.name, "add");
    assert_eq!(add.kind, CallableKind::Function);
    assert!(add.documentation.as_deref().unwrap().contains("sum"));
    assert_eq!(add.signature, "func add(int, int) int");
    assert!(add.call_examples.is_none());

    let max = &pkg.callable_declarations["example.com/sampleapp.Max"];
    assert!(max.exported);
}

#[test]
fn test_interface_methods_carry_docs() {
    let output = Runner::new().run(&testdata_path("sampleapp")).unwrap();
    let table = output.symbol_table.unwrap();
    let calc = &table.packages["example.com/sampleapp"].type_declarations
        ["example.com/sampleapp.Calculator"];

    assert_eq!(calc.kind, TypeKind::Interface);
    assert!(calc.fields.is_none());
    assert!(calc.methods.is_none());
    let methods = calc.interface_methods.as_ref().unwrap();
    let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Add", "Multiply"]);
    assert!(methods
        .iter()
        .all(|m| !m.documentation.as_deref().unwrap_or("").is_empty()));
}

#[test]
fn test_structural_invariants_hold() {
    let output = full(CallGraphAlgorithm::Cha)
        .run(&testdata_path("multipkg"))
        .unwrap();
    let table = output.symbol_table.unwrap();
    assert_eq!(table.packages.len(), 3);

    for (key, pkg) in &table.packages {
        assert_eq!(key, &pkg.path);
        for callable in pkg.callable_declarations.values() {
            assert_eq!(
                callable.kind == CallableKind::Method,
                callable.receiver_type.is_some(),
                "{}",
                callable.qualified_name
            );
        }
        for decl in pkg.type_declarations.values() {
            assert_eq!(decl.kind == TypeKind::Interface, decl.interface_methods.is_some());
            assert_eq!(decl.kind == TypeKind::Struct, decl.fields.is_some());
            assert_eq!(decl.kind == TypeKind::Struct, decl.methods.is_some());
        }
    }

    let square = &table.packages["example.com/multipkg/shapes"].type_declarations
        ["example.com/multipkg/shapes.Square"];
    let fields = square.fields.as_ref().unwrap();
    assert_eq!(fields[0].tag.as_deref(), Some("`json:\"side\"`"));
    assert!(square
        .methods
        .as_ref()
        .unwrap()
        .contains_key("example.com/multipkg/shapes.Square.Area"));
}

#[test]
fn test_rta_is_subset_of_cha() {
    let root = testdata_path("multipkg");
    let cha = full(CallGraphAlgorithm::Cha).run(&root).unwrap().call_graph.unwrap();
    let rta = full(CallGraphAlgorithm::Rta).run(&root).unwrap().call_graph.unwrap();

    let cha_edges: Vec<(String, String)> =
        cha.edges.iter().map(|e| (e.source.clone(), e.target.clone())).collect();
    for edge in &rta.edges {
        assert!(cha_edges.contains(&(edge.source.clone(), edge.target.clone())));
    }

    let circle = (
        "example.com/multipkg.describe".to_string(),
        "example.com/multipkg/shapes.Circle.Area".to_string(),
    );
    assert!(cha_edges.contains(&circle));
    assert!(!rta
        .edges
        .iter()
        .any(|e| e.source == circle.0 && e.target == circle.1));

    let rta_nodes: Vec<&str> = rta.nodes.iter().map(|n| n.id.as_str()).collect();
    assert!(rta_nodes.contains(&"example.com/multipkg/store.init"));
    assert!(rta_nodes.contains(&"example.com/multipkg/shapes.Square.Area"));
}

#[test]
fn test_package_variable_seeds_rta() {
    let graph = full(CallGraphAlgorithm::Rta)
        .run(&testdata_path("sampleapp"))
        .unwrap()
        .call_graph
        .unwrap();

    let targets: Vec<&str> = graph
        .edges
        .iter()
        .filter(|e| e.source == "example.com/sampleapp.report")
        .map(|e| e.target.as_str())
        .collect();
    assert!(targets.contains(&"example.com/sampleapp.basicCalc.Add"));
    assert!(targets.contains(&"example.com/sampleapp.basicCalc.Multiply"));
    assert!(!targets.contains(&"example.com/sampleapp.scientificCalc.Add"));

    let cleanup = graph
        .edges
        .iter()
        .find(|e| e.target == "example.com/sampleapp.cleanup")
        .unwrap();
    assert_eq!(cleanup.kind, EdgeKind::Defer);
}

#[test]
fn test_library_without_main_has_null_call_graph() {
    let output = full(CallGraphAlgorithm::Rta)
        .run(&testdata_path("library"))
        .unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&report::render(&output, false).unwrap()).unwrap();
    assert!(json["call_graph"].is_null());
    assert!(json["symbol_table"].is_object());

    assert!(output.call_graph.is_none());
    let table = output.symbol_table.unwrap();
    assert!(table.packages["example.com/library"]
        .callable_declarations
        .contains_key("example.com/library.Words"));
}

#[test]
fn test_include_body_adds_call_examples() {
    let output = Runner::new()
        .include_body(true)
        .run(&testdata_path("sampleapp"))
        .unwrap();
    let table = output.symbol_table.unwrap();
    let pkg = &table.packages["example.com/sampleapp"];

    let add = pkg.callable_declarations["example.com/sampleapp.add"]
        .call_examples
        .as_ref()
        .unwrap();
    assert!(add.iter().any(|e| e.contains("example.com/sampleapp.main")));
    assert!(add.iter().any(|e| e.contains("basicCalc.Add")));

    let max = pkg.callable_declarations["example.com/sampleapp.Max"]
        .call_examples
        .as_ref()
        .unwrap();
    assert!(max.is_empty());
}

#[test]
fn test_max_call_examples_from_config() {
    let config = AnalyzerConfig {
        max_call_examples: Some(1),
        ..Default::default()
    };
    let output = Runner::new()
        .include_body(true)
        .config(config)
        .run(&testdata_path("sampleapp"))
        .unwrap();
    let table = output.symbol_table.unwrap();
    let add = &table.packages["example.com/sampleapp"].callable_declarations
        ["example.com/sampleapp.add"];
    assert_eq!(add.call_examples.as_ref().unwrap().len(), 1);
}

#[test]
fn test_position_modes() {
    let root = testdata_path("sampleapp");
    let qn = "example.com/sampleapp.add";

    let run = |mode: PositionMode| {
        let table = Runner::new().positions(mode).run(&root).unwrap().symbol_table.unwrap();
        table.packages["example.com/sampleapp"].callable_declarations[qn]
            .position
            .clone()
    };

    assert_eq!(run(PositionMode::None), Slot::Omitted);
    assert_eq!(run(PositionMode::Minimal), Slot::Null);
    let detailed = run(PositionMode::Detailed);
    let pos = detailed.as_ref().unwrap();
    assert_eq!(pos.file, "util.go");
    assert_eq!(pos.start_line, 4);
    assert_eq!(pos.end_line, Some(6));
}

#[test]
fn test_broken_files_become_issues() {
    let output = Runner::new().run(&testdata_path("broken")).unwrap();

    let codes: Vec<&str> = output.issues.iter().map(|i| i.code.as_str()).collect();
    assert!(codes.contains(&"PARSE_ERROR"));
    assert!(codes.contains(&"PACKAGE_MISMATCH"));

    let table = output.symbol_table.unwrap();
    let pkg = &table.packages["example.com/broken"];
    assert_eq!(pkg.files, vec!["good.go".to_string()]);
    assert!(pkg.callable_declarations.contains_key("example.com/broken.Fine"));
    assert!(!pkg.callable_declarations.contains_key("example.com/broken.Broken"));
}

#[test]
fn test_output_is_deterministic() {
    let root = testdata_path("multipkg");
    let render = || {
        let output = full(CallGraphAlgorithm::Rta).run(&root).unwrap();
        (
            serde_json::to_string(&output.symbol_table).unwrap(),
            serde_json::to_string(&output.call_graph).unwrap(),
        )
    };
    assert_eq!(render(), render());
}

#[test]
fn test_test_files_and_exclusions() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "go.mod", "module example.com/scratch\n\ngo 1.21\n");
    write(temp.path(), "lib.go", "package scratch\n\nfunc Lib() {}\n");
    write(
        temp.path(),
        "lib_test.go",
        "package scratch_test\n\nimport \"testing\"\n\nfunc TestLib(t *testing.T) {}\n",
    );
    write(temp.path(), "gen/gen.go", "package gen\n\nfunc Generated() {}\n");
    write(temp.path(), "vendor/dep/dep.go", "package dep\n\nfunc Dep() {}\n");

    let default = Runner::new().run(temp.path()).unwrap().symbol_table.unwrap();
    let paths: Vec<&str> = default.packages.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["example.com/scratch", "example.com/scratch/gen"]);

    let config = AnalyzerConfig::default().merge_flags(true, &["gen".to_string()], &[]);
    let with_tests = Runner::new()
        .config(config)
        .run(temp.path())
        .unwrap()
        .symbol_table
        .unwrap();
    let paths: Vec<&str> = with_tests.packages.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["example.com/scratch", "example.com/scratch_test"]);
}

#[test]
fn test_compact_output_shape() {
    let output = full(CallGraphAlgorithm::Rta)
        .run(&testdata_path("sampleapp"))
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&report::render(&output, true).unwrap()).unwrap();

    assert_eq!(json["m"]["l"], "go");
    assert_eq!(json["m"]["a"], "full");
    let pkg = &json["p"]["example.com/sampleapp"];
    assert_eq!(pkg["n"], "main");
    assert_eq!(
        pkg["t"]["Calculator"]["im"],
        serde_json::json!(["Add(int, int) int", "Multiply(int, int) int"])
    );
    assert_eq!(pkg["fn"]["basicCalc.Add"]["k"], "m");
    assert_eq!(pkg["c"]["Version"], "\"1.0.0\"");
    assert_eq!(json["cg"]["a"], "rta");
    assert!(json["pdg"].is_null());
    assert!(json["iss"].as_array().unwrap().is_empty());
}
