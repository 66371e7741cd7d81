//! Whole-program call graph.
//!
//! Two algorithms share one dispatch table and one output assembly:
//!
//! - `cha`: every callable is a node; interface calls fan out to every
//!   implementation in the program.
//! - `rta`: only callables reachable from the program entry points are
//!   nodes; interface calls fan out to implementations whose receiver type
//!   is instantiated by reachable code.
//!
//! Both return `None` when the analyzed packages contain no `main`.

mod cha;
mod dispatch;
mod rta;

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::analysis::{CallFact, CallKind, Span};
use crate::model::{
    CallGraph, CallGraphAlgorithm, CallGraphEdge, CallGraphNode, CallableKind, PositionMode,
};
use crate::symbols::{span_position, ProgramIndex, Scope, Target};

pub use dispatch::{Candidate, DispatchTable};

/// Edge between callables, before naming.
#[derive(Debug, Clone)]
pub(crate) struct RawEdge {
    pub source: usize,
    pub target: usize,
    pub kind: CallKind,
    pub span: Span,
}

/// Nodes and edges by callable index.
#[derive(Debug, Default)]
pub(crate) struct RawGraph {
    pub nodes: BTreeSet<usize>,
    pub edges: Vec<RawEdge>,
}

impl RawGraph {
    pub fn add_edge(&mut self, source: usize, target: usize, call: &CallFact) {
        self.edges.push(RawEdge {
            source,
            target,
            kind: call.kind,
            span: call.span.clone(),
        });
    }
}

/// Resolved calls made by callable `c`, in source order.
pub(crate) fn resolved_calls<'i>(index: &'i ProgramIndex, c: usize) -> Vec<(Target, &'i CallFact)> {
    let caller = &index.callables[c];
    let Some(body) = caller.fact.body.as_ref() else {
        return Vec::new();
    };
    body.calls
        .iter()
        .filter_map(|call| {
            let scope = Scope::body(caller.loc, body, call.span.start_byte);
            index.resolve_call(&call.callee, scope).map(|t| (t, call))
        })
        .collect()
}

/// Packages that define a program entry point.
pub fn main_packages(index: &ProgramIndex) -> Vec<usize> {
    (0..index.packages.len())
        .filter(|&p| index.is_main_package(p))
        .collect()
}

/// Build the call graph, or `None` if there is no entry point.
pub fn build_call_graph(
    index: &ProgramIndex,
    algorithm: CallGraphAlgorithm,
    positions: PositionMode,
) -> Option<CallGraph> {
    let mains = main_packages(index);
    if mains.is_empty() {
        info!("no main package found, call graph omitted");
        return None;
    }

    let dispatch = DispatchTable::build(index);
    let raw = match algorithm {
        CallGraphAlgorithm::Cha => cha::build(index, &dispatch),
        CallGraphAlgorithm::Rta => rta::build(index, &dispatch, &mains),
    };

    let graph = assemble(index, algorithm, raw, positions);
    info!(
        algorithm = algorithm.as_str(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        dispatch_entries = dispatch.len(),
        "built call graph"
    );
    Some(graph)
}

/// Name nodes and edges, drop duplicate edges, and sort.
fn assemble(
    index: &ProgramIndex,
    algorithm: CallGraphAlgorithm,
    raw: RawGraph,
    positions: PositionMode,
) -> CallGraph {
    let mut nodes: Vec<CallGraphNode> = raw
        .nodes
        .iter()
        .map(|&c| {
            let entry = &index.callables[c];
            let file = index.file(entry.loc);
            CallGraphNode {
                id: entry.qualified_name.clone(),
                qualified_name: entry.qualified_name.clone(),
                package: index.package_path(entry.loc.pkg).to_string(),
                name: entry.fact.name.clone(),
                kind: if entry.fact.is_method() {
                    CallableKind::Method
                } else {
                    CallableKind::Function
                },
                position: positions.slot(span_position(&file.path, &entry.fact.span)),
            }
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut unique: BTreeMap<(String, String, usize, usize), CallGraphEdge> = BTreeMap::new();
    for edge in raw.edges {
        let source = &index.callables[edge.source];
        let target = &index.callables[edge.target];
        let key = (
            source.qualified_name.clone(),
            target.qualified_name.clone(),
            edge.span.start_line,
            edge.span.start_col,
        );
        unique.entry(key).or_insert_with(|| {
            let file = index.file(source.loc);
            CallGraphEdge {
                source: source.qualified_name.clone(),
                target: target.qualified_name.clone(),
                kind: edge.kind.into(),
                call_site: positions.slot(span_position(&file.path, &edge.span)),
            }
        });
    }

    CallGraph {
        algorithm: algorithm.as_str().to_string(),
        nodes,
        edges: unique.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdgeKind;
    use crate::symbols::test_program;

    const APP: &str = r#"package main

import "example.com/app/shapes"

type Printer interface {
	Print(s shapes.Shape)
}

type console struct{}

func (console) Print(s shapes.Shape) {
	_ = s.Area()
}

func run(p Printer) {
	p.Print(shapes.Square{Side: 2})
	defer cleanup()
	go cleanup()
}

func cleanup() {}

func main() {
	run(console{})
	run(console{})
}
"#;

    const SHAPES: &str = r#"package shapes

type Shape interface {
	Area() float64
}

type Square struct{ Side float64 }

func (s Square) Area() float64 { return s.Side * s.Side }

type Circle struct{ R float64 }

func (c Circle) Area() float64 { return 3 * c.R * c.R }

func Unused() {}
"#;

    fn index_program() -> crate::loader::Program {
        test_program(&[
            ("example.com/app", &[("main.go", APP)]),
            ("example.com/app/shapes", &[("shapes.go", SHAPES)]),
        ])
    }

    fn edge_pairs(graph: &CallGraph) -> Vec<(String, String)> {
        graph
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect()
    }

    #[test]
    fn test_cha_fans_out_to_all_implementations() {
        let program = index_program();
        let index = ProgramIndex::build(&program);
        let graph = build_call_graph(&index, CallGraphAlgorithm::Cha, PositionMode::None).unwrap();

        assert_eq!(graph.algorithm, "cha");
        assert_eq!(graph.nodes.len(), index.callables.len());
        let edges = edge_pairs(&graph);
        assert!(edges.contains(&(
            "example.com/app.console.Print".to_string(),
            "example.com/app/shapes.Circle.Area".to_string()
        )));
        assert!(edges.contains(&(
            "example.com/app.console.Print".to_string(),
            "example.com/app/shapes.Square.Area".to_string()
        )));
    }

    #[test]
    fn test_rta_prunes_uninstantiated_types() {
        let program = index_program();
        let index = ProgramIndex::build(&program);
        let graph = build_call_graph(&index, CallGraphAlgorithm::Rta, PositionMode::None).unwrap();

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"example.com/app/shapes.Square.Area"));
        assert!(!ids.contains(&"example.com/app/shapes.Circle.Area"));
        assert!(!ids.contains(&"example.com/app/shapes.Unused"));

        let edges = edge_pairs(&graph);
        assert!(!edges.contains(&(
            "example.com/app.console.Print".to_string(),
            "example.com/app/shapes.Circle.Area".to_string()
        )));
        for edge in &graph.edges {
            assert!(ids.contains(&edge.source.as_str()));
            assert!(ids.contains(&edge.target.as_str()));
        }
    }

    #[test]
    fn test_edges_keep_call_sites_and_kinds() {
        let program = index_program();
        let index = ProgramIndex::build(&program);
        let graph = build_call_graph(&index, CallGraphAlgorithm::Rta, PositionMode::Detailed).unwrap();

        let to_run: Vec<&CallGraphEdge> = graph
            .edges
            .iter()
            .filter(|e| e.target == "example.com/app.run")
            .collect();
        assert_eq!(to_run.len(), 2);
        assert_eq!(to_run[0].call_site.as_ref().unwrap().start_line, 24);
        assert_eq!(to_run[1].call_site.as_ref().unwrap().start_line, 25);

        let kinds: Vec<EdgeKind> = graph
            .edges
            .iter()
            .filter(|e| e.target == "example.com/app.cleanup")
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds, vec![EdgeKind::Defer, EdgeKind::Go]);
    }

    #[test]
    fn test_no_main_means_no_graph() {
        let program = test_program(&[("lib", &[("lib.go", SHAPES)])]);
        let index = ProgramIndex::build(&program);
        assert!(build_call_graph(&index, CallGraphAlgorithm::Cha, PositionMode::None).is_none());
        assert!(build_call_graph(&index, CallGraphAlgorithm::Rta, PositionMode::None).is_none());
    }
}
