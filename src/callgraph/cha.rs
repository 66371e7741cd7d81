//! Class hierarchy analysis.

use tracing::debug;

use super::{resolved_calls, DispatchTable, RawGraph};
use crate::symbols::{ProgramIndex, Target};

/// Every callable is a node. Static calls produce one edge; interface
/// calls produce an edge to every implementation in the program.
pub(crate) fn build(index: &ProgramIndex, dispatch: &DispatchTable) -> RawGraph {
    let mut graph = RawGraph::default();

    for caller in 0..index.callables.len() {
        graph.nodes.insert(caller);
        for (target, call) in resolved_calls(index, caller) {
            match target {
                Target::Static(callee) => graph.add_edge(caller, callee, call),
                Target::Dynamic { iface, method } => {
                    for candidate in dispatch.candidates(iface, &method) {
                        graph.add_edge(caller, candidate.target, call);
                    }
                }
            }
        }
    }

    debug!(nodes = graph.nodes.len(), edges = graph.edges.len(), "cha complete");
    graph
}
