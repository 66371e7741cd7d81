//! Rapid type analysis.
//!
//! A worklist over reachable callables. Each newly reachable body adds its
//! instantiated types and its call sites; each newly instantiated type
//! revisits the interface call sites recorded so far. Both sets only grow
//! and are bounded by the program, so the loop reaches a fixed point.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::{resolved_calls, DispatchTable, RawGraph};
use crate::analysis::CallFact;
use crate::symbols::{Loc, ProgramIndex, Scope, Target, TypeRef};

/// An interface call site seen in reachable code.
struct DynamicSite<'i> {
    caller: usize,
    iface: usize,
    method: String,
    call: &'i CallFact,
}

struct Rta<'i, 'p> {
    index: &'i ProgramIndex<'p>,
    dispatch: &'i DispatchTable,
    graph: RawGraph,
    queue: VecDeque<usize>,
    instantiated: HashSet<usize>,
    sites: Vec<DynamicSite<'i>>,
}

impl<'i, 'p> Rta<'i, 'p> {
    fn reach(&mut self, callable: usize) {
        if self.graph.nodes.insert(callable) {
            self.queue.push_back(callable);
        }
    }

    fn instantiate(&mut self, ty: usize) {
        if !self.instantiated.insert(ty) {
            return;
        }
        let mut newly = Vec::new();
        for site in &self.sites {
            for candidate in self.dispatch.candidates(site.iface, &site.method) {
                if candidate.receiver == ty {
                    newly.push((site.caller, candidate.target, site.call));
                }
            }
        }
        for (caller, target, call) in newly {
            self.graph.add_edge(caller, target, call);
            self.reach(target);
        }
    }

    fn instantiate_text(&mut self, text: &str, loc: Loc) {
        if let Some(ty) = self.index.resolve_type(&TypeRef::new(text, loc)) {
            self.instantiate(ty);
        }
    }

    fn visit(&mut self, caller: usize) {
        let index = self.index;
        let entry = &index.callables[caller];
        let Some(body) = entry.fact.body.as_ref() else {
            return;
        };

        for text in &body.instantiations {
            self.instantiate_text(text, entry.loc);
        }
        for call in &body.calls {
            let scope = Scope::body(entry.loc, body, call.span.start_byte);
            if let Some(ty) = index.conversion(&call.callee, scope) {
                self.instantiate(ty);
            }
        }

        for (target, call) in resolved_calls(index, caller) {
            match target {
                Target::Static(callee) => {
                    self.graph.add_edge(caller, callee, call);
                    self.reach(callee);
                }
                Target::Dynamic { iface, method } => {
                    let live: Vec<usize> = self
                        .dispatch
                        .candidates(iface, &method)
                        .iter()
                        .filter(|c| self.instantiated.contains(&c.receiver))
                        .map(|c| c.target)
                        .collect();
                    for target in live {
                        self.graph.add_edge(caller, target, call);
                        self.reach(target);
                    }
                    self.sites.push(DynamicSite {
                        caller,
                        iface,
                        method,
                        call,
                    });
                }
            }
        }

        // Functions passed as values may be called from anywhere.
        for value in &body.value_refs {
            let scope = Scope::body(entry.loc, body, value.at);
            if let Some(callee) = index.resolve_function_value(&value.expr, scope) {
                self.reach(callee);
            }
        }
    }
}

/// Reachability from the `main` and `init` functions of `mains` and the
/// `init` functions of every analyzed package they import.
pub(crate) fn build(index: &ProgramIndex, dispatch: &DispatchTable, mains: &[usize]) -> RawGraph {
    let mut rta = Rta {
        index,
        dispatch,
        graph: RawGraph::default(),
        queue: VecDeque::new(),
        instantiated: HashSet::new(),
        sites: Vec::new(),
    };

    let packages = index.import_closure(mains);
    for &pkg in &packages {
        for &v in &index.packages[pkg].values {
            let value = &index.values[v];
            for text in &value.fact.instantiations {
                rta.instantiate_text(text, value.loc);
            }
        }
    }

    for &pkg in mains {
        if let Some(main) = index.main_function(pkg) {
            rta.reach(main);
        }
    }
    for &pkg in &packages {
        for init in index.init_functions(pkg) {
            rta.reach(init);
        }
    }

    let mut rounds = 0usize;
    while let Some(caller) = rta.queue.pop_front() {
        rta.visit(caller);
        rounds += 1;
    }

    debug!(
        reachable = rta.graph.nodes.len(),
        instantiated = rta.instantiated.len(),
        interface_sites = rta.sites.len(),
        rounds,
        "rta fixed point"
    );
    rta.graph
}
