//! Interface dispatch table.
//!
//! Maps every (interface, method) pair to the concrete methods that may
//! run when the method is called through a value of that interface. The
//! table is computed once over all declared types; RTA filters it by the
//! set of instantiated receivers.

use std::collections::{BTreeMap, HashMap};

use crate::analysis::TypeShape;
use crate::symbols::ProgramIndex;

/// A concrete method that satisfies an interface method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Implementing type (index into `ProgramIndex::types`).
    pub receiver: usize,
    /// Method body that runs (may be promoted from an embedded type).
    pub target: usize,
}

#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: HashMap<(usize, String), Vec<Candidate>>,
}

impl DispatchTable {
    pub fn build(index: &ProgramIndex) -> Self {
        let mut concrete: Vec<usize> = (0..index.types.len())
            .filter(|&t| {
                !matches!(
                    index.types[t].fact.shape,
                    TypeShape::Interface | TypeShape::Alias
                )
            })
            .collect();
        concrete.sort_by(|a, b| index.types[*a].qualified_name.cmp(&index.types[*b].qualified_name));

        let method_sets: HashMap<usize, BTreeMap<String, usize>> = concrete
            .iter()
            .map(|&t| (t, index.method_set(t)))
            .filter(|(t, methods)| !methods.is_empty() || !index.embedded_interfaces(*t).is_empty())
            .collect();

        let mut entries: HashMap<(usize, String), Vec<Candidate>> = HashMap::new();
        // (interface, method, embedded interface that supplies it)
        let mut forwards: Vec<(usize, String, usize)> = Vec::new();
        for iface in 0..index.types.len() {
            if index.types[iface].fact.shape != TypeShape::Interface {
                continue;
            }
            let implementers: Vec<usize> = concrete
                .iter()
                .copied()
                .filter(|t| method_sets.contains_key(t) && index.implements(*t, iface))
                .collect();

            for (method, _) in index.interface_methods(iface) {
                let mut candidates = Vec::new();
                for &t in &implementers {
                    match method_sets.get(&t).and_then(|m| m.get(&method.name)) {
                        Some(&target) => candidates.push(Candidate { receiver: t, target }),
                        None => {
                            if let Some((via, _)) = index.promoted_interface(t, &method.name) {
                                forwards.push((iface, method.name.clone(), via));
                            }
                        }
                    }
                }
                if !candidates.is_empty() {
                    entries.insert((iface, method.name.clone()), candidates);
                }
            }
        }

        // A struct embedding an interface runs whatever implementation the
        // field holds, so it forwards to that interface's candidates.
        loop {
            let mut changed = false;
            for (iface, method, via) in &forwards {
                let inherited = entries
                    .get(&(*via, method.clone()))
                    .cloned()
                    .unwrap_or_default();
                if inherited.is_empty() {
                    continue;
                }
                let list = entries.entry((*iface, method.clone())).or_default();
                for candidate in inherited {
                    if !list.contains(&candidate) {
                        list.push(candidate);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        Self { entries }
    }

    /// Candidates for `iface.method`: direct implementations ordered by
    /// type name, then those reached through embedded interfaces.
    pub fn candidates(&self, iface: usize, method: &str) -> &[Candidate] {
        self.entries
            .get(&(iface, method.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
