// Wait-for graph derived from a snapshot
use crate::snapshot::{ProcessId, SystemSnapshot};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Directed graph over process ids: `p -> q` means `p` waits on a resource
/// `q` currently holds. Self-edges are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    edges: BTreeMap<ProcessId, BTreeSet<ProcessId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (ProcessId, ProcessId)>,
    {
        let mut graph = Self::new();
        for (from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    /// Adds `from -> to`. Returns false for self-edges and duplicates.
    pub fn add_edge(&mut self, from: ProcessId, to: ProcessId) -> bool {
        if from == to {
            return false;
        }
        self.edges.entry(from).or_default().insert(to)
    }

    pub fn successors(&self, pid: ProcessId) -> impl Iterator<Item = ProcessId> + '_ {
        self.edges.get(&pid).into_iter().flatten().copied()
    }

    pub fn out_degree(&self, pid: ProcessId) -> usize {
        self.edges.get(&pid).map_or(0, BTreeSet::len)
    }

    pub fn has_edge(&self, from: ProcessId, to: ProcessId) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    /// Processes with outgoing edges, ascending.
    pub fn sources(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.edges.keys().copied()
    }

    /// Every process appearing as a key or a target.
    pub fn nodes(&self) -> BTreeSet<ProcessId> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| std::iter::once(*from).chain(targets.iter().copied()))
            .collect()
    }

    pub fn contains_node(&self, pid: ProcessId) -> bool {
        self.edges.contains_key(&pid) || self.edges.values().any(|t| t.contains(&pid))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &BTreeMap<ProcessId, BTreeSet<ProcessId>> {
        &self.edges
    }
}

/// Serialized as `{"<pid>": [<pid>, ...]}`.
impl Serialize for WaitForGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.edges
                .iter()
                .map(|(from, targets)| (from.0.to_string(), targets)),
        )
    }
}

pub struct WaitGraphBuilder;

impl WaitGraphBuilder {
    /// For every outstanding request `(p, r)`, adds `p -> h` for each other
    /// process `h` holding a positive amount of `r`. Quantities are not
    /// compared: any current holder counts as a blocker.
    pub fn build(snapshot: &SystemSnapshot) -> WaitForGraph {
        let mut holders: BTreeMap<&str, Vec<ProcessId>> = BTreeMap::new();
        for ((pid, rid), &units) in &snapshot.allocation {
            if units > 0 {
                holders.entry(rid.as_str()).or_default().push(*pid);
            }
        }

        let mut graph = WaitForGraph::new();
        for ((requester, rid), &units) in &snapshot.request {
            if units <= 0 {
                continue;
            }
            let Some(blockers) = holders.get(rid.as_str()) else {
                continue;
            };
            for &holder in blockers {
                if holder != *requester {
                    graph.add_edge(*requester, holder);
                }
            }
        }

        debug!(
            nodes = graph.nodes().len(),
            edges = graph.edge_count(),
            "built wait-for graph"
        );
        graph
    }
}
