// Deadlock detection over the wait-for graph
use super::wait_graph::WaitForGraph;
use crate::error::Error;
use crate::snapshot::ProcessId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Pid membership of one cycle / deadlock group.
pub type Cycle = BTreeSet<ProcessId>;

/// Default cap on [`CycleDetector::wait_chains`] output.
pub const DEFAULT_WAIT_CHAIN_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleAlgorithm {
    /// Strongly connected components: one group per deadlock, no overlaps.
    #[default]
    Scc,
    /// Back-edge closures of a depth-first search: one entry per cycle found.
    Dfs,
}

impl FromStr for CycleAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scc" | "tarjan" => Ok(CycleAlgorithm::Scc),
            "dfs" => Ok(CycleAlgorithm::Dfs),
            _ => Err(Error::ConfigError(format!("Invalid cycle algorithm: {}", s))),
        }
    }
}

impl fmt::Display for CycleAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleAlgorithm::Scc => f.write_str("scc"),
            CycleAlgorithm::Dfs => f.write_str("dfs"),
        }
    }
}

/// A forward walk along wait edges starting at `path[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitChain {
    pub path: Vec<ProcessId>,
    /// The last element repeats an earlier one on the path.
    pub closes_cycle: bool,
}

struct Frame {
    node: ProcessId,
    successors: Vec<ProcessId>,
    cursor: usize,
}

impl Frame {
    fn new(graph: &WaitForGraph, node: ProcessId) -> Self {
        Frame {
            node,
            successors: graph.successors(node).collect(),
            cursor: 0,
        }
    }
}

pub struct CycleDetector;

impl CycleDetector {
    /// Deadlock groups: strongly connected components with more than one
    /// member, ordered by their smallest pid.
    pub fn find_cycles(wfg: &WaitForGraph) -> Vec<Cycle> {
        let mut tarjan = Tarjan::new(wfg);
        for node in wfg.nodes() {
            if !tarjan.indices.contains_key(&node) {
                tarjan.run(node);
            }
        }

        let mut groups: Vec<Cycle> = tarjan
            .components
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| scc.into_iter().collect())
            .collect();
        groups.sort_by_key(|group: &Cycle| group.first().copied());

        debug!(groups = groups.len(), "scc detection finished");
        groups
    }

    /// Every cycle closed by a back edge during a depth-first search rooted
    /// at each unvisited graph key in ascending order. Overlapping and
    /// repeated memberships are possible when a component holds several
    /// simple cycles.
    pub fn find_cycle_instances(wfg: &WaitForGraph) -> Vec<Cycle> {
        let mut visited = BTreeSet::new();
        let mut on_path = BTreeSet::new();
        let mut path: Vec<ProcessId> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut cycles = Vec::new();

        for root in wfg.sources() {
            if visited.contains(&root) {
                continue;
            }
            visited.insert(root);
            on_path.insert(root);
            path.push(root);
            frames.push(Frame::new(wfg, root));

            while let Some(frame) = frames.last_mut() {
                match frame.successors.get(frame.cursor).copied() {
                    Some(next) => {
                        frame.cursor += 1;
                        if !visited.contains(&next) {
                            visited.insert(next);
                            on_path.insert(next);
                            path.push(next);
                            frames.push(Frame::new(wfg, next));
                        } else if on_path.contains(&next) {
                            if let Some(start) = path.iter().position(|p| *p == next) {
                                cycles.push(path[start..].iter().copied().collect());
                            }
                        }
                    }
                    None => {
                        let node = frame.node;
                        frames.pop();
                        on_path.remove(&node);
                        path.pop();
                    }
                }
            }
        }

        debug!(cycles = cycles.len(), "dfs cycle listing finished");
        cycles
    }

    pub fn detect(wfg: &WaitForGraph, algorithm: CycleAlgorithm) -> Vec<Cycle> {
        match algorithm {
            CycleAlgorithm::Scc => Self::find_cycles(wfg),
            CycleAlgorithm::Dfs => Self::find_cycle_instances(wfg),
        }
    }

    /// Processes waiting on two or more distinct others.
    pub fn contention_hotspots(wfg: &WaitForGraph) -> Vec<ProcessId> {
        wfg.sources().filter(|pid| wfg.out_degree(*pid) >= 2).collect()
    }

    /// Walks forward from every waiting process along each wait edge. A walk
    /// ends at a process with no outgoing waits, or when it reaches a process
    /// already on the walk; that process is appended and the chain flagged as
    /// closing a cycle. Stops after `limit` chains.
    pub fn wait_chains(wfg: &WaitForGraph, limit: usize) -> Vec<WaitChain> {
        let mut chains = Vec::new();

        'roots: for start in wfg.sources() {
            let mut pending: Vec<(Vec<ProcessId>, bool)> = vec![(vec![start], false)];

            while let Some((path, closed)) = pending.pop() {
                if chains.len() >= limit {
                    warn!(limit, "wait chain enumeration truncated");
                    break 'roots;
                }

                let Some(&last) = path.last() else {
                    continue;
                };
                if closed || wfg.out_degree(last) == 0 {
                    chains.push(WaitChain {
                        path,
                        closes_cycle: closed,
                    });
                    continue;
                }

                let successors: Vec<ProcessId> = wfg.successors(last).collect();
                for next in successors.into_iter().rev() {
                    let repeats = path.contains(&next);
                    let mut extended = path.clone();
                    extended.push(next);
                    pending.push((extended, repeats));
                }
            }
        }

        chains
    }
}

struct Tarjan<'a> {
    graph: &'a WaitForGraph,
    next_index: usize,
    indices: BTreeMap<ProcessId, usize>,
    lowlinks: BTreeMap<ProcessId, usize>,
    stack: Vec<ProcessId>,
    on_stack: BTreeSet<ProcessId>,
    components: Vec<Vec<ProcessId>>,
}

impl<'a> Tarjan<'a> {
    fn new(graph: &'a WaitForGraph) -> Self {
        Tarjan {
            graph,
            next_index: 0,
            indices: BTreeMap::new(),
            lowlinks: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            components: Vec::new(),
        }
    }

    fn enter(&mut self, v: ProcessId, frames: &mut Vec<Frame>) {
        self.indices.insert(v, self.next_index);
        self.lowlinks.insert(v, self.next_index);
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);
        frames.push(Frame::new(self.graph, v));
    }

    fn lower(&mut self, v: ProcessId, candidate: usize) {
        if let Some(low) = self.lowlinks.get_mut(&v) {
            *low = (*low).min(candidate);
        }
    }

    /// Iterative strongconnect rooted at `root`.
    fn run(&mut self, root: ProcessId) {
        let mut frames = Vec::new();
        self.enter(root, &mut frames);

        while let Some(frame) = frames.last_mut() {
            let v = frame.node;
            match frame.successors.get(frame.cursor).copied() {
                Some(w) => {
                    frame.cursor += 1;
                    if !self.indices.contains_key(&w) {
                        self.enter(w, &mut frames);
                    } else if self.on_stack.contains(&w) {
                        let index_w = self.indices[&w];
                        self.lower(v, index_w);
                    }
                }
                None => {
                    frames.pop();
                    let low_v = self.lowlinks[&v];
                    if low_v == self.indices[&v] {
                        let mut component = Vec::new();
                        while let Some(w) = self.stack.pop() {
                            self.on_stack.remove(&w);
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        self.components.push(component);
                    }
                    if let Some(parent) = frames.last() {
                        let parent = parent.node;
                        self.lower(parent, low_v);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(u64, u64)]) -> WaitForGraph {
        WaitForGraph::from_edges(edges.iter().map(|&(a, b)| (ProcessId(a), ProcessId(b))))
    }

    fn set(pids: &[u64]) -> Cycle {
        pids.iter().copied().map(ProcessId).collect()
    }

    #[test]
    fn test_wfg_no_cycle() {
        let g = graph(&[(1, 2)]);
        assert!(CycleDetector::find_cycles(&g).is_empty());
        assert!(CycleDetector::find_cycle_instances(&g).is_empty());
    }

    #[test]
    fn test_empty_graph() {
        let g = WaitForGraph::new();
        assert!(CycleDetector::find_cycles(&g).is_empty());
        assert!(CycleDetector::wait_chains(&g, DEFAULT_WAIT_CHAIN_LIMIT).is_empty());
    }

    #[test]
    fn test_simple_cycle_detection() {
        let g = graph(&[(1, 2), (2, 3), (3, 1)]);
        assert_eq!(CycleDetector::find_cycles(&g), vec![set(&[1, 2, 3])]);
        assert_eq!(CycleDetector::find_cycle_instances(&g), vec![set(&[1, 2, 3])]);
    }

    #[test]
    fn test_no_cycle_in_dag() {
        let g = graph(&[(1, 2), (2, 3), (1, 3)]);
        assert!(CycleDetector::find_cycles(&g).is_empty());
        assert!(CycleDetector::find_cycle_instances(&g).is_empty());
    }

    #[test]
    fn test_disjoint_groups_ordered_by_smallest_pid() {
        let g = graph(&[(7, 8), (8, 7), (2, 3), (3, 2), (3, 9)]);
        assert_eq!(
            CycleDetector::find_cycles(&g),
            vec![set(&[2, 3]), set(&[7, 8])]
        );
    }

    #[test]
    fn test_overlapping_cycles_one_group_many_instances() {
        // 1 <-> 2 and 1 -> 3 -> 1 share node 1.
        let g = graph(&[(1, 2), (2, 1), (1, 3), (3, 1)]);

        assert_eq!(CycleDetector::find_cycles(&g), vec![set(&[1, 2, 3])]);
        assert_eq!(
            CycleDetector::find_cycle_instances(&g),
            vec![set(&[1, 2]), set(&[1, 3])]
        );
    }

    #[test]
    fn test_dfs_never_reexpands_visited_nodes() {
        // 4 joins the already-finished component through a cross edge.
        let g = graph(&[(1, 2), (2, 1), (4, 1)]);
        assert_eq!(CycleDetector::find_cycle_instances(&g), vec![set(&[1, 2])]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let edges: Vec<(u64, u64)> = (0..50_000).map(|i| (i, i + 1)).chain([(50_000, 0)]).collect();
        let g = graph(&edges);
        let groups = CycleDetector::find_cycles(&g);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 50_001);
        assert_eq!(CycleDetector::find_cycle_instances(&g).len(), 1);
    }

    #[test]
    fn test_contention_hotspots() {
        let g = graph(&[(1, 2), (1, 3), (2, 3), (4, 1), (4, 2), (4, 3)]);
        assert_eq!(
            CycleDetector::contention_hotspots(&g),
            vec![ProcessId(1), ProcessId(4)]
        );
    }

    #[test]
    fn test_wait_chains_mark_cycle_closure() {
        let g = graph(&[(1, 2), (2, 1), (3, 1)]);
        let chains = CycleDetector::wait_chains(&g, DEFAULT_WAIT_CHAIN_LIMIT);

        let expected = vec![
            WaitChain {
                path: vec![ProcessId(1), ProcessId(2), ProcessId(1)],
                closes_cycle: true,
            },
            WaitChain {
                path: vec![ProcessId(2), ProcessId(1), ProcessId(2)],
                closes_cycle: true,
            },
            WaitChain {
                path: vec![ProcessId(3), ProcessId(1), ProcessId(2), ProcessId(1)],
                closes_cycle: true,
            },
        ];
        assert_eq!(chains, expected);
    }

    #[test]
    fn test_wait_chains_end_at_idle_process() {
        let g = graph(&[(1, 2), (1, 3), (2, 3)]);
        let chains = CycleDetector::wait_chains(&g, DEFAULT_WAIT_CHAIN_LIMIT);
        let paths: Vec<Vec<u64>> = chains
            .iter()
            .map(|c| c.path.iter().map(ProcessId::as_u64).collect())
            .collect();
        assert_eq!(paths, vec![vec![1, 2, 3], vec![1, 3], vec![2, 3]]);
        assert!(chains.iter().all(|c| !c.closes_cycle));
    }

    #[test]
    fn test_wait_chain_limit() {
        let g = graph(&[(1, 2), (1, 3), (2, 3)]);
        assert_eq!(CycleDetector::wait_chains(&g, 2).len(), 2);
    }

    #[test]
    fn test_algorithm_parsing() {
        assert_eq!("SCC".parse::<CycleAlgorithm>().unwrap(), CycleAlgorithm::Scc);
        assert_eq!("tarjan".parse::<CycleAlgorithm>().unwrap(), CycleAlgorithm::Scc);
        assert_eq!("dfs".parse::<CycleAlgorithm>().unwrap(), CycleAlgorithm::Dfs);
        assert!("bfs".parse::<CycleAlgorithm>().is_err());
    }
}
