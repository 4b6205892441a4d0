// Deadlock avoidance: Banker's safety check
use crate::error::{Error, Result};
use crate::snapshot::{ProcessId, ResourceId, SystemSnapshot, Units};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Exhaustive enumeration refuses snapshots with more processes than this
/// unless the caller passes its own limit.
pub const DEFAULT_EXHAUSTIVE_LIMIT: usize = 8;

type Work = BTreeMap<ResourceId, Units>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyResult {
    pub safe: bool,
    /// Completion order; empty when the state is unsafe.
    pub safe_sequence: Vec<ProcessId>,
    /// Work vector when the scan stopped: fully released when safe, the
    /// partial state otherwise.
    pub final_available: BTreeMap<ResourceId, Units>,
}

/// Banker's algorithm over a snapshot whose `request` matrix is the
/// remaining need of each process.
pub struct SafetyAnalyzer;

impl SafetyAnalyzer {
    /// Repeatedly finishes the first process (in snapshot order) whose
    /// request fits in `work`, releasing its allocation, and restarts the
    /// scan. Safe iff every process finishes.
    pub fn is_safe(snapshot: &SystemSnapshot) -> SafetyResult {
        let mut work = snapshot.available();
        let mut finished = vec![false; snapshot.processes.len()];
        let mut sequence = Vec::with_capacity(snapshot.processes.len());

        while let Some(idx) = Self::next_eligible(snapshot, &work, &finished) {
            let pid = snapshot.processes[idx].pid;
            Self::release(snapshot, pid, &mut work);
            finished[idx] = true;
            sequence.push(pid);
            debug!(pid = %pid, step = sequence.len(), "process can finish, allocation released");
        }

        let safe = finished.iter().all(|&done| done);
        if !safe {
            debug!(
                finished = sequence.len(),
                total = snapshot.processes.len(),
                "no safe sequence exists"
            );
            sequence.clear();
        }

        SafetyResult {
            safe,
            safe_sequence: sequence,
            final_available: work,
        }
    }

    /// Every distinct completion order, found by backtracking over the
    /// eligible processes at each step. Sequences are produced in snapshot
    /// order of the first differing choice. Fails fast when the snapshot has
    /// more than `limit` processes.
    pub fn find_all_safe_sequences(
        snapshot: &SystemSnapshot,
        limit: usize,
    ) -> Result<Vec<Vec<ProcessId>>> {
        let processes = snapshot.processes.len();
        if processes > limit {
            return Err(Error::InputTooLarge { processes, limit });
        }

        let mut work = snapshot.available();
        let mut finished = vec![false; processes];
        let mut path = Vec::with_capacity(processes);
        let mut sequences = Vec::new();

        Self::extend(snapshot, &mut work, &mut finished, &mut path, &mut sequences);

        debug!(count = sequences.len(), "enumerated safe sequences");
        Ok(sequences)
    }

    /// Replays `sequence`, checking each process's request fits in the work
    /// vector before releasing its allocation. Every process must appear
    /// exactly once.
    pub fn verify_sequence(snapshot: &SystemSnapshot, sequence: &[ProcessId]) -> bool {
        if sequence.len() != snapshot.processes.len() {
            return false;
        }

        let mut work = snapshot.available();
        let mut finished = vec![false; snapshot.processes.len()];

        for pid in sequence {
            let Some(idx) = snapshot.processes.iter().position(|p| p.pid == *pid) else {
                return false;
            };
            if finished[idx] || !Self::can_finish(snapshot, *pid, &work) {
                return false;
            }
            Self::release(snapshot, *pid, &mut work);
            finished[idx] = true;
        }

        true
    }

    fn extend(
        snapshot: &SystemSnapshot,
        work: &mut Work,
        finished: &mut Vec<bool>,
        path: &mut Vec<ProcessId>,
        sequences: &mut Vec<Vec<ProcessId>>,
    ) {
        if path.len() == snapshot.processes.len() {
            sequences.push(path.clone());
            return;
        }

        for idx in 0..snapshot.processes.len() {
            let pid = snapshot.processes[idx].pid;
            if finished[idx] || !Self::can_finish(snapshot, pid, work) {
                continue;
            }

            // Saturated sums cannot be undone by subtraction.
            let saved = work.clone();
            Self::release(snapshot, pid, work);
            finished[idx] = true;
            path.push(pid);

            Self::extend(snapshot, work, finished, path, sequences);

            path.pop();
            finished[idx] = false;
            *work = saved;
        }
    }

    fn next_eligible(snapshot: &SystemSnapshot, work: &Work, finished: &[bool]) -> Option<usize> {
        snapshot
            .processes
            .iter()
            .enumerate()
            .find(|(idx, p)| !finished[*idx] && Self::can_finish(snapshot, p.pid, work))
            .map(|(idx, _)| idx)
    }

    fn can_finish(snapshot: &SystemSnapshot, pid: ProcessId, work: &Work) -> bool {
        snapshot.resources.keys().all(|rid| {
            let free = work.get(rid).copied().unwrap_or(0);
            free >= snapshot.requested(pid, rid.as_str())
        })
    }

    fn release(snapshot: &SystemSnapshot, pid: ProcessId, work: &mut Work) {
        for (rid, units) in snapshot.allocation_of(pid) {
            if units > 0 {
                let free = work.entry(rid.clone()).or_insert(0);
                *free = free.saturating_add(units);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pids(raw: &[u64]) -> Vec<ProcessId> {
        raw.iter().copied().map(ProcessId).collect()
    }

    #[test]
    fn test_bankers_safe_minimal() {
        let snap = SystemSnapshot::builder()
            .process(1, "P1")
            .resource("R", 1)
            .allocate(1, "R", 0)
            .request(1, "R", 0)
            .build()
            .unwrap();

        let result = SafetyAnalyzer::is_safe(&snap);
        assert!(result.safe);
        assert_eq!(result.safe_sequence, pids(&[1]));
        assert_eq!(result.final_available["R"], 1);
    }

    #[test]
    fn test_empty_snapshot_is_trivially_safe() {
        let result = SafetyAnalyzer::is_safe(&SystemSnapshot::default());
        assert!(result.safe);
        assert!(result.safe_sequence.is_empty());
        assert!(result.final_available.is_empty());
    }

    #[test]
    fn test_zero_capacity_resource() {
        let snap = SystemSnapshot::builder()
            .process(1, "A")
            .process(2, "B")
            .resource("Z", 0)
            .request(2, "Z", 1)
            .build()
            .unwrap();

        let result = SafetyAnalyzer::is_safe(&snap);
        assert!(!result.safe);
        assert!(result.safe_sequence.is_empty());
        assert_eq!(result.final_available["Z"], 0);
    }

    #[test]
    fn test_negative_availability_does_not_panic() {
        let snap = SystemSnapshot::builder()
            .process(1, "A")
            .process(2, "B")
            .resource("R", 1)
            .allocate(1, "R", 2)
            .allocate(2, "R", 1)
            .request(1, "R", 1)
            .request(2, "R", 1)
            .build()
            .unwrap();

        let result = SafetyAnalyzer::is_safe(&snap);
        assert!(!result.safe);
        assert_eq!(result.final_available["R"], -2);
    }

    #[test]
    fn test_extreme_unit_counts_saturate() {
        let snap = SystemSnapshot::from_json(
            r#"{
                "processes": [{"pid": 1}, {"pid": 2}],
                "resources": {"R": {"total": 0}},
                "allocation": {"1_R": 9223372036854775807, "2_R": 9223372036854775807}
            }"#,
        )
        .unwrap();

        assert_eq!(snap.available()["R"], Units::MIN);
        assert_eq!(snap.over_allocated()[0].allocated, Units::MAX);

        let result = SafetyAnalyzer::is_safe(&snap);
        assert!(!result.safe);
        assert_eq!(result.final_available["R"], Units::MIN);
        assert!(SafetyAnalyzer::find_all_safe_sequences(&snap, DEFAULT_EXHAUSTIVE_LIMIT)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_lowest_index_tie_break() {
        // Both processes can go first; snapshot order decides.
        let snap = SystemSnapshot::builder()
            .process(9, "late-pid")
            .process(3, "early-pid")
            .resource("R", 3)
            .allocate(9, "R", 1)
            .allocate(3, "R", 1)
            .request(9, "R", 1)
            .request(3, "R", 1)
            .build()
            .unwrap();

        let result = SafetyAnalyzer::is_safe(&snap);
        assert!(result.safe);
        assert_eq!(result.safe_sequence, pids(&[9, 3]));
        assert_eq!(result.final_available["R"], 3);
    }

    #[test]
    fn test_scan_restarts_after_each_completion() {
        // P1 waits on P2's release; P3 is eligible immediately but comes after P2.
        let snap = SystemSnapshot::builder()
            .process(1, "P1")
            .process(2, "P2")
            .process(3, "P3")
            .resource("R", 2)
            .allocate(2, "R", 1)
            .request(1, "R", 2)
            .request(2, "R", 1)
            .build()
            .unwrap();

        let result = SafetyAnalyzer::is_safe(&snap);
        assert_eq!(result.safe_sequence, pids(&[2, 1, 3]));
    }

    #[test]
    fn test_all_safe_sequences() {
        let snap = SystemSnapshot::builder()
            .process(1, "P1")
            .process(2, "P2")
            .process(3, "P3")
            .resource("R", 3)
            .allocate(1, "R", 1)
            .allocate(2, "R", 1)
            .request(1, "R", 1)
            .request(2, "R", 1)
            .request(3, "R", 3)
            .build()
            .unwrap();

        let sequences = SafetyAnalyzer::find_all_safe_sequences(&snap, 8).unwrap();
        assert_eq!(sequences, vec![pids(&[1, 2, 3]), pids(&[2, 1, 3])]);
        for sequence in &sequences {
            assert!(SafetyAnalyzer::verify_sequence(&snap, sequence));
        }
    }

    #[test]
    fn test_exhaustive_search_size_guard() {
        let mut builder = SystemSnapshot::builder().resource("R", 1);
        for pid in 0..4 {
            builder = builder.process(pid, format!("P{}", pid));
        }
        let snap = builder.build().unwrap();

        let err = SafetyAnalyzer::find_all_safe_sequences(&snap, 3).unwrap_err();
        assert!(matches!(err, Error::InputTooLarge { processes: 4, limit: 3 }));
        assert_eq!(
            SafetyAnalyzer::find_all_safe_sequences(&snap, 4).unwrap().len(),
            24
        );
    }

    #[test]
    fn test_verify_sequence_rejects_bad_orders() {
        let snap = SystemSnapshot::builder()
            .process(1, "P1")
            .process(2, "P2")
            .resource("R", 2)
            .allocate(2, "R", 1)
            .request(1, "R", 2)
            .request(2, "R", 1)
            .build()
            .unwrap();

        assert!(SafetyAnalyzer::verify_sequence(&snap, &pids(&[2, 1])));
        assert!(!SafetyAnalyzer::verify_sequence(&snap, &pids(&[1, 2])));
        assert!(!SafetyAnalyzer::verify_sequence(&snap, &pids(&[2, 2])));
        assert!(!SafetyAnalyzer::verify_sequence(&snap, &pids(&[2])));
    }
}
