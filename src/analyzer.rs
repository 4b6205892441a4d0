//! Deadlock Analyzer - prediction, detection and recovery reports
//!
//! Wraps the engine algorithms behind the configured policies and returns
//! serializable reports for front ends (CLI, web, desktop).

use crate::config::AnalyzerConfig;
use crate::detection::{
    Cycle, CycleAlgorithm, CycleDetector, RecoveryManager, SafetyAnalyzer, VictimPolicy,
    WaitChain, WaitForGraph, WaitGraphBuilder,
};
use crate::error::{Error, Result};
use crate::snapshot::{OverAllocation, ProcessId, ResourceId, SystemSnapshot, Units};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub safe: bool,
    pub message: String,
    pub details: String,
    pub safe_sequence: Vec<ProcessId>,
    pub final_available: BTreeMap<ResourceId, Units>,
    pub over_allocated: Vec<OverAllocation>,
    pub elapsed_ms: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub has_deadlock: bool,
    pub cycles: Vec<Cycle>,
    pub message: String,
    pub algorithm: CycleAlgorithm,
    pub wait_graph: WaitForGraph,
    pub elapsed_ms: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub victims: Vec<ProcessId>,
    pub message: String,
    pub policy: VictimPolicy,
    pub cycles: Vec<Cycle>,
    pub new_snapshot: SystemSnapshot,
    /// Detection re-run on `new_snapshot` found no cycles.
    pub resolved: bool,
    pub remaining_cycles: Vec<Cycle>,
    pub elapsed_ms: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequencesReport {
    pub count: usize,
    pub sequences: Vec<Vec<ProcessId>>,
    pub elapsed_ms: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub hotspots: Vec<ProcessId>,
    pub wait_chains: Vec<WaitChain>,
    pub over_allocated: Vec<OverAllocation>,
    pub dangling_pids: Vec<ProcessId>,
    pub generated_at: DateTime<Utc>,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn pid_list(pids: &[ProcessId]) -> String {
    let raw: Vec<u64> = pids.iter().map(ProcessId::as_u64).collect();
    format!("{:?}", raw)
}

#[derive(Debug, Clone, Default)]
pub struct DeadlockAnalyzer {
    config: AnalyzerConfig,
}

impl DeadlockAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn require_banker(&self) -> Result<()> {
        if self.config.banker.enabled {
            Ok(())
        } else {
            Err(Error::ConfigError("Banker's algorithm is disabled".to_string()))
        }
    }

    fn require_wfg(&self) -> Result<()> {
        if self.config.wfg.enabled {
            Ok(())
        } else {
            Err(Error::ConfigError("Wait-for graph detection is disabled".to_string()))
        }
    }

    /// Deadlock avoidance: is there a completion order for every process?
    pub fn predict(&self, snapshot: &SystemSnapshot) -> Result<PredictionReport> {
        self.require_banker()?;
        let start = Instant::now();

        let over_allocated = snapshot.over_allocated();
        for violation in &over_allocated {
            warn!(
                rid = %violation.rid,
                allocated = violation.allocated,
                total = violation.total,
                "allocation exceeds capacity"
            );
        }

        let result = SafetyAnalyzer::is_safe(snapshot);
        let elapsed = elapsed_ms(start);
        info!(safe = result.safe, elapsed_ms = elapsed, "prediction finished");

        let (message, details) = if result.safe {
            ("SAFE", "System is in a safe state")
        } else {
            ("UNSAFE", "System may lead to deadlock")
        };

        Ok(PredictionReport {
            safe: result.safe,
            message: message.to_string(),
            details: details.to_string(),
            safe_sequence: result.safe_sequence,
            final_available: result.final_available,
            over_allocated,
            elapsed_ms: elapsed,
            generated_at: Utc::now(),
        })
    }

    /// Deadlock detection: cycles in the derived wait-for graph.
    pub fn detect(&self, snapshot: &SystemSnapshot) -> Result<DetectionReport> {
        self.require_wfg()?;
        let start = Instant::now();

        let algorithm = self.config.wfg.algorithm;
        let wait_graph = WaitGraphBuilder::build(snapshot);
        let cycles = CycleDetector::detect(&wait_graph, algorithm);
        let elapsed = elapsed_ms(start);
        info!(cycles = cycles.len(), %algorithm, elapsed_ms = elapsed, "detection finished");

        let message = if cycles.is_empty() {
            "No cycles detected".to_string()
        } else {
            format!("Found {} cycle(s)", cycles.len())
        };

        Ok(DetectionReport {
            has_deadlock: !cycles.is_empty(),
            cycles,
            message,
            algorithm,
            wait_graph,
            elapsed_ms: elapsed,
            generated_at: Utc::now(),
        })
    }

    /// Detect, pick victims, preempt, then re-detect on the result.
    pub fn recover(&self, snapshot: &SystemSnapshot) -> Result<RecoveryReport> {
        self.require_wfg()?;
        let start = Instant::now();

        let algorithm = self.config.wfg.algorithm;
        let policy = self.config.recovery.policy;

        let cycles = CycleDetector::detect(&WaitGraphBuilder::build(snapshot), algorithm);
        let victims = RecoveryManager::choose_victims(&cycles, policy);
        let new_snapshot = RecoveryManager::apply_preemption(snapshot, &victims);
        let remaining_cycles =
            CycleDetector::detect(&WaitGraphBuilder::build(&new_snapshot), algorithm);

        let elapsed = elapsed_ms(start);
        if remaining_cycles.is_empty() {
            info!(victims = victims.len(), elapsed_ms = elapsed, "recovery finished");
        } else {
            warn!(
                remaining = remaining_cycles.len(),
                "cycles remain after preemption"
            );
        }

        let message = if victims.is_empty() {
            "No recovery needed".to_string()
        } else {
            format!("Preempted processes: {}", pid_list(&victims))
        };

        Ok(RecoveryReport {
            resolved: remaining_cycles.is_empty(),
            victims,
            message,
            policy,
            cycles,
            new_snapshot,
            remaining_cycles,
            elapsed_ms: elapsed,
            generated_at: Utc::now(),
        })
    }

    /// Every safe sequence, bounded by the configured process limit.
    pub fn safe_sequences(&self, snapshot: &SystemSnapshot) -> Result<SequencesReport> {
        self.require_banker()?;
        let start = Instant::now();

        let sequences = SafetyAnalyzer::find_all_safe_sequences(
            snapshot,
            self.config.banker.max_exhaustive_processes,
        )?;

        Ok(SequencesReport {
            count: sequences.len(),
            sequences,
            elapsed_ms: elapsed_ms(start),
            generated_at: Utc::now(),
        })
    }

    /// Contention hot-spots, wait chains and model inconsistencies.
    pub fn diagnose(&self, snapshot: &SystemSnapshot) -> Result<DiagnosticsReport> {
        self.require_wfg()?;

        let wait_graph = WaitGraphBuilder::build(snapshot);
        let mut dangling_pids: Vec<ProcessId> = snapshot
            .allocation
            .keys()
            .chain(snapshot.request.keys())
            .map(|(pid, _)| *pid)
            .filter(|pid| snapshot.process(*pid).is_none())
            .collect();
        dangling_pids.sort();
        dangling_pids.dedup();

        Ok(DiagnosticsReport {
            hotspots: CycleDetector::contention_hotspots(&wait_graph),
            wait_chains: CycleDetector::wait_chains(&wait_graph, self.config.wfg.max_wait_chains),
            over_allocated: snapshot.over_allocated(),
            dangling_pids,
            generated_at: Utc::now(),
        })
    }
}
