//! Deadlock Analysis Core
//!
//! Avoidance, detection and recovery over a point-in-time model of
//! processes and multi-unit resources:
//! - Banker's safety check and safe-sequence enumeration
//! - Wait-for graph construction with SCC (Tarjan) or DFS cycle detection
//! - Victim selection and simulated preemption
//! - JSON wire format shared with the web and desktop front ends

pub mod analyzer;
pub mod config;
pub mod detection;
pub mod error;
pub mod live;
pub mod scenarios;
pub mod session;
pub mod snapshot;

pub use analyzer::{
    DeadlockAnalyzer, DetectionReport, DiagnosticsReport, PredictionReport, RecoveryReport,
    SequencesReport,
};
pub use config::{AnalyzerConfig, ConfigBuilder};
pub use detection::{
    Cycle, CycleAlgorithm, CycleDetector, RecoveryManager, SafetyAnalyzer, SafetyResult,
    VictimPolicy, WaitForGraph, WaitGraphBuilder,
};
pub use error::{Error, Result};
pub use session::SnapshotSession;
pub use snapshot::{Process, ProcessId, Resource, ResourceId, SystemSnapshot, Units};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
