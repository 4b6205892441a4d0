//! Snapshot Session
//!
//! Shared, mutable "current state" for interactive front ends. Analyses run
//! on a clone taken under a read lock; recovery swaps the state under the
//! write lock so concurrent readers never observe a half-applied preemption.

use crate::analyzer::{
    DeadlockAnalyzer, DetectionReport, DiagnosticsReport, PredictionReport, RecoveryReport,
};
use crate::error::Result;
use crate::snapshot::SystemSnapshot;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SnapshotSession {
    analyzer: Arc<DeadlockAnalyzer>,
    inner: Arc<RwLock<SessionInner>>,
}

struct SessionInner {
    snapshot: SystemSnapshot,
    revision: u64,
}

impl SnapshotSession {
    pub fn new(analyzer: DeadlockAnalyzer, snapshot: SystemSnapshot) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            inner: Arc::new(RwLock::new(SessionInner {
                snapshot,
                revision: 0,
            })),
        }
    }

    pub fn current(&self) -> SystemSnapshot {
        self.inner.read().snapshot.clone()
    }

    /// Bumped on every replace and every recovery that preempted something.
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    /// Installs a new state after validating it.
    pub fn replace(&self, snapshot: SystemSnapshot) -> Result<u64> {
        snapshot.validate()?;
        let mut inner = self.inner.write();
        inner.snapshot = snapshot;
        inner.revision += 1;
        Ok(inner.revision)
    }

    pub fn predict(&self) -> Result<PredictionReport> {
        self.analyzer.predict(&self.current())
    }

    pub fn detect(&self) -> Result<DetectionReport> {
        self.analyzer.detect(&self.current())
    }

    pub fn diagnose(&self) -> Result<DiagnosticsReport> {
        self.analyzer.diagnose(&self.current())
    }

    /// Runs recovery against the current state and installs the preempted
    /// snapshot when any victim was chosen.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let mut inner = self.inner.write();
        let report = self.analyzer.recover(&inner.snapshot)?;
        if !report.victims.is_empty() {
            inner.snapshot = report.new_snapshot.clone();
            inner.revision += 1;
            info!(revision = inner.revision, "session state replaced by recovery");
        }
        Ok(report)
    }
}
