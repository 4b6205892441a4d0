// Deadlock recovery: victim selection and simulated preemption
use super::cycles::Cycle;
use crate::error::Error;
use crate::snapshot::{ProcessId, SystemSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictimPolicy {
    /// The smallest pid of each cycle.
    #[default]
    MinImpact,
}

impl FromStr for VictimPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "min_impact" => Ok(VictimPolicy::MinImpact),
            _ => Err(Error::ConfigError(format!("Invalid recovery policy: {}", s))),
        }
    }
}

impl fmt::Display for VictimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VictimPolicy::MinImpact => f.write_str("min_impact"),
        }
    }
}

pub struct RecoveryManager;

impl RecoveryManager {
    /// One victim per cycle, in cycle order, skipping a cycle whose pick was
    /// already chosen for an earlier one. Empty cycles are ignored.
    pub fn choose_victims(cycles: &[Cycle], policy: VictimPolicy) -> Vec<ProcessId> {
        let mut victims = Vec::new();
        let mut seen = BTreeSet::new();

        for cycle in cycles {
            let candidate = match policy {
                VictimPolicy::MinImpact => cycle.first().copied(),
            };
            if let Some(pid) = candidate {
                if seen.insert(pid) {
                    victims.push(pid);
                }
            }
        }

        debug!(?victims, %policy, "victims chosen");
        victims
    }

    /// Returns a copy of `snapshot` with every allocation and request cell
    /// of each victim set to 0. Other cells are untouched. The victims are
    /// not checked against the snapshot's current cycles.
    pub fn apply_preemption(snapshot: &SystemSnapshot, victims: &[ProcessId]) -> SystemSnapshot {
        let mut next = snapshot.clone();
        if victims.is_empty() {
            return next;
        }

        let victims: BTreeSet<ProcessId> = victims.iter().copied().collect();
        for ((pid, _), units) in next.allocation.iter_mut().chain(next.request.iter_mut()) {
            if victims.contains(pid) {
                *units = 0;
            }
        }

        debug!(victims = victims.len(), "preemption applied");
        next
    }
}
