//! Maps a process listing (as produced by a system reader) into a snapshot.
//!
//! No OS state is read here. Real lock ownership is not observable from a
//! plain process list, so the mapping is synthetic: one generic resource
//! `R` with placeholder allocation and request values.

use crate::snapshot::{ProcessId, SnapshotBuilder, SystemSnapshot, Units};
use serde::{Deserialize, Serialize};

pub const GENERIC_RESOURCE: &str = "R";
pub const GENERIC_RESOURCE_TOTAL: Units = 5;
pub const MAX_MAPPED_PROCESSES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// `{"processes": [{"pid": .., "name": ..}]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessListing {
    #[serde(default)]
    pub processes: Vec<ProcessEntry>,
}

/// Keeps the first five processes; even positions hold one unit of `R`,
/// every third position requests one unit.
pub fn to_snapshot(listing: &ProcessListing) -> SystemSnapshot {
    let mut builder =
        SnapshotBuilder::default().resource(GENERIC_RESOURCE, GENERIC_RESOURCE_TOTAL);
    let mut seen = Vec::with_capacity(MAX_MAPPED_PROCESSES);

    // Duplicate pids in a listing (pid reuse between reads) keep the first entry.
    for entry in &listing.processes {
        if seen.len() == MAX_MAPPED_PROCESSES {
            break;
        }
        if seen.contains(&ProcessId(entry.pid)) {
            continue;
        }
        let i = seen.len();
        seen.push(ProcessId(entry.pid));

        let name = entry
            .name
            .clone()
            .unwrap_or_else(|| format!("P{}", entry.pid));
        builder = builder
            .process(entry.pid, name)
            .allocate(entry.pid, GENERIC_RESOURCE, if i % 2 == 0 { 1 } else { 0 })
            .request(entry.pid, GENERIC_RESOURCE, if i % 3 == 0 { 1 } else { 0 });
    }

    builder.build_unchecked()
}
