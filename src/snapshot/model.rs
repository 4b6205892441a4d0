// System snapshot: processes, resources, allocation and request matrices
use super::types::*;
use super::wire::WireSnapshot;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// `(pid, rid)` cell of the allocation / request matrices.
pub type CellKey = (ProcessId, ResourceId);

/// A consistent point-in-time view of the resource-allocation state.
///
/// Absent `(pid, rid)` cells read as 0. The `request` matrix is the
/// process's *entire remaining need*: there is no separate maximum-claim
/// matrix, so the safety check treats `request` as `need` directly.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "WireSnapshot", into = "WireSnapshot")]
pub struct SystemSnapshot {
    pub processes: Vec<Process>,
    pub resources: BTreeMap<ResourceId, Resource>,
    pub allocation: BTreeMap<CellKey, Units>,
    pub request: BTreeMap<CellKey, Units>,
}

/// A resource whose summed allocation exceeds its capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverAllocation {
    pub rid: ResourceId,
    pub allocated: Units,
    pub total: Units,
}

impl SystemSnapshot {
    pub fn new(
        processes: Vec<Process>,
        resources: BTreeMap<ResourceId, Resource>,
        allocation: BTreeMap<CellKey, Units>,
        request: BTreeMap<CellKey, Units>,
    ) -> Self {
        SystemSnapshot {
            processes,
            resources,
            allocation,
            request,
        }
    }

    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn process(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    pub fn pids(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes.iter().map(|p| p.pid)
    }

    pub fn allocated(&self, pid: ProcessId, rid: &str) -> Units {
        cell(&self.allocation, pid, rid)
    }

    pub fn requested(&self, pid: ProcessId, rid: &str) -> Units {
        cell(&self.request, pid, rid)
    }

    /// Every allocation cell recorded for `pid`.
    pub fn allocation_of(
        &self,
        pid: ProcessId,
    ) -> impl Iterator<Item = (&ResourceId, Units)> + '_ {
        row(&self.allocation, pid)
    }

    /// Every request cell recorded for `pid`.
    pub fn request_of(
        &self,
        pid: ProcessId,
    ) -> impl Iterator<Item = (&ResourceId, Units)> + '_ {
        row(&self.request, pid)
    }

    /// Remaining need of `pid` for every known resource (request == need).
    pub fn need(&self, pid: ProcessId) -> BTreeMap<ResourceId, Units> {
        self.resources
            .keys()
            .map(|rid| (rid.clone(), self.requested(pid, rid.as_str())))
            .collect()
    }

    /// `total - Σ allocation` per resource. Negative when over-allocated,
    /// saturating at `Units::MIN`. Allocation cells naming an unknown
    /// resource show up as negative entries for that resource id.
    pub fn available(&self) -> BTreeMap<ResourceId, Units> {
        let mut available: BTreeMap<ResourceId, Units> = self
            .resources
            .iter()
            .map(|(rid, res)| (rid.clone(), res.total))
            .collect();

        for ((_, rid), &units) in &self.allocation {
            let free = available.entry(rid.clone()).or_insert(0);
            *free = free.saturating_sub(units);
        }

        available
    }

    /// Processes currently holding a positive number of units of `rid`.
    pub fn holders(&self, rid: &str) -> Vec<ProcessId> {
        self.allocation
            .iter()
            .filter(|((_, r), units)| r.as_str() == rid && **units > 0)
            .map(|((pid, _), _)| *pid)
            .collect()
    }

    /// Resources violating `Σ allocation <= total`.
    pub fn over_allocated(&self) -> Vec<OverAllocation> {
        let mut allocated: BTreeMap<&ResourceId, Units> = BTreeMap::new();
        for ((_, rid), &units) in &self.allocation {
            let sum = allocated.entry(rid).or_insert(0);
            *sum = sum.saturating_add(units);
        }

        self.resources
            .iter()
            .filter_map(|(rid, res)| {
                let sum = allocated.get(rid).copied().unwrap_or(0);
                (sum > res.total).then(|| OverAllocation {
                    rid: rid.clone(),
                    allocated: sum,
                    total: res.total,
                })
            })
            .collect()
    }

    /// Structural validation performed at the boundary. Capacity violations
    /// are not rejected here; see [`SystemSnapshot::over_allocated`].
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.processes.len());
        for process in &self.processes {
            if !seen.insert(process.pid) {
                return Err(Error::DuplicateProcess(process.pid));
            }
        }

        for (key, resource) in &self.resources {
            if key != &resource.rid {
                return Err(Error::ValidationError(format!(
                    "resource keyed '{}' declares rid '{}'",
                    key, resource.rid
                )));
            }
        }

        for (table, cells) in [("allocation", &self.allocation), ("request", &self.request)] {
            for (pid, rid) in cells.keys() {
                if !self.resources.contains_key(rid) {
                    return Err(Error::UnknownResource {
                        pid: *pid,
                        rid: rid.clone(),
                        table,
                    });
                }
            }
        }

        Ok(())
    }
}

fn cell(cells: &BTreeMap<CellKey, Units>, pid: ProcessId, rid: &str) -> Units {
    row(cells, pid)
        .find(|(r, _)| r.as_str() == rid)
        .map(|(_, units)| units)
        .unwrap_or(0)
}

fn row(
    cells: &BTreeMap<CellKey, Units>,
    pid: ProcessId,
) -> impl Iterator<Item = (&ResourceId, Units)> + '_ {
    // The empty string is the smallest ResourceId, so this starts at pid's first cell.
    cells
        .range((pid, ResourceId(String::new()))..)
        .take_while(move |((p, _), _)| *p == pid)
        .map(|((_, rid), &units)| (rid, units))
}

/// Programmatic snapshot construction for scenarios and tests.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: SystemSnapshot,
}

impl SnapshotBuilder {
    pub fn process(mut self, pid: u64, name: impl Into<String>) -> Self {
        self.snapshot.processes.push(Process::new(pid, name));
        self
    }

    pub fn resource(mut self, rid: impl Into<ResourceId>, total: Units) -> Self {
        let resource = Resource::new(rid, total);
        self.snapshot.resources.insert(resource.rid.clone(), resource);
        self
    }

    pub fn allocate(mut self, pid: u64, rid: impl Into<ResourceId>, units: Units) -> Self {
        self.snapshot
            .allocation
            .insert((ProcessId(pid), rid.into()), units);
        self
    }

    pub fn request(mut self, pid: u64, rid: impl Into<ResourceId>, units: Units) -> Self {
        self.snapshot
            .request
            .insert((ProcessId(pid), rid.into()), units);
        self
    }

    pub fn build(self) -> Result<SystemSnapshot> {
        self.snapshot.validate()?;
        Ok(self.snapshot)
    }

    /// Skips validation; used to model caller-supplied inconsistent state.
    pub fn build_unchecked(self) -> SystemSnapshot {
        self.snapshot
    }
}
