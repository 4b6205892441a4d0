//! JSON wire representation of a [`SystemSnapshot`].
//!
//! ```json
//! {
//!   "processes":  [{"pid": 1, "name": "Reader"}],
//!   "resources":  {"DB1": {"rid": "DB1", "total": 2}},
//!   "allocation": {"1_DB1": 1},
//!   "request":    {"1_DB2": 2}
//! }
//! ```
//!
//! Matrix cells are keyed `"<pid>_<rid>"` and split on the *first*
//! underscore, so resource ids may themselves contain underscores.
//!
//! Decoding is permissive about partial data: malformed cell keys are
//! skipped, negative counts are clamped to zero and a missing process name
//! becomes `P<pid>`. Cells naming a resource that is not declared are
//! rejected with [`Error::UnknownResource`].

use super::model::{CellKey, SystemSnapshot};
use super::types::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireSnapshot {
    #[serde(default)]
    pub processes: Vec<WireProcess>,
    #[serde(default)]
    pub resources: BTreeMap<String, WireResource>,
    #[serde(default)]
    pub allocation: BTreeMap<String, i64>,
    #[serde(default)]
    pub request: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProcess {
    pub pid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    pub total: i64,
}

pub fn encode_cell_key(pid: ProcessId, rid: &ResourceId) -> String {
    format!("{}_{}", pid.0, rid.0)
}

/// Splits `"<pid>_<rid>"` on the first underscore. `None` when the key has
/// no underscore, an empty resource id, or a non-integer pid.
pub fn decode_cell_key(key: &str) -> Option<CellKey> {
    let (pid, rid) = key.split_once('_')?;
    if rid.is_empty() {
        return None;
    }
    let pid = pid.trim().parse::<u64>().ok()?;
    Some((ProcessId(pid), ResourceId::from(rid)))
}

fn clamp_units(context: &str, value: i64) -> Units {
    if value < 0 {
        warn!(context, value, "negative unit count clamped to 0");
        0
    } else {
        value
    }
}

fn decode_cells(
    table: &'static str,
    cells: BTreeMap<String, i64>,
    resources: &BTreeMap<ResourceId, Resource>,
) -> Result<BTreeMap<CellKey, Units>> {
    let mut decoded = BTreeMap::new();
    for (key, value) in cells {
        let Some((pid, rid)) = decode_cell_key(&key) else {
            warn!(table, key = %key, "skipping malformed cell key");
            continue;
        };
        if !resources.contains_key(&rid) {
            return Err(Error::UnknownResource { pid, rid, table });
        }
        let units = clamp_units(&key, value);
        if let Some(previous) = decoded.insert((pid, rid), units) {
            warn!(
                table,
                key = %key,
                previous,
                units,
                "duplicate cell key overwrites earlier value"
            );
        }
    }
    Ok(decoded)
}

impl TryFrom<WireSnapshot> for SystemSnapshot {
    type Error = Error;

    fn try_from(wire: WireSnapshot) -> Result<Self> {
        let processes: Vec<Process> = wire
            .processes
            .into_iter()
            .map(|p| {
                let name = p.name.unwrap_or_else(|| format!("P{}", p.pid));
                Process::new(p.pid, name)
            })
            .collect();

        let mut resources = BTreeMap::new();
        for (key, res) in wire.resources {
            if let Some(rid) = &res.rid {
                if rid != &key {
                    return Err(Error::ValidationError(format!(
                        "resource keyed '{}' declares rid '{}'",
                        key, rid
                    )));
                }
            }
            let total = clamp_units(&key, res.total);
            resources.insert(ResourceId::from(key.as_str()), Resource::new(key, total));
        }

        let allocation = decode_cells("allocation", wire.allocation, &resources)?;
        let request = decode_cells("request", wire.request, &resources)?;

        let snapshot = SystemSnapshot::new(processes, resources, allocation, request);
        snapshot.validate()?;
        Ok(snapshot)
    }
}

impl From<&SystemSnapshot> for WireSnapshot {
    fn from(snapshot: &SystemSnapshot) -> Self {
        let encode = |cells: &BTreeMap<CellKey, Units>| -> BTreeMap<String, i64> {
            cells
                .iter()
                .map(|((pid, rid), &units)| (encode_cell_key(*pid, rid), units))
                .collect()
        };

        WireSnapshot {
            processes: snapshot
                .processes
                .iter()
                .map(|p| WireProcess {
                    pid: p.pid.0,
                    name: Some(p.name.clone()),
                })
                .collect(),
            resources: snapshot
                .resources
                .iter()
                .map(|(rid, res)| {
                    (
                        rid.0.clone(),
                        WireResource {
                            rid: Some(res.rid.0.clone()),
                            total: res.total,
                        },
                    )
                })
                .collect(),
            allocation: encode(&snapshot.allocation),
            request: encode(&snapshot.request),
        }
    }
}

impl From<SystemSnapshot> for WireSnapshot {
    fn from(snapshot: SystemSnapshot) -> Self {
        WireSnapshot::from(&snapshot)
    }
}

impl SystemSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: WireSnapshot = serde_json::from_str(json)?;
        SystemSnapshot::try_from(wire)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let wire: WireSnapshot = serde_json::from_reader(reader)?;
        SystemSnapshot::try_from(wire)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&WireSnapshot::from(self))?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&WireSnapshot::from(self))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_key_splits_on_first_underscore() {
        assert_eq!(
            decode_cell_key("12_FILE_08:01_42"),
            Some((ProcessId(12), ResourceId::from("FILE_08:01_42")))
        );
        assert_eq!(decode_cell_key("R1"), None);
        assert_eq!(decode_cell_key("x_R1"), None);
        assert_eq!(decode_cell_key("3_"), None);
    }

    #[test]
    fn test_decode_web_payload() {
        let json = r#"{
            "processes": [{"pid": 1, "name": "P0"}, {"pid": 2}],
            "resources": {"R1": {"rid": "R1", "total": 3}, "R_2": {"total": 2}},
            "allocation": {"1_R1": 1, "2_R_2": 1},
            "request": {"1_R_2": 1}
        }"#;

        let snap = SystemSnapshot::from_json(json).unwrap();
        assert_eq!(snap.processes.len(), 2);
        assert_eq!(snap.processes[1].name, "P2");
        assert_eq!(snap.allocated(ProcessId(2), "R_2"), 1);
        assert_eq!(snap.requested(ProcessId(1), "R_2"), 1);
    }

    #[test]
    fn test_malformed_keys_and_negative_counts_default() {
        let json = r#"{
            "processes": [{"pid": 1, "name": "P"}],
            "resources": {"R": {"total": -4}},
            "allocation": {"garbage": 3, "1_R": -2},
            "request": {}
        }"#;

        let snap = SystemSnapshot::from_json(json).unwrap();
        assert_eq!(snap.resources["R"].total, 0);
        assert_eq!(snap.allocation.len(), 1);
        assert_eq!(snap.allocated(ProcessId(1), "R"), 0);
    }

    #[test]
    fn test_equivalent_keys_collapse_to_one_cell() {
        // "01_R" sorts before "1_R", so the latter is decoded last and wins.
        let snap = SystemSnapshot::from_json(
            r#"{
                "processes": [{"pid": 1}],
                "resources": {"R": {"total": 5}},
                "allocation": {"01_R": 4, "1_R": 2}
            }"#,
        )
        .unwrap();

        assert_eq!(snap.allocation.len(), 1);
        assert_eq!(snap.allocated(ProcessId(1), "R"), 2);
    }

    #[test]
    fn test_unknown_resource_rejected_at_boundary() {
        let json = r#"{
            "processes": [{"pid": 1, "name": "P"}],
            "resources": {"R": {"total": 1}},
            "allocation": {"1_Q": 1}
        }"#;

        let err = SystemSnapshot::from_json(json).unwrap_err();
        assert!(matches!(err, Error::UnknownResource { table: "allocation", .. }));
    }

    #[test]
    fn test_encode_keeps_zero_cells() {
        let snap = SystemSnapshot::builder()
            .process(4, "P4")
            .resource("R_x", 1)
            .allocate(4, "R_x", 0)
            .build()
            .unwrap();

        let wire = WireSnapshot::from(&snap);
        assert_eq!(wire.allocation.get("4_R_x"), Some(&0));
        assert_eq!(SystemSnapshot::try_from(wire).unwrap(), snap);
    }
}
