// Snapshot value types
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Resource unit count. Signed so that availability over an over-allocated
/// snapshot can go negative without wrapping.
pub type Units = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u64);

impl ProcessId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ProcessId {
    fn from(value: u64) -> Self {
        ProcessId(value)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(rid: impl Into<String>) -> Self {
        ResourceId(rid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        ResourceId(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        ResourceId(value)
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Process {
    pub pid: ProcessId,
    pub name: String,
}

impl Process {
    pub fn new(pid: impl Into<ProcessId>, name: impl Into<String>) -> Self {
        Process {
            pid: pid.into(),
            name: name.into(),
        }
    }
}

/// A resource class and its total installed capacity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub rid: ResourceId,
    pub total: Units,
}

impl Resource {
    pub fn new(rid: impl Into<ResourceId>, total: Units) -> Self {
        Resource {
            rid: rid.into(),
            total,
        }
    }
}
