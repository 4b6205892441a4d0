//! Scenario generator - classic deadlock setups for teaching and demos
//!
//! Every generated snapshot is structurally valid by construction.

use crate::error::{Error, Result};
use crate::snapshot::{SnapshotBuilder, SystemSnapshot, Units};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    DiningPhilosophers { philosophers: usize },
    ReaderWriter,
    CircularWait { processes: usize },
    BankerUnsafe,
    NoDeadlock,
    ProducerConsumer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub kind: &'static str,
    pub difficulty: &'static str,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::DiningPhilosophers { philosophers: 5 },
        Scenario::ReaderWriter,
        Scenario::CircularWait { processes: 4 },
        Scenario::BankerUnsafe,
        Scenario::NoDeadlock,
        Scenario::ProducerConsumer,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Scenario::DiningPhilosophers { .. } => "dining_philosophers",
            Scenario::ReaderWriter => "reader_writer",
            Scenario::CircularWait { .. } => "circular_wait",
            Scenario::BankerUnsafe => "banker_unsafe",
            Scenario::NoDeadlock => "no_deadlock",
            Scenario::ProducerConsumer => "producer_consumer",
        }
    }

    pub fn build(&self) -> SystemSnapshot {
        match *self {
            Scenario::DiningPhilosophers { philosophers } => dining_philosophers(philosophers),
            Scenario::ReaderWriter => reader_writer(),
            Scenario::CircularWait { processes } => circular_wait(processes),
            Scenario::BankerUnsafe => banker_unsafe(),
            Scenario::NoDeadlock => no_deadlock(),
            Scenario::ProducerConsumer => producer_consumer(),
        }
    }

    pub fn info(&self) -> ScenarioInfo {
        let (name, description, kind, difficulty) = match self {
            Scenario::DiningPhilosophers { .. } => (
                "Dining Philosophers",
                "Each philosopher holds the left fork and waits for the right one",
                "Circular Wait",
                "Easy",
            ),
            Scenario::ReaderWriter => (
                "Reader-Writer Deadlock",
                "Reader and writer processes competing for database locks",
                "Hold and Wait",
                "Medium",
            ),
            Scenario::CircularWait { .. } => (
                "Circular Wait",
                "P0 -> R0 -> P1 -> R1 -> ... -> P0 single-unit dependency ring",
                "Circular Wait",
                "Easy",
            ),
            Scenario::BankerUnsafe => (
                "Banker's Unsafe State",
                "Every unit is allocated and no process can complete",
                "Unsafe State",
                "Hard",
            ),
            Scenario::NoDeadlock => (
                "Safe State (No Deadlock)",
                "Every request fits in free units; a safe sequence exists",
                "Safe",
                "Easy",
            ),
            Scenario::ProducerConsumer => (
                "Producer-Consumer Deadlock",
                "Producer and consumer acquire buffer and semaphore in opposite order",
                "Hold and Wait",
                "Medium",
            ),
        };

        ScenarioInfo {
            key: self.key(),
            name,
            description,
            kind,
            difficulty,
        }
    }
}

impl FromStr for Scenario {
    type Err = Error;

    /// Accepts a scenario key, optionally sized: `dining_philosophers:6`.
    fn from_str(s: &str) -> Result<Self> {
        let (key, size) = match s.split_once(':') {
            Some((key, size)) => {
                let size = size
                    .parse::<usize>()
                    .map_err(|_| Error::ValidationError(format!("Invalid scenario size: {}", s)))?;
                (key, Some(size))
            }
            None => (s, None),
        };

        let scenario = match key.to_lowercase().replace('-', "_").as_str() {
            "dining_philosophers" => Scenario::DiningPhilosophers {
                philosophers: size.unwrap_or(5),
            },
            "circular_wait" => Scenario::CircularWait {
                processes: size.unwrap_or(4),
            },
            "reader_writer" => Scenario::ReaderWriter,
            "banker_unsafe" => Scenario::BankerUnsafe,
            "no_deadlock" => Scenario::NoDeadlock,
            "producer_consumer" => Scenario::ProducerConsumer,
            _ => return Err(Error::ValidationError(format!("Unknown scenario: {}", s))),
        };
        Ok(scenario)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::DiningPhilosophers { philosophers } => {
                write!(f, "{}:{}", self.key(), philosophers)
            }
            Scenario::CircularWait { processes } => write!(f, "{}:{}", self.key(), processes),
            _ => f.write_str(self.key()),
        }
    }
}

/// Ring of `n` single-unit resources; process `i` holds `<prefix>i` and
/// requests `<prefix>(i+1 mod n)`.
fn ring(n: usize, process_name: impl Fn(usize) -> String, prefix: &str) -> SystemSnapshot {
    let mut builder = SnapshotBuilder::default();
    for i in 0..n {
        builder = builder
            .process(i as u64, process_name(i))
            .resource(format!("{}{}", prefix, i), 1);
    }
    for i in 0..n {
        builder = builder
            .allocate(i as u64, format!("{}{}", prefix, i), 1)
            .request(i as u64, format!("{}{}", prefix, (i + 1) % n), 1);
    }
    builder.build_unchecked()
}

pub fn dining_philosophers(philosophers: usize) -> SystemSnapshot {
    ring(philosophers, |i| format!("Philosopher_{}", i), "F")
}

pub fn circular_wait(processes: usize) -> SystemSnapshot {
    ring(processes, |i| format!("P{}", i), "R")
}

/// Reader holds one unit of DB1 and wants both units of DB2; the writer
/// holds both units of DB2 and wants one unit of DB1.
pub fn reader_writer() -> SystemSnapshot {
    SystemSnapshot::builder()
        .process(1, "Reader")
        .process(2, "Writer")
        .resource("DB1", 2)
        .resource("DB2", 2)
        .allocate(1, "DB1", 1)
        .allocate(2, "DB2", 2)
        .request(1, "DB2", 2)
        .request(2, "DB1", 1)
        .build_unchecked()
}

pub fn banker_unsafe() -> SystemSnapshot {
    SystemSnapshot::builder()
        .process(0, "P0")
        .process(1, "P1")
        .process(2, "P2")
        .resource("R1", 3)
        .resource("R2", 2)
        .allocate(0, "R1", 2)
        .allocate(0, "R2", 0)
        .allocate(1, "R1", 1)
        .allocate(1, "R2", 1)
        .allocate(2, "R1", 0)
        .allocate(2, "R2", 1)
        .request(0, "R1", 1)
        .request(0, "R2", 2)
        .request(1, "R1", 2)
        .request(1, "R2", 1)
        .request(2, "R1", 3)
        .request(2, "R2", 1)
        .build_unchecked()
}

pub fn no_deadlock() -> SystemSnapshot {
    SystemSnapshot::builder()
        .process(0, "P0")
        .process(1, "P1")
        .process(2, "P2")
        .resource("R1", 5)
        .resource("R2", 3)
        .allocate(0, "R1", 1)
        .allocate(0, "R2", 0)
        .allocate(1, "R1", 1)
        .allocate(1, "R2", 1)
        .allocate(2, "R1", 1)
        .allocate(2, "R2", 1)
        .request(0, "R1", 1)
        .request(0, "R2", 1)
        .request(1, "R1", 1)
        .request(1, "R2", 0)
        .request(2, "R1", 0)
        .request(2, "R2", 1)
        .build_unchecked()
}

pub fn producer_consumer() -> SystemSnapshot {
    SystemSnapshot::builder()
        .process(1, "Producer")
        .process(2, "Consumer")
        .resource("Buffer", 1)
        .resource("Sem", 1)
        .allocate(1, "Buffer", 1)
        .allocate(2, "Sem", 1)
        .request(1, "Sem", 1)
        .request(2, "Buffer", 1)
        .build_unchecked()
}

/// Small mixed snapshot used as the initial state of interactive front ends.
pub fn demo() -> SystemSnapshot {
    SystemSnapshot::builder()
        .process(1, "P0")
        .process(2, "P1")
        .process(3, "P2")
        .resource("R1", 3)
        .resource("R2", 2)
        .allocate(1, "R1", 1)
        .allocate(2, "R1", 1)
        .allocate(2, "R2", 1)
        .allocate(3, "R2", 1)
        .request(1, "R2", 1)
        .request(2, "R1", 1)
        .request(3, "R1", 1)
        .build_unchecked()
}

/// Seeded random snapshot that respects every resource's capacity.
/// Resource totals are 1..=4 units; each process requests up to a resource's
/// total with probability one half.
pub fn random(seed: u64, processes: usize, resources: usize) -> SystemSnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = SnapshotBuilder::default();

    for pid in 0..processes {
        builder = builder.process(pid as u64, format!("P{}", pid));
    }

    for r in 0..resources {
        let rid = format!("R{}", r);
        let total: Units = rng.gen_range(1..=4);
        builder = builder.resource(rid.as_str(), total);

        let mut free = total;
        for pid in 0..processes {
            if free > 0 && rng.gen_bool(0.5) {
                let units = rng.gen_range(1..=free);
                free -= units;
                builder = builder.allocate(pid as u64, rid.as_str(), units);
            }
            if rng.gen_bool(0.5) {
                builder = builder.request(pid as u64, rid.as_str(), rng.gen_range(1..=total));
            }
        }
    }

    builder.build_unchecked()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ProcessId;

    #[test]
    fn test_all_scenarios_are_valid() {
        for scenario in Scenario::ALL {
            let snap = scenario.build();
            assert!(snap.validate().is_ok(), "{} invalid", scenario);
            assert!(snap.over_allocated().is_empty(), "{} over-allocated", scenario);
        }
        assert!(demo().validate().is_ok());
    }

    #[test]
    fn test_dining_philosophers_layout() {
        let snap = dining_philosophers(4);
        assert_eq!(snap.processes.len(), 4);
        assert_eq!(snap.resources.len(), 4);
        assert_eq!(snap.allocated(ProcessId(3), "F3"), 1);
        assert_eq!(snap.requested(ProcessId(3), "F0"), 1);
        assert_eq!(snap.processes[2].name, "Philosopher_2");
    }

    #[test]
    fn test_parse_scenario_keys() {
        assert_eq!(
            "dining_philosophers:4".parse::<Scenario>().unwrap(),
            Scenario::DiningPhilosophers { philosophers: 4 }
        );
        assert_eq!(
            "circular-wait".parse::<Scenario>().unwrap(),
            Scenario::CircularWait { processes: 4 }
        );
        assert!("bakery".parse::<Scenario>().is_err());
        assert!("circular_wait:x".parse::<Scenario>().is_err());
        for scenario in Scenario::ALL {
            assert_eq!(scenario.to_string().parse::<Scenario>().unwrap(), scenario);
        }
    }

    #[test]
    fn test_random_is_seeded_and_within_capacity() {
        let a = random(42, 6, 3);
        let b = random(42, 6, 3);
        assert_eq!(a, b);
        assert!(a.validate().is_ok());
        assert!(a.over_allocated().is_empty());
        assert_eq!(a.processes.len(), 6);
        assert_eq!(a.resources.len(), 3);
    }
}
