//! Analyzer Configuration
//!
//! Features:
//! - Defaults matching the interactive tool (banker + wfg enabled, `min_impact` recovery)
//! - `DEADLOCK_*` environment overrides
//! - Configuration validation
//! - Builder for programmatic setup

use crate::detection::{
    CycleAlgorithm, VictimPolicy, DEFAULT_EXHAUSTIVE_LIMIT, DEFAULT_WAIT_CHAIN_LIMIT,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Largest accepted exhaustive-search limit (10! is 3.6M orders).
pub const MAX_EXHAUSTIVE_LIMIT: usize = 10;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Avoidance (safety check)
    pub banker: BankerConfig,

    /// Detection (wait-for graph)
    pub wfg: WfgConfig,

    /// Recovery simulation
    pub recovery: RecoveryConfig,

    /// Logging used by the command-line front end
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankerConfig {
    pub enabled: bool,

    /// Process count above which exhaustive safe-sequence search is refused
    pub max_exhaustive_processes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WfgConfig {
    pub enabled: bool,

    pub algorithm: CycleAlgorithm,

    /// Cap on wait chains reported by diagnostics
    pub max_wait_chains: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecoveryConfig {
    pub policy: VictimPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Colored output
    pub ansi: bool,
}

impl Default for BankerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_exhaustive_processes: DEFAULT_EXHAUSTIVE_LIMIT,
        }
    }
}

impl Default for WfgConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: CycleAlgorithm::Scc,
            max_wait_chains: DEFAULT_WAIT_CHAIN_LIMIT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl AnalyzerConfig {
    /// Defaults with `DEADLOCK_*` environment overrides applied, validated.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from `lookup` (an environment-like key source).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(algorithm) = lookup("DEADLOCK_ALGORITHM") {
            self.wfg.algorithm = algorithm.parse()?;
        }
        if let Some(policy) = lookup("DEADLOCK_RECOVERY_POLICY") {
            self.recovery.policy = policy.parse()?;
        }
        if let Some(limit) = lookup("DEADLOCK_MAX_EXHAUSTIVE") {
            self.banker.max_exhaustive_processes = limit
                .parse()
                .map_err(|_| Error::ConfigError("Invalid DEADLOCK_MAX_EXHAUSTIVE".to_string()))?;
        }
        if let Some(enabled) = lookup("DEADLOCK_BANKER_ENABLED") {
            self.banker.enabled = enabled
                .parse()
                .map_err(|_| Error::ConfigError("Invalid DEADLOCK_BANKER_ENABLED".to_string()))?;
        }
        if let Some(enabled) = lookup("DEADLOCK_WFG_ENABLED") {
            self.wfg.enabled = enabled
                .parse()
                .map_err(|_| Error::ConfigError("Invalid DEADLOCK_WFG_ENABLED".to_string()))?;
        }
        if let Some(level) = lookup("DEADLOCK_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.banker.max_exhaustive_processes > MAX_EXHAUSTIVE_LIMIT {
            return Err(Error::ConfigError(format!(
                "Exhaustive search limit {} exceeds maximum {}",
                self.banker.max_exhaustive_processes, MAX_EXHAUSTIVE_LIMIT
            )));
        }

        if self.wfg.max_wait_chains == 0 {
            return Err(Error::ConfigError(
                "max_wait_chains must be at least 1".to_string(),
            ));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::ConfigError(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

/// Configuration builder for programmatic setup
#[derive(Default)]
pub struct ConfigBuilder {
    config: AnalyzerConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm: CycleAlgorithm) -> Self {
        self.config.wfg.algorithm = algorithm;
        self
    }

    pub fn with_policy(mut self, policy: VictimPolicy) -> Self {
        self.config.recovery.policy = policy;
        self
    }

    pub fn with_exhaustive_limit(mut self, processes: usize) -> Self {
        self.config.banker.max_exhaustive_processes = processes;
        self
    }

    pub fn with_wait_chain_limit(mut self, chains: usize) -> Self {
        self.config.wfg.max_wait_chains = chains;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn banker_enabled(mut self, enabled: bool) -> Self {
        self.config.banker.enabled = enabled;
        self
    }

    pub fn wfg_enabled(mut self, enabled: bool) -> Self {
        self.config.wfg.enabled = enabled;
        self
    }

    pub fn build(self) -> Result<AnalyzerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
