//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// How the scheduler decides a source did not change during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityCheck {
    /// Stable only when the cycle handed back the very same tree object
    Reference,
    /// Same object, or deep-equal content and markers
    Structural,
}

/// Recipe scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on cycles; running out is reported, not an error
    pub max_cycles: usize,
    /// Abort the run on the first recipe failure instead of recording a marker
    pub fail_fast: bool,
    pub stability: StabilityCheck,
    /// Keep unchanged sources in [`crate::Changeset::results`]
    pub include_unchanged: bool,
    /// Process the sources of each cycle on the rayon thread pool
    pub parallel: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_cycles: 3,
            fail_fast: false,
            stability: StabilityCheck::Structural,
            include_unchanged: false,
            parallel: true,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, SchedulerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_cycles == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_cycles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_cycles(mut self, max: usize) -> Self {
        self.max_cycles = max;
        self
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    pub fn stability(mut self, check: StabilityCheck) -> Self {
        self.stability = check;
        self
    }

    pub fn include_unchanged(mut self, include: bool) -> Self {
        self.include_unchanged = include;
        self
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }
}
