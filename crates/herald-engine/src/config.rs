//! Engine configuration and runtime-tunable updates.

use serde::{Deserialize, Serialize};

use crate::{EngineError, RetryPolicy};

/// Runtime configuration for the scheduling engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum publishes in flight at once.
    pub max_concurrent_jobs: usize,
    /// Seconds between periodic ticks.
    pub processing_interval_secs: u64,
    /// Queue capacity; enqueues beyond this are rejected.
    pub max_queue_size: usize,
    /// Soft per-tick budget. In-flight publishes finish; new dequeues stop.
    pub tick_budget_secs: u64,
    /// Log filter directive, e.g. "info" or "herald=debug".
    pub log_level: String,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            processing_interval_secs: 300,
            max_queue_size: 100,
            tick_budget_secs: 120,
            log_level: "info".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Partial update merged into a live [`EngineConfig`]. Absent fields keep
/// their current values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    pub max_concurrent_jobs: Option<usize>,
    pub processing_interval_secs: Option<u64>,
    pub max_queue_size: Option<usize>,
    pub tick_budget_secs: Option<u64>,
    pub log_level: Option<String>,
    pub retry: Option<RetryPolicy>,
}

impl EngineConfig {
    /// Merge `update` in, validating the result first. On error the config
    /// is left untouched.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<(), EngineError> {
        let mut next = self.clone();

        if let Some(v) = update.max_concurrent_jobs {
            next.max_concurrent_jobs = v;
        }
        if let Some(v) = update.processing_interval_secs {
            next.processing_interval_secs = v;
        }
        if let Some(v) = update.max_queue_size {
            next.max_queue_size = v;
        }
        if let Some(v) = update.tick_budget_secs {
            next.tick_budget_secs = v;
        }
        if let Some(v) = &update.log_level {
            next.log_level = v.clone();
        }
        if let Some(v) = update.retry {
            next.retry = v;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.max_concurrent_jobs == 0 || self.max_concurrent_jobs > 32 {
            return Err(EngineError::InvalidConfig(format!(
                "max_concurrent_jobs must be 1..=32, got {}",
                self.max_concurrent_jobs
            )));
        }
        if self.processing_interval_secs < 5 {
            return Err(EngineError::InvalidConfig(format!(
                "processing_interval_secs must be at least 5, got {}",
                self.processing_interval_secs
            )));
        }
        if self.max_queue_size == 0 {
            return Err(EngineError::InvalidConfig(
                "max_queue_size must be positive".to_string(),
            ));
        }
        if self.tick_budget_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "tick_budget_secs must be positive".to_string(),
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "log_level must not be empty".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "retry.max_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_apply_merges_only_provided_fields() {
        let mut config = EngineConfig::default();
        let update = ConfigUpdate {
            max_concurrent_jobs: Some(2),
            log_level: Some("herald=debug".to_string()),
            ..Default::default()
        };

        config.apply(&update).unwrap();

        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.log_level, "herald=debug");
        // Untouched fields keep defaults
        assert_eq!(config.processing_interval_secs, 300);
        assert_eq!(config.max_queue_size, 100);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_invalid_update_leaves_config_unchanged() {
        let mut config = EngineConfig::default();
        let before = config.clone();

        let update = ConfigUpdate {
            max_concurrent_jobs: Some(0),
            processing_interval_secs: Some(600),
            ..Default::default()
        };

        assert!(matches!(
            config.apply(&update),
            Err(EngineError::InvalidConfig(_))
        ));
        assert_eq!(config, before);
    }

    #[test]
    fn test_interval_lower_bound() {
        let mut config = EngineConfig::default();
        let update = ConfigUpdate {
            processing_interval_secs: Some(1),
            ..Default::default()
        };
        assert!(config.apply(&update).is_err());
    }
}
