//! Processing config: batch size, concurrency, and retry budget.

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

fn default_batch_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    6
}

/// Worker resource settings for one vectorizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum queue entries claimed per batch.
    pub batch_size: usize,
    /// Concurrent pipeline tasks within one worker invocation.
    pub concurrency: usize,
    /// Attempts before a queue entry is left as a visible dead letter.
    pub max_attempts: u32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ProcessingConfig {
    /// Validate parameter ranges.
    pub fn validate(&self, _source: &SourceSchemaInfo) -> Result<()> {
        if !(1..=2048).contains(&self.batch_size) {
            return Err(ConfigError::OutOfRange {
                param: "batch_size",
                detail: format!("must be in 1..=2048, got {}", self.batch_size),
            });
        }
        if !(1..=64).contains(&self.concurrency) {
            return Err(ConfigError::OutOfRange {
                param: "concurrency",
                detail: format!("must be in 1..=64, got {}", self.concurrency),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                param: "max_attempts",
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceSchemaInfo {
        SourceSchemaInfo { table: "t".into(), columns: vec![] }
    }

    #[test]
    fn defaults_valid() {
        let cfg = ProcessingConfig::default();
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.max_attempts, 6);
        assert!(cfg.validate(&source()).is_ok());
    }

    #[test]
    fn batch_size_bounds() {
        let cfg = ProcessingConfig { batch_size: 0, ..Default::default() };
        assert!(cfg.validate(&source()).is_err());
        let cfg = ProcessingConfig { batch_size: 4096, ..Default::default() };
        assert!(cfg.validate(&source()).is_err());
    }

    #[test]
    fn concurrency_bounds() {
        let cfg = ProcessingConfig { concurrency: 65, ..Default::default() };
        assert!(cfg.validate(&source()).is_err());
    }

    #[test]
    fn zero_max_attempts_rejected() {
        let cfg = ProcessingConfig { max_attempts: 0, ..Default::default() };
        assert!(cfg.validate(&source()).is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ProcessingConfig = serde_json::from_str(r#"{"batch_size":10}"#).unwrap();
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.concurrency, 1);
    }
}
