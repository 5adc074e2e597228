//! Run configuration for the tracestress harness.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TIMEOUT_SECS, MAX_INSTANCES};
use crate::error::{Result, StressError};

/// Root configuration for a stress run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Number of independent stressor instances.
    pub instances: u32,
    /// Bound on counted events per instance, 0 for unbounded.
    pub max_ops: u64,
    /// Run duration in seconds, 0 to run until interrupted.
    pub timeout_secs: u64,
    /// Whether subjects join the harness' process group.
    pub join_process_group: bool,
    /// Whether subjects request `SIGKILL` on parent death.
    pub parent_death_signal: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            instances: 1,
            max_ops: 0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            join_process_group: true,
            parent_death_signal: true,
        }
    }
}

impl StressConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StressError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a runnable stress run.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance count is zero or above the limit.
    pub fn validate(&self) -> Result<()> {
        if self.instances == 0 {
            return Err(StressError::Config {
                message: "instances must be at least 1".into(),
            });
        }
        if self.instances > MAX_INSTANCES {
            return Err(StressError::Config {
                message: format!(
                    "instances must not exceed {MAX_INSTANCES} (got {})",
                    self.instances
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        StressConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_instances_rejected() {
        let cfg = StressConfig {
            instances: 0,
            ..StressConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(StressError::Config { .. })));
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stress.json");
        std::fs::write(&path, r#"{ "instances": 3, "max_ops": 500 }"#).unwrap();

        let cfg = StressConfig::load(&path).unwrap();
        assert_eq!(cfg.instances, 3);
        assert_eq!(cfg.max_ops, 500);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(cfg.join_process_group);
    }

    #[test]
    fn load_reports_missing_file_path() {
        let err = StressConfig::load(Path::new("/nonexistent/stress.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/stress.json"));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stress.json");
        std::fs::write(&path, "{ instances: }").unwrap();
        assert!(matches!(
            StressConfig::load(&path),
            Err(StressError::Serialization { .. })
        ));
    }
}
