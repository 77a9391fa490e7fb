//! Run configuration validation and loading

use std::path::Path;

use regex::Regex;

use crate::config_error;
use crate::error::{Result, SweepError};
use crate::types::RunConfig;

/// Longest name length accepted; each extra character multiplies the space by 36
pub const MAX_NAME_LENGTH: usize = 5;

const SUFFIX_PATTERN: &str = r"^\.[a-z][a-z0-9-]{1,62}$";

impl RunConfig {
    /// Load a configuration snapshot from a JSON file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SweepError::io(e.to_string(), Some(path.to_string_lossy().to_string()))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| SweepError::parse(format!("{}: {}", path.display(), e)))
    }

    /// Check every invariant that must hold before any network activity
    pub fn validate(&self) -> Result<()> {
        if self.min_length < 1 {
            return Err(config_error!("minimum length must be at least 1"));
        }
        if self.max_length > MAX_NAME_LENGTH {
            return Err(config_error!(
                "maximum length {} exceeds the limit of {}",
                self.max_length,
                MAX_NAME_LENGTH
            ));
        }
        if self.min_length > self.max_length {
            return Err(config_error!(
                "minimum length {} is greater than maximum length {}",
                self.min_length,
                self.max_length
            ));
        }
        if self.output.as_os_str().is_empty() {
            return Err(config_error!("output file must be set"));
        }
        if self.max_concurrency == 0 {
            return Err(config_error!("concurrency must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(config_error!("batch size must be at least 1"));
        }
        if self.request_timeout_ms == 0 {
            return Err(config_error!("request timeout must be positive"));
        }
        if self.canary_host.trim().is_empty() {
            return Err(config_error!("canary host must be set"));
        }

        if self.suffixes.is_empty() {
            return Err(config_error!("at least one suffix is required"));
        }
        let suffix_re = Regex::new(SUFFIX_PATTERN)
            .map_err(|e| SweepError::internal(format!("suffix pattern: {}", e)))?;
        if let Some(bad) = self.suffixes.iter().find(|s| !suffix_re.is_match(s)) {
            return Err(config_error!(
                "invalid suffix '{}' (expected a dotted lowercase label such as .com)",
                bad
            ));
        }

        Ok(())
    }
}
