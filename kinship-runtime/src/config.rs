//! Configuration file parsing for `kinship.toml`.
//!
//! ```rust
//! use kinship_runtime::KinshipConfig;
//!
//! let config = KinshipConfig::from_str(r#"
//!     [loading]
//!     slow_load_threshold_ms = 250
//!
//!     [presentation]
//!     strict_selection = false
//! "#).unwrap();
//!
//! assert_eq!(config.loading.slow_load_threshold_ms, 250);
//! assert!(!config.presentation.strict_selection);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{EntityError, EntityResult};

/// Main configuration structure for `kinship.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KinshipConfig {
    /// Association loading settings.
    #[serde(default)]
    pub loading: LoadingConfig,

    /// Field projection settings.
    #[serde(default)]
    pub presentation: PresentationConfig,

    /// Debug/logging settings.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl KinshipConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> EntityResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EntityError::invalid_configuration(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))
            .with_source(Box::new(e))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> EntityResult<Self> {
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| {
            EntityError::invalid_configuration(format!("invalid kinship.toml: {}", e))
                .with_source(Box::new(e))
        })
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(loading) = overrides.loading {
                if let Some(threshold) = loading.slow_load_threshold_ms {
                    self.loading.slow_load_threshold_ms = threshold;
                }
            }
            if let Some(presentation) = overrides.presentation {
                if let Some(strict) = presentation.strict_selection {
                    self.presentation.strict_selection = strict;
                }
            }
            if let Some(debug) = overrides.debug {
                if let Some(log_loads) = debug.log_loads {
                    self.debug.log_loads = log_loads;
                }
            }
        }
        self
    }
}

/// Association loading configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoadingConfig {
    /// Loader calls slower than this many milliseconds log a warning.
    /// Zero disables the check.
    #[serde(default = "default_slow_load_threshold")]
    pub slow_load_threshold_ms: u64,
}

impl LoadingConfig {
    /// The slow-load threshold as a duration, `None` when disabled.
    pub fn slow_load_threshold(&self) -> Option<Duration> {
        (self.slow_load_threshold_ms > 0).then(|| Duration::from_millis(self.slow_load_threshold_ms))
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            slow_load_threshold_ms: default_slow_load_threshold(),
        }
    }
}

fn default_slow_load_threshold() -> u64 {
    1000
}

/// Field projection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresentationConfig {
    /// Reject selections naming undeclared fields.
    #[serde(default = "default_true")]
    pub strict_selection: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            strict_selection: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Debug configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log every batched fetch at debug level.
    #[serde(default)]
    pub log_loads: bool,
}

/// Environment-specific configuration overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Loading overrides.
    pub loading: Option<LoadingOverride>,

    /// Presentation overrides.
    pub presentation: Option<PresentationOverride>,

    /// Debug overrides.
    pub debug: Option<DebugOverride>,
}

/// Loading overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoadingOverride {
    /// Slow-load threshold override.
    pub slow_load_threshold_ms: Option<u64>,
}

/// Presentation overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresentationOverride {
    /// Strict selection override.
    pub strict_selection: Option<bool>,
}

/// Debug overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugOverride {
    /// Load logging override.
    pub log_loads: Option<bool>,
}

/// Expand `${VAR}` references; unknown variables are left as written.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
