//! Configuration loading and representation.

use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use estately_auth::ModulePolicy;

pub const LOOKUP_TIMEOUT_ENV: &str = "ESTATELY_LOOKUP_TIMEOUT_MS";
pub const MODULE_POLICY_ENV: &str = "ESTATELY_MODULE_POLICY";

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Authority core configuration.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Budget for each directory lookup (profile, role assignments).
    pub lookup_timeout: Duration,
    /// Allow-lists for sensitive modules.
    pub module_policy: ModulePolicy,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            module_policy: ModulePolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ESTATELY_LOOKUP_TIMEOUT_MS: invalid value '{value}': {source}")]
    InvalidTimeout {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("ESTATELY_LOOKUP_TIMEOUT_MS must be greater than zero")]
    ZeroTimeout,

    #[error("failed to read module policy {path:?}: {source}")]
    PolicyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse module policy {path:?}: {source}")]
    PolicyParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AuthorityConfig {
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_module_policy(mut self, policy: ModulePolicy) -> Self {
        self.module_policy = policy;
        self
    }

    /// Load from process environment; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = get(LOOKUP_TIMEOUT_ENV) {
            let millis: u64 = value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidTimeout {
                    value: value.clone(),
                    source,
                })?;
            if millis == 0 {
                return Err(ConfigError::ZeroTimeout);
            }
            config.lookup_timeout = Duration::from_millis(millis);
        }

        if let Some(path) = get(MODULE_POLICY_ENV).map(PathBuf::from) {
            let json = std::fs::read_to_string(&path).map_err(|source| ConfigError::PolicyRead {
                path: path.clone(),
                source,
            })?;
            config.module_policy = ModulePolicy::from_json(&json)
                .map_err(|source| ConfigError::PolicyParse { path, source })?;
        }

        Ok(config)
    }
}
