//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Split engine limits.
    #[serde(default)]
    pub split: SplitConfig,
    /// Acceptance process configuration.
    #[serde(default)]
    pub acceptance: AcceptanceConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Split engine limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitConfig {
    /// Maximum number of chunks a single split may produce.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    /// Minimum chunk count accepted for a by-record-count split.
    #[serde(default = "default_min_chunk_count")]
    pub min_chunk_count: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_chunks: default_max_chunks(),
            min_chunk_count: default_min_chunk_count(),
        }
    }
}

fn default_max_chunks() -> usize {
    100
}

fn default_min_chunk_count() -> usize {
    2
}

/// Acceptance process configuration.
///
/// Passed explicitly into the acceptance service on every call, never read
/// from ambient global state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcceptanceConfig {
    /// Allows one user to sign off more than once per approval type.
    #[serde(default)]
    pub allow_multiple_approvals_per_user: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("AIDRA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_config_defaults() {
        let cfg = SplitConfig::default();
        assert_eq!(cfg.max_chunks, 100);
        assert_eq!(cfg.min_chunk_count, 2);
    }

    #[test]
    fn test_acceptance_config_defaults() {
        let cfg = AcceptanceConfig::default();
        assert!(!cfg.allow_multiple_approvals_per_user);
    }
}
