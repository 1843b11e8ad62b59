//! Core configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the subsystem can start with zero
//! configuration for local development.

use std::path::PathBuf;

/// Chat core configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Explicit database file path.
    /// Env: `SKILLSWAP_DB_PATH`
    /// Default: `None` (platform data directory, see `Database::new`).
    pub db_path: Option<PathBuf>,

    /// Maximum accepted message length in characters, after trimming.
    /// Env: `SKILLSWAP_MAX_MESSAGE_LEN`
    /// Default: `4096`
    pub max_message_len: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            max_message_len: 4096,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SKILLSWAP_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(val) = std::env::var("SKILLSWAP_MAX_MESSAGE_LEN") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_message_len = n,
                _ => {
                    tracing::warn!(
                        value = %val,
                        "Invalid SKILLSWAP_MAX_MESSAGE_LEN, using default"
                    );
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert!(config.db_path.is_none());
        assert_eq!(config.max_message_len, 4096);
    }
}
