//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Token secret used when none is configured. Only fit for local development.
pub const DEV_TOKEN_SECRET: &str = "cipherkeep-development-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// SQLite file, or `:memory:` for a throwaway store.
    pub storage_path: PathBuf,
    pub token_secret: String,
    pub token_ttl_secs: i64,
    pub max_payload_size: usize,
    /// Items per sync batch; 0 disables paging.
    pub max_sync_batch: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8750".to_string(),
            storage_path: PathBuf::from("cipherkeep.db"),
            token_secret: DEV_TOKEN_SECRET.to_string(),
            token_ttl_secs: 86_400,
            max_payload_size: 8 * 1024 * 1024,
            max_sync_batch: 1_000,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml_dep::from_str(&content)?;
        Ok(config)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_secret.is_empty() {
            anyhow::bail!("token_secret must not be empty");
        }
        if self.token_ttl_secs <= 0 {
            anyhow::bail!("token_ttl_secs must be positive");
        }
        if self.token_secret == DEV_TOKEN_SECRET {
            tracing::warn!("Using the built-in development token secret; set CIPHERKEEP_TOKEN_SECRET in production");
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.storage_path.as_os_str() == ":memory:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ServerConfig = toml_dep::from_str(
            r#"
            listen_addr = "0.0.0.0:9000"
            max_sync_batch = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.max_sync_batch, 50);
        assert_eq!(config.token_ttl_secs, 86_400);
        assert_eq!(config.storage_path, PathBuf::from("cipherkeep.db"));
    }

    #[test]
    fn empty_secret_rejected() {
        let config = ServerConfig {
            token_secret: String::new(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn memory_path_detected() {
        let config = ServerConfig {
            storage_path: PathBuf::from(":memory:"),
            ..ServerConfig::default()
        };
        assert!(config.is_in_memory());
        assert!(!ServerConfig::default().is_in_memory());
    }
}
