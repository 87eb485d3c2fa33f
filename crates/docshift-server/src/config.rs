//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use docshift_core::{IndexWaitConfig, MigrationConfig, StoreConfig};

use crate::error::Error;

/// Default HTTP address for the health endpoints.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

/// Default store directory.
pub const DEFAULT_DATA_PATH: &str = "./data";

/// docshift server command line arguments.
#[derive(Debug, Parser)]
#[command(name = "docshift-server")]
#[command(version, about = "Runs pending docshift migrations and reports readiness")]
pub struct Args {
    /// Path to the document store directory.
    #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Address for the health endpoints.
    #[arg(short, long, default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen: String,

    /// Documents read per migration batch.
    #[arg(long, default_value_t = 200)]
    pub batch_size: usize,

    /// Readiness polls before an index is given up on.
    #[arg(long, default_value_t = 10)]
    pub index_wait_attempts: u32,

    /// Base delay (ms) between index readiness polls, multiplied by the attempt.
    #[arg(long, default_value_t = 1000)]
    pub index_wait_base_ms: u64,

    /// Store page cache size in MiB.
    #[arg(long)]
    pub cache_capacity_mb: Option<u64>,

    /// Run the migrations and exit without serving HTTP.
    #[arg(long)]
    pub no_http: bool,
}

impl Args {
    /// Convert arguments into server configuration.
    pub fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new(self.data_path)
            .with_batch_size(self.batch_size)
            .with_index_wait(IndexWaitConfig {
                attempts: self.index_wait_attempts,
                base_delay: Duration::from_millis(self.index_wait_base_ms),
            });

        config = if self.no_http {
            config.without_http()
        } else {
            config.with_listen_address(self.listen)
        };

        if let Some(mb) = self.cache_capacity_mb {
            config = config.with_cache_capacity(mb * 1024 * 1024);
        }
        config
    }
}

/// docshift server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the document store directory.
    pub data_path: PathBuf,

    /// HTTP address of the health endpoints. None disables HTTP.
    pub listen_address: Option<String>,

    /// Store page cache size in bytes. None keeps the store default.
    pub cache_capacity: Option<u64>,

    /// Migration executor settings.
    pub migration: MigrationConfig,
}

impl ServerConfig {
    /// Create a configuration with defaults for the given data path.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            listen_address: Some(DEFAULT_LISTEN_ADDRESS.to_string()),
            cache_capacity: None,
            migration: MigrationConfig::default(),
        }
    }

    pub fn with_listen_address(mut self, address: impl Into<String>) -> Self {
        self.listen_address = Some(address.into());
        self
    }

    /// Run without the health endpoints.
    pub fn without_http(mut self) -> Self {
        self.listen_address = None;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.migration = self.migration.with_batch_size(batch_size);
        self
    }

    pub fn with_index_wait(mut self, index_wait: IndexWaitConfig) -> Self {
        self.migration = self.migration.with_index_wait(index_wait);
        self
    }

    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = Some(bytes);
        self
    }

    /// Reject settings the executor cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.migration.index_wait.attempts == 0 {
            return Err(Error::Config(
                "index wait needs at least one attempt".to_string(),
            ));
        }
        if self.data_path.as_os_str().is_empty() {
            return Err(Error::Config("data path is empty".to_string()));
        }
        Ok(())
    }

    /// Store settings for the data path.
    pub fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::new(&self.data_path);
        match self.cache_capacity {
            Some(bytes) => config.with_cache_capacity(bytes),
            None => config,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "docshift-server",
            "--data-path",
            "/var/lib/docshift",
            "--batch-size",
            "50",
            "--index-wait-attempts",
            "3",
            "--index-wait-base-ms",
            "20",
        ]);
        let config = args.into_config();

        assert_eq!(config.data_path, PathBuf::from("/var/lib/docshift"));
        assert_eq!(config.listen_address.as_deref(), Some(DEFAULT_LISTEN_ADDRESS));
        assert_eq!(config.migration.batch_size, 50);
        assert_eq!(config.migration.index_wait.attempts, 3);
        assert_eq!(
            config.migration.index_wait.base_delay,
            Duration::from_millis(20)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_http_flag() {
        let config = Args::parse_from(["docshift-server", "--no-http"]).into_config();
        assert!(config.listen_address.is_none());
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let config = ServerConfig::default().with_index_wait(IndexWaitConfig {
            attempts: 0,
            base_delay: Duration::from_millis(1),
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
