use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::{ServiceError, ServiceResult};

/// Maximum number of data rows (header excluded) in one CSV part.
pub const MAX_ROWS_PER_CSV: u64 = 1_000_000;
/// Number of records pulled from the record source per fetch.
pub const BATCH_SIZE: usize = 10_000;
/// Size of each chunk handed to the consumer of the archive stream.
pub const STREAM_CHUNK_SIZE: usize = 8 * 1024;
/// Progress is logged every time this many rows have been written.
pub const LOG_PROGRESS_EVERY: u64 = 100_000;

/// Suggested download name for the archive.
pub const EXPORT_FILE_NAME: &str = "transactions_export.zip";

const DEFAULT_DATABASE_URL: &str = "sqlite://transactions.sqlite";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Tunables of the export pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub max_rows_per_csv: u64,
    pub batch_size: usize,
    pub chunk_size: usize,
    pub progress_every: u64,
    /// Directory under which workspaces are created. `None` means the
    /// system temp directory.
    pub workspace_root: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_rows_per_csv: MAX_ROWS_PER_CSV,
            batch_size: BATCH_SIZE,
            chunk_size: STREAM_CHUNK_SIZE,
            progress_every: LOG_PROGRESS_EVERY,
            workspace_root: None,
        }
    }
}

impl ExportConfig {
    /// Build a config from `EXPORT_*` environment variables, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> ServiceResult<Self> {
        let defaults = Self::default();
        let config = Self {
            max_rows_per_csv: env_or("EXPORT_MAX_ROWS_PER_CSV", defaults.max_rows_per_csv)?,
            batch_size: env_or("EXPORT_BATCH_SIZE", defaults.batch_size)?,
            chunk_size: env_or("EXPORT_CHUNK_SIZE", defaults.chunk_size)?,
            progress_every: env_or("EXPORT_PROGRESS_EVERY", defaults.progress_every)?,
            workspace_root: env::var("EXPORT_WORKSPACE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_max_rows_per_csv(mut self, max_rows: u64) -> Self {
        self.max_rows_per_csv = max_rows;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if self.max_rows_per_csv == 0 {
            return Err(ServiceError::Configuration("max_rows_per_csv must be greater than 0".into()));
        }
        if self.batch_size == 0 {
            return Err(ServiceError::Configuration("batch_size must be greater than 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(ServiceError::Configuration("chunk_size must be greater than 0".into()));
        }
        if self.progress_every == 0 {
            return Err(ServiceError::Configuration("progress_every must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Process-level settings for the command-line entry point.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub log_level: String,
}

impl Settings {
    /// Load `.env` (if present) and read `DATABASE_URL` / `LOG_LEVEL`.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> ServiceResult<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|_| {
            ServiceError::Configuration(format!("{} has an invalid value: {}", key, raw))
        }),
        _ => Ok(default),
    }
}
