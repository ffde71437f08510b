// Public modules
pub mod config;
pub mod domains;
pub mod errors;

pub use config::{ExportConfig, Settings};
pub use domains::export::{ExportArchive, ExportService, TransactionExportService};
pub use errors::{ServiceError, ServiceResult};

/// Initialize `env_logger` with the given default level.
///
/// `RUST_LOG` wins when it is set. Safe to call more than once.
pub fn init_logging(default_level: &str) {
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        let level = if default_level.is_empty() { "debug" } else { default_level };
        #[cfg(not(debug_assertions))]
        let level = if default_level.is_empty() { "info" } else { default_level };
        std::env::set_var("RUST_LOG", level.to_lowercase());
    }

    let _ = env_logger::try_init();
    log::debug!("Logging initialized");
}
