use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use transaction_export_core::domains::transaction::SqliteTransactionRepository;
use transaction_export_core::{init_logging, ExportConfig, ExportService, ServiceError, Settings, TransactionExportService};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::from_env();
    init_logging(&settings.log_level);

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(transaction_export_core::config::EXPORT_FILE_NAME));

    match run(&settings, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(ServiceError::NotFound(msg)) => {
            eprintln!("{}", msg);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(settings: &Settings, output: &Path) -> Result<(), ServiceError> {
    let options = SqliteConnectOptions::from_str(&settings.database_url)
        .map_err(|e| ServiceError::Configuration(format!("invalid DATABASE_URL: {}", e)))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| ServiceError::Internal(format!("cannot open database: {}", e)))?;

    let repo = SqliteTransactionRepository::new(pool);
    repo.init_schema().await?;

    let config = ExportConfig::from_env()?;
    let service = TransactionExportService::new(Arc::new(repo), config)?;
    let archive = service.export_transactions().await?;
    let stats = archive.stats.clone();
    let checksum = archive.checksum.clone();

    archive.save_to(output).await?;

    let summary = serde_json::json!({
        "output": output.display().to_string(),
        "checksum": checksum,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string()));
    Ok(())
}
