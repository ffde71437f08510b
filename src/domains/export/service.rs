use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::task;

use crate::config::{ExportConfig, EXPORT_FILE_NAME};
use crate::domains::transaction::{batched_stream, Transaction, TransactionSource};
use crate::errors::{DbResult, ServiceError, ServiceResult};

use super::archive::{assemble, chunk_stream};
use super::types::{expected_part_count, ExportError, ExportJob, ExportStats};
use super::workspace::Workspace;
use super::writers::{CsvPartSplitter, FsPartOpener, PartOpener, SplitConfig, SplitOutcome};

/// A finished export, ready to be streamed.
///
/// Owns the workspace holding the archive. Streaming it to the end, dropping
/// the stream, or dropping this value all remove the workspace.
#[derive(Debug)]
pub struct ExportArchive {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub size_bytes: u64,
    pub checksum: String,
    pub job: ExportJob,
    pub stats: ExportStats,
    archive_path: PathBuf,
    chunk_size: usize,
    workspace: Workspace,
}

impl ExportArchive {
    /// Consume the archive as a stream of fixed-size byte chunks.
    ///
    /// A failure while streaming is logged and reaches the consumer as a
    /// generic `ExportFailed`; any item after it is never produced.
    pub fn into_stream(self) -> ExportByteStream {
        let job_id = self.job.id;
        chunk_stream(&self.archive_path, self.workspace, self.chunk_size)
            .map(move |chunk| {
                chunk.map_err(|e| {
                    log::error!("Export job {} failed at {} stage while streaming: {}", job_id, e.stage(), e);
                    export_failed()
                })
            })
            .boxed()
    }

    /// Drain the archive into `output`.
    ///
    /// Bytes go to a temporary file next to `output` that is renamed into
    /// place only after the last chunk is written, so a failed export never
    /// leaves a truncated archive behind.
    pub async fn save_to(self, output: &Path) -> ServiceResult<u64> {
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staged = tempfile::Builder::new()
            .prefix(".transactions_export_")
            .suffix(".partial")
            .tempfile_in(&dir)
            .map_err(|e| output_error(output, e))?;
        let handle = staged.as_file().try_clone().map_err(|e| output_error(output, e))?;
        let mut file = tokio::fs::File::from_std(handle);

        let mut written = 0u64;
        let mut stream = self.into_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| output_error(output, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| output_error(output, e))?;
        drop(file);

        staged.persist(output).map_err(|e| output_error(output, e.error))?;
        log::info!("Saved export archive to {} ({} bytes)", output.display(), written);
        Ok(written)
    }
}

/// Archive bytes as seen by callers of the export service.
pub type ExportByteStream = BoxStream<'static, ServiceResult<Vec<u8>>>;

fn export_failed() -> ServiceError {
    ServiceError::ExportFailed("Error exporting transactions".to_string())
}

fn output_error(output: &Path, e: std::io::Error) -> ServiceError {
    ServiceError::Internal(format!("cannot write {}: {}", output.display(), e))
}

#[derive(Debug)]
pub enum ExportOutcome {
    Ready(ExportArchive),
    /// The source produced no records; nothing was left on disk.
    Empty,
}

/// Source → CSV parts → archive, inside one workspace per run.
pub struct ExportPipeline<O: PartOpener = FsPartOpener> {
    source: Arc<dyn TransactionSource>,
    config: ExportConfig,
    opener: O,
}

impl ExportPipeline<FsPartOpener> {
    pub fn new(source: Arc<dyn TransactionSource>, config: ExportConfig) -> Self {
        Self::with_opener(source, config, FsPartOpener)
    }
}

impl<O> ExportPipeline<O>
where
    O: PartOpener + Clone + Sync + 'static,
{
    pub fn with_opener(source: Arc<dyn TransactionSource>, config: ExportConfig, opener: O) -> Self {
        Self { source, config, opener }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Run one export job.
    ///
    /// On failure the workspace is removed before the error is returned.
    pub async fn run(&self) -> Result<ExportOutcome, ExportError> {
        let started = Instant::now();

        if let Err(e) = self.config.validate() {
            log::error!("Export rejected before start: {}", e);
            return Err(ExportError::Configuration(e.to_string()));
        }

        let expected_rows = match self.source.count_transactions().await {
            Ok(count) => count,
            Err(e) => {
                log::error!("Export failed at source stage: {}", e);
                return Err(ExportError::SourceRead(e.to_string()));
            }
        };
        log::info!(
            "Starting export of {} transactions (expected {} file(s))",
            expected_rows,
            expected_part_count(expected_rows, self.config.max_rows_per_csv)
        );

        let mut workspace = Workspace::begin(self.config.workspace_root.as_deref())?;

        let split = match self.write_parts(&workspace, expected_rows).await {
            Ok(split) => split,
            Err(e) => return Err(fail(&mut workspace, e)),
        };

        if split.is_empty() {
            log::info!("No transactions found to export (job {})", workspace.id());
            workspace.cleanup();
            return Ok(ExportOutcome::Empty);
        }

        let dest = workspace.path().join(EXPORT_FILE_NAME);
        let built = match assemble(&split.parts, &dest).await {
            Ok(built) => built,
            Err(e) => return Err(fail(&mut workspace, e)),
        };

        let job = ExportJob {
            id: workspace.id(),
            parts: split.parts,
            total_rows: split.total_rows,
        };
        let stats = ExportStats {
            rows_exported: job.total_rows,
            part_count: job.part_count(),
            archive_bytes: built.size_bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log::info!(
            "Export job {} ready: {} rows in {} file(s), {} bytes, sha256 {}",
            job.id,
            stats.rows_exported,
            stats.part_count,
            stats.archive_bytes,
            built.checksum
        );

        Ok(ExportOutcome::Ready(ExportArchive {
            file_name: EXPORT_FILE_NAME.to_string(),
            content_type: zip_mime(),
            size_bytes: built.size_bytes,
            checksum: built.checksum,
            job,
            stats,
            archive_path: built.path,
            chunk_size: self.config.chunk_size,
            workspace,
        }))
    }

    async fn write_parts(&self, workspace: &Workspace, expected_rows: u64) -> Result<SplitOutcome, ExportError> {
        let mut splitter = CsvPartSplitter::<Transaction, O>::with_opener(
            workspace.path(),
            SplitConfig::from(&self.config),
            self.opener.clone(),
        )
        .with_expected_total(expected_rows);

        let mut batches = batched_stream(self.source.clone(), self.config.batch_size).chunks(self.config.batch_size);

        while let Some(batch) = batches.next().await {
            let batch = batch
                .into_iter()
                .collect::<DbResult<Vec<Transaction>>>()
                .map_err(|e| ExportError::SourceRead(e.to_string()))?;

            // File writes happen on the blocking pool; the splitter travels there and back.
            splitter = task::spawn_blocking(move || {
                for transaction in &batch {
                    splitter.write_record(transaction)?;
                }
                Ok::<_, ExportError>(splitter)
            })
            .await
            .map_err(|e| ExportError::Write(format!("writer task failed: {}", e)))??;
        }

        task::spawn_blocking(move || splitter.finish())
            .await
            .map_err(|e| ExportError::Write(format!("writer task failed: {}", e)))?
    }
}

fn fail(workspace: &mut Workspace, error: ExportError) -> ExportError {
    log::error!(
        "Export job {} failed at {} stage: {}",
        workspace.id(),
        error.stage(),
        error
    );
    workspace.cleanup();
    error
}

fn zip_mime() -> mime::Mime {
    "application/zip"
        .parse()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// Service for exporting transactions
#[async_trait]
pub trait ExportService: Send + Sync {
    /// Export every stored transaction as a zip of CSV parts.
    ///
    /// `NotFound` when there is nothing to export; every other failure is
    /// reported as a generic `ExportFailed`.
    async fn export_transactions(&self) -> ServiceResult<ExportArchive>;
}

pub struct TransactionExportService<O: PartOpener = FsPartOpener> {
    pipeline: ExportPipeline<O>,
}

impl TransactionExportService<FsPartOpener> {
    pub fn new(source: Arc<dyn TransactionSource>, config: ExportConfig) -> ServiceResult<Self> {
        config.validate()?;
        Ok(Self {
            pipeline: ExportPipeline::new(source, config),
        })
    }
}

impl<O> TransactionExportService<O>
where
    O: PartOpener + Clone + Sync + 'static,
{
    pub fn with_pipeline(pipeline: ExportPipeline<O>) -> ServiceResult<Self> {
        pipeline.config().validate()?;
        Ok(Self { pipeline })
    }
}

#[async_trait]
impl<O> ExportService for TransactionExportService<O>
where
    O: PartOpener + Clone + Sync + 'static,
{
    async fn export_transactions(&self) -> ServiceResult<ExportArchive> {
        match self.pipeline.run().await {
            Ok(ExportOutcome::Ready(archive)) => Ok(archive),
            Ok(ExportOutcome::Empty) => Err(ServiceError::NotFound(
                "No transactions found to export".to_string(),
            )),
            Err(e) => {
                log::error!("Error exporting transactions: {}", e);
                Err(export_failed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::export::csv_record::CsvRecord;
    use crate::domains::export::writers::csv_writer::tests::{transaction, FailingOpener};
    use crate::domains::transaction::InMemoryTransactionSource;
    use crate::errors::DbError;
    use futures::TryStreamExt;
    use sha2::{Digest, Sha256};
    use std::io::{self, Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn source(n: u64) -> Arc<dyn TransactionSource> {
        Arc::new(InMemoryTransactionSource::new((0..n).map(transaction).collect()))
    }

    fn config(root: &Path, max_rows: u64) -> ExportConfig {
        ExportConfig::default()
            .with_workspace_root(root)
            .with_max_rows_per_csv(max_rows)
            .with_batch_size(2)
            .with_chunk_size(256)
    }

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
    }

    async fn drain(archive: ExportArchive) -> Vec<u8> {
        let chunks: Vec<Vec<u8>> = archive.into_stream().try_collect().await.unwrap();
        chunks.concat()
    }

    fn read_entries(bytes: Vec<u8>) -> Vec<(String, String)> {
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut entry = zip.by_index(i).unwrap();
                let mut body = String::new();
                entry.read_to_string(&mut body).unwrap();
                (entry.name().to_string(), body)
            })
            .collect()
    }

    /// Fails every fetch after the first batch.
    struct FlakySource {
        inner: InMemoryTransactionSource,
    }

    #[async_trait]
    impl TransactionSource for FlakySource {
        async fn count_transactions(&self) -> DbResult<u64> {
            self.inner.count_transactions().await
        }

        async fn fetch_batch(&self, after: Option<&str>, limit: usize) -> DbResult<Vec<Transaction>> {
            match after {
                None => self.inner.fetch_batch(None, limit).await,
                Some(_) => Err(DbError::Query("connection reset by peer".into())),
            }
        }
    }

    struct UncountableSource;

    #[async_trait]
    impl TransactionSource for UncountableSource {
        async fn count_transactions(&self) -> DbResult<u64> {
            Err(DbError::Other("database is locked".into()))
        }

        async fn fetch_batch(&self, _after: Option<&str>, _limit: usize) -> DbResult<Vec<Transaction>> {
            Ok(Vec::new())
        }
    }

    /// Accepts writes without creating anything on disk.
    #[derive(Clone)]
    struct SinkOpener;

    impl PartOpener for SinkOpener {
        type Writer = io::Sink;

        fn open(&mut self, _path: &Path) -> io::Result<Self::Writer> {
            Ok(io::sink())
        }
    }

    #[tokio::test]
    async fn test_export_splits_archives_and_streams() {
        let root = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(source(7), config(root.path(), 3));

        let ExportOutcome::Ready(archive) = pipeline.run().await.unwrap() else {
            panic!("expected an archive");
        };
        assert_eq!(archive.file_name, "transactions_export.zip");
        assert_eq!(archive.content_type.essence_str(), "application/zip");
        assert_eq!(archive.job.total_rows, 7);
        assert_eq!(
            archive.job.parts.iter().map(|p| p.row_count).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        assert_eq!(archive.stats.part_count, 3);
        assert_eq!(entries(root.path()), 1);

        let size = archive.size_bytes;
        let checksum = archive.checksum.clone();
        let bytes = drain(archive).await;
        assert_eq!(bytes.len() as u64, size);
        assert_eq!(hex::encode(Sha256::digest(&bytes)), checksum);
        assert_eq!(entries(root.path()), 0);

        let files = read_entries(bytes);
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["transactions_part_1.csv", "transactions_part_2.csv", "transactions_part_3.csv"]
        );

        let header = Transaction::headers().join(",");
        let mut ids = Vec::new();
        for (_, body) in &files {
            let mut lines = body.lines();
            assert_eq!(lines.next(), Some(header.as_str()));
            ids.extend(lines.map(|l| l.split(',').next().unwrap_or_default().to_string()));
        }
        assert_eq!(ids, (0..7).map(|i| transaction(i).id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_stream_chunks_have_configured_size() {
        let root = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(source(40), config(root.path(), 10));
        let ExportOutcome::Ready(archive) = pipeline.run().await.unwrap() else {
            panic!("expected an archive");
        };

        let chunks: Vec<Vec<u8>> = archive.into_stream().try_collect().await.unwrap();
        let (last, rest) = chunks.split_last().unwrap();
        assert!(rest.iter().all(|c| c.len() == 256));
        assert!(!last.is_empty() && last.len() <= 256);
    }

    #[tokio::test]
    async fn test_empty_source_leaves_nothing_behind() {
        let root = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(source(0), config(root.path(), 3));

        assert!(matches!(pipeline.run().await.unwrap(), ExportOutcome::Empty));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_write_failure_cleans_up_workspace() {
        let root = TempDir::new().unwrap();
        // Part 1 (header + 3 rows) fits, part 2 does not.
        let pipeline = ExportPipeline::with_opener(source(10), config(root.path(), 3), FailingOpener::after_lines(5));

        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.stage(), "write");
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_source_failure_mid_scan_cleans_up_workspace() {
        let root = TempDir::new().unwrap();
        let flaky = FlakySource {
            inner: InMemoryTransactionSource::new((0..5).map(transaction).collect()),
        };
        let pipeline = ExportPipeline::new(Arc::new(flaky), config(root.path(), 3));

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, ExportError::SourceRead(msg) if msg.contains("connection reset")));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_count_failure_is_source_error() {
        let root = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(Arc::new(UncountableSource), config(root.path(), 3));

        let err = pipeline.run().await.unwrap_err();
        assert_eq!(err.stage(), "source");
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_archive_failure_cleans_up_workspace() {
        let root = TempDir::new().unwrap();
        let pipeline = ExportPipeline::with_opener(source(4), config(root.path(), 3), SinkOpener);

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, ExportError::Archive(_)));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_consumer_disconnect_cleans_up_workspace() {
        let root = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(source(50), config(root.path(), 10));
        let ExportOutcome::Ready(archive) = pipeline.run().await.unwrap() else {
            panic!("expected an archive");
        };

        let mut stream = archive.into_stream();
        assert!(stream.next().await.unwrap().is_ok());
        assert_eq!(entries(root.path()), 1);

        drop(stream);
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_unstreamed_archive_dropped_cleans_up_workspace() {
        let root = TempDir::new().unwrap();
        let pipeline = ExportPipeline::new(source(2), config(root.path(), 3));
        let outcome = pipeline.run().await.unwrap();
        assert_eq!(entries(root.path()), 1);

        drop(outcome);
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_use_separate_workspaces() {
        let root = TempDir::new().unwrap();
        let a = ExportPipeline::new(source(5), config(root.path(), 2));
        let b = ExportPipeline::new(source(6), config(root.path(), 2));

        let (ra, rb) = tokio::join!(a.run(), b.run());
        let (ExportOutcome::Ready(ra), ExportOutcome::Ready(rb)) = (ra.unwrap(), rb.unwrap()) else {
            panic!("expected two archives");
        };
        assert_ne!(ra.job.id, rb.job.id);
        assert_eq!(entries(root.path()), 2);

        assert_eq!(read_entries(drain(ra).await).len(), 3);
        assert_eq!(read_entries(drain(rb).await).len(), 3);
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_service_maps_outcomes_to_service_errors() {
        let root = TempDir::new().unwrap();

        let empty = TransactionExportService::new(source(0), config(root.path(), 3)).unwrap();
        let err = empty.export_transactions().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No transactions found to export");

        let failing = TransactionExportService::with_pipeline(ExportPipeline::with_opener(
            source(10),
            config(root.path(), 3),
            FailingOpener::after_lines(5),
        ))
        .unwrap();
        let err = failing.export_transactions().await.unwrap_err();
        assert!(matches!(err, ServiceError::ExportFailed(ref msg) if msg == "Error exporting transactions"));

        let ok = TransactionExportService::new(source(3), config(root.path(), 3)).unwrap();
        let archive = ok.export_transactions().await.unwrap();
        assert_eq!(archive.job.part_count(), 1);
        drop(archive);
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_pipeline_rejects_zero_limits_before_any_work() {
        let root = TempDir::new().unwrap();
        let no_batches = ExportPipeline::new(source(3), config(root.path(), 3).with_batch_size(0));
        let err = no_batches.run().await.unwrap_err();
        assert!(matches!(err, ExportError::Configuration(ref msg) if msg.contains("batch_size")));
        assert_eq!(err.stage(), "config");

        let no_progress = ExportPipeline::new(
            source(3),
            ExportConfig {
                progress_every: 0,
                ..config(root.path(), 3)
            },
        );
        let err = no_progress.run().await.unwrap_err();
        assert!(matches!(err, ExportError::Configuration(ref msg) if msg.contains("progress_every")));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_stream_failure_reaches_caller_as_generic_error() {
        let root = TempDir::new().unwrap();
        let service = TransactionExportService::new(source(5), config(root.path(), 3)).unwrap();
        let archive = service.export_transactions().await.unwrap();
        std::fs::remove_file(&archive.archive_path).unwrap();

        let items: Vec<ServiceResult<Vec<u8>>> = archive.into_stream().collect().await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(ServiceError::ExportFailed(msg)) => assert_eq!(msg, "Error exporting transactions"),
            other => panic!("unexpected stream item: {:?}", other),
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_save_to_writes_complete_archive() {
        let root = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("transactions_export.zip");
        let service = TransactionExportService::new(source(7), config(root.path(), 3)).unwrap();
        let archive = service.export_transactions().await.unwrap();
        let size = archive.size_bytes;
        let checksum = archive.checksum.clone();

        let written = archive.save_to(&output).await.unwrap();
        assert_eq!(written, size);
        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(hex::encode(Sha256::digest(&bytes)), checksum);
        assert_eq!(read_entries(bytes).len(), 3);
        assert_eq!(entries(out_dir.path()), 1);
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_save_to_failure_leaves_no_output() {
        let root = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("transactions_export.zip");
        let service = TransactionExportService::new(source(4), config(root.path(), 3)).unwrap();
        let archive = service.export_transactions().await.unwrap();
        std::fs::remove_file(&archive.archive_path).unwrap();

        let err = archive.save_to(&output).await.unwrap_err();
        assert!(matches!(err, ServiceError::ExportFailed(ref msg) if msg == "Error exporting transactions"));
        assert!(!output.exists());
        assert_eq!(entries(out_dir.path()), 0);
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_service_rejects_invalid_config() {
        let result = TransactionExportService::new(source(1), ExportConfig::default().with_chunk_size(0));
        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }

    /// Generates `tx-00000000`.. ids on demand instead of holding them in memory.
    struct SyntheticSource {
        total: u64,
    }

    #[async_trait]
    impl TransactionSource for SyntheticSource {
        async fn count_transactions(&self) -> DbResult<u64> {
            Ok(self.total)
        }

        async fn fetch_batch(&self, after: Option<&str>, limit: usize) -> DbResult<Vec<Transaction>> {
            let start = match after {
                Some(id) => id
                    .trim_start_matches("tx-")
                    .parse::<u64>()
                    .map_err(|e| DbError::Query(e.to_string()))?
                    + 1,
                None => 0,
            };
            let end = (start + limit as u64).min(self.total);
            Ok((start..end).map(transaction).collect())
        }
    }

    async fn full_size_export(root: &Path, total: u64) -> ExportArchive {
        let service = TransactionExportService::new(
            Arc::new(SyntheticSource { total }),
            ExportConfig::default().with_workspace_root(root),
        )
        .unwrap();
        service.export_transactions().await.unwrap()
    }

    #[tokio::test]
    #[ignore = "writes a million rows"]
    async fn test_exactly_one_million_rows_is_one_part() {
        let root = TempDir::new().unwrap();
        let archive = full_size_export(root.path(), 1_000_000).await;
        assert_eq!(archive.job.part_count(), 1);
        assert_eq!(archive.job.parts[0].row_count, 1_000_000);
        drop(archive);
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    #[ignore = "writes half a million rows"]
    async fn test_write_failure_after_half_a_million_rows() {
        let root = TempDir::new().unwrap();
        // Header plus 500,000 rows fit on the device.
        let pipeline = ExportPipeline::with_opener(
            Arc::new(SyntheticSource { total: 1_000_000 }),
            ExportConfig::default().with_workspace_root(root.path()),
            FailingOpener::after_lines(500_001),
        );

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, ExportError::Write(_)));
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    #[ignore = "writes a million rows"]
    async fn test_one_million_and_one_rows_is_two_parts() {
        let root = TempDir::new().unwrap();
        let archive = full_size_export(root.path(), 1_000_001).await;
        assert_eq!(
            archive.job.parts.iter().map(|p| p.row_count).collect::<Vec<_>>(),
            vec![1_000_000, 1]
        );
        assert_eq!(read_entries(drain(archive).await).len(), 2);
        assert_eq!(entries(root.path()), 0);
    }
}
