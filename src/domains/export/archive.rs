use futures::stream::{self, BoxStream, StreamExt};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::task;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use super::types::{ExportError, FilePart};
use super::workspace::Workspace;

/// Entries at or above this size need Zip64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Stream of archive bytes handed to the consumer.
pub type ArchiveByteStream = BoxStream<'static, Result<Vec<u8>, ExportError>>;

/// A finished archive on disk.
#[derive(Debug, Clone)]
pub struct BuiltArchive {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub entry_count: usize,
    /// SHA-256 of the whole archive, lowercase hex.
    pub checksum: String,
}

/// Build the archive at `dest` on the blocking pool.
pub async fn assemble(parts: &[FilePart], dest: &Path) -> Result<BuiltArchive, ExportError> {
    let parts = parts.to_vec();
    let dest = dest.to_path_buf();
    task::spawn_blocking(move || build_archive(&parts, &dest))
        .await
        .map_err(|e| ExportError::Archive(format!("archive task failed: {}", e)))?
}

/// Write one deflated entry per part, named by the part's base name and
/// ordered by sequence number.
pub fn build_archive(parts: &[FilePart], dest: &Path) -> Result<BuiltArchive, ExportError> {
    let mut ordered: Vec<&FilePart> = parts.iter().collect();
    ordered.sort_by_key(|p| p.sequence);

    let file = File::create(dest)
        .map_err(|e| ExportError::Archive(format!("cannot create {}: {}", dest.display(), e)))?;
    let mut zip = ZipWriter::new(file);

    for part in &ordered {
        let mut source = File::open(&part.path)
            .map_err(|e| ExportError::Archive(format!("cannot open {}: {}", part.file_name, e)))?;
        let size = source
            .metadata()
            .map_err(|e| ExportError::Archive(format!("{}: {}", part.file_name, e)))?
            .len();

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= ZIP64_THRESHOLD);
        zip.start_file(part.file_name.as_str(), options)
            .map_err(|e| ExportError::Archive(format!("{}: {}", part.file_name, e)))?;
        io::copy(&mut source, &mut zip)
            .map_err(|e| ExportError::Archive(format!("{}: {}", part.file_name, e)))?;
        log::debug!("Added {} ({} bytes) to archive", part.file_name, size);
    }

    zip.finish()
        .map_err(|e| ExportError::Archive(e.to_string()))?;

    let (checksum, size_bytes) = sha256_file(dest)
        .map_err(|e| ExportError::Archive(format!("cannot read back {}: {}", dest.display(), e)))?;

    log::info!(
        "Built archive {} with {} entries ({} bytes)",
        dest.display(),
        ordered.len(),
        size_bytes
    );
    Ok(BuiltArchive {
        path: dest.to_path_buf(),
        size_bytes,
        entry_count: ordered.len(),
        checksum,
    })
}

fn sha256_file(path: &Path) -> io::Result<(String, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), total))
}

struct ChunkReader {
    // Declared before `workspace` so the handle is closed before the directory goes.
    file: Option<tokio::fs::File>,
    workspace: Option<Workspace>,
    path: PathBuf,
    chunk_size: usize,
    bytes_sent: u64,
    done: bool,
}

impl ChunkReader {
    /// Close the archive and remove the workspace on the blocking pool.
    async fn finish(&mut self) {
        self.file = None;
        self.done = true;
        let Some(mut workspace) = self.workspace.take() else {
            return;
        };

        let job_id = workspace.id();
        match task::spawn_blocking(move || workspace.cleanup()).await {
            Ok(true) => log::info!(
                "Archive stream for job {} finished after {} bytes",
                job_id,
                self.bytes_sent
            ),
            Ok(false) => {}
            Err(e) => log::error!("Cleanup task for job {} failed: {}", job_id, e),
        }
    }
}

async fn read_chunk(file: &mut tokio::fs::File, chunk_size: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buffer.truncate(filled);
    Ok(buffer)
}

/// Stream `archive` in chunks of exactly `chunk_size` bytes (the last may be
/// shorter), taking ownership of the workspace it lives in.
///
/// The workspace is removed at end of stream, right before a read error is
/// yielded, or when the stream is dropped unfinished.
pub fn chunk_stream(archive: &Path, workspace: Workspace, chunk_size: usize) -> ArchiveByteStream {
    let reader = ChunkReader {
        file: None,
        workspace: Some(workspace),
        path: archive.to_path_buf(),
        chunk_size: chunk_size.max(1),
        bytes_sent: 0,
        done: false,
    };

    stream::unfold(reader, |mut reader| async move {
        if reader.done {
            return None;
        }

        if reader.file.is_none() {
            match tokio::fs::File::open(&reader.path).await {
                Ok(file) => reader.file = Some(file),
                Err(e) => {
                    log::error!("Error opening archive {}: {}", reader.path.display(), e);
                    reader.finish().await;
                    return Some((Err(ExportError::Archive(e.to_string())), reader));
                }
            }
        }

        let chunk_size = reader.chunk_size;
        let result = match reader.file.as_mut() {
            Some(file) => read_chunk(file, chunk_size).await,
            None => Ok(Vec::new()),
        };

        match result {
            Ok(chunk) if chunk.is_empty() => {
                reader.finish().await;
                None
            }
            Ok(chunk) => {
                reader.bytes_sent += chunk.len() as u64;
                Some((Ok(chunk), reader))
            }
            Err(e) => {
                log::error!("Error streaming archive {}: {}", reader.path.display(), e);
                reader.finish().await;
                Some((Err(ExportError::Archive(e.to_string())), reader))
            }
        }
    })
    .boxed()
}
