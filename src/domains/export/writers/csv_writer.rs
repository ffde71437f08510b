use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::domains::export::csv_record::CsvRecord;
use crate::domains::export::types::{ExportError, FilePart};

const PART_BUFFER_BYTES: usize = 1024 * 1024;

/// Creates the physical file backing a CSV part.
pub trait PartOpener: Send {
    type Writer: Write + Send;

    fn open(&mut self, path: &Path) -> io::Result<Self::Writer>;
}

/// Opens parts as buffered files on local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPartOpener;

impl PartOpener for FsPartOpener {
    type Writer = BufWriter<File>;

    fn open(&mut self, path: &Path) -> io::Result<Self::Writer> {
        let file = File::create(path)?;
        Ok(BufWriter::with_capacity(PART_BUFFER_BYTES, file))
    }
}

#[derive(Clone)]
pub struct SplitConfig {
    pub max_rows_per_part: u64,
    pub progress_every: u64,
    pub delimiter: u8,
    pub quote_char: u8,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for SplitConfig {
    fn from(config: &ExportConfig) -> Self {
        Self {
            max_rows_per_part: config.max_rows_per_csv,
            progress_every: config.progress_every,
            delimiter: b',',
            quote_char: b'"',
        }
    }
}

/// Parts produced once the input has been exhausted.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub parts: Vec<FilePart>,
    pub total_rows: u64,
}

impl SplitOutcome {
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

struct OpenPart<W: Write> {
    writer: csv::Writer<W>,
    sequence: u32,
    file_name: String,
    path: PathBuf,
    rows: u64,
}

/// Writes records into size-bounded CSV parts inside one directory.
///
/// A part is opened lazily when the first record for it arrives and closed
/// as soon as it holds `max_rows_per_part` rows, so an input that is an exact
/// multiple of the limit never leaves an empty trailing part.
pub struct CsvPartSplitter<R: CsvRecord, O: PartOpener = FsPartOpener> {
    dir: PathBuf,
    config: SplitConfig,
    opener: O,
    expected_total: Option<u64>,
    current: Option<OpenPart<O::Writer>>,
    parts: Vec<FilePart>,
    total_rows: u64,
    _record: PhantomData<fn(&R)>,
}

impl<R: CsvRecord> CsvPartSplitter<R, FsPartOpener> {
    pub fn new(dir: impl Into<PathBuf>, config: SplitConfig) -> Self {
        Self::with_opener(dir, config, FsPartOpener)
    }
}

impl<R: CsvRecord, O: PartOpener> CsvPartSplitter<R, O> {
    pub fn with_opener(dir: impl Into<PathBuf>, config: SplitConfig, opener: O) -> Self {
        Self {
            dir: dir.into(),
            config,
            opener,
            expected_total: None,
            current: None,
            parts: Vec::new(),
            total_rows: 0,
            _record: PhantomData,
        }
    }

    /// Total used in progress logs only.
    pub fn with_expected_total(mut self, total: u64) -> Self {
        self.expected_total = Some(total);
        self
    }

    pub fn rows_written(&self) -> u64 {
        self.total_rows
    }

    /// Write one record, opening a new part first if none is open.
    ///
    /// On error the open part is closed and the splitter should be discarded.
    pub fn write_record(&mut self, record: &R) -> Result<(), ExportError> {
        let mut part = match self.current.take() {
            Some(part) => part,
            None => self.open_next_part()?,
        };

        if let Err(e) = part.writer.write_record(record.to_csv()) {
            log::warn!("Closing {} after write failure at row {}", part.file_name, part.rows);
            return Err(ExportError::Write(format!("{}: {}", part.file_name, e)));
        }
        part.rows += 1;
        self.total_rows += 1;

        if self.config.progress_every > 0 && self.total_rows % self.config.progress_every == 0 {
            match self.expected_total {
                Some(total) => log::info!("Progress: {}/{} transactions processed", self.total_rows, total),
                None => log::info!("Progress: {} transactions processed", self.total_rows),
            }
        }

        if part.rows >= self.config.max_rows_per_part {
            self.close_part(part)
        } else {
            self.current = Some(part);
            Ok(())
        }
    }

    fn open_next_part(&mut self) -> Result<OpenPart<O::Writer>, ExportError> {
        let sequence = self.parts.len() as u32 + 1;
        let file_name = FilePart::file_name_for(sequence);
        let path = self.dir.join(&file_name);

        let inner = self
            .opener
            .open(&path)
            .map_err(|e| ExportError::Write(format!("cannot create {}: {}", file_name, e)))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.config.delimiter)
            .quote(self.config.quote_char)
            .from_writer(inner);
        writer
            .write_record(R::headers())
            .map_err(|e| ExportError::Write(format!("{}: {}", file_name, e)))?;

        // Registered before any data row so a failed job still knows every file it touched.
        self.parts.push(FilePart {
            sequence,
            file_name: file_name.clone(),
            path: path.clone(),
            row_count: 0,
        });
        log::info!("Created file {}: {}", sequence, file_name);

        Ok(OpenPart {
            writer,
            sequence,
            file_name,
            path,
            rows: 0,
        })
    }

    fn close_part(&mut self, mut part: OpenPart<O::Writer>) -> Result<(), ExportError> {
        part.writer
            .flush()
            .map_err(|e| ExportError::Write(format!("{}: {}", part.file_name, e)))?;
        let mut inner = part
            .writer
            .into_inner()
            .map_err(|e| ExportError::Write(format!("{}: {}", part.file_name, e.error())))?;
        inner
            .flush()
            .map_err(|e| ExportError::Write(format!("{}: {}", part.file_name, e)))?;
        drop(inner);

        if let Some(registered) = self.parts.iter_mut().find(|p| p.sequence == part.sequence) {
            registered.row_count = part.rows;
        }
        log::info!(
            "Completed file {} with {} rows ({})",
            part.sequence,
            part.rows,
            part.path.display()
        );
        Ok(())
    }

    /// Close any open part and return what was written.
    pub fn finish(mut self) -> Result<SplitOutcome, ExportError> {
        if let Some(part) = self.current.take() {
            self.close_part(part)?;
        }

        log::info!(
            "Export completed: {} transactions exported to {} file(s)",
            self.total_rows,
            self.parts.len()
        );
        Ok(SplitOutcome {
            parts: std::mem::take(&mut self.parts),
            total_rows: self.total_rows,
        })
    }
}
