pub mod archive;
pub mod csv_record;
pub mod service;
pub mod types;
pub mod workspace;
pub mod writers;

pub use archive::{ArchiveByteStream, BuiltArchive};
pub use csv_record::CsvRecord;
pub use service::{ExportArchive, ExportByteStream, ExportOutcome, ExportPipeline, ExportService, TransactionExportService};
pub use types::{ExportError, ExportJob, ExportStats, FilePart};
pub use workspace::Workspace;
pub use writers::{CsvPartSplitter, FsPartOpener, PartOpener};
