pub mod csv_writer;

pub use csv_writer::{CsvPartSplitter, FsPartOpener, PartOpener, SplitConfig, SplitOutcome};
