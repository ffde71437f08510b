pub mod repository;
pub mod types;

pub use repository::{batched_stream, InMemoryTransactionSource, SqliteTransactionRepository, TransactionSource};
pub use types::{Currency, Transaction};
