pub mod export;
pub mod transaction;

pub use transaction::{Transaction, Currency, TransactionSource};
