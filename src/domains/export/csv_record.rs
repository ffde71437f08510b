use chrono::{DateTime, SecondsFormat, Utc};

use crate::domains::transaction::Transaction;

/// Trait for types that can be exported to CSV
pub trait CsvRecord {
    /// Get CSV headers for this type
    fn headers() -> Vec<&'static str>;

    /// Convert to CSV row
    fn to_csv(&self) -> Vec<String>;
}

// Helper for optional values
pub fn csv_optional_to_string<T: std::fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

/// RFC 3339 in UTC with a fixed microsecond fraction, so that every rendered
/// timestamp has the same width and sorts lexically.
pub fn csv_datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CsvRecord for Transaction {
    fn headers() -> Vec<&'static str> {
        vec![
            "id",
            "amount",
            "currency",
            "transaction_date",
            "category",
            "created_at",
        ]
    }

    fn to_csv(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            // Decimal keeps its stored scale: 10.50 stays "10.50".
            self.amount.to_string(),
            self.currency.code().to_string(),
            csv_datetime_to_string(&self.transaction_date),
            csv_optional_to_string(&self.category),
            csv_datetime_to_string(&self.created_at),
        ]
    }
}
