use serde::Serialize;
use thiserror::Error;

/// Database errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Failed to decode column '{column}': {reason}")]
    Decode {
        column: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Other(String),
}

impl DbError {
    pub fn decode(column: &str, reason: impl ToString) -> Self {
        Self::Decode {
            column: column.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DbError", 2)?;
        match self {
            DbError::Sqlx(err) => {
                state.serialize_field("type", "Sqlx")?;
                state.serialize_field("message", &err.to_string())?;
            }
            DbError::Query(s) => {
                state.serialize_field("type", "Query")?;
                state.serialize_field("message", s)?;
            }
            DbError::Decode { .. } => {
                state.serialize_field("type", "Decode")?;
                state.serialize_field("message", &self.to_string())?;
            }
            DbError::Other(s) => {
                state.serialize_field("type", "Other")?;
                state.serialize_field("message", s)?;
            }
        }
        state.end()
    }
}

/// Manual Clone implementation for DbError
impl Clone for DbError {
    fn clone(&self) -> Self {
        match self {
            DbError::Sqlx(err) => DbError::Other(format!("SQLx error: {}", err)),
            DbError::Query(s) => DbError::Query(s.clone()),
            DbError::Decode { column, reason } => DbError::Decode {
                column: column.clone(),
                reason: reason.clone(),
            },
            DbError::Other(s) => DbError::Other(s.clone()),
        }
    }
}

/// Service-level errors, the only errors a transport layer ever sees.
///
/// Export failures reach callers as `ExportFailed` with a generic message;
/// the failing stage and its cause are only logged.
#[derive(Debug, Error, Clone, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ExportFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// True for the "nothing to do" outcome, which callers report as not-found
    /// rather than as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}
