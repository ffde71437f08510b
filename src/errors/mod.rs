mod error;

pub use error::{DbError, ServiceError};

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
