use sea_orm::DbErr;
use thiserror::Error;

/// Failures reported by the saga, subscription and timeout stores.
///
/// Absence of data is never an error here: lookups return `Option`.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported saga type: no entity set registered for {0}")]
    UnsupportedType(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("backing store failure: {0}")]
    BackingStore(#[from] DbErr),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unit of work still has live sessions")]
    SessionInUse,
}

impl PersistenceError {
    pub fn invalid(msg: impl Into<String>) -> Self { Self::InvalidArgument(msg.into()) }

    pub fn unsupported<T: ?Sized>() -> Self { Self::UnsupportedType(std::any::type_name::<T>().to_string()) }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            PersistenceError::InvalidArgument(_) => 1001,
            PersistenceError::UnsupportedType(_) => 1002,
            PersistenceError::NotFound(_) => 1003,
            PersistenceError::ConcurrencyConflict(_) => 1004,
            PersistenceError::Serialization(_) => 1101,
            PersistenceError::SessionInUse => 1102,
            PersistenceError::BackingStore(_) => 1200,
        }
    }
}

impl From<models::errors::ModelError> for PersistenceError {
    fn from(e: models::errors::ModelError) -> Self {
        match e {
            models::errors::ModelError::Validation(m) => PersistenceError::InvalidArgument(m),
            models::errors::ModelError::Db(m) => PersistenceError::BackingStore(DbErr::Custom(m)),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self { PersistenceError::Serialization(e.to_string()) }
}
