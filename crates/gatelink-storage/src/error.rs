use thiserror::Error;

/// Failures of the token and access log store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Query or connection failure reported by SQLite.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An embedded migration could not be applied.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An update targeted a row that does not exist.
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Stored data could not be interpreted
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn not_found(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
