use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// The principal has no city (or no entity kind) it may read.
    #[error("Scope denied: {0}")]
    ScopeDenied(String),

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    /// Stored data contradicts a model invariant.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        DomainError::NotFound {
            entity,
            field: "id",
            value: id.to_string(),
        }
    }

    /// Whether this error comes from the persistence layer and the
    /// operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Store(_))
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Store(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
