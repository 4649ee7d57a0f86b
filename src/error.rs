//! Error taxonomy for the sighting store.
//!
//! [`StoreError`] separates "your input is wrong" ([`StoreError::Validation`],
//! [`StoreError::InvalidOperation`]) from "the system is unavailable"
//! ([`StoreError::Dependency`]). Lookups of unknown ids are not errors; they
//! return `None`/`false`.

use crate::embedding::EmbeddingError;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every constraint a sighting violates, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Append every violation from `other`.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// True if any violation concerns `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid sighting: ")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// An external collaborator (database engine, embedding endpoint) failed.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("embedding: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("sighting not found: {0}")]
    NotFound(i64),

    #[error("sighting {0} was modified concurrently; reload and retry")]
    Conflict(i64),

    #[error("dependency unavailable: {0}")]
    Dependency(#[from] DependencyError),
}

impl StoreError {
    /// The validation details, if this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }

    /// Short class label used by front-ends when reporting the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation error",
            Self::InvalidOperation(_) => "invalid operation",
            Self::NotFound(_) => "not found",
            Self::Conflict(_) => "conflict",
            Self::Dependency(_) => "dependency error",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Dependency(e.into())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Dependency(e.into())
    }
}

impl From<EmbeddingError> for StoreError {
    fn from(e: EmbeddingError) -> Self {
        Self::Dependency(e.into())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Dependency(e.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Dependency(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_list_every_field() {
        let mut errors = ValidationErrors::new();
        errors.push("source", "is required");
        errors.push("summary", "is required");

        let msg = errors.to_string();
        assert!(msg.contains("source: is required"));
        assert!(msg.contains("summary: is required"));
        assert!(errors.mentions("source"));
        assert!(!errors.mentions("occurred_at"));
    }

    #[test]
    fn empty_validation_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
        assert!(ValidationErrors::single("tags", "bad").into_result().is_err());
    }

    #[test]
    fn kinds_distinguish_input_from_availability() {
        let validation: StoreError = ValidationErrors::single("source", "is required").into();
        assert_eq!(validation.kind(), "validation error");
        assert!(!validation.is_dependency());

        let dependency: StoreError = rusqlite::Error::InvalidQuery.into();
        assert!(dependency.is_dependency());
        assert_eq!(dependency.kind(), "dependency error");
    }
}
