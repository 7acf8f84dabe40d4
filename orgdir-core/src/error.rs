//! Error types for directory operations

use crate::EntityKind;
use thiserror::Error;

/// Storage gateway errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {kind} with id {id}")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Argument validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Value {value} for {field} is out of range [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },
}

impl ValidationError {
    /// Shorthand for an out-of-range numeric argument.
    pub fn out_of_range(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::RequiredFieldMissing { field }
            | ValidationError::InvalidValue { field, .. }
            | ValidationError::OutOfRange { field, .. } => field,
        }
    }
}

/// Cache backend errors. These never surface to callers of the query engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend {backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all directory errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrgdirError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl OrgdirError {
    /// Convenience constructor for a missing entity.
    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        OrgdirError::Storage(StorageError::NotFound { kind, id })
    }

    /// Convenience constructor for internal failures.
    pub fn internal(reason: impl Into<String>) -> Self {
        OrgdirError::Internal {
            reason: reason.into(),
        }
    }

    /// Returns true for `StorageError::NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OrgdirError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for directory operations.
pub type OrgdirResult<T> = Result<T, OrgdirError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            kind: EntityKind::Activity,
            id: 42,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("activity"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_validation_error_display_out_of_range() {
        let err = ValidationError::out_of_range("limit", 501, 1, 500);
        let msg = format!("{}", err);
        assert!(msg.contains("limit"));
        assert!(msg.contains("501"));
        assert!(msg.contains("[1, 500]"));
        assert_eq!(err.field(), "limit");
    }

    #[test]
    fn test_cache_error_display_unavailable() {
        let err = CacheError::Unavailable {
            backend: "lmdb".to_string(),
            reason: "map full".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("lmdb"));
        assert!(msg.contains("map full"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "ORGDIR_CACHE_TTL_SECS".to_string(),
            value: "soon".to_string(),
            reason: "must be an integer".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ORGDIR_CACHE_TTL_SECS"));
        assert!(msg.contains("soon"));
        assert!(msg.contains("must be an integer"));
    }

    #[test]
    fn test_storage_error_display_lock_poisoned() {
        let msg = format!("{}", StorageError::LockPoisoned);
        assert!(msg.contains("lock poisoned"));
    }

    #[test]
    fn test_orgdir_error_from_variants() {
        let storage = OrgdirError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, OrgdirError::Storage(_)));

        let validation = OrgdirError::from(ValidationError::RequiredFieldMissing {
            field: "activity_name".to_string(),
        });
        assert!(matches!(validation, OrgdirError::Validation(_)));

        let cache = OrgdirError::from(CacheError::Serialization {
            reason: "eof".to_string(),
        });
        assert!(matches!(cache, OrgdirError::Cache(_)));

        let config = OrgdirError::from(ConfigError::MissingRequired {
            field: "ORGDIR_DATABASE_URL".to_string(),
        });
        assert!(matches!(config, OrgdirError::Config(_)));
    }

    #[test]
    fn test_not_found_helper() {
        let err = OrgdirError::not_found(EntityKind::Organization, 9);
        assert!(err.is_not_found());
        assert!(!OrgdirError::internal("boom").is_not_found());
    }
}
