use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Input-contract and missing-data conditions raised by the analytics layer.
///
/// These are expected outcomes of user-selected filters. Callers present them
/// as warnings instead of failing the whole request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("Need at least {required} teams for comparison, got {found}")]
    InsufficientTeams { required: usize, found: usize },

    #[error("Insufficient data points for {metric}: need {required}, got {found}")]
    InsufficientData {
        metric: String,
        required: usize,
        found: usize,
    },

    #[error("No date values available for {metric}")]
    MissingDate { metric: String },

    #[error("Percentile must be between 0 and 100, got {value}")]
    InvalidPercentile { value: f64 },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");
    }

    #[test]
    fn test_analytics_error_display() {
        let err = AnalyticsError::InsufficientTeams {
            required: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Need at least 2 teams for comparison, got 1"
        );

        let err = AnalyticsError::InsufficientData {
            metric: "velocity".to_string(),
            required: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data points for velocity: need 2, got 1"
        );

        let err = AnalyticsError::MissingDate {
            metric: "velocity".to_string(),
        };
        assert_eq!(err.to_string(), "No date values available for velocity");

        let err = AnalyticsError::InvalidPercentile { value: 120.0 };
        assert_eq!(
            err.to_string(),
            "Percentile must be between 0 and 100, got 120"
        );
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(err.to_string(), "Database connection failed: failed to connect");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");

        let err = StorageError::Serialization {
            message: "bad json".to_string(),
        };
        assert_eq!(err.to_string(), "Serialization failed: bad json");

        let err = StorageError::InvalidRecord {
            message: "empty team".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid record: empty team");
    }

    #[test]
    fn test_json_error_conversion_to_storage_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let storage_err: StorageError = json_err.into();
        assert!(matches!(storage_err, StorageError::Serialization { .. }));
    }

    #[test]
    fn test_io_error_conversion_to_storage_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
        assert!(storage_err.to_string().contains("gone"));
    }

    #[test]
    fn test_analytics_error_conversion_to_app_error() {
        let err = AnalyticsError::MissingDate {
            metric: "m".to_string(),
        };
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Analytics(_)));
        assert!(app_err.to_string().starts_with("Analytics error:"));
    }

    #[test]
    fn test_storage_error_conversion_to_app_error() {
        let storage_err = StorageError::InvalidRecord {
            message: "boom".to_string(),
        };
        let app_err: AppError = storage_err.into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }
}
