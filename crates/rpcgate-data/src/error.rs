//! Error types for the configuration record layer.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use crate::record::RecordId;

/// Result alias for data layer operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Coarse classification shared with the typed configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The addressed record does not exist.
    NotFound,
    /// Stored or supplied data failed validation.
    Validation,
    /// The backing store failed or rejected the operation.
    Storage,
    /// The caller aborted the operation or its deadline elapsed.
    Cancelled,
}

/// Why an operation stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The caller's cancellation signal fired.
    Cancelled,
    /// The configured deadline elapsed.
    DeadlineExceeded {
        /// Deadline that was exceeded.
        limit: Duration,
    },
}

impl Display for Interrupted {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => formatter.write_str("cancelled by caller"),
            Self::DeadlineExceeded { limit } => {
                write!(formatter, "deadline of {}ms exceeded", limit.as_millis())
            }
        }
    }
}

/// Errors raised by the data access layer.
#[derive(Debug)]
pub enum DataError {
    /// Migration execution failed.
    MigrationFailed {
        /// Underlying migration error.
        source: sqlx::migrate::MigrateError,
    },
    /// Establishing the connection pool failed.
    ConnectFailed {
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A database operation failed.
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// The database rejected a write through a table constraint.
    ConstraintViolated {
        /// Operation identifier.
        operation: &'static str,
        /// Name of the violated constraint when reported.
        constraint: Option<String>,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A column value exceeded its byte bound.
    BoundExceeded {
        /// Column that overflowed.
        column: &'static str,
        /// Maximum permitted length in bytes.
        limit: usize,
        /// Length supplied by the caller.
        actual: usize,
    },
    /// No record matched the lookup.
    RecordNotFound {
        /// Lookup that missed.
        lookup: RecordLookup,
    },
    /// A counter row held a value that is not a decimal integer.
    NonNumericCounter {
        /// Counter record name.
        name: String,
        /// Stored value when known.
        value: Option<String>,
    },
    /// A counter row held, or would advance to, a value outside the `i64` range.
    CounterOverflow {
        /// Counter record name.
        name: String,
    },
    /// Environment-provided settings were missing or malformed.
    InvalidSetting {
        /// Environment variable name.
        variable: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// The operation was cancelled or exceeded its deadline.
    Interrupted {
        /// Operation identifier.
        operation: &'static str,
        /// What stopped the operation.
        reason: Interrupted,
    },
}

/// Key used to address a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLookup {
    /// Lookup by surrogate id.
    Id(RecordId),
    /// Lookup by full record name.
    Name(String),
}

impl Display for RecordLookup {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(formatter, "id {id}"),
            Self::Name(name) => write!(formatter, "name '{name}'"),
        }
    }
}

impl DataError {
    /// Classify the error for callers that branch on outcome rather than cause.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RecordNotFound { .. } => ErrorKind::NotFound,
            Self::NonNumericCounter { .. } | Self::InvalidSetting { .. } => ErrorKind::Validation,
            Self::Interrupted { .. } => ErrorKind::Cancelled,
            Self::MigrationFailed { .. }
            | Self::ConnectFailed { .. }
            | Self::QueryFailed { .. }
            | Self::ConstraintViolated { .. }
            | Self::BoundExceeded { .. }
            | Self::CounterOverflow { .. } => ErrorKind::Storage,
        }
    }

    /// Map an `sqlx` error raised by `operation`, separating constraint rejections.
    #[must_use]
    pub fn from_query(operation: &'static str, source: sqlx::Error) -> Self {
        let constraint = match &source {
            sqlx::Error::Database(db) => match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::CheckViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation => {
                    Some(db.constraint().map(str::to_owned))
                }
                _ => None,
            },
            _ => None,
        };
        match constraint {
            Some(constraint) => Self::ConstraintViolated {
                operation,
                constraint,
                source,
            },
            None => Self::QueryFailed { operation, source },
        }
    }
}

impl Display for DataError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MigrationFailed { .. } => formatter.write_str("migration failed"),
            Self::ConnectFailed { .. } => formatter.write_str("failed to connect to database"),
            Self::QueryFailed { operation, .. } => {
                write!(formatter, "database operation failed: {operation}")
            }
            Self::ConstraintViolated {
                operation,
                constraint,
                ..
            } => match constraint {
                Some(constraint) => {
                    write!(formatter, "{operation} violated constraint {constraint}")
                }
                None => write!(formatter, "{operation} violated a table constraint"),
            },
            Self::BoundExceeded {
                column,
                limit,
                actual,
            } => write!(
                formatter,
                "{column} is {actual} bytes, exceeding the {limit} byte limit"
            ),
            Self::RecordNotFound { lookup } => write!(formatter, "no config record with {lookup}"),
            Self::NonNumericCounter { name, value } => match value {
                Some(value) => write!(formatter, "counter '{name}' holds non-numeric '{value}'"),
                None => write!(formatter, "counter '{name}' holds a non-numeric value"),
            },
            Self::CounterOverflow { name } => {
                write!(formatter, "counter '{name}' is outside the 64-bit range")
            }
            Self::InvalidSetting { variable, reason } => {
                write!(formatter, "invalid setting {variable}: {reason}")
            }
            Self::Interrupted { operation, reason } => {
                write!(formatter, "{operation} interrupted: {reason}")
            }
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MigrationFailed { source } => Some(source),
            Self::ConnectFailed { source }
            | Self::QueryFailed { source, .. }
            | Self::ConstraintViolated { source, .. } => Some(source),
            Self::BoundExceeded { .. }
            | Self::RecordNotFound { .. }
            | Self::NonNumericCounter { .. }
            | Self::CounterOverflow { .. }
            | Self::InvalidSetting { .. }
            | Self::Interrupted { .. } => None,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(source: sqlx::Error) -> Self {
        Self::from_query("sqlx operation", source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_error_display_and_source() {
        let migration = DataError::MigrationFailed {
            source: sqlx::migrate::MigrateError::VersionMissing(1),
        };
        assert_eq!(migration.to_string(), "migration failed");
        assert!(migration.source().is_some());
        assert_eq!(migration.kind(), ErrorKind::Storage);

        let query = DataError::from_query("fetch", sqlx::Error::RowNotFound);
        assert_eq!(query.to_string(), "database operation failed: fetch");
        assert!(query.source().is_some());

        let missing = DataError::RecordNotFound {
            lookup: RecordLookup::Id(7),
        };
        assert_eq!(missing.to_string(), "no config record with id 7");
        assert!(missing.source().is_none());
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let from = DataError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(from.kind(), ErrorKind::Storage);
    }

    #[test]
    fn bound_and_counter_errors_are_classified() {
        let bound = DataError::BoundExceeded {
            column: "value",
            limit: 16_250,
            actual: 16_251,
        };
        assert_eq!(bound.kind(), ErrorKind::Storage);
        assert_eq!(
            bound.to_string(),
            "value is 16251 bytes, exceeding the 16250 byte limit"
        );

        let counter = DataError::NonNumericCounter {
            name: "reorg.version".into(),
            value: Some("abc".into()),
        };
        assert_eq!(counter.kind(), ErrorKind::Validation);
        assert_eq!(
            counter.to_string(),
            "counter 'reorg.version' holds non-numeric 'abc'"
        );

        let overflow = DataError::CounterOverflow {
            name: "reorg.version".into(),
        };
        assert_eq!(overflow.kind(), ErrorKind::Storage);
        assert!(overflow.source().is_none());
        assert_eq!(
            overflow.to_string(),
            "counter 'reorg.version' is outside the 64-bit range"
        );
    }

    #[test]
    fn interrupted_errors_are_cancellations() {
        let err = DataError::Interrupted {
            operation: "load by id",
            reason: Interrupted::DeadlineExceeded {
                limit: Duration::from_millis(250),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(
            err.to_string(),
            "load by id interrupted: deadline of 250ms exceeded"
        );
    }
}
