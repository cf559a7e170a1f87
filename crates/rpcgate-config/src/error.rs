//! Error types for typed configuration operations.

use rpcgate_data::{DataError, ErrorKind, Interrupted};
use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No record matched a single-object lookup.
    #[error("configuration not found: {lookup}")]
    NotFound {
        /// Human-readable description of the lookup.
        lookup: String,
    },
    /// Record name lacked a logical name after its domain prefix.
    #[error("config name '{name}' has an empty logical name after prefix '{prefix}'")]
    EmptyLogicalName {
        /// Domain prefix that was stripped.
        prefix: &'static str,
        /// Full record name.
        name: String,
    },
    /// Record name does not belong to the expected domain.
    #[error("config name '{name}' is outside namespace '{prefix}'")]
    ForeignNamespace {
        /// Expected domain prefix.
        prefix: &'static str,
        /// Full record name.
        name: String,
    },
    /// Payload was not valid JSON for the domain.
    #[error("malformed {domain} payload for '{name}'")]
    MalformedPayload {
        /// Domain label.
        domain: &'static str,
        /// Logical name of the object.
        name: String,
        /// JSON decoding error.
        source: serde_json::Error,
    },
    /// Payload parsed but violated a domain rule.
    #[error("invalid {domain} '{name}': {reason}")]
    InvalidPayload {
        /// Domain label.
        domain: &'static str,
        /// Logical name of the object.
        name: String,
        /// Description of the violated rule.
        reason: String,
    },
    /// Reorg version row held a non-numeric value.
    #[error("reorg version is not numeric: {value:?}")]
    NonNumericVersion {
        /// Stored value when known.
        value: Option<String>,
    },
    /// Store settings were missing or malformed.
    #[error("invalid setting {variable}: {reason}")]
    InvalidSetting {
        /// Environment variable or flag the setting came from.
        variable: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// Namespace registration would overlap an existing prefix or reserved key.
    #[error("namespace '{candidate}' overlaps '{existing}'")]
    NamespaceConflict {
        /// Prefix or key being registered.
        candidate: String,
        /// Previously registered prefix or key it collides with.
        existing: String,
    },
    /// Namespace prefix was empty.
    #[error("namespace prefix must not be empty")]
    EmptyNamespace,
    /// Domain prefix was not registered with the store.
    #[error("namespace '{prefix}' is not registered")]
    UnregisteredNamespace {
        /// Prefix of the unregistered domain.
        prefix: &'static str,
    },
    /// Backing store failed or rejected the operation.
    #[error("storage operation failed")]
    Storage {
        /// Source data-layer error.
        #[source]
        source: DataError,
    },
    /// Caller cancelled the operation or its deadline elapsed.
    #[error("{operation} interrupted: {reason}")]
    Cancelled {
        /// Operation identifier.
        operation: &'static str,
        /// What stopped the operation.
        reason: Interrupted,
    },
}

impl ConfigError {
    /// Classify the error into the store's error taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::EmptyLogicalName { .. }
            | Self::ForeignNamespace { .. }
            | Self::MalformedPayload { .. }
            | Self::InvalidPayload { .. }
            | Self::NonNumericVersion { .. }
            | Self::InvalidSetting { .. }
            | Self::NamespaceConflict { .. }
            | Self::EmptyNamespace
            | Self::UnregisteredNamespace { .. } => ErrorKind::Validation,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn invalid(domain: &'static str, name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            domain,
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<DataError> for ConfigError {
    fn from(source: DataError) -> Self {
        match source {
            DataError::RecordNotFound { lookup } => Self::NotFound {
                lookup: lookup.to_string(),
            },
            DataError::NonNumericCounter { value, .. } => Self::NonNumericVersion { value },
            DataError::InvalidSetting { variable, reason } => {
                Self::InvalidSetting { variable, reason }
            }
            DataError::Interrupted { operation, reason } => Self::Cancelled { operation, reason },
            source @ (DataError::MigrationFailed { .. }
            | DataError::ConnectFailed { .. }
            | DataError::QueryFailed { .. }
            | DataError::ConstraintViolated { .. }
            | DataError::BoundExceeded { .. }
            | DataError::CounterOverflow { .. }) => Self::Storage { source },
        }
    }
}

impl From<(&'static str, Interrupted)> for ConfigError {
    fn from((operation, reason): (&'static str, Interrupted)) -> Self {
        Self::Cancelled { operation, reason }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
