//! Shared store handle and error types for CLI handlers.

use std::fmt::{self, Display, Formatter};

use rpcgate_config::{ConfigError, ConfigStore, ErrorKind};

use crate::cli::OutputFormat;

/// CLI-level error type distinguishing bad input, missing records, and operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    NotFound(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::NotFound(_) => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::NotFound(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::Validation(error_chain(&err)),
            ErrorKind::NotFound => Self::NotFound(err.to_string()),
            ErrorKind::Storage | ErrorKind::Cancelled => Self::Failure(err.into()),
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Store handle and rendering preferences shared by every handler.
pub(crate) struct AppContext {
    pub(crate) store: ConfigStore,
    pub(crate) output: OutputFormat,
}

#[cfg(test)]
pub(crate) fn memory_context(output: OutputFormat) -> AppContext {
    use std::sync::Arc;

    let repository = Arc::new(rpcgate_data::MemoryRecordStore::new());
    AppContext {
        store: ConfigStore::new(repository).expect("builtin namespaces"),
        output,
    }
}
