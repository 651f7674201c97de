//! Error types for the diagnostic portal
//!
//! Every error here ends up as a human-readable line on the page; none of
//! them carries a machine code back to the browser.

use thiserror::Error;

/// Failures while reading an uploaded CSV
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("File is not valid UTF-8 text")]
    Encoding,

    #[error("CSV file is empty")]
    Empty,

    #[error("No value column found: every header mentions time ({0})")]
    NoValueColumn(String),

    #[error("CSV file has a header but no data rows")]
    NoRows,
}

/// Failures talking to the diagnostic, PDF or reports endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API request timed out")]
    Timeout,

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Unexpected API response: {0}")]
    Decode(String),
}

/// Failures from the remote login and register endpoints
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Registration failed (the user may already exist)")]
    RegistrationRejected,

    #[error("Email and password are required")]
    MissingFields,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Nothing to plot: the trajectory is empty")]
    EmptySeries,

    #[error("Chart drawing failed: {0}")]
    Draw(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Top-level error for the server binary
#[derive(Debug, Error)]
pub enum PortalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
