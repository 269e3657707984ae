use thiserror::Error;

/// Application-wide error types for Legis.
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream answered with something other than 2xx, or the request could not be built.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error (refused, DNS, reset).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Payload or record could not be interpreted (bad JSON, bad XML, bad Turtle).
    #[error("Format error: {0}")]
    FormatError(String),

    /// Headless rendering failed (navigation, selector never appeared, browser crash).
    #[error("Render error: {0}")]
    RenderError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Coarse classification used in logs and cycle reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Transport,
    Format,
    Persistence,
    Configuration,
    Other,
}

impl FaultClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultClass::Transport => "transport",
            FaultClass::Format => "format",
            FaultClass::Persistence => "persistence",
            FaultClass::Configuration => "configuration",
            FaultClass::Other => "other",
        }
    }
}

impl std::fmt::Display for FaultClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn fault_class(&self) -> FaultClass {
        match self {
            AppError::HttpError(_)
            | AppError::Timeout(_)
            | AppError::NetworkError(_)
            | AppError::RenderError(_) => FaultClass::Transport,
            AppError::FormatError(_) | AppError::SerializationError(_) => FaultClass::Format,
            AppError::DatabaseError(_) => FaultClass::Persistence,
            AppError::ConfigError(_) => FaultClass::Configuration,
            AppError::Generic(_) => FaultClass::Other,
        }
    }
}
