//! Error types with HTTP status code mapping.

/// Error type for grantree operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Access errors
    #[error("Forbidden: cannot {action} {resource}")]
    Forbidden { resource: String, action: String },

    // Data errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid permission level: {0}")]
    InvalidLevel(String),

    #[error("Incomplete closure: parent {parent_id} of {resource_id} is missing")]
    IncompleteClosure {
        resource_id: String,
        parent_id: String,
    },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // System errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status a host should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Forbidden { .. } => 403,

            Error::NotFound(_) => 404,
            Error::BadRequest(_) | Error::InvalidLevel(_) | Error::IncompleteClosure { .. } => 400,

            // Config errors -> 500 (shouldn't happen at runtime)
            Error::Config(_) => 500,

            Error::Io(_) | Error::Json(_) | Error::Database(_) | Error::Internal(_) => 500,
        }
    }

    /// Message safe to show to the caller. Server-side errors are logged and
    /// replaced with a generic message.
    pub fn public_message(&self) -> String {
        if self.status_code() >= 500 {
            tracing::error!("Internal error: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Result type alias using grantree's Error.
pub type Result<T> = std::result::Result<T, Error>;
