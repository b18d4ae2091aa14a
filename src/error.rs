//! Error handling for the PTZ tracker

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config error (fatal at startup)
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Camera actuator rejected or failed a command
    #[error("Actuator error on {camera}: {message}")]
    Actuator { camera: String, message: String },

    /// No driver registered for the configured brand
    #[error("Unknown camera brand: {0}")]
    UnknownBrand(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Message transport (MQTT) error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Image upload error
    #[error("Upload error: {0}")]
    Upload(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for an actuator failure on a named camera
    pub fn actuator(camera: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Actuator {
            camera: camera.into(),
            message: message.into(),
        }
    }
}
