/// Result type for startup operations
pub type StartupResult<T> = Result<T, StartupError>;

/// Errors that stop the server before it starts serving
#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("Invalid base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("Invalid timeout: {seconds}s. Expected between {min}s and {max}s")]
    InvalidTimeout { seconds: u64, min: u64, max: u64 },
    #[error("Invalid proxy URL {url}: {message}")]
    InvalidProxy { url: String, message: String },
    /// Logging initialization failed
    #[error("Logging initialization failed: {0}")]
    LoggingInitialization(String),
}
