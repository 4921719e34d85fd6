/// Result alias that carries the custom [`MotionError`] type.
pub type Result<T> = std::result::Result<T, MotionError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    /// Free-form failure, typically returned by engine and subscriber
    /// callbacks that have nothing more specific to report.
    #[error("{0}")]
    Message(String),
    /// Configuration or input that cannot be processed at all.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A shared resource was poisoned by a panicking thread.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl MotionError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MotionError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MotionError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
