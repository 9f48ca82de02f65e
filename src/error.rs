use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// The external detector rejected or faulted on a submission
    #[error("Detection failed: {0}")]
    DetectionFailure(String),

    /// A submission was attempted while another one is still outstanding
    #[error("Detector busy: a submission is already in flight")]
    DetectorBusy,

    /// A sequence file could not be read or parsed
    #[error("Failed to load sequence: {0}")]
    LoadFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable code carried by failure events
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DetectionFailure(_) => "detection_failure",
            AppError::DetectorBusy => "detector_busy",
            AppError::LoadFailure(_) => "load_failure",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AppError>;
