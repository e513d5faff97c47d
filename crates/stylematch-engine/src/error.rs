use std::io;

use thiserror::Error;

/// Failures of one analysis invocation. Every variant reduces to a single
/// human-readable message at the surface; none is fatal to the process.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Caught before any remote traffic, so an incomplete form never
    /// triggers paid computation.
    #[error("missing required image slots: {}", missing.join(", "))]
    IncompleteInput { missing: Vec<&'static str> },

    #[error("image encoding failed")]
    Encoding(#[source] anyhow::Error),

    /// Transport or server-side failure of the single remote call. Never
    /// retried automatically; retrying is a user action.
    #[error("analysis request failed")]
    Request(#[source] anyhow::Error),

    /// The remote call succeeded but returned zero text fragments. A
    /// contract violation distinct from "model produced odd prose".
    #[error("the response did not contain a text analysis part")]
    MissingAnalysis,
}

/// Camera/segmenter acquisition failures, classified at the point of
/// hardware access. Each variant maps to a distinct user-facing message.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access was denied; grant camera permission and try again")]
    PermissionDenied,
    #[error("no camera device was found")]
    DeviceNotFound,
    #[error("the camera could not be started: {0}")]
    Other(String),
}

impl CameraError {
    /// Classification of platform error codes at acquisition time.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
            io::ErrorKind::NotFound => CameraError::DeviceNotFound,
            _ => CameraError::Other(err.to_string()),
        }
    }
}
