use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during capture engine operations.
///
/// Every variant maps onto one [`ErrorCode`] so a binding layer can forward
/// failures as plain integers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    #[error("device not found: {0}")]
    DeviceNotFound(i32),

    #[error("capture engine is not initialized")]
    NotInitialized,

    #[error("capture device is not started")]
    NotStarted,

    #[error("failed to start device: {0}")]
    DeviceStartFailed(String),

    #[error("failed to initialize recording: {0}")]
    FailedToInitializeRecording(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("failed to write file: {0}")]
    FailedToWriteFile(String),

    #[error("filter not found")]
    FilterNotFound,

    #[error("filter already added")]
    FilterAlreadyAdded,

    #[error("invalid filter parameter id: {0}")]
    FilterParameterGetError(usize),
}

impl CaptureError {
    /// The closed error code surfaced across the binding boundary.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InitializationFailed(_) | Self::DeviceNotFound(_) => ErrorCode::InitializationFailed,
            Self::NotInitialized | Self::NotStarted => ErrorCode::NotInitialized,
            Self::DeviceStartFailed(_) => ErrorCode::FailedToStartDevice,
            Self::FailedToInitializeRecording(_) => ErrorCode::FailedToInitializeRecording,
            Self::InvalidArguments(_) => ErrorCode::InvalidArguments,
            Self::FailedToWriteFile(_) => ErrorCode::FailedToWriteFile,
            Self::FilterNotFound => ErrorCode::FilterNotFound,
            Self::FilterAlreadyAdded => ErrorCode::FilterAlreadyAdded,
            Self::FilterParameterGetError(_) => ErrorCode::FilterParameterGetError,
        }
    }
}

/// Numeric error codes, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    NoError = 0,
    InitializationFailed = 1,
    NotInitialized = 2,
    FailedToStartDevice = 3,
    FailedToInitializeRecording = 4,
    InvalidArguments = 5,
    FailedToWriteFile = 6,
    FilterNotFound = 7,
    FilterAlreadyAdded = 8,
    FilterParameterGetError = 9,
}

impl ErrorCode {
    /// Collapse a unit result into its code.
    pub fn of<T>(result: &Result<T, CaptureError>) -> Self {
        match result {
            Ok(_) => Self::NoError,
            Err(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_binding_numbering() {
        assert_eq!(ErrorCode::NoError as i32, 0);
        assert_eq!(CaptureError::NotInitialized.code() as i32, 2);
        assert_eq!(CaptureError::FilterParameterGetError(7).code() as i32, 9);
    }

    #[test]
    fn precondition_errors_share_not_initialized() {
        assert_eq!(CaptureError::NotStarted.code(), ErrorCode::NotInitialized);
        assert_eq!(CaptureError::DeviceNotFound(4).code(), ErrorCode::InitializationFailed);
    }

    #[test]
    fn code_of_result() {
        let ok: Result<(), CaptureError> = Ok(());
        assert_eq!(ErrorCode::of(&ok), ErrorCode::NoError);
        let err: Result<(), CaptureError> = Err(CaptureError::FilterAlreadyAdded);
        assert_eq!(ErrorCode::of(&err), ErrorCode::FilterAlreadyAdded);
    }
}
