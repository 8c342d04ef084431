use crate::batch::UploadError;
use crate::extract::ExtractError;
use crate::status::TransitionError;
use crate::store::StoreError;
use thiserror::Error;

pub type GsResult<T> = Result<T, GradeSyncError>;

#[derive(Debug, Error)]
pub enum GradeSyncError {
    #[error("extraction failed: {0}")]
    ExtractionFailed(#[from] ExtractError),

    #[error("student not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(StoreError),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("{0}")]
    BadParams(String),

    #[error("select a workspace first")]
    NoWorkspace,
}

impl GradeSyncError {
    pub fn code(&self) -> &'static str {
        match self {
            GradeSyncError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            GradeSyncError::NotFound(_) => "NOT_FOUND",
            GradeSyncError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            GradeSyncError::InvalidTransition(_) => "INVALID_TRANSITION",
            GradeSyncError::BadParams(_) => "bad_params",
            GradeSyncError::NoWorkspace => "no_workspace",
        }
    }
}

impl From<StoreError> for GradeSyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transition(t) => GradeSyncError::InvalidTransition(t),
            other => GradeSyncError::StorageUnavailable(other),
        }
    }
}

impl From<UploadError> for GradeSyncError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Extract(x) => GradeSyncError::ExtractionFailed(x),
            UploadError::Store(s) => s.into(),
        }
    }
}
