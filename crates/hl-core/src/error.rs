use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum CoreReason {
    #[error("event store unavailable")]
    StoreUnavailable,
    #[error("invalid page spec")]
    InvalidPageSpec,
    #[error("scan task failed")]
    ScanTask,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::StoreUnavailable => 1001,
            Self::InvalidPageSpec => 1002,
            Self::ScanTask => 1003,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;

pub(crate) fn store_unavailable(detail: impl Into<String>) -> CoreError {
    StructError::from(CoreReason::StoreUnavailable).with_detail(detail.into())
}
