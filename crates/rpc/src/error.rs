use jsonrpsee::types::ErrorCode;

use argus_core::{CursorError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected hash length ({0})")]
    UnexpectedHashLength(usize),

    #[error("incorrect hash: {0}")]
    IncorrectHash(hex::FromHexError),

    #[error("unexpected contract id length ({0})")]
    UnexpectedContractIdLength(usize),

    #[error("incorrect contract id: {0}")]
    IncorrectContractId(hex::FromHexError),

    #[error("invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),

    #[error("limit {requested} exceeds maximum {max}")]
    LimitOutOfRange { requested: usize, max: usize },

    #[error("no ledger available")]
    NoLedger,

    #[error(transparent)]
    StoreError(#[from] StoreError),

    /// Request-level failures raised by the transport while decoding
    /// params; constructed explicitly at every `Params::parse` call site.
    #[error(transparent)]
    JsonRpcError(jsonrpsee::types::ErrorObjectOwned),
}

impl Error {
    pub fn code(&self) -> i32 {
        match self {
            Error::JsonRpcError(err) => err.code(),
            Error::UnexpectedHashLength(_) => ErrorCode::InvalidParams.code(),
            Error::IncorrectHash(_) => ErrorCode::InvalidParams.code(),
            Error::UnexpectedContractIdLength(_) => ErrorCode::InvalidParams.code(),
            Error::IncorrectContractId(_) => ErrorCode::InvalidParams.code(),
            Error::InvalidCursor(_) => ErrorCode::InvalidParams.code(),
            Error::LimitOutOfRange { .. } => ErrorCode::InvalidParams.code(),
            Error::NoLedger => ErrorCode::InternalError.code(),
            Error::StoreError(_) => ErrorCode::InternalError.code(),
        }
    }

    /// Cancellation is an expected outcome of a reader deadline, not a
    /// server fault worth an error-level log line.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::StoreError(StoreError::Cancelled))
    }
}

impl From<Error> for jsonrpsee::types::ErrorObject<'_> {
    fn from(error: Error) -> Self {
        // the served message follows the `[<code>] <detail>` template
        let message = format!("[{}] {}", error.code(), error);

        jsonrpsee::types::ErrorObject::owned(error.code(), message, None::<()>)
    }
}
