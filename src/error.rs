use serde::Serialize;
use thiserror::Error;

/// Error taxonomy surfaced to clients in acknowledgement replies.
///
/// Each variant maps to exactly one wire string via [`RoomError::code`]; never
/// leak internal detail through any variant but [`RoomError::Internal`].
#[derive(Debug, Error, Clone)]
pub enum RoomError {
    #[error("room, message, transport, consumer or producer not found")]
    NotFound,
    #[error("operation requires host privileges or message authorship")]
    Forbidden,
    #[error("room is locked")]
    Locked,
    #[error("router capabilities do not support this producer/consumer")]
    CannotConsume,
    #[error("request timed out")]
    Timeout,
    #[error("malformed request payload")]
    BadRequest,
    #[error("too many requests")]
    RateLimited,
    #[error("unknown event")]
    UnknownEvent,
    #[error("internal error: {0}")]
    Internal(String),
}

impl RoomError {
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotFound => "not_found",
            RoomError::Forbidden => "forbidden",
            RoomError::Locked => "locked",
            RoomError::CannotConsume => "cannot_consume",
            RoomError::Timeout => "timeout",
            RoomError::BadRequest => "bad_request",
            RoomError::RateLimited => "rate_limited",
            RoomError::UnknownEvent => "unknown event",
            RoomError::Internal(_) => "internal",
        }
    }
}

impl From<anyhow::Error> for RoomError {
    fn from(err: anyhow::Error) -> Self {
        log::error!("internal error: {err:#}");
        RoomError::Internal("internal error".to_string())
    }
}

/// Wire shape of a failed acknowledgement: `{"error": "not_found"}`.
#[derive(Debug, Serialize)]
pub struct ErrorReply {
    pub error: String,
}

impl From<RoomError> for ErrorReply {
    fn from(err: RoomError) -> Self {
        ErrorReply {
            error: err.code().to_string(),
        }
    }
}

pub type RoomResult<T> = Result<T, RoomError>;
