use thiserror::Error;

/// Fixed status codes returned on the wire; `Status` in the response
/// envelope is always one of these as an integer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    NoHandler = 101,
    UnparseableJson = 102,
    ConnectionError = 103,
    ReadDeadlineExceeded = 104,
    HandlerError = 105,
    InternalMarshalError = 106,
}

impl StatusCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Error)]
pub enum CommandMonitorError {
    #[error("no handler registered for command {0:?}")]
    NoHandler(String),
    #[error("request was not valid JSON: {0}")]
    UnparseableJson(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("read deadline exceeded before a complete frame arrived")]
    ReadDeadlineExceeded,
    #[error("handler returned an error: {0}")]
    Handler(String),
    #[error("failed to marshal response: {0}")]
    InternalMarshal(String),
    #[error("handler {0:?} is already registered")]
    DuplicateHandler(String),
    #[error("I/O error setting up the listen endpoint: {0}")]
    Setup(#[source] std::io::Error),
}

impl CommandMonitorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoHandler(_) => StatusCode::NoHandler,
            Self::UnparseableJson(_) => StatusCode::UnparseableJson,
            Self::Connection(_) => StatusCode::ConnectionError,
            Self::ReadDeadlineExceeded => StatusCode::ReadDeadlineExceeded,
            Self::Handler(_) => StatusCode::HandlerError,
            Self::InternalMarshal(_) | Self::DuplicateHandler(_) | Self::Setup(_) => {
                StatusCode::InternalMarshalError
            }
        }
    }
}
