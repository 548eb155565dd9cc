//! Client error types.

use chunkup_protocol::ErrorKind;

/// Errors produced by the upload client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("server error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] chunkup_transfer::TransferError),

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("cancelled")]
    Cancelled,

    #[error("task join error: {0}")]
    Join(String),
}

impl ClientError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_)
            | Self::Protocol(_)
            | Self::Json(_)
            | Self::Cancelled
            | Self::Join(_) => {
                ErrorKind::Transfer
            }
            Self::Api { status, .. } => match status {
                400 => ErrorKind::Input,
                409 => ErrorKind::Conflict,
                422 => ErrorKind::Merge,
                _ => ErrorKind::Transfer,
            },
            Self::Server { code, .. } => ErrorKind::from_code(*code).unwrap_or(ErrorKind::Transfer),
            Self::Transfer(chunkup_transfer::TransferError::Io(_)) => ErrorKind::Io,
            Self::Transfer(_) | Self::InvalidUrl(_) => ErrorKind::Input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_codes_round_trip_to_kinds() {
        let err = ClientError::Server {
            code: ErrorKind::Merge.code(),
            message: "incomplete".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Merge);

        let unknown = ClientError::Server {
            code: 99,
            message: "?".into(),
        };
        assert_eq!(unknown.kind(), ErrorKind::Transfer);
    }

    #[test]
    fn status_codes_classify() {
        let bad = ClientError::Api {
            status: 400,
            body: "process file chunk failed".into(),
        };
        assert_eq!(bad.kind(), ErrorKind::Input);
        let down = ClientError::Api {
            status: 503,
            body: String::new(),
        };
        assert_eq!(down.kind(), ErrorKind::Transfer);
    }
}
