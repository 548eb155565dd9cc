use serde::{Deserialize, Serialize};

use crate::constants::CODE_OK;
use crate::types::ErrorKind;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Asks whether a file still needs uploading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub filename: String,
    pub file_hash: String,
}

/// Requests assembly of the staged chunks of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Chunk size in bytes used when slicing the file.
    pub size: u64,
    pub file_hash: String,
    pub filename: String,
    /// Total file size. When present the server refuses to merge an
    /// incomplete chunk set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Purges one file's server-side state. An absent body purges everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub file_hash: String,
    pub filename: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Answer to [`VerifyRequest`].
///
/// `uploaded_list` is omitted when `should_upload` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub should_upload: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_list: Option<Vec<String>>,
}

impl VerifyResponse {
    /// The final artifact exists; nothing to send.
    pub fn complete() -> Self {
        Self {
            should_upload: false,
            uploaded_list: None,
        }
    }

    /// Upload required; `uploaded` lists chunk ids already staged.
    pub fn upload(uploaded: Vec<String>) -> Self {
        Self {
            should_upload: true,
            uploaded_list: Some(uploaded),
        }
    }
}

/// `{code, message}` body returned by merge and delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub code: i32,
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: CODE_OK,
            message: message.into(),
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code(),
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

/// Message sent after a successful merge.
pub const MERGE_SUCCESS: &str = "file merged success";

/// Message sent after a successful delete.
pub const DELETE_SUCCESS: &str = "file delete success";
