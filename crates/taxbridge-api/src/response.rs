//! # Response Envelope
//!
//! Every successful response is wrapped as
//! `{ "success": true, "message", "data", "count"? }`; `count` is present
//! on list responses only.

use serde::Serialize;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> ApiResponse<T> {
    /// Single-item response.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            count: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// List response carrying its length.
    pub fn list(message: impl Into<String>, data: Vec<T>) -> Self {
        let count = data.len();
        Self {
            success: true,
            message: message.into(),
            data,
            count: Some(count),
        }
    }
}
