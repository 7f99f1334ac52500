//! Request and response structures for the relay API

use serde::{Deserialize, Serialize};

/// Validated send request
///
/// Only ever constructed by [`crate::validate::validate`], so every field is
/// non-empty and `receiver_email` has a `local@domain.tld` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Sole recipient of the message
    pub receiver_email: String,

    /// Message subject
    pub subject: String,

    /// Plain text body
    pub body_text: String,
}

/// Outcome of a successful relay, as reported by the upstream server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendResult {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub message_id: Option<String>,
}

/// JSON body returned with `200 OK`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendResponse {
    pub message: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
}

impl From<SendResult> for SendResponse {
    fn from(result: SendResult) -> Self {
        Self {
            message: "Email sent successfully".to_string(),
            accepted: result.accepted,
            rejected: result.rejected,
            message_id: result.message_id,
        }
    }
}

/// JSON body returned for every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,

    /// Machine-readable error kind. Absent for request validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
