//! Error taxonomy and upstream failure classification

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::ConfigError;
use crate::types::ErrorBody;
use crate::validate::ValidationError;

/// Reply codes an upstream uses to refuse credentials
pub const AUTH_FAILURE_CODES: [u16; 4] = [530, 534, 535, 538];

/// "Requested action not taken: mailbox unavailable"
pub const MAILBOX_UNAVAILABLE: u16 = 550;

/// Coarse failure category reported by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Credentials were refused or no usable mechanism was offered
    Auth,
    /// Refused, unreachable, reset, or name resolution failed
    Connection,
    Timeout,
    /// TLS handshake or certificate failure
    Tls,
    /// Server answered with a negative reply code
    Response,
    Other,
}

/// Machine-readable view of a transport failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{detail}")]
pub struct UpstreamError {
    pub category: FailureCategory,

    /// SMTP reply code, when the server produced one
    pub code: Option<u16>,

    /// Underlying error text, for logs only
    pub detail: String,
}

impl UpstreamError {
    pub fn new(category: FailureCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            code: None,
            detail: detail.into(),
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureCategory::Timeout, detail)
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        Self::new(FailureCategory::Connection, detail)
    }

    pub fn reply(code: u16, detail: impl Into<String>) -> Self {
        Self::new(FailureCategory::Response, detail).with_code(code)
    }

    fn is_auth(&self) -> bool {
        self.category == FailureCategory::Auth
            || self.code.is_some_and(|c| AUTH_FAILURE_CODES.contains(&c))
    }

    fn is_connectivity(&self) -> bool {
        matches!(
            self.category,
            FailureCategory::Connection | FailureCategory::Timeout | FailureCategory::Tls
        )
    }
}

/// Every way a send can fail
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(UpstreamError),

    #[error("Upstream connection failed: {0}")]
    UpstreamConnectivity(UpstreamError),

    #[error("Upstream rejected recipient: {0}")]
    UpstreamRejection(UpstreamError),

    #[error("Upstream failure: {0}")]
    Unclassified(UpstreamError),
}

impl From<UpstreamError> for RelayError {
    /// First match wins: auth, connectivity, mailbox unavailable, anything else.
    fn from(err: UpstreamError) -> Self {
        if err.is_auth() {
            RelayError::UpstreamAuth(err)
        } else if err.is_connectivity() {
            RelayError::UpstreamConnectivity(err)
        } else if err.code == Some(MAILBOX_UNAVAILABLE) {
            RelayError::UpstreamRejection(err)
        } else {
            RelayError::Unclassified(err)
        }
    }
}

/// Caller-facing status and message plus the detail kept for logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub http_status: StatusCode,
    pub public_message: String,
    pub internal_detail: String,
}

impl RelayError {
    /// Stable identifier returned in the `details` field
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation",
            RelayError::Configuration(_) => "configuration",
            RelayError::UpstreamAuth(_) => "upstream_auth",
            RelayError::UpstreamConnectivity(_) => "upstream_connectivity",
            RelayError::UpstreamRejection(_) => "upstream_rejection",
            RelayError::Unclassified(_) => "unclassified",
        }
    }

    pub fn classify(&self) -> ClassifiedError {
        let (http_status, public_message) = match self {
            RelayError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            RelayError::UpstreamAuth(_) => (
                StatusCode::UNAUTHORIZED,
                "SMTP authentication failed. Please check credentials.".to_string(),
            ),
            RelayError::UpstreamConnectivity(_) => (
                StatusCode::BAD_GATEWAY,
                "Failed to connect to SMTP server.".to_string(),
            ),
            RelayError::UpstreamRejection(_) => (
                StatusCode::BAD_REQUEST,
                "Invalid receiver email address.".to_string(),
            ),
            RelayError::Configuration(_) | RelayError::Unclassified(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        ClassifiedError {
            http_status,
            public_message,
            internal_detail: self.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let classified = self.classify();

        match &self {
            RelayError::Validation(_) => {
                tracing::debug!(error = %classified.internal_detail, "Rejected invalid request");
            }
            RelayError::Configuration(e) => {
                tracing::error!(error = %e, "SMTP relay is misconfigured");
            }
            RelayError::UpstreamAuth(e)
            | RelayError::UpstreamConnectivity(e)
            | RelayError::UpstreamRejection(e)
            | RelayError::Unclassified(e) => {
                tracing::error!(
                    kind = self.kind(),
                    category = ?e.category,
                    code = ?e.code,
                    error = %e.detail,
                    "Send failed"
                );
            }
        }

        let details = match &self {
            RelayError::Validation(_) => None,
            other => Some(other.kind().to_string()),
        };

        let body = Json(ErrorBody {
            error: classified.public_message,
            details,
        });

        (classified.http_status, body).into_response()
    }
}
