//! SMTP relay - send email over HTTP through an upstream SMTP server
//!
//! A caller posts `{ receiver_email, subject, body_text }` to `/send`. The
//! payload is validated, then relayed to the configured upstream server and
//! the outcome is mapped to an HTTP status:
//!
//! | Outcome | Status |
//! |---|---|
//! | accepted by upstream | 200 |
//! | malformed request, or recipient rejected (550) | 400 |
//! | upstream refused credentials | 401 |
//! | upstream unreachable or timed out | 502 |
//! | misconfiguration, anything else | 500 |
//!
//! ## Architecture
//!
//! ```text
//! HTTP client → axum (api) → validate → relay → lettre → upstream SMTP
//!                                          ↑
//!                               TransportConfig (config)
//! ```
//!
//! Every request is independent: the transport is rebuilt per call, nothing
//! is pooled or retried.
//!
//! ## Usage
//!
//! Run the `smtp-relay` binary with `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS`
//! and `FROM_EMAIL` set. See `main.rs` for the remaining variables.

pub mod api;
pub mod config;
pub mod error;
pub mod relay;
pub mod transport;
pub mod types;
pub mod validate;

pub use api::{router, AppState};
pub use config::{ConfigError, ServerSettings, SmtpSettings, TransportConfig};
pub use error::{ClassifiedError, FailureCategory, RelayError, UpstreamError};
pub use relay::Relay;
pub use transport::{Connector, LettreConnector, MailTransport, OutboundMessage};
pub use types::{ErrorBody, SendRequest, SendResponse, SendResult};
pub use validate::{validate, validate_payload, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
