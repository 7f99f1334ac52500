//! Upstream SMTP transport
//!
//! [`Connector`] builds a [`MailTransport`] from a [`TransportConfig`]. The
//! production implementation is backed by `lettre`; tests substitute their
//! own to count or script upstream behavior.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        Error as SmtpError,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::TransportConfig;
use crate::error::{FailureCategory, UpstreamError};
use crate::types::SendResult;

/// A message ready for submission
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub text: String,
    pub message_id: String,
}

/// An upstream connection sequence: verify, then send
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Connect, authenticate and disconnect without sending anything
    async fn verify(&self) -> Result<(), UpstreamError>;

    /// Submit one message
    async fn send(&self, message: &OutboundMessage) -> Result<SendResult, UpstreamError>;
}

/// Builds transports from configuration
pub trait Connector: Send + Sync {
    fn connect(&self, config: &TransportConfig) -> Result<Box<dyn MailTransport>, UpstreamError>;
}

/// `lettre`-backed connector
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreConnector;

impl Connector for LettreConnector {
    fn connect(&self, config: &TransportConfig) -> Result<Box<dyn MailTransport>, UpstreamError> {
        let tls = tls_mode(config)?;

        let inner = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
            .port(config.port)
            .tls(tls)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(Duration::from_millis(config.connect_timeout_ms)))
            .build();

        Ok(Box::new(LettreTransport { inner }))
    }
}

/// TLS mode for a config: `Wrapper` is TLS from the first byte (SMTPS),
/// `Opportunistic` is plaintext upgraded with STARTTLS when offered.
fn tls_mode(config: &TransportConfig) -> Result<Tls, UpstreamError> {
    let tls_parameters = TlsParameters::builder(config.host.clone())
        .dangerous_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(|e| UpstreamError::new(FailureCategory::Tls, e.to_string()))?;

    Ok(if config.secure {
        Tls::Wrapper(tls_parameters)
    } else {
        Tls::Opportunistic(tls_parameters)
    })
}

struct LettreTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

#[async_trait]
impl MailTransport for LettreTransport {
    async fn verify(&self) -> Result<(), UpstreamError> {
        match self.inner.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(UpstreamError::connection(
                "upstream did not answer NOOP after connecting",
            )),
            Err(e) => Err(upstream_error(&e)),
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<SendResult, UpstreamError> {
        let email = Message::builder()
            .from(message.from.clone())
            .to(message.to.clone())
            .subject(message.subject.as_str())
            .message_id(Some(message.message_id.clone()))
            .header(ContentType::TEXT_PLAIN)
            .body(message.text.clone())
            .map_err(|e| UpstreamError::new(FailureCategory::Other, e.to_string()))?;

        let response = self
            .inner
            .send(email)
            .await
            .map_err(|e| upstream_error(&e))?;

        tracing::debug!(
            code = %response.code(),
            reply = ?response.first_line(),
            "Upstream accepted message"
        );

        // The envelope has one recipient and lettre fails the whole send on
        // any RCPT rejection, so success means it was accepted.
        Ok(SendResult {
            accepted: vec![message.to.email.to_string()],
            rejected: vec![],
            message_id: Some(message.message_id.clone()),
        })
    }
}

/// Map a `lettre` error to its category and reply code
fn upstream_error(err: &SmtpError) -> UpstreamError {
    let detail = err.to_string();

    if err.is_timeout() {
        return UpstreamError::timeout(detail);
    }
    if err.is_tls() {
        return UpstreamError::new(FailureCategory::Tls, detail);
    }
    if let Some(code) = err.status() {
        return match code.to_string().parse::<u16>() {
            Ok(code) => UpstreamError::reply(code, detail),
            Err(_) => UpstreamError::new(FailureCategory::Response, detail),
        };
    }
    if err.is_client() {
        // "No compatible authentication mechanism was found"
        let category = if detail.to_ascii_lowercase().contains("authentication") {
            FailureCategory::Auth
        } else {
            FailureCategory::Other
        };
        return UpstreamError::new(category, detail);
    }
    if err.is_response() {
        return UpstreamError::new(FailureCategory::Response, detail);
    }

    // Remaining kinds are socket-level: refused, reset, unreachable, DNS.
    UpstreamError::connection(detail)
}
