//! Relay a validated request to the upstream SMTP server

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lettre::message::Mailbox;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{ConfigError, TransportConfig};
use crate::error::{RelayError, UpstreamError};
use crate::transport::{Connector, LettreConnector, OutboundMessage};
use crate::types::{SendRequest, SendResult};
use crate::validate::ValidationError;

/// Sends one message per call. Holds no per-request state.
#[derive(Clone)]
pub struct Relay {
    connector: Arc<dyn Connector>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(Arc::new(LettreConnector))
    }
}

impl Relay {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Verify the upstream, then submit the message.
    ///
    /// Each network phase is bounded by `config.connect_timeout_ms`; there
    /// are no retries.
    #[instrument(skip_all, fields(host = %config.host, port = config.port, secure = config.secure))]
    pub async fn send(
        &self,
        config: &TransportConfig,
        request: &SendRequest,
    ) -> Result<SendResult, RelayError> {
        let message = build_message(config, request)?;
        let bound = Duration::from_millis(config.connect_timeout_ms);

        let transport = self.connector.connect(config)?;

        with_timeout(bound, "verify", transport.verify()).await?;
        let result = with_timeout(bound, "send", transport.send(&message)).await?;

        info!(
            message_id = ?result.message_id,
            accepted = result.accepted.len(),
            rejected = result.rejected.len(),
            "Email relayed"
        );

        Ok(result)
    }
}

fn build_message(
    config: &TransportConfig,
    request: &SendRequest,
) -> Result<OutboundMessage, RelayError> {
    let from: Mailbox = config
        .from_address
        .parse()
        .map_err(|_| ConfigError::InvalidFromAddress(config.from_address.clone()))?;
    // Already checked by the validator; still mapped for direct callers.
    let to: Mailbox = request
        .receiver_email
        .parse()
        .map_err(|_| ValidationError::InvalidEmail)?;

    let message_id = format!("<{}@{}>", Uuid::new_v4(), from.email.domain());

    Ok(OutboundMessage {
        from,
        to,
        subject: request.subject.clone(),
        text: request.body_text.clone(),
        message_id,
    })
}

async fn with_timeout<T, F>(bound: Duration, phase: &str, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(bound, fut).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::timeout(format!(
            "{phase} timed out after {}ms",
            bound.as_millis()
        ))),
    }
}
