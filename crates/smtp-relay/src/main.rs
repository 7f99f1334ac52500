//! SMTP relay server
//!
//! ## Environment
//!
//! | Variable | Default |
//! |---|---|
//! | `SMTP_HOST`, `SMTP_USER`, `SMTP_PASS`, `FROM_EMAIL` | required |
//! | `SMTP_PORT` | 587 |
//! | `SMTP_SECURE` | `true` when the port is 465 |
//! | `SMTP_TIMEOUT_MS` | 5000 |
//! | `SMTP_TLS_ACCEPT_INVALID_CERTS` | true |
//! | `SMTP_STRICT_CONFIG` | false |
//! | `HOST`, `PORT` | `0.0.0.0`, 3000 |
//! | `LOG_FORMAT` | text (`json` for structured lines) |
//!
//! A `.env` file in the working directory is loaded first if present.

use std::sync::Arc;

use anyhow::{bail, Result};
use smtp_relay::{router, AppState, Relay, ServerSettings, SmtpSettings};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!(version = smtp_relay::VERSION, "Starting SMTP relay");

    let server = ServerSettings::from_env();
    let settings = SmtpSettings::from_env();

    match settings.transport_config() {
        Ok(config) => {
            info!(host = %config.host, port = config.port, secure = config.secure, "SMTP upstream configured");
            if config.accept_invalid_certs {
                warn!("Upstream TLS certificates are not verified (SMTP_TLS_ACCEPT_INVALID_CERTS)");
            }
        }
        Err(e) if server.strict_config => {
            bail!("{e}");
        }
        Err(e) => {
            error!(error = %e, "SMTP configuration incomplete, every send will fail with 500");
        }
    }

    let state = Arc::new(AppState::new(settings, Relay::default()));
    let app = router(state);

    info!("Listening on http://{}", server.addr);
    let listener = tokio::net::TcpListener::bind(server.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new("smtp_relay=info,tower_http=debug")
    })?;

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
