//! Process-wide configuration
//!
//! Settings are read from the environment once at startup and handed to the
//! relay by parameter. The SMTP part is only checked for completeness and a
//! usable `FROM_EMAIL` when a [`TransportConfig`] is derived, which happens on
//! every send.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use lettre::message::Mailbox;

/// Submission port used when `SMTP_PORT` is unset
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Well-known implicit TLS (SMTPS) port
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Upper bound for each network phase of a send
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// HTTP port used when `PORT` is unset
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Raw SMTP settings, as found in the environment
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub port: Option<String>,
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub connect_timeout_ms: u64,

    /// Skip upstream certificate verification. Defaults to `true` so that
    /// self-signed relays keep working; set `SMTP_TLS_ACCEPT_INVALID_CERTS=false`
    /// wherever the upstream presents a trusted certificate.
    pub accept_invalid_certs: bool,
}

impl SmtpSettings {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            host: non_empty("SMTP_HOST"),
            port: non_empty("SMTP_PORT"),
            secure: non_empty("SMTP_SECURE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            username: non_empty("SMTP_USER"),
            password: non_empty("SMTP_PASS"),
            from_address: non_empty("FROM_EMAIL"),
            connect_timeout_ms: non_empty("SMTP_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            accept_invalid_certs: non_empty("SMTP_TLS_ACCEPT_INVALID_CERTS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }

    /// Derive the transport configuration for one send
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let missing: Vec<&'static str> = [
            ("SMTP_HOST", self.host.is_none()),
            ("SMTP_USER", self.username.is_none()),
            ("SMTP_PASS", self.password.is_none()),
            ("FROM_EMAIL", self.from_address.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(host), Some(username), Some(password), Some(from_address)) = (
            self.host.clone(),
            self.username.clone(),
            self.password.clone(),
            self.from_address.clone(),
        ) else {
            return Err(ConfigError::Missing(missing));
        };

        if from_address.parse::<Mailbox>().is_err() {
            return Err(ConfigError::InvalidFromAddress(from_address));
        }

        let port = match &self.port {
            None => DEFAULT_SMTP_PORT,
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
        };

        Ok(TransportConfig {
            host,
            port,
            secure: self.secure || port == IMPLICIT_TLS_PORT,
            username,
            password,
            from_address,
            connect_timeout_ms: self.connect_timeout_ms,
            accept_invalid_certs: self.accept_invalid_certs,
        })
    }
}

/// Validated upstream connection parameters
#[derive(Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,

    /// Implicit TLS from the first byte. When false the connection starts in
    /// plaintext and upgrades with STARTTLS if the server offers it.
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub connect_timeout_ms: u64,
    pub accept_invalid_certs: bool,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_address", &self.from_address)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// Deployment misconfiguration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("SMTP configuration incomplete. Missing: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid SMTP_PORT: {0:?}")]
    InvalidPort(String),

    #[error("FROM_EMAIL is not a valid mailbox: {0:?}")]
    InvalidFromAddress(String),
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,

    /// Refuse to start when the SMTP settings are incomplete instead of
    /// answering every send with a 500
    pub strict_config: bool,
}

impl ServerSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let ip = lookup("HOST")
            .and_then(|h| h.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_HTTP_PORT);

        Self {
            addr: SocketAddr::new(ip, port),
            strict_config: lookup("SMTP_STRICT_CONFIG")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> SmtpSettings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SmtpSettings::from_lookup(|key| map.get(key).cloned())
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "mailer"),
            ("SMTP_PASS", "hunter2"),
            ("FROM_EMAIL", "noreply@example.com"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = settings(&complete()).transport_config().unwrap();
        assert_eq!(config.port, DEFAULT_SMTP_PORT);
        assert!(!config.secure);
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_port_465_implies_secure() {
        let mut vars = complete();
        vars.push(("SMTP_PORT", "465"));
        let config = settings(&vars).transport_config().unwrap();
        assert_eq!(config.port, 465);
        assert!(config.secure);
    }

    #[test]
    fn test_explicit_secure_flag() {
        let mut vars = complete();
        vars.push(("SMTP_SECURE", "true"));
        vars.push(("SMTP_PORT", "2525"));
        let config = settings(&vars).transport_config().unwrap();
        assert!(config.secure);
        assert_eq!(config.port, 2525);

        let mut vars = complete();
        vars.push(("SMTP_SECURE", "yes"));
        assert!(!settings(&vars).transport_config().unwrap().secure);
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let err = settings(&[("SMTP_HOST", "smtp.example.com"), ("SMTP_PASS", "")])
            .transport_config()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec!["SMTP_USER", "SMTP_PASS", "FROM_EMAIL"])
        );
        assert_eq!(
            err.to_string(),
            "SMTP configuration incomplete. Missing: SMTP_USER, SMTP_PASS, FROM_EMAIL"
        );
    }

    #[test]
    fn test_unparseable_from_address() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != "FROM_EMAIL");
        vars.push(("FROM_EMAIL", "not an address"));
        assert_eq!(
            settings(&vars).transport_config(),
            Err(ConfigError::InvalidFromAddress("not an address".to_string()))
        );
    }

    #[test]
    fn test_display_name_from_address() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != "FROM_EMAIL");
        vars.push(("FROM_EMAIL", "Example Mailer <noreply@example.com>"));
        assert!(settings(&vars).transport_config().is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = complete();
        vars.push(("SMTP_PORT", "smtp"));
        assert_eq!(
            settings(&vars).transport_config(),
            Err(ConfigError::InvalidPort("smtp".to_string()))
        );
    }

    #[test]
    fn test_certificate_toggle_and_timeout() {
        let mut vars = complete();
        vars.push(("SMTP_TLS_ACCEPT_INVALID_CERTS", "false"));
        vars.push(("SMTP_TIMEOUT_MS", "1500"));
        let config = settings(&vars).transport_config().unwrap();
        assert!(!config.accept_invalid_certs);
        assert_eq!(config.connect_timeout_ms, 1500);
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = settings(&complete()).transport_config().unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_server_settings() {
        let server = ServerSettings::from_lookup(|key| match key {
            "PORT" => Some("8080".to_string()),
            "SMTP_STRICT_CONFIG" => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(server.addr.port(), 8080);
        assert!(server.addr.ip().is_unspecified());
        assert!(server.strict_config);
    }
}
