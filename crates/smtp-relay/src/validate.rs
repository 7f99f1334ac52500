//! Request payload validation
//!
//! Runs before any network activity. The checks are shape-only: the address
//! pattern is deliberately shallow and deliverability is left to the upstream
//! server's reply.

use lazy_static::lazy_static;
use lettre::message::Mailbox;
use regex::Regex;
use serde_json::Value;

use crate::types::SendRequest;

lazy_static! {
    /// `local@domain.tld`, where no part contains whitespace or `@`.
    /// U+FEFF is excluded too, matching ECMAScript's `\s`.
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s\x{FEFF}@]+@[^\s\x{FEFF}@]+\.[^\s\x{FEFF}@]+$").unwrap();
}

/// Validation error. The `Display` text is returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Request body is required")]
    MissingBody,

    #[error("Request body must be valid JSON")]
    InvalidJson,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("receiver_email is not a valid email address")]
    InvalidEmail,
}

/// Validate a raw request body.
///
/// An empty body is treated as absent; anything else must parse as JSON.
pub fn validate(raw: &[u8]) -> Result<SendRequest, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::MissingBody);
    }

    let body: Value = serde_json::from_slice(raw).map_err(|_| ValidationError::InvalidJson)?;
    validate_payload(&body)
}

/// Validate an already-parsed payload.
pub fn validate_payload(body: &Value) -> Result<SendRequest, ValidationError> {
    if is_falsy(body) {
        return Err(ValidationError::MissingBody);
    }

    let receiver_email = required_field(body, "receiver_email")?;
    let subject = required_field(body, "subject")?;
    let body_text = required_field(body, "body_text")?;

    if !is_valid_email(&receiver_email) || receiver_email.parse::<Mailbox>().is_err() {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(SendRequest {
        receiver_email,
        subject,
        body_text,
    })
}

/// Check an address against the `local@domain.tld` shape.
///
/// [`validate_payload`] additionally requires the address to parse as a
/// mailbox, so the relay can always put it on the envelope.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Extract a field as text. Absent and falsy values count as missing;
/// other non-string values are kept as their JSON text.
fn required_field(body: &Value, name: &'static str) -> Result<String, ValidationError> {
    match body.get(name) {
        None => Err(ValidationError::MissingField(name)),
        Some(value) if is_falsy(value) => Err(ValidationError::MissingField(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn payload(receiver: Value, subject: Value, body_text: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "receiver_email": receiver,
            "subject": subject,
            "body_text": body_text,
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_request() {
        let req = validate(br#"{"receiver_email":"x@y.com","subject":"Hi","body_text":"Hello"}"#)
            .unwrap();
        assert_eq!(
            req,
            SendRequest {
                receiver_email: "x@y.com".to_string(),
                subject: "Hi".to_string(),
                body_text: "Hello".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(validate(b""), Err(ValidationError::MissingBody));
    }

    #[test]
    fn test_falsy_json_body() {
        for raw in [&b"null"[..], b"false", b"0", br#""""#] {
            assert_eq!(validate(raw), Err(ValidationError::MissingBody));
        }
    }

    #[test]
    fn test_invalid_json() {
        assert_eq!(validate(b"{not json"), Err(ValidationError::InvalidJson));
        assert_eq!(validate(b"   "), Err(ValidationError::InvalidJson));
    }

    #[test]
    fn test_non_object_payload_has_no_fields() {
        assert_eq!(
            validate(b"[1, 2, 3]"),
            Err(ValidationError::MissingField("receiver_email"))
        );
        assert_eq!(
            validate(br#""hello""#),
            Err(ValidationError::MissingField("receiver_email"))
        );
    }

    #[test]
    fn test_missing_fields_in_order() {
        assert_eq!(
            validate(br#"{}"#),
            Err(ValidationError::MissingField("receiver_email"))
        );
        assert_eq!(
            validate(br#"{"receiver_email":"a@b.co"}"#),
            Err(ValidationError::MissingField("subject"))
        );
        assert_eq!(
            validate(br#"{"receiver_email":"a@b.co","subject":"s"}"#),
            Err(ValidationError::MissingField("body_text"))
        );
    }

    #[test]
    fn test_missing_field_wins_over_bad_email() {
        let raw = payload(json!("not-an-email"), json!(""), json!("text"));
        assert_eq!(validate(&raw), Err(ValidationError::MissingField("subject")));
    }

    #[test]
    fn test_null_and_empty_fields_are_missing() {
        let raw = payload(json!("a@b.co"), json!(null), json!("text"));
        assert_eq!(validate(&raw), Err(ValidationError::MissingField("subject")));

        let raw = payload(json!("a@b.co"), json!("s"), json!(""));
        assert_eq!(
            validate(&raw),
            Err(ValidationError::MissingField("body_text"))
        );
    }

    #[test]
    fn test_non_string_fields_are_coerced() {
        let raw = payload(json!("a@b.co"), json!(42), json!(true));
        let req = validate(&raw).unwrap();
        assert_eq!(req.subject, "42");
        assert_eq!(req.body_text, "true");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::MissingBody.to_string(),
            "Request body is required"
        );
        assert_eq!(
            ValidationError::InvalidJson.to_string(),
            "Request body must be valid JSON"
        );
        assert_eq!(
            ValidationError::MissingField("receiver_email").to_string(),
            "receiver_email is required"
        );
        assert_eq!(
            ValidationError::InvalidEmail.to_string(),
            "receiver_email is not a valid email address"
        );
    }

    #[test]
    fn test_email_shapes() {
        for bad in ["not-an-email", "a@b", "@b.com", "a@.com ", "a b@c.com", "a@b@c.com"] {
            assert!(!is_valid_email(bad), "{bad} should be rejected");
        }
        for good in ["a@b.co", "user.name+tag@sub.domain.com", "x@y.com"] {
            assert!(is_valid_email(good), "{good} should be accepted");
        }
    }

    #[test]
    fn test_byte_order_mark_is_whitespace() {
        assert!(!is_valid_email("a@b.co\u{feff}"));
        assert!(!is_valid_email("\u{feff}a@b.co"));
    }

    #[test]
    fn test_shape_ok_but_unusable_address_is_rejected() {
        for email in ["a@b.c.", "a..b@c.com", "a;b@c.com", "(a@b.co"] {
            assert!(is_valid_email(email), "{email} passes the shape check");
            let raw = payload(json!(email), json!("s"), json!("t"));
            assert_eq!(
                validate(&raw),
                Err(ValidationError::InvalidEmail),
                "{email} should be rejected"
            );
        }
    }

    #[test]
    fn test_validation_is_idempotent() {
        let raw = payload(json!("a@b"), json!("s"), json!("t"));
        assert_eq!(validate(&raw), validate(&raw));
    }
}
