//! Security audit logging for authentication events
//!
//! Sign-up, sign-in, sign-out and rejected tokens are logged at INFO level
//! with the "audit" target, so they can be filtered and routed separately
//! from application logs.
//!
//! Events never carry a password, a password hash or a token.
//!
//! # Example
//!
//! ```ignore
//! use payhere_api::audit::{AuditEvent, audit_log};
//!
//! audit_log(&AuditEvent::SignInSuccess {
//!     user_id: user.id,
//!     phone_number: user.phone_number.clone(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: None,
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Account created
    SignUpSuccess {
        user_id: i64,
        phone_number: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Sign-up rejected (invalid input or duplicate phone number)
    SignUpFailure {
        phone_number: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Token issued
    SignInSuccess {
        user_id: i64,
        phone_number: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Sign-in rejected (unknown phone number or wrong password)
    SignInFailure {
        phone_number: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Token revoked
    SignOut {
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Invalid, expired or revoked token presented to a gated route
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },
}

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The event is also serialized to JSON in the `event` field for log
/// aggregators:
///
/// ```json
/// {
///   "event_type": "sign_in_failure",
///   "phone_number": "01012341234",
///   "reason": "password mismatch",
///   "ip_address": "192.168.1.1",
///   "user_agent": null
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::SignUpSuccess {
            user_id,
            phone_number,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                phone_number = %phone_number,
                ip_address = ?ip_address,
                "Sign-up successful"
            );
        }
        AuditEvent::SignUpFailure {
            phone_number,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                phone_number = %phone_number,
                reason = %reason,
                ip_address = ?ip_address,
                "Sign-up failed"
            );
        }
        AuditEvent::SignInSuccess {
            user_id,
            phone_number,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                phone_number = %phone_number,
                ip_address = ?ip_address,
                "Sign-in successful"
            );
        }
        AuditEvent::SignInFailure {
            phone_number,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                phone_number = %phone_number,
                reason = %reason,
                ip_address = ?ip_address,
                "Sign-in failed"
            );
        }
        AuditEvent::SignOut { ip_address, .. } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                "Sign-out"
            );
        }
        AuditEvent::InvalidToken {
            ip_address, reason, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                reason = %reason,
                "Invalid token"
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop), then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract the user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::SignInSuccess {
            user_id: 7,
            phone_number: "01012341234".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"sign_in_success\""));
        assert!(json.contains("01012341234"));
    }

    #[test]
    fn test_audit_log_events() {
        // Only checks that logging does not panic
        audit_log(&AuditEvent::SignUpFailure {
            phone_number: "010".to_string(),
            reason: "Invalid phone number".to_string(),
            ip_address: None,
            user_agent: None,
        });
        audit_log(&AuditEvent::SignOut {
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: None,
        });
        audit_log(&AuditEvent::InvalidToken {
            ip_address: None,
            user_agent: Some("Test Agent".to_string()),
            reason: "blacklisted token".to_string(),
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, "Mozilla/5.0 (Test)".parse().unwrap());

        let context = AuditContext::from_headers(&headers);
        assert_eq!(context.ip_address, None);
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0 (Test)"));
    }

    #[test]
    fn test_extract_missing_headers() {
        let headers = HeaderMap::new();

        assert_eq!(AuditContext::from_headers(&headers), AuditContext::default());
    }
}
