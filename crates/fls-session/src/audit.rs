//! Structured session-lifecycle audit trail, patterned on the teacher's
//! `AuditEvent`/`CommonFields` SIEM-oriented audit log: every lifecycle
//! event is serialised as JSON and emitted through `tracing` alongside
//! the plain log lines the observer channel carries.

use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::{Level, event};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct CommonFields {
    /// ISO 8601 timestamp.
    pub timestamp: String,
    /// Correlation ID shared by every audit event of one session.
    pub session_id: String,
    pub service: &'static str,
    pub severity: &'static str,
}

impl CommonFields {
    fn new(session_id: &str, severity: &'static str) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            session_id: session_id.to_string(),
            service: "fls-gse",
            severity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SessionAuditEvent {
    SessionStarted {
        #[serde(flatten)]
        common: CommonFields,
        target_ip: Ipv4Addr,
        part_number: String,
    },
    SessionCompleted {
        #[serde(flatten)]
        common: CommonFields,
    },
    SessionAborted {
        #[serde(flatten)]
        common: CommonFields,
        reason: String,
    },
}

impl SessionAuditEvent {
    fn severity(&self) -> &'static str {
        match self {
            SessionAuditEvent::SessionStarted { common, .. }
            | SessionAuditEvent::SessionCompleted { common, .. }
            | SessionAuditEvent::SessionAborted { common, .. } => common.severity,
        }
    }

    /// Serialise and emit through `tracing` at the severity the event
    /// carries. Falls back to an inline error string if serialisation
    /// somehow fails — it never panics.
    pub fn log(&self) {
        let json = serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"error\":\"failed to serialize audit event: {e}\"}}"));
        match self.severity() {
            "error" => event!(Level::ERROR, audit_event = %json),
            "warn" => event!(Level::WARN, audit_event = %json),
            _ => event!(Level::INFO, audit_event = %json),
        }
    }
}

/// Generates the correlation ID for one worker invocation.
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn session_started(session_id: &str, target_ip: Ipv4Addr, part_number: &str) -> SessionAuditEvent {
    SessionAuditEvent::SessionStarted {
        common: CommonFields::new(session_id, "info"),
        target_ip,
        part_number: part_number.to_string(),
    }
}

pub fn session_completed(session_id: &str) -> SessionAuditEvent {
    SessionAuditEvent::SessionCompleted {
        common: CommonFields::new(session_id, "info"),
    }
}

pub fn session_aborted(session_id: &str, reason: &str) -> SessionAuditEvent {
    SessionAuditEvent::SessionAborted {
        common: CommonFields::new(session_id, "error"),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_started_serializes_with_event_type_tag() {
        let event = session_started(&new_session_id(), Ipv4Addr::new(192, 168, 4, 1), "EMB-0001-021-045");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"session_started\""));
        assert!(json.contains("EMB-0001-021-045"));
    }

    #[test]
    fn session_aborted_has_error_severity() {
        let event = session_aborted(&new_session_id(), "transport timeout");
        assert_eq!(event.severity(), "error");
    }
}
