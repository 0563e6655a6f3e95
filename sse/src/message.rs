use log::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Opaque identifier of one logical client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build and release information pushed to clients when a new frontend is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMeta {
    /// Version of the running backend.
    pub revision: String,
    /// Most recent frontend version reported by the version provider.
    pub latest_frontend_version: String,
    pub build_date: String,
}

/// Every event that can be pushed down a client stream.
///
/// Variants are closed on purpose: the wire name, the payload encoding and
/// whether delivery requires a fresh auth check are all decided here and
/// nowhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Periodic keep-alive, also the upper bound on how long a revoked
    /// stream can stay open.
    Heartbeat,
    VersionMeta(VersionMeta),
    /// An asynchronous task submitted by this session has completed.
    TaskReady { correlation_id: String },
    /// Synthetic terminal marker written in place of an event whose auth check failed.
    LoggedOut,
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::Heartbeat => "Heartbeat",
            Event::VersionMeta(_) => "Meta",
            Event::TaskReady { .. } => "TaskReady",
            Event::LoggedOut => "LoggedOut",
        }
    }
}

impl Event {
    /// Whether the session must still be authenticated for this event to be delivered.
    pub fn auth_check_required(&self) -> bool {
        match self {
            Event::Heartbeat | Event::VersionMeta(_) => true,
            Event::TaskReady { .. } | Event::LoggedOut => false,
        }
    }

    /// Serialized `data` payload, `None` for variants that carry no data.
    pub fn payload(&self) -> Option<String> {
        match self {
            Event::Heartbeat | Event::LoggedOut => None,
            Event::TaskReady { correlation_id } => Some(correlation_id.clone()),
            Event::VersionMeta(meta) => match serde_json::to_string(meta) {
                Ok(json) => Some(json),
                Err(e) => {
                    error!("Failed to serialize version meta event: {e}");
                    None
                }
            },
        }
    }

    /// Encode the event using Server-Sent Events framing:
    /// `event: <name>\ndata: <payload>\n\n`, with one `data:` line per payload line.
    pub fn to_frame(&self) -> String {
        let mut frame = format!("event: {}\n", self.event_type());
        if let Some(payload) = self.payload() {
            for line in payload_lines(&payload) {
                frame.push_str("data: ");
                frame.push_str(line);
                frame.push('\n');
            }
        }
        frame.push('\n');
        frame
    }
}

impl From<&Event> for axum::response::sse::Event {
    fn from(event: &Event) -> Self {
        let sse_event = axum::response::sse::Event::default().event(event.event_type());
        match event.payload() {
            // axum splits on '\n' itself but rejects a bare '\r'
            Some(payload) => {
                sse_event.data(payload_lines(&payload).collect::<Vec<_>>().join("\n"))
            }
            None => sse_event,
        }
    }
}

/// Split a payload on every SSE line terminator (`\r\n`, `\r` or `\n`), so
/// no payload byte can end a `data:` line early and start a new field.
fn payload_lines(payload: &str) -> impl Iterator<Item = &str> {
    payload
        .split("\r\n")
        .flat_map(|line| line.split(['\r', '\n']))
}

#[derive(Debug, Clone)]
pub struct Message {
    pub event: Event,
    pub scope: MessageScope,
}

#[derive(Debug, Clone)]
pub enum MessageScope {
    /// Send only to the private channel of one session
    Session { session_id: SessionId },
    /// Send to every subscribed session
    Broadcast,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> VersionMeta {
        VersionMeta {
            revision: "1.4.0".to_string(),
            latest_frontend_version: "2.0.1".to_string(),
            build_date: "2026-10-01".to_string(),
        }
    }

    #[test]
    fn test_event_names_match_wire_contract() {
        assert_eq!(Event::Heartbeat.event_type(), "Heartbeat");
        assert_eq!(Event::VersionMeta(meta()).event_type(), "Meta");
        assert_eq!(
            Event::TaskReady {
                correlation_id: "x".to_string()
            }
            .event_type(),
            "TaskReady"
        );
        assert_eq!(Event::LoggedOut.event_type(), "LoggedOut");
    }

    #[test]
    fn test_auth_check_flags_are_fixed_per_variant() {
        assert!(Event::Heartbeat.auth_check_required());
        assert!(Event::VersionMeta(meta()).auth_check_required());
        assert!(!Event::TaskReady {
            correlation_id: "x".to_string()
        }
        .auth_check_required());
        assert!(!Event::LoggedOut.auth_check_required());
    }

    #[test]
    fn test_frame_without_payload_omits_data_line() {
        assert_eq!(Event::Heartbeat.to_frame(), "event: Heartbeat\n\n");
        assert_eq!(Event::LoggedOut.to_frame(), "event: LoggedOut\n\n");
    }

    #[test]
    fn test_task_ready_frame_carries_correlation_id() {
        let event = Event::TaskReady {
            correlation_id: "search-42".to_string(),
        };
        assert_eq!(event.to_frame(), "event: TaskReady\ndata: search-42\n\n");
    }

    #[test]
    fn test_multiline_payload_is_split_into_data_lines() {
        let event = Event::TaskReady {
            correlation_id: "a\nb".to_string(),
        };
        assert_eq!(event.to_frame(), "event: TaskReady\ndata: a\ndata: b\n\n");
    }

    #[test]
    fn test_carriage_returns_cannot_inject_fields() {
        let event = Event::TaskReady {
            correlation_id: "x\revent: LoggedOut".to_string(),
        };
        assert_eq!(
            event.to_frame(),
            "event: TaskReady\ndata: x\ndata: event: LoggedOut\n\n"
        );

        let crlf = Event::TaskReady {
            correlation_id: "a\r\nb\rc\nd".to_string(),
        };
        assert_eq!(
            crlf.to_frame(),
            "event: TaskReady\ndata: a\ndata: b\ndata: c\ndata: d\n\n"
        );
    }

    #[test]
    fn test_axum_event_accepts_carriage_returns_in_payload() {
        // Building the event must not panic on a bare '\r'
        for correlation_id in ["x\ry", "x\r\ny", "\r", "trailing\r"] {
            let event = Event::TaskReady {
                correlation_id: correlation_id.to_string(),
            };
            let _ = axum::response::sse::Event::from(&event);
        }
    }

    #[test]
    fn test_version_meta_payload_uses_camel_case_keys() {
        let payload = Event::VersionMeta(meta()).payload().unwrap();

        // Compare as values since key order is not part of the contract
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "revision": "1.4.0",
                "latestFrontendVersion": "2.0.1",
                "buildDate": "2026-10-01"
            })
        );
    }

    #[test]
    fn test_session_id_conversions() {
        let from_str: SessionId = "s1".into();
        let from_string = SessionId::from("s1".to_string());
        assert_eq!(from_str, from_string);
        assert_eq!(from_str.as_str(), "s1");
        assert_eq!(from_str.to_string(), "s1");
    }
}
