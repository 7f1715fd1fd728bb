use serde::Deserialize;

use courier_channels::ChannelKind;

/// Processing events relayed to handlers.
///
/// Transport-level frames (`connected`, `heartbeat`) are consumed by the
/// manager and never reach this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AiCompleted,
    AiFailed,
    RoutingCompleted,
    RoutingFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::AiCompleted,
        EventKind::AiFailed,
        EventKind::RoutingCompleted,
        EventKind::RoutingFailed,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AiCompleted => "ai-completed",
            EventKind::AiFailed => "ai-failed",
            EventKind::RoutingCompleted => "routing-completed",
            EventKind::RoutingFailed => "routing-failed",
        }
    }

    /// Map a wire event name to a handler-visible kind.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<EventKind> {
        match name {
            "ai-completed" => Some(EventKind::AiCompleted),
            "ai-failed" => Some(EventKind::AiFailed),
            "routing-completed" => Some(EventKind::RoutingCompleted),
            "routing-failed" => Some(EventKind::RoutingFailed),
            _ => None,
        }
    }

    /// Terminal events end the item's stream; no further events follow.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::RoutingCompleted | EventKind::RoutingFailed)
    }
}

/// Typed payload bag carried by every event. All fields are optional on the
/// wire; absent fields deserialize to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    pub category: Option<String>,
    pub summary: Option<String>,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub failures: Vec<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub timestamp: Option<String>,
}

/// A processing event enriched with the chat it was subscribed for.
#[derive(Debug, Clone)]
pub struct ItemEvent {
    pub kind: EventKind,
    pub item_id: String,
    pub chat_id: String,
    pub channel: ChannelKind,
    pub payload: EventPayload,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_wire("heartbeat"), None);
    }

    #[test]
    fn only_routing_events_are_terminal() {
        assert!(EventKind::RoutingCompleted.is_terminal());
        assert!(EventKind::RoutingFailed.is_terminal());
        assert!(!EventKind::AiCompleted.is_terminal());
        assert!(!EventKind::AiFailed.is_terminal());
    }

    #[test]
    fn payload_tolerates_missing_fields() {
        let payload: EventPayload =
            serde_json::from_value(serde_json::json!({"timestamp": "t1"})).unwrap();
        assert!(payload.category.is_none());
        assert!(payload.targets.is_empty());
    }
}
