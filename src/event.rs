// Event model for the audit log

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// One immutable logged occurrence of a tracked change
///
/// The id and timestamp are assigned by the store at append time; callers
/// never supply either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub event_type: EventType,
    pub event_details: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Timestamp rendered the way the log viewer and CSV export show it
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Kind of change an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CoreUpdate,
    PluginUpdate,
    ThemeUpdate,
    SettingsChange,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::CoreUpdate => "core_update",
            EventType::PluginUpdate => "plugin_update",
            EventType::ThemeUpdate => "theme_update",
            EventType::SettingsChange => "settings_change",
        }
    }

    /// Parse the stored/request tag back into the enum
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "core_update" => Some(EventType::CoreUpdate),
            "plugin_update" => Some(EventType::PluginUpdate),
            "theme_update" => Some(EventType::ThemeUpdate),
            "settings_change" => Some(EventType::SettingsChange),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current time truncated to whole seconds, the log's native resolution
pub fn now_secs() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trip() {
        for event_type in [
            EventType::CoreUpdate,
            EventType::PluginUpdate,
            EventType::ThemeUpdate,
            EventType::SettingsChange,
        ] {
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }

        assert_eq!(EventType::parse("unknown_thing"), None);
        assert_eq!(EventType::parse(""), None);
    }

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&EventType::CoreUpdate).unwrap();
        assert_eq!(json, "\"core_update\"");

        let json = serde_json::to_string(&EventType::SettingsChange).unwrap();
        assert_eq!(json, "\"settings_change\"");
    }

    #[test]
    fn test_now_secs_has_no_subsecond_part() {
        let now = now_secs();
        assert_eq!(now.timestamp_subsec_nanos(), 0);
        // Should be a reasonable timestamp (after year 2020)
        assert!(now.timestamp() > 1_600_000_000);
    }

    #[test]
    fn test_formatted_timestamp() {
        let event = Event {
            id: 1,
            event_type: EventType::CoreUpdate,
            event_details: "Core updated from version 6.3 to 6.4".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        assert_eq!(event.formatted_timestamp(), "2023-11-14 22:13:20");
    }
}
