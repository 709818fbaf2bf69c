// Pending-version capture and change-detail composition

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Kind of subject an update applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    Core,
    Plugin,
    Theme,
}

/// The core platform has exactly one instance; its pending entry uses a
/// fixed id
pub const CORE_SUBJECT: &str = "core";

/// Fallback shown when no version was captured before an update
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Settings whose changes are recorded; everything else is ignored
const TRACKED_SETTINGS: [&str; 6] = [
    "blogname",        // Site Title
    "blogdescription", // Tagline
    "admin_email",     // Admin Email
    "timezone_string", // Timezone
    "date_format",     // Date Format
    "time_format",     // Time Format
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PendingKey {
    kind: SubjectKind,
    subject_id: String,
}

#[derive(Debug, Clone)]
struct PendingVersion {
    version: String,
    captured_at: DateTime<Utc>,
}

/// Tracks "before" versions across the capture/track boundary
///
/// A capture fires before an update starts; the matching track fires after
/// it completes and consumes the entry. Entries older than `ttl` count as
/// absent, so an abandoned update cannot feed a stale version into a later
/// diff; stale entries are also swept on the next capture.
pub struct ChangeRecorder {
    pending: Mutex<HashMap<PendingKey, PendingVersion>>,
    ttl: Duration,
}

impl ChangeRecorder {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Store the current version as the "before" value for a subject
    ///
    /// Repeated captures overwrite. A capture immediately precedes its
    /// matching completion, so last-write-wins is the right policy.
    pub fn capture(&self, kind: SubjectKind, subject_id: &str, version: &str) {
        self.capture_at(kind, subject_id, version, Utc::now());
    }

    fn capture_at(&self, kind: SubjectKind, subject_id: &str, version: &str, now: DateTime<Utc>) {
        let mut pending = self.lock_pending();

        pending.retain(|key, entry| {
            let fresh = now - entry.captured_at <= self.ttl;
            if !fresh {
                debug!(subject_id = %key.subject_id, "Dropping expired pending version");
            }
            fresh
        });

        pending.insert(
            PendingKey {
                kind,
                subject_id: subject_id.to_string(),
            },
            PendingVersion {
                version: version.to_string(),
                captured_at: now,
            },
        );
    }

    /// Consume the pending "before" value for a subject
    ///
    /// Returns `None` when nothing was captured or the entry has expired.
    pub fn take(&self, kind: SubjectKind, subject_id: &str) -> Option<String> {
        let key = PendingKey {
            kind,
            subject_id: subject_id.to_string(),
        };
        let entry = self.lock_pending().remove(&key)?;

        if Utc::now() - entry.captured_at > self.ttl {
            debug!(subject_id = %key.subject_id, "Pending version expired");
            return None;
        }

        Some(entry.version)
    }

    /// Number of captures awaiting their completion
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<PendingKey, PendingVersion>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Detail composition
// ============================================================================

/// "Core updated from version X to Y"
pub fn core_update_details(previous: &str, current: &str) -> String {
    format!("Core updated from version {} to {}", previous, current)
}

/// "Name (from X to Y)" entry for one subject in a batch
pub fn subject_update_entry(name: &str, previous: &str, current: &str) -> String {
    format!("{} (from {} to {})", name, previous, current)
}

/// One log line for a whole upgrade run, e.g. "Plugins updated: a, b"
pub fn batch_update_details(label: &str, entries: &[String]) -> String {
    format!("{} updated: {}", label, entries.join(", "))
}

/// Details for a tracked settings change
///
/// Returns `None` when the setting is not in the allow-list or the value
/// did not actually change.
pub fn settings_change_details(name: &str, old_value: &Value, new_value: &Value) -> Option<String> {
    if !TRACKED_SETTINGS.contains(&name) {
        return None;
    }
    if old_value == new_value {
        return None;
    }

    Some(format!(
        "Setting \"{}\" changed from \"{}\" to \"{}\"",
        name,
        scalar_display(old_value),
        scalar_display(new_value)
    ))
}

/// Render a scalar value; structured values get a placeholder instead of
/// being serialized into the log
fn scalar_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => "non-scalar value".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> ChangeRecorder {
        ChangeRecorder::new(Duration::hours(1))
    }

    #[test]
    fn test_capture_take_round_trip() {
        let rec = recorder();
        rec.capture(SubjectKind::Core, CORE_SUBJECT, "6.3");

        assert_eq!(
            rec.take(SubjectKind::Core, CORE_SUBJECT),
            Some("6.3".to_string())
        );
        // Consumed: a second take finds nothing
        assert_eq!(rec.take(SubjectKind::Core, CORE_SUBJECT), None);
    }

    #[test]
    fn test_repeated_capture_overwrites() {
        let rec = recorder();
        rec.capture(SubjectKind::Plugin, "foo/foo.php", "1.0");
        rec.capture(SubjectKind::Plugin, "foo/foo.php", "1.1");

        assert_eq!(
            rec.take(SubjectKind::Plugin, "foo/foo.php"),
            Some("1.1".to_string())
        );
        assert_eq!(rec.pending_count(), 0);
    }

    #[test]
    fn test_subjects_are_independent() {
        let rec = recorder();
        rec.capture(SubjectKind::Plugin, "foo/foo.php", "1.0");
        rec.capture(SubjectKind::Theme, "twentytwo", "2.0");

        assert_eq!(rec.take(SubjectKind::Plugin, "twentytwo"), None);
        assert_eq!(
            rec.take(SubjectKind::Theme, "twentytwo"),
            Some("2.0".to_string())
        );
        assert_eq!(
            rec.take(SubjectKind::Plugin, "foo/foo.php"),
            Some("1.0".to_string())
        );
    }

    #[test]
    fn test_expired_entry_counts_as_absent() {
        let rec = recorder();
        rec.capture_at(
            SubjectKind::Core,
            CORE_SUBJECT,
            "6.3",
            Utc::now() - Duration::hours(2),
        );

        assert_eq!(rec.take(SubjectKind::Core, CORE_SUBJECT), None);
    }

    #[test]
    fn test_capture_sweeps_expired_entries() {
        let rec = recorder();
        rec.capture_at(
            SubjectKind::Plugin,
            "stale/stale.php",
            "0.9",
            Utc::now() - Duration::hours(2),
        );
        assert_eq!(rec.pending_count(), 1);

        rec.capture(SubjectKind::Core, CORE_SUBJECT, "6.3");
        assert_eq!(rec.pending_count(), 1);
    }

    #[test]
    fn test_core_update_details() {
        assert_eq!(
            core_update_details("6.3", "6.4"),
            "Core updated from version 6.3 to 6.4"
        );
    }

    #[test]
    fn test_batch_details_composition() {
        let entries = vec![
            subject_update_entry("Foo", "1.0", "1.1"),
            subject_update_entry("Bar", UNKNOWN_VERSION, "2.0"),
        ];
        assert_eq!(
            batch_update_details("Plugins", &entries),
            "Plugins updated: Foo (from 1.0 to 1.1), Bar (from Unknown to 2.0)"
        );
    }

    #[test]
    fn test_settings_change_allow_list() {
        let details =
            settings_change_details("blogname", &json!("Old"), &json!("New")).unwrap();
        assert_eq!(details, "Setting \"blogname\" changed from \"Old\" to \"New\"");

        // Unchanged value: nothing to log
        assert_eq!(
            settings_change_details("blogname", &json!("Same"), &json!("Same")),
            None
        );

        // Unlisted setting: nothing to log
        assert_eq!(
            settings_change_details("random_unlisted_option", &json!("a"), &json!("b")),
            None
        );
    }

    #[test]
    fn test_settings_change_non_scalar_placeholder() {
        let details = settings_change_details(
            "date_format",
            &json!({"complex": true}),
            &json!("Y-m-d"),
        )
        .unwrap();
        assert_eq!(
            details,
            "Setting \"date_format\" changed from \"non-scalar value\" to \"Y-m-d\""
        );
    }
}
