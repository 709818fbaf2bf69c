// Facade wiring the recorder and store behind the host-facing triggers

use crate::config::TrackerConfig;
use crate::event::EventType;
use crate::filter::EventFilter;
use crate::recorder::{self, CORE_SUBJECT, ChangeRecorder, SubjectKind, UNKNOWN_VERSION};
use crate::store::{EventPage, EventStore};
use eyre::Result;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Current versions of everything updatable, assembled by the host right
/// before an update run begins
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub core_version: Option<String>,
    pub plugins: Vec<SubjectVersion>,
    pub themes: Vec<SubjectVersion>,
}

/// A subject id (plugin file path or theme slug) paired with its currently
/// installed version
#[derive(Debug, Clone)]
pub struct SubjectVersion {
    pub id: String,
    pub version: String,
}

/// One plugin updated in a batch
#[derive(Debug, Clone)]
pub struct PluginUpdate {
    pub file: String,
    pub name: String,
    pub version: String,
}

/// One theme updated in a batch
#[derive(Debug, Clone)]
pub struct ThemeUpdate {
    pub slug: String,
    pub name: String,
    pub version: String,
}

/// Audit-log entry point for host lifecycle hooks
///
/// The host holds one of these and calls the `on_*` triggers directly; no
/// global dispatcher is involved. Triggers never fail the caller: append
/// errors are logged and swallowed, since losing an audit entry is less
/// harmful than failing a live update.
pub struct UpdateTracker {
    store: EventStore,
    recorder: ChangeRecorder,
    config: TrackerConfig,
}

impl UpdateTracker {
    pub fn new(store: EventStore, config: TrackerConfig) -> Self {
        let recorder = ChangeRecorder::new(config.pending_ttl());
        Self {
            store,
            recorder,
            config,
        }
    }

    /// Open or create the backing store in `dir` and wrap it in a tracker
    pub fn open<P: AsRef<Path>>(dir: P, config: TrackerConfig) -> Result<Self> {
        Ok(Self::new(EventStore::open(dir)?, config))
    }

    // ========================================================================
    // Inbound triggers
    // ========================================================================

    /// Capture "before" versions ahead of an update run
    pub fn on_pre_update_check(&self, snapshot: &Snapshot) {
        if self.config.track_core_updates {
            if let Some(version) = &snapshot.core_version {
                self.recorder.capture(SubjectKind::Core, CORE_SUBJECT, version);
            }
        }
        if self.config.track_plugin_updates {
            for plugin in &snapshot.plugins {
                self.recorder
                    .capture(SubjectKind::Plugin, &plugin.id, &plugin.version);
            }
        }
        if self.config.track_theme_updates {
            for theme in &snapshot.themes {
                self.recorder
                    .capture(SubjectKind::Theme, &theme.id, &theme.version);
            }
        }
    }

    /// Record a completed core update as one event
    ///
    /// The previous version comes from the pending capture; callers only
    /// know the version they just updated to.
    pub fn on_core_update_complete(&mut self, current_version: &str) {
        if !self.config.track_core_updates {
            return;
        }

        let previous = self
            .recorder
            .take(SubjectKind::Core, CORE_SUBJECT)
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
        let details = recorder::core_update_details(&previous, current_version);

        self.record(EventType::CoreUpdate, &details);
    }

    /// Record a completed plugin upgrade run as one batched event
    pub fn on_plugin_batch_complete(&mut self, updated: &[PluginUpdate]) {
        if !self.config.track_plugin_updates || updated.is_empty() {
            return;
        }

        let entries: Vec<String> = updated
            .iter()
            .map(|plugin| {
                let previous = self
                    .recorder
                    .take(SubjectKind::Plugin, &plugin.file)
                    .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
                recorder::subject_update_entry(&plugin.name, &previous, &plugin.version)
            })
            .collect();
        let details = recorder::batch_update_details("Plugins", &entries);

        self.record(EventType::PluginUpdate, &details);
    }

    /// Record a completed theme upgrade run as one batched event
    pub fn on_theme_batch_complete(&mut self, updated: &[ThemeUpdate]) {
        if !self.config.track_theme_updates || updated.is_empty() {
            return;
        }

        let entries: Vec<String> = updated
            .iter()
            .map(|theme| {
                let previous = self
                    .recorder
                    .take(SubjectKind::Theme, &theme.slug)
                    .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
                recorder::subject_update_entry(&theme.name, &previous, &theme.version)
            })
            .collect();
        let details = recorder::batch_update_details("Themes", &entries);

        self.record(EventType::ThemeUpdate, &details);
    }

    /// Record a settings change when the setting is tracked and the value
    /// actually changed
    pub fn on_setting_changed(&mut self, name: &str, old_value: &Value, new_value: &Value) {
        let Some(details) = recorder::settings_change_details(name, old_value, new_value) else {
            debug!(name, "Ignoring untracked or unchanged setting");
            return;
        };

        self.record(EventType::SettingsChange, &details);
    }

    /// Best-effort append: failures are logged and swallowed so the host's
    /// update or settings operation is never aborted by the audit log
    fn record(&mut self, event_type: EventType, details: &str) {
        if let Err(error) = self.store.append(event_type, details) {
            warn!(event_type = event_type.as_str(), ?error, "Failed to record event");
        }
    }

    // ========================================================================
    // Outbound read API
    // ========================================================================

    /// One page of events matching the filter; read errors propagate
    pub fn list_events(&self, filter: &EventFilter, page: u32, page_size: u32) -> Result<EventPage> {
        self.store.query(filter, page, page_size)
    }

    /// Match count with pagination removed
    pub fn count_events(&self, filter: &EventFilter) -> Result<u64> {
        self.store.count(filter)
    }

    /// CSV of the full filtered set
    pub fn export_events<W: Write>(&self, filter: &EventFilter, out: &mut W) -> Result<()> {
        crate::export::export_csv(&self.store, filter, out)
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn tracker() -> (TempDir, UpdateTracker) {
        let temp = TempDir::new().unwrap();
        let tracker = UpdateTracker::open(temp.path(), TrackerConfig::default()).unwrap();
        (temp, tracker)
    }

    fn all_events(tracker: &UpdateTracker) -> Vec<crate::event::Event> {
        tracker.store().query_all(&EventFilter::new()).unwrap()
    }

    #[test]
    fn test_core_capture_track_round_trip() {
        let (_temp, mut tracker) = tracker();

        tracker.on_pre_update_check(&Snapshot {
            core_version: Some("6.3".to_string()),
            ..Default::default()
        });
        tracker.on_core_update_complete("6.4");

        let events = all_events(&tracker);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::CoreUpdate);
        assert!(events[0].event_details.contains("6.3"));
        assert!(events[0].event_details.contains("6.4"));
    }

    #[test]
    fn test_core_track_without_capture_logs_unknown() {
        let (_temp, mut tracker) = tracker();

        tracker.on_core_update_complete("6.4");

        let events = all_events(&tracker);
        assert_eq!(events.len(), 1);
        assert!(events[0].event_details.contains("Unknown"));
        assert!(events[0].event_details.contains("6.4"));
    }

    #[test]
    fn test_plugin_batch_is_one_event() {
        let (_temp, mut tracker) = tracker();

        tracker.on_pre_update_check(&Snapshot {
            plugins: vec![
                SubjectVersion {
                    id: "foo/foo.php".to_string(),
                    version: "1.0".to_string(),
                },
                SubjectVersion {
                    id: "bar/bar.php".to_string(),
                    version: "2.0".to_string(),
                },
            ],
            ..Default::default()
        });
        tracker.on_plugin_batch_complete(&[
            PluginUpdate {
                file: "foo/foo.php".to_string(),
                name: "Foo".to_string(),
                version: "1.1".to_string(),
            },
            PluginUpdate {
                file: "bar/bar.php".to_string(),
                name: "Bar".to_string(),
                version: "2.1".to_string(),
            },
        ]);

        let events = all_events(&tracker);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::PluginUpdate);
        assert_eq!(
            events[0].event_details,
            "Plugins updated: Foo (from 1.0 to 1.1), Bar (from 2.0 to 2.1)"
        );
    }

    #[test]
    fn test_theme_batch_mixes_captured_and_unknown() {
        let (_temp, mut tracker) = tracker();

        tracker.on_pre_update_check(&Snapshot {
            themes: vec![SubjectVersion {
                id: "twentytwo".to_string(),
                version: "1.5".to_string(),
            }],
            ..Default::default()
        });
        tracker.on_theme_batch_complete(&[
            ThemeUpdate {
                slug: "twentytwo".to_string(),
                name: "Twenty Two".to_string(),
                version: "1.6".to_string(),
            },
            ThemeUpdate {
                slug: "never-captured".to_string(),
                name: "Mystery".to_string(),
                version: "3.0".to_string(),
            },
        ]);

        let events = all_events(&tracker);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].event_details,
            "Themes updated: Twenty Two (from 1.5 to 1.6), Mystery (from Unknown to 3.0)"
        );
    }

    #[test]
    fn test_empty_batch_appends_nothing() {
        let (_temp, mut tracker) = tracker();

        tracker.on_plugin_batch_complete(&[]);
        tracker.on_theme_batch_complete(&[]);

        assert!(all_events(&tracker).is_empty());
    }

    #[test]
    fn test_settings_change_paths() {
        let (_temp, mut tracker) = tracker();

        tracker.on_setting_changed("blogname", &json!("Old"), &json!("New"));
        tracker.on_setting_changed("blogname", &json!("Same"), &json!("Same"));
        tracker.on_setting_changed("random_unlisted_option", &json!("a"), &json!("b"));

        let events = all_events(&tracker);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::SettingsChange);
        assert_eq!(
            events[0].event_details,
            "Setting \"blogname\" changed from \"Old\" to \"New\""
        );
    }

    #[test]
    fn test_disabled_kind_is_silent_end_to_end() {
        let temp = TempDir::new().unwrap();
        let config = TrackerConfig {
            track_plugin_updates: false,
            ..Default::default()
        };
        let mut tracker = UpdateTracker::open(temp.path(), config).unwrap();

        tracker.on_pre_update_check(&Snapshot {
            plugins: vec![SubjectVersion {
                id: "foo/foo.php".to_string(),
                version: "1.0".to_string(),
            }],
            ..Default::default()
        });
        tracker.on_plugin_batch_complete(&[PluginUpdate {
            file: "foo/foo.php".to_string(),
            name: "Foo".to_string(),
            version: "1.1".to_string(),
        }]);

        assert!(all_events(&tracker).is_empty());

        // Other kinds still flow
        tracker.on_core_update_complete("6.4");
        assert_eq!(all_events(&tracker).len(), 1);
    }

    #[test]
    fn test_read_api_passthrough() {
        let (_temp, mut tracker) = tracker();

        tracker.on_core_update_complete("6.4");
        tracker.on_setting_changed("admin_email", &json!("a@x.test"), &json!("b@x.test"));

        let filter = EventFilter::new().with_event_type(EventType::CoreUpdate);
        assert_eq!(tracker.count_events(&filter).unwrap(), 1);

        let page = tracker.list_events(&EventFilter::new(), 1, 10).unwrap();
        assert_eq!(page.total, 2);

        let mut out = Vec::new();
        tracker.export_events(&EventFilter::new(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
    }
}
