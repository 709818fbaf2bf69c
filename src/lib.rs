// Update Tracker - append-only audit log for core, plugin, theme, and settings changes

pub mod config;
pub mod event;
pub mod export;
pub mod filter;
pub mod recorder;
pub mod store;
pub mod tracker;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use event::{Event, EventType};
pub use filter::EventFilter;
pub use recorder::{ChangeRecorder, SubjectKind};
pub use store::{DEFAULT_PAGE_SIZE, EventPage, EventStore};
pub use tracker::{PluginUpdate, Snapshot, SubjectVersion, ThemeUpdate, UpdateTracker};

// Re-export rusqlite for CLI use
pub use rusqlite;
