// Append-only event log backed by SQLite

use crate::event::{Event, EventType, now_secs};
use crate::filter::EventFilter;
use chrono::DateTime;
use eyre::{Context, Result, eyre};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

const DB_FILE: &str = "update-tracker.db";

/// Append-only persistence plus the filtered read paths over one
/// `events` table
///
/// Ids are assigned by SQLite at insert time and are strictly increasing
/// with insertion order. Timestamps are unix seconds, assigned by the
/// store, never by the caller.
pub struct EventStore {
    base_path: PathBuf,
    db: Connection,
}

/// One page of query results plus the unpaginated match count
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<Event>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl EventPage {
    /// Number of pages needed to show every match
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.page_size as u64)
    }
}

impl EventStore {
    /// Open or create a store in the given directory
    ///
    /// Schema creation is idempotent, so this doubles as the install-time
    /// storage initialization.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let base_path = dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let db_path = base_path.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let store = Self { base_path, db };
        store.create_schema()?;

        Ok(store)
    }

    /// Get the base path of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        debug!("Creating event log schema");

        // The indexes bound scan cost for filtered queries; results are
        // unchanged either way.
        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                event_details TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            "#,
        )?;

        Ok(())
    }

    /// Append one event, assigning its id and timestamp
    ///
    /// Details must be non-empty. The insert and the id assignment happen
    /// in one transaction, so concurrent appenders cannot collide.
    pub fn append(&mut self, event_type: EventType, event_details: &str) -> Result<Event> {
        if event_details.trim().is_empty() {
            return Err(eyre!("Event details cannot be empty"));
        }

        let timestamp = now_secs();

        let tx = self.db.transaction()?;
        tx.execute(
            "INSERT INTO events (event_type, event_details, timestamp) VALUES (?1, ?2, ?3)",
            rusqlite::params![event_type.as_str(), event_details, timestamp.timestamp()],
        )
        .context("Failed to insert event")?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(id, event_type = event_type.as_str(), "Appended event");

        Ok(Event {
            id,
            event_type,
            event_details: event_details.to_string(),
            timestamp,
        })
    }

    /// Query one page of events matching the filter
    ///
    /// `total` counts every match with pagination removed. Pages are
    /// 1-indexed and `page < 1` clamps to 1; a page past the end returns
    /// no events rather than erroring. Ordering is newest first, ties
    /// broken by descending id.
    pub fn query(&self, filter: &EventFilter, page: u32, page_size: u32) -> Result<EventPage> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        if !filter.is_satisfiable() {
            return Ok(EventPage {
                events: Vec::new(),
                total: 0,
                page,
                page_size,
            });
        }

        let total = self.count(filter)?;

        let (where_clause, mut params) = Self::build_where(filter);
        let sql = format!(
            "SELECT id, event_type, event_details, timestamp FROM events {} \
             ORDER BY timestamp DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            params.len() + 1,
            params.len() + 2
        );

        let offset = (page as i64 - 1) * page_size as i64;
        params.push(Box::new(page_size as i64));
        params.push(Box::new(offset));

        let events = self.fetch_events(&sql, &params)?;

        Ok(EventPage {
            events,
            total,
            page,
            page_size,
        })
    }

    /// Count events matching the filter, ignoring pagination
    pub fn count(&self, filter: &EventFilter) -> Result<u64> {
        if !filter.is_satisfiable() {
            return Ok(0);
        }

        let (where_clause, params) = Self::build_where(filter);
        let sql = format!("SELECT COUNT(*) FROM events {}", where_clause);

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = self
            .db
            .query_row(&sql, params_refs.as_slice(), |row| row.get(0))
            .context("Failed to count events")?;

        Ok(total as u64)
    }

    /// Every event matching the filter, unpaginated, newest first
    ///
    /// This is the export read path: the full filtered set in one response.
    pub fn query_all(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        if !filter.is_satisfiable() {
            return Ok(Vec::new());
        }

        let (where_clause, params) = Self::build_where(filter);
        let sql = format!(
            "SELECT id, event_type, event_details, timestamp FROM events {} \
             ORDER BY timestamp DESC, id DESC",
            where_clause
        );

        self.fetch_events(&sql, &params)
    }

    /// Remove every logged event
    ///
    /// Irreversible; used at uninstall, never during normal operation.
    /// Returns the number of events removed.
    pub fn delete_all(&mut self) -> Result<usize> {
        let deleted = self
            .db
            .execute("DELETE FROM events", [])
            .context("Failed to delete events")?;

        info!(deleted, "Deleted all events");
        Ok(deleted)
    }

    /// Remove the store's database file entirely
    ///
    /// Consumes the store. The containing directory is left in place.
    pub fn teardown(self) -> Result<()> {
        let Self { base_path, db } = self;
        drop(db);

        let db_path = base_path.join(DB_FILE);
        fs::remove_file(&db_path).context("Failed to remove database file")?;

        info!(path = ?db_path, "Store torn down");
        Ok(())
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn build_where(filter: &EventFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(event_type) = filter.event_type {
            params.push(Box::new(event_type.as_str().to_string()));
            clauses.push(format!("event_type = ?{}", params.len()));
        }
        if let Some(start) = filter.start_bound() {
            params.push(Box::new(start.timestamp()));
            clauses.push(format!("timestamp >= ?{}", params.len()));
        }
        if let Some(end) = filter.end_bound() {
            params.push(Box::new(end.timestamp()));
            clauses.push(format!("timestamp <= ?{}", params.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        (where_clause, params)
    }

    fn fetch_events(&self, sql: &str, params: &[Box<dyn rusqlite::ToSql>]) -> Result<Vec<Event>> {
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.db.prepare(sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(Self::row_to_event(row?)?);
        }

        Ok(events)
    }

    fn row_to_event(
        (id, event_type, event_details, timestamp): (i64, String, String, i64),
    ) -> Result<Event> {
        let event_type = EventType::parse(&event_type)
            .ok_or_else(|| eyre!("Unknown event type in store: {}", event_type))?;
        let timestamp = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(|| eyre!("Invalid timestamp in store: {}", timestamp))?;

        Ok(Event {
            id,
            event_type,
            event_details,
            timestamp,
        })
    }
}
