// Typed query filter for the event log

use crate::event::EventType;
use chrono::{DateTime, NaiveDate, Utc};
use eyre::{Result, eyre};

/// Conjunction of predicates applied at query time
///
/// An absent field leaves that dimension unconstrained; the default filter
/// matches every event. Date bounds are day-granular and widen to the full
/// day, matching what a date picker means by "from" and "to".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Build a filter from raw request-style parameters
    ///
    /// Empty strings count as absent, matching form submissions that send
    /// every field. Malformed input is rejected here, before it can reach
    /// the store.
    pub fn parse(
        event_type: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self> {
        let mut filter = Self::new();

        if let Some(raw) = event_type.filter(|s| !s.is_empty()) {
            filter.event_type =
                Some(EventType::parse(raw).ok_or_else(|| eyre!("Unknown event type: {}", raw))?);
        }
        if let Some(raw) = start_date.filter(|s| !s.is_empty()) {
            filter.start_date = Some(parse_date(raw)?);
        }
        if let Some(raw) = end_date.filter(|s| !s.is_empty()) {
            filter.end_date = Some(parse_date(raw)?);
        }

        Ok(filter)
    }

    /// Lower timestamp bound, widened to 00:00:00 of the start day
    pub fn start_bound(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Upper timestamp bound, widened to 23:59:59 of the end day
    pub fn end_bound(&self) -> Option<DateTime<Utc>> {
        self.end_date
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc())
    }

    /// An inverted date range can never match anything
    ///
    /// Callers short-circuit to an empty result instead of treating this
    /// as a failure.
    pub fn is_satisfiable(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| eyre!("Invalid date {:?} (expected YYYY-MM-DD): {}", raw, e))
}
