// CSV export of filtered event sets

use crate::event::Event;
use crate::filter::EventFilter;
use crate::store::EventStore;
use eyre::{Context, Result};
use std::io::Write;

const CSV_HEADER: &str = "Timestamp,Event Type,Details";

/// Write every event matching the filter as CSV
///
/// The full filtered set goes out in one response, newest first; there is
/// no pagination on this path. Any write error aborts the export, so the
/// caller never receives a silently truncated file.
pub fn export_csv<W: Write>(store: &EventStore, filter: &EventFilter, out: &mut W) -> Result<()> {
    let events = store.query_all(filter)?;
    write_csv(&events, out)
}

/// Serialize events as CSV with a header row
pub fn write_csv<W: Write>(events: &[Event], out: &mut W) -> Result<()> {
    writeln!(out, "{}", CSV_HEADER).context("Failed to write CSV header")?;

    for event in events {
        writeln!(
            out,
            "{},{},{}",
            csv_field(&event.formatted_timestamp()),
            csv_field(event.event_type.as_str()),
            csv_field(&event.event_details)
        )
        .context("Failed to write CSV row")?;
    }

    Ok(())
}

/// Quote a field when it contains the delimiter, a quote, or a line break
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
