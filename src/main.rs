use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use eyre::{Result, eyre};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use update_tracker::{EventFilter, EventPage, EventStore, EventType, TrackerConfig, export};

#[derive(Parser)]
#[command(name = "update-tracker")]
#[command(about = "Audit log for core, plugin, theme, and settings changes")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: platform data dir)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Optional YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the event log storage (idempotent)
    Init,

    /// Append an event manually
    Record {
        /// One of: core_update, plugin_update, theme_update, settings_change
        #[arg(long)]
        event_type: String,
        /// Human-readable event details
        #[arg(long)]
        details: String,
    },

    /// List logged events
    List {
        /// Restrict to one event type
        #[arg(long)]
        event_type: Option<String>,
        /// Start date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<String>,
        /// End date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Events per page (default: config page_size)
        #[arg(long)]
        per_page: Option<u32>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Export events as CSV
    Export {
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete every logged event
    Purge {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    let store_path = cli.store_path.unwrap_or_else(default_store_path);
    let mut store = EventStore::open(&store_path)?;

    match cli.command {
        Commands::Init => {
            println!("Store ready at {}", store.base_path().display());
        }
        Commands::Record { event_type, details } => {
            let event_type = EventType::parse(&event_type)
                .ok_or_else(|| eyre!("Unknown event type: {}", event_type))?;
            let event = store.append(event_type, &details)?;
            println!("Recorded event {}", event.id);
        }
        Commands::List {
            event_type,
            from,
            to,
            page,
            per_page,
            json,
        } => {
            let filter =
                EventFilter::parse(event_type.as_deref(), from.as_deref(), to.as_deref())?;
            let result = store.query(&filter, page, per_page.unwrap_or(config.page_size))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.events)?);
            } else {
                print_table(&result);
            }
        }
        Commands::Export {
            event_type,
            from,
            to,
            output,
        } => {
            let filter =
                EventFilter::parse(event_type.as_deref(), from.as_deref(), to.as_deref())?;
            match output {
                Some(path) => {
                    let mut file = File::create(&path)?;
                    export::export_csv(&store, &filter, &mut file)?;
                    println!("Exported to {}", path.display());
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    export::export_csv(&store, &filter, &mut out)?;
                }
            }
        }
        Commands::Purge { yes } => {
            if !yes {
                return Err(eyre!("Refusing to delete all events without --yes"));
            }
            let deleted = store.delete_all()?;
            println!("Deleted {} events", deleted);
        }
    }

    Ok(())
}

fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("update-tracker"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn print_table(page: &EventPage) {
    if page.events.is_empty() {
        println!("No events found.");
        return;
    }

    for event in &page.events {
        println!(
            "{}  {}  {}",
            event.formatted_timestamp().dimmed(),
            event_type_label(event.event_type),
            event.event_details
        );
    }
    println!(
        "Page {} of {} ({} events)",
        page.page,
        page.total_pages().max(1),
        page.total
    );
}

fn event_type_label(event_type: EventType) -> ColoredString {
    let tag = event_type.as_str();
    match event_type {
        EventType::CoreUpdate => tag.blue(),
        EventType::PluginUpdate => tag.green(),
        EventType::ThemeUpdate => tag.magenta(),
        EventType::SettingsChange => tag.yellow(),
    }
}
