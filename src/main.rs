//! Timesheet Agent CLI
//!
//! Tracks foreground-window activity and records classified segments.

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timesheet_agent::{
    classifier::BlockingClassifier,
    config::Config,
    core::{Agent, AgentError, AgentOptions, Finalizer, InlineSink, QueuedSink, RunSummary, SegmentSink, SystemClock},
    store::{SqliteStore, StoredRecord},
    transparency::{create_shared_log_with_persistence, PersistedStats, SharedTransparencyLog},
    window, PRIVACY_DECLARATION, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "timesheet-agent")]
#[command(version = VERSION)]
#[command(about = "Foreground-window activity tracker and timesheet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking window activity
    Start(StartArgs),

    /// Show configuration, cumulative statistics and recent records
    Status {
        /// Number of recent records to show
        #[arg(long, default_value = "5")]
        recent: usize,
    },

    /// Total time per category
    Report {
        /// Only count segments starting on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Export recorded segments
    Export {
        /// Output directory for the export file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Display what the agent records
    Privacy,

    /// Show configuration
    Config,
}

#[derive(Args)]
struct StartArgs {
    /// Seconds between window polls
    #[arg(long)]
    interval: Option<u64>,

    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Classification endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Model identifier sent to the endpoint
    #[arg(long)]
    model: Option<String>,

    /// Classification timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Classify and persist on the poll thread
    #[arg(long)]
    sync: bool,

    /// Do not record the open segment when stopping
    #[arg(long)]
    no_flush: bool,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => {
            cmd_start(args);
        }
        Commands::Status { recent } => {
            cmd_status(recent);
        }
        Commands::Report { since } => {
            cmd_report(since);
        }
        Commands::Export { output, format } => {
            cmd_export(output, &format);
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

/// Log to stderr so stdout carries only progress lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config ({e}), using defaults");
            Config::default()
        }
    }
}

fn apply_overrides(config: &mut Config, args: &StartArgs) {
    if let Some(secs) = args.interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(ref db) = args.db {
        config.database_path = db.clone();
    }
    if let Some(ref endpoint) = args.endpoint {
        config.classifier.endpoint = endpoint.clone();
    }
    if let Some(ref model) = args.model {
        config.classifier.model = model.clone();
    }
    if let Some(secs) = args.timeout {
        config.classifier.timeout = Duration::from_secs(secs);
    }
    if args.sync {
        config.queued_finalize = false;
    }
    if args.no_flush {
        config.flush_on_exit = false;
    }
}

fn cmd_start(args: StartArgs) {
    println!("Timesheet Agent v{VERSION}");
    println!();

    let mut config = load_config();
    apply_overrides(&mut config, &args);
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Starting activity tracking...");
    println!("  Poll interval: {}s", config.poll_interval.as_secs());
    println!(
        "  Classifier: {} ({}, timeout {}s)",
        config.classifier.model,
        config.classifier.endpoint,
        config.classifier.timeout.as_secs()
    );
    println!("  Database: {}", config.database_path.display());
    println!(
        "  Finalize: {}",
        if config.queued_finalize {
            "background worker"
        } else {
            "inline"
        }
    );
    println!(
        "  Record open segment on exit: {}",
        if config.flush_on_exit { "yes" } else { "no" }
    );

    let store = match SqliteStore::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening database: {e}");
            std::process::exit(1);
        }
    };

    let classifier = match BlockingClassifier::new(config.classifier.clone()) {
        Ok(classifier) => classifier,
        Err(e) => {
            eprintln!("Error creating classifier: {e}");
            std::process::exit(1);
        }
    };

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join("transparency.json"));
    println!("Session ID: {}", transparency_log.session_id());

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    let finalizer = Finalizer::new(classifier, store, transparency_log.clone())
        .with_preview_chars(config.title_preview_chars);
    let options = AgentOptions {
        poll_interval: config.poll_interval,
        flush_on_exit: config.flush_on_exit,
    };

    let result = if config.queued_finalize {
        match QueuedSink::spawn(finalizer, config.queue_capacity) {
            Ok(sink) => run_agent(sink, options, &transparency_log, &running),
            Err(e) => Err(e),
        }
    } else {
        run_agent(InlineSink::new(finalizer), options, &transparency_log, &running)
    };

    println!();
    println!("Stopping activity tracking...");

    if let Err(e) = transparency_log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }

    println!();
    println!("{}", transparency_log.summary());

    match result {
        Ok(summary) => {
            if summary.flushed_on_exit {
                println!("Open segment recorded on exit.");
            }
        }
        Err(e) => {
            tracing::error!("agent stopped on error: {e}");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run_agent<K: SegmentSink>(
    sink: K,
    options: AgentOptions,
    log: &SharedTransparencyLog,
    running: &AtomicBool,
) -> Result<RunSummary, AgentError> {
    let mut agent = Agent::new(
        window::foreground_window(),
        SystemClock,
        sink,
        options,
        log.clone(),
    );
    agent.run(running)
}

fn open_existing_store(config: &Config) -> Option<SqliteStore> {
    if !config.database_path.exists() {
        println!("No timesheet found at {:?}", config.database_path);
        println!("Run 'timesheet-agent start' to begin tracking.");
        return None;
    }

    match SqliteStore::open(&config.database_path) {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!("Error opening database: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_status(recent: usize) {
    let config = load_config();

    println!("Timesheet Agent Status");
    println!("======================");
    println!();

    println!("Configuration:");
    println!("  Poll interval: {}s", config.poll_interval.as_secs());
    println!("  Classifier model: {}", config.classifier.model);
    println!("  Classifier endpoint: {}", config.classifier.endpoint);
    println!("  Database: {}", config.database_path.display());
    println!();

    let stats_path = config.data_path.join("transparency.json");
    match PersistedStats::read(&stats_path) {
        Ok(stats) => {
            println!("Cumulative Statistics:");
            println!("  Window polls: {}", stats.polls);
            println!("  Polls without a title: {}", stats.empty_polls);
            println!("  Segments closed: {}", stats.segments_closed);
            println!("  Segments recorded: {}", stats.segments_persisted);
            println!("  Classification failures: {}", stats.classification_failures);
            println!(
                "  Last updated: {}",
                stats.last_updated.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            );
        }
        Err(_) => println!("No previous session data found."),
    }
    println!();

    let Some(store) = open_existing_store(&config) else {
        return;
    };

    match store.recent(recent) {
        Ok(records) if records.is_empty() => println!("No segments recorded yet."),
        Ok(records) => {
            println!("Recent segments:");
            for record in records {
                println!(
                    "  {} {} {:>8} | {} ({}s)",
                    record.id,
                    record.start_time.format("%m-%d %H:%M:%S"),
                    record.category.to_string(),
                    timesheet_agent::core::title_preview(
                        &record.window_title,
                        config.title_preview_chars
                    ),
                    record.duration_sec
                );
            }
        }
        Err(e) => eprintln!("Error reading records: {e}"),
    }
}

fn cmd_report(since: Option<NaiveDate>) {
    let config = load_config();
    let Some(store) = open_existing_store(&config) else {
        return;
    };

    let totals = match store.category_totals(since) {
        Ok(totals) => totals,
        Err(e) => {
            eprintln!("Error reading records: {e}");
            std::process::exit(1);
        }
    };

    match since {
        Some(date) => println!("Time by category since {date}"),
        None => println!("Time by category"),
    }
    println!();

    if totals.is_empty() {
        println!("No segments recorded.");
        return;
    }

    let grand_total: i64 = totals.iter().map(|t| t.total_secs).sum();
    for total in &totals {
        let share = if grand_total > 0 {
            total.total_secs as f64 * 100.0 / grand_total as f64
        } else {
            0.0
        };
        println!(
            "  {:<14} {:>10} {:>6.1}%  ({} segments)",
            total.category,
            format_duration(total.total_secs),
            share,
            total.segments
        );
    }
    println!();
    println!("  {:<14} {:>10}", "total", format_duration(grand_total));
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_export(output: Option<PathBuf>, format: &str) {
    let config = load_config();
    let export_dir = output.unwrap_or(config.export_path.clone());

    let Some(store) = open_existing_store(&config) else {
        return;
    };

    let records = match store.all() {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error reading records: {e}");
            std::process::exit(1);
        }
    };

    println!("Total segments: {}", records.len());

    if let Err(e) = std::fs::create_dir_all(&export_dir) {
        eprintln!("Error creating {export_dir:?}: {e}");
        std::process::exit(1);
    }

    let output_path = export_dir.join(format!(
        "timesheet_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        if format == "jsonl" { "jsonl" } else { "json" }
    ));

    let contents = match render_export(&records, format) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Error serializing: {e}");
            std::process::exit(1);
        }
    };
    let result = std::fs::write(&output_path, contents);

    match result {
        Ok(_) => println!("Exported to {output_path:?}"),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

/// Serialize records as a JSON array, or one object per line for `jsonl`.
fn render_export(records: &[StoredRecord], format: &str) -> Result<String, serde_json::Error> {
    if format == "jsonl" {
        let mut out = String::new();
        for record in records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    } else {
        let mut out = serde_json::to_string_pretty(records)?;
        out.push('\n');
        Ok(out)
    }
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Render seconds as `1h 02m 03s`.
fn format_duration(total_secs: i64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
