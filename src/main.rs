mod api;
mod charts;
mod config;
mod db;
mod fallback;
mod loader;
mod models;
mod tui;
mod view;

use anyhow::{Context, Result};
use api::{DashboardApi, HttpDashboardApi};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::{Config, Overrides};
use db::Database;
use loader::{load_session, NoSnapshots, Page, SnapshotStore};
use models::ImportOptions;
use std::path::{Path, PathBuf};
use view::{AnalysisView, ImportView, ReportsView};

#[derive(Parser)]
#[command(name = "review-insight")]
#[command(about = "Customer review analytics - sentiment, themes and recommendations in the terminal")]
struct Cli {
    /// Backend base URL (overrides config and REVIEW_INSIGHT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Product to analyse (overrides config and REVIEW_INSIGHT_PRODUCT_ID)
    #[arg(long, global = true)]
    product_id: Option<i64>,

    /// First day of the analysed range (YYYY-MM-DD)
    #[arg(long, global = true, value_parser = config::parse_date)]
    start_date: Option<NaiveDate>,

    /// Last day of the analysed range (YYYY-MM-DD), defaults to today
    #[arg(long, global = true, value_parser = config::parse_date)]
    end_date: Option<NaiveDate>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Neither read nor store last-known data
    #[arg(long, global = true)]
    no_snapshots: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive dashboard (default)
    Dashboard,

    /// Show whether a batch analysis is running
    Status,

    /// Print analysis metrics, sentiment and topics
    Summary,

    /// Print the executive summary
    Brief,

    /// Print AI recommendations and next steps
    Report,

    /// List recent import batches
    Imports,

    /// Upload a file of reviews
    Import {
        /// CSV, Excel or JSON file
        file: PathBuf,

        /// Source type of the file
        #[arg(short, long, default_value = "csv")]
        source: String,

        /// Column delimiter
        #[arg(short, long, default_value = ",")]
        delimiter: String,

        /// Text encoding
        #[arg(short, long, default_value = "utf-8")]
        encoding: String,
    },

    /// Show effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("review_insight={}", level)));

    match log_file {
        // The dashboard owns the terminal, so its logs go to a file.
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Dashboard);
    let overrides = Overrides {
        api_url: cli.api_url,
        product_id: cli.product_id,
        start_date: cli.start_date,
        end_date: cli.end_date,
    };
    let config = Config::load(cli.config, overrides)?;

    let log_file = matches!(command, Commands::Dashboard).then(|| config.log_path());
    init_logging(&config.settings.log_level, log_file.as_deref())?;

    if let Commands::Config { init } = command {
        return show_config(&config, init);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let db = open_snapshots(&config, cli.no_snapshots)?;
    let store: &dyn SnapshotStore = match &db {
        Some(db) => db,
        None => &NoSnapshots,
    };
    let api = HttpDashboardApi::new(&config.settings.api_url);
    let query = config.query();

    match command {
        Commands::Dashboard => {
            tui::run_dashboard(store, runtime.handle().clone(), api.base_url(), query)?;
        }

        Commands::Status => {
            let analyzing = runtime
                .block_on(api.is_analyzing())
                .with_context(|| format!("Failed to reach {}", api.base_url()))?;
            if analyzing {
                println!("Analysis in progress.");
            } else {
                println!("No analysis running.");
            }
        }

        Commands::Summary => {
            let session = runtime.block_on(load_session(&api, Page::Analysis, &query, store));
            print_analysis(&AnalysisView::from_session(&session));
        }

        Commands::Brief => {
            let session = runtime.block_on(load_session(&api, Page::Reports, &query, store));
            print_brief(&ReportsView::from_session(&session, &query));
        }

        Commands::Report => {
            let session = runtime.block_on(load_session(&api, Page::Reports, &query, store));
            print_report(&ReportsView::from_session(&session, &query));
        }

        Commands::Imports => {
            let session = runtime.block_on(load_session(&api, Page::Import, &query, store));
            let imports = ImportView::from_session(&session);
            print_errors(&imports.errors);
            if imports.batches.value.is_empty() {
                println!("No imports found.");
            } else {
                println!("Recent imports ({}):", imports.batches.source.label());
                for line in &imports.batches.value {
                    println!("  {}", line);
                }
            }
        }

        Commands::Import {
            file,
            source,
            delimiter,
            encoding,
        } => {
            let options = ImportOptions {
                source,
                delimiter,
                encoding,
            };
            println!("Uploading {}...", file.display());
            let receipt = runtime
                .block_on(api.import_file(&file, &options))
                .with_context(|| format!("Failed to import {}", file.display()))?;

            println!("\nResults:");
            println!("  Status:   {}", receipt.status.as_deref().unwrap_or("accepted"));
            if let Some(count) = receipt.imported_count {
                println!("  Imported: {}", count);
            }
            if let Some(batch) = &receipt.batch_id {
                println!("  Batch:    #{}", batch);
            }
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

/// The snapshot database is left untouched when snapshots are disabled.
fn open_snapshots(config: &Config, disabled: bool) -> Result<Option<Database>> {
    if disabled {
        return Ok(None);
    }
    Database::open(&config.snapshot_path()).map(Some)
}

fn show_config(config: &Config, init: bool) -> Result<()> {
    if init {
        if config::write_default(&config.config_path)? {
            println!("Wrote default config to {}", config.config_path.display());
        } else {
            println!("Config already exists at {}", config.config_path.display());
        }
    }

    let exists = config.config_path.exists();
    println!(
        "Config file:  {}{}",
        config.config_path.display(),
        if exists { "" } else { " (not found, using defaults)" }
    );
    println!("Data dir:     {}", config.data_dir.display());
    println!("API URL:      {}", config.settings.api_url);
    println!("Product ID:   {}", config.settings.product_id);
    println!("Date range:   {} to {}", config.start_date, config.end_date);
    println!("Log level:    {}", config.settings.log_level);

    let db = Database::open(&config.snapshot_path())?;
    let snapshots = db.list_snapshots()?;
    println!("\nSnapshots in {}:", db.path().display());
    if snapshots.is_empty() {
        println!("  (none yet)");
    }
    for (endpoint, fetched_at) in snapshots {
        println!("  {:<32} {}", endpoint, fetched_at);
    }
    Ok(())
}

fn print_errors(errors: &[String]) {
    for error in errors {
        println!("! {}", error);
    }
    if !errors.is_empty() {
        println!();
    }
}

fn print_analysis(view: &AnalysisView) {
    if view.analyzing {
        println!("{}\n", view::ANALYZING_NOTICE);
    }
    print_errors(&view.errors);

    println!("Metrics ({})", view.stats_source.label());
    for card in &view.stats {
        println!("  {:<20} {:>10}  {}", card.label, card.value, card.note);
    }

    println!("\nSentiment distribution ({})", view.slices.source.label());
    for slice in &view.slices.value {
        println!("  {:<10} {:>3}%", slice.name, slice.value);
    }

    println!("\nSentiment over time ({})", view.timeline.source.label());
    if !view.timeline.value.is_empty() {
        println!("  {:<12} {:>9} {:>9} {:>9}", "DATE", "POSITIVE", "NEUTRAL", "NEGATIVE");
        println!("  {}", "-".repeat(42));
        for point in &view.timeline.value {
            println!(
                "  {:<12} {:>9} {:>9} {:>9}",
                point.date, point.positive, point.neutral, point.negative
            );
        }
    }

    println!("\nTop topics ({})", view.topics.source.label());
    if !view.topics.value.is_empty() {
        println!("  {:<5} {:<30} {:>8} {:<10}", "RANK", "TOPIC", "COUNT", "SENTIMENT");
        println!("  {}", "-".repeat(56));
        for (i, topic) in view.topics.value.iter().enumerate() {
            println!(
                "  {:<5} {:<30} {:>8} {:<10}",
                i + 1,
                truncate(&topic.name, 28),
                topic.count,
                topic.sentiment.display_name()
            );
        }
    }

    println!("\nTop complaints ({})", view.complaints.source.label());
    for complaint in &view.complaints.value {
        println!("  - {}", complaint);
    }
    println!("\nPositive aspects ({})", view.strengths.source.label());
    for strength in &view.strengths.value {
        println!("  + {}", strength);
    }
}

fn print_brief(view: &ReportsView) {
    if view.analyzing {
        println!("{}\n", view::ANALYZING_NOTICE);
    }
    print_errors(&view.errors);

    let summary = &view.summary.value;
    println!("Executive summary ({})", view.summary.source.label());
    println!("  Period:         {}", summary.timeframe);
    println!("  Total reviews:  {}", summary.total_reviews);
    println!("  Average rating: {}", summary.avg_rating);
    if !summary.challenges.is_empty() {
        println!("\n  Key challenges:");
        for challenge in &summary.challenges {
            println!("    - {}", challenge);
        }
    }
    if !summary.strengths.is_empty() {
        println!("\n  Strengths:");
        for strength in &summary.strengths {
            println!("    + {}", strength);
        }
    }

    println!("\nSentiment health ({})", view.sentiment_health.source.label());
    for slice in &view.sentiment_health.value {
        println!("  {:<10} {:>3}%", slice.name, slice.value);
    }
}

fn print_report(view: &ReportsView) {
    if view.analyzing {
        println!("{}\n", view::ANALYZING_NOTICE);
    }
    print_errors(&view.errors);

    println!("AI recommendations ({})", view.recommendations.source.label());
    for rec in &view.recommendations.value {
        println!("\n  [{}] {}", rec.priority.display_name(), rec.title);
        for line in textwrap::fill(&rec.description, 72).lines() {
            println!("    {}", line);
        }
        if let (Some(impact), Some(effort)) = (&rec.impact, &rec.effort) {
            println!("    Impact: {}  Effort: {}", impact, effort);
        }
    }

    println!("\nNext steps ({})", view.next_steps.source.label());
    for (i, step) in view.next_steps.value.iter().enumerate() {
        let wrapped = textwrap::fill(step, 72);
        let mut lines = wrapped.lines();
        if let Some(first) = lines.next() {
            println!("  {}. {}", i + 1, first);
        }
        for line in lines {
            println!("     {}", line);
        }
    }
}

/// Shorten to `max` characters, counting chars rather than bytes.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
