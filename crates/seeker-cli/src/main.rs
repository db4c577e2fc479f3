use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use seeker_client::ChromeSessionFactory;
use seeker_core::{
    AppError, CachePolicy, FileSnapshotStore, JobRecord, JobSeeker, RunCache, RunSource,
    SeekerConfig, SessionMode, SnapshotMeta, SnapshotStore,
};
use seeker_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "seeker", version, about = "Job listing crawler with a run cache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Return listings for a query, reusing a recent crawl when one fits
    Search {
        #[arg(short, long, default_value = "Software Developer")]
        query: String,

        #[arg(short, long, default_value = "Toronto, ON")]
        location: String,

        /// Page budget (defaults to SEEKER_PAGES, else 120)
        #[arg(short, long)]
        pages: Option<u32>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Include the description column
        #[arg(long, default_value_t = false)]
        with_description: bool,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// List stored snapshots for a query, newest first
    History {
        #[arg(short, long, default_value = "Software Developer")]
        query: String,

        #[arg(short, long, default_value = "Toronto, ON")]
        location: String,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

/// Flags layered over `SEEKER_*` environment configuration.
#[derive(clap::Args)]
struct ConfigOverrides {
    /// Show the browser window
    #[arg(long, default_value_t = false)]
    interactive: bool,

    /// Root of the file snapshot store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for per-crawl log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Search page the browser opens first
    #[arg(long)]
    entry_url: Option<String>,

    /// Maximum snapshot age to reuse, in hours
    #[arg(long)]
    stale_hours: Option<u32>,

    /// Snapshots kept per query and location
    #[arg(long)]
    retention: Option<usize>,

    /// Store snapshots in PostgreSQL (requires DATABASE_URL)
    #[arg(long, default_value_t = false)]
    postgres: bool,
}

impl ConfigOverrides {
    fn apply(&self, mut config: SeekerConfig) -> Result<SeekerConfig> {
        if self.interactive {
            config = config.with_session_mode(SessionMode::Interactive);
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        if let Some(dir) = &self.log_dir {
            config = config.with_log_dir(Some(dir.clone()));
        }
        if let Some(url) = &self.entry_url {
            config = config.with_entry_url(url.clone());
        }
        if let Some(hours) = self.stale_hours {
            config = config.with_staleness(TimeDelta::hours(hours.into()));
        }
        if let Some(retention) = self.retention {
            config = config.with_retention(retention);
        }
        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("seeker=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base = SeekerConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Search {
            query,
            location,
            pages,
            format,
            with_description,
            overrides,
        } => {
            let config = overrides.apply(base)?;
            let pages = pages.unwrap_or(config.default_pages);
            let output = Output {
                format,
                with_description,
            };
            if overrides.postgres {
                let store = connect_db().await?.snapshot_repo();
                cmd_search(store, config, &query, &location, pages, output).await?;
            } else {
                let store = FileSnapshotStore::new(&config.data_dir);
                cmd_search(store, config, &query, &location, pages, output).await?;
            }
        }
        Commands::History {
            query,
            location,
            overrides,
        } => {
            let config = overrides.apply(base)?;
            if overrides.postgres {
                let store = connect_db().await?.snapshot_repo();
                cmd_history(store, &config, &query, &location).await?;
            } else {
                let store = FileSnapshotStore::new(&config.data_dir);
                cmd_history(store, &config, &query, &location).await?;
            }
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    with_description: bool,
}

async fn cmd_search<S: SnapshotStore>(
    store: S,
    config: SeekerConfig,
    query: &str,
    location: &str,
    pages: u32,
    output: Output,
) -> Result<()> {
    let sessions = ChromeSessionFactory::new(&config);
    let seeker = JobSeeker::new(sessions, store, config);

    let outcome = seeker
        .fetch_run(query, location, pages)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let source = match outcome.source {
        RunSource::Cache => "cache",
        RunSource::Fresh => "fresh crawl",
    };
    tracing::info!(
        snapshot = %outcome.run.id,
        kind = %outcome.run.kind,
        pages_actual = outcome.run.pages_actual,
        records = outcome.run.records.len(),
        "Dataset ready from {source}"
    );

    let stdout = std::io::stdout();
    write_records(stdout.lock(), &outcome.run.records, output)
}

async fn cmd_history<S: SnapshotStore>(
    store: S,
    config: &SeekerConfig,
    query: &str,
    location: &str,
) -> Result<()> {
    let cache = RunCache::new(store, CachePolicy::from_config(config));
    let history = cache
        .history(query, location)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let stdout = std::io::stdout();
    write_history(stdout.lock(), query, location, &history, config.staleness)
}

/// One output row; the description is left out unless asked for.
#[derive(Serialize)]
struct RecordRow<'a> {
    title: &'a str,
    company: &'a str,
    location: &'a str,
    salary_base: Option<String>,
    salary_upper: Option<String>,
    employment_type: Option<&'a str>,
    responsive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> RecordRow<'a> {
    fn new(record: &'a JobRecord, with_description: bool) -> Self {
        Self {
            title: &record.title,
            company: &record.company,
            location: &record.location,
            salary_base: record.salary_base.map(|d| d.to_string()),
            salary_upper: record.salary_upper.map(|d| d.to_string()),
            employment_type: record.employment_type.as_deref(),
            responsive: record.responsive,
            description: with_description.then(|| record.description()),
        }
    }
}

fn write_records<W: Write>(mut out: W, records: &[JobRecord], output: Output) -> Result<()> {
    let rows: Vec<_> = records
        .iter()
        .map(|r| RecordRow::new(r, output.with_description))
        .collect();

    match output.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &rows)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            let mut header = vec![
                "title",
                "company",
                "location",
                "salary_base",
                "salary_upper",
                "employment_type",
                "responsive",
            ];
            if output.with_description {
                header.push("description");
            }
            writer.write_record(&header)?;

            for row in &rows {
                let responsive = row.responsive.to_string();
                let mut fields = vec![
                    row.title,
                    row.company,
                    row.location,
                    row.salary_base.as_deref().unwrap_or(""),
                    row.salary_upper.as_deref().unwrap_or(""),
                    row.employment_type.unwrap_or(""),
                    responsive.as_str(),
                ];
                if let Some(description) = row.description {
                    fields.push(description);
                }
                writer.write_record(&fields)?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn write_history<W: Write>(
    mut out: W,
    query: &str,
    location: &str,
    history: &[Result<SnapshotMeta, AppError>],
    staleness: TimeDelta,
) -> Result<()> {
    if history.is_empty() {
        writeln!(out, "No snapshots for '{query}' in '{location}'")?;
        return Ok(());
    }

    writeln!(out, "Snapshots for '{query}' in '{location}':\n")?;
    let now = Utc::now();
    for entry in history {
        match entry {
            Ok(meta) => {
                let age = now - meta.created_at;
                let stale = if age > staleness { " stale" } else { "" };
                writeln!(
                    out,
                    "  [{}] {}  pages {}/{}  {} records  {} ago{}  {}",
                    meta.kind,
                    meta.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    meta.pages_actual,
                    meta.pages_requested,
                    meta.record_count,
                    format_age(age),
                    stale,
                    meta.id,
                )?;
            }
            Err(e) => writeln!(out, "  [unreadable] {e}")?,
        }
    }
    writeln!(out, "\nTotal: {} snapshots", history.len())?;
    Ok(())
}

fn format_age(age: TimeDelta) -> String {
    if age.num_hours() >= 48 {
        format!("{}d", age.num_days())
    } else if age.num_minutes() >= 60 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes().max(0))
    }
}
