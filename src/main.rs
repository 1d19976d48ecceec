use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sprintmetrics::config::{Config, LogFormat};
use sprintmetrics::tracker::{JiraClient, TrackerApi};
use sprintmetrics::warehouse::WriteMode;

#[derive(Parser)]
#[command(
    name = "sprintmetrics",
    about = "Sprint and issue metrics extraction for Jira boards",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (default: $SPRINTMETRICS_CONFIG, then ./sprintmetrics.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract sprint issues, write CSV, and load the warehouse
    Extract {
        /// Board to extract
        #[arg(long)]
        board: Option<u64>,

        /// Only this sprint name (repeatable)
        #[arg(long = "sprint")]
        sprints: Vec<String>,

        /// Only sprints whose name starts with this (repeatable)
        #[arg(long = "prefix")]
        prefixes: Vec<String>,

        /// Include sprints that have not ended yet
        #[arg(long)]
        include_open: bool,

        /// Issue CSV output path
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Skip CSV output
        #[arg(long)]
        no_csv: bool,

        /// Warehouse database path
        #[arg(long)]
        warehouse: Option<PathBuf>,

        /// Skip the warehouse load
        #[arg(long)]
        no_warehouse: bool,

        /// How existing warehouse rows are treated
        #[arg(long, value_enum)]
        mode: Option<WriteMode>,

        /// Changelog requests in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Fail if any issue's changelog cannot be fetched
        #[arg(long)]
        strict: bool,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List a board's sprints
    Sprints {
        /// Board to list
        #[arg(long)]
        board: Option<u64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show an issue's status at a point in time
    IssueStatus {
        /// Issue key or id
        #[arg(long)]
        issue: String,

        /// Cutoff instant (RFC 3339, Jira timestamp, or YYYY-MM-DD)
        #[arg(long)]
        at: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Map custom field ids to display names
    FieldNames {
        /// Issue key to read field names from
        #[arg(long)]
        issue: String,

        /// Include system fields, not only custom fields
        #[arg(long)]
        all: bool,
    },
}

fn init_tracing(config: &Config, format: Option<LogFormat>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match format.unwrap_or(config.logging.format) {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::discover(cli.config.as_deref());
    init_tracing(loaded.as_ref().unwrap_or(&Config::default()), cli.log_format);
    let mut config = loaded?;
    tracing::debug!(tracker = ?config.tracker, "configuration resolved");

    match cli.command {
        Commands::Extract {
            board,
            sprints,
            prefixes,
            include_open,
            csv,
            no_csv,
            warehouse,
            no_warehouse,
            mode,
            concurrency,
            strict,
            json,
        } => {
            if board.is_some() {
                config.board.board_id = board;
            }
            if !sprints.is_empty() {
                config.board.sprint_names = sprints;
            }
            if !prefixes.is_empty() {
                config.board.name_prefixes = prefixes;
            }
            if include_open {
                config.board.closed_only = false;
            }
            if csv.is_some() {
                config.output.issues_csv = csv;
            }
            if no_csv {
                config.output.issues_csv = None;
                config.output.sprints_csv = None;
            }
            if let Some(path) = warehouse {
                config.warehouse.path = path;
            }
            if no_warehouse {
                config.warehouse.enabled = false;
            }
            if let Some(mode) = mode {
                config.warehouse.mode = mode;
            }
            if let Some(n) = concurrency {
                config.extract.concurrency = n;
            }
            if strict {
                config.extract.strict = true;
            }

            let client = JiraClient::from_config(&config.tracker)?;
            tracing::info!(board = ?config.board.board_id, "Running extraction");
            let summary = sprintmetrics::run_extract(&config, &client, chrono::Utc::now()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n=== sprintmetrics extraction ===");
                println!("Sprints:           {}", summary.sprints);
                println!("Issues:            {}", summary.issues);
                println!("Missing history:   {}", summary.history_failures);
                println!("Skipped sprints:   {}", summary.skipped_sprints);
                if let Some(rows) = summary.issues_csv_rows {
                    println!("CSV rows:          {}", rows);
                }
                if let Some(load) = &summary.warehouse {
                    println!(
                        "Warehouse:         {} issues, {} sprints ({} rows replaced)",
                        load.issues_written, load.sprints_written, load.rows_removed
                    );
                }
                println!();
            }
        }
        Commands::Sprints { board, json } => {
            let board_id = board
                .or(config.board.board_id)
                .context("no board configured (set board.board_id or pass --board)")?;
            let client = JiraClient::from_config(&config.tracker)?;
            let sprints = client.board_sprints(board_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&sprints)?);
            } else if sprints.is_empty() {
                println!("No sprints found on board {}.", board_id);
            } else {
                println!("{:<8} | {:<40} | {:<8} | End", "Id", "Name", "State");
                println!("{:-<8}-|-{:-<40}-|-{:-<8}-|-{:-<24}", "", "", "", "");
                for s in sprints {
                    println!(
                        "{:<8} | {:<40} | {:<8} | {}",
                        s.id,
                        s.name,
                        s.state.as_deref().unwrap_or("-"),
                        s.end_date.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::IssueStatus { issue, at, json } => {
            let cutoff = sprintmetrics::timestamp::parse_timestamp(&at)
                .with_context(|| format!("invalid --at value '{}'", at))?;
            let client = JiraClient::from_config(&config.tracker)?;
            let report = sprintmetrics::extract::issue_status_at(&client, &issue, cutoff).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} at {}: {}", report.issue, report.at.to_rfc3339(), report.status.as_deref().unwrap_or("(no status recorded)"));
                for t in &report.timeline {
                    let marker = if t.at <= report.at { "*" } else { " " };
                    println!(" {} {} -> {}", marker, t.at.to_rfc3339(), t.status);
                }
            }
        }
        Commands::FieldNames { issue, all } => {
            let client = JiraClient::from_config(&config.tracker)?;
            let names = client.field_names(&issue).await?;
            for (id, name) in names.iter().filter(|(id, _)| all || id.starts_with("customfield_")) {
                println!("{:<20} {}", id, name);
            }
        }
    }

    Ok(())
}
