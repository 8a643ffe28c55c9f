//! teamboard CLI
//!
//! Command-line front end for the metrics API.

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::FmtSubscriber;

use teamboard_client::{
    ApiClient, ClientConfig, DashboardState, MetricsApi, StatusPoller, StatusView,
};
use teamboard_protocol::{Metric, MetricFilter, MetricId, MetricPayload, StatusReport};

#[derive(Parser, Debug)]
#[command(name = "teamboard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the API service (overrides the config file)
    #[arg(long)]
    api: Option<String>,

    /// Path to client configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show service health
    Status {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,

        /// Poll interval in seconds (with --watch)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// List metrics, newest first
    List(FilterArgs),
    /// Show one metric
    Get {
        /// Metric ID
        id: MetricId,
    },
    /// Create a metric
    Create(FieldArgs),
    /// Replace a metric's fields
    Update {
        /// Metric ID
        id: MetricId,

        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete a metric
    Delete {
        /// Metric ID
        id: MetricId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    team: Option<String>,
    #[arg(long)]
    role: Option<String>,
    /// Lower bound, RFC 3339 or YYYY-MM-DD
    #[arg(long)]
    start_date: Option<String>,
    /// Upper bound, RFC 3339 or YYYY-MM-DD
    #[arg(long)]
    end_date: Option<String>,
}

impl From<FilterArgs> for MetricFilter {
    fn from(args: FilterArgs) -> Self {
        MetricFilter {
            name: args.name,
            team: args.team,
            role: args.role,
            start_date: args.start_date,
            end_date: args.end_date,
        }
    }
}

#[derive(ClapArgs, Debug)]
struct FieldArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    team: String,
    #[arg(long)]
    role: String,
}

impl From<FieldArgs> for MetricPayload {
    fn from(args: FieldArgs) -> Self {
        MetricPayload::new(args.name, args.team, args.role)
    }
}

#[derive(Tabled)]
struct MetricRow {
    id: String,
    name: String,
    team: String,
    role: String,
    timestamp: String,
}

impl From<&Metric> for MetricRow {
    fn from(m: &Metric) -> Self {
        Self {
            id: m.id.to_string(),
            name: m.name.clone(),
            team: m.team.clone(),
            role: m.role.clone(),
            timestamp: m.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Tabled)]
struct StatusRow {
    status: String,
    store: String,
    message: String,
    timestamp: String,
}

impl From<&StatusReport> for StatusRow {
    fn from(r: &StatusReport) -> Self {
        Self {
            status: format!("{:?}", r.status).to_lowercase(),
            store: format!("{:?}", r.store).to_lowercase(),
            message: r.message.clone().unwrap_or_default(),
            timestamp: r.timestamp.to_rfc3339(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .await
            .with_context(|| format!("Failed to load {path}"))?,
        None => ClientConfig::default(),
    };
    if let Some(api) = args.api {
        config = config.with_base_url(api);
    }

    let client = ApiClient::new(&config)?;
    debug!("Using API at {}", client.base_url());
    let json = args.json;

    match args.command {
        Commands::Status { watch: false, .. } => {
            let report = client.status().await?;
            print_status(&report, json)?;
        }
        Commands::Status {
            watch: true,
            interval,
        } => {
            let every = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| config.poll_interval());
            watch_status(client, every, json).await?;
        }
        Commands::List(filter) => {
            let records = client.list(&filter.into()).await?;
            print_metrics(&records, json)?;
        }
        Commands::Get { id } => {
            let metric = client.get(id).await?;
            print_metrics(std::slice::from_ref(&metric), json)?;
        }
        Commands::Create(fields) => {
            let metric = client.create(&fields.into()).await?;
            print_metrics(std::slice::from_ref(&metric), json)?;
        }
        Commands::Update { id, fields } => {
            let metric = client.update(id, &fields.into()).await?;
            print_metrics(std::slice::from_ref(&metric), json)?;
        }
        Commands::Delete { id, yes } => delete(&client, id, yes).await?,
    }

    Ok(())
}

async fn watch_status(client: ApiClient, every: std::time::Duration, json: bool) -> Result<()> {
    let poller = StatusPoller::spawn(Arc::new(client), every);
    let mut rx = poller.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                match view {
                    StatusView::Loading => {}
                    StatusView::Ready(report) => print_status(&report, json)?,
                    StatusView::Error(message) => eprintln!("Status unavailable: {message}"),
                }
            }
        }
    }

    poller.shutdown().await;
    Ok(())
}

/// Delete after the user confirms; the state machine holds the pending id
async fn delete(client: &ApiClient, id: MetricId, yes: bool) -> Result<()> {
    let mut state = DashboardState::new();
    state.request_delete(id);

    if !yes && !confirm(&format!("Delete metric {id}?")).await? {
        state.cancel_delete();
        println!("Aborted");
        return Ok(());
    }

    let id = state.confirm_delete()?;
    let result = client.delete(id).await;
    if let Ok(ack) = &result {
        println!("{}", ack.message);
    }

    if !state.finish_delete(result) {
        bail!("{}", state.inline_error().unwrap_or("Delete failed"));
    }
    Ok(())
}

async fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn print_metrics(records: &[Metric], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No metrics");
    } else {
        println!("{}", Table::new(records.iter().map(MetricRow::from)));
    }
    Ok(())
}

fn print_status(report: &StatusReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", Table::new([StatusRow::from(report)]));
    }
    Ok(())
}
