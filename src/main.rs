use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod collector;
mod config;
mod error;
mod kanboard;
mod models;
mod priorities;
mod report;
mod source;
mod trends;

use collector::{Collector, DateRange, SortKey, StatusFilter, TaskListingRequest};
use config::{AnalyticsConfig, UpstreamConfig};
use kanboard::KanboardClient;
use priorities::{PriorityAnalyzer, PriorityReport, PriorityRequest, TimeHorizon};
use source::{SnapshotSource, TaskSource};
use trends::{AnalysisKind, TimeRange, TrendAnalyzer, TrendReport, TrendRequest};

#[derive(Parser)]
#[command(name = "kanboard-insights")]
#[command(about = "Workload, urgency and trend analytics for Kanboard projects", long_about = None)]
struct Cli {
    /// Read board data from a captured snapshot instead of a live instance (takes precedence over --url)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// JSON file overriding analysis thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, env = "KANBOARD_URL", global = true)]
    url: Option<String>,
    #[arg(long, env = "KANBOARD_USERNAME", global = true)]
    username: Option<String>,
    #[arg(long, env = "KANBOARD_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,
    #[arg(long, env = "KANBOARD_TIMEOUT_SECS", default_value_t = 30, global = true)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks with filters, sorting and size limits
    Tasks {
        #[arg(long = "project")]
        projects: Vec<String>,
        #[arg(long = "assignee")]
        assignees: Vec<String>,
        /// active, completed or all
        #[arg(long, default_value = "active")]
        status: String,
        #[arg(long)]
        due_from: Option<NaiveDate>,
        #[arg(long)]
        due_to: Option<NaiveDate>,
        #[arg(long)]
        include_overdue: bool,
        #[arg(long)]
        no_time_tracking: bool,
        /// due_date, priority or created
        #[arg(long, default_value = "due_date")]
        sort_by: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Emit full task records instead of summaries
        #[arg(long)]
        detail: bool,
        /// Also write the emitted tasks to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Analyse workload, urgent items and bottlenecks
    Priorities {
        #[arg(long = "project")]
        projects: Vec<String>,
        #[arg(long)]
        user_id: Option<String>,
        /// today, week or month
        #[arg(long, default_value = "week")]
        horizon: String,
        #[arg(long)]
        no_recommendations: bool,
    },
    /// Analyse historical trends
    Trends {
        #[arg(long = "project")]
        projects: Vec<String>,
        /// 7_days, 14_days, 30_days, 60_days, 90_days, 6_months or 1_year
        #[arg(long, default_value = "30_days")]
        range: String,
        /// Analysis to run; repeat for several
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long = "project")]
        projects: Vec<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long, default_value = "week")]
        horizon: String,
        #[arg(long, default_value = "30_days")]
        range: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Capture board data into a snapshot file
    Snapshot {
        #[arg(long = "project")]
        projects: Vec<String>,
        #[arg(long, default_value = "snapshot.json")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let span = info_span!("invocation", request_id = %Uuid::new_v4());
    run(cli).instrument(span).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AnalyticsConfig::from_file(path)?,
        None => AnalyticsConfig::default(),
    };
    let source = open_source(&cli).await?;
    let collector = Collector::new(source, Arc::new(config));
    let now = Utc::now();

    match cli.command {
        Commands::Tasks {
            projects,
            assignees,
            status,
            due_from,
            due_to,
            include_overdue,
            no_time_tracking,
            sort_by,
            limit,
            detail,
            csv,
        } => {
            let request = TaskListingRequest {
                project_ids: projects,
                assignee_ids: assignees,
                status_filter: StatusFilter::from(status),
                due_date_range: (due_from.is_some() || due_to.is_some()).then_some(DateRange {
                    start: due_from,
                    end: due_to,
                }),
                include_overdue,
                include_time_tracking: !no_time_tracking,
                sort_by: SortKey::from(sort_by),
                limit,
                summary_mode: !detail,
            };
            let listing = collector.list_tasks(&request, now).await?;

            if let Some(path) = csv {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                let written = report::write_task_csv(file, &listing)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(rows = written, path = %path.display(), "wrote task CSV");
            }
            print_json(&listing)?;
        }
        Commands::Priorities {
            projects,
            user_id,
            horizon,
            no_recommendations,
        } => {
            let request = PriorityRequest {
                user_id,
                project_ids: projects,
                time_horizon: TimeHorizon::from(horizon),
                include_recommendations: !no_recommendations,
            };
            let report = PriorityAnalyzer::new(collector).analyse(&request, now).await?;
            print_json(&report)?;
        }
        Commands::Trends {
            projects,
            range,
            kinds,
        } => {
            let request = trend_request(projects, &range, &kinds);
            let report = TrendAnalyzer::new(collector).analyse(&request, now).await?;
            print_json(&report)?;
        }
        Commands::Report {
            projects,
            user_id,
            horizon,
            range,
            out,
        } => {
            let scope = (!projects.is_empty()).then(|| format!("projects {}", projects.join(", ")));
            let priority_request = PriorityRequest {
                user_id,
                project_ids: projects.clone(),
                time_horizon: TimeHorizon::from(horizon),
                include_recommendations: true,
            };
            let mut trend_request = trend_request(projects, &range, &[]);
            trend_request.analysis_types.push(AnalysisKind::ProjectHealth);

            let (priorities, trends) =
                analyse_for_report(collector, &priority_request, &trend_request, now).await?;
            let report = report::build_report(scope.as_deref(), now, &priorities, &trends);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Snapshot { projects, out } => {
            let snapshot = source::capture(collector.source(), &projects, now).await?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Captured {} projects into {}.",
                snapshot.projects.len(),
                out.display()
            );
        }
    }

    Ok(())
}

async fn open_source(cli: &Cli) -> anyhow::Result<Arc<dyn TaskSource>> {
    if let Some(path) = &cli.snapshot {
        return Ok(Arc::new(load_snapshot(path).await?));
    }

    let url = cli
        .url
        .clone()
        .context("KANBOARD_URL (or --url / --snapshot) must be set")?;
    let username = cli
        .username
        .clone()
        .context("KANBOARD_USERNAME (or --username) must be set")?;
    let token = cli
        .token
        .clone()
        .context("KANBOARD_TOKEN (or --token) must be set")?;
    let upstream = UpstreamConfig::new(url, username, token, cli.timeout_secs);
    let client = KanboardClient::new(&upstream).context("failed to build HTTP client")?;
    Ok(Arc::new(client))
}

async fn load_snapshot(path: &Path) -> anyhow::Result<SnapshotSource> {
    SnapshotSource::load(path)
        .await
        .with_context(|| format!("failed to load snapshot {}", path.display()))
}

/// Run the priority and trend analyses side by side over one collector.
async fn analyse_for_report(
    collector: Collector,
    priority_request: &PriorityRequest,
    trend_request: &TrendRequest,
    now: DateTime<Utc>,
) -> error::Result<(PriorityReport, TrendReport)> {
    let priority_analyzer = PriorityAnalyzer::new(collector.clone());
    let trend_analyzer = TrendAnalyzer::new(collector);
    tokio::try_join!(
        priority_analyzer.analyse(priority_request, now),
        trend_analyzer.analyse(trend_request, now),
    )
}

fn trend_request(projects: Vec<String>, range: &str, kinds: &[String]) -> TrendRequest {
    let analysis_types = if kinds.is_empty() {
        AnalysisKind::DEFAULTS.to_vec()
    } else {
        kinds.iter().filter_map(|k| AnalysisKind::parse(k)).collect()
    };
    TrendRequest {
        project_ids: projects,
        time_range: TimeRange::from(range.to_string()),
        analysis_types,
        ..TrendRequest::default()
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
