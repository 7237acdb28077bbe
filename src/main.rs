use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod activity;
mod config;
mod dashboard;
mod dates;
mod error;
mod models;
mod normalize;
mod progress;
mod report;
mod store;
mod timeline;
mod tracker;

use config::TrackerConfig;
use models::{MilestoneId, ProgrammeClass};
use store::TabularStore;
use tracker::{Mark, NewStudent, Tracker};

#[derive(Parser)]
#[command(name = "milestone-tracker")]
#[command(about = "Postgraduate milestone timeline and progress tracker", long_about = None)]
struct Cli {
    /// Postgres connection string; ignored when --sheet-dir is given
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    /// Directory of <sheet>.csv files to use instead of Postgres
    #[arg(long, env = "TRACKER_SHEET_DIR", global = true)]
    sheet_dir: Option<PathBuf>,
    /// TOML file with durations, weights and sheet candidates
    #[arg(long, env = "TRACKER_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Tracking sheet name; defaults to the first known sheet in the store
    #[arg(long, env = "TRACKER_SHEET", global = true)]
    sheet: Option<String>,
    /// Evaluate as of this date (YYYY-MM-DD) instead of today
    #[arg(long, global = true)]
    as_of: Option<NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the sheet storage
    InitDb,
    /// Write a realistic tracking sheet
    Seed,
    /// Replace a sheet with the rows of a CSV file or a JSON values export
    #[command(group(
        ArgGroup::new("source")
            .args(["csv", "json"])
            .required(true)
            .multiple(false)
    ))]
    Import {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Show timeline and progress for one student
    Status {
        #[arg(long)]
        matric: String,
        #[arg(long)]
        json: bool,
    },
    /// Print one student's timeline as JSON
    Timeline {
        #[arg(long)]
        matric: String,
    },
    /// Print one student's progress as JSON
    Progress {
        #[arg(long)]
        matric: String,
    },
    /// Summarize milestones and statuses across students
    Dashboard {
        #[arg(long)]
        supervisor: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List milestones past their expected month with no submission
    Overdue {
        #[arg(long)]
        supervisor: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        supervisor: Option<String>,
        #[arg(long, default_value = "milestone-report.md")]
        out: PathBuf,
    },
    /// Record a milestone submission
    Submit {
        #[arg(long)]
        matric: String,
        #[arg(long)]
        stage: MilestoneId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        programme: Option<String>,
    },
    /// Record a milestone approval
    Approve {
        #[arg(long)]
        matric: String,
        #[arg(long)]
        stage: MilestoneId,
    },
    /// Group activity names into milestone buckets
    Activities { names: Vec<String> },
}

async fn open_store(cli: &Cli) -> anyhow::Result<TabularStore> {
    if let Some(dir) = &cli.sheet_dir {
        return Ok(TabularStore::csv_dir(dir));
    }
    let database_url = cli
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set unless --sheet-dir points at a CSV directory")?;
    TabularStore::connect_postgres(database_url).await
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Activities { names } = &cli.command {
        let buckets = if names.is_empty() {
            activity::group_activities(activity::STANDARD_ACTIVITIES)
        } else {
            activity::group_activities(names)
        };
        return print_json(&buckets);
    }

    let config = TrackerConfig::load(cli.config.as_deref())?;
    let today = cli.as_of.unwrap_or_else(|| Local::now().date_naive());
    let store = open_store(&cli).await?;
    let default_sheet = config
        .sheet_candidates
        .first()
        .cloned()
        .unwrap_or_else(|| "MasterTracking".to_string());

    match &cli.command {
        Commands::InitDb => {
            store.init().await?;
            match &store {
                TabularStore::CsvDir(dir) => println!("Sheet directory ready at {}.", dir.root().display()),
                TabularStore::Postgres(_) => println!("Schema ready."),
            }
        }
        Commands::Seed => {
            let sheet = cli.sheet.as_deref().unwrap_or(&default_sheet);
            let rows = tracker::seed(&store, sheet).await?;
            println!("Seeded {rows} students into `{sheet}`.");
        }
        Commands::Import { csv, json } => {
            let sheet = cli.sheet.as_deref().unwrap_or(&default_sheet);
            let (rows, source) = match (csv, json) {
                (Some(csv), _) => (tracker::import_csv(&store, sheet, csv).await?, csv),
                (None, Some(json)) => (tracker::import_json(&store, sheet, json).await?, json),
                (None, None) => anyhow::bail!("import needs --csv or --json"),
            };
            println!("Imported {rows} rows from {} into `{sheet}`.", source.display());
        }
        Commands::Status { matric, json } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let record = tracker.find_student(matric).await?;
            let view = dashboard::evaluate_student(&record, &config, today);

            if *json {
                return print_json(&view);
            }
            println!("{} ({}), {}", view.name, view.matric, view.programme);
            let fallback = if view.start_date_fallback { " (unreadable, using today)" } else { "" };
            println!("Start date {}{}", view.start_date, fallback);
            println!(
                "Status {} with {}% progress at {}",
                view.timeline.status, view.progress.percentage, view.progress.level
            );
            for milestone in &view.timeline.milestones {
                println!(
                    "- {} expected {}: submitted {}, approved {}",
                    milestone.id,
                    milestone.expected_quarter,
                    if milestone.submitted { "yes" } else { "no" },
                    if milestone.approved { "yes" } else { "no" }
                );
            }
        }
        Commands::Timeline { matric } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let record = tracker.find_student(matric).await?;
            let months = config.expected_months(ProgrammeClass::classify(&record.programme));
            print_json(&timeline::build_timeline(&record, months, config.quarter_policy, today))?;
        }
        Commands::Progress { matric } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let record = tracker.find_student(matric).await?;
            print_json(&progress::score_progress(&record, &config.weights))?;
        }
        Commands::Dashboard { supervisor, json } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let roster = scoped_roster(&tracker, supervisor.as_deref()).await?;
            let views: Vec<_> = roster
                .records
                .iter()
                .map(|record| dashboard::evaluate_student(record, &config, today))
                .collect();
            let summary = dashboard::summarize(&views, roster.failures);

            if *json {
                return print_json(&summary);
            }
            println!(
                "Sheet `{}`: {} students, {} completed ({}%), average progress {}%",
                tracker.sheet_name(),
                summary.total_students,
                summary.completed,
                summary.percent_complete,
                summary.average_progress
            );
            for (status, count) in &summary.statuses {
                println!("- {status}: {count}");
            }
            for (id, tally) in &summary.milestones {
                println!("- {id}: {} submitted, {} approved", tally.submitted, tally.approved);
            }
            for failure in &summary.failures {
                println!("! row {} skipped: {}", failure.row, failure.reason);
            }
        }
        Commands::Overdue { supervisor } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let roster = scoped_roster(&tracker, supervisor.as_deref()).await?;
            let overdue = dashboard::overdue_milestones(&roster.records, &config, today);

            if overdue.is_empty() {
                println!("No overdue milestones as of {today}.");
                return Ok(());
            }
            println!("Overdue milestones as of {today}:");
            for item in &overdue {
                println!(
                    "- {} ({}) {} expected by {}",
                    item.name, item.matric, item.milestone, item.expected_date
                );
            }
        }
        Commands::Report { supervisor, out } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let roster = scoped_roster(&tracker, supervisor.as_deref()).await?;
            let views: Vec<_> = roster
                .records
                .iter()
                .map(|record| dashboard::evaluate_student(record, &config, today))
                .collect();
            let overdue = dashboard::overdue_milestones(&roster.records, &config, today);
            let summary = dashboard::summarize(&views, roster.failures);
            let report = report::build_report(supervisor.as_deref(), today, &summary, &views, &overdue);
            std::fs::write(out, report)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Submit {
            matric,
            stage,
            name,
            programme,
        } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let details = NewStudent {
                name: name.clone(),
                programme: programme.clone(),
            };
            let outcome = tracker
                .stamp_milestone(matric, *stage, Mark::Submitted, &timestamp(), &details)
                .await?;
            if outcome.created {
                println!("Added {matric} at row {} with {stage} submitted.", outcome.row);
            } else {
                println!("Recorded {stage} submission for {matric} (row {}).", outcome.row);
            }
        }
        Commands::Approve { matric, stage } => {
            let tracker = Tracker::open(&store, &config, cli.sheet.as_deref()).await?;
            let outcome = tracker
                .stamp_milestone(matric, *stage, Mark::Approved, &timestamp(), &NewStudent::default())
                .await?;
            println!("Recorded {stage} approval for {matric} (row {}).", outcome.row);
        }
        Commands::Activities { .. } => {}
    }

    Ok(())
}

async fn scoped_roster(tracker: &Tracker<'_>, supervisor: Option<&str>) -> anyhow::Result<tracker::Roster> {
    let roster = tracker.roster().await?;
    Ok(match supervisor {
        Some(email) => roster.supervised_by(email),
        None => roster,
    })
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
