use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};

mod allocation;
mod config;
mod db;
mod error;
mod freshness;
mod metrics;
mod models;
mod report;
mod stats;
mod timeliness;
mod volume;
mod window;

use allocation::AllocationStrategy;
use config::Config;
use freshness::HttpFreshnessChecker;
use models::{AssignmentSnapshot, MapKind};

#[derive(Parser)]
#[command(name = "review-timeliness")]
#[command(about = "Peer-review timeliness and review metrics for multi-round assignments", long_about = None)]
struct Cli {
    /// Only log errors
    #[arg(long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Log debug detail, including every freshness check
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify submission timeliness for every reviewed team
    Timeliness {
        #[arg(long)]
        assignment: i64,
        /// Limit to one reviewer's participant id
        #[arg(long)]
        reviewer: Option<i64>,
        /// Read records from a JSON snapshot instead of Postgres
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Count completed reviews per round for one reviewer
    Responses {
        #[arg(long)]
        assignment: i64,
        #[arg(long)]
        reviewer: i64,
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Summarize tagging time intervals
    #[command(group(
        ArgGroup::new("source")
            .args(["csv", "reviewer"])
            .required(true)
            .multiple(false)
    ))]
    Intervals {
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Read tagging timestamps for this reviewer from Postgres
        #[arg(long, requires = "assignment")]
        reviewer: Option<i64>,
        #[arg(long)]
        assignment: Option<i64>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        precision: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Size a review allocation
    Allocate {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        participants: u32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        teams: u32,
        #[arg(long)]
        reviews: u32,
        #[arg(long, value_enum, default_value_t = Policy::Student)]
        policy: Policy,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown review report
    Report {
        #[arg(long)]
        assignment: i64,
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// CSV of tagging intervals to summarize in the report
        #[arg(long)]
        intervals: Option<PathBuf>,
        #[arg(long, default_value = "review-report.md")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// Each student performs a fixed number of reviews
    Student,
    /// Each team receives a fixed number of reviews
    Team,
}

#[derive(Serialize)]
struct TimelinessLine {
    map_id: i64,
    reviewer_id: i64,
    reviewee_id: i64,
    rounds: Vec<&'static str>,
    final_status: &'static str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;
    let config = Config::from_env();

    match cli.command {
        Commands::Timeliness {
            assignment,
            reviewer,
            snapshot,
            json,
        } => {
            let snapshot = load_snapshot(&config, assignment, snapshot.as_deref()).await?;
            let checker = HttpFreshnessChecker::new(&config)?;
            let round_count = snapshot.assignment.round_count;
            let maps = metrics::reviewable_maps(&snapshot.response_maps, &snapshot.team_ids);

            let mut lines = Vec::new();
            for map in maps.iter().filter(|map| map.kind == MapKind::Review) {
                if reviewer.is_some_and(|id| id != map.reviewer_id) {
                    continue;
                }
                let input = timeliness::ClassificationInput {
                    reviewee_team_id: map.reviewee_id,
                    round_count,
                    assignment_created_at: snapshot.assignment.created_at,
                    due_dates: &snapshot.due_dates,
                    submissions: &snapshot.submissions,
                    response_map: map,
                };
                let classification = timeliness::classify(&input, &checker).await;
                lines.push(TimelinessLine {
                    map_id: map.id,
                    reviewer_id: map.reviewer_id,
                    reviewee_id: map.reviewee_id,
                    rounds: classification
                        .statuses()
                        .into_iter()
                        .map(report::status_label)
                        .collect(),
                    final_status: report::status_label(classification.final_status()),
                });
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else if lines.is_empty() {
                println!("No review maps found for this assignment.");
            } else {
                for line in &lines {
                    println!(
                        "- map {} reviewer {} -> team {}: {} [{}]",
                        line.map_id,
                        line.reviewer_id,
                        line.reviewee_id,
                        line.final_status,
                        line.rounds.join(" / ")
                    );
                }
            }
        }
        Commands::Responses {
            assignment,
            reviewer,
            snapshot,
        } => {
            let snapshot = load_snapshot(&config, assignment, snapshot.as_deref()).await?;
            let maps = snapshot.maps_for_reviewer(reviewer, MapKind::Review);
            let round_count = snapshot.assignment.round_count;
            let counts = metrics::count_by_round(&maps, round_count);
            let received = metrics::count_responses_by_round(&maps, round_count);
            let reviewable = metrics::reviewable_maps(&maps, &snapshot.team_ids);
            let volumes = volume::review_volume(&reviewable, round_count).to_vec();

            println!("Reviewer {reviewer}: {} reviewable maps", reviewable.len());
            for (slot, count) in counts.iter().enumerate() {
                println!(
                    "- round {}: {} completed ({} responses), avg volume {:.0}",
                    slot + 1,
                    count,
                    received[slot],
                    volumes[slot + 1]
                );
            }
            println!("Overall avg volume: {:.0}", volumes[0]);
        }
        Commands::Intervals {
            csv,
            reviewer,
            assignment,
            threshold,
            precision,
            json,
        } => {
            let samples = match (csv, reviewer, assignment) {
                (Some(path), _, _) => db::read_intervals_csv(&path)?,
                (None, Some(reviewer), Some(assignment)) => {
                    let pool = connect(&config).await?;
                    let stamps = db::fetch_tag_timestamps(&pool, assignment, reviewer).await?;
                    stats::intervals_from_timestamps(&stamps)
                }
                _ => anyhow::bail!("either --csv or --reviewer with --assignment is required"),
            };
            let summary = stats::summarize(
                &samples,
                threshold.unwrap_or(config.interval_threshold),
                precision.unwrap_or(config.interval_precision),
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                match summary {
                    Some(stats) => println!(
                        "{} intervals: mean {}, min {}, max {}, variance {}, std dev {}",
                        stats.count, stats.mean, stats.min, stats.max, stats.variance, stats.stddev
                    ),
                    None => println!("No interval statistics available ({}).", report::PLACEHOLDER),
                }
            }
        }
        Commands::Allocate {
            participants,
            teams,
            reviews,
            policy,
            json,
        } => {
            let strategy = match policy {
                Policy::Student => AllocationStrategy::StudentPaced {
                    participants,
                    teams,
                    reviews,
                },
                Policy::Team => AllocationStrategy::TeamPaced {
                    participants,
                    teams,
                    reviews,
                },
            };
            let sizing = strategy.sizing();

            if json {
                println!("{}", serde_json::to_string_pretty(&sizing)?);
            } else {
                println!("Reviews per team: {}", sizing.reviews_per_team);
                println!("Reviews per student: {}", sizing.reviews_per_student);
                println!("Reviews needed: {}", sizing.reviews_needed);
            }
        }
        Commands::Report {
            assignment,
            snapshot,
            intervals,
            out,
        } => {
            let snapshot = load_snapshot(&config, assignment, snapshot.as_deref()).await?;
            let checker = HttpFreshnessChecker::new(&config)?;
            let rows = report::build_reviewer_rows(&snapshot, &checker).await;
            let interval_stats = match intervals {
                Some(path) => stats::summarize(
                    &db::read_intervals_csv(&path)?,
                    config.interval_threshold,
                    config.interval_precision,
                ),
                None => None,
            };
            let report = report::build_report(&snapshot, &rows, interval_stats.as_ref());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to read from Postgres")?;

    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_snapshot(
    config: &Config,
    assignment: i64,
    snapshot: Option<&Path>,
) -> anyhow::Result<AssignmentSnapshot> {
    if let Some(path) = snapshot {
        return db::load_snapshot(path);
    }

    let pool = connect(config).await?;
    db::fetch_snapshot(&pool, assignment).await
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("REVIEW_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
