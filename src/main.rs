use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use adaptive_quiz::analytics::{self, Insights};
use adaptive_quiz::feedback;
use adaptive_quiz::recommend::recommend_videos;
use adaptive_quiz::report::build_report;
use adaptive_quiz::{tracker, AnswerEvent, Course, FeedbackLoop, Policy, RecentHistory, Selection};

mod db;

#[derive(Parser)]
#[command(name = "adaptive-quiz")]
#[command(about = "Adaptive quiz engine: track answers, find weak areas, pick the next concept", long_about = None)]
struct Cli {
    /// TOML file overriding policy thresholds and weights
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import a session's answer log from a CSV file
    Import {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one answer and print the next concept to quiz
    #[command(group(
        ArgGroup::new("outcome")
            .args(["correct", "incorrect"])
            .required(true)
            .multiple(false)
    ))]
    Answer {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        course: PathBuf,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        subtopic: String,
        #[arg(long)]
        concept: String,
        #[arg(long)]
        correct: bool,
        #[arg(long)]
        incorrect: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Pick the next concept without recording anything
    Next {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        course: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print insights for a session
    Insights {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Rank concepts for video generation
    Videos {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        course: PathBuf,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Generate a markdown progress report
    Report {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        course: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Rebuild a session snapshot from its stored answer log
    Rebuild {
        #[arg(long)]
        session: Uuid,
    },
    /// Replay a CSV answer log offline, without a database
    Simulate {
        #[arg(long)]
        course: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 5)]
        videos: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let policy = match cli.policy.as_deref() {
        Some(path) => Policy::load(path)
            .with_context(|| format!("failed to load policy from {}", path.display()))?,
        None => Policy::default(),
    };

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { session, csv } => {
            let pool = connect().await?;
            let mut tx = pool.begin().await?;
            db::lock_session(&mut tx, session).await?;
            let inserted = db::import_csv(&mut tx, session, &csv).await?;
            db::rebuild_session(&mut tx, session, &policy).await?;
            tx.commit().await?;
            println!("Inserted {inserted} answers from {}.", csv.display());
        }
        Commands::Answer {
            session,
            course,
            topic,
            subtopic,
            concept,
            correct,
            incorrect: _,
            seed,
        } => {
            let pool = connect().await?;
            let course = load_course(&course)?;
            let mut tx = pool.begin().await?;
            let stored = db::lock_session(&mut tx, session).await?;
            let answer = AnswerEvent {
                answered_at: Some(Utc::now()),
                ..AnswerEvent::new(topic, subtopic, concept, correct)
            };

            let outcome = FeedbackLoop::new(&course, &policy).submit_answer(
                stored.performance,
                stored.history,
                &answer,
                &mut rng_from(seed),
            )?;

            db::insert_answer(&mut tx, session, &answer).await?;
            let stored = db::StoredSession {
                performance: outcome.performance,
                history: outcome.history,
            };
            db::save_session(&mut tx, session, &stored).await?;
            tx.commit().await?;

            println!(
                "Recorded {} answer for {}. Trophies: {}.",
                if correct { "correct" } else { "incorrect" },
                answer.key(),
                stored.performance.trophy_score
            );
            let score = stored.performance.concept_score(&answer.key());
            if feedback::should_move_on(score, &policy) {
                println!("{} is settled for now; moving on.", answer.key().concept);
            }
            print_selection(&outcome.selection);
        }
        Commands::Next {
            session,
            course,
            seed,
        } => {
            let pool = connect().await?;
            let course = load_course(&course)?;
            let stored = db::require_session(&pool, session).await?;
            let insights = analytics::analyze(&stored.performance, &policy);
            let selection = FeedbackLoop::new(&course, &policy).select_next(
                &stored.performance,
                &insights,
                &stored.history,
                &mut rng_from(seed),
            )?;
            print_selection(&selection);
        }
        Commands::Insights { session, json } => {
            let pool = connect().await?;
            let stored = db::require_session(&pool, session).await?;
            let insights = analytics::analyze(&stored.performance, &policy);

            if json {
                println!("{}", serde_json::to_string_pretty(&insights)?);
            } else {
                print_insights(&insights);
            }
        }
        Commands::Videos {
            session,
            course,
            limit,
        } => {
            let pool = connect().await?;
            let course = load_course(&course)?;
            let stored = db::require_session(&pool, session).await?;
            let insights = analytics::analyze(&stored.performance, &policy);
            let picks = recommend_videos(&insights, &stored.performance, &course, limit);

            if picks.is_empty() {
                println!("No concepts to recommend.");
                return Ok(());
            }

            println!("Recommended videos:");
            for pick in picks.iter() {
                println!("- {} (relevance {:.2})", pick.key, pick.relevance);
            }
        }
        Commands::Report {
            session,
            course,
            seed,
            out,
        } => {
            let pool = connect().await?;
            let course = load_course(&course)?;
            let stored = db::require_session(&pool, session).await?;
            let insights = analytics::analyze(&stored.performance, &policy);
            let next = FeedbackLoop::new(&course, &policy).select_next(
                &stored.performance,
                &insights,
                &stored.history,
                &mut rng_from(seed),
            )?;
            let label = session.to_string();
            let report = build_report(
                Some(&label),
                Utc::now(),
                &stored.performance,
                &insights,
                Some(&next),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Rebuild { session } => {
            let pool = connect().await?;
            db::require_session(&pool, session).await?;
            let mut tx = pool.begin().await?;
            db::lock_session(&mut tx, session).await?;
            let stored = db::rebuild_session(&mut tx, session, &policy).await?;
            tx.commit().await?;
            println!(
                "Rebuilt session {session} from {} answers.",
                stored.performance.total_questions_answered
            );
        }
        Commands::Simulate {
            course,
            csv,
            seed,
            videos,
        } => {
            let course = load_course(&course)?;
            let answers = tracker::read_answer_log(&csv)
                .with_context(|| format!("failed to read answer log {}", csv.display()))?;
            let feedback = FeedbackLoop::new(&course, &policy);
            let mut rng = rng_from(seed);

            let mut performance = Default::default();
            let mut history = RecentHistory::new();
            let mut last = None;
            for answer in answers.iter() {
                let outcome = feedback.submit_answer(performance, history, answer, &mut rng)?;
                performance = outcome.performance;
                history = outcome.history;
                last = Some((outcome.insights, outcome.selection));
            }

            let Some((insights, selection)) = last else {
                println!("No answers found in {}.", csv.display());
                return Ok(());
            };

            let summary = tracker::summary(&performance, &policy);
            println!(
                "Replayed {} answers: {:.1}% accuracy, {} trophies, {} weak areas.",
                summary.total_questions,
                summary.accuracy * 100.0,
                summary.trophy_score,
                summary.weak_areas_count
            );
            print_insights(&insights);
            print_selection(&selection);

            let picks = recommend_videos(&insights, &performance, &course, videos);
            if !picks.is_empty() {
                println!("Recommended videos:");
                for pick in picks.iter() {
                    println!("- {} (relevance {:.2})", pick.key, pick.relevance);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn load_course(path: &Path) -> anyhow::Result<Course> {
    Course::load(path).with_context(|| format!("failed to load course from {}", path.display()))
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn print_selection(selection: &Selection) {
    println!(
        "Next: {} at {} difficulty (from the {} pool).",
        selection.key, selection.difficulty, selection.pool
    );
}

fn print_insights(insights: &Insights) {
    for message in insights.messages.iter() {
        println!("- {message}");
    }

    if !insights.review.is_empty() {
        println!("Review first:");
        for item in insights.review.iter().take(3) {
            println!("- {} (urgency {:.2})", item.key, item.urgency);
        }
    }

    if !insights.weak_areas.is_empty() {
        println!("Weak areas:");
        for area in insights.weak_areas.iter() {
            println!(
                "- {} {:.0}% across {} attempts",
                area.key,
                area.accuracy * 100.0,
                area.attempts
            );
        }
    }
}
