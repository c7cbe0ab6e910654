use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use faculty_evaluation::db::{self, PgStore};
use faculty_evaluation::models::SkippedRecord;
use faculty_evaluation::store::{self, StateStore};
use faculty_evaluation::{catalog, report};

mod config;

use config::StoreConfig;

#[derive(Parser)]
#[command(name = "faculty-evaluation")]
#[command(about = "Teacher evaluation surveys: roster import and results publication", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Install the default factors, questions and weights where missing
    Seed,
    /// Merge an academic schedule export (CSV or JSON) into the roster
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Open the evaluation survey for a period
    Open {
        #[arg(long)]
        period: String,
    },
    /// Close the evaluation survey for a period
    Close {
        #[arg(long)]
        period: String,
    },
    /// Record a survey response from a JSON submission
    Submit {
        #[arg(long)]
        file: PathBuf,
    },
    /// Aggregate and publish the results of a period
    Publish {
        #[arg(long)]
        period: String,
    },
    /// Show evaluation and publication status
    Status {
        #[arg(long)]
        period: Option<String>,
    },
    /// List a student's courses in a period and whether each was evaluated
    Courses {
        #[arg(long)]
        student: String,
        #[arg(long)]
        period: String,
    },
    /// Write a markdown report of a period's published results
    Report {
        #[arg(long)]
        period: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_skipped(skipped: &[SkippedRecord]) {
    if skipped.is_empty() {
        return;
    }
    println!("{} answers or responses were left out:", skipped.len());
    for record in skipped {
        println!(
            "- response {} (student {}, teacher {}, course {}): {}",
            record.response_id, record.student_id, record.teacher_id, record.course_id, record.reason
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter(
            std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV)
                .ok()
                .as_deref(),
        ))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let pool = cli.store.connect().await?;
    let attempts = cli.store.save_attempts.max(1);

    let state_store = PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            if store::update(&state_store, attempts, catalog::seed).await? {
                println!("Default catalog installed.");
            } else {
                println!("Catalog already present.");
            }
        }
        Commands::Import { file } => {
            let rows = db::read_import_file(&file)?;
            let stats = store::update(&state_store, attempts, |state| state.import(&rows)).await?;
            println!(
                "Imported {} rows from {}: {} students, {} teachers, {} courses, {} periods, {} enrollments added.",
                rows.len(),
                file.display(),
                stats.students_count,
                stats.teachers_count,
                stats.courses_count,
                stats.periods_count,
                stats.relations_count
            );
        }
        Commands::Open { period } => {
            store::update(&state_store, attempts, |state| {
                state.set_evaluation_open(&period, true)
            })
            .await?;
            println!("Evaluation open for {period}.");
        }
        Commands::Close { period } => {
            store::update(&state_store, attempts, |state| {
                state.set_evaluation_open(&period, false)
            })
            .await?;
            println!("Evaluation closed for {period}.");
        }
        Commands::Submit { file } => {
            let submission = db::read_submission(&file)?;
            let current = state_store.load().await?;
            if !current.is_evaluation_open(&submission.period_id) {
                anyhow::bail!(
                    "the evaluation is not open for period {}",
                    submission.period_id
                );
            }
            let record = submission
                .into_record(&current.questions)
                .with_context(|| format!("rejected submission {}", file.display()))?;
            let id = record.id;
            store::update(&state_store, attempts, |state| {
                state.record_response(record.clone())
            })
            .await?;
            println!("Recorded response {id}.");
        }
        Commands::Publish { period } => {
            let outcome = store::update(&state_store, attempts, |state| state.publish(&period)).await?;
            println!(
                "{} results for {} teachers in {}.",
                if outcome.republished { "Republished" } else { "Published" },
                outcome.teachers,
                outcome.period
            );
            print_skipped(&outcome.skipped);
        }
        Commands::Status { period } => {
            let state = state_store.load().await?;
            let periods: Vec<String> = match period {
                Some(period) => vec![period],
                None => state.roster.periods.iter().map(|p| p.id.clone()).collect(),
            };

            println!(
                "Current period: {}",
                state.current_period.as_deref().unwrap_or("none")
            );
            println!(
                "{} students, {} teachers, {} courses, {} enrollments, {} responses.",
                state.roster.students.len(),
                state.roster.teachers.len(),
                state.roster.courses.len(),
                state.roster.enrollments.len(),
                state.responses.len()
            );
            for period in periods {
                let period_state = state.period_state(&period);
                println!(
                    "- {}: evaluation {}, results {}",
                    period,
                    if period_state.evaluation_open { "open" } else { "closed" },
                    period_state.publication()
                );
            }
        }
        Commands::Courses { student, period } => {
            let state = state_store.load().await?;
            let courses = state
                .roster
                .student_courses(&student, &period, &state.responses);

            if courses.is_empty() {
                let enrolled: Vec<&str> = state
                    .roster
                    .student_periods(&student)
                    .iter()
                    .map(|period| period.id.as_str())
                    .collect();
                println!("No courses for student {student} in {period}.");
                if !enrolled.is_empty() {
                    println!("Enrolled in: {}.", enrolled.join(", "));
                }
                return Ok(());
            }

            println!("Courses for student {student} in {period}:");
            for course in courses {
                println!(
                    "- {} [{}] with {} ({})",
                    course.course_name,
                    course.group,
                    course.teacher_name,
                    if course.evaluated { "evaluated" } else { "pending" }
                );
            }
        }
        Commands::Report { period, out } => {
            let state = state_store.load().await?;
            let report = report::build_report(
                &period,
                state.period_state(&period),
                state.snapshot(&period),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
