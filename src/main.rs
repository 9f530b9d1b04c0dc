use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use uuid::Uuid;

mod config;
mod db;
mod error;
mod grading;
mod models;
mod notify;
mod report;

use crate::config::Config;
use crate::grading::display_grade;
use crate::models::{Component, GradeUpdate};

#[derive(Parser)]
#[command(name = "academic-grades")]
#[command(about = "Grade entry, status classification and class summaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Enroll the demo roster
    Seed,
    /// Apply grade updates from a CSV file, in file order
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Set or clear one component score for a student
    Update {
        #[arg(long)]
        student: String,
        #[arg(long = "class")]
        class_id: String,
        #[arg(long)]
        semester: String,
        /// np1, np2, ava or pim
        #[arg(long)]
        component: Component,
        /// Score between 0 and 10; an empty string clears the component
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },
    /// Print class statistics
    Summary {
        #[arg(long = "class")]
        class_id: Option<String>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long = "class")]
        class_id: Option<String>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List a student's notifications, newest first
    Notifications {
        #[arg(long)]
        student: String,
        /// Only show notifications not yet read
        #[arg(long)]
        unread: bool,
    },
    /// Mark one of a student's notifications as read
    MarkRead {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        student: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("academic_grades=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    info!(max_connections = config.max_connections, "connected to Postgres");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let applied = db::import_csv(&pool, &csv).await?;
            println!("Applied {applied} grade updates from {}.", csv.display());
        }
        Commands::Update {
            student,
            class_id,
            semester,
            component,
            value,
        } => {
            let value = grading::parse_score_input(component, &value)?;
            let update = GradeUpdate {
                student_id: student,
                class_id,
                semester,
                grade_type: component,
                value,
            };
            let record = db::apply_update(&pool, &update).await?;
            println!(
                "{} ({}, {}): NP1 {} | NP2 {} | AVA {} | PIM {} -> final {} [{}]",
                record.student_id,
                record.class_id,
                record.semester,
                display_grade(record.np1),
                display_grade(record.np2),
                display_grade(record.ava),
                display_grade(record.pim),
                display_grade(record.final_grade()),
                record.status().label()
            );
        }
        Commands::Summary {
            class_id,
            semester,
            json,
        } => {
            let records =
                db::fetch_grades(&pool, class_id.as_deref(), semester.as_deref()).await?;
            let summary = grading::summarize(&records);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            if records.is_empty() {
                println!("No grade records found for this scope.");
                return Ok(());
            }

            println!("Students: {}", summary.total_students);
            if summary.highest.is_some() {
                println!("Average: {}", display_grade(Some(summary.average)));
                println!("Highest: {}", display_grade(summary.highest));
                println!("Lowest: {}", display_grade(summary.lowest));
            } else {
                println!("No final grades recorded yet.");
            }
            println!(
                "Approved: {} ({}% of graded records)",
                summary.approved_count, summary.approval_rate
            );
        }
        Commands::Report {
            class_id,
            semester,
            out,
        } => {
            let records =
                db::fetch_grades(&pool, class_id.as_deref(), semester.as_deref()).await?;
            let scope = match (class_id.as_deref(), semester.as_deref()) {
                (Some(class_id), Some(semester)) => Some(format!("{class_id} ({semester})")),
                (Some(class_id), None) => Some(class_id.to_string()),
                (None, Some(semester)) => Some(format!("all classes ({semester})")),
                (None, None) => None,
            };
            let report = report::build_report(scope.as_deref(), chrono::Utc::now(), &records);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Notifications { student, unread } => {
            let notifications = db::fetch_notifications(&pool, &student, unread).await?;
            if notifications.is_empty() {
                println!("No notifications for {student}.");
                return Ok(());
            }
            for notification in &notifications {
                println!("{}", notify::render_line(notification));
            }
        }
        Commands::MarkRead { id, student } => {
            db::mark_read(&pool, id, &student).await?;
            println!("Notification {id} marked as read.");
        }
    }

    Ok(())
}
