use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

mod calculator;
mod db;
mod metrics;
mod models;
mod report;
mod roster;

use models::Status;

#[derive(Parser)]
#[command(name = "attendance-ledger")]
#[command(about = "Student attendance bookkeeping and percentage calculator", long_about = None)]
struct Cli {
    /// SQLite file holding the roster and calculation history
    #[arg(long, global = true, env = "ATTENDANCE_DB", default_value = "attendance.db")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Replace the roster with the sample roster
    Seed,
    /// Show roster-wide attendance figures and recent activity
    Dashboard,
    /// List students with their attendance
    Students {
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a student to the roster
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        class: String,
    },
    /// Edit a student's details
    EditStudent {
        /// Roster id or student ID
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        class: String,
    },
    /// Remove a student and their records
    DeleteStudent {
        /// Roster id or student ID
        id: String,
    },
    /// Record a status for one student on a date (defaults to today)
    Mark {
        /// Roster id or student ID
        id: String,
        status: Status,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Mark every student present on a date (defaults to today)
    MarkAllPresent {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show who has been marked on a date (defaults to today)
    Sheet {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate a markdown attendance report
    Report {
        #[arg(long, value_enum)]
        sort: Option<report::SortColumn>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export the roster as CSV
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import attendance records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Calculate an attendance percentage and keep it in the history
    Calc {
        #[arg(allow_hyphen_values = true)]
        attended: String,
        #[arg(allow_hyphen_values = true)]
        total: String,
    },
    /// Check a percentage without recording it
    Preview {
        #[arg(allow_hyphen_values = true)]
        attended: String,
        #[arg(allow_hyphen_values = true)]
        total: String,
    },
    /// Show recent calculations
    History,
    /// Forget all recent calculations
    ClearHistory {
        /// Confirm clearing the history
        #[arg(long)]
        yes: bool,
    },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let pool = db::connect(&cli.db).await?;
    db::init_db(&pool).await.context("failed to prepare schema")?;

    match cli.command {
        Commands::InitDb => {
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Sample roster loaded.");
        }
        Commands::Dashboard => {
            let state = db::load_state(&pool).await;
            let summary = report::dashboard(&state.students);

            println!("Students:            {}", summary.total_students);
            println!(
                "Average attendance:  {}",
                report::format_percentage(summary.average_percentage)
            );
            println!(
                "Below {}%:           {}",
                metrics::LOW_ATTENDANCE_THRESHOLD,
                summary.low_attendance_count
            );
            println!("Records:             {}", summary.total_records);

            let recent = metrics::recent_attendance(&state.students, 5);
            println!();
            if recent.is_empty() {
                println!("No recent attendance records.");
            } else {
                println!("Recent activity:");
                for activity in recent.iter() {
                    println!(
                        "- {} ({}, {}) {} {}",
                        activity.student_name,
                        activity.external_id,
                        activity.class_name,
                        activity.date.format("%b %-d, %Y"),
                        activity.status
                    );
                }
            }
        }
        Commands::Students { search } => {
            let state = db::load_state(&pool).await;
            let students = state.search(search.as_deref().unwrap_or(""));

            if students.is_empty() {
                println!("No students found.");
                return Ok(());
            }

            for student in students {
                let row = report::report_row(student);
                println!(
                    "- {} [{}] {} ({}) {} {}: {} days, {} present, {} absent, {} late",
                    row.name,
                    student.id,
                    row.external_id,
                    row.class_name,
                    report::format_percentage(row.percentage),
                    row.tier,
                    row.stats.total,
                    row.stats.present,
                    row.stats.absent,
                    row.stats.late
                );
            }
        }
        Commands::AddStudent {
            name,
            student_id,
            class,
        } => {
            let mut state = db::load_state(&pool).await;
            let id = state.add_student(&name, &student_id, &class)?.id.clone();
            db::persist(&pool, &state).await;
            println!("Student added ({id}).");
        }
        Commands::EditStudent {
            id,
            name,
            student_id,
            class,
        } => {
            let mut state = db::load_state(&pool).await;
            let id = state.resolve_id(&id).unwrap_or(id);
            if state.update_student(&id, &name, &student_id, &class)? {
                db::persist(&pool, &state).await;
                println!("Student updated.");
            } else {
                println!("No student with id {id}.");
            }
        }
        Commands::DeleteStudent { id } => {
            let mut state = db::load_state(&pool).await;
            let id = state.resolve_id(&id).unwrap_or(id);
            if state.delete_student(&id) {
                db::persist(&pool, &state).await;
                println!("Student deleted.");
            } else {
                println!("No student with id {id}.");
            }
        }
        Commands::Mark { id, status, date } => {
            let date = date.unwrap_or_else(today);
            let mut state = db::load_state(&pool).await;
            let id = state.resolve_id(&id).unwrap_or(id);
            if state.mark_attendance(&id, date, status) {
                db::persist(&pool, &state).await;
                println!("Attendance marked as {status} on {date}.");
            } else {
                println!("No student with id {id}.");
            }
        }
        Commands::MarkAllPresent { date } => {
            let date = date.unwrap_or_else(today);
            let mut state = db::load_state(&pool).await;
            let marked = state.mark_all_present(date);
            db::persist(&pool, &state).await;
            println!("Marked {marked} students present on {date}.");
        }
        Commands::Sheet { date } => {
            let date = date.unwrap_or_else(today);
            let state = db::load_state(&pool).await;

            if state.students.is_empty() {
                println!("No students to mark attendance for.");
                return Ok(());
            }

            println!("Attendance for {date}:");
            for student in state.students.iter() {
                let status = roster::record_for(student, date)
                    .map(|status| status.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "- {} [{}] {} ({}): {}",
                    student.name, student.id, student.external_id, student.class_name, status
                );
            }
        }
        Commands::Report { sort, desc, out } => {
            let state = db::load_state(&pool).await;
            let report = report::build_report(today(), &state.students, sort, !desc);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out } => {
            let state = db::load_state(&pool).await;
            let out = out.unwrap_or_else(|| PathBuf::from(report::export_file_name(today())));
            let mut buffer = Vec::new();
            report::export_csv(&state.students, &mut buffer)?;
            std::fs::write(&out, buffer)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report exported to {}.", out.display());
        }
        Commands::Import { csv } => {
            let mut state = db::load_state(&pool).await;
            let written = db::import_csv(&mut state, &csv)?;
            db::persist(&pool, &state).await;
            println!("Imported {written} records from {}.", csv.display());
        }
        Commands::Calc { attended, total } => {
            let mut state = db::load_state(&pool).await;
            match calculator::evaluate(&mut state.history, &attended, &total) {
                Ok(outcome) => {
                    db::persist(&pool, &state).await;
                    println!(
                        "{} ({}): {} out of {} classes attended",
                        report::format_percentage(outcome.percentage),
                        outcome.tier,
                        attended.trim(),
                        total.trim()
                    );
                }
                Err(errors) => {
                    if let Some(error) = errors.attended {
                        println!("attended: {error}");
                    }
                    if let Some(error) = errors.total {
                        println!("total: {error}");
                    }
                    anyhow::bail!("please fix the errors above");
                }
            }
        }
        Commands::Preview { attended, total } => {
            match calculator::preview_percentage(&attended, &total) {
                Some(percentage) => println!(
                    "{} ({})",
                    report::format_percentage(percentage),
                    metrics::classify(percentage)
                ),
                None => println!("--% (invalid input)"),
            }
        }
        Commands::History => {
            let state = db::load_state(&pool).await;

            if state.history.is_empty() {
                println!("No recent calculations.");
                return Ok(());
            }

            for entry in state.history.entries() {
                println!(
                    "- {}/{} = {} ({}) at {}",
                    entry.attended,
                    entry.total,
                    report::format_percentage(entry.percentage),
                    metrics::classify(entry.percentage),
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::ClearHistory { yes } => {
            anyhow::ensure!(yes, "pass --yes to clear all calculation history");
            let mut state = db::load_state(&pool).await;
            state.history.clear();
            db::persist(&pool, &state).await;
            println!("Calculation history cleared.");
        }
    }

    Ok(())
}
