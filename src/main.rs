use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

mod class_code;
mod coerce;
mod config;
mod error;
mod feedback;
mod logging;
mod models;
mod pipeline;
mod report;
mod roster;
mod sheet;
mod stats;
mod status;
mod template;

use config::{AppConfig, Grade};
use error::ReportError;
use logging::LogFormat;
use models::GradeStats;
use pipeline::{GradeRequest, ReferenceData};
use status::WeeklyTargets;

#[derive(Parser)]
#[command(name = "pct-reports")]
#[command(about = "Weekly student progress reports for the PCT English program", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, env = "LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
    /// TOML file overriding the built-in per-grade settings
    #[arg(long, global = true, env = "PCT_CONFIG")]
    config: Option<PathBuf>,
    /// Directory holding syllabus books, student lists and the Word template
    #[arg(long, global = true, env = "PCT_STATIC_DIR", default_value = ".")]
    static_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every class report for one grade
    Generate {
        #[arg(long, value_enum)]
        grade: Grade,
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        week: i64,
        /// Lessons an IELTS student should have passed by now
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        target_ielts: i64,
        /// Lessons a VSTEP student should have passed by now
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        target_vstep: i64,
        /// Progress export from the learning platform (.xlsx or .csv)
        #[arg(long)]
        progress: PathBuf,
        /// Teacher feedback timesheet
        #[arg(long)]
        timesheet: Option<PathBuf>,
        #[arg(long, default_value = "output")]
        out_root: PathBuf,
        /// Exact output directory; overrides --out-root
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the stats JSON here
        #[arg(long)]
        stats_out: Option<PathBuf>,
        /// Comma-separated class list; overrides the configured one
        #[arg(long, value_delimiter = ',')]
        classes: Vec<String>,
        #[arg(long)]
        total_ielts: Option<i64>,
        #[arg(long)]
        total_vstep: Option<i64>,
        /// Report date, YYYY-MM-DD; defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Print dashboard stats without writing reports
    Stats {
        #[arg(long, value_enum)]
        grade: Grade,
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        target_ielts: i64,
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        target_vstep: i64,
        #[arg(long)]
        progress: PathBuf,
    },
    /// Print last week's teacher feedback
    Feedback {
        #[arg(long)]
        timesheet: PathBuf,
        /// Only entries whose class field mentions this class
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Serialize)]
struct RunSummary {
    reports: Vec<String>,
    week: i64,
    stats: Option<GradeStats>,
    message: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(ReportError::Schema { column, origin, .. }) = err.downcast_ref::<ReportError>() {
                eprintln!(
                    "The {origin} is missing the '{column}' column. Check that the right file was uploaded."
                );
            } else {
                eprintln!("Error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let app_config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            grade,
            week,
            target_ielts,
            target_vstep,
            progress,
            timesheet,
            out_root,
            out,
            stats_out,
            classes,
            total_ielts,
            total_vstep,
            today,
        } => {
            let mut grade_config = app_config.grade(grade).clone();
            if !classes.is_empty() {
                grade_config.classes = classes;
            }
            if let Some(total) = total_ielts {
                grade_config.total_ielts = total;
            }
            if let Some(total) = total_vstep {
                grade_config.total_vstep = total;
            }

            let reference = ReferenceData::load(&cli.static_dir, grade, &grade_config);
            let request = GradeRequest {
                grade,
                week,
                targets: WeeklyTargets {
                    ielts: target_ielts,
                    vstep: target_vstep,
                },
                totals: grade_config.totals(),
                classes: grade_config.classes.clone(),
                course_ielts: grade_config.course_ielts.clone(),
                course_vstep: grade_config.course_vstep.clone(),
                progress_path: progress,
                timesheet_path: timesheet,
                output_dir: out
                    .unwrap_or_else(|| pipeline::default_output_dir(&out_root, grade, week)),
                today: today.unwrap_or_else(|| chrono::Local::now().date_naive()),
            };

            let outcome = pipeline::generate_grade_reports(&reference, &request)?;

            if let Some(path) = stats_out {
                write_json(&path, &outcome.stats)?;
            }

            let reports: Vec<String> = outcome
                .reports
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect();
            let message = if reports.is_empty() {
                format!("No reports generated for grade {}", grade.number())
            } else {
                format!(
                    "Generated {} report(s) for grade {}, week {week}",
                    reports.len(),
                    grade.number()
                )
            };
            print_json(&RunSummary {
                reports,
                week,
                stats: outcome.stats,
                message,
            })?;
        }
        Commands::Stats {
            grade,
            target_ielts,
            target_vstep,
            progress,
        } => {
            let reference = ReferenceData::load(&cli.static_dir, grade, app_config.grade(grade));
            let records = pipeline::classified_records(
                &progress,
                &reference,
                WeeklyTargets {
                    ielts: target_ielts,
                    vstep: target_vstep,
                },
            )?;
            print_json(&stats::aggregate(&records))?;
        }
        Commands::Feedback {
            timesheet,
            class,
            today,
        } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let mut entries = feedback::load_weekly_feedback(&timesheet, today)?;
            if let Some(class) = class {
                let class = class.trim().to_uppercase();
                entries.retain(|e| e.class_label.contains(&class));
            }
            entries.sort_by_key(|e| e.date);
            print_json(&entries)?;
        }
    }

    Ok(())
}

/// JSON with every non-finite number replaced by `null`.
fn sanitize_json<T: Serialize>(value: &T) -> anyhow::Result<Value> {
    let value = serde_json::to_value(value).context("failed to serialize output")?;
    Ok(scrub(value))
}

fn scrub(value: Value) -> Value {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|f| !f.is_finite()) => Value::Null,
        Value::Array(items) => Value::Array(items.into_iter().map(scrub).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, scrub(v))).collect()),
        other => other,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&sanitize_json(value)?)?);
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(&sanitize_json(value)?)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
