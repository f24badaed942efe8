//! Per-grade orchestration: reference data, merge, classification,
//! feedback, report documents and dashboard stats.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::class_code::shorten_class_code;
use crate::config::{Grade, GradeConfig};
use crate::feedback;
use crate::models::{ClassSession, GradeStats, StudentRecord, SyllabusEntry};
use crate::report::{self, LessonTotals, ReportContext};
use crate::roster::{self, ENGLISH_CLASS};
use crate::sheet::Table;
use crate::stats;
use crate::status::{self, WeeklyTargets};
use crate::template;

const SYLLABUS_WEEK: &[&str] = &["Week"];
const SYLLABUS_NAME: &[&str] = &["Name"];
const SYLLABUS_FOCUS: &[&str] = &["Skill Focus", "Skill_Focus"];

/// Static inputs loaded once and handed to each run. Nothing here is
/// mutated by report generation.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub roster: Table,
    pub ielts_syllabus: Vec<SyllabusEntry>,
    pub vstep_syllabus: Vec<SyllabusEntry>,
    pub sessions: BTreeMap<String, Vec<ClassSession>>,
    pub template_path: Option<PathBuf>,
}

impl ReferenceData {
    /// Reads `StudentList<g>.xlsx`, both syllabus books and the template
    /// location from `static_dir`. Unreadable files are logged and replaced
    /// by empty data.
    pub fn load(static_dir: &Path, grade: Grade, config: &GradeConfig) -> Self {
        let g = grade.number();
        let mut roster = load_or_empty(&static_dir.join(format!("StudentList{g}.xlsx")));
        if let Some(col) = roster.resolve(ENGLISH_CLASS) {
            roster.map_column(col, shorten_class_code);
        }

        Self {
            roster,
            ielts_syllabus: syllabus_entries(&load_or_empty(
                &static_dir.join(format!("IELTS_syllabus_{g}.xlsx")),
            )),
            vstep_syllabus: syllabus_entries(&load_or_empty(
                &static_dir.join(format!("VSTEP_syllabus_{g}.xlsx")),
            )),
            sessions: config.sessions_by_class(),
            template_path: template::locate(static_dir),
        }
    }
}

fn load_or_empty(path: &Path) -> Table {
    match Table::from_path(path) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "reference file unavailable");
            Table::default()
        }
    }
}

/// Syllabus rows with a numeric week and non-missing name and focus.
pub fn syllabus_entries(table: &Table) -> Vec<SyllabusEntry> {
    let (Some(week), Some(name), Some(focus)) = (
        table.resolve(SYLLABUS_WEEK),
        table.resolve(SYLLABUS_NAME),
        table.resolve(SYLLABUS_FOCUS),
    ) else {
        if !table.headers.is_empty() {
            tracing::warn!(columns = ?table.headers, "syllabus lacks Week/Name/Skill Focus");
        }
        return Vec::new();
    };

    (0..table.rows.len())
        .filter_map(|row| {
            let week_value = table.cell(row, week).as_number()?;
            let name_cell = table.cell(row, name);
            let focus_cell = table.cell(row, focus);
            if name_cell.is_missing() || focus_cell.is_missing() || week_value.fract() != 0.0 {
                return None;
            }
            Some(SyllabusEntry {
                week: week_value as i64,
                name: name_cell.to_string(),
                skill_focus: focus_cell.to_string(),
            })
        })
        .collect()
}

/// Numeric parameters and paths for one grade's run.
#[derive(Debug, Clone)]
pub struct GradeRequest {
    pub grade: Grade,
    pub week: i64,
    pub targets: WeeklyTargets,
    pub totals: LessonTotals,
    pub classes: Vec<String>,
    pub course_ielts: String,
    pub course_vstep: String,
    pub progress_path: PathBuf,
    pub timesheet_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeOutcome {
    pub reports: Vec<PathBuf>,
    pub stats: Option<GradeStats>,
}

pub fn default_output_dir(root: &Path, grade: Grade, week: i64) -> PathBuf {
    let g = grade.number();
    root.join(format!("Grade_{g}")).join(format!("Grade_{g}_Week {week}"))
}

/// Merged, classified records for one progress export.
pub fn classified_records(
    progress_path: &Path,
    reference: &ReferenceData,
    targets: WeeklyTargets,
) -> anyhow::Result<Vec<StudentRecord>> {
    let export = Table::from_path(progress_path)
        .with_context(|| format!("failed to load progress export {}", progress_path.display()))?;
    let mut records = roster::merge(&export, &reference.roster)?;
    status::apply(&mut records, targets);
    Ok(records)
}

/// Runs the whole batch for one grade. Only schema problems and unreadable
/// uploads are errors; a failed report is skipped and stats may be `None`.
pub fn generate_grade_reports(
    reference: &ReferenceData,
    request: &GradeRequest,
) -> anyhow::Result<GradeOutcome> {
    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "grade_run",
        %run_id,
        grade = request.grade.number(),
        week = request.week
    );
    let _guard = span.enter();

    std::fs::create_dir_all(&request.output_dir).with_context(|| {
        format!("failed to create output directory {}", request.output_dir.display())
    })?;

    let records = classified_records(&request.progress_path, reference, request.targets)?;

    let weekly_feedback = match &request.timesheet_path {
        Some(path) => feedback::load_weekly_feedback(path, request.today)?,
        None => Vec::new(),
    };

    let stats = stats::aggregate(&records);

    let no_sessions: Vec<ClassSession> = Vec::new();
    // With no template located, `assemble` reports the default name as missing.
    let fallback_template = PathBuf::from(template::TEMPLATE_CANDIDATES[1]);
    let template_path = reference
        .template_path
        .as_deref()
        .unwrap_or(fallback_template.as_path());

    let mut reports = Vec::new();
    for class_name in &request.classes {
        let sessions = match reference.sessions.get(class_name) {
            Some(sessions) => sessions,
            None => {
                tracing::warn!(
                    class = %class_name,
                    "class has no session config; report will lack session details"
                );
                &no_sessions
            }
        };
        let ctx = ReportContext {
            week: request.week,
            targets: request.targets,
            totals: request.totals,
            course_ielts: &request.course_ielts,
            course_vstep: &request.course_vstep,
            today: request.today,
            template_path,
            output_dir: &request.output_dir,
            ielts_syllabus: &reference.ielts_syllabus,
            vstep_syllabus: &reference.vstep_syllabus,
            sessions,
        };
        if let Some(path) = report::assemble(class_name, &ctx, &records, &weekly_feedback) {
            reports.push(path);
        }
    }

    tracing::info!(
        reports = reports.len(),
        classes = request.classes.len(),
        stats = stats.is_some(),
        "grade run finished"
    );
    Ok(GradeOutcome { reports, stats })
}
