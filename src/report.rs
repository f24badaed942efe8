//! Per-class Word report assembly.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use docx_rs::AlignmentType;

use crate::class_code::infer_class_type;
use crate::feedback::resolve_mentions;
use crate::models::{ClassSession, ClassType, FeedbackEntry, Status, StudentRecord, SyllabusEntry};
use crate::status::{average_minutes, WeeklyTargets};
use crate::template::ReportDocument;

const CLASS_HEADER_TABLE: usize = 1;
const SESSION_TABLE: usize = 2;
const FEEDBACK_TABLE: usize = 3;
const FAR_AWAY_TABLE: usize = 4;
const KEEP_UP_TABLE: usize = 5;
const LATE_TABLE: usize = 6;
const WARNING_TABLE: usize = 7;

const SESSION_TIME_COL: usize = 2;
const SESSION_TEACHER_COL: usize = 3;
const SYLLABUS_NAME_COL: usize = 4;
const SYLLABUS_FOCUS_COL: usize = 5;

const SYLLABUS_ROWS: usize = 3;
const LOW_ENGAGEMENT_MINUTES: f64 = 10.0;

const COMPLETION_MARKER: &str = "Tổng số bài học cho đến thời điểm báo cáo:";
const FEEDBACK_MARKER: &str = "Tóm tắt tình hình lớp:";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LessonTotals {
    pub ielts: i64,
    pub vstep: i64,
}

/// Everything a report needs besides the students and feedback.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub week: i64,
    pub targets: WeeklyTargets,
    pub totals: LessonTotals,
    pub course_ielts: &'a str,
    pub course_vstep: &'a str,
    pub today: NaiveDate,
    pub template_path: &'a Path,
    pub output_dir: &'a Path,
    pub ielts_syllabus: &'a [SyllabusEntry],
    pub vstep_syllabus: &'a [SyllabusEntry],
    pub sessions: &'a [ClassSession],
}

pub fn report_file_name(week: i64, class_name: &str) -> String {
    format!("W{week}-PCT-Report-{class_name}.docx")
}

/// `"<target>/<total> (<pct>%)"`, two decimals.
pub fn completion_text(target: i64, total: i64) -> String {
    let percentage = if total == 0 {
        0.0
    } else {
        target as f64 / total as f64 * 100.0
    };
    format!("{target}/{total} ({percentage:.2}%)")
}

/// Builds and saves one class report. `None` when the template is missing or
/// the document cannot be written; single-row failures are logged and skipped.
pub fn assemble(
    class_name: &str,
    ctx: &ReportContext<'_>,
    records: &[StudentRecord],
    feedback: &[FeedbackEntry],
) -> Option<PathBuf> {
    let mut doc = match ReportDocument::open(ctx.template_path) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::error!(class = class_name, error = %e, "cannot open report template");
            return None;
        }
    };

    let class_type = infer_class_type(class_name);
    let (target, total, course, syllabus) = match class_type {
        ClassType::Ielts => (
            ctx.targets.ielts,
            ctx.totals.ielts,
            ctx.course_ielts,
            ctx.ielts_syllabus,
        ),
        _ => (
            ctx.targets.vstep,
            ctx.totals.vstep,
            ctx.course_vstep,
            ctx.vstep_syllabus,
        ),
    };
    let week_syllabus: Vec<&SyllabusEntry> = syllabus
        .iter()
        .filter(|s| s.week == ctx.week)
        .take(SYLLABUS_ROWS)
        .collect();

    doc.append_to_paragraphs(COMPLETION_MARKER, &completion_text(target, total));

    let date = ctx.today.format("%d-%m-%Y").to_string();
    for (row, value) in [class_name, course, date.as_str()].into_iter().enumerate() {
        log_failure(
            class_name,
            "class header",
            doc.set_cell(CLASS_HEADER_TABLE, row, 2, value, Some(AlignmentType::Right)),
        );
    }
    log_failure(
        class_name,
        "week number",
        doc.set_cell(
            SESSION_TABLE,
            1,
            0,
            &ctx.week.to_string(),
            Some(AlignmentType::Center),
        ),
    );

    let data_rows = doc.row_count(SESSION_TABLE).unwrap_or(0);
    for (row, session) in (1..data_rows).zip(ctx.sessions.iter()) {
        tracing::debug!(class = class_name, session = %session.session, row, "session row");
        log_failure(
            class_name,
            "session time",
            doc.set_cell(SESSION_TABLE, row, SESSION_TIME_COL, &session.time, None),
        );
        log_failure(
            class_name,
            "session teacher",
            doc.set_cell(SESSION_TABLE, row, SESSION_TEACHER_COL, &session.teacher, None),
        );
    }
    for (row, entry) in (1..data_rows).zip(week_syllabus.iter()) {
        log_failure(
            class_name,
            "syllabus name",
            doc.set_cell(SESSION_TABLE, row, SYLLABUS_NAME_COL, &entry.name, None),
        );
        log_failure(
            class_name,
            "syllabus focus",
            doc.set_cell(SESSION_TABLE, row, SYLLABUS_FOCUS_COL, &entry.skill_focus, None),
        );
    }

    let students: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| r.english_class == class_name)
        .collect();

    for (status, table) in [
        (Status::FarAway, FAR_AWAY_TABLE),
        (Status::KeepUp, KEEP_UP_TABLE),
        (Status::Late, LATE_TABLE),
    ] {
        let bucket = status_bucket(&students, status);
        add_student_rows(&mut doc, table, class_name, &bucket);
    }

    if doc.table_count() > WARNING_TABLE {
        add_warning_rows(&mut doc, class_name, &low_engagement(&students));
    } else {
        tracing::debug!(class = class_name, "template has no warning table");
    }

    if doc.has_paragraph(FEEDBACK_MARKER) {
        add_feedback_rows(&mut doc, class_name, feedback, records);
    }

    let path = ctx.output_dir.join(report_file_name(ctx.week, class_name));
    match doc.save(&path) {
        Ok(()) => {
            tracing::info!(class = class_name, path = %path.display(), students = students.len(), "report written");
            Some(path)
        }
        Err(e) => {
            tracing::error!(class = class_name, error = %e, "report not saved");
            None
        }
    }
}

fn log_failure(class_name: &str, what: &str, result: Result<(), crate::error::ReportError>) {
    if let Err(e) = result {
        tracing::warn!(class = class_name, field = what, error = %e, "template cell skipped");
    }
}

/// Students with `status`, most lessons passed first; non-numeric counts sort last.
pub fn status_bucket<'a>(students: &[&'a StudentRecord], status: Status) -> Vec<&'a StudentRecord> {
    let mut bucket: Vec<&StudentRecord> = students
        .iter()
        .copied()
        .filter(|s| s.status == status)
        .collect();
    bucket.sort_by(|a, b| {
        match (a.lessons_passed.as_number(), b.lessons_passed.as_number()) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    bucket
}

/// Students averaging under ten minutes per lesson, lowest first.
pub fn low_engagement<'a>(students: &[&'a StudentRecord]) -> Vec<(&'a StudentRecord, f64)> {
    let mut flagged: Vec<(&StudentRecord, f64)> = students
        .iter()
        .filter_map(|s| {
            average_minutes(&s.average_time_per_lesson)
                .filter(|m| *m < LOW_ENGAGEMENT_MINUTES)
                .map(|m| (*s, m))
        })
        .collect();
    flagged.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    flagged
}

fn add_student_rows(
    doc: &mut ReportDocument,
    table: usize,
    class_name: &str,
    students: &[&StudentRecord],
) {
    let mut counter = 1;
    for student in students {
        let values = vec![
            counter.to_string(),
            na_if_empty(&student.full_name),
            na_if_empty(&student.main_class),
            student.progress.display_or_na(),
            student.study_time.display_or_na(),
            student.lessons_passed.display_or_na(),
            student.lessons_studied.display_or_na(),
            na_if_empty(&student.average_time_per_lesson),
        ];
        match doc.append_row(table, &values) {
            Ok(()) => counter += 1,
            Err(e) => tracing::warn!(
                class = class_name,
                table,
                student = %student.full_name,
                error = %e,
                "student row skipped"
            ),
        }
    }
}

fn add_warning_rows(doc: &mut ReportDocument, class_name: &str, flagged: &[(&StudentRecord, f64)]) {
    let mut counter = 1;
    for (student, _) in flagged {
        let values = vec![
            counter.to_string(),
            student.full_name.clone(),
            na_if_empty(&student.main_class),
            format!(
                "Thời gian trung bình làm bài quá ngắn ({})",
                student.average_time_per_lesson
            ),
        ];
        match doc.append_row(WARNING_TABLE, &values) {
            Ok(()) => counter += 1,
            Err(e) => tracing::warn!(
                class = class_name,
                student = %student.full_name,
                error = %e,
                "warning row skipped"
            ),
        }
    }
}

fn add_feedback_rows(
    doc: &mut ReportDocument,
    class_name: &str,
    feedback: &[FeedbackEntry],
    records: &[StudentRecord],
) {
    let mut entries: Vec<&FeedbackEntry> = feedback
        .iter()
        .filter(|f| f.class_label.contains(class_name))
        .collect();
    entries.sort_by_key(|f| f.date);

    let mut counter = 1;
    for entry in entries {
        let (comment, matched) = resolve_mentions(&entry.comment, class_name, records);
        if !matched.is_empty() {
            tracing::debug!(class = class_name, mentions = matched.len(), "feedback mentions resolved");
        }
        let values = vec![counter.to_string(), entry.author.clone(), comment];
        match doc.append_row(FEEDBACK_TABLE, &values) {
            Ok(()) => counter += 1,
            Err(e) => tracing::warn!(class = class_name, error = %e, "feedback row skipped"),
        }
    }
}

fn na_if_empty(value: &str) -> String {
    if value.is_empty() {
        "N/A".to_string()
    } else {
        value.to_string()
    }
}
