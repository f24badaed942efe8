//! Teacher timesheet comments: weekly window selection and student-name
//! mention rewriting.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::class_code::shorten_class_code;
use crate::error::ReportError;
use crate::models::{FeedbackEntry, StudentRecord};
use crate::sheet::{Cell, Table};

const DATE: &[&str] = &["Date", "Timestamp"];
const CLASS: &[&str] = &["Class"];
const AUTHOR: &[&str] = &["Your name", "Your Name"];
const COMMENTS: &[&str] = &["Comments", "Comment"];

static QUOTED_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("quoted-fragment pattern is valid"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"];

/// Most recent Sunday on or before `today`.
pub fn week_window_end(today: NaiveDate) -> NaiveDate {
    let days_since_sunday = today.weekday().number_from_monday() % 7;
    today - Duration::days(days_since_sunday as i64)
}

/// `[sunday - 7 days, sunday]`, both ends inclusive.
pub fn week_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = week_window_end(today);
    (end - Duration::days(7), end)
}

pub fn parse_feedback_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Text(text) => {
            let text = text.trim();
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
                .or_else(|| {
                    DATE_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                })
        }
        _ => None,
    }
}

/// Upper-cases the label and folds numeric labels back to class codes.
pub fn normalize_class_label(cell: &Cell) -> String {
    let upper = Cell::Text(cell.to_string().to_uppercase());
    shorten_class_code(&upper).to_string()
}

/// Loads the timesheet export and keeps entries dated inside the reporting
/// week ending on the last Sunday before `today`. A missing file is an empty
/// result.
pub fn load_weekly_feedback(path: &Path, today: NaiveDate) -> anyhow::Result<Vec<FeedbackEntry>> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "timesheet not found; reports will have no feedback");
        return Ok(Vec::new());
    }
    let table = Table::from_path(path)?;
    Ok(weekly_feedback(&table, today)?)
}

pub fn weekly_feedback(table: &Table, today: NaiveDate) -> Result<Vec<FeedbackEntry>, ReportError> {
    let date_col = table.require(DATE, "timesheet")?;
    let class_col = table.require(CLASS, "timesheet")?;
    let author_col = table.require(AUTHOR, "timesheet")?;
    let comment_col = table.require(COMMENTS, "timesheet")?;

    let (start, end) = week_window(today);
    let mut entries = Vec::new();
    let mut undated = 0usize;

    for row in 0..table.rows.len() {
        let Some(date) = parse_feedback_date(table.cell(row, date_col)) else {
            undated += 1;
            continue;
        };
        if date < start || date > end {
            continue;
        }
        entries.push(FeedbackEntry {
            date,
            class_label: normalize_class_label(table.cell(row, class_col)),
            author: table.cell(row, author_col).to_string(),
            comment: table.cell(row, comment_col).to_string(),
        });
    }

    tracing::info!(
        kept = entries.len(),
        undated,
        window_start = %start,
        window_end = %end,
        "weekly feedback selected"
    );
    Ok(entries)
}

/// Replaces each `"fragment"` in `comment` with `"<full name> <main class>"`
/// of the first student in `class_name` whose name contains the fragment,
/// ignoring case. Unmatched fragments keep their quotes.
pub fn resolve_mentions<'a>(
    comment: &str,
    class_name: &str,
    students: &'a [StudentRecord],
) -> (String, Vec<&'a StudentRecord>) {
    let mut resolved = comment.to_string();
    let mut matched = Vec::new();

    let fragments: Vec<&str> = QUOTED_FRAGMENT
        .captures_iter(comment)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    for fragment in fragments {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let found = students.iter().find(|s| {
            s.english_class == class_name && s.full_name.to_lowercase().contains(&needle)
        });
        if let Some(student) = found {
            let replacement = format!("{} {}", student.full_name, student.main_class);
            resolved = resolved.replace(&format!("\"{fragment}\""), &replacement);
            matched.push(student);
        }
    }

    (resolved, matched)
}
