//! Joins the weekly progress export against the static student roster.

use std::collections::HashMap;

use crate::error::ReportError;
use crate::models::{ClassType, Status, StudentRecord};
use crate::sheet::{Cell, Table};

pub const USER_ID: &[&str] = &["User ID"];
pub const EXPORT_STATUS: &[&str] = &["Status"];
pub const FULL_NAME: &[&str] = &["Full Name"];
pub const STUDY_TIME: &[&str] = &["Study Time"];
pub const PROGRESS: &[&str] = &["Progress"];
pub const LESSONS_PASSED: &[&str] = &["Units(lessons) Passed", "Lessons Passed"];
pub const LESSONS_STUDIED: &[&str] = &["Units(lessons) Studied", "Lessons Studied"];
pub const ENGLISH_CLASS: &[&str] = &["English Class", "English Class_y", "English Class_x"];
pub const MAIN_CLASS: &[&str] = &["Main Class", "Main Class_y", "Main Class_x"];

const REMOVED: &str = "Removed";

#[derive(Debug, Clone, Copy)]
enum Side {
    Export,
    Roster,
}

/// Where one business field is read from after the join.
#[derive(Debug, Clone, Copy)]
struct FieldSource {
    side: Side,
    col: usize,
}

/// Looks the field up on the preferred side first, then the other one.
fn locate(
    export: &Table,
    roster: &Table,
    aliases: &[&str],
    prefer_roster: bool,
) -> Result<FieldSource, ReportError> {
    let from_roster = roster.resolve(aliases).map(|col| FieldSource {
        side: Side::Roster,
        col,
    });
    let from_export = export.resolve(aliases).map(|col| FieldSource {
        side: Side::Export,
        col,
    });
    let found = if prefer_roster {
        from_roster.or(from_export)
    } else {
        from_export.or(from_roster)
    };
    found.ok_or_else(|| {
        let mut columns = export.headers.clone();
        columns.extend(roster.headers.iter().cloned());
        ReportError::schema(aliases[0], "progress export or student list", &columns)
    })
}

fn key_of(cell: &Cell) -> Option<String> {
    if cell.is_missing() {
        None
    } else {
        Some(cell.to_string().trim().to_string())
    }
}

/// Inner join on `User ID`. Rows marked `Removed` are dropped, as is any row
/// with a missing value in one of the selected columns. Class columns prefer
/// the roster's copy; the other fields prefer the export's.
pub fn merge(export: &Table, roster: &Table) -> Result<Vec<StudentRecord>, ReportError> {
    let export_id = export.require(USER_ID, "progress export")?;
    let roster_id = roster.require(USER_ID, "student list")?;

    let english_class = locate(export, roster, ENGLISH_CLASS, true)?;
    let main_class = locate(export, roster, MAIN_CLASS, true)?;
    let full_name = locate(export, roster, FULL_NAME, false)?;
    let study_time = locate(export, roster, STUDY_TIME, false)?;
    let progress = locate(export, roster, PROGRESS, false)?;
    let passed = locate(export, roster, LESSONS_PASSED, false)?;
    let studied = locate(export, roster, LESSONS_STUDIED, false)?;
    let status_col = export.resolve(EXPORT_STATUS);

    let mut roster_index: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..roster.rows.len() {
        if let Some(key) = key_of(roster.cell(row, roster_id)) {
            roster_index.entry(key).or_default().push(row);
        }
    }

    let mut records = Vec::new();
    let mut removed = 0usize;
    let mut incomplete = 0usize;

    for export_row in 0..export.rows.len() {
        let Some(key) = key_of(export.cell(export_row, export_id)) else {
            continue;
        };
        let Some(matches) = roster_index.get(&key) else {
            continue;
        };

        if let Some(col) = status_col {
            if export.cell(export_row, col).as_text().map(str::trim) == Some(REMOVED) {
                removed += matches.len();
                continue;
            }
        }

        for &roster_row in matches {
            let pick = |source: FieldSource| -> Cell {
                match source.side {
                    Side::Export => export.cell(export_row, source.col).clone(),
                    Side::Roster => roster.cell(roster_row, source.col).clone(),
                }
            };

            let selected = [
                pick(english_class),
                pick(full_name),
                pick(study_time),
                pick(progress),
                pick(passed),
                pick(studied),
                pick(main_class),
            ];
            if selected.iter().any(Cell::is_missing) {
                incomplete += 1;
                continue;
            }
            let [english, name, time, prog, pass, stud, main] = selected;

            records.push(StudentRecord {
                user_id: key.clone(),
                full_name: name.to_string(),
                english_class: english.to_string(),
                main_class: main.to_string(),
                study_time: time,
                progress: prog,
                lessons_passed: pass,
                lessons_studied: stud,
                class_type: ClassType::Unknown,
                status: Status::Unknown,
                average_time_per_lesson: "Unknown".to_string(),
            });
        }
    }

    tracing::info!(
        merged = records.len(),
        removed,
        incomplete,
        "progress export merged with student list"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Cell {
        Cell::Text(v.to_string())
    }

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|h| h.to_string()).collect()
    }

    fn export_table(rows: Vec<Vec<Cell>>) -> Table {
        Table::new(
            headers(&[
                "User ID",
                "Full Name",
                "Status",
                "Study Time",
                "Progress",
                "Units(lessons) Passed",
                "Units(lessons) Studied",
                "English Class",
            ]),
            rows,
        )
    }

    fn export_row(id: f64, name: &str, status: &str, passed: f64) -> Vec<Cell> {
        vec![
            n(id),
            s(name),
            s(status),
            s("2:15"),
            n(0.5),
            n(passed),
            n(passed + 1.0),
            s("stale"),
        ]
    }

    fn roster_table(rows: Vec<Vec<Cell>>) -> Table {
        Table::new(headers(&["User ID", "English Class", "Main Class"]), rows)
    }

    #[test]
    fn joins_on_user_id_and_prefers_roster_classes() {
        let export = export_table(vec![
            export_row(1.0, "Anna Smith", "Active", 5.0),
            export_row(2.0, "Binh Tran", "Active", 3.0),
        ]);
        let roster = roster_table(vec![
            vec![n(2.0), s("10E1"), s("10A2")],
            vec![n(1.0), s("10E1"), s("10A1")],
        ]);

        let records = merge(&export, &roster).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].full_name, "Anna Smith");
        assert_eq!(records[0].english_class, "10E1");
        assert_eq!(records[0].main_class, "10A1");
        assert_eq!(records[1].main_class, "10A2");
        assert_eq!(records[0].status, Status::Unknown);
    }

    #[test]
    fn leading_zero_ids_join_as_text() {
        let mut row = export_row(0.0, "Anna Smith", "Active", 5.0);
        row[0] = s("007");
        let export = export_table(vec![row]);
        let roster = roster_table(vec![
            vec![s("007"), s("10E1"), s("10A1")],
            vec![n(7.0), s("10E2"), s("10A7")],
        ]);

        let records = merge(&export, &roster).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "007");
        assert_eq!(records[0].main_class, "10A1");
    }

    #[test]
    fn removed_students_are_excluded() {
        let export = export_table(vec![
            export_row(1.0, "Anna Smith", "Removed", 5.0),
            export_row(2.0, "Binh Tran", "Active", 3.0),
        ]);
        let roster = roster_table(vec![
            vec![n(1.0), s("10E1"), s("10A1")],
            vec![n(2.0), s("10E1"), s("10A2")],
        ]);

        let records = merge(&export, &roster).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].full_name, "Binh Tran");
    }

    #[test]
    fn disjoint_ids_merge_to_nothing() {
        let export = export_table(vec![export_row(1.0, "Anna Smith", "Active", 5.0)]);
        let roster = roster_table(vec![vec![n(9.0), s("10E1"), s("10A1")]]);
        assert!(merge(&export, &roster).unwrap().is_empty());
    }

    #[test]
    fn rows_with_any_missing_field_are_dropped() {
        let mut missing_time = export_row(2.0, "Binh Tran", "Active", 3.0);
        missing_time[3] = Cell::Empty;
        let export = export_table(vec![export_row(1.0, "Anna Smith", "Active", 5.0), missing_time]);
        let roster = roster_table(vec![
            vec![n(1.0), s("10E1"), s("10A1")],
            vec![n(2.0), s("10E1"), s("10A2")],
            vec![n(3.0), s("10E1"), Cell::Empty],
        ]);

        let records = merge(&export, &roster).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "1");
    }

    #[test]
    fn text_and_numeric_ids_match() {
        let export = export_table(vec![export_row(7.0, "Anna Smith", "Active", 5.0)]);
        let roster = roster_table(vec![vec![s("7"), s("10E2"), s("10A1")]]);
        assert_eq!(merge(&export, &roster).unwrap().len(), 1);
    }

    #[test]
    fn missing_identifier_is_a_schema_error() {
        let export = Table::new(headers(&["Full Name"]), vec![]);
        let roster = roster_table(vec![]);
        let err = merge(&export, &roster).unwrap_err();
        assert!(matches!(err, ReportError::Schema { ref column, .. } if column == "User ID"));

        let export = export_table(vec![]);
        let roster = Table::new(headers(&["English Class"]), vec![]);
        assert!(matches!(
            merge(&export, &roster),
            Err(ReportError::Schema { .. })
        ));
    }

    #[test]
    fn main_class_falls_back_to_export_column() {
        let export = Table::new(
            headers(&[
                "User ID",
                "Full Name",
                "Study Time",
                "Progress",
                "Units(lessons) Passed",
                "Units(lessons) Studied",
                "Main Class",
            ]),
            vec![vec![n(1.0), s("Anna"), s("1:00"), n(0.2), n(1.0), n(1.0), s("10A9")]],
        );
        let roster = Table::new(
            headers(&["User ID", "English Class"]),
            vec![vec![n(1.0), s("10E3")]],
        );
        let records = merge(&export, &roster).unwrap();
        assert_eq!(records[0].main_class, "10A9");
        assert_eq!(records[0].english_class, "10E3");
    }
}
