use chrono::NaiveDate;
use serde::Serialize;

use crate::sheet::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassType {
    Ielts,
    Vstep,
    Unknown,
}

impl ClassType {
    pub fn label(&self) -> &'static str {
        match self {
            ClassType::Ielts => "IELTS",
            ClassType::Vstep => "VSTEP",
            ClassType::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    KeepUp,
    Late,
    FarAway,
    Unknown,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::KeepUp => "keep up",
            Status::Late => "late",
            Status::FarAway => "far away",
            Status::Unknown => "Unknown",
        }
    }
}

/// One merged row. `class_type`, `status` and `average_time_per_lesson` are
/// derived after the merge and never read from the source files.
#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub user_id: String,
    pub full_name: String,
    pub english_class: String,
    pub main_class: String,
    pub study_time: Cell,
    pub progress: Cell,
    pub lessons_passed: Cell,
    pub lessons_studied: Cell,
    pub class_type: ClassType,
    pub status: Status,
    pub average_time_per_lesson: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSession {
    pub session: String,
    pub time: String,
    pub teacher: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyllabusEntry {
    pub week: i64,
    pub name: String,
    pub skill_focus: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackEntry {
    pub date: NaiveDate,
    pub class_label: String,
    pub author: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub class_name: String,
    pub avg_progress: f64,
    pub avg_studied: f64,
    pub avg_total_time: f64,
    pub avg_time_per_studied: f64,
    pub total_minutes: f64,
    pub total_passed: f64,
    pub total_studied: f64,
    pub on_track: u64,
    pub behind: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    #[serde(rename = "vượt kế hoạch")]
    pub far_away: u64,
    #[serde(rename = "đúng kế hoạch")]
    pub keep_up: u64,
    #[serde(rename = "chậm hơn kế hoạch")]
    pub late: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeStats {
    pub class_stats: Vec<ClassStats>,
    pub status_counts: StatusCounts,
}
