//! Static per-grade settings: target classes, course labels, lesson totals
//! and the session timetable. Built-in defaults can be overridden by a TOML
//! file, which in turn is overridden by CLI flags.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::ClassSession;
use crate::report::LessonTotals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Grade {
    #[value(name = "10")]
    #[serde(rename = "10")]
    Ten,
    #[value(name = "11")]
    #[serde(rename = "11")]
    Eleven,
}

impl Grade {
    pub fn number(&self) -> u8 {
        match self {
            Grade::Ten => 10,
            Grade::Eleven => 11,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub class: String,
    pub session: String,
    pub time: String,
    pub teacher: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeConfig {
    pub classes: Vec<String>,
    pub course_ielts: String,
    pub course_vstep: String,
    pub total_ielts: i64,
    pub total_vstep: i64,
    pub sessions: Vec<SessionConfig>,
}

impl GradeConfig {
    pub fn defaults_for(grade: Grade) -> Self {
        match grade {
            Grade::Ten => Self {
                classes: ["10E1", "10E2", "10E3", "10E4"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                course_ielts: "Practical English A1".to_string(),
                course_vstep: "Practical English A2-B2".to_string(),
                total_ielts: 32,
                total_vstep: 57,
                sessions: grade_10_sessions(),
            },
            Grade::Eleven => Self {
                classes: [
                    "11E1", "11E2", "11E3", "11E4", "11V1", "11V2", "11V3", "11V4", "11V5",
                    "11V6",
                ]
                .iter()
                .map(|c| c.to_string())
                .collect(),
                course_ielts: "Practical English B2 & IELTS A2-B1".to_string(),
                course_vstep: "Practical English A2-B2".to_string(),
                total_ielts: 54,
                total_vstep: 52,
                sessions: Vec::new(),
            },
        }
    }

    pub fn totals(&self) -> LessonTotals {
        LessonTotals {
            ielts: self.total_ielts,
            vstep: self.total_vstep,
        }
    }

    /// Sessions grouped by class, in configured order.
    pub fn sessions_by_class(&self) -> BTreeMap<String, Vec<ClassSession>> {
        let mut map: BTreeMap<String, Vec<ClassSession>> = BTreeMap::new();
        for s in &self.sessions {
            map.entry(s.class.clone()).or_default().push(ClassSession {
                session: s.session.clone(),
                time: s.time.clone(),
                teacher: s.teacher.clone(),
            });
        }
        map
    }
}

impl Default for GradeConfig {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            course_ielts: String::new(),
            course_vstep: String::new(),
            total_ielts: 0,
            total_vstep: 0,
            sessions: Vec::new(),
        }
    }
}

fn grade_10_sessions() -> Vec<SessionConfig> {
    let table: &[(&str, &str, &str, &str)] = &[
        ("10E1", "Session 1", "1, 2", "Tim - Nhật"),
        ("10E1", "Session 2", "1, 2", "Vĩ Văn"),
        ("10E1", "Session 3", "1, 2", "Tường Vy"),
        ("10E2", "Session 1", "1, 2", "Kim Ngân"),
        ("10E2", "Session 2", "1, 2", "Tim - Tâm"),
        ("10E2", "Session 3", "1, 2", "Trúc Quỳnh"),
        ("10E3", "Session 1", "1, 2", "Tim - Nhật"),
        ("10E3", "Session 2", "1, 2", "Vĩ Văn"),
        ("10E3", "Session 3", "1, 2", "Kim Quyên"),
        ("10E4", "Session 1", "3, 4", "Kim Ngân"),
        ("10E4", "Session 2", "3, 4", "Tim - Tâm"),
        ("10E4", "Session 3", "3, 4", "Trúc Quỳnh"),
    ];
    table
        .iter()
        .map(|(class, session, time, teacher)| SessionConfig {
            class: class.to_string(),
            session: session.to_string(),
            time: time.to_string(),
            teacher: teacher.to_string(),
        })
        .collect()
}

/// On-disk layout: optional `[grade_10]` and `[grade_11]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    grade_10: Option<toml::Table>,
    grade_11: Option<toml::Table>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub grade_10: GradeConfig,
    pub grade_11: GradeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grade_10: GradeConfig::defaults_for(Grade::Ten),
            grade_11: GradeConfig::defaults_for(Grade::Eleven),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("invalid config {}", path.display()))
            }
        }
    }

    /// Keys present in the file replace the built-in value; absent keys keep it.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(Self {
            grade_10: overlay(Grade::Ten, file.grade_10)?,
            grade_11: overlay(Grade::Eleven, file.grade_11)?,
        })
    }

    pub fn grade(&self, grade: Grade) -> &GradeConfig {
        match grade {
            Grade::Ten => &self.grade_10,
            Grade::Eleven => &self.grade_11,
        }
    }
}

fn overlay(grade: Grade, section: Option<toml::Table>) -> anyhow::Result<GradeConfig> {
    let defaults = GradeConfig::defaults_for(grade);
    let Some(section) = section else {
        return Ok(defaults);
    };
    let mut merged = match toml::Value::try_from(&defaults)? {
        toml::Value::Table(table) => table,
        _ => toml::Table::new(),
    };
    for (key, value) in section {
        merged.insert(key, value);
    }
    let config: GradeConfig = toml::Value::Table(merged).try_into()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_current_timetable() {
        let config = AppConfig::default();
        assert_eq!(config.grade_10.classes.len(), 4);
        assert_eq!(config.grade_10.totals(), LessonTotals { ielts: 32, vstep: 57 });
        assert_eq!(config.grade_11.totals(), LessonTotals { ielts: 54, vstep: 52 });
        let sessions = config.grade_10.sessions_by_class();
        assert_eq!(sessions["10E4"].len(), 3);
        assert_eq!(sessions["10E4"][0].time, "3, 4");
        assert_eq!(sessions["10E1"][2].teacher, "Tường Vy");
        assert!(config.grade_11.sessions_by_class().is_empty());
    }

    #[test]
    fn file_values_overlay_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [grade_11]
            total_ielts = 60
            classes = ["11E1", "11V1"]

            [[grade_11.sessions]]
            class = "11E1"
            session = "Session 1"
            time = "5, 6"
            teacher = "Kim Ngân"
            "#,
        )
        .unwrap();

        assert_eq!(config.grade_10, GradeConfig::defaults_for(Grade::Ten));
        assert_eq!(config.grade_11.total_ielts, 60);
        assert_eq!(config.grade_11.total_vstep, 52);
        assert_eq!(config.grade_11.classes, vec!["11E1", "11V1"]);
        assert_eq!(config.grade_11.sessions_by_class()["11E1"][0].time, "5, 6");
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(AppConfig::from_toml("[grade_10]\ntotal_ielts = \"many\"").is_err());
    }

    #[test]
    fn grade_names_are_numbers() {
        assert_eq!(Grade::from_str("10", false).unwrap(), Grade::Ten);
        assert_eq!(Grade::Eleven.number(), 11);
    }
}
