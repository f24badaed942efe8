//! Dashboard aggregates per English class.

use std::collections::BTreeMap;

use crate::coerce::{parse_duration, round1, to_safe_float};
use crate::models::{ClassStats, GradeStats, Status, StatusCounts, StudentRecord};
use crate::sheet::Cell;

#[derive(Default)]
struct ClassAccumulator {
    passed: Vec<f64>,
    studied: Vec<f64>,
    minutes: Vec<f64>,
    on_track: u64,
    behind: u64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Per-class means and totals plus global status counts. `None` for empty
/// input or when no record carries a class to group by; never partial.
/// Unparseable lesson counts are left out of means and sums.
pub fn aggregate(records: &[StudentRecord]) -> Option<GradeStats> {
    if records.is_empty() {
        tracing::warn!("no student records; stats unavailable");
        return None;
    }
    if records.iter().all(|r| r.english_class.trim().is_empty()) {
        tracing::warn!("English class missing from every record; stats unavailable");
        return None;
    }

    let mut groups: BTreeMap<&str, ClassAccumulator> = BTreeMap::new();
    let mut counts = StatusCounts::default();

    for record in records {
        match record.status {
            Status::FarAway => counts.far_away += 1,
            Status::KeepUp => counts.keep_up += 1,
            Status::Late => counts.late += 1,
            Status::Unknown => {}
        }

        if record.english_class.trim().is_empty() {
            continue;
        }
        let acc = groups.entry(record.english_class.as_str()).or_default();
        if let Some(passed) = record.lessons_passed.as_number() {
            acc.passed.push(passed);
        }
        if let Some(studied) = record.lessons_studied.as_number() {
            acc.studied.push(studied);
        }
        let minutes = match &record.study_time {
            Cell::Number(_) => to_safe_float(&record.study_time, 0.0),
            text => parse_duration(text),
        };
        acc.minutes.push(minutes);
        match record.status {
            Status::KeepUp | Status::FarAway => acc.on_track += 1,
            Status::Late => acc.behind += 1,
            Status::Unknown => {}
        }
    }

    let class_stats = groups
        .into_iter()
        .map(|(class_name, acc)| {
            let total_minutes: f64 = acc.minutes.iter().sum();
            let total_passed: f64 = acc.passed.iter().sum();
            let total_studied: f64 = acc.studied.iter().sum();
            let avg_time_per_studied = if total_studied > 0.0 {
                total_minutes / total_studied
            } else {
                0.0
            };
            ClassStats {
                class_name: class_name.to_string(),
                avg_progress: round1(mean(&acc.passed)),
                avg_studied: round1(mean(&acc.studied)),
                avg_total_time: round1(mean(&acc.minutes)),
                avg_time_per_studied: round1(avg_time_per_studied),
                total_minutes: round1(total_minutes),
                total_passed: round1(total_passed),
                total_studied: round1(total_studied),
                on_track: acc.on_track,
                behind: acc.behind,
            }
        })
        .collect();

    Some(GradeStats {
        class_stats,
        status_counts: counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassType;

    fn record(class: &str, status: Status, passed: Cell, studied: Cell, time: &str) -> StudentRecord {
        StudentRecord {
            user_id: "id".to_string(),
            full_name: "Student".to_string(),
            english_class: class.to_string(),
            main_class: "10A1".to_string(),
            study_time: Cell::Text(time.to_string()),
            progress: Cell::Number(0.3),
            lessons_passed: passed,
            lessons_studied: studied,
            class_type: ClassType::Ielts,
            status,
            average_time_per_lesson: "0 phút".to_string(),
        }
    }

    #[test]
    fn empty_input_has_no_stats() {
        assert!(aggregate(&[]).is_none());
    }

    #[test]
    fn classless_records_have_no_stats() {
        let records = vec![record("", Status::Late, Cell::Number(1.0), Cell::Number(1.0), "1:00")];
        assert!(aggregate(&records).is_none());
    }

    #[test]
    fn groups_by_class_in_order() {
        let records = vec![
            record("10E2", Status::Late, Cell::Number(2.0), Cell::Number(4.0), "1:00"),
            record("10E1", Status::KeepUp, Cell::Number(6.0), Cell::Number(6.0), "2:00"),
            record("10E1", Status::FarAway, Cell::Number(7.0), Cell::Number(8.0), "1:30"),
            record("10E1", Status::Late, Cell::Number(2.0), Cell::Number(2.0), "0:30"),
        ];
        let stats = aggregate(&records).unwrap();
        assert_eq!(stats.class_stats.len(), 2);

        let first = &stats.class_stats[0];
        assert_eq!(first.class_name, "10E1");
        assert_eq!(first.avg_progress, 5.0);
        assert_eq!(first.avg_studied, 5.3);
        assert_eq!(first.total_minutes, 240.0);
        assert_eq!(first.avg_total_time, 80.0);
        assert_eq!(first.avg_time_per_studied, 15.0);
        assert_eq!(first.on_track, 2);
        assert_eq!(first.behind, 1);

        assert_eq!(
            stats.status_counts,
            StatusCounts {
                far_away: 1,
                keep_up: 1,
                late: 2
            }
        );
    }

    #[test]
    fn unparseable_lesson_counts_are_excluded_not_zeroed() {
        let records = vec![
            record("10E1", Status::Unknown, Cell::Text("n/a".to_string()), Cell::Number(4.0), "1:00"),
            record("10E1", Status::Late, Cell::Number(3.0), Cell::Text("?".to_string()), "1:00"),
        ];
        let stats = aggregate(&records).unwrap();
        let class = &stats.class_stats[0];
        assert_eq!(class.avg_progress, 3.0);
        assert_eq!(class.avg_studied, 4.0);
        assert_eq!(class.avg_time_per_studied, 30.0);
    }

    #[test]
    fn all_missing_passed_still_reports_the_class() {
        let records = vec![
            record("10E1", Status::Unknown, Cell::Text("-".to_string()), Cell::Number(2.0), "0:40"),
            record("10E1", Status::Unknown, Cell::Text("-".to_string()), Cell::Number(0.0), "bad"),
        ];
        let stats = aggregate(&records).unwrap();
        let class = &stats.class_stats[0];
        assert_eq!(class.avg_progress, 0.0);
        assert_eq!(class.avg_studied, 1.0);
        assert_eq!(class.avg_total_time, 20.0);
        assert_eq!(class.avg_time_per_studied, 20.0);
        assert_eq!(class.on_track + class.behind, 0);
    }

    #[test]
    fn numeric_minutes_are_used_directly() {
        let mut first = record("10E1", Status::Late, Cell::Number(1.0), Cell::Number(2.0), "0:00");
        first.study_time = Cell::Number(45.0);
        let mut second = record("10E1", Status::Late, Cell::Number(1.0), Cell::Number(2.0), "0:00");
        second.study_time = Cell::Number(f64::INFINITY);
        let stats = aggregate(&[first, second]).unwrap();
        assert_eq!(stats.class_stats[0].total_minutes, 45.0);
    }

    #[test]
    fn zero_studied_gives_zero_time_per_lesson() {
        let records = vec![record("10V1", Status::Late, Cell::Number(0.0), Cell::Number(0.0), "3:00")];
        let stats = aggregate(&records).unwrap();
        assert_eq!(stats.class_stats[0].avg_time_per_studied, 0.0);
    }

    #[test]
    fn serializes_with_dashboard_labels() {
        let records = vec![record("10E1", Status::KeepUp, Cell::Number(6.0), Cell::Number(6.0), "1:00")];
        let json = serde_json::to_value(aggregate(&records).unwrap()).unwrap();
        assert_eq!(json["class_stats"][0]["className"], "10E1");
        assert_eq!(json["class_stats"][0]["onTrack"], 1);
        assert_eq!(json["status_counts"]["đúng kế hoạch"], 1);
        assert_eq!(json["status_counts"]["vượt kế hoạch"], 0);
        assert_eq!(json["status_counts"]["chậm hơn kế hoạch"], 0);
    }
}
