use crate::class_code::infer_class_type;
use crate::coerce::{parse_duration_text, round1};
use crate::models::{ClassType, Status, StudentRecord};
use crate::sheet::Cell;

/// Weekly lesson targets per track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeeklyTargets {
    pub ielts: i64,
    pub vstep: i64,
}

impl WeeklyTargets {
    pub fn for_type(&self, class_type: ClassType) -> Option<i64> {
        match class_type {
            ClassType::Ielts => Some(self.ielts),
            ClassType::Vstep => Some(self.vstep),
            ClassType::Unknown => None,
        }
    }
}

pub fn classify(class_type: ClassType, lessons_passed: f64, targets: WeeklyTargets) -> Status {
    let Some(target) = targets.for_type(class_type) else {
        return Status::Unknown;
    };
    let target = target as f64;
    if lessons_passed == target {
        Status::KeepUp
    } else if lessons_passed < target {
        Status::Late
    } else if lessons_passed > target {
        Status::FarAway
    } else {
        Status::Unknown
    }
}

/// `"<avg> phút"` with one decimal, or `"0 phút"` when there is nothing to
/// divide by or the study time is not `H:MM[:SS]` text.
pub fn average_time_per_lesson(study_time: &Cell, lessons_passed: &Cell) -> String {
    const ZERO: &str = "0 phút";

    let Some(lessons) = lessons_passed.as_number() else {
        return ZERO.to_string();
    };
    if lessons == 0.0 {
        return ZERO.to_string();
    }
    let Some(minutes) = study_time.as_text().and_then(parse_duration_text) else {
        return ZERO.to_string();
    };

    let avg = round1(minutes as f64 / lessons);
    format!("{avg:.1} phút")
}

/// Numeric prefix of an average-time string, e.g. `7.5` from `"7.5 phút"`.
pub fn average_minutes(display: &str) -> Option<f64> {
    let first = display.split_whitespace().next()?;
    let digits_only = first.replacen('.', "", 1);
    if digits_only.is_empty() || !digits_only.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    first.parse::<f64>().ok()
}

/// Fills the derived fields on every merged record.
pub fn apply(records: &mut [StudentRecord], targets: WeeklyTargets) {
    for record in records.iter_mut() {
        record.class_type = infer_class_type(&record.english_class);
        record.status = match record.lessons_passed.as_number() {
            Some(passed) => classify(record.class_type, passed, targets),
            None => {
                tracing::warn!(
                    student = %record.full_name,
                    class = %record.english_class,
                    value = %record.lessons_passed,
                    "lessons passed is not numeric; status left Unknown"
                );
                Status::Unknown
            }
        };
        record.average_time_per_lesson =
            average_time_per_lesson(&record.study_time, &record.lessons_passed);
        tracing::debug!(
            student = %record.full_name,
            class_type = record.class_type.label(),
            status = record.status.label(),
            "classified"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGETS: WeeklyTargets = WeeklyTargets { ielts: 6, vstep: 9 };

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn status_follows_track_target() {
        assert_eq!(classify(ClassType::Ielts, 6.0, TARGETS), Status::KeepUp);
        assert_eq!(classify(ClassType::Ielts, 5.0, TARGETS), Status::Late);
        assert_eq!(classify(ClassType::Ielts, 7.0, TARGETS), Status::FarAway);
        assert_eq!(classify(ClassType::Vstep, 9.0, TARGETS), Status::KeepUp);
        assert_eq!(classify(ClassType::Vstep, 6.0, TARGETS), Status::Late);
        assert_eq!(classify(ClassType::Unknown, 6.0, TARGETS), Status::Unknown);
    }

    #[test]
    fn passing_the_target_exactly_is_always_keep_up() {
        for target in 0..40 {
            let targets = WeeklyTargets {
                ielts: target,
                vstep: target,
            };
            for class_type in [ClassType::Ielts, ClassType::Vstep] {
                assert_eq!(classify(class_type, target as f64, targets), Status::KeepUp);
                let below = classify(class_type, target as f64 - 0.5, targets);
                let above = classify(class_type, target as f64 + 0.5, targets);
                assert_eq!(below, Status::Late);
                assert_eq!(above, Status::FarAway);
            }
        }
    }

    #[test]
    fn average_time_formats_one_decimal() {
        assert_eq!(
            average_time_per_lesson(&text("1:30"), &Cell::Number(4.0)),
            "22.5 phút"
        );
        assert_eq!(
            average_time_per_lesson(&text("1:00:59"), &Cell::Number(3.0)),
            "20.0 phút"
        );
        assert_eq!(
            average_time_per_lesson(&text("0:10"), &Cell::Number(3.0)),
            "3.3 phút"
        );
        assert_eq!(
            average_time_per_lesson(&text("0:01"), &Cell::Number(4.0)),
            "0.2 phút"
        );
    }

    #[test]
    fn average_time_degrades_to_zero() {
        assert_eq!(average_time_per_lesson(&text("1:30"), &Cell::Number(0.0)), "0 phút");
        assert_eq!(average_time_per_lesson(&text("90"), &Cell::Number(3.0)), "0 phút");
        assert_eq!(average_time_per_lesson(&Cell::Number(90.0), &Cell::Number(3.0)), "0 phút");
        assert_eq!(average_time_per_lesson(&text("1:30"), &text("many")), "0 phút");
    }

    #[test]
    fn average_minutes_reads_numeric_prefix() {
        assert_eq!(average_minutes("7.5 phút"), Some(7.5));
        assert_eq!(average_minutes("0 phút"), Some(0.0));
        assert_eq!(average_minutes("Unknown"), None);
        assert_eq!(average_minutes("-3.0 phút"), None);
        assert_eq!(average_minutes(""), None);
    }

    #[test]
    fn apply_derives_type_status_and_average() {
        let mut records = vec![StudentRecord {
            user_id: "1".to_string(),
            full_name: "Anna Smith".to_string(),
            english_class: "10V2".to_string(),
            main_class: "10A1".to_string(),
            study_time: text("3:00"),
            progress: Cell::Number(0.4),
            lessons_passed: Cell::Number(10.0),
            lessons_studied: Cell::Number(12.0),
            class_type: ClassType::Unknown,
            status: Status::Unknown,
            average_time_per_lesson: "Unknown".to_string(),
        }];
        apply(&mut records, TARGETS);
        assert_eq!(records[0].class_type, ClassType::Vstep);
        assert_eq!(records[0].status, Status::FarAway);
        assert_eq!(records[0].average_time_per_lesson, "18.0 phút");
    }
}
