//! Attendance arithmetic.
//!
//! Day boundaries are computed in Indian Standard Time (UTC+05:30) regardless of
//! the server's local zone.

use std::collections::HashMap;

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{AttendancePhoto, Student, TeacherReport};

/// IST offset from UTC in minutes.
pub const IST_OFFSET_MINUTES: i64 = 5 * 60 + 30;

/// Calendar date of `ts` in IST.
pub fn ist_date(ts: DateTime<Utc>) -> NaiveDate {
    (ts + Duration::minutes(IST_OFFSET_MINUTES)).date_naive()
}

/// Today's date in IST.
pub fn ist_today(now: DateTime<Utc>) -> NaiveDate {
    ist_date(now)
}

/// Whole IST days between the reset date and now. Future resets clamp to zero.
pub fn days_since(reset: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let days = (ist_date(now) - ist_date(reset)).num_days();
    if days < 0 {
        tracing::warn!(%reset, %now, days, "Attendance reset date lies in the future; clamping to zero");
        return 0;
    }
    days
}

/// The effective reset reference: the latest of the recorded candidates.
pub fn reset_reference<I>(candidates: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    candidates.into_iter().flatten().max()
}

/// Photos uploaded versus days elapsed since the last reset.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AttendanceRatio {
    pub present: usize,
    pub total: i64,
}

pub fn attendance_ratio(
    photos: &[AttendancePhoto],
    reset: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AttendanceRatio {
    AttendanceRatio {
        present: photos.len(),
        total: reset.map(|r| days_since(r, now)).unwrap_or(0),
    }
}

/// Per-student attendance across a teacher's reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceSummary {
    pub student: Student,
    pub total_classes: u32,
    pub present_count: u32,
    pub percentage: f64,
}

/// `present / total * 100` rounded to one decimal; zero when there were no classes.
pub fn percentage(present: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(present) / f64::from(total) * 100.0;
    (raw * 10.0).round() / 10.0
}

/// First IST date included in a window of `days` days ending today.
///
/// `0` and `1` both mean today only. A window reaching past the earliest
/// representable date has no lower bound and yields `NaiveDate::MIN`.
pub fn window_start(days: u32, now: DateTime<Utc>) -> NaiveDate {
    ist_today(now)
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Tally each roster student's attendance over the given reports.
///
/// Entries for students that are no longer on the roster are skipped, as are
/// reports dated before `since` when a window is requested.
pub fn summarize_students(
    roster: &[Student],
    reports: &[TeacherReport],
    since: Option<NaiveDate>,
) -> Vec<StudentAttendanceSummary> {
    let mut tally: HashMap<&str, (u32, u32)> = roster
        .iter()
        .map(|s| (s.id.as_str(), (0u32, 0u32)))
        .collect();

    for report in reports {
        if since.is_some_and(|from| report.date < from) {
            continue;
        }
        for entry in &report.student_attendance {
            let Some((total, present)) = tally.get_mut(entry.student_id.as_str()) else {
                continue;
            };
            *total += 1;
            if entry.present {
                *present += 1;
            }
        }
    }

    roster
        .iter()
        .map(|student| {
            let (total, present) = tally.get(student.id.as_str()).copied().unwrap_or((0, 0));
            StudentAttendanceSummary {
                student: student.clone(),
                total_classes: total,
                present_count: present,
                percentage: percentage(present, total),
            }
        })
        .collect()
}
