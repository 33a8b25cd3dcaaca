//! Lecture reports submitted by teachers and the bundles coordinators commit.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MediaRef, ReportRef};

/// Maximum number of photos attached to one lecture report.
pub const MAX_REPORT_IMAGES: usize = 5;

/// Attendance of one student in one lecture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendanceEntry {
    pub student_id: String,
    pub present: bool,
}

/// One lecture/activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherReport {
    pub id: String,
    pub teacher_id: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Free-form attendance note as typed by the teacher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance: Option<String>,
    pub attendance_count: i64,
    pub teacher_present: bool,
    /// Snapshot of the roster at submission time
    pub student_attendance: Vec<StudentAttendanceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    pub images: Vec<MediaRef>,
    pub created_at: DateTime<Utc>,
}

/// Validated lecture submission, ready to persist.
#[derive(Debug, Clone)]
pub struct NewTeacherReport {
    pub teacher_id: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub address: Option<String>,
    pub attendance: Option<String>,
    pub teacher_present: bool,
    /// Ids of the students marked present
    pub present_student_ids: Vec<String>,
    pub activity: Option<String>,
    pub images: Vec<MediaRef>,
}

impl NewTeacherReport {
    /// Build the attendance snapshot over the roster. Ids not on the roster are ignored.
    pub fn attendance_for(&self, roster: &[String]) -> (Vec<StudentAttendanceEntry>, i64) {
        let entries: Vec<StudentAttendanceEntry> = roster
            .iter()
            .map(|student_id| StudentAttendanceEntry {
                student_id: student_id.clone(),
                present: self.present_student_ids.iter().any(|p| p == student_id),
            })
            .collect();
        let count = entries.iter().filter(|e| e.present).count() as i64;
        (entries, count)
    }
}

/// A committed, named bundle of teacher reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorReport {
    pub id: String,
    pub coordinator_id: String,
    pub name: String,
    pub date: NaiveDate,
    pub teacher_reports: Vec<ReportRef>,
    pub created_at: DateTime<Utc>,
}

/// A committed report with its teacher reports resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorReportView {
    #[serde(flatten)]
    pub report: CoordinatorReport,
    pub lectures: Vec<TeacherReport>,
}

/// Request body for staging a teacher report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReportRequest {
    pub report_id: String,
}

/// Request body for committing the staging list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitReportRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body for moving a teacher to another coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignTeacherRequest {
    pub coordinator_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendance_snapshot_covers_roster_only() {
        let submission = NewTeacherReport {
            teacher_id: "t1".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time: None,
            address: None,
            attendance: None,
            teacher_present: true,
            present_student_ids: vec!["s1".into(), "s3".into(), "ghost".into()],
            activity: None,
            images: vec![],
        };
        let roster = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];

        let (entries, count) = submission.attendance_for(&roster);

        assert_eq!(entries.len(), 3);
        assert_eq!(count, 2);
        assert!(entries[0].present);
        assert!(!entries[1].present);
        assert!(entries[2].present);
    }
}
