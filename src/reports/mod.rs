//! Report staging and commit.
//!
//! A coordinator's staging list moves through three states: empty, staging
//! (one or more staged teacher reports, all assumed to share the stamped
//! date) and committed, at which point the list is materialized as a
//! [`CoordinatorReport`] and reset to empty.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};

use crate::attendance::ist_today;
use crate::errors::AppError;
use crate::models::{CoordinatorReport, ReportRef, StagingList};

impl StagingList {
    pub fn contains(&self, report_id: &str) -> bool {
        self.teacher_reports.iter().any(|r| r.report_id == report_id)
    }

    /// Stage a report. The first addition stamps today's IST date; later
    /// additions keep it. Returns `false` if the report was already staged.
    pub fn stage(&mut self, report_id: &str, teacher_name: &str, now: DateTime<Utc>) -> bool {
        if self.contains(report_id) {
            return false;
        }
        if self.teacher_reports.is_empty() {
            self.date = Some(ist_today(now));
        }
        self.teacher_reports.push(ReportRef {
            id: uuid::Uuid::new_v4().to_string(),
            report_id: report_id.to_string(),
            teacher_name: teacher_name.to_string(),
        });
        true
    }

    /// Remove a staged report by its teacher report id.
    pub fn unstage(&mut self, report_id: &str) -> bool {
        let before = self.teacher_reports.len();
        self.teacher_reports.retain(|r| r.report_id != report_id);
        let removed = self.teacher_reports.len() != before;
        if self.teacher_reports.is_empty() {
            self.date = None;
        }
        removed
    }

    /// Drop references whose report no longer exists. Returns how many were dropped.
    pub fn sweep(&mut self, live: &HashSet<String>) -> usize {
        let dropped = retain_live(&mut self.teacher_reports, live);
        if self.teacher_reports.is_empty() {
            self.date = None;
        }
        dropped
    }

    /// Drop references to the given reports. Returns how many were dropped.
    pub fn purge(&mut self, gone: &HashSet<String>) -> usize {
        let before = self.teacher_reports.len();
        self.teacher_reports.retain(|r| !gone.contains(&r.report_id));
        if self.teacher_reports.is_empty() {
            self.date = None;
        }
        before - self.teacher_reports.len()
    }

    /// Every staged report id.
    pub fn report_ids(&self) -> Vec<String> {
        self.teacher_reports.iter().map(|r| r.report_id.clone()).collect()
    }

    /// Turn the staged items into a committed report, leaving the list empty.
    ///
    /// The list is only cleared once the report has been built, so callers that
    /// fail to persist the report can keep the original list untouched by
    /// working on a clone.
    pub fn commit(
        &mut self,
        coordinator_id: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CoordinatorReport, AppError> {
        if self.teacher_reports.is_empty() {
            return Err(AppError::Validation(
                "There are no staged reports to commit".to_string(),
            ));
        }

        let date = self.date.unwrap_or_else(|| ist_today(now));
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_report_name(date));

        let report = CoordinatorReport {
            id: uuid::Uuid::new_v4().to_string(),
            coordinator_id: coordinator_id.to_string(),
            name,
            date,
            teacher_reports: std::mem::take(&mut self.teacher_reports),
            created_at: now,
        };
        self.date = None;
        Ok(report)
    }
}

/// Name given to a committed report when the coordinator does not supply one.
pub fn default_report_name(date: NaiveDate) -> String {
    format!("Report {}", date.format("%Y-%m-%d"))
}

/// Keep only references that resolve. Returns how many were dropped.
pub fn retain_live(refs: &mut Vec<ReportRef>, live: &HashSet<String>) -> usize {
    let before = refs.len();
    refs.retain(|r| live.contains(&r.report_id));
    before - refs.len()
}

/// Writes needed to move a teacher's committed report references to another coordinator.
#[derive(Debug, Default, PartialEq)]
pub struct ReassignmentPlan {
    /// Old coordinator reports that keep other teachers' items, with their remaining refs
    pub shrunk: Vec<(String, Vec<ReportRef>)>,
    /// Old coordinator reports left with nothing in them
    pub emptied: Vec<String>,
    /// Existing same-date reports of the new coordinator, with their extended refs
    pub extended: Vec<(String, Vec<ReportRef>)>,
    /// Reports to create under the new coordinator
    pub created: Vec<CoordinatorReport>,
}

impl ReassignmentPlan {
    pub fn moved_count(&self) -> usize {
        self.extended.iter().map(|(_, refs)| refs.len()).sum::<usize>()
            + self.created.iter().map(|r| r.teacher_reports.len()).sum::<usize>()
    }
}

/// Plan moving the references in `moving` (teacher report id to lecture date)
/// out of `old_reports` and into same-date reports of the new coordinator.
///
/// References are grouped by the lecture's date. An existing report of the new
/// coordinator with that date is reused (the oldest one if there are several);
/// otherwise a new report is created with the default name.
pub fn plan_reassignment(
    moving: &HashMap<String, NaiveDate>,
    old_reports: &[CoordinatorReport],
    new_reports: &[CoordinatorReport],
    new_coordinator_id: &str,
    now: DateTime<Utc>,
) -> ReassignmentPlan {
    let mut plan = ReassignmentPlan::default();
    let mut by_date: BTreeMap<NaiveDate, Vec<ReportRef>> = BTreeMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for report in old_reports {
        let (moved, kept): (Vec<&ReportRef>, Vec<&ReportRef>) = report
            .teacher_reports
            .iter()
            .partition(|r| moving.contains_key(&r.report_id));
        if moved.is_empty() {
            continue;
        }

        for item in moved {
            if seen.insert(item.report_id.as_str()) {
                by_date
                    .entry(moving[&item.report_id])
                    .or_default()
                    .push(item.clone());
            }
        }

        if kept.is_empty() {
            plan.emptied.push(report.id.clone());
        } else {
            plan.shrunk
                .push((report.id.clone(), kept.into_iter().cloned().collect()));
        }
    }

    for (date, refs) in by_date {
        let target = new_reports
            .iter()
            .filter(|r| r.date == date)
            .min_by_key(|r| r.created_at);
        match target {
            Some(existing) => {
                let mut merged = existing.teacher_reports.clone();
                for item in refs {
                    if !merged.iter().any(|r| r.report_id == item.report_id) {
                        merged.push(item);
                    }
                }
                plan.extended.push((existing.id.clone(), merged));
            }
            None => plan.created.push(CoordinatorReport {
                id: uuid::Uuid::new_v4().to_string(),
                coordinator_id: new_coordinator_id.to_string(),
                name: default_report_name(date),
                date,
                teacher_reports: refs,
                created_at: now,
            }),
        }
    }

    plan
}
