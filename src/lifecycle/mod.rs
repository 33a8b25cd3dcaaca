//! Lifecycle and cleanup: cascades with media release, expired-student purges
//! and the periodic reconciliation job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::db::{Repository, SweepStats};
use crate::errors::AppError;
use crate::media::MediaStore;
use crate::models::MediaRef;

/// Delete media objects one after another. Failures are logged and skipped.
/// References without a store key (default avatars) are left alone.
pub async fn release_media(store: &dyn MediaStore, refs: Vec<MediaRef>) -> usize {
    let mut released = 0;
    for media in refs {
        let Some(key) = media.key else {
            continue;
        };
        match store.delete(&key).await {
            Ok(()) => released += 1,
            Err(e) => tracing::warn!(key = %key, error = ?e, "Failed to delete media object"),
        }
    }
    released
}

/// Delete a teacher, its reports and students, then release its media.
pub async fn delete_teacher(
    repo: &Repository,
    store: &dyn MediaStore,
    teacher_id: &str,
) -> Result<(), AppError> {
    let media = repo.delete_teacher_cascade(teacher_id, Utc::now()).await?;
    let released = release_media(store, media).await;
    tracing::info!(teacher_id, released, "Deleted teacher");
    Ok(())
}

/// Delete a coordinator and its committed reports, then release its media.
pub async fn delete_coordinator(
    repo: &Repository,
    store: &dyn MediaStore,
    coordinator_id: &str,
) -> Result<(), AppError> {
    let media = repo.delete_coordinator_cascade(coordinator_id).await?;
    release_media(store, media).await;
    Ok(())
}

/// Delete a teacher's reports and attendance photos, then release their media.
pub async fn clear_teacher(
    repo: &Repository,
    store: &dyn MediaStore,
    teacher_id: &str,
) -> Result<(), AppError> {
    let media = repo.clear_teacher_reports(teacher_id, Utc::now()).await?;
    release_media(store, media).await;
    Ok(())
}

/// Clear every teacher of a coordinator.
pub async fn clear_all_teachers(
    repo: &Repository,
    store: &dyn MediaStore,
    coordinator_id: &str,
) -> Result<(), AppError> {
    let media = repo
        .clear_coordinator_teachers(coordinator_id, Utc::now())
        .await?;
    let released = release_media(store, media).await;
    tracing::info!(coordinator_id, released, "Cleared all teacher reports");
    Ok(())
}

/// Hard-delete students soft-deleted more than `retention_days` ago.
pub async fn purge_expired_students(
    repo: &Repository,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let cutoff = now - chrono::Duration::days(retention_days);
    let purged = repo.purge_expired_students(cutoff).await?;
    if purged > 0 {
        tracing::info!(purged, %cutoff, "Purged expired students");
    }
    Ok(purged)
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileSummary {
    pub students: u64,
    pub sessions: u64,
    pub refs: SweepStats,
}

/// Periodic cleanup decoupled from request handling.
pub struct Reconciler {
    repo: Arc<Repository>,
    interval_secs: u64,
    retention_days: i64,
}

impl Reconciler {
    pub fn new(repo: Arc<Repository>, interval_secs: u64, retention_days: i64) -> Self {
        Self {
            repo,
            interval_secs,
            retention_days,
        }
    }

    /// Run one pass. Each step is independent; a failing step is logged and
    /// the others still run.
    pub async fn run_once(&self, now: DateTime<Utc>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        match purge_expired_students(&self.repo, self.retention_days, now).await {
            Ok(n) => summary.students = n,
            Err(e) => tracing::error!(error = %e, "Expired student purge failed"),
        }

        match self.repo.purge_expired_sessions(now).await {
            Ok(n) => summary.sessions = n,
            Err(e) => tracing::error!(error = %e, "Expired session purge failed"),
        }

        match self.repo.sweep_dangling_refs().await {
            Ok(stats) => {
                if !stats.is_empty() {
                    tracing::info!(?stats, "Swept dangling references");
                }
                summary.refs = stats;
            }
            Err(e) => tracing::error!(error = %e, "Reference sweep failed"),
        }

        summary
    }

    /// Loop forever, one pass per interval.
    pub async fn run(self) {
        tracing::info!(
            "Starting reconciliation job (every {} seconds)",
            self.interval_secs
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            ticker.tick().await;
            let summary = self.run_once(Utc::now()).await;
            tracing::debug!(?summary, "Reconciliation pass finished");
        }
    }

    /// Spawn the loop on the runtime. An interval of zero disables the job.
    pub fn spawn(self) -> Option<JoinHandle<()>> {
        if self.interval_secs == 0 {
            tracing::warn!("Reconciliation job disabled");
            return None;
        }
        Some(tokio::spawn(self.run()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::media::{LocalMediaStore, MediaFolder};
    use bytes::Bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_release_media_skips_keyless_and_missing() {
        let dir = TempDir::new().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media".into(), 1024);
        let stored = store
            .put(MediaFolder::Lectures, "images", "jpg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        let missing = MediaRef {
            fieldname: "images".into(),
            path: "/media/Lectures/gone.jpg".into(),
            key: Some("Lectures/gone.jpg".into()),
        };
        let broken = MediaRef {
            fieldname: "images".into(),
            path: "/media/x".into(),
            key: Some("../x".into()),
        };

        let released = release_media(
            &store,
            vec![MediaRef::default_avatar(), broken, stored.clone(), missing],
        )
        .await;

        // The traversal key fails and is skipped; the rest succeed
        assert_eq!(released, 2);
        assert!(!dir.path().join(stored.key.unwrap()).exists());
    }

    #[tokio::test]
    async fn test_reconcile_purges_students_and_sessions() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let repo = Arc::new(Repository::new(pool));
        let head = repo.create_head("chief", "h").await.unwrap();
        let coordinator = repo.create_coordinator(&head.id, "coord", "h").await.unwrap();
        let teacher = repo.create_teacher(&coordinator.id, "asha", "h").await.unwrap();
        let student = repo.create_student(&teacher.id, "A", 50).await.unwrap();

        let now = Utc::now();
        repo.soft_delete_student(&teacher.id, &student.id, now - chrono::Duration::days(40))
            .await
            .unwrap();
        repo.create_session(
            "old",
            crate::models::Role::Teacher,
            &teacher.id,
            now - chrono::Duration::days(3),
            chrono::Duration::hours(1),
        )
        .await
        .unwrap();

        let summary = Reconciler::new(repo.clone(), 60, 30).run_once(now).await;

        assert_eq!(summary.students, 1);
        assert_eq!(summary.sessions, 1);
        assert!(summary.refs.is_empty());
        assert!(repo.get_student(&student.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_interval_disables_job() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let repo = Arc::new(Repository::new(pool));
        assert!(Reconciler::new(repo, 0, 30).spawn().is_none());
    }
}
