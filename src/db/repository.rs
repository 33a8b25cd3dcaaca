//! Database repository for principals and sessions.
//!
//! Multi-document writes run inside a single transaction.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    AttendancePhoto, Coordinator, Head, MediaRef, Principal, Role, StagingList, Teacher,
};

const TEACHER_COLUMNS: &str =
    "id, username, picture, students, attendance_photos, last_attendance_reset_date, created_at";
const COORDINATOR_COLUMNS: &str = "id, username, picture, teachers, coord_report, last_report_clear_date, attendance_photos, last_attendance_reset_date, created_at";
const HEAD_COLUMNS: &str =
    "id, username, picture, coordinators, attendance_photos, last_attendance_reset_date, created_at";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== PRINCIPAL OPERATIONS ====================

    /// Get a teacher by ID.
    pub async fn get_teacher(&self, id: &str) -> Result<Option<Teacher>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_teacher(&mut conn, id).await
    }

    /// Get a coordinator by ID.
    pub async fn get_coordinator(&self, id: &str) -> Result<Option<Coordinator>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_coordinator(&mut conn, id).await
    }

    /// Get a head by ID.
    pub async fn get_head(&self, id: &str) -> Result<Option<Head>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_head(&mut conn, id).await
    }

    /// Load a principal of the given role.
    pub async fn get_principal(&self, role: Role, id: &str) -> Result<Option<Principal>, AppError> {
        Ok(match role {
            Role::Teacher => self.get_teacher(id).await?.map(Principal::Teacher),
            Role::Coordinator => self.get_coordinator(id).await?.map(Principal::Coordinator),
            Role::Head => self.get_head(id).await?.map(Principal::Head),
        })
    }

    /// List teachers with the given IDs, ordered by username. Unknown IDs are skipped.
    pub async fn list_teachers(&self, ids: &[String]) -> Result<Vec<Teacher>, AppError> {
        let sql = format!(
            "SELECT {} FROM teachers WHERE id IN (SELECT value FROM json_each(?)) ORDER BY username",
            TEACHER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_json(&ids)?)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(teacher_from_row).collect())
    }

    /// List coordinators with the given IDs, ordered by username. Unknown IDs are skipped.
    pub async fn list_coordinators(&self, ids: &[String]) -> Result<Vec<Coordinator>, AppError> {
        let sql = format!(
            "SELECT {} FROM coordinators WHERE id IN (SELECT value FROM json_each(?)) ORDER BY username",
            COORDINATOR_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(to_json(&ids)?)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(coordinator_from_row).collect())
    }

    /// The coordinator whose roster includes the teacher, if any.
    pub async fn find_coordinator_for_teacher(
        &self,
        teacher_id: &str,
    ) -> Result<Option<Coordinator>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_coordinator_for_teacher(&mut conn, teacher_id).await
    }

    /// Register a head.
    pub async fn create_head(&self, username: &str, password_hash: &str) -> Result<Head, AppError> {
        let mut tx = self.pool.begin().await?;
        ensure_username_free(&mut tx, Role::Head, username, None).await?;
        let id = insert_head(&mut tx, username, password_hash).await?;
        let head = fetch_head(&mut tx, &id)
            .await?
            .ok_or_else(|| AppError::Internal("Created head vanished".to_string()))?;
        tx.commit().await?;
        Ok(head)
    }

    /// Register a coordinator and add it to the head's list.
    pub async fn create_coordinator(
        &self,
        head_id: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<Coordinator, AppError> {
        let mut tx = self.pool.begin().await?;
        ensure_username_free(&mut tx, Role::Coordinator, username, None).await?;

        let mut head = fetch_head(&mut tx, head_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Head {} not found", head_id)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO coordinators (id, username, password_hash, picture, last_report_clear_date, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(username)
        .bind(password_hash)
        .bind(to_json(&MediaRef::default_avatar())?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(unique_violation_as_conflict)?;

        head.coordinators.push(id.clone());
        save_id_list(&mut tx, Role::Head, head_id, "coordinators", &head.coordinators).await?;

        let coordinator = fetch_coordinator(&mut tx, &id)
            .await?
            .ok_or_else(|| AppError::Internal("Created coordinator vanished".to_string()))?;
        tx.commit().await?;
        Ok(coordinator)
    }

    /// Register a teacher and add it to the coordinator's roster.
    pub async fn create_teacher(
        &self,
        coordinator_id: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<Teacher, AppError> {
        let mut tx = self.pool.begin().await?;
        ensure_username_free(&mut tx, Role::Teacher, username, None).await?;

        let mut coordinator = fetch_coordinator(&mut tx, coordinator_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Coordinator {} not found", coordinator_id))
            })?;

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO teachers (id, username, password_hash, picture, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(username)
        .bind(password_hash)
        .bind(to_json(&MediaRef::default_avatar())?)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(unique_violation_as_conflict)?;

        coordinator.teachers.push(id.clone());
        save_id_list(
            &mut tx,
            Role::Coordinator,
            coordinator_id,
            "teachers",
            &coordinator.teachers,
        )
        .await?;

        let teacher = fetch_teacher(&mut tx, &id)
            .await?
            .ok_or_else(|| AppError::Internal("Created teacher vanished".to_string()))?;
        tx.commit().await?;
        Ok(teacher)
    }

    /// Look up `(id, password_hash)` for a login attempt.
    pub async fn find_credentials(
        &self,
        role: Role,
        username: &str,
    ) -> Result<Option<(String, String)>, AppError> {
        let sql = format!("SELECT id, password_hash FROM {} WHERE username = ?", role.table());
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.get("id"), r.get("password_hash"))))
    }

    pub async fn get_password_hash(&self, role: Role, id: &str) -> Result<Option<String>, AppError> {
        let sql = format!("SELECT password_hash FROM {} WHERE id = ?", role.table());
        let hash = sqlx::query_scalar::<_, String>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    pub async fn update_password_hash(
        &self,
        role: Role,
        id: &str,
        password_hash: &str,
    ) -> Result<(), AppError> {
        let sql = format!("UPDATE {} SET password_hash = ? WHERE id = ?", role.table());
        let result = sqlx::query(&sql)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", role.title(), id)));
        }
        Ok(())
    }

    /// Rename a principal; usernames are unique per role.
    pub async fn update_username(&self, role: Role, id: &str, username: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        ensure_username_free(&mut tx, role, username, Some(id)).await?;
        let sql = format!("UPDATE {} SET username = ? WHERE id = ?", role.table());
        let result = sqlx::query(&sql)
            .bind(username)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(unique_violation_as_conflict)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", role.title(), id)));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Replace the profile picture, returning the previous reference.
    pub async fn update_picture(
        &self,
        role: Role,
        id: &str,
        picture: &MediaRef,
    ) -> Result<MediaRef, AppError> {
        let mut tx = self.pool.begin().await?;
        let select = format!("SELECT picture FROM {} WHERE id = ?", role.table());
        let row = sqlx::query(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", role.title(), id)))?;
        let previous = picture_column(&row);

        let update = format!("UPDATE {} SET picture = ? WHERE id = ?", role.table());
        sqlx::query(&update)
            .bind(to_json(picture)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(previous)
    }

    /// Append a record to a principal's attendance journal.
    pub async fn push_attendance_photo(
        &self,
        role: Role,
        id: &str,
        photo: &AttendancePhoto,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let mut photos = fetch_attendance_photos(&mut tx, role, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", role.title(), id)))?;
        photos.push(photo.clone());
        save_attendance_photos(&mut tx, role, id, &photos, None).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Empty a principal's attendance journal and stamp the reset date.
    /// Returns the removed records so their media can be deleted.
    pub async fn clear_attendance_photos(
        &self,
        role: Role,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AttendancePhoto>, AppError> {
        let mut tx = self.pool.begin().await?;
        let photos = fetch_attendance_photos(&mut tx, role, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", role.title(), id)))?;
        save_attendance_photos(&mut tx, role, id, &[], Some(now)).await?;
        tx.commit().await?;
        Ok(photos)
    }

    /// Persist a coordinator's staging list.
    pub async fn save_staging(&self, coordinator_id: &str, staging: &StagingList) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        save_staging(&mut conn, coordinator_id, staging).await
    }

    // ==================== SESSION OPERATIONS ====================

    /// Record a new session for the principal.
    pub async fn create_session(
        &self,
        token: &str,
        role: Role,
        principal_id: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO sessions (token, role, principal_id, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(token)
        .bind(role.as_str())
        .bind(principal_id)
        .bind(now)
        .bind(now + ttl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a live session to its role and principal ID.
    pub async fn find_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(Role, String)>, AppError> {
        let row = sqlx::query(
            "SELECT role, principal_id FROM sessions WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| {
            let role: String = r.get("role");
            Role::from_str(&role).map(|role| (role, r.get("principal_id")))
        }))
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove expired sessions. Returns the number removed.
    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ==================== ROW HELPERS ====================

/// Decode a JSON text column, falling back to the type's default.
pub(super) fn json_column<T: DeserializeOwned + Default>(row: &SqliteRow, column: &str) -> T {
    row.try_get::<Option<String>, _>(column)
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub(super) fn picture_column(row: &SqliteRow) -> MediaRef {
    row.try_get::<Option<String>, _>("picture")
        .ok()
        .flatten()
        .and_then(|raw| serde_json::from_str::<MediaRef>(&raw).ok())
        .filter(|p| !p.path.is_empty())
        .unwrap_or_else(MediaRef::default_avatar)
}

pub(super) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    Ok(serde_json::to_string(value)?)
}

fn unique_violation_as_conflict(err: sqlx::Error) -> AppError {
    let is_unique = err
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);
    if is_unique {
        AppError::Conflict("Username already taken".to_string())
    } else {
        AppError::from(err)
    }
}

fn teacher_from_row(row: &SqliteRow) -> Teacher {
    Teacher {
        id: row.get("id"),
        username: row.get("username"),
        picture: picture_column(row),
        students: json_column(row, "students"),
        attendance_photos: json_column(row, "attendance_photos"),
        last_attendance_reset_date: row.get("last_attendance_reset_date"),
        created_at: row.get("created_at"),
    }
}

fn coordinator_from_row(row: &SqliteRow) -> Coordinator {
    Coordinator {
        id: row.get("id"),
        username: row.get("username"),
        picture: picture_column(row),
        teachers: json_column(row, "teachers"),
        coord_report: json_column(row, "coord_report"),
        last_report_clear_date: row.get("last_report_clear_date"),
        attendance_photos: json_column(row, "attendance_photos"),
        last_attendance_reset_date: row.get("last_attendance_reset_date"),
        created_at: row.get("created_at"),
    }
}

fn head_from_row(row: &SqliteRow) -> Head {
    Head {
        id: row.get("id"),
        username: row.get("username"),
        picture: picture_column(row),
        coordinators: json_column(row, "coordinators"),
        attendance_photos: json_column(row, "attendance_photos"),
        last_attendance_reset_date: row.get("last_attendance_reset_date"),
        created_at: row.get("created_at"),
    }
}

// ==================== CONNECTION-SCOPED HELPERS ====================

pub(super) async fn fetch_teacher(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Teacher>, AppError> {
    let sql = format!("SELECT {} FROM teachers WHERE id = ?", TEACHER_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(teacher_from_row))
}

pub(super) async fn fetch_coordinator(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Coordinator>, AppError> {
    let sql = format!("SELECT {} FROM coordinators WHERE id = ?", COORDINATOR_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(coordinator_from_row))
}

pub(super) async fn fetch_head(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Head>, AppError> {
    let sql = format!("SELECT {} FROM heads WHERE id = ?", HEAD_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(head_from_row))
}

pub(super) async fn fetch_all_coordinators(
    conn: &mut SqliteConnection,
) -> Result<Vec<Coordinator>, AppError> {
    let sql = format!("SELECT {} FROM coordinators", COORDINATOR_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(coordinator_from_row).collect())
}

pub(super) async fn fetch_coordinator_for_teacher(
    conn: &mut SqliteConnection,
    teacher_id: &str,
) -> Result<Option<Coordinator>, AppError> {
    let sql = format!(
        "SELECT {} FROM coordinators WHERE EXISTS (SELECT 1 FROM json_each(coordinators.teachers) WHERE json_each.value = ?) LIMIT 1",
        COORDINATOR_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(teacher_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(coordinator_from_row))
}

pub(super) async fn fetch_heads_for_coordinator(
    conn: &mut SqliteConnection,
    coordinator_id: &str,
) -> Result<Vec<Head>, AppError> {
    let sql = format!(
        "SELECT {} FROM heads WHERE EXISTS (SELECT 1 FROM json_each(heads.coordinators) WHERE json_each.value = ?)",
        HEAD_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(coordinator_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(head_from_row).collect())
}

async fn insert_head(
    conn: &mut SqliteConnection,
    username: &str,
    password_hash: &str,
) -> Result<String, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO heads (id, username, password_hash, picture, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(username)
    .bind(password_hash)
    .bind(to_json(&MediaRef::default_avatar())?)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(unique_violation_as_conflict)?;
    Ok(id)
}

async fn ensure_username_free(
    conn: &mut SqliteConnection,
    role: Role,
    username: &str,
    except_id: Option<&str>,
) -> Result<(), AppError> {
    let sql = format!("SELECT id FROM {} WHERE username = ?", role.table());
    let existing = sqlx::query_scalar::<_, String>(&sql)
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
    match existing {
        Some(id) if Some(id.as_str()) != except_id => {
            Err(AppError::Conflict("Username already taken".to_string()))
        }
        _ => Ok(()),
    }
}

/// Overwrite one of a principal's id-list columns.
pub(super) async fn save_id_list(
    conn: &mut SqliteConnection,
    role: Role,
    id: &str,
    column: &'static str,
    ids: &[String],
) -> Result<(), AppError> {
    let sql = format!("UPDATE {} SET {} = ? WHERE id = ?", role.table(), column);
    sqlx::query(&sql)
        .bind(to_json(ids)?)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) async fn save_staging(
    conn: &mut SqliteConnection,
    coordinator_id: &str,
    staging: &StagingList,
) -> Result<(), AppError> {
    sqlx::query("UPDATE coordinators SET coord_report = ? WHERE id = ?")
        .bind(to_json(staging)?)
        .bind(coordinator_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) async fn fetch_attendance_photos(
    conn: &mut SqliteConnection,
    role: Role,
    id: &str,
) -> Result<Option<Vec<AttendancePhoto>>, AppError> {
    let sql = format!("SELECT attendance_photos FROM {} WHERE id = ?", role.table());
    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.map(|r| json_column(&r, "attendance_photos")))
}

/// Overwrite the attendance journal; stamps the reset date when given.
pub(super) async fn save_attendance_photos(
    conn: &mut SqliteConnection,
    role: Role,
    id: &str,
    photos: &[AttendancePhoto],
    reset_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    let photos_json = to_json(photos)?;
    match reset_at {
        Some(at) => {
            let sql = format!(
                "UPDATE {} SET attendance_photos = ?, last_attendance_reset_date = ? WHERE id = ?",
                role.table()
            );
            sqlx::query(&sql)
                .bind(photos_json)
                .bind(at)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
        None => {
            let sql = format!("UPDATE {} SET attendance_photos = ? WHERE id = ?", role.table());
            sqlx::query(&sql)
                .bind(photos_json)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        (Repository::new(pool), dir)
    }

    #[tokio::test]
    async fn test_hierarchy_creation_links_parents() {
        let (repo, _dir) = repo().await;
        let head = repo.create_head("chief", "hash").await.unwrap();
        let coordinator = repo.create_coordinator(&head.id, "coord", "hash").await.unwrap();
        let teacher = repo.create_teacher(&coordinator.id, "asha", "hash").await.unwrap();

        let head = repo.get_head(&head.id).await.unwrap().unwrap();
        assert_eq!(head.coordinators, vec![coordinator.id.clone()]);
        let coordinator = repo.get_coordinator(&coordinator.id).await.unwrap().unwrap();
        assert_eq!(coordinator.teachers, vec![teacher.id.clone()]);
        assert!(coordinator.coord_report.teacher_reports.is_empty());
        assert_eq!(teacher.picture, MediaRef::default_avatar());

        let found = repo.find_coordinator_for_teacher(&teacher.id).await.unwrap().unwrap();
        assert_eq!(found.id, coordinator.id);
    }

    #[tokio::test]
    async fn test_usernames_unique_per_role() {
        let (repo, _dir) = repo().await;
        let head = repo.create_head("chief", "hash").await.unwrap();
        let err = repo.create_head("chief", "hash").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Same name in another collection is fine
        repo.create_coordinator(&head.id, "chief", "hash").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_username_rejects_taken_but_allows_self() {
        let (repo, _dir) = repo().await;
        let a = repo.create_head("a", "hash").await.unwrap();
        repo.create_head("b", "hash").await.unwrap();

        let err = repo.update_username(Role::Head, &a.id, "b").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        repo.update_username(Role::Head, &a.id, "a").await.unwrap();
        repo.update_username(Role::Head, &a.id, "alpha").await.unwrap();
        assert_eq!(repo.get_head(&a.id).await.unwrap().unwrap().username, "alpha");
    }

    #[tokio::test]
    async fn test_attendance_journal_append_and_clear() {
        let (repo, _dir) = repo().await;
        let head = repo.create_head("chief", "hash").await.unwrap();
        let photo = AttendancePhoto {
            id: "p1".into(),
            date: Utc::now(),
            photo: MediaRef {
                fieldname: "attendancePhoto".into(),
                path: "/media/HeadAttendance/p1.jpg".into(),
                key: Some("HeadAttendance/p1.jpg".into()),
            },
            location: None,
        };

        repo.push_attendance_photo(Role::Head, &head.id, &photo).await.unwrap();
        repo.push_attendance_photo(Role::Head, &head.id, &photo).await.unwrap();
        assert_eq!(
            repo.get_head(&head.id).await.unwrap().unwrap().attendance_photos.len(),
            2
        );

        let now = Utc::now();
        let removed = repo
            .clear_attendance_photos(Role::Head, &head.id, now)
            .await
            .unwrap();
        assert_eq!(removed.len(), 2);
        let head = repo.get_head(&head.id).await.unwrap().unwrap();
        assert!(head.attendance_photos.is_empty());
        assert!(head.last_attendance_reset_date.is_some());
    }

    #[tokio::test]
    async fn test_sessions_expire() {
        let (repo, _dir) = repo().await;
        let now = Utc::now();
        repo.create_session("tok", Role::Teacher, "t1", now, Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(
            repo.find_session("tok", now).await.unwrap(),
            Some((Role::Teacher, "t1".to_string()))
        );
        assert_eq!(
            repo.find_session("tok", now + Duration::hours(2)).await.unwrap(),
            None
        );
        assert_eq!(
            repo.purge_expired_sessions(now + Duration::hours(2)).await.unwrap(),
            1
        );
    }
}
