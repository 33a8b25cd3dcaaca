//! Database module for SQLite persistence.
//!
//! Each document collection lives in its own table; embedded arrays are JSON
//! text columns.

mod cascade;
mod reports;
mod repository;

pub use cascade::*;
pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS heads (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            picture TEXT,
            coordinators TEXT NOT NULL DEFAULT '[]',
            attendance_photos TEXT NOT NULL DEFAULT '[]',
            last_attendance_reset_date TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coordinators (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            picture TEXT,
            teachers TEXT NOT NULL DEFAULT '[]',
            coord_report TEXT NOT NULL DEFAULT '{"date":null,"teacherReports":[]}',
            last_report_clear_date TEXT NOT NULL,
            attendance_photos TEXT NOT NULL DEFAULT '[]',
            last_attendance_reset_date TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teachers (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            picture TEXT,
            students TEXT NOT NULL DEFAULT '[]',
            attendance_photos TEXT NOT NULL DEFAULT '[]',
            last_attendance_reset_date TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teacher_reports (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            date TEXT NOT NULL,
            time TEXT,
            address TEXT,
            attendance TEXT,
            attendance_count INTEGER NOT NULL DEFAULT 0,
            teacher_present INTEGER NOT NULL DEFAULT 1,
            student_attendance TEXT NOT NULL DEFAULT '[]',
            activity TEXT,
            images TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coordinator_reports (
            id TEXT PRIMARY KEY,
            coordinator_id TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            teacher_reports TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            role TEXT NOT NULL,
            principal_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_students_teacher ON students(teacher_id);
        CREATE INDEX IF NOT EXISTS idx_students_deleted ON students(active, deleted_at);
        CREATE INDEX IF NOT EXISTS idx_teacher_reports_teacher ON teacher_reports(teacher_id, date);
        CREATE INDEX IF NOT EXISTS idx_coordinator_reports_coordinator ON coordinator_reports(coordinator_id, date);
        CREATE INDEX IF NOT EXISTS idx_sessions_principal ON sessions(principal_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
