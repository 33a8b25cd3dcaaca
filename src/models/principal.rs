//! Principal models: the three authenticated roles and what they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder avatar used when a principal has not uploaded a picture.
pub const DEFAULT_AVATAR: &str = "https://cdn-icons-png.flaticon.com/512/2784/2784488.png";

/// The kind of authenticated principal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Coordinator,
    Head,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Coordinator => "coordinator",
            Role::Head => "head",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "teacher" => Some(Role::Teacher),
            "coordinator" => Some(Role::Coordinator),
            "head" => Some(Role::Head),
            _ => None,
        }
    }

    /// Table holding principals of this role.
    pub fn table(&self) -> &'static str {
        match self {
            Role::Teacher => "teachers",
            Role::Coordinator => "coordinators",
            Role::Head => "heads",
        }
    }

    /// Landing page after login.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Teacher => "/teacher/home",
            Role::Coordinator => "/coordinator/home",
            Role::Head => "/head/home",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Role::Teacher => "Teacher",
            Role::Coordinator => "Coordinator",
            Role::Head => "Head",
        }
    }
}

/// Reference to an object in the media store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub fieldname: String,
    pub path: String,
    /// Store key; `None` for external placeholders that must never be deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl MediaRef {
    pub fn default_avatar() -> Self {
        Self {
            fieldname: String::new(),
            path: DEFAULT_AVATAR.to_string(),
            key: None,
        }
    }
}

/// Where an attendance photo was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl GeoLocation {
    /// Fallback address rendering when no human-readable address is known.
    pub fn coordinates_label(latitude: f64, longitude: f64) -> String {
        format!("Location: {:.6}, {:.6}", latitude, longitude)
    }
}

/// One entry of a principal's photographic attendance journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePhoto {
    pub id: String,
    pub date: DateTime<Utc>,
    pub photo: MediaRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
}

/// A teacher: owns a roster of students and submits lecture reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub username: String,
    pub picture: MediaRef,
    /// Active roster, by student id
    pub students: Vec<String>,
    pub attendance_photos: Vec<AttendancePhoto>,
    pub last_attendance_reset_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Staged teacher report inside a coordinator's working list or a committed report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRef {
    pub id: String,
    pub report_id: String,
    pub teacher_name: String,
}

/// The coordinator's unfinalized staging list (`coordReport`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StagingList {
    pub date: Option<chrono::NaiveDate>,
    pub teacher_reports: Vec<ReportRef>,
}

/// A coordinator: oversees teachers and curates their reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinator {
    pub id: String,
    pub username: String,
    pub picture: MediaRef,
    pub teachers: Vec<String>,
    pub coord_report: StagingList,
    pub last_report_clear_date: DateTime<Utc>,
    pub attendance_photos: Vec<AttendancePhoto>,
    pub last_attendance_reset_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A head: oversees coordinators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Head {
    pub id: String,
    pub username: String,
    pub picture: MediaRef,
    pub coordinators: Vec<String>,
    pub attendance_photos: Vec<AttendancePhoto>,
    pub last_attendance_reset_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An authenticated principal, resolved once when the session is restored.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", content = "user", rename_all = "lowercase")]
pub enum Principal {
    Teacher(Teacher),
    Coordinator(Coordinator),
    Head(Head),
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::Teacher(_) => Role::Teacher,
            Principal::Coordinator(_) => Role::Coordinator,
            Principal::Head(_) => Role::Head,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Principal::Teacher(t) => &t.id,
            Principal::Coordinator(c) => &c.id,
            Principal::Head(h) => &h.id,
        }
    }

    pub fn attendance_photos(&self) -> &[AttendancePhoto] {
        match self {
            Principal::Teacher(t) => &t.attendance_photos,
            Principal::Coordinator(c) => &c.attendance_photos,
            Principal::Head(h) => &h.attendance_photos,
        }
    }
}

/// Request body for logging in.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for registering a principal (teacher, coordinator or head).
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// Request body for changing the username.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUsernameRequest {
    #[serde(default)]
    pub new_username: String,
}

/// Request body for changing the password.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}
