//! Integration tests for the FieldOps backend.

use std::sync::Arc;

use reqwest::{multipart, Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::media::{LocalMediaStore, MediaStore};
use crate::{create_router, AppState};

const BOOTSTRAP_KEY: &str = "test-bootstrap-key";
const PASSWORD: &str = "secret123";

/// Test fixture for integration tests.
struct TestFixture {
    base_url: String,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let media_dir = temp_dir.path().join("media");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let config = Config {
            bootstrap_key: Some(BOOTSTRAP_KEY.to_string()),
            db_path,
            media_dir: media_dir.clone(),
            media_base_url: "/media".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            session_ttl_hours: 24,
            reconcile_interval_secs: 0,
            student_retention_days: 30,
            max_students: 3,
            max_upload_bytes: 1024 * 1024,
        };

        let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(
            media_dir,
            config.media_base_url.clone(),
            config.max_upload_bytes,
        ));

        let state = AppState {
            repo,
            media,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture { base_url, temp_dir }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A client with its own cookie jar, standing in for one browser.
    fn browser(&self) -> Client {
        Client::builder().cookie_store(true).build().unwrap()
    }

    fn media_files(&self, folder: &str) -> usize {
        std::fs::read_dir(self.temp_dir.path().join("media").join(folder))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    async fn register_head(&self, username: &str) -> Value {
        let resp = Client::new()
            .post(self.url("/auth/heads"))
            .header("x-api-key", BOOTSTRAP_KEY)
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json::<Value>().await.unwrap()["data"].clone()
    }

    async fn login(&self, role: &str, username: &str) -> Client {
        let client = self.browser();
        let resp = client
            .post(self.url(&format!("/auth/login/{}", role)))
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "login as {} {}", role, username);
        client
    }

    /// Head -> coordinator -> teacher, each logged in.
    async fn hierarchy(&self) -> Hierarchy {
        self.register_head("head1").await;
        let head = self.login("head", "head1").await;

        let coordinator_id = post_json(&head, &self.url("/head/coordinators"), json!({
            "username": "coord1",
            "password": PASSWORD,
        }))
        .await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        let coordinator = self.login("coordinator", "coord1").await;

        let teacher_id = post_json(&coordinator, &self.url("/coordinator/teachers"), json!({
            "username": "teach1",
            "password": PASSWORD,
        }))
        .await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();
        let teacher = self.login("teacher", "teach1").await;

        Hierarchy {
            head,
            coordinator,
            coordinator_id,
            teacher,
            teacher_id,
        }
    }

    async fn add_student(&self, teacher: &Client, name: &str) -> String {
        post_json(teacher, &self.url("/teacher/students"), json!({ "name": name })).await["data"]
            ["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn submit_lecture(&self, teacher: &Client, date: &str, present: &[&str]) -> Value {
        let mut form = multipart::Form::new()
            .text("date", date.to_string())
            .text("time", "10:30")
            .text("activity", "Reading circle")
            .text("teacherPresent", "on")
            .part("images", image_part("board.jpg"))
            .part("images", image_part("class.png"));
        for id in present {
            form = form.text("studentAttendance", id.to_string());
        }

        let resp = teacher
            .post(self.url("/teacher/lectures"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json::<Value>().await.unwrap()["data"].clone()
    }
}

struct Hierarchy {
    head: Client,
    coordinator: Client,
    coordinator_id: String,
    teacher: Client,
    teacher_id: String,
}

fn image_part(name: &str) -> multipart::Part {
    multipart::Part::bytes(b"\x89PNG fake image bytes".to_vec()).file_name(name.to_string())
}

async fn post_json(client: &Client, url: &str, body: Value) -> Value {
    let resp = client.post(url).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "POST {}", url);
    resp.json().await.unwrap()
}

async fn get_json(client: &Client, url: &str) -> Value {
    let resp = client.get(url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "GET {}", url);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_head_registration_requires_bootstrap_key() {
    let fixture = TestFixture::new().await;
    let body = json!({ "username": "head1", "password": PASSWORD });

    let resp = Client::new()
        .post(fixture.url("/auth/heads"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body_json: Value = resp.json().await.unwrap();
    assert_eq!(body_json["success"], false);
    assert_eq!(body_json["error"]["code"], "UNAUTHORIZED");

    let resp = Client::new()
        .post(fixture.url("/auth/heads"))
        .header("x-api-key", "wrong-key")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let head = fixture.register_head("head1").await;
    assert_eq!(head["username"], "head1");
    assert!(head.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let fixture = TestFixture::new().await;
    fixture.register_head("head1").await;
    let client = fixture.browser();

    let mut messages = Vec::new();
    for (role, username, password) in [
        ("head", "head1", "wrong-password"),
        ("head", "nobody", PASSWORD),
        ("teacher", "head1", PASSWORD),
    ] {
        let resp = client
            .post(fixture.url(&format!("/auth/login/{}", role)))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        let body: Value = resp.json().await.unwrap();
        messages.push(body["error"]["message"].as_str().unwrap().to_string());
    }
    assert!(messages.iter().all(|m| m == &messages[0]));

    let resp = client
        .post(fixture.url("/auth/login/janitor"))
        .json(&json!({ "username": "head1", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_session_and_role_guards() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    // No session
    let resp = fixture
        .browser()
        .get(fixture.url("/teacher/home"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Wrong role
    let resp = h
        .teacher
        .get(fixture.url("/coordinator/home"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let resp = h.coordinator.get(fixture.url("/head/home")).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    // Settings work for every role
    let settings = get_json(&h.teacher, &fixture.url("/account/settings")).await;
    assert_eq!(settings["data"]["role"], "teacher");
    assert_eq!(settings["data"]["user"]["id"], h.teacher_id.as_str());

    // Logout ends the session
    post_json(&h.teacher, &fixture.url("/auth/logout"), json!({})).await;
    let resp = h.teacher.get(fixture.url("/teacher/home")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_lecture_submission_and_student_summaries() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    let ana = fixture.add_student(&h.teacher, "Ana").await;
    let ben = fixture.add_student(&h.teacher, "Ben").await;
    let cal = fixture.add_student(&h.teacher, "Cal").await;

    // Roster limit is 3 in the fixture
    let resp = h
        .teacher
        .post(fixture.url("/teacher/students"))
        .json(&json!({ "name": "Dee" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let report = fixture
        .submit_lecture(&h.teacher, "2026-10-01", &[&ana, &cal, "not-on-roster"])
        .await;
    assert_eq!(report["attendanceCount"], 2);
    assert_eq!(report["teacherPresent"], true);
    assert_eq!(report["studentAttendance"].as_array().unwrap().len(), 3);
    assert_eq!(report["images"].as_array().unwrap().len(), 2);
    assert_eq!(fixture.media_files("Lectures"), 2);

    // Stored media is served back
    let path = report["images"][0]["path"].as_str().unwrap();
    let resp = Client::new().get(fixture.url(path)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let home = get_json(&h.teacher, &fixture.url("/teacher/home")).await;
    let students = home["data"]["students"].as_array().unwrap();
    assert_eq!(students.len(), 3);
    let ben_summary = students
        .iter()
        .find(|s| s["student"]["id"] == ben.as_str())
        .unwrap();
    assert_eq!(ben_summary["totalClasses"], 1);
    assert_eq!(ben_summary["presentCount"], 0);
    let ana_summary = students
        .iter()
        .find(|s| s["student"]["id"] == ana.as_str())
        .unwrap();
    assert_eq!(ana_summary["percentage"], 100.0);

    // Removing a student takes it off the roster only
    let resp = h
        .teacher
        .delete(fixture.url(&format!("/teacher/students/{}", ben)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let roster = get_json(&h.teacher, &fixture.url("/teacher/students")).await;
    assert_eq!(roster["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_lecture_validation_stores_nothing() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    // No images
    let form = multipart::Form::new().text("date", "2026-10-01");
    let resp = h
        .teacher
        .post(fixture.url("/teacher/lectures"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Too many images
    let mut form = multipart::Form::new().text("date", "2026-10-01");
    for i in 0..6 {
        form = form.part("images", image_part(&format!("{}.jpg", i)));
    }
    let resp = h
        .teacher
        .post(fixture.url("/teacher/lectures"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Bad date
    let form = multipart::Form::new()
        .text("date", "01/10/2026")
        .part("images", image_part("a.jpg"));
    let resp = h
        .teacher
        .post(fixture.url("/teacher/lectures"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Not an image
    let form = multipart::Form::new()
        .text("date", "2026-10-01")
        .part("images", image_part("a.jpg"))
        .part("images", image_part("notes.txt"));
    let resp = h
        .teacher
        .post(fixture.url("/teacher/lectures"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    assert_eq!(fixture.media_files("Lectures"), 0);
    let reports = get_json(&h.teacher, &fixture.url("/teacher/reports")).await;
    assert!(reports["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_staging_and_commit() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    let first = fixture.submit_lecture(&h.teacher, "2026-10-01", &[]).await;
    let second = fixture.submit_lecture(&h.teacher, "2026-10-02", &[]).await;
    let first_id = first["id"].as_str().unwrap();
    let second_id = second["id"].as_str().unwrap();

    let staging_url = fixture.url("/coordinator/staging");
    post_json(&h.coordinator, &staging_url, json!({ "reportId": first_id })).await;
    post_json(&h.coordinator, &staging_url, json!({ "reportId": second_id })).await;
    // Staging twice is a no-op
    let staging = post_json(&h.coordinator, &staging_url, json!({ "reportId": first_id })).await;
    let staged = staging["data"]["teacherReports"].as_array().unwrap();
    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0]["teacherName"], "teach1");

    // Unknown report
    let resp = h
        .coordinator
        .post(&staging_url)
        .json(&json!({ "reportId": "missing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Unstage one
    let resp = h
        .coordinator
        .delete(fixture.url(&format!("/coordinator/staging/{}", second_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let committed = post_json(
        &h.coordinator,
        &fixture.url("/coordinator/reports"),
        json!({ "name": "Week 40" }),
    )
    .await;
    assert_eq!(committed["data"]["name"], "Week 40");
    assert_eq!(committed["data"]["teacherReports"].as_array().unwrap().len(), 1);

    let staging = get_json(&h.coordinator, &staging_url).await;
    assert!(staging["data"]["teacherReports"].as_array().unwrap().is_empty());

    // Empty staging cannot be committed
    let resp = h
        .coordinator
        .post(fixture.url("/coordinator/reports"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // The head sees the committed bundle with its lecture resolved
    let views = get_json(
        &h.head,
        &fixture.url(&format!("/head/coordinators/{}/reports", h.coordinator_id)),
    )
    .await;
    let views = views["data"].as_array().unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0]["lectures"][0]["id"], first_id);

    let lecture = get_json(&h.head, &fixture.url(&format!("/head/lectures/{}", first_id))).await;
    assert_eq!(lecture["data"]["teacherId"], h.teacher_id.as_str());
}

#[tokio::test]
async fn test_clear_teacher_removes_reports_and_media() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    let report = fixture.submit_lecture(&h.teacher, "2026-10-01", &[]).await;
    fixture.submit_lecture(&h.teacher, "2026-10-02", &[]).await;
    post_json(
        &h.coordinator,
        &fixture.url("/coordinator/staging"),
        json!({ "reportId": report["id"] }),
    )
    .await;
    assert_eq!(fixture.media_files("Lectures"), 4);

    post_json(
        &h.coordinator,
        &fixture.url(&format!("/coordinator/teachers/{}/clear", h.teacher_id)),
        json!({}),
    )
    .await;

    let reports = get_json(&h.teacher, &fixture.url("/teacher/reports")).await;
    assert!(reports["data"].as_array().unwrap().is_empty());
    let staging = get_json(&h.coordinator, &fixture.url("/coordinator/staging")).await;
    assert!(staging["data"]["teacherReports"].as_array().unwrap().is_empty());
    assert_eq!(fixture.media_files("Lectures"), 0);
}

#[tokio::test]
async fn test_delete_teacher_cascades() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    fixture.add_student(&h.teacher, "Ana").await;
    fixture.submit_lecture(&h.teacher, "2026-10-01", &[]).await;

    let resp = h
        .coordinator
        .delete(fixture.url(&format!("/coordinator/teachers/{}", h.teacher_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The teacher's session no longer resolves
    let resp = h.teacher.get(fixture.url("/teacher/home")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let home = get_json(&h.coordinator, &fixture.url("/coordinator/home")).await;
    assert!(home["data"]["teachers"].as_array().unwrap().is_empty());
    assert_eq!(fixture.media_files("Lectures"), 0);

    // Gone for good
    let resp = h
        .coordinator
        .get(fixture.url(&format!("/coordinator/teachers/{}", h.teacher_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_reassign_teacher_moves_committed_refs() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    let report = fixture.submit_lecture(&h.teacher, "2026-10-01", &[]).await;
    post_json(
        &h.coordinator,
        &fixture.url("/coordinator/staging"),
        json!({ "reportId": report["id"] }),
    )
    .await;
    post_json(&h.coordinator, &fixture.url("/coordinator/reports"), json!({})).await;

    let target_id = post_json(&h.head, &fixture.url("/head/coordinators"), json!({
        "username": "coord2",
        "password": PASSWORD,
    }))
    .await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let summary = post_json(
        &h.head,
        &fixture.url(&format!("/head/teachers/{}/reassign", h.teacher_id)),
        json!({ "coordinatorId": target_id }),
    )
    .await;
    assert_eq!(summary["data"]["moved"], 1);
    assert_eq!(summary["data"]["createdReports"], 1);
    assert_eq!(summary["data"]["deletedReports"], 1);

    let old = get_json(
        &h.head,
        &fixture.url(&format!("/head/coordinators/{}/reports", h.coordinator_id)),
    )
    .await;
    assert!(old["data"].as_array().unwrap().is_empty());

    let new = get_json(
        &h.head,
        &fixture.url(&format!("/head/coordinators/{}/reports", target_id)),
    )
    .await;
    let new = new["data"].as_array().unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0]["name"], "Report 2026-10-01");

    // The new coordinator now manages the teacher
    let coord2 = fixture.login("coordinator", "coord2").await;
    let resp = coord2
        .get(fixture.url(&format!("/coordinator/teachers/{}", h.teacher_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Moving again to the same coordinator is rejected
    let resp = h
        .head
        .post(fixture.url(&format!("/head/teachers/{}/reassign", h.teacher_id)))
        .json(&json!({ "coordinatorId": target_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_reassign_rejects_teacher_of_another_head() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    fixture.register_head("head2").await;
    let head2 = fixture.login("head", "head2").await;
    let coord2_id = post_json(&head2, &fixture.url("/head/coordinators"), json!({
        "username": "coord2",
        "password": PASSWORD,
    }))
    .await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = head2
        .post(fixture.url(&format!("/head/teachers/{}/reassign", h.teacher_id)))
        .json(&json!({ "coordinatorId": coord2_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Still managed by the original coordinator
    let resp = h
        .coordinator
        .get(fixture.url(&format!("/coordinator/teachers/{}", h.teacher_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let coord2 = fixture.login("coordinator", "coord2").await;
    let resp = coord2
        .get(fixture.url(&format!("/coordinator/teachers/{}", h.teacher_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_report_window_accepts_any_day_count() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;
    fixture.submit_lecture(&h.teacher, "2026-10-01", &[]).await;

    for days in ["0", "1", "4294967295"] {
        let resp = h
            .teacher
            .get(fixture.url(&format!("/teacher/reports?days={}", days)))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "days={}", days);
    }

    let all = get_json(&h.teacher, &fixture.url("/teacher/reports?days=4294967295")).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_attendance_journal_and_clear() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    let form = multipart::Form::new()
        .part("attendancePhoto", image_part("me.jpg"))
        .text("latitude", "12.9716")
        .text("longitude", "77.5946");
    let resp = h
        .coordinator
        .post(fixture.url("/account/attendance"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let photo: Value = resp.json().await.unwrap();
    assert!(photo["data"]["location"]["address"].is_string());

    let journal = get_json(&h.coordinator, &fixture.url("/account/attendance")).await;
    assert_eq!(journal["data"]["attendancePhotos"].as_array().unwrap().len(), 1);
    assert_eq!(journal["data"]["present"], 1);

    post_json(
        &h.head,
        &fixture.url(&format!(
            "/head/coordinators/{}/clear-attendance",
            h.coordinator_id
        )),
        json!({}),
    )
    .await;

    let journal = get_json(&h.coordinator, &fixture.url("/account/attendance")).await;
    assert!(journal["data"]["attendancePhotos"].as_array().unwrap().is_empty());
    assert_eq!(journal["data"]["present"], 0);
}

#[tokio::test]
async fn test_account_username_and_password() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    post_json(&h.coordinator, &fixture.url("/coordinator/teachers"), json!({
        "username": "teach2",
        "password": PASSWORD,
    }))
    .await;

    // Taken by another teacher
    let resp = h
        .teacher
        .put(fixture.url("/account/username"))
        .json(&json!({ "newUsername": "teach2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = h
        .teacher
        .put(fixture.url("/account/username"))
        .json(&json!({ "newUsername": "teacher-one" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = h
        .teacher
        .put(fixture.url("/account/password"))
        .json(&json!({
            "oldPassword": "not-it",
            "newPassword": "another1",
            "confirmPassword": "another1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = h
        .teacher
        .put(fixture.url("/account/password"))
        .json(&json!({
            "oldPassword": PASSWORD,
            "newPassword": "another1",
            "confirmPassword": "mismatch",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = h
        .teacher
        .put(fixture.url("/account/password"))
        .json(&json!({
            "oldPassword": PASSWORD,
            "newPassword": "another1",
            "confirmPassword": "another1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .browser()
        .post(fixture.url("/auth/login/teacher"))
        .json(&json!({ "username": "teacher-one", "password": "another1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["redirect"], "/teacher/home");
}

#[tokio::test]
async fn test_profile_picture_replaces_previous() {
    let fixture = TestFixture::new().await;
    let h = fixture.hierarchy().await;

    for name in ["one.jpg", "two.jpg"] {
        let form = multipart::Form::new().part("photo", image_part(name));
        let resp = h
            .teacher
            .post(fixture.url("/account/picture"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    assert_eq!(fixture.media_files("Teachers"), 1);
    let settings = get_json(&h.teacher, &fixture.url("/account/settings")).await;
    assert_eq!(settings["data"]["user"]["picture"]["fieldname"], "photo");
}
