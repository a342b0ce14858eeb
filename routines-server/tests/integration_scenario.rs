use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use routines_server::engine::{EventBus, FixedClock, Routines};
use routines_server::{server, storage};
use routines_shared::api::{self, ReportPeriod, endpoints as ep, rest};
use routines_shared::auth::Role;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

const LOGIN_PATH: &str = "/api/v1/auth/login";
const FAMILY_ID: &str = "test-family";

struct TestServer {
    base: String,
    client: Client,
    handle: tokio::task::JoinHandle<()>,
    _tempdir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        Self::spawn_with(false).await
    }

    async fn spawn_with(allow_signup: bool) -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let (addr, handle) = match start_server(&db_path, allow_signup).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            handle,
            _tempdir: dir,
        })
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let body = self
            .request_expect(
                "POST",
                LOGIN_PATH,
                None,
                Some(json!({"username": username, "password": password})),
                StatusCode::OK,
            )
            .await;
        body.get("token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .expect("token missing from auth response")
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let url = format!("{}{}", self.base, path);
        let mut req = match method {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        let text = resp.text().await.unwrap();
        let val = if text.is_empty() {
            json!(null)
        } else {
            serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
        };
        (status, val)
    }

    async fn request_expect(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, path, token, body).await;
        assert_eq!(
            status, expected,
            "{method} {path} returned {status:?} with body {value:?}",
        );
        value
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(
    tmp_db: &Path,
    allow_signup: bool,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    // Low cost keeps the suite fast; production uses the default
    let guardian_hash = bcrypt::hash("secret123", 4).unwrap();
    let display_hash = bcrypt::hash("screen", 4).unwrap();
    let config: server::AppConfig = serde_json::from_value(json!({
        "jwt_secret": "testsecret",
        "allow_signup": allow_signup,
        "default_timezone": "UTC",
        "jobs": { "enabled": false, "horizon_days": 2 },
        "predefined_tasks": [
            { "id": "brush-teeth", "name": "Brush teeth", "default_points": 5 }
        ],
        "families": [{
            "id": FAMILY_ID,
            "name": "Test family",
            "timezone": "UTC",
            "accounts": [
                {
                    "username": "parent",
                    "password_hash": guardian_hash,
                    "role": "guardian",
                    "member_name": "Pat"
                },
                { "username": "screen", "password_hash": display_hash, "role": "display" }
            ]
        }]
    }))
    .unwrap();
    config.validate().unwrap();

    let store = storage::Store::connect_sqlite(tmp_db.to_str().unwrap())
        .await
        .expect("db");
    store
        .seed_from_config(&config.families, &config.predefined_tasks)
        .await
        .expect("seed");

    // Monday 2025-06-02, 07:00 UTC
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap());
    let routines = Routines::new(store, Arc::new(clock), EventBus::new());
    let state = server::AppState::with_routines(config, routines);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

fn family_path(suffix: &str) -> String {
    format!(
        "{}/{}",
        api::family_scope(FAMILY_ID),
        suffix.trim_start_matches('/')
    )
}

/// Creates a child, a task and a daily 08:00 schedule; returns the child id.
async fn seed_routine(server: &TestServer, token: &str) -> String {
    let child = server
        .request_expect(
            "POST",
            &family_path("members"),
            Some(token),
            Some(json!({"name": "Amy", "role": "child", "avatar_url": null})),
            StatusCode::CREATED,
        )
        .await;
    let child_id = child["id"].as_str().unwrap().to_string();
    let task = server
        .request_expect(
            "POST",
            &family_path("tasks"),
            Some(token),
            Some(json!({
                "predefined_task_id": "brush-teeth",
                "name": "Brush teeth",
                "description": null,
                "image_url": null,
                "voice_text": null
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(task["points_value"], 5, "points come from the template");
    let task_id = task["id"].as_str().unwrap();
    server
        .request_expect(
            "POST",
            &family_path("schedules"),
            Some(token),
            Some(json!({
                "task_id": task_id,
                "schedule_type": "daily",
                "scheduled_time": "08:00",
                "member_ids": [child_id]
            })),
            StatusCode::CREATED,
        )
        .await;
    child_id
}

#[tokio::test]
async fn public_endpoints_work() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    server
        .request_expect("GET", "/healthz", None, None, StatusCode::OK)
        .await;
    let version = server
        .request_expect("GET", "/api/v1/version", None, None, StatusCode::OK)
        .await;
    assert!(version.get("version").and_then(|v| v.as_str()).is_some());
    let typed = rest::server_version(&server.base).await.unwrap();
    assert_eq!(typed.version, env!("CARGO_PKG_VERSION"));

    let auth = rest::login(&server.base, "parent", "secret123").await.unwrap();
    assert_eq!(auth.family_id, FAMILY_ID);
    assert_eq!(auth.role, Role::Guardian);

    let (status, _) = server
        .request(
            "POST",
            LOGIN_PATH,
            None,
            Some(json!({"username": "parent", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let cases = [
        ("GET", family_path("members")),
        ("GET", family_path("tasks")),
        ("GET", family_path("schedules")),
        ("GET", family_path("today")),
        ("POST", family_path("logs/1/complete")),
        ("GET", family_path("reports/points")),
        ("GET", family_path("events")),
    ];
    for (method, path) in cases.iter() {
        server
            .request_expect(method, path, None, None, StatusCode::UNAUTHORIZED)
            .await;
    }
    server
        .request_expect(
            "GET",
            &family_path("members"),
            Some("not-a-jwt"),
            None,
            StatusCode::UNAUTHORIZED,
        )
        .await;
}

#[tokio::test]
async fn display_account_is_limited_to_today_and_completion() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let guardian = server.login("parent", "secret123").await;
    seed_routine(&server, &guardian).await;
    let screen = server.login("screen", "screen").await;

    let today = rest::today(&server.base, FAMILY_ID, &screen).await.unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(today[0].member_name, "Amy");
    assert_eq!(today[0].announcement, "Time for Brush teeth for Amy.");

    let forbidden = [
        ("GET", family_path("members")),
        ("POST", family_path("tasks")),
        ("GET", family_path("schedules")),
        ("POST", family_path("expand")),
        ("POST", ep::log_miss("", FAMILY_ID, today[0].log_id)),
        ("GET", family_path("reports/points")),
    ];
    for (method, path) in forbidden.iter() {
        server
            .request_expect(method, path, Some(&screen), None, StatusCode::FORBIDDEN)
            .await;
    }

    let done = rest::complete_log(&server.base, FAMILY_ID, &screen, today[0].log_id, None)
        .await
        .unwrap();
    assert_eq!(done.points_awarded, 5);
    assert!(
        rest::today(&server.base, FAMILY_ID, &screen)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn other_family_paths_are_forbidden() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let guardian = server.login("parent", "secret123").await;
    let path = format!("{}/members", api::family_scope("someone-else"));
    server
        .request_expect("GET", &path, Some(&guardian), None, StatusCode::FORBIDDEN)
        .await;
}

#[tokio::test]
async fn routine_scenario_end_to_end() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.login("parent", "secret123").await;
    let child_id = seed_routine(&server, &token).await;

    let schedules = server
        .request_expect("GET", &family_path("schedules"), Some(&token), None, StatusCode::OK)
        .await;
    let schedule = &schedules.as_array().unwrap()[0];
    assert_eq!(schedule["scheduled_time"], "08:00:00");
    assert_eq!(schedule["duration_minutes"], 60);
    assert_eq!(schedule["member_ids"], json!([child_id]));
    let schedule_id = schedule["id"].as_str().unwrap().to_string();

    // Saving already materialized today plus the two day horizon
    let expanded = server
        .request_expect(
            "POST",
            &family_path("expand"),
            Some(&token),
            Some(json!({"from": "2025-05-31", "to": "2025-06-04"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(expanded["created"], 2);
    assert_eq!(expanded["skipped"], 3);

    let again = server
        .request_expect(
            "POST",
            &ep::schedule_expand("", FAMILY_ID, &schedule_id),
            Some(&token),
            Some(json!({"from": "2025-05-31", "to": "2025-06-04"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(again["created"], 0);

    // Complete yesterday and the day before, then today
    let mut last = Value::Null;
    for date in ["2025-05-31", "2025-06-01", "2025-06-02"] {
        let logs = server
            .request_expect(
                "GET",
                &family_path(&format!("logs?date={date}&status=pending")),
                Some(&token),
                None,
                StatusCode::OK,
            )
            .await;
        let log_id = logs[0]["id"].as_i64().unwrap();
        last = server
            .request_expect(
                "POST",
                &family_path(&format!("logs/{log_id}/complete")),
                Some(&token),
                Some(json!({"notes": "well done"})),
                StatusCode::OK,
            )
            .await;
    }
    assert_eq!(last["status"], "completed");
    assert_eq!(last["current_streak"], 3);
    assert_eq!(last["points_awarded"], 5);

    let log_id = last["log_id"].as_i64().unwrap();
    let conflict = server
        .request_expect(
            "POST",
            &family_path(&format!("logs/{log_id}/complete")),
            Some(&token),
            None,
            StatusCode::CONFLICT,
        )
        .await;
    assert!(conflict["error"].as_str().unwrap().contains("already completed"));

    let points = rest::member_points(&server.base, FAMILY_ID, &token)
        .await
        .unwrap();
    let amy = points.iter().find(|p| p.member_id == child_id).unwrap();
    assert_eq!(amy.total_points, 15);
    assert_eq!(amy.tasks_completed, 3);

    let streaks = server
        .request_expect(
            "GET",
            &ep::report_streaks("", FAMILY_ID),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(streaks[0]["current_streak"], 3);

    let week = server
        .request_expect(
            "GET",
            &ep::report_daily("", FAMILY_ID, ReportPeriod::Week),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    // 05-31 .. 06-02; future days are outside the period
    assert_eq!(week.as_array().unwrap().len(), 3);
    assert_eq!(week[0]["due_date"], "2025-06-02");

    // Miss tomorrow's occurrence explicitly
    let tomorrow = server
        .request_expect(
            "GET",
            &ep::logs_on("", FAMILY_ID, chrono::NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    let tomorrow_id = tomorrow[0]["id"].as_i64().unwrap() as i32;
    let missed = server
        .request_expect(
            "POST",
            &ep::log_miss("", FAMILY_ID, tomorrow_id),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(missed["current_streak"], 0);
    assert_eq!(missed["longest_streak"], 3);
}

#[tokio::test]
async fn invalid_schedules_are_bad_requests() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.login("parent", "secret123").await;
    let task = rest::create_task(
        &server.base,
        FAMILY_ID,
        &token,
        &api::TaskReq {
            predefined_task_id: None,
            name: "Homework".into(),
            description: Some("Maths first".into()),
            points_value: Some(20),
            image_url: None,
            voice_text: None,
        },
    )
    .await
    .unwrap();
    let task_id = task.id.as_str();

    let bad = [
        json!({"task_id": task_id, "schedule_type": "weekdays", "scheduled_time": "08:00", "member_ids": []}),
        json!({"task_id": task_id, "schedule_type": "daily", "scheduled_time": "08:00", "weekdays": [1], "member_ids": []}),
        json!({"task_id": task_id, "schedule_type": "date", "scheduled_time": "08:00", "member_ids": []}),
        json!({"task_id": task_id, "schedule_type": "weekdays", "scheduled_time": "08:00", "weekdays": [9], "member_ids": []}),
        json!({"task_id": task_id, "schedule_type": "daily", "scheduled_time": "late", "member_ids": []}),
        json!({"task_id": task_id, "schedule_type": "daily", "scheduled_time": "08:00", "member_ids": ["nobody"]}),
    ];
    for body in bad {
        server
            .request_expect(
                "POST",
                &family_path("schedules"),
                Some(&token),
                Some(body),
                StatusCode::BAD_REQUEST,
            )
            .await;
    }
    server
        .request_expect(
            "POST",
            &family_path("schedules"),
            Some(&token),
            Some(json!({"task_id": "missing", "schedule_type": "daily", "scheduled_time": "08:00", "member_ids": []})),
            StatusCode::NOT_FOUND,
        )
        .await;
    server
        .request_expect(
            "POST",
            &family_path("expand"),
            Some(&token),
            Some(json!({"from": "2025-06-05", "to": "2025-06-01"})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    // A one-off date schedule with nobody assigned is still valid
    let saved = rest::create_schedule(
        &server.base,
        FAMILY_ID,
        &token,
        &api::ScheduleReq {
            task_id: task.id.clone(),
            schedule_type: routines_shared::domain::ScheduleType::Date,
            scheduled_time: "16:30".into(),
            duration_minutes: Some(45),
            weekdays: None,
            scheduled_date: chrono::NaiveDate::from_ymd_opt(2025, 6, 20),
            member_ids: vec![],
        },
    )
    .await
    .unwrap();
    assert_eq!(saved.task_name, "Homework");
    assert_eq!(saved.duration_minutes, 45);
    assert!(saved.member_ids.is_empty());
}

#[tokio::test]
async fn members_and_tasks_crud() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.login("parent", "secret123").await;

    let members = rest::list_members(&server.base, FAMILY_ID, &token)
        .await
        .unwrap();
    assert_eq!(members.len(), 1, "seeded guardian member");
    assert_eq!(members[0].account.as_deref(), Some("parent"));

    let created = rest::create_member(
        &server.base,
        FAMILY_ID,
        &token,
        &api::MemberReq {
            name: "Bo".into(),
            role: routines_shared::domain::MemberRole::Child,
            avatar_url: Some("https://example.test/bo.png".into()),
            is_active: None,
        },
    )
    .await
    .unwrap();
    assert!(created.is_active);

    let updated = server
        .request_expect(
            "PUT",
            &ep::member("", FAMILY_ID, &created.id),
            Some(&token),
            Some(json!({"name": "Bobby", "role": "child", "avatar_url": null, "is_active": false})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(updated["name"], "Bobby");
    assert_eq!(updated["is_active"], false);
    let fetched = server
        .request_expect(
            "GET",
            &ep::member("", FAMILY_ID, &created.id),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(fetched, updated);

    // Leaving out is_active keeps the member disabled
    let renamed = server
        .request_expect(
            "PUT",
            &ep::member("", FAMILY_ID, &created.id),
            Some(&token),
            Some(json!({"name": "Bo", "role": "child"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(renamed["name"], "Bo");
    assert_eq!(renamed["is_active"], false);

    server
        .request_expect(
            "DELETE",
            &ep::member("", FAMILY_ID, &created.id),
            Some(&token),
            None,
            StatusCode::NO_CONTENT,
        )
        .await;
    server
        .request_expect(
            "DELETE",
            &ep::member("", FAMILY_ID, &created.id),
            Some(&token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;

    let catalog = server
        .request_expect(
            "GET",
            &ep::predefined_tasks("", FAMILY_ID),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(catalog[0]["id"], "brush-teeth");

    let task = server
        .request_expect(
            "POST",
            &family_path("tasks"),
            Some(&token),
            Some(json!({"name": "Tidy room", "points_value": 15, "voice_text": "Tidy up time!"})),
            StatusCode::CREATED,
        )
        .await;
    let task_id = task["id"].as_str().unwrap();
    let fetched = server
        .request_expect(
            "GET",
            &ep::task("", FAMILY_ID, task_id),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(fetched["voice_text"], "Tidy up time!");
    server
        .request_expect(
            "PUT",
            &ep::task("", FAMILY_ID, task_id),
            Some(&token),
            Some(json!({"name": "Tidy room", "points_value": -1})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    server
        .request_expect(
            "DELETE",
            &ep::task("", FAMILY_ID, task_id),
            Some(&token),
            None,
            StatusCode::NO_CONTENT,
        )
        .await;
    let tasks = server
        .request_expect("GET", &family_path("tasks"), Some(&token), None, StatusCode::OK)
        .await;
    assert!(tasks.as_array().unwrap().is_empty());
}

#[test]
fn horizon_beyond_the_expansion_window_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let yaml = |horizon: u32| {
        format!(
            "jwt_secret: \"s3cret\"\ndefault_timezone: \"UTC\"\njobs:\n  horizon_days: {horizon}\n"
        )
    };

    std::fs::write(&path, yaml(365)).unwrap();
    let cfg = server::AppConfig::load_from_path(&path).unwrap();
    assert_eq!(cfg.jobs.horizon_days, 365);

    std::fs::write(&path, yaml(400)).unwrap();
    let err = server::AppConfig::load_from_path(&path).unwrap_err();
    assert!(matches!(err, server::ConfigError::Invalid(_)), "{err:?}");
}

#[tokio::test]
async fn signup_creates_an_isolated_family() {
    let Some(closed) = TestServer::spawn().await else {
        return;
    };
    let req = api::SignupReq {
        family_name: "Newcomers".into(),
        guardian_name: "Nia".into(),
        username: "nia".into(),
        password: "longenough".into(),
        timezone: Some("Europe/Warsaw".into()),
    };
    match rest::signup(&closed.base, &req).await {
        Err(rest::RestError::Status { status, .. }) => assert_eq!(status, 403),
        other => panic!("signup should be disabled: {other:?}"),
    }

    let Some(server) = TestServer::spawn_with(true).await else {
        return;
    };
    let resp = rest::signup(&server.base, &req).await.unwrap();
    assert_ne!(resp.family_id, FAMILY_ID);
    let members = rest::list_members(&server.base, &resp.family_id, &resp.token)
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, resp.member_id);

    match rest::signup(&server.base, &req).await {
        Err(rest::RestError::Status { status, .. }) => assert_eq!(status, 409),
        other => panic!("duplicate username should conflict: {other:?}"),
    }

    // The new guardian cannot reach the seeded family
    let path = format!("{}/members", api::family_scope(FAMILY_ID));
    server
        .request_expect("GET", &path, Some(&resp.token), None, StatusCode::FORBIDDEN)
        .await;
}

#[tokio::test]
async fn schedule_edits_follow_through_to_today() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.login("parent", "secret123").await;
    let child_id = seed_routine(&server, &token).await;
    let schedules = server
        .request_expect("GET", &ep::schedules("", FAMILY_ID), Some(&token), None, StatusCode::OK)
        .await;
    let schedule_id = schedules[0]["id"].as_str().unwrap().to_string();
    let task_id = schedules[0]["task_id"].as_str().unwrap().to_string();

    server
        .request_expect(
            "PUT",
            &ep::schedule("", FAMILY_ID, &schedule_id),
            Some(&token),
            Some(json!({
                "task_id": task_id,
                "schedule_type": "daily",
                "scheduled_time": "09:15",
                "member_ids": [child_id]
            })),
            StatusCode::OK,
        )
        .await;
    let fetched = server
        .request_expect(
            "GET",
            &ep::schedule("", FAMILY_ID, &schedule_id),
            Some(&token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(fetched["scheduled_time"], "09:15:00");
    let today = rest::today(&server.base, FAMILY_ID, &token).await.unwrap();
    assert_eq!(today.len(), 1, "pending log is retimed, not duplicated");
    assert_eq!(today[0].due_time.format("%H:%M").to_string(), "09:15");

    server
        .request_expect(
            "DELETE",
            &ep::schedule("", FAMILY_ID, &schedule_id),
            Some(&token),
            None,
            StatusCode::NO_CONTENT,
        )
        .await;
    assert!(
        rest::today(&server.base, FAMILY_ID, &token)
            .await
            .unwrap()
            .is_empty()
    );
    server
        .request_expect(
            "DELETE",
            &ep::schedule("", FAMILY_ID, &schedule_id),
            Some(&token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
}

#[tokio::test]
async fn sweep_marks_overdue_logs_missed() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let token = server.login("parent", "secret123").await;
    let child_id = seed_routine(&server, &token).await;
    let report = rest::expand_family(
        &server.base,
        FAMILY_ID,
        &token,
        &api::ExpandReq {
            from: chrono::NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
            to: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        },
    )
    .await
    .unwrap();
    assert_eq!(report.created, 2);

    // Today's 08:00 occurrence is not due yet at 07:00
    let swept = server
        .request_expect("POST", &ep::sweep("", FAMILY_ID), Some(&token), None, StatusCode::OK)
        .await;
    assert_eq!(swept["missed"], 2);
    let swept = server
        .request_expect("POST", &ep::sweep("", FAMILY_ID), Some(&token), None, StatusCode::OK)
        .await;
    assert_eq!(swept["missed"], 0);

    let points = rest::member_points(&server.base, FAMILY_ID, &token)
        .await
        .unwrap();
    let amy = points.iter().find(|p| p.member_id == child_id).unwrap();
    assert_eq!(amy.tasks_missed, 2);
    assert_eq!(amy.total_points, 0);
    assert_eq!(rest::today(&server.base, FAMILY_ID, &token).await.unwrap().len(), 1);
}

#[tokio::test]
async fn event_stream_accepts_query_token() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let guardian = server.login("parent", "secret123").await;
    seed_routine(&server, &guardian).await;
    let screen = server.login("screen", "screen").await;

    let mut stream = server
        .client
        .get(ep::events(&server.base, FAMILY_ID, &screen))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status().as_u16(), 200);
    let content_type = stream
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");

    let today = rest::today(&server.base, FAMILY_ID, &guardian).await.unwrap();
    let log_id = today[0].log_id;
    rest::complete_log(&server.base, FAMILY_ID, &guardian, log_id, Some("done"))
        .await
        .unwrap();

    let mut buf = String::new();
    let found = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while let Some(chunk) = stream.chunk().await.unwrap() {
            buf.push_str(&String::from_utf8_lossy(&chunk));
            if buf.contains("event: change") && buf.contains("logs_changed") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "no change event in stream: {buf}");
    assert!(buf.contains(&format!("[{log_id}]")));

    // Query tokens are only honored for the event stream
    let leaked = format!("{}?token={}", ep::today(&server.base, FAMILY_ID), screen);
    let resp = server.client.get(leaked).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}
