mod acl;
pub mod auth;
mod config;
mod events;
pub mod jobs;

use std::sync::Arc;

use crate::engine::expand::DateWindow;
use crate::engine::schedule::{DEFAULT_DURATION_MINUTES, ScheduleDef, parse_time};
use crate::engine::{EngineError, EventBus, Routines, SystemClock};
use crate::server::auth::AuthCtx;
use crate::storage::logs::LogView;
use crate::storage::members::{MemberWrite, TaskWrite};
use crate::storage::models::{Member, Task, TaskSchedule};
use crate::storage::schedules::ScheduleWrite;
use crate::storage::{Store, StorageError};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use bcrypt::verify;
use chrono::{Days, Months, NaiveDate};
use routines_shared::api;
use routines_shared::auth::Role;
use routines_shared::domain::{LogStatus, MemberRole, ScheduleType, WeekdaySet};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

pub use config::{
    AccountSeed, AppConfig, ConfigError, DEFAULT_LISTEN_PORT, FamilySeed, JobsConfig,
    PredefinedTaskSeed,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub routines: Routines,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store) -> Self {
        let routines = Routines::new(store.clone(), Arc::new(SystemClock), EventBus::new());
        Self::with_routines(config, routines)
    }

    /// Builds state around an existing engine, e.g. one driven by a fixed clock.
    pub fn with_routines(config: AppConfig, routines: Routines) -> Self {
        Self {
            config: Arc::new(config),
            store: routines.store().clone(),
            routines,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Window the background job keeps expanded, starting today.
    async fn horizon(&self, family: &str) -> Result<DateWindow, AppError> {
        let today = self.routines.today(family).await?;
        let end = today
            .checked_add_days(Days::new(u64::from(self.config.jobs.horizon_days)))
            .unwrap_or(today);
        Ok(DateWindow::new(today, end)?)
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let private = Router::new()
        .route(
            "/api/v1/family/{family_id}/members",
            get(api_list_members).post(api_create_member),
        )
        .route(
            "/api/v1/family/{family_id}/members/{id}",
            get(api_get_member)
                .put(api_update_member)
                .delete(api_delete_member),
        )
        .route(
            "/api/v1/family/{family_id}/predefined-tasks",
            get(api_list_predefined_tasks),
        )
        .route(
            "/api/v1/family/{family_id}/tasks",
            get(api_list_tasks).post(api_create_task),
        )
        .route(
            "/api/v1/family/{family_id}/tasks/{id}",
            get(api_get_task)
                .put(api_update_task)
                .delete(api_delete_task),
        )
        .route(
            "/api/v1/family/{family_id}/schedules",
            get(api_list_schedules).post(api_create_schedule),
        )
        .route(
            "/api/v1/family/{family_id}/schedules/{id}",
            get(api_get_schedule)
                .put(api_update_schedule)
                .delete(api_delete_schedule),
        )
        .route(
            "/api/v1/family/{family_id}/schedules/{id}/expand",
            post(api_expand_schedule),
        )
        .route("/api/v1/family/{family_id}/expand", post(api_expand_family))
        .route("/api/v1/family/{family_id}/sweep", post(api_sweep))
        .route("/api/v1/family/{family_id}/today", get(api_today))
        .route("/api/v1/family/{family_id}/logs", get(api_list_logs))
        .route(
            "/api/v1/family/{family_id}/logs/{id}/complete",
            post(api_complete_log),
        )
        .route(
            "/api/v1/family/{family_id}/logs/{id}/miss",
            post(api_miss_log),
        )
        .route(
            "/api/v1/family/{family_id}/reports/points",
            get(api_report_points),
        )
        .route(
            "/api/v1/family/{family_id}/reports/streaks",
            get(api_report_streaks),
        )
        .route(
            "/api/v1/family/{family_id}/reports/daily",
            get(api_report_daily),
        )
        .route("/api/v1/family/{family_id}/events", get(events::api_events))
        .with_state(state.clone())
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            username = tracing::field::Empty,
            role = tracing::field::Empty,
            family_id = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/version", get(api_version))
        .route("/api/v1/auth/login", post(api_auth_login))
        .route("/api/v1/auth/signup", post(api_auth_signup))
        .merge(private)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn api_version() -> Json<api::VersionInfoDto> {
    Json(api::VersionInfoDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    // HSTS is only honored on HTTPS; harmless otherwise
    headers.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    // Disable caching for API and health endpoints
    if path == "/healthz" || path.starts_with("/api/") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(
            HeaderName::from_static("pragma"),
            HeaderValue::from_static("no-cache"),
        );
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("username", tracing::field::display(&auth.claims.sub));
        span.record("role", tracing::field::display(auth.role().as_str()));
        span.record("family_id", tracing::field::display(&auth.claims.family_id));
    }
    Ok(next.run(req).await)
}

// DTO mapping

fn member_dto(m: Member) -> Result<api::MemberDto, AppError> {
    let role = m.role.parse::<MemberRole>().map_err(AppError::internal)?;
    Ok(api::MemberDto {
        id: m.id,
        family_id: m.family_id,
        account: m.account,
        name: m.name,
        role,
        avatar_url: m.avatar_url,
        is_active: m.is_active,
    })
}

fn task_dto(t: Task) -> api::TaskDto {
    api::TaskDto {
        id: t.id,
        family_id: t.family_id,
        predefined_task_id: t.predefined_task_id,
        name: t.name,
        description: t.description,
        points_value: t.points_value,
        image_url: t.image_url,
        voice_text: t.voice_text,
    }
}

fn schedule_dto(
    s: TaskSchedule,
    task: &Task,
    member_ids: Vec<String>,
) -> Result<api::ScheduleDto, AppError> {
    let schedule_type = s
        .schedule_type
        .parse::<ScheduleType>()
        .map_err(AppError::internal)?;
    let weekdays = s
        .weekdays
        .as_deref()
        .map(WeekdaySet::parse_db)
        .transpose()
        .map_err(AppError::internal)?
        .map(|w| w.indices());
    Ok(api::ScheduleDto {
        id: s.id,
        task_id: s.task_id,
        task_name: task.name.clone(),
        schedule_type,
        scheduled_time: s.scheduled_time,
        duration_minutes: s.duration_minutes,
        weekdays,
        scheduled_date: s.scheduled_date,
        member_ids,
    })
}

fn log_dto(v: LogView) -> Result<api::TaskLogDto, AppError> {
    let status = v.status()?;
    Ok(api::TaskLogDto {
        id: v.log.id,
        assignment_id: v.log.assignment_id,
        member_id: v.member.id,
        member_name: v.member.name,
        task_id: v.task.id,
        task_name: v.task.name,
        due_date: v.log.due_date,
        due_time: v.log.due_time,
        status,
        completed_at: v.log.completed_at.map(|dt| {
            chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(dt, chrono::Utc)
                .to_rfc3339()
        }),
        notes: v.log.notes,
    })
}

fn non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    Ok(())
}

// Auth

async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<api::AuthReq>,
) -> Result<Json<api::AuthResp>, AppError> {
    let account = state
        .store
        .get_account(&body.username)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| {
            tracing::warn!(username=%body.username, "login: unknown username");
            AppError::unauthorized()
        })?;
    if !verify(&body.password, &account.password_hash).map_err(|e| {
        tracing::error!(username=%body.username, error=%e, "login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        tracing::warn!(username=%body.username, "login: invalid password");
        return Err(AppError::unauthorized());
    }
    let role = Role::parse(&account.role)
        .ok_or_else(|| AppError::internal(format!("unknown role {}", account.role)))?;
    let token = auth::issue_jwt_for_account(&state, &account).await?;
    tracing::info!(username=%account.username, family_id=%account.family_id, "login ok");
    Ok(Json(api::AuthResp {
        token,
        family_id: account.family_id,
        role,
    }))
}

async fn api_auth_signup(
    State(state): State<AppState>,
    Json(body): Json<api::SignupReq>,
) -> Result<Json<api::SignupResp>, AppError> {
    if !state.config.allow_signup {
        tracing::warn!(username=%body.username, "signup: disabled");
        return Err(AppError::forbidden());
    }
    non_empty("family_name", &body.family_name)?;
    non_empty("guardian_name", &body.guardian_name)?;
    non_empty("username", &body.username)?;
    if body.password.len() < 6 {
        return Err(AppError::bad_request("password must be at least 6 characters"));
    }
    let timezone = body
        .timezone
        .clone()
        .unwrap_or_else(|| state.config.default_timezone.clone());
    if crate::engine::clock::parse_timezone(&timezone).is_none() {
        return Err(AppError::bad_request(format!("unknown time zone: {timezone}")));
    }
    let password = body.password.clone();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)?;
    let (family_id, member_id) = state
        .store
        .create_family_with_guardian(
            body.family_name.trim(),
            &timezone,
            body.guardian_name.trim(),
            body.username.trim(),
            &hash,
        )
        .await?;
    let account = state
        .store
        .get_account(body.username.trim())
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::internal("account missing after signup"))?;
    let token = auth::issue_jwt_for_account(&state, &account).await?;
    tracing::info!(family_id=%family_id, username=%account.username, "signup: family created");
    Ok(Json(api::SignupResp {
        token,
        family_id,
        member_id,
    }))
}

// Members

async fn api_list_members(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<api::MemberDto>>, AppError> {
    let rows = state.store.list_members(&family_id).await?;
    let items = rows
        .into_iter()
        .map(member_dto)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

fn member_write(body: api::MemberReq) -> Result<MemberWrite, AppError> {
    non_empty("name", &body.name)?;
    Ok(MemberWrite {
        name: body.name.trim().to_string(),
        role: body.role.as_str().to_string(),
        avatar_url: body.avatar_url,
        is_active: body.is_active,
    })
}

async fn api_create_member(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<api::MemberReq>,
) -> Result<(StatusCode, Json<api::MemberDto>), AppError> {
    let member = state
        .store
        .create_member(&family_id, member_write(body)?)
        .await?;
    tracing::info!(family_id=%family_id, member_id=%member.id, "member created");
    Ok((StatusCode::CREATED, Json(member_dto(member)?)))
}

async fn api_get_member(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
) -> Result<Json<api::MemberDto>, AppError> {
    let member = state
        .store
        .get_member(&family_id, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("member {id}")))?;
    Ok(Json(member_dto(member)?))
}

async fn api_update_member(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
    Json(body): Json<api::MemberReq>,
) -> Result<Json<api::MemberDto>, AppError> {
    let member = state
        .routines
        .update_member(&family_id, &id, member_write(body)?)
        .await?;
    Ok(Json(member_dto(member)?))
}

async fn api_delete_member(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_member(&family_id, &id).await? {
        tracing::info!(family_id=%family_id, member_id=%id, "member deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("member {id}")))
    }
}

// Tasks

async fn api_list_predefined_tasks(
    State(state): State<AppState>,
) -> Result<Json<Vec<api::PredefinedTaskDto>>, AppError> {
    let rows = state.store.list_predefined_tasks().await?;
    Ok(Json(
        rows.into_iter()
            .map(|p| api::PredefinedTaskDto {
                id: p.id,
                name: p.name,
                description: p.description,
                default_points: p.default_points,
            })
            .collect(),
    ))
}

async fn api_list_tasks(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<api::TaskDto>>, AppError> {
    let rows = state.store.list_tasks(&family_id).await?;
    Ok(Json(rows.into_iter().map(task_dto).collect()))
}

/// Points default to the catalog template's value when a task is based on one.
async fn task_write(state: &AppState, body: api::TaskReq) -> Result<TaskWrite, AppError> {
    non_empty("name", &body.name)?;
    let template = match body.predefined_task_id.as_deref() {
        Some(pid) => Some(
            state
                .store
                .get_predefined_task(pid)
                .await?
                .ok_or_else(|| AppError::bad_request(format!("unknown predefined_task_id: {pid}")))?,
        ),
        None => None,
    };
    let points_value = body
        .points_value
        .or(template.as_ref().map(|t| t.default_points))
        .unwrap_or(0);
    if points_value < 0 {
        return Err(AppError::bad_request("points_value must not be negative"));
    }
    Ok(TaskWrite {
        predefined_task_id: body.predefined_task_id,
        name: body.name.trim().to_string(),
        description: body.description,
        points_value,
        image_url: body.image_url,
        voice_text: body.voice_text,
    })
}

async fn api_create_task(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<api::TaskReq>,
) -> Result<(StatusCode, Json<api::TaskDto>), AppError> {
    let input = task_write(&state, body).await?;
    let task = state.store.create_task(&family_id, input).await?;
    tracing::info!(family_id=%family_id, task_id=%task.id, "task created");
    Ok((StatusCode::CREATED, Json(task_dto(task))))
}

async fn api_get_task(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
) -> Result<Json<api::TaskDto>, AppError> {
    let task = state
        .store
        .get_task(&family_id, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("task {id}")))?;
    Ok(Json(task_dto(task)))
}

async fn api_update_task(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
    Json(body): Json<api::TaskReq>,
) -> Result<Json<api::TaskDto>, AppError> {
    let input = task_write(&state, body).await?;
    let task = state.store.update_task(&family_id, &id, input).await?;
    Ok(Json(task_dto(task)))
}

async fn api_delete_task(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_task(&family_id, &id).await? {
        tracing::info!(family_id=%family_id, task_id=%id, "task deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("task {id}")))
    }
}

// Schedules

async fn api_list_schedules(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<api::ScheduleDto>>, AppError> {
    let rows = state.store.list_schedules(&family_id).await?;
    let items = rows
        .into_iter()
        .map(|(s, t, members)| schedule_dto(s, &t, members))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

fn schedule_write(body: api::ScheduleReq) -> Result<ScheduleWrite, AppError> {
    let time = parse_time(&body.scheduled_time)?;
    let def = ScheduleDef::from_raw(
        body.schedule_type,
        body.weekdays.as_deref(),
        body.scheduled_date,
        time,
        body.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
    )?;
    Ok(ScheduleWrite {
        task_id: body.task_id,
        def,
        member_ids: body.member_ids,
    })
}

/// Saves, then materializes the job horizon so the display sees the change
/// without waiting for the next background tick.
async fn save_schedule(
    state: &AppState,
    family_id: &str,
    schedule_id: Option<&str>,
    body: api::ScheduleReq,
) -> Result<api::ScheduleDto, AppError> {
    let input = schedule_write(body)?;
    let saved = state
        .routines
        .save_schedule(family_id, schedule_id, input)
        .await?;
    let window = state.horizon(family_id).await?;
    state
        .routines
        .expand_schedule(family_id, &saved.schedule.id, window)
        .await?;
    schedule_dto(saved.schedule, &saved.task, saved.member_ids)
}

async fn api_create_schedule(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<api::ScheduleReq>,
) -> Result<(StatusCode, Json<api::ScheduleDto>), AppError> {
    let dto = save_schedule(&state, &family_id, None, body).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

async fn api_get_schedule(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
) -> Result<Json<api::ScheduleDto>, AppError> {
    let (schedule, task, members) = state
        .store
        .get_schedule(&family_id, &id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("schedule {id}")))?;
    Ok(Json(schedule_dto(schedule, &task, members)?))
}

async fn api_update_schedule(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
    Json(body): Json<api::ScheduleReq>,
) -> Result<Json<api::ScheduleDto>, AppError> {
    Ok(Json(save_schedule(&state, &family_id, Some(&id), body).await?))
}

async fn api_delete_schedule(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.routines.delete_schedule(&family_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Expansion and sweep

async fn api_expand_schedule(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, String)>,
    Json(body): Json<api::ExpandReq>,
) -> Result<Json<api::ExpandResp>, AppError> {
    let window = DateWindow::new(body.from, body.to)?;
    let report = state
        .routines
        .expand_schedule(&family_id, &id, window)
        .await?;
    Ok(Json(api::ExpandResp {
        created: report.created.len(),
        skipped: report.skipped,
    }))
}

async fn api_expand_family(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<api::ExpandReq>,
) -> Result<Json<api::ExpandResp>, AppError> {
    let window = DateWindow::new(body.from, body.to)?;
    let report = state.routines.expand_family(&family_id, window).await?;
    Ok(Json(api::ExpandResp {
        created: report.created.len(),
        skipped: report.skipped,
    }))
}

async fn api_sweep(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<api::SweepResp>, AppError> {
    let grace = chrono::Duration::minutes(state.config.jobs.miss_grace_minutes);
    let missed = state.routines.sweep(&family_id, grace).await?;
    Ok(Json(api::SweepResp { missed }))
}

// Logs

async fn api_today(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<api::ActiveTaskDto>>, AppError> {
    let rows = state.routines.pending_today(&family_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|a| api::ActiveTaskDto {
                log_id: a.view.log.id,
                due_time: a.view.log.due_time,
                announcement: a.announcement.spoken_text(),
                member_name: a.view.member.name,
                member_avatar_url: a.view.member.avatar_url,
                task_name: a.view.task.name,
                task_image_url: a.view.task.image_url,
                voice_text: a.view.task.voice_text,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    date: Option<NaiveDate>,
    status: Option<LogStatus>,
}

async fn api_list_logs(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Query(q): Query<LogsQuery>,
) -> Result<Json<Vec<api::TaskLogDto>>, AppError> {
    let date = match q.date {
        Some(d) => d,
        None => state.routines.today(&family_id).await?,
    };
    let rows = state.store.list_logs(&family_id, date, q.status).await?;
    let items = rows
        .into_iter()
        .map(log_dto)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

fn transition_resp(r: crate::engine::service::TransitionReport) -> api::TransitionResp {
    api::TransitionResp {
        log_id: r.view.log.id,
        status: r.status,
        points_awarded: r.points_awarded,
        current_streak: r.streak.current,
        longest_streak: r.streak.longest,
    }
}

/// The body is optional; the display posts without one.
async fn api_complete_log(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, i32)>,
    body: axum::body::Bytes,
) -> Result<Json<api::TransitionResp>, AppError> {
    let req: api::CompleteReq = if body.is_empty() {
        api::CompleteReq::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("invalid body: {e}")))?
    };
    let notes = req.notes.filter(|n| !n.trim().is_empty());
    let report = state.routines.complete(&family_id, id, notes).await?;
    Ok(Json(transition_resp(report)))
}

async fn api_miss_log(
    State(state): State<AppState>,
    Path((family_id, id)): Path<(String, i32)>,
) -> Result<Json<api::TransitionResp>, AppError> {
    let report = state.routines.miss(&family_id, id).await?;
    Ok(Json(transition_resp(report)))
}

// Reports

async fn api_report_points(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<api::MemberPointsDto>>, AppError> {
    let rows = state.store.member_points(&family_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| api::MemberPointsDto {
                member_id: r.member.id,
                member_name: r.member.name,
                avatar_url: r.member.avatar_url,
                total_points: r.total_points,
                tasks_completed: r.tasks_completed,
                tasks_missed: r.tasks_missed,
            })
            .collect(),
    ))
}

async fn api_report_streaks(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<api::MemberStreakDto>>, AppError> {
    let rows = state.store.member_streaks(&family_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|r| api::MemberStreakDto {
                member_id: r.member.id,
                member_name: r.member.name,
                task_name: r.task.name,
                current_streak: r.streak.current_streak,
                longest_streak: r.streak.longest_streak,
                last_completed_date: r.streak.last_completed_date,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct DailyQuery {
    #[serde(default)]
    period: api::ReportPeriod,
}

/// First day covered by `period`, inclusive of `today`.
pub fn period_start(period: api::ReportPeriod, today: NaiveDate) -> NaiveDate {
    match period {
        api::ReportPeriod::Today => today,
        api::ReportPeriod::Week => today.checked_sub_days(Days::new(6)).unwrap_or(today),
        api::ReportPeriod::Month => today.checked_sub_months(Months::new(1)).unwrap_or(today),
    }
}

async fn api_report_daily(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Query(q): Query<DailyQuery>,
) -> Result<Json<Vec<api::DailyReportItemDto>>, AppError> {
    let today = state.routines.today(&family_id).await?;
    let from = period_start(q.period, today);
    let rows = state.store.daily_report(&family_id, from, today).await?;
    let items = rows
        .into_iter()
        .map(|r| {
            let status = r.status.parse::<LogStatus>().map_err(AppError::internal)?;
            Ok(api::DailyReportItemDto {
                due_date: r.due_date,
                member_name: r.member_name,
                task_name: r.task_name,
                status,
                points_earned: r.points_earned,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    Ok(Json(items))
}

// Errors

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(m) => AppError::NotFound(m),
            StorageError::InvalidInput(m) => AppError::BadRequest(m),
            StorageError::Conflict(m) => AppError::Conflict(m),
            other => AppError::internal(other),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Validation(m) => AppError::BadRequest(m),
            EngineError::NotFound(m) => AppError::NotFound(m),
            EngineError::Conflict(m) => AppError::Conflict(m),
            EngineError::Storage(s) => AppError::from(s),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else if status.is_server_error() {
            tracing::error!(status = %status, kind = kind, message = %msg, "request failed");
        } else {
            tracing::warn!(status = %status, kind = kind, message = %msg, "request rejected");
        }
        let body = axum::Json(ErrorBody { error: msg });
        (status, body).into_response()
    }
}
