//! Minimal REST client helpers for API consumers (display screens, scripts).
//! Feature-gated by `rest-client` to avoid pulling reqwest into the server.

use super::endpoints as ep;
use super::*;

pub use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("http: {0}")]
    Http(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("serde: {0}")]
    Serde(String),
}

fn mk_client() -> Result<reqwest::Client, RestError> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| RestError::Http(e.to_string()))
}

async fn handle_json<T: for<'de> serde::Deserialize<'de>>(
    res: reqwest::Response,
) -> Result<T, RestError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = res
        .bytes()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    serde_json::from_slice::<T>(&bytes).map_err(|e| RestError::Serde(e.to_string()))
}

async fn get_json<T: for<'de> serde::Deserialize<'de>>(
    url: String,
    bearer: &str,
) -> Result<T, RestError> {
    let client = mk_client()?;
    let res = client
        .get(url)
        .bearer_auth(bearer)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

async fn post_json<B: serde::Serialize, T: for<'de> serde::Deserialize<'de>>(
    url: String,
    bearer: &str,
    body: &B,
) -> Result<T, RestError> {
    let client = mk_client()?;
    let res = client
        .post(url)
        .bearer_auth(bearer)
        .json(body)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn login(base: &str, username: &str, password: &str) -> Result<AuthResp, RestError> {
    let client = mk_client()?;
    let body = AuthReq {
        username: username.to_string(),
        password: password.to_string(),
    };
    let res = client
        .post(ep::auth_login(base))
        .json(&body)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn signup(base: &str, req: &SignupReq) -> Result<SignupResp, RestError> {
    let client = mk_client()?;
    let res = client
        .post(ep::auth_signup(base))
        .json(req)
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn server_version(base: &str) -> Result<VersionInfoDto, RestError> {
    let client = mk_client()?;
    let res = client
        .get(ep::version(base))
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))?;
    handle_json(res).await
}

pub async fn list_members(
    base: &str,
    family_id: &str,
    bearer: &str,
) -> Result<Vec<MemberDto>, RestError> {
    get_json(ep::members(base, family_id), bearer).await
}

pub async fn create_member(
    base: &str,
    family_id: &str,
    bearer: &str,
    req: &MemberReq,
) -> Result<MemberDto, RestError> {
    post_json(ep::members(base, family_id), bearer, req).await
}

pub async fn create_task(
    base: &str,
    family_id: &str,
    bearer: &str,
    req: &TaskReq,
) -> Result<TaskDto, RestError> {
    post_json(ep::tasks(base, family_id), bearer, req).await
}

pub async fn create_schedule(
    base: &str,
    family_id: &str,
    bearer: &str,
    req: &ScheduleReq,
) -> Result<ScheduleDto, RestError> {
    post_json(ep::schedules(base, family_id), bearer, req).await
}

pub async fn expand_family(
    base: &str,
    family_id: &str,
    bearer: &str,
    req: &ExpandReq,
) -> Result<ExpandResp, RestError> {
    post_json(ep::family_expand(base, family_id), bearer, req).await
}

/// Today's pending list for the household display.
pub async fn today(
    base: &str,
    family_id: &str,
    bearer: &str,
) -> Result<Vec<ActiveTaskDto>, RestError> {
    get_json(ep::today(base, family_id), bearer).await
}

pub async fn complete_log(
    base: &str,
    family_id: &str,
    bearer: &str,
    log_id: i32,
    notes: Option<&str>,
) -> Result<TransitionResp, RestError> {
    let body = CompleteReq {
        notes: notes.map(|s| s.to_string()),
    };
    post_json(ep::log_complete(base, family_id, log_id), bearer, &body).await
}

pub async fn member_points(
    base: &str,
    family_id: &str,
    bearer: &str,
) -> Result<Vec<MemberPointsDto>, RestError> {
    get_json(ep::report_points(base, family_id), bearer).await
}
