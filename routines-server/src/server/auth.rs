use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use routines_shared::auth::Role;
use routines_shared::jwt::{self, JwtClaims};
use tracing::{error, warn};

use super::{AppError, AppState};
use crate::storage::models::Account;

/// How many days before mandatory re-login.
const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: JwtClaims,
}

impl AuthCtx {
    pub fn role(&self) -> Role {
        self.claims.role
    }
}

/// Reads the bearer token from `Authorization`. Event streams may pass it as
/// `?token=` instead since browsers cannot set headers on `EventSource`.
fn extract_token(req: &Request<axum::body::Body>) -> Option<String> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let s = value.to_str().ok()?;
        return s.strip_prefix("Bearer ").map(|t| t.trim().to_string());
    }
    if !req.uri().path().ends_with("/events") {
        return None;
    }
    req.uri().query()?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == "token").then(|| {
            percent_encoding::percent_decode_str(v)
                .decode_utf8_lossy()
                .to_string()
        })
    })
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = extract_token(&req) else {
        return Err(AppError::unauthorized());
    };

    let claims = match jwt::decode_and_verify(&token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: jwt decode failed");
            return Err(AppError::unauthorized());
        }
    };

    // Accounts can be removed or moved after a token was issued
    let account = state.store.get_account(&claims.sub).await.map_err(|e| {
        error!(username=%claims.sub, error=%e, "auth: account lookup failed");
        AppError::internal(e)
    })?;
    let Some(account) = account else {
        warn!(username=%claims.sub, "auth: account no longer exists");
        return Err(AppError::unauthorized());
    };
    if account.family_id != claims.family_id || account.role != claims.role.as_str() {
        warn!(
            username=%claims.sub,
            token_family=%claims.family_id,
            account_family=%account.family_id,
            "auth: token does not match account"
        );
        return Err(AppError::unauthorized());
    }

    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}

pub async fn issue_jwt_for_account(state: &AppState, account: &Account) -> Result<String, AppError> {
    let role = Role::parse(&account.role).ok_or_else(|| {
        error!(username=%account.username, role=%account.role, "issue_jwt: unknown role");
        AppError::internal("account has unknown role")
    })?;
    let member_id = state
        .store
        .member_for_account(&account.username)
        .await
        .map_err(AppError::internal)?
        .map(|m| m.id);
    let claims = JwtClaims {
        sub: account.username.clone(),
        jti: uuid::Uuid::new_v4().to_string(),
        exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        role,
        family_id: account.family_id.clone(),
        member_id,
    };
    jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        error!(username=%account.username, error=%e, "login: jwt encode failed");
        AppError::internal(e)
    })
}
