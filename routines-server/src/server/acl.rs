use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use routines_shared::auth::Role;
use routines_shared::path::{family_id_from_path, family_relative_segments};

pub async fn enforce_acl(req: Request<axum::body::Body>, next: Next) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };
    let claims = &auth.claims;

    let Some(family) = family_id_from_path(&path) else {
        tracing::warn!(path = %path, "ACL: path outside family scope");
        return Err(AppError::forbidden());
    };
    if family != claims.family_id {
        tracing::warn!(
            path = %path,
            username = %claims.sub,
            token_family = %claims.family_id,
            "ACL: family mismatch"
        );
        return Err(AppError::forbidden());
    }
    let rest = family_relative_segments(&path).unwrap_or_default();
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    let decision = match claims.role {
        Role::Guardian => allow_guardian(&method, &rest),
        Role::Display => allow_display(&method, &rest),
    };

    if let Err(err) = decision {
        tracing::warn!(
            method = %method,
            path = %path,
            username = %claims.sub,
            role = ?claims.role,
            "ACL: no rule matched; denying"
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

fn is_id(seg: &str) -> bool {
    seg.parse::<i32>().is_ok()
}

fn allow_guardian(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    let get = *method == Method::GET;
    let post = *method == Method::POST;
    let put = *method == Method::PUT;
    let delete = *method == Method::DELETE;
    match rest {
        ["members"] | ["tasks"] | ["schedules"] if get || post => Ok(()),
        ["members", _] | ["tasks", _] | ["schedules", _] if get || put || delete => Ok(()),
        ["schedules", _, "expand"] if post => Ok(()),
        ["expand"] | ["sweep"] if post => Ok(()),
        ["predefined-tasks"] | ["today"] | ["logs"] | ["events"] if get => Ok(()),
        ["logs", id, "complete" | "miss"] if post && is_id(id) => Ok(()),
        ["reports", "points" | "streaks" | "daily"] if get => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

fn allow_display(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["today"] | ["events"] if *method == Method::GET => Ok(()),
        ["logs", id, "complete"] if *method == Method::POST && is_id(id) => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}
