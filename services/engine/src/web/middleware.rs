//! services/engine/src/web/middleware.rs
//!
//! Request middleware for identifying the acting user.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// The identity of the user a request acts for, as asserted by the caller.
/// The engine runs next to a trusted client, so the header is taken at face
/// value rather than validated against an identity provider.
#[derive(Clone, Debug)]
pub struct UserId(pub String);

/// Middleware that extracts the `x-user-id` header and makes it available to
/// handlers. Requests without one are rejected with 401.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, (StatusCode, String)> {
    let user_id = req
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "x-user-id header is required".to_string(),
        ))?
        .to_string();

    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}
