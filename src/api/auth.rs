//! Bearer token gate for the admin API

use super::error::AppError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;

/// Rejects requests without `Authorization: Bearer <admin token>`
///
/// A server started without a token rejects everything.
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let authorized = match (state.token.as_deref(), presented) {
        (Some(token), Some(presented)) => token.expose_secret().constant_time_eq(presented),
        _ => false,
    };

    if !authorized {
        tracing::warn!(path = %req.uri().path(), "Rejected unauthenticated admin request");
        return AppError::unauthorized().into_response();
    }
    next.run(req).await
}
