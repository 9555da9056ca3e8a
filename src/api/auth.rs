//! Authentication API handlers

use crate::domain::RequestMeta;
use crate::error::Result;
use crate::server::AppState;
use crate::service::IssuedSession;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Cookie carrying the opaque session token
pub const SESSION_COOKIE: &str = "assure_session";

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
}

/// `POST /login`
///
/// 200 with a session cookie on success; 401 with the generic
/// invalid-credentials body on every authentication failure.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    body.validate()?;

    let meta = RequestMeta {
        ip_address: extract_ip(&headers),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    };

    let issued = state
        .login_service
        .login(&body.email, &body.password, meta)
        .await?;

    Ok((
        jar.add(session_cookie(&issued)),
        Json(LoginResponse { success: true }),
    ))
}

/// Build the session cookie; its expiry mirrors the session row.
fn session_cookie(issued: &IssuedSession) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, issued.token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    if let Ok(expires) =
        time::OffsetDateTime::from_unix_timestamp(issued.session.expires_at.timestamp())
    {
        cookie.set_expires(expires);
    }
    cookie
}

/// Client IP from proxy headers; first `X-Forwarded-For` hop wins.
fn extract_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let ip = first.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
