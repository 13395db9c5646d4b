use axum::{
    body::Body,
    http::{HeaderMap, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::{ACCESS_COOKIE_NAME, CSRF_COOKIE_NAME, validate_access_jwt};
use crate::error::ApiError;

const CSRF_HEADER_NAME: &str = "x-csrf-token";

fn is_unsafe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn parse_allowed_origins() -> Vec<String> {
    // Dev-friendly defaults. Production should set `VIREO_ALLOWED_ORIGINS` explicitly.
    //
    // Examples:
    // - VIREO_ALLOWED_ORIGINS=http://localhost:5173
    // - VIREO_ALLOWED_ORIGINS=https://crm.example.com,https://admin.example.com
    let raw = std::env::var("VIREO_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string());
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn origin_allowed_in(headers: &HeaderMap, allowed: &[String]) -> bool {
    // Treat missing Origin as a non-browser client (curl, service-to-service).
    // For browsers, Origin should be present for unsafe methods.
    let origin = match headers.get(axum::http::header::ORIGIN) {
        Some(v) => match v.to_str() {
            Ok(s) => s,
            Err(_) => return false,
        },
        None => return true,
    };

    allowed.iter().any(|a| a == origin)
}

fn request_has_cookie_header(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

fn csrf_is_valid(headers: &HeaderMap) -> bool {
    let jar = CookieJar::from_headers(headers);
    let Some(cookie) = jar.get(CSRF_COOKIE_NAME) else {
        return false;
    };

    let Some(header) = headers.get(CSRF_HEADER_NAME).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    cookie.value() == header
}

// Middleware: double-submit CSRF + Origin allowlist.
//
// Applied to state-changing routes. It intentionally does not try to
// distinguish which handlers are "mutations".
pub async fn csrf_and_origin(req: Request<Body>, next: Next) -> Response {
    if !is_unsafe_method(req.method()) {
        return next.run(req).await;
    }

    let headers = req.headers();
    if !origin_allowed_in(headers, &parse_allowed_origins()) {
        return ApiError::Forbidden("origin not allowed".into()).into_response();
    }

    // Only enforce CSRF when cookies are present; this keeps non-browser and
    // service-to-service clients workable without forcing CSRF headers.
    if request_has_cookie_header(headers) && !csrf_is_valid(headers) {
        return ApiError::Forbidden("csrf invalid".into()).into_response();
    }

    next.run(req).await
}

// Middleware: JWT cookie guard for `/api`. Inserts the authenticated user as an
// extension so the `Ctx` extractor can pick it up.
pub async fn auth_guard(mut req: Request<Body>, next: Next) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let Some(cookie) = jar.get(ACCESS_COOKIE_NAME) else {
        return ApiError::Unauthorized("missing access token".into()).into_response();
    };

    match validate_access_jwt(cookie.value()) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(_) => ApiError::Unauthorized("invalid access token".into()).into_response(),
    }
}
