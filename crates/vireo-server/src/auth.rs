use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use base64::Engine;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use vireo_db::entities::users;

use crate::audit;
use crate::error::ApiError;
use crate::request_meta::RequestMeta;
use crate::respond;
use crate::state::AppState;

pub const CSRF_COOKIE_NAME: &str = "csrf";
pub const ACCESS_COOKIE_NAME: &str = "access";

const ACCESS_TOKEN_HOURS: i64 = 12;
const JWT_ISSUER: &str = "vireo";
const JWT_AUDIENCE: &str = "vireo-web";

#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

fn cookie_base(name: &'static str, value: String, path: &'static str) -> Cookie<'static> {
    let mut c = Cookie::new(name, value);
    c.set_http_only(true);
    c.set_same_site(SameSite::Lax);
    c.set_path(path);
    c
}

fn random_token(n: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    // URL-safe base64 without padding.
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

fn csrf_cookie(value: String) -> Cookie<'static> {
    // Non-HttpOnly so the browser app can read and send it as a header.
    let mut c = Cookie::new(CSRF_COOKIE_NAME, value);
    c.set_http_only(false);
    c.set_same_site(SameSite::Lax);
    c.set_path("/");
    c
}

fn clear_cookie(name: &'static str, path: &'static str) -> Cookie<'static> {
    let mut c = Cookie::new(name, "");
    c.set_path(path);
    c.make_removal();
    c
}

fn build_access_cookie(jwt: String) -> Cookie<'static> {
    cookie_base(ACCESS_COOKIE_NAME, jwt, "/")
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::{PasswordHasher, SaltString};
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    let argon2 = argon2::Argon2::default();
    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    let argon2 = argon2::Argon2::default();
    argon2.verify_password(password.as_bytes(), &parsed).is_ok()
}

fn jwt_secret() -> Vec<u8> {
    std::env::var("VIREO_JWT_SECRET")
        .unwrap_or_else(|_| "dev-insecure-change-me".to_string())
        .into_bytes()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    email: String,
    is_admin: bool,
    exp: usize,
    iat: usize,
    iss: String,
    aud: String,
}

fn make_access_jwt_with(user: &users::Model, secret: &[u8]) -> anyhow::Result<String> {
    let now = time::OffsetDateTime::now_utc();
    let exp = (now + time::Duration::hours(ACCESS_TOKEN_HOURS)).unix_timestamp() as usize;
    let iat = now.unix_timestamp() as usize;

    let claims = Claims {
        sub: user.id.to_string(),
        name: user.name.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
        exp,
        iat,
        iss: JWT_ISSUER.to_string(),
        aud: JWT_AUDIENCE.to_string(),
    };

    Ok(jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret),
    )?)
}

fn make_access_jwt(user: &users::Model) -> anyhow::Result<String> {
    make_access_jwt_with(user, &jwt_secret())
}

fn validate_access_jwt_with(token: &str, secret: &[u8]) -> anyhow::Result<AuthUser> {
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_audience(&[JWT_AUDIENCE]);
    validation.set_issuer(&[JWT_ISSUER]);

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret),
        &validation,
    )?;

    Ok(AuthUser {
        user_id: data.claims.sub.parse()?,
        name: data.claims.name,
        email: data.claims.email,
        is_admin: data.claims.is_admin,
    })
}

pub fn validate_access_jwt(token: &str) -> anyhow::Result<AuthUser> {
    validate_access_jwt_with(token, &jwt_secret())
}

// Startup bootstrap so a fresh install has a login. Idempotent.
pub async fn ensure_admin_user(db: &DatabaseConnection) -> anyhow::Result<()> {
    let email = std::env::var("VIREO_ADMIN_EMAIL").unwrap_or_else(|_| "admin@local".to_string());
    let password = std::env::var("VIREO_ADMIN_PASS").unwrap_or_else(|_| "admin".to_string());

    let existing = users::Entity::find()
        .filter(users::Column::Email.eq(email.clone()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let ph = hash_password(&password).map_err(|e| anyhow::anyhow!("hash error: {e}"))?;
    let model = users::ActiveModel {
        name: Set("Administrator".to_string()),
        email: Set(email),
        password_hash: Set(ph),
        is_admin: Set(true),
        active: Set(true),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    users::Entity::insert(model).exec(db).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    pub token: String,
}

pub async fn csrf(jar: CookieJar) -> impl IntoResponse {
    let token = random_token(32);
    let jar = jar.add(csrf_cookie(token.clone()));
    (jar, Json(CsrfResponse { token }))
}

// NOTE: CSRF is enforced in middleware (see `crate::security`).

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    jar: CookieJar,
    Json(input): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let db = &*state.db;

    let user = users::Entity::find()
        .filter(users::Column::Email.eq(input.email.clone()))
        .filter(users::Column::Active.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".into()))?;

    if !verify_password(&user.password_hash, &input.password) {
        return Err(ApiError::Unauthorized("invalid credentials".into()));
    }

    let access = make_access_jwt(&user)
        .map_err(|e| ApiError::Internal(format!("jwt error: {e}")))?;

    audit::record_as(
        db,
        &meta,
        Some(user.id),
        "user_login",
        "users",
        Some(user.id),
        None,
    )
    .await;

    let jar = jar.add(build_access_cookie(access));
    let me = AuthUser {
        user_id: user.id,
        name: user.name,
        email: user.email,
        is_admin: user.is_admin,
    };

    Ok((jar, respond::success("login successful", me)).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(meta): Extension<RequestMeta>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE_NAME) {
        if let Ok(user) = validate_access_jwt(cookie.value()) {
            audit::record_as(
                &state.db,
                &meta,
                Some(user.user_id),
                "user_logout",
                "users",
                Some(user.user_id),
                None,
            )
            .await;
        }
    }

    let jar = jar.remove(clear_cookie(ACCESS_COOKIE_NAME, "/"));
    Ok((jar, respond::message_only("logout successful")).into_response())
}

pub async fn whoami(jar: CookieJar) -> Result<Response, ApiError> {
    let token = jar
        .get(ACCESS_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::Unauthorized("missing access token".into()))?;

    let me = validate_access_jwt(&token)
        .map_err(|_| ApiError::Unauthorized("invalid access token".into()))?;

    Ok(respond::success("authenticated", me))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> users::Model {
        users::Model {
            id: 42,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: String::new(),
            is_admin: true,
            active: true,
            created_at: chrono::Utc::now().into(),
        }
    }

    #[test]
    fn jwt_round_trip() {
        let secret = b"test-secret";
        let token = make_access_jwt_with(&sample_user(), secret).unwrap();
        let me = validate_access_jwt_with(&token, secret).unwrap();
        assert_eq!(me.user_id, 42);
        assert_eq!(me.email, "ada@example.com");
        assert!(me.is_admin);
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let token = make_access_jwt_with(&sample_user(), b"secret-a").unwrap();
        assert!(validate_access_jwt_with(&token, b"secret-b").is_err());
    }

    #[test]
    fn jwt_rejects_garbage() {
        assert!(validate_access_jwt_with("not-a-token", b"secret").is_err());
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        assert!(!verify_password("not-a-hash", "hunter2"));
    }

    #[test]
    fn random_tokens_differ() {
        assert_ne!(random_token(32), random_token(32));
    }
}
