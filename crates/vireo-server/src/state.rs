use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use vireo_db::sea_orm::DatabaseConnection;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::request_meta::RequestMeta;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
}

// Request context for handlers: the shared connection, the authenticated user
// (if the auth guard ran), and the captured request meta.
#[derive(Clone)]
pub struct Ctx {
    pub db: Arc<DatabaseConnection>,
    pub user: Option<AuthUser>,
    pub meta: RequestMeta,
}

#[async_trait]
impl FromRequestParts<AppState> for Ctx {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let meta = parts
            .extensions
            .get::<RequestMeta>()
            .cloned()
            .unwrap_or_default();
        let user = parts.extensions.get::<AuthUser>().cloned();

        Ok(Ctx {
            db: state.db.clone(),
            user,
            meta,
        })
    }
}
