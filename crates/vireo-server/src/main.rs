use std::net::SocketAddr;

use axum::extract::State;
use axum::middleware;
use axum::{
    Json, Router,
    routing::{get, post},
};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;

use vireo_server::auth;
use vireo_server::handlers;
use vireo_server::request_meta;
use vireo_server::security;
use vireo_server::state::AppState;

#[derive(Debug, Serialize)]
struct HealthzDatabase {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
    version: &'static str,
    database: HealthzDatabase,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthzResponse> {
    let database = match state.db.ping().await {
        Ok(()) => HealthzDatabase {
            ok: true,
            error: None,
        },
        Err(e) => HealthzDatabase {
            ok: false,
            error: Some(e.to_string()),
        },
    };

    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

async fn init_db_and_migrate() -> anyhow::Result<AppState> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?;
    let db = vireo_db::connect(&database_url).await?;

    // Apply migrations on boot (idempotent).
    vireo_migration::Migrator::up(&db, None).await?;

    // Ensure a login exists so a fresh install is usable.
    auth::ensure_admin_user(&db).await?;

    Ok(AppState {
        db: std::sync::Arc::new(db),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let state = init_db_and_migrate().await?;

    // State-changing auth routes are protected by CSRF double-submit + Origin allowlist.
    let auth_router = Router::new()
        .route("/csrf", get(auth::csrf))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .layer(middleware::from_fn(security::csrf_and_origin))
        .with_state(state.clone());

    // Everything under /api requires a valid access cookie.
    let api_router = Router::new()
        .route(
            "/customers",
            get(handlers::customers::list).post(handlers::customers::create),
        )
        .route(
            "/customers/:id",
            get(handlers::customers::show)
                .put(handlers::customers::update)
                .delete(handlers::customers::remove),
        )
        .route("/activity", get(handlers::activity::recent))
        .layer(middleware::from_fn(security::auth_guard))
        .layer(middleware::from_fn(security::csrf_and_origin))
        .with_state(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/whoami", get(auth::whoami))
        .nest("/auth", auth_router)
        .nest("/api", api_router)
        .layer(middleware::from_fn(request_meta::capture))
        .with_state(state);

    let addr: SocketAddr = std::env::var("VIREO_BIND_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| ([0, 0, 0, 0], 8080).into());
    tracing::info!(%addr, "vireo-server HTTP listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
