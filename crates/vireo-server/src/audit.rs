use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use vireo_db::entities::activity_logs;

use crate::request_meta::RequestMeta;
use crate::state::Ctx;

// Best effort: an audit miss must never fail the request it describes.
pub async fn record(
    ctx: &Ctx,
    action: &str,
    table: &str,
    record_id: Option<i64>,
    details: Option<serde_json::Value>,
) {
    record_as(
        &ctx.db,
        &ctx.meta,
        ctx.user.as_ref().map(|u| u.user_id),
        action,
        table,
        record_id,
        details,
    )
    .await;
}

// Variant for handlers that know the acting user before a `Ctx` carries one
// (login audits the user it just authenticated).
pub async fn record_as(
    db: &DatabaseConnection,
    meta: &RequestMeta,
    user_id: Option<i64>,
    action: &str,
    table: &str,
    record_id: Option<i64>,
    details: Option<serde_json::Value>,
) {
    let model = activity_logs::ActiveModel {
        user_id: Set(user_id),
        action: Set(action.to_string()),
        table_name: Set(table.to_string()),
        record_id: Set(record_id),
        details: Set(details),
        ip_address: Set(meta.remote_addr.clone()),
        user_agent: Set(meta.user_agent.clone()),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    };

    if let Err(err) = model.insert(db).await {
        tracing::warn!(%err, action, table, "failed to write activity log");
    }
}
