use axum::response::Response;
use sea_orm::{EntityTrait, Order, QueryOrder};
use serde::Serialize;
use vireo_db::entities::activity_logs;

use crate::error::ApiError;
use crate::pagination::{self, DEFAULT_PER_PAGE, PageMeta, PageRequest};
use crate::request::{self, RequestData};
use crate::respond;
use crate::state::Ctx;

#[derive(Debug, Serialize)]
pub struct ActivityDto {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<i64>,
    pub details: Option<serde_json::Value>,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<activity_logs::Model> for ActivityDto {
    fn from(m: activity_logs::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            action: m.action,
            table_name: m.table_name,
            record_id: m.record_id,
            details: m.details,
            ip_address: m.ip_address,
            user_agent: m.user_agent,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ActivityListPayload {
    activity: Vec<ActivityDto>,
    pagination: PageMeta,
}

// GET /api/activity — the audit trail, newest first.
pub async fn recent(ctx: Ctx, data: RequestData) -> Result<Response, ApiError> {
    let page = request::u64_field(&data.0, "page").unwrap_or(1);
    let per_page = request::u64_field(&data.0, "limit").unwrap_or(DEFAULT_PER_PAGE);

    let select = activity_logs::Entity::find()
        .order_by(activity_logs::Column::CreatedAt, Order::Desc);

    let page = pagination::paginate(&ctx.db, select, PageRequest::clamped(page, per_page))
        .await?
        .map(ActivityDto::from);

    Ok(respond::success(
        "activity listed",
        ActivityListPayload {
            activity: page.data,
            pagination: page.pagination,
        },
    ))
}
