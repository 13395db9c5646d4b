use axum::{extract::Path, response::Response};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use vireo_db::entities::{activity_logs, customers};
use vireo_db::sea_orm::DatabaseConnection;

use crate::audit;
use crate::error::ApiError;
use crate::handlers::activity::ActivityDto;
use crate::pagination::{self, DEFAULT_PER_PAGE, PageMeta, PageRequest};
use crate::query;
use crate::request::{self, RequestData};
use crate::respond;
use crate::sanitize;
use crate::state::Ctx;
use crate::validate;

const TABLE: &str = "customers";
const RECENT_ACTIVITY_LIMIT: u64 = 5;

// Fields a client may set; everything else in the payload is dropped.
const WRITABLE_FIELDS: &[&str] = &[
    "name", "email", "phone", "address", "city", "state", "zipcode", "notes",
];

const MIN_NAME_CHARS: usize = 2;
const MIN_PHONE_DIGITS: usize = 10;
const ZIPCODE_DIGITS: usize = 8;

#[derive(Debug, Serialize)]
pub struct CustomerDto {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub notes: Option<String>,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
    pub updated_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<customers::Model> for CustomerDto {
    fn from(m: customers::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            phone: m.phone,
            address: m.address,
            city: m.city,
            state: m.state,
            zipcode: m.zipcode,
            notes: m.notes,
            active: m.active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct AppliedFilters {
    search: String,
    city: String,
    active: Option<bool>,
    sort: String,
    order: String,
}

#[derive(Debug, Serialize)]
struct CustomerStats {
    total: u64,
    active: u64,
    inactive: u64,
    cities: u64,
}

#[derive(Debug, Serialize)]
struct ListPayload {
    customers: Vec<CustomerDto>,
    pagination: PageMeta,
    filters: AppliedFilters,
    statistics: CustomerStats,
}

#[derive(Debug, Serialize)]
struct ShowPayload {
    customer: CustomerDto,
    recent_activity: Vec<ActivityDto>,
}

fn sort_column(key: &str) -> (customers::Column, &'static str) {
    match key {
        "name" => (customers::Column::Name, "name"),
        "email" => (customers::Column::Email, "email"),
        "city" => (customers::Column::City, "city"),
        "updated_at" => (customers::Column::UpdatedAt, "updated_at"),
        _ => (customers::Column::CreatedAt, "created_at"),
    }
}

fn sort_order(raw: &str) -> (Order, &'static str) {
    if raw.eq_ignore_ascii_case("asc") {
        (Order::Asc, "asc")
    } else {
        (Order::Desc, "desc")
    }
}

fn owned_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    request::str_field(data, key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Structural check only: one '@' with a non-empty local part and a dotted domain.
fn is_valid_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    if local.is_empty() || raw.contains(char::is_whitespace) {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

fn digit_count(raw: &str) -> usize {
    raw.chars().filter(char::is_ascii_digit).count()
}

// Per-field format checks over the sanitized input. Only provided fields are
// judged, so partial updates validate what they carry.
fn validate_fields(input: &Map<String, Value>) -> Result<(), ApiError> {
    let mut field_errors = std::collections::BTreeMap::new();

    if let Some(name) = owned_field(input, "name") {
        if name.chars().count() < MIN_NAME_CHARS {
            field_errors.insert(
                "name".to_string(),
                format!("name must have at least {MIN_NAME_CHARS} characters"),
            );
        }
    }
    if let Some(email) = owned_field(input, "email") {
        if !is_valid_email(&email) {
            field_errors.insert("email".to_string(), "invalid email address".to_string());
        }
    }
    if let Some(phone) = owned_field(input, "phone") {
        if digit_count(&phone) < MIN_PHONE_DIGITS {
            field_errors.insert(
                "phone".to_string(),
                format!("phone must have at least {MIN_PHONE_DIGITS} digits"),
            );
        }
    }
    if let Some(zipcode) = owned_field(input, "zipcode") {
        if digit_count(&zipcode) != ZIPCODE_DIGITS {
            field_errors.insert(
                "zipcode".to_string(),
                format!("zipcode must have {ZIPCODE_DIGITS} digits"),
            );
        }
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation { field_errors })
    }
}

async fn stats(db: &DatabaseConnection) -> Result<CustomerStats, sea_orm::DbErr> {
    let total = customers::Entity::find().count(db).await?;
    let active = customers::Entity::find()
        .filter(customers::Column::Active.eq(true))
        .count(db)
        .await?;
    // Counted separately: the queries are not one snapshot, so deriving this
    // from `total - active` can underflow under concurrent writes.
    let inactive = customers::Entity::find()
        .filter(customers::Column::Active.eq(false))
        .count(db)
        .await?;
    let cities = customers::Entity::find()
        .select_only()
        .column(customers::Column::City)
        .filter(customers::Column::City.is_not_null())
        .distinct()
        .count(db)
        .await?;

    Ok(CustomerStats {
        total,
        active,
        inactive,
        cities,
    })
}

async fn recent_activity(
    db: &DatabaseConnection,
    id: i64,
) -> Result<Vec<ActivityDto>, sea_orm::DbErr> {
    let rows = activity_logs::Entity::find()
        .filter(activity_logs::Column::TableName.eq(TABLE))
        .filter(activity_logs::Column::RecordId.eq(id))
        .order_by(activity_logs::Column::CreatedAt, Order::Desc)
        .limit(RECENT_ACTIVITY_LIMIT)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(ActivityDto::from).collect())
}

// GET /api/customers — search, filters, sort allow-list, pagination, stats.
pub async fn list(ctx: Ctx, data: RequestData) -> Result<Response, ApiError> {
    let search = owned_field(&data.0, "search").unwrap_or_default();
    let city = owned_field(&data.0, "city").unwrap_or_default();
    let active = request::bool_field(&data.0, "active");
    let (sort_col, sort_key) = sort_column(request::str_field(&data.0, "sort").unwrap_or(""));
    let (order, order_key) = sort_order(request::str_field(&data.0, "order").unwrap_or(""));
    let page = request::u64_field(&data.0, "page").unwrap_or(1);
    let per_page = request::u64_field(&data.0, "limit").unwrap_or(DEFAULT_PER_PAGE);

    let mut cond = Condition::all();
    if !search.is_empty() {
        cond = cond.add(
            Condition::any()
                .add(customers::Column::Name.contains(&search))
                .add(customers::Column::Email.contains(&search)),
        );
    }
    if !city.is_empty() {
        cond = cond.add(customers::Column::City.contains(&city));
    }
    if let Some(active) = active {
        cond = cond.add(customers::Column::Active.eq(active));
    }

    let select = customers::Entity::find()
        .filter(cond)
        .order_by(sort_col, order);

    let page = pagination::paginate(&ctx.db, select, PageRequest::clamped(page, per_page))
        .await?
        .map(CustomerDto::from);
    let statistics = stats(&ctx.db).await?;

    Ok(respond::success(
        "customers listed",
        ListPayload {
            customers: page.data,
            pagination: page.pagination,
            filters: AppliedFilters {
                search,
                city,
                active,
                sort: sort_key.to_string(),
                order: order_key.to_string(),
            },
            statistics,
        },
    ))
}

// GET /api/customers/:id
pub async fn show(ctx: Ctx, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let customer = query::find_active_by_id::<customers::Entity>(&ctx.db, id).await?;
    let recent = recent_activity(&ctx.db, id).await?;

    Ok(respond::success(
        "customer found",
        ShowPayload {
            customer: CustomerDto::from(customer),
            recent_activity: recent,
        },
    ))
}

// POST /api/customers
pub async fn create(ctx: Ctx, data: RequestData) -> Result<Response, ApiError> {
    // Sanitize first so a value that cleans to nothing (control characters,
    // whitespace) still fails the required check.
    let input = sanitize::clean_map(&data.0, Some(WRITABLE_FIELDS));
    validate::require_fields(&input, &["name", "email"])?;
    validate_fields(&input)?;

    let name = owned_field(&input, "name").unwrap_or_default();
    let email = owned_field(&input, "email").unwrap_or_default();

    if query::exists::<customers::Entity>(&ctx.db, customers::Column::Email, email.clone(), None)
        .await?
    {
        return Err(ApiError::validation_one("email", "email already in use"));
    }

    let now = chrono::Utc::now();
    let model = customers::ActiveModel {
        name: Set(name),
        email: Set(email),
        phone: Set(owned_field(&input, "phone")),
        address: Set(owned_field(&input, "address")),
        city: Set(owned_field(&input, "city")),
        state: Set(owned_field(&input, "state")),
        zipcode: Set(owned_field(&input, "zipcode")),
        notes: Set(owned_field(&input, "notes")),
        active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(&*ctx.db)
    .await?;

    audit::record(
        &ctx,
        "customer_created",
        TABLE,
        Some(model.id),
        Some(json!({ "name": model.name, "email": model.email })),
    )
    .await;

    Ok(respond::created("customer created", CustomerDto::from(model)))
}

// PUT /api/customers/:id — partial update of the writable fields.
pub async fn update(ctx: Ctx, Path(id): Path<i64>, data: RequestData) -> Result<Response, ApiError> {
    let existing = query::find_active_by_id::<customers::Entity>(&ctx.db, id).await?;
    let input = sanitize::clean_map(&data.0, Some(WRITABLE_FIELDS));
    validate_fields(&input)?;

    if let Some(email) = owned_field(&input, "email") {
        let taken = query::exists::<customers::Entity>(
            &ctx.db,
            customers::Column::Email,
            email,
            Some(id),
        )
        .await?;
        if taken {
            return Err(ApiError::validation_one("email", "email already in use"));
        }
    }

    let changed: Vec<&str> = WRITABLE_FIELDS
        .iter()
        .copied()
        .filter(|f| input.contains_key(*f))
        .collect();
    if changed.is_empty() {
        return Err(ApiError::BadRequest("no updatable fields in request".into()));
    }

    let mut active: customers::ActiveModel = existing.into();
    if let Some(name) = owned_field(&input, "name") {
        active.name = Set(name);
    }
    if let Some(email) = owned_field(&input, "email") {
        active.email = Set(email);
    }
    if input.contains_key("phone") {
        active.phone = Set(owned_field(&input, "phone"));
    }
    if input.contains_key("address") {
        active.address = Set(owned_field(&input, "address"));
    }
    if input.contains_key("city") {
        active.city = Set(owned_field(&input, "city"));
    }
    if input.contains_key("state") {
        active.state = Set(owned_field(&input, "state"));
    }
    if input.contains_key("zipcode") {
        active.zipcode = Set(owned_field(&input, "zipcode"));
    }
    if input.contains_key("notes") {
        active.notes = Set(owned_field(&input, "notes"));
    }
    active.updated_at = Set(chrono::Utc::now().into());

    let model = active.update(&*ctx.db).await?;

    audit::record(
        &ctx,
        "customer_updated",
        TABLE,
        Some(model.id),
        Some(json!({ "fields": changed })),
    )
    .await;

    Ok(respond::success("customer updated", CustomerDto::from(model)))
}

// DELETE /api/customers/:id — soft delete; the row stays for history and audits.
pub async fn remove(ctx: Ctx, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let existing = query::find_active_by_id::<customers::Entity>(&ctx.db, id).await?;

    let mut active: customers::ActiveModel = existing.into();
    active.active = Set(false);
    active.updated_at = Set(chrono::Utc::now().into());
    active.update(&*ctx.db).await?;

    audit::record(&ctx, "customer_deleted", TABLE, Some(id), None).await;

    Ok(respond::message_only("customer deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_allow_list_falls_back_to_created_at() {
        assert_eq!(sort_column("name").1, "name");
        assert_eq!(sort_column("updated_at").1, "updated_at");
        assert_eq!(sort_column("password_hash").1, "created_at");
        assert_eq!(sort_column("").1, "created_at");
    }

    #[test]
    fn order_defaults_to_desc() {
        assert_eq!(sort_order("ASC").1, "asc");
        assert_eq!(sort_order("asc").1, "asc");
        assert_eq!(sort_order("DESC").1, "desc");
        assert_eq!(sort_order("sideways").1, "desc");
    }

    #[test]
    fn owned_field_drops_blanks() {
        let data: Map<String, Value> =
            serde_json::from_str(r#"{"a": "  x  ", "b": "   ", "c": 3}"#).unwrap();
        assert_eq!(owned_field(&data, "a").as_deref(), Some("x"));
        assert_eq!(owned_field(&data, "b"), None);
        assert_eq!(owned_field(&data, "c"), None);
    }

    fn data(raw: &str) -> Map<String, Value> {
        serde_json::from_str(raw).unwrap()
    }

    fn field_errors(err: ApiError) -> std::collections::BTreeMap<String, String> {
        match err {
            ApiError::Validation { field_errors } => field_errors,
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn email_format_is_checked() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@nodot"));
        assert!(!is_valid_email("ada@.com"));
        assert!(!is_valid_email("a da@example.com"));
    }

    #[test]
    fn invalid_email_is_a_field_error() {
        let err = validate_fields(&data(r#"{"name": "X Y", "email": "not-an-email"}"#))
            .unwrap_err();
        assert_eq!(
            field_errors(err).get("email").map(String::as_str),
            Some("invalid email address")
        );
    }

    #[test]
    fn short_name_is_a_field_error() {
        let err = validate_fields(&data(r#"{"name": "X"}"#)).unwrap_err();
        assert!(field_errors(err).contains_key("name"));
    }

    #[test]
    fn phone_and_zipcode_digit_counts() {
        let err = validate_fields(&data(r#"{"phone": "12345", "zipcode": "1234"}"#)).unwrap_err();
        let errors = field_errors(err);
        assert!(errors.contains_key("phone"));
        assert!(errors.contains_key("zipcode"));

        // Digits are counted through formatting characters.
        assert!(validate_fields(&data(r#"{"phone": "(11) 98765-4321", "zipcode": "12345-678"}"#))
            .is_ok());
    }

    #[test]
    fn absent_optional_fields_pass() {
        assert!(validate_fields(&data(r#"{"name": "Acme", "email": "acme@example.com"}"#)).is_ok());
        assert!(validate_fields(&data("{}")).is_ok());
    }

    #[test]
    fn control_character_name_fails_required_after_sanitizing() {
        let input = crate::sanitize::clean_map(
            &data(r#"{"name": " \u0000\u0001 ", "email": "acme@example.com"}"#),
            Some(WRITABLE_FIELDS),
        );
        assert!(crate::validate::require_fields(&input, &["name", "email"]).is_err());
    }
}
