use sea_orm::{
    ColumnTrait, DatabaseConnection, PaginatorTrait, PrimaryKeyTrait, QueryFilter,
    Select,
};
use vireo_db::ActiveRecord;

use crate::error::ApiError;

fn active_by_id_select<E>(id: i64) -> Select<E>
where
    E: ActiveRecord,
    i64: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    E::find_by_id(id).filter(E::active_column().eq(true))
}

fn exists_select<E>(
    column: E::Column,
    value: impl Into<sea_orm::Value>,
    exclude_id: Option<i64>,
) -> Select<E>
where
    E: ActiveRecord,
{
    let mut select = E::find().filter(column.eq(value));
    if let Some(id) = exclude_id {
        select = select.filter(E::id_column().ne(id));
    }
    select
}

// One active row by primary key; a miss renders as 404.
pub async fn find_active_by_id<E>(db: &DatabaseConnection, id: i64) -> Result<E::Model, ApiError>
where
    E: ActiveRecord,
    i64: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    active_by_id_select::<E>(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("record not found"))
}

// Existence by column value. `exclude_id` supports uniqueness-on-update: the row
// being edited does not count against itself.
pub async fn exists<E>(
    db: &DatabaseConnection,
    column: E::Column,
    value: impl Into<sea_orm::Value>,
    exclude_id: Option<i64>,
) -> Result<bool, sea_orm::DbErr>
where
    E: ActiveRecord,
    E::Model: sea_orm::FromQueryResult + Send + Sync,
{
    Ok(exists_select::<E>(column, value, exclude_id).count(db).await? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait, Value};
    use std::collections::BTreeMap;
    use vireo_db::entities::customers;

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::from(n))])
    }

    #[test]
    fn exists_query_excludes_the_given_id() {
        let sql = exists_select::<customers::Entity>(
            customers::Column::Email,
            "taken@example.com",
            Some(7),
        )
        .build(DatabaseBackend::Postgres)
        .to_string();

        assert!(sql.contains("taken@example.com"), "{sql}");
        assert!(sql.contains(r#""id" <> 7"#), "{sql}");
    }

    #[test]
    fn exists_query_without_exclusion_has_no_id_filter() {
        let sql = exists_select::<customers::Entity>(
            customers::Column::Email,
            "taken@example.com",
            None,
        )
        .build(DatabaseBackend::Postgres)
        .to_string();

        assert!(!sql.contains("<>"), "{sql}");
    }

    #[test]
    fn active_by_id_query_filters_on_the_soft_delete_flag() {
        let sql = active_by_id_select::<customers::Entity>(3)
            .build(DatabaseBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#""id" = 3"#), "{sql}");
        assert!(sql.contains(r#""active" = TRUE"#), "{sql}");
    }

    #[tokio::test]
    async fn exists_is_false_when_only_the_excluded_id_matches() {
        // The row holding the value is the one being edited, so the count
        // with the id exclusion comes back zero.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(0)]])
            .into_connection();

        let found = exists::<customers::Entity>(
            &db,
            customers::Column::Email,
            "taken@example.com",
            Some(7),
        )
        .await
        .unwrap();
        assert!(!found);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("<>"), "{log}");
    }

    #[tokio::test]
    async fn exists_is_true_on_a_positive_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(2)]])
            .into_connection();

        let found =
            exists::<customers::Entity>(&db, customers::Column::Email, "taken@example.com", None)
                .await
                .unwrap();
        assert!(found);
    }

    #[tokio::test]
    async fn find_active_by_id_misses_are_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<customers::Model>::new()])
            .into_connection();

        let err = find_active_by_id::<customers::Entity>(&db, 9)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_active_by_id_returns_the_row() {
        let row = customers::Model {
            id: 9,
            name: "Acme".to_string(),
            email: "acme@example.com".to_string(),
            phone: None,
            address: None,
            city: None,
            state: None,
            zipcode: None,
            notes: None,
            active: true,
            created_at: chrono::Utc::now().into(),
            updated_at: chrono::Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row.clone()]])
            .into_connection();

        let found = find_active_by_id::<customers::Entity>(&db, 9)
            .await
            .unwrap();
        assert_eq!(found, row);
    }
}
