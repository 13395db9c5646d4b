pub use sea_orm;

use sea_orm::{Database, DatabaseConnection, EntityTrait};

pub mod entities;

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    Database::connect(database_url).await
}

// Entities with an integer primary key and a soft-delete flag. Generic lookup and
// uniqueness helpers are written against this instead of per-table SQL.
pub trait ActiveRecord: EntityTrait {
    fn id_column() -> Self::Column;
    fn active_column() -> Self::Column;
}
