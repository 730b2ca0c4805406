use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};

use crate::entity::github_repository::{ActiveModel, Column, Entity as GitHubRepository, Model};

use super::errors::{Result, StoreError};

/// Conflict clause shared by every GitHub insert: the id is the natural key.
pub(super) fn on_conflict() -> OnConflict {
    OnConflict::column(Column::Id).do_nothing().to_owned()
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Insert a fetched page in one statement, skipping ids already stored.
///
/// The page is the checkpoint: once this returns, `max_id` reflects it.
pub async fn insert_page(db: &DatabaseConnection, models: Vec<ActiveModel>) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }

    let inserted = GitHubRepository::insert_many(models)
        .on_conflict(on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(inserted)
}

/// Record that the mention for `id` reached its destination.
pub async fn mark_delivered(db: &DatabaseConnection, id: i64) -> Result<()> {
    let result = GitHubRepository::update_many()
        .col_expr(Column::DeliveredAt, Expr::value(Utc::now().fixed_offset()))
        .filter(Column::Id.eq(id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(StoreError::not_found(format!("github id={id}")));
    }
    Ok(())
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Largest stored id, the cursor for the next `since=` fetch.
pub async fn max_id(db: &DatabaseConnection) -> Result<Option<i64>> {
    let max: Option<Option<i64>> = GitHubRepository::find()
        .select_only()
        .column_as(Column::Id.max(), "max_id")
        .into_tuple()
        .one(db)
        .await?;
    Ok(max.flatten())
}

/// Stored rows that still need delivering, in id order.
pub async fn find_undelivered(db: &DatabaseConnection) -> Result<Vec<Model>> {
    let rows = GitHubRepository::find()
        .filter(Column::DeliveredAt.is_null())
        .filter(Column::FullName.is_not_null())
        .order_by_asc(Column::Id)
        .all(db)
        .await?;
    Ok(rows)
}

pub async fn exists(db: &DatabaseConnection, id: i64) -> Result<bool> {
    Ok(GitHubRepository::find_by_id(id).one(db).await?.is_some())
}

/// Delivered rows with an id above `after`, for replay.
pub async fn find_delivered_after(
    db: &DatabaseConnection,
    after: Option<i64>,
    limit: u64,
) -> Result<Vec<Model>> {
    let mut query = GitHubRepository::find()
        .filter(Column::DeliveredAt.is_not_null())
        .filter(Column::FullName.is_not_null());
    if let Some(after) = after {
        query = query.filter(Column::Id.gt(after));
    }
    let rows = query.order_by_asc(Column::Id).limit(limit).all(db).await?;
    Ok(rows)
}
