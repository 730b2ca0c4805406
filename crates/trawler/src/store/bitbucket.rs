use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};

use crate::entity::bitbucket_repository::{
    ActiveModel, Column, Entity as BitbucketRepository, Model,
};

use super::errors::{Result, StoreError};

pub(super) fn on_conflict() -> OnConflict {
    OnConflict::column(Column::Uuid).do_nothing().to_owned()
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Insert a fetched page, each row tagged with the page's `next` token.
pub async fn insert_page(db: &DatabaseConnection, models: Vec<ActiveModel>) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }

    let inserted = BitbucketRepository::insert_many(models)
        .on_conflict(on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(inserted)
}

pub async fn mark_delivered(db: &DatabaseConnection, uuid: &str) -> Result<()> {
    let result = BitbucketRepository::update_many()
        .col_expr(Column::DeliveredAt, Expr::value(Utc::now().fixed_offset()))
        .filter(Column::Uuid.eq(uuid))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(StoreError::not_found(format!("bitbucket uuid={uuid}")));
    }
    Ok(())
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Most recently inserted row; its `next_token` is the listing cursor.
pub async fn latest(db: &DatabaseConnection) -> Result<Option<Model>> {
    let row = BitbucketRepository::find()
        .order_by_desc(Column::Seq)
        .one(db)
        .await?;
    Ok(row)
}

/// Undelivered git rows in insertion order.
pub async fn find_undelivered(db: &DatabaseConnection) -> Result<Vec<Model>> {
    let rows = BitbucketRepository::find()
        .filter(Column::DeliveredAt.is_null())
        .filter(Column::Scm.eq("git"))
        .order_by_asc(Column::Seq)
        .all(db)
        .await?;
    Ok(rows)
}

/// Undelivered git rows among `uuids`, in insertion order.
///
/// Used right after a page insert: rows the insert skipped because they were
/// already delivered are filtered out here.
pub async fn find_undelivered_in(db: &DatabaseConnection, uuids: &[String]) -> Result<Vec<Model>> {
    if uuids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = BitbucketRepository::find()
        .filter(Column::Uuid.is_in(uuids.iter().cloned()))
        .filter(Column::DeliveredAt.is_null())
        .filter(Column::Scm.eq("git"))
        .order_by_asc(Column::Seq)
        .all(db)
        .await?;
    Ok(rows)
}

pub async fn exists(db: &DatabaseConnection, uuid: &str) -> Result<bool> {
    let row = BitbucketRepository::find()
        .filter(Column::Uuid.eq(uuid))
        .one(db)
        .await?;
    Ok(row.is_some())
}

/// Delivered git rows after insertion sequence `after`, for replay.
pub async fn find_delivered_after(
    db: &DatabaseConnection,
    after: Option<i32>,
    limit: u64,
) -> Result<Vec<Model>> {
    let mut query = BitbucketRepository::find()
        .filter(Column::DeliveredAt.is_not_null())
        .filter(Column::Scm.eq("git"));
    if let Some(after) = after {
        query = query.filter(Column::Seq.gt(after));
    }
    let rows = query.order_by_asc(Column::Seq).limit(limit).all(db).await?;
    Ok(rows)
}
