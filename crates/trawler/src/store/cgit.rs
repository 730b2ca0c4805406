use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, OnConflict},
};

use crate::entity::cgit_repository::{
    self, ActiveModel as RepoActiveModel, Entity as CgitRepository, Model as RepoModel,
};
use crate::entity::cgit_site::{self, Entity as CgitSite};

use super::errors::Result;

pub(super) fn repo_on_conflict() -> OnConflict {
    OnConflict::column(cgit_repository::Column::Url)
        .do_nothing()
        .to_owned()
}

// ─── Sites ───────────────────────────────────────────────────────────────────

/// Whether a landing page was already scraped to completion.
pub async fn is_site_finished(db: &DatabaseConnection, url: &str) -> Result<bool> {
    let site = CgitSite::find_by_id(url.to_string()).one(db).await?;
    Ok(site.is_some_and(|s| s.finished_at.is_some()))
}

/// Note that scraping of `url` began. Existing rows are left alone.
pub async fn record_site_started(db: &DatabaseConnection, url: &str, seed_url: &str) -> Result<()> {
    let model = cgit_site::ActiveModel {
        url: Set(url.to_string()),
        seed_url: Set(seed_url.to_string()),
        started_at: Set(Utc::now().fixed_offset()),
        finished_at: Set(None),
    };
    CgitSite::insert(model)
        .on_conflict(
            OnConflict::column(cgit_site::Column::Url)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

pub async fn mark_site_finished(db: &DatabaseConnection, url: &str) -> Result<()> {
    CgitSite::update_many()
        .col_expr(
            cgit_site::Column::FinishedAt,
            Expr::value(Utc::now().fixed_offset()),
        )
        .filter(cgit_site::Column::Url.eq(url))
        .exec(db)
        .await?;
    Ok(())
}

// ─── Repositories ────────────────────────────────────────────────────────────

pub async fn repo_exists(db: &DatabaseConnection, url: &str) -> Result<bool> {
    Ok(CgitRepository::find_by_id(url.to_string())
        .one(db)
        .await?
        .is_some())
}

/// Commit a delivered repository. Returns `false` when it was already stored.
pub async fn insert_repo(db: &DatabaseConnection, model: RepoActiveModel) -> Result<bool> {
    let inserted = CgitRepository::insert(model)
        .on_conflict(repo_on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

/// Committed repositories ordered by URL, for replay.
pub async fn find_repos_after(
    db: &DatabaseConnection,
    after: Option<&str>,
    limit: u64,
) -> Result<Vec<RepoModel>> {
    let mut query = CgitRepository::find();
    if let Some(after) = after {
        query = query.filter(cgit_repository::Column::Url.gt(after));
    }
    let rows = query
        .order_by_asc(cgit_repository::Column::Url)
        .limit(limit)
        .all(db)
        .await?;
    Ok(rows)
}
