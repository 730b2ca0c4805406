//! GitHubRepository entity - one row per repository id seen on `/repositories`.
//!
//! The table doubles as the GitHub cursor: the largest stored id is where the
//! next fetch resumes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "github_repositories")]
pub struct Model {
    /// GitHub's numeric repository id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    /// `owner/name`; `None` for tombstoned entries, which are never yielded.
    pub full_name: Option<String>,

    pub is_fork: Option<bool>,

    /// When the page containing this row was fetched.
    pub fetched_at: DateTimeWithTimeZone,

    /// Set once the mention was delivered downstream.
    pub delivered_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this row can become a mention.
    pub fn is_yieldable(&self) -> bool {
        self.full_name.as_deref().is_some_and(|name| !name.is_empty())
    }
}
