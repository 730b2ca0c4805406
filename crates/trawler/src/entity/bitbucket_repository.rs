//! BitbucketRepository entity - one row per repository listed by `/2.0/repositories`.
//!
//! Every row remembers the `next` cursor of the page it came from, so the
//! most recently inserted row tells where listing resumes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bitbucket_repositories")]
pub struct Model {
    /// Insertion order.
    #[sea_orm(primary_key)]
    pub seq: i32,

    /// Bitbucket's repository uuid (`{...}`), the natural key.
    #[sea_orm(unique)]
    pub uuid: String,

    pub full_name: String,

    /// `git` or `hg`. Only git rows are yielded.
    pub scm: String,

    pub is_fork: Option<bool>,

    /// Canonical clone URL.
    #[sea_orm(column_type = "Text")]
    pub endpoint: String,

    /// All clone URLs as a JSON array of strings.
    pub aliases: Json,

    /// `after` cursor of the page's `next` link.
    pub next_token: String,

    pub fetched_at: DateTimeWithTimeZone,

    pub delivered_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_git(&self) -> bool {
        self.scm.eq_ignore_ascii_case("git")
    }

    /// Aliases decoded from the JSON column. Non-string entries are ignored.
    pub fn alias_list(&self) -> Vec<String> {
        json_string_list(&self.aliases)
    }
}

pub(crate) fn json_string_list(value: &Json) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
