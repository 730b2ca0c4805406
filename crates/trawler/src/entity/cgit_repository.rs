//! CgitRepository entity - repositories committed from cgit instances.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cgit_repositories")]
pub struct Model {
    /// Repository summary page URL, the natural key.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub url: String,

    /// Landing page of the instance this repository was found on.
    #[sea_orm(column_type = "Text")]
    pub site_url: String,

    #[sea_orm(column_type = "Text")]
    pub endpoint: String,

    /// Clone URLs as a JSON array of strings.
    pub aliases: Json,

    pub committed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn alias_list(&self) -> Vec<String> {
        super::bitbucket_repository::json_string_list(&self.aliases)
    }
}
