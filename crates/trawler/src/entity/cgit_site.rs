//! CgitSite entity - the durable "seen base URLs" set.
//!
//! A site counts as seen once `finished_at` is set; a row without it was
//! interrupted mid-scrape and is scraped again.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cgit_sites")]
pub struct Model {
    /// Resolved landing page URL.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub url: String,

    /// The seed URL that first led to this site.
    #[sea_orm(column_type = "Text")]
    pub seed_url: String,

    pub started_at: DateTimeWithTimeZone,

    pub finished_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
