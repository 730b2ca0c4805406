//! SeaORM entity definitions for the trawler database schema.

pub mod bitbucket_repository;
pub mod cgit_repository;
pub mod cgit_site;
pub mod github_repository;
pub mod prelude;
