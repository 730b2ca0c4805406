//! Common re-exports for convenient entity usage.

pub use super::bitbucket_repository::{
    ActiveModel as BitbucketRepositoryActiveModel, Column as BitbucketRepositoryColumn,
    Entity as BitbucketRepository, Model as BitbucketRepositoryModel,
};
pub use super::cgit_repository::{
    ActiveModel as CgitRepositoryActiveModel, Column as CgitRepositoryColumn,
    Entity as CgitRepository, Model as CgitRepositoryModel,
};
pub use super::cgit_site::{
    ActiveModel as CgitSiteActiveModel, Column as CgitSiteColumn, Entity as CgitSite,
    Model as CgitSiteModel,
};
pub use super::github_repository::{
    ActiveModel as GitHubRepositoryActiveModel, Column as GitHubRepositoryColumn,
    Entity as GitHubRepository, Model as GitHubRepositoryModel,
};
