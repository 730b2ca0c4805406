//! Initial migration: one table per provider plus the cgit site ledger.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_github_repositories(manager).await?;
        self.create_bitbucket_repositories(manager).await?;
        self.create_cgit_tables(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CgitRepositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CgitSites::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BitbucketRepositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GithubRepositories::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_github_repositories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GithubRepositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GithubRepositories::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GithubRepositories::FullName).string().null())
                    .col(ColumnDef::new(GithubRepositories::IsFork).boolean().null())
                    .col(
                        ColumnDef::new(GithubRepositories::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GithubRepositories::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Recovery scans undelivered rows
        manager
            .create_index(
                Index::create()
                    .name("idx_github_repos_delivered")
                    .table(GithubRepositories::Table)
                    .col(GithubRepositories::DeliveredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_bitbucket_repositories(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BitbucketRepositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BitbucketRepositories::Seq)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BitbucketRepositories::Uuid)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BitbucketRepositories::FullName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BitbucketRepositories::Scm).string().not_null())
                    .col(ColumnDef::new(BitbucketRepositories::IsFork).boolean().null())
                    .col(
                        ColumnDef::new(BitbucketRepositories::Endpoint)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BitbucketRepositories::Aliases)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(BitbucketRepositories::NextToken)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BitbucketRepositories::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BitbucketRepositories::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key for insert-if-absent
        manager
            .create_index(
                Index::create()
                    .name("idx_bitbucket_repos_uuid")
                    .table(BitbucketRepositories::Table)
                    .col(BitbucketRepositories::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bitbucket_repos_delivered")
                    .table(BitbucketRepositories::Table)
                    .col(BitbucketRepositories::DeliveredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_cgit_tables(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CgitSites::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CgitSites::Url).text().not_null().primary_key())
                    .col(ColumnDef::new(CgitSites::SeedUrl).text().not_null())
                    .col(
                        ColumnDef::new(CgitSites::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CgitSites::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CgitRepositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CgitRepositories::Url)
                            .text()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CgitRepositories::SiteUrl).text().not_null())
                    .col(ColumnDef::new(CgitRepositories::Endpoint).text().not_null())
                    .col(
                        ColumnDef::new(CgitRepositories::Aliases)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(CgitRepositories::CommittedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cgit_repos_site")
                    .table(CgitRepositories::Table)
                    .col(CgitRepositories::SiteUrl)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
#[sea_orm(iden = "github_repositories")]
enum GithubRepositories {
    Table,
    Id,
    FullName,
    IsFork,
    FetchedAt,
    DeliveredAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "bitbucket_repositories")]
enum BitbucketRepositories {
    Table,
    Seq,
    Uuid,
    FullName,
    Scm,
    IsFork,
    Endpoint,
    Aliases,
    NextToken,
    FetchedAt,
    DeliveredAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "cgit_sites")]
enum CgitSites {
    Table,
    Url,
    SeedUrl,
    StartedAt,
    FinishedAt,
}

#[derive(DeriveIden)]
#[sea_orm(iden = "cgit_repositories")]
enum CgitRepositories {
    Table,
    Url,
    SiteUrl,
    Endpoint,
    Aliases,
    CommittedAt,
}
