//! Integration tests for the checkpoint/dedup store against real SQLite.
//!
//! Key scenarios tested:
//! - Page inserts are insert-if-absent and idempotent on replay
//! - The latest row is the cursor (max id / latest next token)
//! - Delivered markers drive recovery and replay queries
//! - cgit site and repository dedup records

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use chrono::Utc;
use sea_orm::{DatabaseConnection, Set};
use trawler::entity::{bitbucket_repository, cgit_repository, github_repository};
use trawler::store::{self, StoreError};
use trawler::connect_and_migrate;

async fn setup_test_db() -> DatabaseConnection {
    connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

fn github_row(id: i64, full_name: Option<&str>) -> github_repository::ActiveModel {
    github_repository::ActiveModel {
        id: Set(id),
        full_name: Set(full_name.map(str::to_string)),
        is_fork: Set(Some(false)),
        fetched_at: Set(Utc::now().fixed_offset()),
        delivered_at: Set(None),
    }
}

fn bitbucket_row(uuid: &str, scm: &str, next_token: &str) -> bitbucket_repository::ActiveModel {
    let endpoint = format!("https://bitbucket.org/team/{uuid}.git");
    bitbucket_repository::ActiveModel {
        uuid: Set(uuid.to_string()),
        full_name: Set(format!("team/{uuid}")),
        scm: Set(scm.to_string()),
        is_fork: Set(None),
        endpoint: Set(endpoint.clone()),
        aliases: Set(serde_json::json!([endpoint])),
        next_token: Set(next_token.to_string()),
        fetched_at: Set(Utc::now().fixed_offset()),
        delivered_at: Set(None),
        ..Default::default()
    }
}

// ─── GitHub ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn github_page_insert_is_idempotent() {
    let db = setup_test_db().await;

    let page = || vec![github_row(1, Some("a/one")), github_row(2, Some("b/two"))];
    assert_eq!(store::github::insert_page(&db, page()).await.unwrap(), 2);
    // Replaying the same page after a crash re-validates, never duplicates.
    assert_eq!(store::github::insert_page(&db, page()).await.unwrap(), 0);
    assert_eq!(store::github::insert_page(&db, Vec::new()).await.unwrap(), 0);

    assert_eq!(store::github::max_id(&db).await.unwrap(), Some(2));
    assert_eq!(store::github::find_undelivered(&db).await.unwrap().len(), 2);
}

#[tokio::test]
async fn github_max_id_is_none_on_empty_store() {
    let db = setup_test_db().await;
    assert_eq!(store::github::max_id(&db).await.unwrap(), None);
}

#[tokio::test]
async fn github_delivered_rows_leave_recovery_and_enter_replay() {
    let db = setup_test_db().await;
    store::github::insert_page(
        &db,
        vec![
            github_row(5, Some("a/five")),
            github_row(6, None),
            github_row(7, Some("a/seven")),
        ],
    )
    .await
    .unwrap();

    store::github::mark_delivered(&db, 5).await.unwrap();

    let undelivered: Vec<i64> = store::github::find_undelivered(&db)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.id)
        .collect();
    assert_eq!(undelivered, vec![7], "tombstones are never recovered");

    let delivered = store::github::find_delivered_after(&db, None, 10).await.unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, 5);
    assert!(
        store::github::find_delivered_after(&db, Some(5), 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn github_mark_delivered_unknown_id_is_not_found() {
    let db = setup_test_db().await;
    let err = store::github::mark_delivered(&db, 404).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }), "{err}");
}

// ─── Bitbucket ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn bitbucket_latest_row_carries_the_cursor() {
    let db = setup_test_db().await;
    assert!(store::bitbucket::latest(&db).await.unwrap().is_none());

    store::bitbucket::insert_page(&db, vec![bitbucket_row("{1}", "git", "t1")])
        .await
        .unwrap();
    store::bitbucket::insert_page(
        &db,
        vec![bitbucket_row("{2}", "hg", "t2"), bitbucket_row("{3}", "git", "t2")],
    )
    .await
    .unwrap();

    let latest = store::bitbucket::latest(&db).await.unwrap().expect("latest row");
    assert_eq!(latest.next_token, "t2");
    assert_eq!(latest.uuid, "{3}");
}

#[tokio::test]
async fn bitbucket_uuid_is_the_dedup_key() {
    let db = setup_test_db().await;
    store::bitbucket::insert_page(&db, vec![bitbucket_row("{1}", "git", "t1")])
        .await
        .unwrap();
    store::bitbucket::mark_delivered(&db, "{1}").await.unwrap();

    // Overlapping page: the delivered row is kept as is.
    let inserted = store::bitbucket::insert_page(
        &db,
        vec![bitbucket_row("{1}", "git", "t2"), bitbucket_row("{4}", "git", "t2")],
    )
    .await
    .unwrap();
    assert_eq!(inserted, 1);

    let fresh: Vec<String> = store::bitbucket::find_undelivered_in(
        &db,
        &["{1}".to_string(), "{4}".to_string()],
    )
    .await
    .unwrap()
    .into_iter()
    .map(|row| row.uuid)
    .collect();
    assert_eq!(fresh, vec!["{4}"]);
}

#[tokio::test]
async fn bitbucket_recovery_skips_non_git_rows() {
    let db = setup_test_db().await;
    store::bitbucket::insert_page(
        &db,
        vec![
            bitbucket_row("{1}", "git", "t1"),
            bitbucket_row("{2}", "hg", "t1"),
            bitbucket_row("{3}", "git", "t1"),
        ],
    )
    .await
    .unwrap();

    let uuids: Vec<String> = store::bitbucket::find_undelivered(&db)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.uuid)
        .collect();
    assert_eq!(uuids, vec!["{1}", "{3}"]);
    assert!(store::bitbucket::exists(&db, "{2}").await.unwrap());
}

// ─── cgit ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cgit_site_is_seen_only_once_finished() {
    let db = setup_test_db().await;
    let site = "https://git.example.org/";

    assert!(!store::cgit::is_site_finished(&db, site).await.unwrap());
    store::cgit::record_site_started(&db, site, "https://example.org/git")
        .await
        .unwrap();
    // Interrupted scrapes are scraped again.
    assert!(!store::cgit::is_site_finished(&db, site).await.unwrap());
    // Starting twice keeps the original row.
    store::cgit::record_site_started(&db, site, "https://other.example/")
        .await
        .unwrap();

    store::cgit::mark_site_finished(&db, site).await.unwrap();
    assert!(store::cgit::is_site_finished(&db, site).await.unwrap());
}

#[tokio::test]
async fn cgit_repo_insert_reports_duplicates() {
    let db = setup_test_db().await;
    let repo = |url: &str| cgit_repository::ActiveModel {
        url: Set(url.to_string()),
        site_url: Set("https://git.example.org/".to_string()),
        endpoint: Set(format!("{url}.git")),
        aliases: Set(serde_json::json!([format!("{url}.git")])),
        committed_at: Set(Utc::now().fixed_offset()),
    };

    assert!(store::cgit::insert_repo(&db, repo("https://git.example.org/b/")).await.unwrap());
    assert!(!store::cgit::insert_repo(&db, repo("https://git.example.org/b/")).await.unwrap());
    assert!(store::cgit::insert_repo(&db, repo("https://git.example.org/a/")).await.unwrap());
    assert!(store::cgit::repo_exists(&db, "https://git.example.org/a/").await.unwrap());

    let all: Vec<String> = store::cgit::find_repos_after(&db, None, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.url)
        .collect();
    assert_eq!(all, vec!["https://git.example.org/a/", "https://git.example.org/b/"]);

    let rest = store::cgit::find_repos_after(&db, Some("https://git.example.org/a/"), 10)
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].alias_list(), vec!["https://git.example.org/b/.git"]);
}
