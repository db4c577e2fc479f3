use chrono::{SubsecRound, TimeDelta, Utc};
use rust_decimal::Decimal;
use seeker_core::models::{JobRecord, RunKind, ScrapeRun, SnapshotKey, StopReason};
use seeker_core::{AppError, CachePolicy, RunCache};
use seeker_db::Database;

use crate::integration::common::setup_test_db;

fn record(title: &str) -> JobRecord {
    JobRecord {
        title: title.into(),
        company: "Acme".into(),
        location: "Toronto, ON".into(),
        description: "Ship Rust services".into(),
        salary_base: Some(Decimal::new(8500050, 2)),
        salary_upper: Some(Decimal::new(100000, 0)),
        employment_type: Some("Full-time-Permanent".into()),
        responsive: true,
    }
}

fn run(pages: u32, stop: StopReason, age: TimeDelta) -> ScrapeRun {
    let mut run = ScrapeRun::new(
        "Software Developer",
        "Toronto, ON",
        pages,
        pages,
        vec![record("Backend Developer"), record("Platform Engineer")],
        stop,
    );
    // Postgres keeps microseconds.
    run.created_at = (Utc::now() - age).trunc_subsecs(6);
    run
}

#[tokio::test]
async fn health_check_succeeds() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).snapshot_repo();
    repo.health_check().await.unwrap();
}

#[tokio::test]
async fn save_and_load_round_trips_records() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).snapshot_repo();
    let original = run(2, StopReason::Exhausted, TimeDelta::zero());

    let meta = repo.save(&original).await.unwrap();
    assert_eq!(meta.kind, RunKind::Full);
    assert_eq!(meta.record_count, 2);

    let loaded = repo.load(&original.key(), original.id).await.unwrap();
    assert_eq!(loaded, original);
}

#[tokio::test]
async fn kind_is_stored_as_tag() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);
    let repo = db.snapshot_repo();
    let partial = run(3, StopReason::BudgetReached, TimeDelta::zero());
    repo.save(&partial).await.unwrap();

    let (kind,): (String,) = sqlx::query_as("SELECT kind FROM scrape_runs WHERE id = $1")
        .bind(partial.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(kind, "scrape");
}

#[tokio::test]
async fn list_meta_is_per_key_and_newest_first() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).snapshot_repo();

    let older = run(1, StopReason::BudgetReached, TimeDelta::hours(3));
    let newer = run(2, StopReason::Exhausted, TimeDelta::hours(1));
    repo.save(&older).await.unwrap();
    repo.save(&newer).await.unwrap();

    let mut elsewhere = run(1, StopReason::Exhausted, TimeDelta::zero());
    elsewhere.location = "Vancouver, BC".into();
    repo.save(&elsewhere).await.unwrap();

    let metas = repo.list_meta(&older.key()).await.unwrap();
    let ids: Vec<_> = metas.iter().map(|m| m.as_ref().unwrap().id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}

#[tokio::test]
async fn unknown_kind_is_reported_not_fatal() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);
    let repo = db.snapshot_repo();
    let good = run(2, StopReason::Exhausted, TimeDelta::hours(1));
    let bad = run(4, StopReason::Exhausted, TimeDelta::hours(1));
    repo.save(&good).await.unwrap();
    repo.save(&bad).await.unwrap();

    sqlx::query("UPDATE scrape_runs SET kind = 'maxi' WHERE id = $1")
        .bind(bad.id)
        .execute(db.pool())
        .await
        .unwrap();

    let metas = repo.list_meta(&good.key()).await.unwrap();
    assert_eq!(metas.len(), 2);
    let errors: Vec<_> = metas.iter().filter_map(|m| m.as_ref().err()).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], AppError::CacheMetadata { snapshot, .. } if *snapshot == bad.id.to_string()));

    // The cache steps over it and picks the readable one.
    let cache = RunCache::new(repo, CachePolicy::default());
    let hit = cache
        .resolve("Software Developer", "Toronto, ON", 2)
        .await
        .unwrap()
        .expect("readable snapshot should be reused");
    assert_eq!(hit.id, good.id);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).snapshot_repo();
    let saved = run(1, StopReason::Exhausted, TimeDelta::zero());
    repo.save(&saved).await.unwrap();

    repo.delete(&saved.key(), saved.id).await.unwrap();
    repo.delete(&saved.key(), saved.id).await.unwrap();

    assert!(repo.list_meta(&saved.key()).await.unwrap().is_empty());
    assert!(matches!(
        repo.load(&saved.key(), saved.id).await,
        Err(AppError::Store(_))
    ));
}

#[tokio::test]
async fn retention_keeps_five_newest() {
    let (pool, _container) = setup_test_db().await;
    let repo = Database::from_pool(pool).snapshot_repo();
    let cache = RunCache::new(repo.clone(), CachePolicy::default());

    let mut ids = Vec::new();
    for hours in (0..6).rev() {
        let r = run(1, StopReason::BudgetReached, TimeDelta::hours(hours));
        ids.push(r.id);
        cache.persist(&r).await.unwrap();
    }

    let key = SnapshotKey::new("Software Developer", "Toronto, ON");
    let remaining: Vec<_> = repo
        .list_meta(&key)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.unwrap().id)
        .collect();
    assert_eq!(remaining.len(), 5);
    assert!(!remaining.contains(&ids[0]));
}
