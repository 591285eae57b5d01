//! Integration tests for the storage backends
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, both backends are tested

use qrtrack::analytics::{Device, GeoLocation};
use qrtrack::models::{QrCode, QrCodeChanges, Visit};
use qrtrack::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use std::sync::Arc;

fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true,
    }
}

async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

fn qr_code(user_id: &str, slug: &str, created_at: i64) -> QrCode {
    QrCode {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        title: format!("Code {}", slug),
        target_url: "https://example.com".to_string(),
        slug: slug.to_string(),
        color: "#3b82f6".to_string(),
        created_at,
        updated_at: created_at,
    }
}

fn visit_at(qr_code_id: &str, ip: &str, timestamp: i64) -> Visit {
    let mut visit = Visit::new(qr_code_id, ip, Device::Desktop, GeoLocation::default());
    visit.timestamp = timestamp;
    visit
}

async fn check_round_trip(storage: Arc<dyn Storage>) {
    let user = unique("user");
    let slug = unique("promo");
    let code = qr_code(&user, &slug, 1_700_000_000_000);

    let created = storage.create_qr_code(&code).await.unwrap();
    assert_eq!(created, code);

    let by_id = storage.get_qr_code(&code.id).await.unwrap().unwrap();
    assert_eq!(by_id, code);

    let by_slug = storage.get_qr_code_by_slug(&slug).await.unwrap().unwrap();
    assert_eq!(by_slug.id, code.id);

    assert!(storage.get_qr_code("missing").await.unwrap().is_none());
    assert!(storage
        .get_qr_code_by_slug(&unique("missing"))
        .await
        .unwrap()
        .is_none());
}

async fn check_duplicate_slug(storage: Arc<dyn Storage>) {
    let slug = unique("dup");
    storage
        .create_qr_code(&qr_code("u1", &slug, 1))
        .await
        .unwrap();

    let second = storage.create_qr_code(&qr_code("u2", &slug, 2)).await;
    assert!(matches!(second, Err(StorageError::Conflict)));

    // The original owner keeps the slug
    let resolved = storage.get_qr_code_by_slug(&slug).await.unwrap().unwrap();
    assert_eq!(resolved.user_id, "u1");
}

async fn check_concurrent_slug_creation(storage: Arc<dyn Storage>) {
    let slug = unique("race");
    let mut handles = vec![];

    for i in 0..10 {
        let storage = Arc::clone(&storage);
        let slug = slug.clone();
        handles.push(tokio::spawn(async move {
            storage
                .create_qr_code(&qr_code(&format!("user-{}", i), &slug, i))
                .await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(StorageError::Conflict) => conflicts += 1,
            Err(e) => panic!("unexpected storage error: {}", e),
        }
    }

    assert_eq!(successes, 1, "exactly one create must win the slug");
    assert_eq!(conflicts, 9);
}

async fn check_list_by_user(storage: Arc<dyn Storage>) {
    let user = unique("owner");
    let older = qr_code(&user, &unique("a"), 1_000);
    let newer = qr_code(&user, &unique("b"), 2_000);
    let other = qr_code(&unique("stranger"), &unique("c"), 3_000);

    storage.create_qr_code(&older).await.unwrap();
    storage.create_qr_code(&newer).await.unwrap();
    storage.create_qr_code(&other).await.unwrap();

    let listed = storage.list_qr_codes_by_user(&user).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

    assert!(storage
        .list_qr_codes_by_user(&unique("nobody"))
        .await
        .unwrap()
        .is_empty());
}

async fn check_update(storage: Arc<dyn Storage>) {
    let code = qr_code(&unique("user"), &unique("edit"), 1);
    storage.create_qr_code(&code).await.unwrap();

    let updated = storage
        .update_qr_code(
            &code.id,
            &QrCodeChanges {
                title: "New title".to_string(),
                target_url: "https://example.org/new".to_string(),
                color: None,
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.title, "New title");
    assert_eq!(updated.target_url, "https://example.org/new");
    assert_eq!(updated.color, code.color, "omitted color keeps the stored one");
    assert_eq!(updated.slug, code.slug);
    assert_eq!(updated.created_at, code.created_at);
    assert!(updated.updated_at > code.updated_at, "edits stamp updated_at");

    let recolored = storage
        .update_qr_code(
            &code.id,
            &QrCodeChanges {
                title: "New title".to_string(),
                target_url: "https://example.org/new".to_string(),
                color: Some("#000000".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recolored.color, "#000000");

    let missing = storage
        .update_qr_code(
            "missing",
            &QrCodeChanges {
                title: "x".to_string(),
                target_url: "https://example.com".to_string(),
                color: None,
            },
        )
        .await
        .unwrap();
    assert!(missing.is_none());
}

async fn check_visit_ordering(storage: Arc<dyn Storage>) {
    let code = qr_code(&unique("user"), &unique("visits"), 1);
    storage.create_qr_code(&code).await.unwrap();

    for (i, ts) in [3_000, 1_000, 2_000].into_iter().enumerate() {
        let visit = visit_at(&code.id, &format!("10.0.0.{}", i), ts);
        storage.record_visit(&visit).await.unwrap();
    }

    let visits = storage.list_visits(&code.id).await.unwrap();
    let timestamps: Vec<_> = visits.iter().map(|v| v.timestamp).collect();
    assert_eq!(timestamps, vec![3_000, 2_000, 1_000]);

    let fetched = storage.get_visit(&visits[0].id).await.unwrap().unwrap();
    assert_eq!(fetched, visits[0]);
    assert_eq!(fetched.device.as_deref(), Some("Desktop"));
    assert!(fetched.country.is_none());

    assert!(storage.list_visits("missing").await.unwrap().is_empty());
}

async fn check_delete_cascade(storage: Arc<dyn Storage>) {
    let user = unique("user");
    let code = qr_code(&user, &unique("gone"), 1);
    storage.create_qr_code(&code).await.unwrap();

    let mut visit_ids = vec![];
    for i in 0..3 {
        let visit = visit_at(&code.id, "10.0.0.1", 1_000 + i);
        storage.record_visit(&visit).await.unwrap();
        visit_ids.push(visit.id);
    }

    let deleted = storage.delete_qr_code(&code.id).await.unwrap().unwrap();
    assert_eq!(deleted.id, code.id);

    assert!(storage.get_qr_code(&code.id).await.unwrap().is_none());
    assert!(storage
        .get_qr_code_by_slug(&code.slug)
        .await
        .unwrap()
        .is_none());
    assert!(storage.list_qr_codes_by_user(&user).await.unwrap().is_empty());
    assert!(storage.list_visits(&code.id).await.unwrap().is_empty());
    for id in visit_ids {
        assert!(storage.get_visit(&id).await.unwrap().is_none());
    }

    // The slug is free again
    storage
        .create_qr_code(&qr_code(&user, &code.slug, 2))
        .await
        .unwrap();

    assert!(storage.delete_qr_code(&code.id).await.unwrap().is_none());
}

macro_rules! backend_tests {
    ($($name:ident => $check:ident),* $(,)?) => {
        mod sqlite {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    if !should_test_backend("sqlite") {
                        return;
                    }
                    $check(create_sqlite_storage().await).await;
                }
            )*
        }

        mod postgres {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    if !should_test_backend("postgres") {
                        return;
                    }
                    let Some(storage) = create_postgres_storage().await else {
                        eprintln!("Skipping PostgreSQL test: DATABASE_URL not set");
                        return;
                    };
                    $check(storage).await;
                }
            )*
        }
    };
}

backend_tests! {
    test_qr_code_round_trip => check_round_trip,
    test_duplicate_slug_conflict => check_duplicate_slug,
    test_concurrent_slug_creation => check_concurrent_slug_creation,
    test_list_by_user_newest_first => check_list_by_user,
    test_update_qr_code => check_update,
    test_visits_newest_first => check_visit_ordering,
    test_delete_removes_visits => check_delete_cascade,
}

#[tokio::test]
async fn test_file_backed_sqlite_survives_reopen() {
    if !should_test_backend("sqlite") {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("qrtrack.db").display());
    let code = qr_code("u1", "persisted", 1);

    {
        let storage = SqliteStorage::new(&url, 2).await.unwrap();
        storage.init().await.unwrap();
        storage.create_qr_code(&code).await.unwrap();
    }

    let reopened = SqliteStorage::new(&url, 2).await.unwrap();
    reopened.init().await.unwrap();
    let found = reopened.get_qr_code_by_slug("persisted").await.unwrap();
    assert_eq!(found, Some(code));
}
