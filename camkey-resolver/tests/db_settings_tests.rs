//! Settings table accessors

use camkey_resolver::db::settings::{
    clear_getsongbpm_api_key, get_getsongbpm_api_key, set_getsongbpm_api_key,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn settings_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    camkey_common::db::create_settings_table(&pool).await.unwrap();
    pool
}

#[tokio::test]
async fn test_get_returns_none_when_unset() {
    let pool = settings_pool().await;
    assert_eq!(get_getsongbpm_api_key(&pool).await.unwrap(), None);
}

#[tokio::test]
async fn test_set_then_get() {
    let pool = settings_pool().await;

    set_getsongbpm_api_key(&pool, "key-123".to_string())
        .await
        .unwrap();

    assert_eq!(
        get_getsongbpm_api_key(&pool).await.unwrap(),
        Some("key-123".to_string())
    );

    let row: (String,) =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'getsongbpm_api_key'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(row.0, "key-123");
}

#[tokio::test]
async fn test_set_overwrites_existing_value() {
    let pool = settings_pool().await;

    set_getsongbpm_api_key(&pool, "first".to_string()).await.unwrap();
    set_getsongbpm_api_key(&pool, "second".to_string()).await.unwrap();

    assert_eq!(
        get_getsongbpm_api_key(&pool).await.unwrap(),
        Some("second".to_string())
    );

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_clear_removes_value() {
    let pool = settings_pool().await;

    set_getsongbpm_api_key(&pool, "gone-soon".to_string())
        .await
        .unwrap();
    clear_getsongbpm_api_key(&pool).await.unwrap();
    assert_eq!(get_getsongbpm_api_key(&pool).await.unwrap(), None);

    // clearing twice is fine
    clear_getsongbpm_api_key(&pool).await.unwrap();
}

#[tokio::test]
async fn test_missing_table_is_database_error() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();

    let err = get_getsongbpm_api_key(&pool).await.unwrap_err();
    assert!(matches!(err, camkey_common::Error::Database(_)));
}
