//! Settings database operations
//!
//! Key-value accessors over the `settings` table.

use camkey_common::{Error, Result};
use sqlx::{Pool, Sqlite};

/// Settings key holding the GetSongBPM credential
pub const GETSONGBPM_API_KEY: &str = "getsongbpm_api_key";

/// Get GetSongBPM credential from database
///
/// **Returns:** Some(key) if set, None otherwise
pub async fn get_getsongbpm_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, GETSONGBPM_API_KEY).await
}

/// Set GetSongBPM credential in database
pub async fn set_getsongbpm_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, GETSONGBPM_API_KEY, key).await
}

/// Remove GetSongBPM credential from database
pub async fn clear_getsongbpm_api_key(db: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(GETSONGBPM_API_KEY)
        .execute(db)
        .await
        .map_err(Error::Database)?;

    Ok(())
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
