use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::debug;

use crate::error::CoreError;

// Re-export the pool for use in other parts of the core crate
pub use sqlx::SqlitePool as DbPool;

/// Establishes a connection pool to the SQLite database and runs migrations.
///
/// # Arguments
///
/// * `db_path` - The path to the SQLite database file, if one is configured.
///
/// # Returns
///
/// A `Result` containing the `SqlitePool`. A missing or blank path is reported
/// as [`CoreError::NotConfigured`] before any I/O happens.
pub async fn establish_connection(db_path: Option<&str>) -> Result<SqlitePool, CoreError> {
    let db_path = match db_path.map(str::trim) {
        Some(path) if !path.is_empty() => path,
        _ => {
            return Err(CoreError::NotConfigured(
                "no database path was provided".to_string(),
            ))
        }
    };

    // Create the parent directory if it doesn't exist
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    debug!(path = db_path, "Database ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_path_is_not_configured() {
        assert!(matches!(
            establish_connection(None).await,
            Err(CoreError::NotConfigured(_))
        ));
        assert!(matches!(
            establish_connection(Some("   ")).await,
            Err(CoreError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_creates_nested_database_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("homekeep.db");

        let pool = establish_connection(Some(&db_path.to_string_lossy())).await.unwrap();
        assert!(db_path.exists());
        pool.close().await;
    }
}
