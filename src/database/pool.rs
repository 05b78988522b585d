use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{
    fs::{OpenOptions, create_dir_all},
    path::Path,
};

/// Establishes a connection pool to the SQLite database
pub async fn create_sqlite_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    ensure_sqlite_file_exists(database_url)?;

    let pool = SqlitePoolOptions::new().connect(database_url).await?;

    Ok(pool)
}

/// Creates the database file and its parent directories if necessary
fn ensure_sqlite_file_exists(database_url: &str) -> std::io::Result<()> {
    let path = database_url.trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent)?;
        }
    }

    if !path.exists() {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
