use serde::Serialize;
use std::path::PathBuf;

use crate::config::resolve_db_path;
use crate::db::{create_pool, run_migrations};
use crate::error::Result;
use crate::store::SqliteStore;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open (and migrate) the store at `--db`, `$SIGNAGE_DB_PATH` or the default location.
pub async fn open_store(db: Option<PathBuf>) -> Result<SqliteStore> {
    let path = resolve_db_path(db);
    tracing::debug!("Using database {}", path.display());
    let pool = create_pool(&path).await?;
    run_migrations(&pool).await?;
    Ok(SqliteStore::new(pool))
}
