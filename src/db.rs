// Lazily-initialized ORM connection, shared by every table module.
//
// Grounded on the teacher's `infra::db::{ORM_CLIENT, connect_to_orm}` plus
// its sqlite-only `get_lock()` mutex in `infra/src/table/organizations.rs`:
// sqlite serializes writers at the process level since it has no row
// locking story that sea-orm exposes portably, while postgres relies on
// real transactions and row locks (spec.md §4.3, §5).

use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::sync::{Mutex, MutexGuard};

use crate::config::get_config;
use crate::errors::{DbError, Error};

pub static ORM_CLIENT: OnceCell<DatabaseConnection> = OnceCell::new();
static SQLITE_WRITE_LOCK: Mutex<()> = Mutex::const_new(());

pub async fn connect_to_orm() -> DatabaseConnection {
    let cfg = get_config();
    let mut opts = ConnectOptions::new(cfg.database_url.clone());
    if cfg.database_url.contains(":memory:") {
        // An in-memory sqlite database is private to the connection that
        // created it; pin the pool to exactly one so every table module
        // observes the same database instead of a fresh empty one per
        // checkout.
        opts.max_connections(1).min_connections(1);
    } else {
        opts.max_connections(20).min_connections(1);
    }
    Database::connect(opts)
        .await
        .expect("failed to connect to database")
}

pub async fn client() -> &'static DatabaseConnection {
    ORM_CLIENT.get_or_init(connect_to_orm).await
}

pub fn is_sqlite() -> bool {
    get_config().database_url.starts_with("sqlite")
}

/// Held across a write when the configured backend is sqlite, which has no
/// portable `SELECT ... FOR UPDATE`; a no-op on postgres, which relies on
/// the transaction's own row lock instead.
pub async fn write_lock() -> Option<MutexGuard<'static, ()>> {
    if is_sqlite() {
        Some(SQLITE_WRITE_LOCK.lock().await)
    } else {
        None
    }
}

pub fn map_db_err(e: sea_orm::DbErr) -> Error {
    Error::Database(DbError::SeaORMError(e.to_string()))
}
