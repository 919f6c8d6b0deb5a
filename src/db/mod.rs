mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    Pool::builder().max_size(10).build(manager)
}

/// Single-connection pool over an in-memory database.
///
/// Every in-memory connection is its own database, so the pool must never
/// hand out a second one.
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateApp;
    use tempfile::tempdir;

    #[test]
    fn test_file_pool_shares_data_between_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("payhook.db");
        let pool = create_pool(path.to_str().unwrap()).unwrap();

        let first = pool.get().unwrap();
        init_db(&first).unwrap();
        // Running the schema twice is harmless
        init_db(&first).unwrap();
        let app = queries::create_app(
            &first,
            &CreateApp {
                identifier: "vendor.payments".into(),
                name: "Payments".into(),
            },
        )
        .unwrap();

        let second = pool.get().unwrap();
        let found = queries::get_app_by_identifier(&second, "vendor.payments")
            .unwrap()
            .unwrap();
        assert_eq!(found, app);
    }

    #[test]
    fn test_memory_pool_keeps_its_database() {
        let pool = create_memory_pool().unwrap();
        init_db(&pool.get().unwrap()).unwrap();

        let conn = pool.get().unwrap();
        assert!(queries::get_app_by_identifier(&conn, "missing").unwrap().is_none());
    }
}
