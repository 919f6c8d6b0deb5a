use rusqlite::Connection;

/// Initialize the schema: app/webhook registry and the delivery log.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Apps (external applications; registration itself happens elsewhere)
        CREATE TABLE IF NOT EXISTS apps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        -- Webhooks (one app can own several endpoints)
        -- subscription_query NULL = static payload shape
        CREATE TABLE IF NOT EXISTS webhooks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            app_id INTEGER NOT NULL REFERENCES apps(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            target_url TEXT NOT NULL,
            secret_key TEXT,
            subscription_query TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_webhooks_app ON webhooks(app_id);

        -- Sync events a webhook subscribes to
        CREATE TABLE IF NOT EXISTS webhook_events (
            webhook_id INTEGER NOT NULL REFERENCES webhooks(id) ON DELETE CASCADE,
            event_type TEXT NOT NULL,
            PRIMARY KEY (webhook_id, event_type)
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_type ON webhook_events(event_type);

        -- Event deliveries (append-only: one row per dispatch attempt)
        CREATE TABLE IF NOT EXISTS event_deliveries (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            webhook_id INTEGER NOT NULL REFERENCES webhooks(id) ON DELETE CASCADE,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_event_deliveries_type ON event_deliveries(event_type, created_at);

        CREATE TRIGGER IF NOT EXISTS event_deliveries_immutable
        BEFORE UPDATE ON event_deliveries
        BEGIN
            SELECT RAISE(ABORT, 'event deliveries are immutable');
        END;
        "#,
    )
}
