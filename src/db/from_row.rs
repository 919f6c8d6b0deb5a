//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const APP_COLS: &str = "id, identifier, name, is_active, created_at";

/// Prefixed with `w.` so it can be used in joins.
pub const WEBHOOK_COLS: &str =
    "w.id, w.app_id, w.name, w.target_url, w.secret_key, w.subscription_query, w.is_active";

pub const EVENT_DELIVERY_COLS: &str = "id, event_type, webhook_id, payload, created_at";

// ============ FromRow Implementations ============

impl FromRow for App {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(App {
            id: row.get(0)?,
            identifier: row.get(1)?,
            name: row.get(2)?,
            is_active: row.get::<_, i32>(3)? != 0,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Webhook {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Webhook {
            id: row.get(0)?,
            app_id: row.get(1)?,
            name: row.get(2)?,
            target_url: row.get(3)?,
            secret_key: row.get(4)?,
            subscription_query: row.get(5)?,
            is_active: row.get::<_, i32>(6)? != 0,
        })
    }
}

impl FromRow for EventDelivery {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EventDelivery {
            id: row.get(0)?,
            event_type: parse_enum(row, 1, "event_type")?,
            webhook_id: row.get(2)?,
            payload: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
