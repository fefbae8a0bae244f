use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::now_iso;
use crate::settings::Settings;

pub(crate) const SETTINGS_ID: &str = "default";

/// Stamped into `PRAGMA user_version` when a database is created.
pub(crate) const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// WAL with relaxed syncing for a single-writer file database.
pub(crate) fn configure_sqlite(conn: &Connection) -> Result<(), rusqlite::Error> {
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(mode = %mode, "sqlite kept its journal mode");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

pub(crate) fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS app_meta (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS settings (
            id TEXT PRIMARY KEY NOT NULL,
            quotationPrefix TEXT NOT NULL,
            nextQuotationNumber INTEGER NOT NULL,
            data_json TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY NOT NULL,
            companyName TEXT NOT NULL,
            data_json TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            sku TEXT NOT NULL DEFAULT '',
            data_json TEXT NOT NULL,
            updatedAt TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quotations (
            id TEXT PRIMARY KEY NOT NULL,
            quotationNumber TEXT NOT NULL,
            customerId TEXT NOT NULL,
            customerName TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'draft',
            issueDate TEXT NOT NULL,
            totalAmount REAL NOT NULL,
            createdBy TEXT NOT NULL DEFAULT '',
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL,
            data_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_quotations_number ON quotations(quotationNumber);
        CREATE INDEX IF NOT EXISTS idx_quotations_customerId ON quotations(customerId);
        CREATE INDEX IF NOT EXISTS idx_quotations_customerName ON quotations(customerName);
        CREATE INDEX IF NOT EXISTS idx_customers_companyName ON customers(companyName);
        CREATE INDEX IF NOT EXISTS idx_products_name ON products(name);
        "#,
    )?;
    Ok(())
}

/// Stamps a new database with the current version and refuses files written
/// by a newer build.
pub(crate) fn stamp_schema_version(conn: &Connection) -> Result<(), rusqlite::Error> {
    let v: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if v == 0 {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    } else if v > SCHEMA_VERSION {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            Some(format!("database schema version {v} is newer than supported version {SCHEMA_VERSION}")),
        ));
    }
    Ok(())
}

fn settings_json(s: &Settings) -> Result<String, rusqlite::Error> {
    serde_json::to_string(s).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn ensure_settings_row(conn: &Connection) -> Result<(), rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM settings WHERE id = ?1",
        params![SETTINGS_ID],
        |row| row.get(0),
    )?;
    if count > 0 {
        return Ok(());
    }

    let s = Settings::default();
    let data_json = settings_json(&s)?;
    conn.execute(
        "INSERT INTO settings (id, quotationPrefix, nextQuotationNumber, data_json, updatedAt) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![SETTINGS_ID, s.quotation_prefix, s.next_quotation_number, data_json, now_iso()],
    )?;
    Ok(())
}

/// Reads the settings row; the numbering columns win over the JSON copy.
/// A row whose JSON does not parse is an error, never a silent reset.
pub(crate) fn read_settings(conn: &Connection) -> Result<Settings, rusqlite::Error> {
    let (json, prefix, next): (String, String, i64) = conn.query_row(
        "SELECT data_json, quotationPrefix, nextQuotationNumber FROM settings WHERE id = ?1",
        params![SETTINGS_ID],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    let mut s: Settings = serde_json::from_str(&json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    s.quotation_prefix = prefix;
    s.next_quotation_number = next;
    Ok(s)
}

pub(crate) fn write_settings(conn: &Connection, s: &Settings) -> Result<(), rusqlite::Error> {
    let data_json = settings_json(s)?;
    conn.execute(
        "UPDATE settings SET quotationPrefix = ?2, nextQuotationNumber = ?3, data_json = ?4, updatedAt = ?5 WHERE id = ?1",
        params![SETTINGS_ID, s.quotation_prefix, s.next_quotation_number, data_json, now_iso()],
    )?;
    Ok(())
}

pub(crate) fn app_meta_get(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row("SELECT value FROM app_meta WHERE key = ?1", params![key], |r| r.get(0))
        .optional()
}

pub(crate) fn app_meta_set(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO app_meta(key, value) VALUES(?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}
