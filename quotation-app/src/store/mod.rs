//! SQLite document store for quotations, the product and customer
//! collections, settings and app metadata.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Customer, Product};
use crate::error::describe_sqlite_error;
use crate::quotation::{Quotation, QuotationStatus};
use crate::settings::{Settings, SettingsPatch};
use crate::{now_iso, QuotationError, Result};

mod schema;

const DB_FILE_NAME: &str = "quotations.db";

/// Picks the database file: an explicit path wins, then `quotations.db` in
/// the working directory if it exists, then one beside the executable if that
/// exists, else a new file in the working directory.
pub fn resolve_db_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }

    let in_cwd = std::env::current_dir()?.join(DB_FILE_NAME);
    if in_cwd.exists() {
        return Ok(in_cwd);
    }
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DB_FILE_NAME)))
        .filter(|p| p.exists());
    Ok(beside_exe.unwrap_or(in_cwd))
}

/// Row of the quotation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationSummary {
    pub id: String,
    pub quotation_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub status: String,
    pub issue_date: String,
    pub total_amount: f64,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    write_lock: Arc<Mutex<()>>,
}

fn storage_error(op: &'static str, e: rusqlite::Error) -> QuotationError {
    let message = describe_sqlite_error(&e);
    tracing::error!(op, error = %message, "sqlite operation failed");
    QuotationError::Storage { op, message }
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| storage_error("open", e))?;
        configure(&conn, true)?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| storage_error("open", e))?;
        configure(&conn, false)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn with_read<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> std::result::Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| QuotationError::Task("db mutex poisoned".to_string()))?;
            f(&guard).map_err(|e| storage_error(op, e))
        })
        .await
        .map_err(|e| QuotationError::Task(e.to_string()))?
    }

    async fn with_write<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> std::result::Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = self.conn.clone();
        let write_lock = self.write_lock.clone();
        tokio::task::spawn_blocking(move || {
            let _wg = write_lock
                .lock()
                .map_err(|_| QuotationError::Task("write mutex poisoned".to_string()))?;
            let mut guard = conn
                .lock()
                .map_err(|_| QuotationError::Task("db mutex poisoned".to_string()))?;
            f(&mut guard).map_err(|e| storage_error(op, e))
        })
        .await
        .map_err(|e| QuotationError::Task(e.to_string()))?
    }

    // ----- settings -----

    pub async fn settings(&self) -> Result<Settings> {
        self.with_read("get_settings", schema::read_settings).await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        let mut current = self.settings().await?;
        current.apply(patch)?;
        let updated = current.clone();
        self.with_write("update_settings", move |conn| schema::write_settings(conn, &updated))
            .await?;
        Ok(current)
    }

    /// Formats the next number without consuming it.
    pub async fn preview_next_quotation_number(&self) -> Result<String> {
        let s = self.settings().await?;
        Ok(s.format_quotation_number(s.next_quotation_number))
    }

    /// Consumes the next number from the settings counter.
    pub async fn reserve_quotation_number(&self) -> Result<String> {
        self.with_write("reserve_quotation_number", |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let s = schema::read_settings(&tx)?;
            let number = s.format_quotation_number(s.next_quotation_number);
            tx.execute(
                "UPDATE settings SET nextQuotationNumber = nextQuotationNumber + 1, updatedAt = ?2 WHERE id = ?1",
                params![schema::SETTINGS_ID, now_iso()],
            )?;
            tx.commit()?;
            Ok(number)
        })
        .await
    }

    // ----- quotations -----

    /// Validates, refreshes cached totals and upserts the document.
    pub async fn save_quotation(&self, quotation: &mut Quotation) -> Result<()> {
        quotation.validate_for_save()?;
        quotation.refresh_totals();
        if quotation.created_at.trim().is_empty() {
            quotation.created_at = now_iso();
        }
        quotation.touch();

        let json = serde_json::to_string(&*quotation)?;
        let row = (
            quotation.id.clone(),
            quotation.quotation_number.clone(),
            quotation.customer_id.clone(),
            customer_display_name(quotation),
            quotation.status.as_str().to_string(),
            quotation.issue_date.clone(),
            quotation.totals().grand_total,
            quotation.created_by.clone(),
            quotation.created_at.clone(),
            quotation.updated_at.clone(),
        );

        self.with_write("save_quotation", move |conn| {
            conn.execute(
                r#"INSERT INTO quotations (
                    id, quotationNumber, customerId, customerName, status, issueDate, totalAmount,
                    createdBy, createdAt, updatedAt, data_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(id) DO UPDATE SET
                    quotationNumber = excluded.quotationNumber,
                    customerId = excluded.customerId,
                    customerName = excluded.customerName,
                    status = excluded.status,
                    issueDate = excluded.issueDate,
                    totalAmount = excluded.totalAmount,
                    updatedAt = excluded.updatedAt,
                    data_json = excluded.data_json"#,
                params![row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8, row.9, json],
            )?;
            Ok(())
        })
        .await?;

        tracing::info!(
            id = %quotation.id,
            number = %quotation.quotation_number,
            total = quotation.totals().grand_total,
            "quotation saved"
        );
        Ok(())
    }

    pub async fn get_quotation(&self, id: &str) -> Result<Option<Quotation>> {
        let id = id.to_string();
        let json = self
            .with_read("get_quotation", move |conn| {
                conn.query_row("SELECT data_json FROM quotations WHERE id = ?1", params![id], |r| {
                    r.get::<_, String>(0)
                })
                .optional()
            })
            .await?;
        json.map(|j| Quotation::from_json(&j)).transpose()
    }

    /// Quotations ordered by last update, optionally for one customer (matched by name).
    pub async fn list_quotations(&self, customer_name: Option<&str>) -> Result<Vec<QuotationSummary>> {
        let filter = customer_name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.with_read("list_quotations", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, quotationNumber, customerId, customerName, status, issueDate, totalAmount, updatedAt
                 FROM quotations
                 WHERE ?1 IS NULL OR customerName = ?1 COLLATE NOCASE
                 ORDER BY updatedAt DESC",
            )?;
            let rows = stmt.query_map(params![filter], |r| {
                Ok(QuotationSummary {
                    id: r.get(0)?,
                    quotation_number: r.get(1)?,
                    customer_id: r.get(2)?,
                    customer_name: r.get(3)?,
                    status: r.get(4)?,
                    issue_date: r.get(5)?,
                    total_amount: r.get(6)?,
                    updated_at: r.get(7)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    pub async fn set_quotation_status(&self, id: &str, status: QuotationStatus) -> Result<Quotation> {
        let mut q = self
            .get_quotation(id)
            .await?
            .ok_or_else(|| QuotationError::not_found("quotation", id))?;
        match status {
            QuotationStatus::Draft => q.reopen(),
            QuotationStatus::Sent => q.mark_sent(),
            QuotationStatus::Approved => q.approve(),
            QuotationStatus::Rejected => q.reject(),
        }
        self.save_quotation(&mut q).await?;
        Ok(q)
    }

    pub async fn delete_quotation(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.with_write("delete_quotation", move |conn| {
            let n = conn.execute("DELETE FROM quotations WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
        .await
    }

    // ----- catalog -----

    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        let json = serde_json::to_string(product)?;
        let (id, name, sku) = (product.id.clone(), product.name.clone(), product.sku.clone());
        self.with_write("upsert_product", move |conn| {
            conn.execute(
                "INSERT INTO products (id, name, sku, data_json, updatedAt) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, sku = excluded.sku,
                    data_json = excluded.data_json, updatedAt = excluded.updatedAt",
                params![id, name, sku, json, now_iso()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn upsert_customer(&self, customer: &Customer) -> Result<()> {
        let json = serde_json::to_string(customer)?;
        let (id, company) = (customer.id.clone(), customer.company_name.clone());
        self.with_write("upsert_customer", move |conn| {
            conn.execute(
                "INSERT INTO customers (id, companyName, data_json, updatedAt) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET companyName = excluded.companyName,
                    data_json = excluded.data_json, updatedAt = excluded.updatedAt",
                params![id, company, json, now_iso()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = self
            .with_read("list_customers", |conn| {
                let mut stmt = conn.prepare("SELECT data_json FROM customers ORDER BY companyName COLLATE NOCASE")?;
                let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
                rows.collect::<std::result::Result<Vec<String>, _>>()
            })
            .await?;
        rows.iter()
            .map(|j| serde_json::from_str(j).map_err(QuotationError::from))
            .collect()
    }

    // ----- app meta -----

    pub async fn app_meta(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_read("get_app_meta", move |conn| schema::app_meta_get(conn, &key))
            .await
    }

    pub async fn set_app_meta(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.with_write("set_app_meta", move |conn| schema::app_meta_set(conn, &key, &value))
            .await
    }

    async fn read_json<T>(&self, op: &'static str, sql: &'static str, id: &str) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let id = id.to_string();
        let json = self
            .with_read(op, move |conn| {
                conn.query_row(sql, params![id], |r| r.get::<_, String>(0)).optional()
            })
            .await?;
        json.map(|j| serde_json::from_str(&j).map_err(QuotationError::from))
            .transpose()
    }
}

fn configure(conn: &Connection, file_backed: bool) -> Result<()> {
    let run = |conn: &Connection| -> std::result::Result<(), rusqlite::Error> {
        if file_backed {
            schema::configure_sqlite(conn)?;
        }
        schema::init_schema(conn)?;
        schema::stamp_schema_version(conn)?;
        schema::ensure_settings_row(conn)?;
        Ok(())
    };
    run(conn).map_err(|e| storage_error("init", e))
}

fn customer_display_name(q: &Quotation) -> String {
    if !q.customer_name.trim().is_empty() {
        q.customer_name.trim().to_string()
    } else {
        q.customer_company.trim().to_string()
    }
}

#[async_trait]
impl Catalog for Store {
    async fn product(&self, id: &str) -> Result<Option<Product>> {
        self.read_json("get_product", "SELECT data_json FROM products WHERE id = ?1", id)
            .await
    }

    async fn customer(&self, id: &str) -> Result<Option<Customer>> {
        self.read_json("get_customer", "SELECT data_json FROM customers WHERE id = ?1", id)
            .await
    }
}
