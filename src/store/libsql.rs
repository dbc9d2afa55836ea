//! libSQL backend for the org-scoped stores.
//!
//! Embedded SQLite-compatible file database. Every statement that touches an
//! org-owned table carries `org_id = ?` in its WHERE clause or column list;
//! there is no statement in this file that reads across organizations except
//! on the [`SystemStore`] surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Value, params};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    ClientRecord, ClientStore, ClientType, CreateClientParams, Database, MatterRecord,
    MatterStatus, MatterStore, SystemScope, SystemStore, UpdateClientParams, UpsertMatterParams,
    normalize_client_name,
};
use crate::tenant::scope::OrgId;

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS clients (
        id TEXT PRIMARY KEY,
        org_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        name_normalized TEXT NOT NULL,
        client_type TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_clients_org ON clients (org_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_org_name
        ON clients (org_id, name_normalized)",
    "CREATE TABLE IF NOT EXISTS matters (
        org_id INTEGER NOT NULL,
        matter_id TEXT NOT NULL,
        client_id TEXT NOT NULL,
        status TEXT NOT NULL,
        practice_area TEXT,
        jurisdiction TEXT,
        opened_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (org_id, matter_id)
    )",
];

const CLIENT_COLUMNS: &str =
    "id, org_id, name, name_normalized, client_type, email, phone, notes, created_at, updated_at";
const MATTER_COLUMNS: &str = "org_id, matter_id, client_id, status, practice_area, jurisdiction, \
                              opened_at, created_at, updated_at";

pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    pub async fn new_local(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self { db })
    }

    fn connect(&self) -> Result<libsql::Connection, StoreError> {
        self.db
            .connect()
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

fn opt_text(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn get_value(row: &libsql::Row, idx: i32) -> Result<Value, StoreError> {
    row.get_value(idx)
        .map_err(|e| StoreError::Query(e.to_string()))
}

fn text(row: &libsql::Row, idx: i32, field: &str) -> Result<String, StoreError> {
    match get_value(row, idx)? {
        Value::Text(s) => Ok(s),
        other => Err(StoreError::Serialization(format!(
            "expected text for {field}, got {other:?}"
        ))),
    }
}

fn opt_text_col(row: &libsql::Row, idx: i32, field: &str) -> Result<Option<String>, StoreError> {
    match get_value(row, idx)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(StoreError::Serialization(format!(
            "expected text or null for {field}, got {other:?}"
        ))),
    }
}

fn integer(row: &libsql::Row, idx: i32, field: &str) -> Result<i64, StoreError> {
    match get_value(row, idx)? {
        Value::Integer(n) => Ok(n),
        other => Err(StoreError::Serialization(format!(
            "expected integer for {field}, got {other:?}"
        ))),
    }
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw)
        .map_err(|e| StoreError::Serialization(format!("invalid {field} uuid: {e}")))
}

fn parse_ts(raw: &str, field: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("invalid {field} timestamp: {e}")))
}

fn parse_ts_opt(raw: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|value| parse_ts(&value, field)).transpose()
}

async fn fetch_client(
    conn: &libsql::Connection,
    org: OrgId,
    client_id: Uuid,
) -> Result<Option<ClientRecord>, StoreError> {
    let mut rows = conn
        .query(
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1 AND org_id = ?2 LIMIT 1"),
            params![client_id.to_string(), org.as_i64()],
        )
        .await?;

    match rows.next().await? {
        Some(row) => Ok(Some(row_to_client_record(&row)?)),
        None => Ok(None),
    }
}

fn row_to_client_record(row: &libsql::Row) -> Result<ClientRecord, StoreError> {
    let client_type_raw = text(row, 4, "clients.client_type")?;
    Ok(ClientRecord {
        id: parse_uuid(&text(row, 0, "clients.id")?, "clients.id")?,
        org_id: OrgId(integer(row, 1, "clients.org_id")?),
        name: text(row, 2, "clients.name")?,
        name_normalized: text(row, 3, "clients.name_normalized")?,
        client_type: ClientType::from_db_value(&client_type_raw).ok_or_else(|| {
            StoreError::Serialization(format!("invalid client_type '{client_type_raw}'"))
        })?,
        email: opt_text_col(row, 5, "clients.email")?,
        phone: opt_text_col(row, 6, "clients.phone")?,
        notes: opt_text_col(row, 7, "clients.notes")?,
        created_at: parse_ts(&text(row, 8, "clients.created_at")?, "clients.created_at")?,
        updated_at: parse_ts(&text(row, 9, "clients.updated_at")?, "clients.updated_at")?,
    })
}

fn row_to_matter_record(row: &libsql::Row) -> Result<MatterRecord, StoreError> {
    let status_raw = text(row, 3, "matters.status")?;
    Ok(MatterRecord {
        org_id: OrgId(integer(row, 0, "matters.org_id")?),
        matter_id: text(row, 1, "matters.matter_id")?,
        client_id: parse_uuid(&text(row, 2, "matters.client_id")?, "matters.client_id")?,
        status: MatterStatus::from_db_value(&status_raw).ok_or_else(|| {
            StoreError::Serialization(format!("invalid matter status '{status_raw}'"))
        })?,
        practice_area: opt_text_col(row, 4, "matters.practice_area")?,
        jurisdiction: opt_text_col(row, 5, "matters.jurisdiction")?,
        opened_at: parse_ts_opt(opt_text_col(row, 6, "matters.opened_at")?, "matters.opened_at")?,
        created_at: parse_ts(&text(row, 7, "matters.created_at")?, "matters.created_at")?,
        updated_at: parse_ts(&text(row, 8, "matters.updated_at")?, "matters.updated_at")?,
    })
}

#[async_trait]
impl ClientStore for LibSqlBackend {
    async fn create_client(
        &self,
        org: OrgId,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, StoreError> {
        let name_normalized = normalize_client_name(&input.name);
        if name_normalized.is_empty() {
            return Err(StoreError::Serialization(
                "client name cannot be empty".to_string(),
            ));
        }

        let conn = self.connect()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO clients (id, org_id, name, name_normalized, client_type, email, phone, notes, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id.as_str(),
                org.as_i64(),
                input.name.trim(),
                name_normalized.as_str(),
                input.client_type.as_str(),
                opt_text(input.email.as_deref()),
                opt_text(input.phone.as_deref()),
                opt_text(input.notes.as_deref()),
                now.as_str(),
                now.as_str(),
            ],
        )
        .await?;

        let row = conn
            .query(
                &format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1 AND org_id = ?2 LIMIT 1"
                ),
                params![id.as_str(), org.as_i64()],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| StoreError::Query("failed to load created client".to_string()))?;

        row_to_client_record(&row)
    }

    async fn get_client(
        &self,
        org: OrgId,
        client_id: Uuid,
    ) -> Result<Option<ClientRecord>, StoreError> {
        let conn = self.connect()?;
        fetch_client(&conn, org, client_id).await
    }

    async fn list_clients(
        &self,
        org: OrgId,
        query: Option<&str>,
    ) -> Result<Vec<ClientRecord>, StoreError> {
        let conn = self.connect()?;
        let needle = query.map(normalize_client_name).filter(|s| !s.is_empty());
        let mut rows = match needle {
            Some(search) => {
                let like = format!("%{search}%");
                conn.query(
                    &format!(
                        "SELECT {CLIENT_COLUMNS} FROM clients \
                         WHERE org_id = ?1 AND name_normalized LIKE ?2 ORDER BY name ASC"
                    ),
                    params![org.as_i64(), like],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {CLIENT_COLUMNS} FROM clients WHERE org_id = ?1 ORDER BY name ASC"
                    ),
                    params![org.as_i64()],
                )
                .await?
            }
        };

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_client_record(&row)?);
        }
        Ok(records)
    }

    async fn update_client(
        &self,
        org: OrgId,
        client_id: Uuid,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, StoreError> {
        let conn = self.connect()?;
        // The merge is read-modify-write; an immediate transaction takes the
        // write lock before the read so concurrent updates serialize instead
        // of clobbering each other's fields. Dropping the transaction on any
        // error path rolls it back.
        let tx = conn
            .transaction_with_behavior(libsql::TransactionBehavior::Immediate)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let current = match fetch_client(&tx, org, client_id).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let (name, name_normalized) = match &input.name {
            Some(raw) => {
                let normalized = normalize_client_name(raw);
                if normalized.is_empty() {
                    return Err(StoreError::Serialization(
                        "client name cannot be empty".to_string(),
                    ));
                }
                (raw.trim().to_string(), normalized)
            }
            None => (current.name.clone(), current.name_normalized.clone()),
        };
        let client_type = input.client_type.unwrap_or(current.client_type);
        let email = input.email.clone().unwrap_or(current.email);
        let phone = input.phone.clone().unwrap_or(current.phone);
        let notes = input.notes.clone().unwrap_or(current.notes);

        tx.execute(
            "UPDATE clients SET name = ?3, name_normalized = ?4, client_type = ?5, email = ?6, \
             phone = ?7, notes = ?8, updated_at = ?9 WHERE id = ?1 AND org_id = ?2",
            params![
                client_id.to_string(),
                org.as_i64(),
                name.as_str(),
                name_normalized.as_str(),
                client_type.as_str(),
                opt_text(email.as_deref()),
                opt_text(phone.as_deref()),
                opt_text(notes.as_deref()),
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        let updated = fetch_client(&tx, org, client_id).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(updated)
    }

    async fn delete_client(&self, org: OrgId, client_id: Uuid) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                "DELETE FROM clients WHERE id = ?1 AND org_id = ?2",
                params![client_id.to_string(), org.as_i64()],
            )
            .await?;
        Ok(affected > 0)
    }
}

#[async_trait]
impl MatterStore for LibSqlBackend {
    async fn upsert_matter(
        &self,
        org: OrgId,
        input: &UpsertMatterParams,
    ) -> Result<MatterRecord, StoreError> {
        let conn = self.connect()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO matters (org_id, matter_id, client_id, status, practice_area, jurisdiction, opened_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             ON CONFLICT (org_id, matter_id) DO UPDATE SET \
               client_id = excluded.client_id, \
               status = excluded.status, \
               practice_area = excluded.practice_area, \
               jurisdiction = excluded.jurisdiction, \
               opened_at = excluded.opened_at, \
               updated_at = excluded.updated_at",
            params![
                org.as_i64(),
                input.matter_id.as_str(),
                input.client_id.to_string(),
                input.status.as_str(),
                opt_text(input.practice_area.as_deref()),
                opt_text(input.jurisdiction.as_deref()),
                opt_text(input.opened_at.map(|dt| dt.to_rfc3339()).as_deref()),
                now.as_str(),
            ],
        )
        .await?;

        self.get_matter(org, &input.matter_id)
            .await?
            .ok_or_else(|| StoreError::Query("failed to resolve upserted matter".to_string()))
    }

    async fn get_matter(
        &self,
        org: OrgId,
        matter_id: &str,
    ) -> Result<Option<MatterRecord>, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {MATTER_COLUMNS} FROM matters \
                     WHERE org_id = ?1 AND matter_id = ?2 LIMIT 1"
                ),
                params![org.as_i64(), matter_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_matter_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_matters(&self, org: OrgId) -> Result<Vec<MatterRecord>, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {MATTER_COLUMNS} FROM matters WHERE org_id = ?1 ORDER BY matter_id ASC"
                ),
                params![org.as_i64()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_matter_record(&row)?);
        }
        Ok(records)
    }

    async fn delete_matter(&self, org: OrgId, matter_id: &str) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let affected = conn
            .execute(
                "DELETE FROM matters WHERE org_id = ?1 AND matter_id = ?2",
                params![org.as_i64(), matter_id],
            )
            .await?;
        Ok(affected > 0)
    }
}

#[async_trait]
impl SystemStore for LibSqlBackend {
    async fn count_clients_per_org(
        &self,
        scope: SystemScope,
    ) -> Result<Vec<(OrgId, u64)>, StoreError> {
        tracing::debug!(job = scope.job(), "cross-tenant client count");
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT org_id, COUNT(*) FROM clients GROUP BY org_id ORDER BY org_id ASC",
                (),
            )
            .await?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next().await? {
            let org = OrgId(integer(&row, 0, "clients.org_id")?);
            let count = integer(&row, 1, "count")?;
            counts.push((org, count as u64));
        }
        Ok(counts)
    }

    async fn purge_org(&self, scope: SystemScope, org: OrgId) -> Result<u64, StoreError> {
        tracing::info!(job = scope.job(), %org, "purging organization data");
        let conn = self.connect()?;
        let clients = conn
            .execute("DELETE FROM clients WHERE org_id = ?1", params![org.as_i64()])
            .await?;
        let matters = conn
            .execute("DELETE FROM matters WHERE org_id = ?1", params![org.as_i64()])
            .await?;
        Ok(clients + matters)
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.connect()?;
        for statement in MIGRATIONS {
            conn.execute(statement, ()).await?;
        }
        Ok(())
    }
}
