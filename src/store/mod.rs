//! Org-scoped data access layer.
//!
//! Every accessor that touches organization-owned data takes the owning
//! [`OrgId`] as an explicit parameter. The execution-context carrier could in
//! principle supply it ambiently, but a single missed ambient read would
//! silently scope a query to all tenants; the explicit parameter turns that
//! omission into a type error. There are deliberately no unscoped siblings:
//! genuinely cross-tenant operations live on [`SystemStore`] behind the
//! [`SystemScope`] token.
//!
//! Cross-tenant reference resolution: looking up an ID that exists under a
//! different organization behaves exactly like the ID not existing at all
//! (`Ok(None)`), so nothing can fish for another firm's records.
//!
//! Two backends exist: an in-memory one (always available) and a libSQL one
//! behind the `libsql` feature flag.

pub mod memory;

#[cfg(feature = "libsql")]
pub mod libsql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit;
use crate::error::StoreError;
use crate::tenant::scope::OrgId;

/// Capability token for genuinely cross-tenant operations.
///
/// The only constructor names the platform job requesting it and records an
/// audit event, so every cross-tenant code path is grepable and evidenced.
/// Tenant-facing request paths must never hold one.
#[derive(Debug, Clone, Copy)]
pub struct SystemScope {
    job: &'static str,
}

impl SystemScope {
    pub fn for_platform_job(job: &'static str) -> Self {
        tracing::info!(job, "cross-tenant system scope issued");
        audit::record("system_scope_issued", serde_json::json!({ "job": job }));
        Self { job }
    }

    pub fn job(&self) -> &'static str {
        self.job
    }
}

/// Client entity type for intake and conflict tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Individual,
    Entity,
}

impl ClientType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Entity => "entity",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "individual" => Some(Self::Individual),
            "entity" => Some(Self::Entity),
            _ => None,
        }
    }
}

/// Matter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatterStatus {
    Intake,
    Active,
    Closed,
    Archived,
}

impl MatterStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Archived => "archived",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "intake" => Some(Self::Intake),
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: Uuid,
    pub org_id: OrgId,
    pub name: String,
    pub name_normalized: String,
    pub client_type: ClientType,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateClientParams {
    pub name: String,
    pub client_type: ClientType,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateClientParams {
    pub name: Option<String>,
    pub client_type: Option<ClientType>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatterRecord {
    pub org_id: OrgId,
    pub matter_id: String,
    pub client_id: Uuid,
    pub status: MatterStatus,
    pub practice_area: Option<String>,
    pub jurisdiction: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UpsertMatterParams {
    pub matter_id: String,
    pub client_id: Uuid,
    pub status: MatterStatus,
    pub practice_area: Option<String>,
    pub jurisdiction: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// Normalize client/party names for dedup and search.
pub fn normalize_client_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_sep = true;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_sep = false;
        } else if !prev_sep {
            out.push(' ');
            prev_sep = true;
        }
    }

    out.trim().to_string()
}

// ==================== Org-scoped sub-traits ====================
//
// Each sub-trait groups related persistence methods; the `Database`
// supertrait combines them. Every method takes the owning `org` explicitly.

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn create_client(
        &self,
        org: OrgId,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, StoreError>;
    async fn get_client(
        &self,
        org: OrgId,
        client_id: Uuid,
    ) -> Result<Option<ClientRecord>, StoreError>;
    async fn list_clients(
        &self,
        org: OrgId,
        query: Option<&str>,
    ) -> Result<Vec<ClientRecord>, StoreError>;
    async fn update_client(
        &self,
        org: OrgId,
        client_id: Uuid,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, StoreError>;
    async fn delete_client(&self, org: OrgId, client_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait MatterStore: Send + Sync {
    async fn upsert_matter(
        &self,
        org: OrgId,
        input: &UpsertMatterParams,
    ) -> Result<MatterRecord, StoreError>;
    async fn get_matter(
        &self,
        org: OrgId,
        matter_id: &str,
    ) -> Result<Option<MatterRecord>, StoreError>;
    async fn list_matters(&self, org: OrgId) -> Result<Vec<MatterRecord>, StoreError>;
    async fn delete_matter(&self, org: OrgId, matter_id: &str) -> Result<bool, StoreError>;
}

/// Cross-tenant surface for platform jobs. Every method demands the
/// [`SystemScope`] token; nothing here is reachable from a tenant-facing
/// request path.
#[async_trait]
pub trait SystemStore: Send + Sync {
    async fn count_clients_per_org(
        &self,
        scope: SystemScope,
    ) -> Result<Vec<(OrgId, u64)>, StoreError>;
    /// Remove every record owned by an organization (offboarding). Returns
    /// the number of rows removed.
    async fn purge_org(&self, scope: SystemScope, org: OrgId) -> Result<u64, StoreError>;
}

/// Backend-agnostic supertrait combining the org-scoped stores.
#[async_trait]
pub trait Database: ClientStore + MatterStore + SystemStore + Send + Sync {
    /// Run schema migrations for this backend.
    async fn run_migrations(&self) -> Result<(), StoreError>;
}
