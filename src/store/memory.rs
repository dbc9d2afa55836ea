//! In-memory backend for tests and embedded deployments.
//!
//! Same contract as the libSQL backend, including the cross-tenant
//! resolution policy: a lookup under the wrong organization is `Ok(None)`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    ClientRecord, ClientStore, CreateClientParams, Database, MatterRecord, MatterStore,
    SystemScope, SystemStore, UpdateClientParams, UpsertMatterParams, normalize_client_name,
};
use crate::tenant::scope::OrgId;

#[derive(Default)]
struct State {
    clients: HashMap<Uuid, ClientRecord>,
    matters: HashMap<(i64, String), MatterRecord>,
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|e| StoreError::Pool(format!("state lock poisoned: {e}")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::Pool(format!("state lock poisoned: {e}")))
    }
}

#[async_trait]
impl ClientStore for MemoryBackend {
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

        let mut state = self.write()?;
        // Same uniqueness rule the libSQL schema enforces with an index on
        // (org_id, name_normalized).
        if state
            .clients
            .values()
            .any(|record| record.org_id == org && record.name_normalized == name_normalized)
        {
            return Err(StoreError::Query(format!(
                "UNIQUE constraint failed: clients.org_id, clients.name_normalized ({name_normalized})"
            )));
        }

        let now = Utc::now();
        let record = ClientRecord {
            id: Uuid::new_v4(),
            org_id: org,
            name: input.name.trim().to_string(),
            name_normalized,
            client_type: input.client_type,
            email: input.email.clone(),
            phone: input.phone.clone(),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        state.clients.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_client(
        &self,
        org: OrgId,
        client_id: Uuid,
    ) -> Result<Option<ClientRecord>, StoreError> {
        // Ownership filter, not a post-check an endpoint could forget:
        // the wrong org gets the same None a missing ID gets.
        Ok(self
            .read()?
            .clients
            .get(&client_id)
            .filter(|record| record.org_id == org)
            .cloned())
    }

    async fn list_clients(
        &self,
        org: OrgId,
        query: Option<&str>,
    ) -> Result<Vec<ClientRecord>, StoreError> {
        let needle = query.map(normalize_client_name).filter(|s| !s.is_empty());
        let mut records: Vec<ClientRecord> = self
            .read()?
            .clients
            .values()
            .filter(|record| record.org_id == org)
            .filter(|record| match &needle {
                Some(n) => record.name_normalized.contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn update_client(
        &self,
        org: OrgId,
        client_id: Uuid,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, StoreError> {
        let mut state = self.write()?;
        if !state
            .clients
            .get(&client_id)
            .is_some_and(|record| record.org_id == org)
        {
            return Ok(None);
        }

        let rename = match &input.name {
            Some(name) => {
                let normalized = normalize_client_name(name);
                if normalized.is_empty() {
                    return Err(StoreError::Serialization(
                        "client name cannot be empty".to_string(),
                    ));
                }
                // Renames hit the same uniqueness rule as inserts.
                if state.clients.values().any(|other| {
                    other.id != client_id
                        && other.org_id == org
                        && other.name_normalized == normalized
                }) {
                    return Err(StoreError::Query(format!(
                        "UNIQUE constraint failed: clients.org_id, clients.name_normalized ({normalized})"
                    )));
                }
                Some((name.trim().to_string(), normalized))
            }
            None => None,
        };

        let Some(record) = state
            .clients
            .get_mut(&client_id)
            .filter(|record| record.org_id == org)
        else {
            return Ok(None);
        };

        if let Some((name, normalized)) = rename {
            record.name = name;
            record.name_normalized = normalized;
        }
        if let Some(client_type) = input.client_type {
            record.client_type = client_type;
        }
        if let Some(email) = &input.email {
            record.email = email.clone();
        }
        if let Some(phone) = &input.phone {
            record.phone = phone.clone();
        }
        if let Some(notes) = &input.notes {
            record.notes = notes.clone();
        }
        record.updated_at = Utc::now();

        Ok(Some(record.clone()))
    }

    async fn delete_client(&self, org: OrgId, client_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let owned = state
            .clients
            .get(&client_id)
            .is_some_and(|record| record.org_id == org);
        if owned {
            state.clients.remove(&client_id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl MatterStore for MemoryBackend {
    async fn upsert_matter(
        &self,
        org: OrgId,
        input: &UpsertMatterParams,
    ) -> Result<MatterRecord, StoreError> {
        let now = Utc::now();
        let key = (org.as_i64(), input.matter_id.clone());
        let mut state = self.write()?;

        let record = match state.matters.get(&key) {
            Some(existing) => MatterRecord {
                org_id: org,
                matter_id: input.matter_id.clone(),
                client_id: input.client_id,
                status: input.status,
                practice_area: input.practice_area.clone(),
                jurisdiction: input.jurisdiction.clone(),
                opened_at: input.opened_at,
                created_at: existing.created_at,
                updated_at: now,
            },
            None => MatterRecord {
                org_id: org,
                matter_id: input.matter_id.clone(),
                client_id: input.client_id,
                status: input.status,
                practice_area: input.practice_area.clone(),
                jurisdiction: input.jurisdiction.clone(),
                opened_at: input.opened_at,
                created_at: now,
                updated_at: now,
            },
        };

        state.matters.insert(key, record.clone());
        Ok(record)
    }

    async fn get_matter(
        &self,
        org: OrgId,
        matter_id: &str,
    ) -> Result<Option<MatterRecord>, StoreError> {
        Ok(self
            .read()?
            .matters
            .get(&(org.as_i64(), matter_id.to_string()))
            .cloned())
    }

    async fn list_matters(&self, org: OrgId) -> Result<Vec<MatterRecord>, StoreError> {
        let mut records: Vec<MatterRecord> = self
            .read()?
            .matters
            .values()
            .filter(|record| record.org_id == org)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.matter_id.cmp(&b.matter_id));
        Ok(records)
    }

    async fn delete_matter(&self, org: OrgId, matter_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .write()?
            .matters
            .remove(&(org.as_i64(), matter_id.to_string()))
            .is_some())
    }
}

#[async_trait]
impl SystemStore for MemoryBackend {
    async fn count_clients_per_org(
        &self,
        scope: SystemScope,
    ) -> Result<Vec<(OrgId, u64)>, StoreError> {
        tracing::debug!(job = scope.job(), "cross-tenant client count");
        let state = self.read()?;
        let mut counts: HashMap<OrgId, u64> = HashMap::new();
        for record in state.clients.values() {
            *counts.entry(record.org_id).or_default() += 1;
        }
        let mut out: Vec<(OrgId, u64)> = counts.into_iter().collect();
        out.sort_by_key(|(org, _)| *org);
        Ok(out)
    }

    async fn purge_org(&self, scope: SystemScope, org: OrgId) -> Result<u64, StoreError> {
        tracing::info!(job = scope.job(), %org, "purging organization data");
        let mut state = self.write()?;
        let before = state.clients.len() + state.matters.len();
        state.clients.retain(|_, record| record.org_id != org);
        state.matters.retain(|_, record| record.org_id != org);
        let after = state.clients.len() + state.matters.len();
        Ok((before - after) as u64)
    }
}

#[async_trait]
impl Database for MemoryBackend {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryBackend;
    use crate::store::{ClientStore, ClientType, CreateClientParams, UpdateClientParams};
    use crate::tenant::scope::OrgId;

    fn client_params(name: &str) -> CreateClientParams {
        CreateClientParams {
            name: name.to_string(),
            client_type: ClientType::Entity,
            email: None,
            phone: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn update_respects_ownership() {
        let store = MemoryBackend::new();
        let created = store
            .create_client(OrgId(1), &client_params("Acme, Inc."))
            .await
            .expect("create");

        let update = UpdateClientParams {
            notes: Some(Some("priority".to_string())),
            ..Default::default()
        };
        let foreign = store
            .update_client(OrgId(2), created.id, &update)
            .await
            .expect("update under wrong org");
        assert!(foreign.is_none());

        let owned = store
            .update_client(OrgId(1), created.id, &update)
            .await
            .expect("update under owner")
            .expect("record present");
        assert_eq!(owned.notes.as_deref(), Some("priority"));
    }

    #[tokio::test]
    async fn delete_under_wrong_org_reports_not_found() {
        let store = MemoryBackend::new();
        let created = store
            .create_client(OrgId(1), &client_params("Blackstone LLP"))
            .await
            .expect("create");

        assert!(!store
            .delete_client(OrgId(2), created.id)
            .await
            .expect("delete under wrong org"));
        assert!(store
            .get_client(OrgId(1), created.id)
            .await
            .expect("get")
            .is_some());
        assert!(store
            .delete_client(OrgId(1), created.id)
            .await
            .expect("delete under owner"));
    }

    #[tokio::test]
    async fn duplicate_normalized_name_is_rejected_per_org() {
        let store = MemoryBackend::new();
        store
            .create_client(OrgId(1), &client_params("Acme, Inc."))
            .await
            .expect("create");

        // Differs only in punctuation and case; collides after normalization.
        let dup = store.create_client(OrgId(1), &client_params("ACME Inc")).await;
        assert!(matches!(dup, Err(crate::error::StoreError::Query(_))));

        // Another org is free to use the same name.
        store
            .create_client(OrgId(2), &client_params("Acme, Inc."))
            .await
            .expect("create under other org");
    }

    #[tokio::test]
    async fn rename_onto_an_existing_client_is_rejected() {
        let store = MemoryBackend::new();
        store
            .create_client(OrgId(1), &client_params("Acme, Inc."))
            .await
            .expect("create");
        let other = store
            .create_client(OrgId(1), &client_params("Blackstone LLP"))
            .await
            .expect("create");

        let rename = UpdateClientParams {
            name: Some("acme inc".to_string()),
            ..Default::default()
        };
        let collided = store.update_client(OrgId(1), other.id, &rename).await;
        assert!(matches!(collided, Err(crate::error::StoreError::Query(_))));

        // Renaming a client onto its own normalized name is a no-op, not a
        // collision.
        let keep = UpdateClientParams {
            name: Some("BLACKSTONE llp".to_string()),
            ..Default::default()
        };
        let kept = store
            .update_client(OrgId(1), other.id, &keep)
            .await
            .expect("self rename")
            .expect("record present");
        assert_eq!(kept.name_normalized, "blackstone llp");
    }

    #[tokio::test]
    async fn list_filters_by_normalized_query() {
        let store = MemoryBackend::new();
        store
            .create_client(OrgId(1), &client_params("Acme, Inc."))
            .await
            .expect("create");
        store
            .create_client(OrgId(1), &client_params("Blackstone LLP"))
            .await
            .expect("create");

        let hits = store
            .list_clients(OrgId(1), Some("ACME"))
            .await
            .expect("list");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Acme, Inc.");
    }
}
