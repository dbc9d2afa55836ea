//! Cross-tenant isolation at the store surface.
//!
//! The policy under test: a lookup of an ID that exists but belongs to a
//! different organization is indistinguishable from the ID not existing.

use pretty_assertions::assert_eq;

use lextenant::OrgId;
use lextenant::store::memory::MemoryBackend;
use lextenant::store::{
    ClientStore, ClientType, CreateClientParams, Database, MatterStatus, MatterStore, SystemScope,
    SystemStore, UpsertMatterParams,
};

fn acme() -> CreateClientParams {
    CreateClientParams {
        name: "Acme, Inc.".to_string(),
        client_type: ClientType::Entity,
        email: Some("legal@acme.example".to_string()),
        phone: None,
        notes: None,
    }
}

#[tokio::test]
async fn client_lookup_under_another_org_is_not_found() {
    let store = MemoryBackend::new();
    let created = store.create_client(OrgId(1), &acme()).await.expect("create");

    let foreign = store
        .get_client(OrgId(2), created.id)
        .await
        .expect("lookup under org 2");
    assert_eq!(foreign.map(|r| r.id), None);

    let owned = store
        .get_client(OrgId(1), created.id)
        .await
        .expect("lookup under org 1")
        .expect("record present");
    assert_eq!(owned.id, created.id);
    assert_eq!(owned.org_id, OrgId(1));
}

#[tokio::test]
async fn listings_are_scoped_to_the_requesting_org() -> anyhow::Result<()> {
    let store = MemoryBackend::new();
    store.create_client(OrgId(1), &acme()).await?;
    store
        .create_client(
            OrgId(2),
            &CreateClientParams {
                name: "Blackstone LLP".to_string(),
                client_type: ClientType::Entity,
                email: None,
                phone: None,
                notes: None,
            },
        )
        .await?;

    let org1 = store.list_clients(OrgId(1), None).await?;
    assert_eq!(org1.len(), 1);
    assert_eq!(org1[0].name, "Acme, Inc.");

    let org3 = store.list_clients(OrgId(3), None).await?;
    assert!(org3.is_empty());
    Ok(())
}

#[tokio::test]
async fn matters_follow_the_same_resolution_policy() {
    let store = MemoryBackend::new();
    let client = store.create_client(OrgId(1), &acme()).await.expect("create");
    store
        .upsert_matter(
            OrgId(1),
            &UpsertMatterParams {
                matter_id: "acme-v-initech-2026".to_string(),
                client_id: client.id,
                status: MatterStatus::Active,
                practice_area: Some("litigation".to_string()),
                jurisdiction: Some("us-ca".to_string()),
                opened_at: None,
            },
        )
        .await
        .expect("upsert");

    let foreign = store
        .get_matter(OrgId(2), "acme-v-initech-2026")
        .await
        .expect("lookup under org 2");
    assert!(foreign.is_none());

    let owned = store
        .get_matter(OrgId(1), "acme-v-initech-2026")
        .await
        .expect("lookup under org 1")
        .expect("matter present");
    assert_eq!(owned.status, MatterStatus::Active);

    assert!(!store
        .delete_matter(OrgId(2), "acme-v-initech-2026")
        .await
        .expect("foreign delete"));
    assert!(store
        .delete_matter(OrgId(1), "acme-v-initech-2026")
        .await
        .expect("owner delete"));
}

#[tokio::test]
async fn platform_jobs_go_through_the_system_surface() {
    let store = MemoryBackend::new();
    let client = store.create_client(OrgId(1), &acme()).await.expect("create");
    store
        .create_client(
            OrgId(2),
            &CreateClientParams {
                name: "Initech".to_string(),
                client_type: ClientType::Entity,
                email: None,
                phone: None,
                notes: None,
            },
        )
        .await
        .expect("create");
    store
        .upsert_matter(
            OrgId(1),
            &UpsertMatterParams {
                matter_id: "m-1".to_string(),
                client_id: client.id,
                status: MatterStatus::Intake,
                practice_area: None,
                jurisdiction: None,
                opened_at: None,
            },
        )
        .await
        .expect("upsert");

    let scope = SystemScope::for_platform_job("usage-report");
    let counts = store.count_clients_per_org(scope).await.expect("counts");
    assert_eq!(counts, vec![(OrgId(1), 1), (OrgId(2), 1)]);

    let removed = store
        .purge_org(SystemScope::for_platform_job("org-offboarding"), OrgId(1))
        .await
        .expect("purge");
    assert_eq!(removed, 2);

    // Org 2 is untouched; org 1 is gone.
    assert!(store.list_clients(OrgId(1), None).await.expect("list").is_empty());
    assert_eq!(store.list_clients(OrgId(2), None).await.expect("list").len(), 1);
    store.run_migrations().await.expect("noop migrations");
}

#[test]
fn system_scope_issuance_is_audited() {
    lextenant::telemetry::init();

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logs").join("tenancy_audit.jsonl");
    lextenant::audit::init(&lextenant::config::AuditConfig {
        enabled: true,
        path: path.clone(),
        hash_chain: true,
    });
    assert!(lextenant::audit::enabled());

    let scope = SystemScope::for_platform_job("retention-sweep");
    assert_eq!(scope.job(), "retention-sweep");

    let raw = std::fs::read_to_string(&path).expect("audit log written");
    let line = raw
        .lines()
        .find(|line| line.contains("retention-sweep"))
        .expect("issuance event present");
    let event: serde_json::Value = serde_json::from_str(line).expect("jsonl event");
    assert_eq!(
        event.get("event_type").and_then(|v| v.as_str()),
        Some("system_scope_issued")
    );
    assert!(event.get("hash").and_then(|v| v.as_str()).is_some());

    // The global logger now points at this directory; keep it alive so
    // other tests issuing system scopes have somewhere to write.
    std::mem::forget(dir);
}

#[cfg(feature = "libsql")]
mod libsql_backend {
    use super::*;
    use pretty_assertions::assert_eq;
    use lextenant::store::UpdateClientParams;
    use lextenant::store::libsql::LibSqlBackend;

    async fn backend() -> (tempfile::TempDir, LibSqlBackend) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LibSqlBackend::new_local(dir.path().join("lextenant.db"))
            .await
            .expect("open db");
        store.run_migrations().await.expect("migrations");
        (dir, store)
    }

    #[tokio::test]
    async fn client_lookup_under_another_org_is_not_found() {
        let (_dir, store) = backend().await;
        let created = store.create_client(OrgId(1), &acme()).await.expect("create");

        let foreign = store
            .get_client(OrgId(2), created.id)
            .await
            .expect("lookup under org 2");
        assert!(foreign.is_none());

        let owned = store
            .get_client(OrgId(1), created.id)
            .await
            .expect("lookup under org 1")
            .expect("record present");
        assert_eq!(owned.id, created.id);
        assert_eq!(owned.email.as_deref(), Some("legal@acme.example"));
    }

    #[tokio::test]
    async fn updates_and_deletes_respect_ownership() {
        let (_dir, store) = backend().await;
        let created = store.create_client(OrgId(1), &acme()).await.expect("create");

        let update = UpdateClientParams {
            notes: Some(Some("conflict check cleared".to_string())),
            ..Default::default()
        };
        assert!(store
            .update_client(OrgId(2), created.id, &update)
            .await
            .expect("foreign update")
            .is_none());
        let updated = store
            .update_client(OrgId(1), created.id, &update)
            .await
            .expect("owner update")
            .expect("record present");
        assert_eq!(updated.notes.as_deref(), Some("conflict check cleared"));

        assert!(!store
            .delete_client(OrgId(2), created.id)
            .await
            .expect("foreign delete"));
        assert!(store
            .delete_client(OrgId(1), created.id)
            .await
            .expect("owner delete"));
    }

    #[tokio::test]
    async fn duplicate_normalized_name_is_rejected_per_org() {
        let (_dir, store) = backend().await;
        store.create_client(OrgId(1), &acme()).await.expect("create");

        // Collides with "Acme, Inc." after normalization.
        let dup = store
            .create_client(
                OrgId(1),
                &CreateClientParams {
                    name: "ACME Inc".to_string(),
                    ..acme()
                },
            )
            .await;
        assert!(matches!(dup, Err(lextenant::StoreError::Query(_))));

        // The schema scopes the uniqueness rule to the org.
        store
            .create_client(OrgId(2), &acme())
            .await
            .expect("same name under another org");
    }

    #[tokio::test]
    async fn update_merges_without_dropping_unrelated_fields() {
        let (_dir, store) = backend().await;
        let created = store.create_client(OrgId(1), &acme()).await.expect("create");

        let set_phone = UpdateClientParams {
            phone: Some(Some("+1 555 0100".to_string())),
            ..Default::default()
        };
        store
            .update_client(OrgId(1), created.id, &set_phone)
            .await
            .expect("update phone")
            .expect("record present");

        let set_notes = UpdateClientParams {
            notes: Some(Some("retainer signed".to_string())),
            ..Default::default()
        };
        let merged = store
            .update_client(OrgId(1), created.id, &set_notes)
            .await
            .expect("update notes")
            .expect("record present");

        // Each update carries only its own field; the merge keeps the rest.
        assert_eq!(merged.phone.as_deref(), Some("+1 555 0100"));
        assert_eq!(merged.notes.as_deref(), Some("retainer signed"));
        assert_eq!(merged.email.as_deref(), Some("legal@acme.example"));

        // The outer Some(None) clears a field rather than keeping it.
        let clear_email = UpdateClientParams {
            email: Some(None),
            ..Default::default()
        };
        let cleared = store
            .update_client(OrgId(1), created.id, &clear_email)
            .await
            .expect("clear email")
            .expect("record present");
        assert_eq!(cleared.email, None);
        assert_eq!(cleared.phone.as_deref(), Some("+1 555 0100"));
    }

    #[tokio::test]
    async fn matter_upsert_round_trips_and_stays_scoped() {
        let (_dir, store) = backend().await;
        let client = store.create_client(OrgId(4), &acme()).await.expect("create");

        let params = UpsertMatterParams {
            matter_id: "acme-ip-2026".to_string(),
            client_id: client.id,
            status: MatterStatus::Intake,
            practice_area: Some("ip".to_string()),
            jurisdiction: None,
            opened_at: Some(chrono::Utc::now()),
        };
        store.upsert_matter(OrgId(4), &params).await.expect("insert");

        // Second upsert flips the status in place.
        let reopened = UpsertMatterParams {
            status: MatterStatus::Active,
            ..params
        };
        let matter = store.upsert_matter(OrgId(4), &reopened).await.expect("update");
        assert_eq!(matter.status, MatterStatus::Active);
        assert!(matter.opened_at.is_some());

        assert!(store
            .get_matter(OrgId(5), "acme-ip-2026")
            .await
            .expect("foreign lookup")
            .is_none());
        assert_eq!(store.list_matters(OrgId(4)).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn purge_org_removes_only_that_org() {
        let (_dir, store) = backend().await;
        let mine = store.create_client(OrgId(1), &acme()).await.expect("create");
        store
            .create_client(
                OrgId(2),
                &CreateClientParams {
                    name: "Initech".to_string(),
                    client_type: ClientType::Entity,
                    email: None,
                    phone: None,
                    notes: None,
                },
            )
            .await
            .expect("create");
        store
            .upsert_matter(
                OrgId(1),
                &UpsertMatterParams {
                    matter_id: "m-1".to_string(),
                    client_id: mine.id,
                    status: MatterStatus::Active,
                    practice_area: None,
                    jurisdiction: None,
                    opened_at: None,
                },
            )
            .await
            .expect("upsert");

        let removed = store
            .purge_org(SystemScope::for_platform_job("org-offboarding"), OrgId(1))
            .await
            .expect("purge");
        assert_eq!(removed, 2);
        assert_eq!(
            store
                .count_clients_per_org(SystemScope::for_platform_job("usage-report"))
                .await
                .expect("counts"),
            vec![(OrgId(2), 1)]
        );
    }
}
