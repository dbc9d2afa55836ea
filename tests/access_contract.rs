//! The structural access-contract check, run against the real store surface.

use lextenant::contract;

#[test]
fn every_store_accessor_is_org_scoped_or_system_gated() {
    if let Err(violations) = contract::verify_surface() {
        let rendered: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!(
            "tenant-scoped access contract violated:\n{}",
            rendered.join("\n")
        );
    }
}

#[test]
fn the_harness_catches_a_regressed_surface() {
    // The dual scoped/unscoped accessor pattern this codebase refuses to
    // carry: `find_by_id` without an owning org would scope to all tenants.
    let regressed = r"
        pub trait ClientStore: Send + Sync {
            async fn get_client(&self, org: OrgId, id: Uuid) -> Result<Option<ClientRecord>, StoreError>;
            async fn find_by_id(&self, id: Uuid) -> Result<Option<ClientRecord>, StoreError>;
        }
    ";
    let violations = contract::verify_source(regressed).expect_err("must flag find_by_id");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].trait_name, "ClientStore");
    assert_eq!(violations[0].method, "find_by_id");
}
