//! Structural verification of the tenant-scoped access contract.
//!
//! The store surface promises that every trait method reading or writing
//! org-owned data takes the owning `OrgId` explicitly, and that the only
//! cross-tenant methods are the ones gated by `SystemScope`. This module
//! checks that promise against the actual trait source, embedded at compile
//! time, so a newly added unscoped accessor fails the test suite instead of
//! shipping as an all-tenants query.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

const STORE_SURFACE: &str = include_str!("store/mod.rs");

/// Methods that are neither org-scoped nor cross-tenant reads: backend
/// lifecycle only.
const LIFECYCLE_METHODS: &[&str] = &["run_migrations"];

static TRAIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pub trait (\w+)").expect("trait regex"));
static METHOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)async fn\s+(\w+)\s*\(([^)]*)\)").expect("method regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceViolation {
    pub trait_name: String,
    pub method: String,
    pub reason: String,
}

impl fmt::Display for SurfaceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}: {}", self.trait_name, self.method, self.reason)
    }
}

/// Verify the crate's own store surface.
pub fn verify_surface() -> Result<(), Vec<SurfaceViolation>> {
    verify_source(STORE_SURFACE)
}

/// Verify an arbitrary store-trait source text. Every `async fn` declared
/// inside a `pub trait` must carry an explicit `OrgId` parameter or a
/// `SystemScope` token, with `SystemScope` methods confined to traits whose
/// name marks them as a cross-tenant surface.
pub fn verify_source(source: &str) -> Result<(), Vec<SurfaceViolation>> {
    let mut violations = Vec::new();

    for (trait_name, body) in trait_bodies(source) {
        for captures in METHOD_RE.captures_iter(&body) {
            let method = captures[1].to_string();
            let param_list = &captures[2];

            if LIFECYCLE_METHODS.contains(&method.as_str()) {
                continue;
            }

            let org_scoped = param_list.contains("OrgId");
            let system_scoped = param_list.contains("SystemScope");

            if system_scoped {
                if !trait_name.starts_with("System") {
                    violations.push(SurfaceViolation {
                        trait_name: trait_name.clone(),
                        method,
                        reason: "SystemScope-gated method outside the cross-tenant surface"
                            .to_string(),
                    });
                }
                continue;
            }

            if trait_name.starts_with("System") {
                violations.push(SurfaceViolation {
                    trait_name: trait_name.clone(),
                    method,
                    reason: "cross-tenant method missing the SystemScope token".to_string(),
                });
                continue;
            }

            if !org_scoped {
                violations.push(SurfaceViolation {
                    trait_name: trait_name.clone(),
                    method,
                    reason: "accessor without an explicit OrgId parameter".to_string(),
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Extract `(trait name, body text)` pairs by brace matching from each
/// `pub trait` declaration. String literals inside trait bodies would break
/// the depth count; the store surface has none.
fn trait_bodies(source: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();

    for captures in TRAIT_RE.captures_iter(source) {
        let trait_name = captures[1].to_string();
        let decl_start = captures.get(0).map(|m| m.end()).unwrap_or(0);
        let Some(open_rel) = source[decl_start..].find('{') else {
            continue;
        };
        let body_start = decl_start + open_rel + 1;

        let mut depth = 1usize;
        let mut end = body_start;
        for (offset, ch) in source[body_start..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = body_start + offset;
                        break;
                    }
                }
                _ => {}
            }
        }

        out.push((trait_name, source[body_start..end].to_string()));
    }

    out
}
