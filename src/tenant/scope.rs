use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque organization identifier.
///
/// One `OrgId` per law firm sharing the deployment. It is metadata attached
/// to an execution, not a domain entity: nothing in this crate persists it on
/// its own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrgId(pub i64);

impl OrgId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for OrgId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved scope for one unit of work.
///
/// Three states exist: `Org` (tenant-scoped), `Platform` (explicit
/// cross-tenant administrative scope), and *unset*, which is the absence of a
/// binding (`Option<TenantScope>::None`) rather than a variant. `Platform`
/// never satisfies an organization-scoped requirement; see
/// [`carrier::require_org`](crate::tenant::carrier::require_org).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "org", rename_all = "snake_case")]
pub enum TenantScope {
    Org(OrgId),
    Platform,
}

impl TenantScope {
    /// The organization this scope is bound to, if any.
    pub fn org(self) -> Option<OrgId> {
        match self {
            Self::Org(id) => Some(id),
            Self::Platform => None,
        }
    }

    pub fn is_platform(self) -> bool {
        matches!(self, Self::Platform)
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Org(id) => write!(f, "org:{id}"),
            Self::Platform => write!(f, "platform"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OrgId, TenantScope};

    #[test]
    fn org_scope_exposes_its_org() {
        let scope = TenantScope::Org(OrgId(7));
        assert_eq!(scope.org(), Some(OrgId(7)));
        assert!(!scope.is_platform());
    }

    #[test]
    fn platform_scope_carries_no_org() {
        assert_eq!(TenantScope::Platform.org(), None);
        assert!(TenantScope::Platform.is_platform());
    }

    #[test]
    fn scope_display_distinguishes_states() {
        assert_eq!(TenantScope::Org(OrgId(12)).to_string(), "org:12");
        assert_eq!(TenantScope::Platform.to_string(), "platform");
    }

    #[test]
    fn scope_serializes_with_explicit_tag() {
        let json = serde_json::to_value(TenantScope::Org(OrgId(3))).expect("serialize");
        assert_eq!(json, serde_json::json!({"scope": "org", "org": 3}));
        let json = serde_json::to_value(TenantScope::Platform).expect("serialize");
        assert_eq!(json, serde_json::json!({"scope": "platform"}));
    }
}
