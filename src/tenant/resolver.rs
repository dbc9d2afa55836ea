use tracing::debug;

use crate::audit;
use crate::config::TenancyConfig;
use crate::error::TenantError;
use crate::tenant::carrier::{self, BoundScope};
use crate::tenant::propagate::{self, Propagated};
use crate::tenant::scope::{OrgId, TenantScope};

/// Authenticated claims handed over by the auth layer at the start of a unit
/// of work. The resolver never inspects credentials; it only maps claims to a
/// [`TenantScope`].
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub org_id: Option<i64>,
    pub platform_admin: bool,
}

impl Principal {
    /// A firm member carrying an organization claim.
    pub fn member(subject: impl Into<String>, org_id: i64) -> Self {
        Self {
            subject: subject.into(),
            org_id: Some(org_id),
            platform_admin: false,
        }
    }

    /// A platform operator with no organization claim.
    pub fn platform_operator(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            org_id: None,
            platform_admin: true,
        }
    }
}

/// Maps an authenticated principal to a tenant scope and binds it for the
/// duration of a unit of work.
///
/// Called once per unit, as early as possible. The returned [`BoundScope`]
/// guard pairs the bind with an unconditional unbind at unit exit.
#[derive(Debug, Clone)]
pub struct TenantResolver {
    allow_platform_scope: bool,
}

impl TenantResolver {
    pub fn new(allow_platform_scope: bool) -> Self {
        Self {
            allow_platform_scope,
        }
    }

    pub fn from_config(config: &TenancyConfig) -> Self {
        Self::new(config.allow_platform_scope)
    }

    /// Resolve the scope carried by a principal's claims.
    ///
    /// An organization claim always wins. A platform admin without an
    /// organization claim resolves to [`TenantScope::Platform`] only when the
    /// deployment explicitly allows it; anything else is
    /// [`TenantError::UnresolvableTenant`], never a silent global scope.
    pub fn resolve(&self, principal: &Principal) -> Result<TenantScope, TenantError> {
        if let Some(org) = principal.org_id {
            return Ok(TenantScope::Org(OrgId(org)));
        }
        if principal.platform_admin && self.allow_platform_scope {
            audit::record(
                "platform_scope_granted",
                serde_json::json!({ "subject": principal.subject }),
            );
            return Ok(TenantScope::Platform);
        }
        audit::record_violation(
            "unresolvable_tenant",
            serde_json::json!({
                "subject": principal.subject,
                "platform_admin": principal.platform_admin,
            }),
        );
        Err(TenantError::UnresolvableTenant {
            subject: principal.subject.clone(),
        })
    }

    /// Resolve and bind on the current execution context.
    ///
    /// For synchronous units of work. Async units should wrap their future
    /// with [`scope_future`](Self::scope_future) instead, since a
    /// thread-local binding does not follow a future across `.await`.
    pub fn resolve_and_bind(&self, principal: &Principal) -> Result<BoundScope, TenantError> {
        let scope = self.resolve(principal)?;
        debug!(subject = %principal.subject, %scope, "tenant scope bound");
        Ok(carrier::bind(scope))
    }

    /// Resolve and run an async unit of work under the resolved scope.
    pub fn scope_future<F>(
        &self,
        principal: &Principal,
        fut: F,
    ) -> Result<Propagated<F>, TenantError>
    where
        F: Future,
    {
        let scope = self.resolve(principal)?;
        debug!(subject = %principal.subject, %scope, "tenant scope bound for async unit");
        Ok(propagate::scoped(scope, fut))
    }

    /// Read-through to the carrier for collaborators that tolerate absence.
    pub fn current_or_none(&self) -> Option<TenantScope> {
        carrier::get()
    }
}

#[cfg(test)]
mod tests {
    use super::{Principal, TenantResolver};
    use crate::error::TenantError;
    use crate::tenant::carrier;
    use crate::tenant::scope::{OrgId, TenantScope};

    #[test]
    fn org_claim_resolves_to_org_scope() {
        let resolver = TenantResolver::new(false);
        let scope = resolver
            .resolve(&Principal::member("alice@firm.example", 31))
            .expect("resolve");
        assert_eq!(scope, TenantScope::Org(OrgId(31)));
    }

    #[test]
    fn org_claim_wins_over_platform_flag() {
        let resolver = TenantResolver::new(true);
        let mut principal = Principal::member("ops@platform.example", 4);
        principal.platform_admin = true;
        assert_eq!(
            resolver.resolve(&principal),
            Ok(TenantScope::Org(OrgId(4)))
        );
    }

    #[test]
    fn missing_org_claim_is_unresolvable() {
        let resolver = TenantResolver::new(false);
        let err = resolver
            .resolve(&Principal {
                subject: "svc@firm.example".to_string(),
                org_id: None,
                platform_admin: false,
            })
            .expect_err("must fail closed");
        assert_eq!(
            err,
            TenantError::UnresolvableTenant {
                subject: "svc@firm.example".to_string()
            }
        );
    }

    #[test]
    fn platform_admin_needs_explicit_allowance() {
        let principal = Principal::platform_operator("ops@platform.example");

        // The default deployment policy disallows platform scope.
        let denied = TenantResolver::from_config(&crate::config::TenancyConfig::default());
        assert!(matches!(
            denied.resolve(&principal),
            Err(TenantError::UnresolvableTenant { .. })
        ));

        let allowed = TenantResolver::new(true);
        assert_eq!(allowed.resolve(&principal), Ok(TenantScope::Platform));
    }

    #[test]
    fn resolve_and_bind_unbinds_when_the_guard_drops() {
        std::thread::spawn(|| {
            let resolver = TenantResolver::new(false);
            {
                let guard = resolver
                    .resolve_and_bind(&Principal::member("alice@firm.example", 8))
                    .expect("bind");
                assert_eq!(guard.prior(), None);
                assert_eq!(
                    resolver.current_or_none(),
                    Some(TenantScope::Org(OrgId(8)))
                );
            }
            assert_eq!(carrier::get(), None);
        })
        .join()
        .expect("resolver thread");
    }
}
