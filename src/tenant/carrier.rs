//! Execution-context slot for the current tenant scope.
//!
//! The slot is thread-local, but it is only ever populated through RAII
//! guards installed around a closure run or around a single future poll (see
//! [`crate::tenant::propagate`]). A unit of work that migrates between
//! runtime threads carries its scope in the propagation wrapper, not in any
//! thread's slot, so the binding visible at any instant always belongs to the
//! unit currently running on that thread.
//!
//! Purely in-memory. No I/O happens on any of these paths.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::error::TenantError;
use crate::tenant::scope::{OrgId, TenantScope};

thread_local! {
    static CURRENT: Cell<Option<TenantScope>> = const { Cell::new(None) };
}

/// Bind a scope on the current execution context, overwriting any prior
/// binding. Callers that need save/restore pairing should use [`bind`]
/// instead; nesting is never implicit.
pub fn set(scope: TenantScope) {
    CURRENT.with(|slot| slot.set(Some(scope)));
}

/// Non-failing read of the current binding.
pub fn get() -> Option<TenantScope> {
    CURRENT.with(Cell::get)
}

/// The primary guard for tenant-scoped operations: fails closed when nothing
/// is bound.
pub fn require() -> Result<TenantScope, TenantError> {
    get().ok_or(TenantError::MissingTenantContext)
}

/// Like [`require`], but additionally rejects a bound [`TenantScope::Platform`].
///
/// Tenant-facing paths must never run under an ambient platform scope; a
/// platform job reaches cross-tenant data only through the explicit
/// [`SystemScope`](crate::store::SystemScope) surface.
pub fn require_org() -> Result<OrgId, TenantError> {
    match require()? {
        TenantScope::Org(id) => Ok(id),
        TenantScope::Platform => Err(TenantError::PlatformScopeRejected),
    }
}

/// Unconditionally unbind. Clearing an already-unset slot is a no-op.
pub fn clear() {
    CURRENT.with(|slot| slot.set(None));
}

pub fn is_bound() -> bool {
    get().is_some()
}

/// Install a scope and restore the prior binding on drop.
///
/// The guard is the unbind half of `resolve_and_bind`: holding it for the
/// duration of a unit of work makes the release unconditional, including on
/// panic.
pub fn bind(scope: TenantScope) -> BoundScope {
    install(Some(scope))
}

/// Install a captured binding, including a captured *unset*. Used by the
/// propagation wrappers, which must reproduce absence rather than inherit
/// whatever is bound on the executing thread.
pub(crate) fn install(captured: Option<TenantScope>) -> BoundScope {
    let prior = CURRENT.with(|slot| slot.replace(captured));
    BoundScope {
        prior,
        _not_send: PhantomData,
    }
}

/// RAII restore of the execution context's prior binding.
///
/// `!Send`: the guard must drop on the thread whose slot it rewrote.
#[must_use = "dropping the guard immediately unbinds the scope it installed"]
pub struct BoundScope {
    prior: Option<TenantScope>,
    _not_send: PhantomData<*const ()>,
}

impl BoundScope {
    /// The binding that was active before this guard installed its own.
    pub fn prior(&self) -> Option<TenantScope> {
        self.prior
    }
}

impl Drop for BoundScope {
    fn drop(&mut self) {
        CURRENT.with(|slot| slot.set(self.prior));
    }
}
