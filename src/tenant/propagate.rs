//! Propagation of the bound scope across deferred execution.
//!
//! Worker pools reuse threads across unrelated units of work, so an ambient
//! binding never survives submission on its own. Both wrappers here follow
//! the same shape: capture whatever is bound at submission (including
//! *unset*), install the capture on the executing context, run, restore the
//! context's prior binding. The restore is a drop guard, so it runs on
//! panic and on cancellation paths as well.

use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;

use crate::tenant::carrier;
use crate::tenant::scope::TenantScope;

/// Wrap a unit of work bound for a thread pool, scheduler, or any other
/// deferred-execution primitive.
///
/// The returned closure observes the scope bound at the moment `decorate`
/// was called, on whichever thread eventually runs it. A captured *unset*
/// installs *unset*; the wrapped work never inherits the worker's binding.
/// Work discarded before it runs binds nothing.
pub fn decorate<F, R>(work: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let captured = carrier::get();
    move || {
        let _installed = carrier::install(captured);
        work()
    }
}

/// Run a future under an explicit scope, regardless of what is bound on the
/// submitting context.
pub fn scoped<F>(scope: TenantScope, fut: F) -> Propagated<F>
where
    F: Future,
{
    Propagated {
        inner: fut,
        captured: Some(scope),
    }
}

/// A future that re-installs its captured scope around every poll.
///
/// Between polls — and after the wrapper is dropped — nothing of the
/// captured scope remains on any thread, which is what keeps the binding
/// correct under a work-stealing scheduler and makes cancellation leak-free
/// by construction.
#[pin_project]
#[derive(Debug)]
pub struct Propagated<F> {
    #[pin]
    inner: F,
    captured: Option<TenantScope>,
}

impl<F> Propagated<F> {
    /// The scope captured at decoration time.
    pub fn captured(&self) -> Option<TenantScope> {
        self.captured
    }
}

impl<F: Future> Future for Propagated<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _installed = carrier::install(*this.captured);
        this.inner.poll(cx)
    }
}

/// Extension adapter mirroring the shape of `tracing`'s `instrument`:
/// `do_work().propagate_scope()` captures the binding on the submitting
/// context before the future is handed to an executor.
pub trait PropagateScope: Future + Sized {
    fn propagate_scope(self) -> Propagated<Self> {
        Propagated {
            inner: self,
            captured: carrier::get(),
        }
    }
}

impl<F: Future> PropagateScope for F {}
