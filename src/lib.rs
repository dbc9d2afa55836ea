//! Tenant-isolation core for a multi-tenant legal practice backend.
//!
//! Many law firms ("organizations") share one database and one pool of
//! application processes. This crate is the subsystem that keeps them
//! isolated:
//!
//! - [`tenant::carrier`] — the execution-context slot holding the scope of
//!   the unit of work currently running.
//! - [`tenant::resolver`] — maps an authenticated principal's claims to a
//!   [`TenantScope`] and binds it for the duration of a unit of work.
//! - [`tenant::propagate`] — carries the scope captured at submission time
//!   into deferred execution (worker pools, schedulers, async tasks), with
//!   guaranteed release.
//! - [`store`] — org-scoped data access: every accessor takes the owning
//!   [`OrgId`] explicitly; cross-tenant operations require a
//!   [`store::SystemScope`] token.
//! - [`contract`] — structural verification that the store surface honors
//!   the access contract, run as part of the test suite.
//!
//! The rest of the product — request handling, billing, documents, AI
//! workflows — consumes a resolved scope through these interfaces and never
//! touches tenancy state directly.

pub mod audit;
pub mod config;
pub mod contract;
pub mod error;
pub mod store;
pub mod telemetry;
pub mod tenant;

pub use config::TenancyConfig;
pub use error::{ConfigError, StoreError, TenantError};
pub use tenant::{BoundScope, OrgId, Principal, PropagateScope, Propagated, TenantResolver, TenantScope};
