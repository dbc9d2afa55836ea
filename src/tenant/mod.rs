//! Tenant identity: scope types, the execution-context carrier, principal
//! resolution, and propagation across deferred execution.

pub mod carrier;
pub mod propagate;
pub mod resolver;
pub mod scope;

pub use carrier::BoundScope;
pub use propagate::{Propagated, PropagateScope};
pub use resolver::{Principal, TenantResolver};
pub use scope::{OrgId, TenantScope};
