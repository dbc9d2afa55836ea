use thiserror::Error;

/// Tenant-isolation failures.
///
/// Every variant is a hard failure: callers surface these as
/// authentication/authorization errors, never as a silent fallback to an
/// unscoped or stale tenant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenantError {
    /// A tenant scope was required but nothing is bound on this execution
    /// context.
    #[error("no tenant scope bound on this execution context")]
    MissingTenantContext,

    /// The authenticated principal carries no organization claim and is not
    /// eligible for platform scope.
    #[error("principal '{subject}' carries no organization claim")]
    UnresolvableTenant { subject: String },

    /// Platform scope was bound where an organization scope is required.
    /// Cross-tenant work must go through the explicit `SystemScope` surface
    /// instead of riding an ambient binding into a tenant-facing path.
    #[error("platform scope cannot satisfy an organization-scoped requirement")]
    PlatformScopeRejected,
}

/// Failures from the org-scoped store backends.
///
/// A lookup of another organization's record is *not* an error: it is
/// indistinguishable from the record not existing (`Ok(None)`).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend unavailable: {0}")]
    Pool(String),
}

#[cfg(feature = "libsql")]
impl From<libsql::Error> for StoreError {
    fn from(err: libsql::Error) -> Self {
        Self::Query(err.to_string())
    }
}

/// Configuration resolution failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
