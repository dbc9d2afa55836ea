//! Hash-chained JSONL audit trail for tenancy events.
//!
//! Records the events an isolation review cares about: platform-scope
//! grants, cross-tenant system-scope issuance, and observed violations.
//! Failures to write degrade to `tracing::warn` — the audit log must never
//! take the request path down.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::sync::{Mutex, OnceLock};

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::AuditConfig;

#[derive(Debug, Serialize)]
struct AuditEvent<'a> {
    ts: String,
    event_type: &'a str,
    details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

struct AuditLogger {
    path: PathBuf,
    hash_chain: bool,
    state: Mutex<Option<String>>,
}

impl AuditLogger {
    fn new(path: PathBuf, hash_chain: bool) -> Self {
        Self {
            path,
            hash_chain,
            state: Mutex::new(None),
        }
    }

    fn write(&self, event_type: &str, details: serde_json::Value) {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("tenancy audit state lock poisoned: {}", e);
                return;
            }
        };

        let mut event = AuditEvent {
            ts: Utc::now().to_rfc3339(),
            event_type,
            details,
            prev_hash: state.clone(),
            hash: None,
        };

        if self.hash_chain {
            let to_hash = match serde_json::to_string(&event) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("failed to serialize audit event for hashing: {}", e);
                    return;
                }
            };
            let mut hasher = Sha256::new();
            hasher.update(to_hash.as_bytes());
            let hash = format!("{:x}", hasher.finalize());
            event.hash = Some(hash.clone());
            *state = Some(hash);
        }

        let line = match serde_json::to_string(&event) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("failed to serialize tenancy audit event: {}", e);
                return;
            }
        };

        if let Some(parent) = self.path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!("failed to create tenancy audit dir {:?}: {}", parent, e);
            return;
        }

        // SECURITY: create files as owner-read/write (0o600). For pre-existing
        // files, fail closed if permissions are broader than 0o600.
        let mut open_opts = OpenOptions::new();
        open_opts.create(true).append(true);
        #[cfg(unix)]
        open_opts.mode(0o600);
        match open_opts.open(&self.path) {
            Ok(mut f) => {
                #[cfg(unix)]
                {
                    let mode = match f.metadata() {
                        Ok(meta) => meta.permissions().mode() & 0o777,
                        Err(e) => {
                            tracing::warn!(
                                "failed to read permissions for tenancy audit log {:?}: {}",
                                self.path,
                                e
                            );
                            return;
                        }
                    };
                    if mode != 0o600 {
                        tracing::warn!(
                            "refusing to write tenancy audit event; insecure mode {:o} on {:?} (expected 600)",
                            mode,
                            self.path
                        );
                        return;
                    }
                }
                if let Err(e) = writeln!(f, "{line}") {
                    tracing::warn!("failed to append tenancy audit event: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("failed to open tenancy audit log {:?}: {}", self.path, e);
            }
        }
    }
}

static LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Initialize the tenancy audit logger. A disabled config leaves auditing
/// off; [`record`] then becomes a no-op.
pub fn init(config: &AuditConfig) {
    if !config.enabled {
        return;
    }

    let _ = LOGGER.set(AuditLogger::new(config.path.clone(), config.hash_chain));
}

/// Append a tenancy audit event.
pub fn record(event_type: &str, details: serde_json::Value) {
    if let Some(logger) = LOGGER.get() {
        logger.write(event_type, details);
    }
}

/// Record an observed isolation violation. Violations are hard failures for
/// the caller; this only preserves the evidence.
pub fn record_violation(kind: &str, details: serde_json::Value) {
    tracing::warn!(kind, %details, "tenant isolation violation");
    record("isolation_violation", serde_json::json!({ "kind": kind, "details": details }));
}

/// Returns true if audit logging is active.
pub fn enabled() -> bool {
    LOGGER.get().is_some()
}
