//! Env-first tenancy configuration.
//!
//! Resolution reads `.env` via `dotenvy`, then process environment, then
//! falls back to secure defaults: platform scope disallowed, auditing on
//! with a hash chain.

use std::path::{Component, PathBuf};

use crate::error::ConfigError;

const DEFAULT_AUDIT_PATH: &str = "logs/tenancy_audit.jsonl";

/// Tenancy audit controls.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub hash_chain: bool,
}

/// Deployment-level tenancy policy.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Whether a platform admin without an organization claim may resolve to
    /// explicit platform scope. Off by default: most deployments have no
    /// cross-tenant operators.
    pub allow_platform_scope: bool,
    pub audit: AuditConfig,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            allow_platform_scope: false,
            audit: AuditConfig {
                enabled: true,
                path: PathBuf::from(DEFAULT_AUDIT_PATH),
                hash_chain: true,
            },
        }
    }
}

impl TenancyConfig {
    /// Resolve from the environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            allow_platform_scope: parse_bool_env(
                "TENANCY_ALLOW_PLATFORM_SCOPE",
                defaults.allow_platform_scope,
            )?,
            audit: AuditConfig {
                enabled: parse_bool_env("TENANCY_AUDIT_ENABLED", defaults.audit.enabled)?,
                path: match optional_env("TENANCY_AUDIT_PATH")? {
                    Some(raw) => validate_audit_path(&raw)?,
                    None => defaults.audit.path,
                },
                hash_chain: parse_bool_env("TENANCY_AUDIT_HASH_CHAIN", defaults.audit.hash_chain)?,
            },
        })
    }
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(key)? {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{other}'"),
            }),
        },
    }
}

fn validate_audit_path(raw: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "TENANCY_AUDIT_PATH".to_string(),
            message: "audit log path must not be empty".to_string(),
        });
    }

    let raw_path = PathBuf::from(trimmed);
    if raw_path.is_absolute() {
        return Err(ConfigError::InvalidValue {
            key: "TENANCY_AUDIT_PATH".to_string(),
            message: "audit log path must be relative to the workspace".to_string(),
        });
    }

    let mut normalized = PathBuf::new();
    for component in raw_path.components() {
        match component {
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ConfigError::InvalidValue {
                    key: "TENANCY_AUDIT_PATH".to_string(),
                    message: "audit log path must not contain '..' components".to_string(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::InvalidValue {
                    key: "TENANCY_AUDIT_PATH".to_string(),
                    message: "audit log path must be relative to the workspace".to_string(),
                });
            }
        }
    }

    if normalized.components().count() < 2 || !normalized.starts_with("logs") {
        return Err(ConfigError::InvalidValue {
            key: "TENANCY_AUDIT_PATH".to_string(),
            message: "audit log path must be under 'logs/' and include a filename".to_string(),
        });
    }

    Ok(normalized)
}
