//! Typed configuration for the daemon, with file + environment layering.
//!
//! Mirrors the "recognized options enumerated" design note (spec §9): every
//! tunable the daemon reads lives on [`AimConfig`] with a sensible default,
//! loadable from a TOML file and overridable by `AIM_*` environment
//! variables.

use crate::errors::{AimError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rate-limit rps/burst pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub rps: f64,
    pub burst: u32,
}

/// Group abuse-prevention caps (spec §6 "group abuse limits").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupAbuseConfig {
    pub max_members: usize,
    pub max_pending_invites: usize,
    pub invite: RateLimitConfig,
    pub send: RateLimitConfig,
    pub membership: RateLimitConfig,
}

/// Stream-subscription caps (spec §4.2 Stream limiter).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamLimitsConfig {
    pub max_global: usize,
    pub max_per_client: usize,
}

/// Full daemon configuration (spec §6 "Environment toggles").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AimConfig {
    pub data_dir: PathBuf,
    pub listen_addr: String,

    pub rpc_token_required: bool,
    pub rpc_token: Option<String>,
    pub rpc_token_auto_rotate: bool,
    pub token_persist_path: Option<PathBuf>,

    pub cors_allow_null_origin: bool,

    pub groups_enabled: bool,

    pub rpc_rate_limit: RateLimitConfig,
    pub file_download_rate_limit: RateLimitConfig,

    pub stream_limits: StreamLimitsConfig,

    pub legacy_storage_passphrase: Option<String>,

    pub group_abuse: GroupAbuseConfig,

    pub ephemeral_default_ttl_secs: u64,

    /// Disables fail-closed auth and rate-limiting; never set in production.
    pub non_prod: bool,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./aim-data"),
            listen_addr: "127.0.0.1:8787".to_owned(),

            rpc_token_required: true,
            rpc_token: None,
            rpc_token_auto_rotate: false,
            token_persist_path: None,

            cors_allow_null_origin: false,

            groups_enabled: true,

            rpc_rate_limit: RateLimitConfig { rps: 30.0, burst: 60 },
            file_download_rate_limit: RateLimitConfig { rps: 12.0, burst: 24 },

            stream_limits: StreamLimitsConfig { max_global: 128, max_per_client: 8 },

            legacy_storage_passphrase: None,

            group_abuse: GroupAbuseConfig {
                max_members: 1_000,
                max_pending_invites: 200,
                invite: RateLimitConfig { rps: 5.0, burst: 10 },
                send: RateLimitConfig { rps: 20.0, burst: 40 },
                membership: RateLimitConfig { rps: 5.0, burst: 10 },
            },

            ephemeral_default_ttl_secs: 86_400,

            non_prod: false,
        }
    }
}

impl AimConfig {
    /// Load from a TOML file, falling back to defaults for absent fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AimError::not_found(format!("config file {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AimError::invalid(format!("invalid config at {}: {e}", path.display())))?;
        Ok(config)
    }

    /// Overlay recognized `AIM_*` environment variables onto this config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("AIM_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("AIM_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Ok(v) = std::env::var("AIM_RPC_TOKEN") {
            self.rpc_token = Some(v);
        }
        if let Ok(v) = std::env::var("AIM_RPC_TOKEN_REQUIRED") {
            self.rpc_token_required = parse_bool(&v, self.rpc_token_required);
        }
        if let Ok(v) = std::env::var("AIM_GROUPS_ENABLED") {
            self.groups_enabled = parse_bool(&v, self.groups_enabled);
        }
        if let Ok(v) = std::env::var("AIM_NON_PROD") {
            self.non_prod = parse_bool(&v, self.non_prod);
        }
        if let Ok(v) = std::env::var("AIM_LEGACY_STORAGE_PASSPHRASE") {
            self.legacy_storage_passphrase = Some(v);
        }
    }
}

fn parse_bool(value: &str, current: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let cfg = AimConfig::default();
        assert_eq!(cfg.rpc_rate_limit.rps, 30.0);
        assert_eq!(cfg.rpc_rate_limit.burst, 60);
        assert_eq!(cfg.file_download_rate_limit.rps, 12.0);
        assert_eq!(cfg.stream_limits.max_global, 128);
        assert_eq!(cfg.stream_limits.max_per_client, 8);
        assert_eq!(cfg.ephemeral_default_ttl_secs, 86_400);
    }

    #[test]
    fn loads_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aim.toml");
        std::fs::write(
            &path,
            r#"
            data_dir = "/var/aim"
            listen_addr = "0.0.0.0:9000"
            rpc_token_required = false
            rpc_token = "secret"
            rpc_token_auto_rotate = false
            cors_allow_null_origin = false
            groups_enabled = true
            legacy_storage_passphrase = ""
            ephemeral_default_ttl_secs = 3600
            non_prod = true

            [rpc_rate_limit]
            rps = 10.0
            burst = 20

            [file_download_rate_limit]
            rps = 5.0
            burst = 10

            [stream_limits]
            max_global = 64
            max_per_client = 4

            [group_abuse]
            max_members = 500
            max_pending_invites = 50

            [group_abuse.invite]
            rps = 1.0
            burst = 2

            [group_abuse.send]
            rps = 1.0
            burst = 2

            [group_abuse.membership]
            rps = 1.0
            burst = 2
            "#,
        )
        .unwrap();

        let cfg = AimConfig::from_file(&path).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        assert!(cfg.non_prod);
        assert_eq!(cfg.rpc_rate_limit.burst, 20);
    }

    #[test]
    fn env_overrides_win_over_file_defaults() {
        std::env::set_var("AIM_NON_PROD", "true");
        let mut cfg = AimConfig::default();
        cfg.apply_env_overrides();
        assert!(cfg.non_prod);
        std::env::remove_var("AIM_NON_PROD");
    }
}
