//! `privacy.*` method family (spec §4.4).

use super::params::{as_bool, as_str, positional};
use aim_core::errors::{AimError, Result};
use aim_privacy::settings::InboundMode;
use aim_privacy::StorageScope;
use aim_service::Service;
use serde_json::{json, Value};

pub async fn dispatch(service: &dyn Service, method: &str, params: &Value) -> Result<Value> {
    match method {
        "privacy.get_settings" => {
            let settings = service.get_privacy_settings().await?;
            Ok(json!({
                "schema_version": settings.schema_version,
                "inbound_mode": serde_json::to_value(settings.inbound_mode)?,
                "storage_protection": serde_json::to_value(settings.storage_protection)?,
                "default_retention": {
                    "ttl_secs": settings.default_retention.ttl_secs,
                    "quota": settings.default_retention.quota,
                },
            }))
        }
        "privacy.set_inbound_mode" => {
            let args = positional(params, 1)?;
            let raw = as_str(&args[0], "mode")?;
            let mode = InboundMode::parse(raw).unwrap_or(InboundMode::Everyone);
            service.set_inbound_mode(mode).await?;
            Ok(json!({ "inbound_mode": serde_json::to_value(mode)? }))
        }
        "privacy.block" => {
            let args = positional(params, 1)?;
            let id = as_str(&args[0], "id")?;
            service.block(id.to_owned()).await?;
            Ok(json!({ "blocked": true }))
        }
        "privacy.unblock" => {
            let args = positional(params, 1)?;
            let id = as_str(&args[0], "id")?;
            service.unblock(id.to_owned()).await?;
            Ok(json!({ "blocked": false }))
        }
        "privacy.list_blocked" => {
            let ids = service.list_blocked().await?;
            Ok(json!(ids))
        }
        "privacy.resolve_storage_policy" => {
            let args = positional(params, 3)?;
            let scope = parse_scope(as_str(&args[0], "scope")?)?;
            let scope_id = as_str(&args[1], "scope_id")?;
            let pinned = as_bool(&args[2], "pinned")?;
            let policy = service.resolve_storage_policy(scope, scope_id.to_owned(), pinned).await?;
            Ok(json!({ "ttl_secs": policy.ttl_secs, "quota": policy.quota }))
        }
        _ => Err(AimError::not_found(format!("unknown privacy method {method}"))),
    }
}

fn parse_scope(raw: &str) -> Result<StorageScope> {
    match raw {
        "global" => Ok(StorageScope::Global),
        "group" => Ok(StorageScope::Group),
        "channel" => Ok(StorageScope::Channel),
        "chat" => Ok(StorageScope::Chat),
        other => Err(AimError::invalid(format!("unknown storage scope {other}"))),
    }
}

pub fn owns(method: &str) -> bool {
    method.starts_with("privacy.")
}
