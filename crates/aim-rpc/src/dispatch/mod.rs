//! Method routing (spec §4.8 step 11): family handlers are tried in
//! order (identity → privacy → inbox → messaging → group → channel →
//! network → node), each mapping its domain errors through its own dense
//! error-code range.

mod channel;
mod group;
mod identity;
mod inbox;
mod messaging;
mod network;
mod node;
mod privacy;
pub mod params;

use crate::error_codes::{
    family_code, channel_code, BLOB_REPLICATION_UNSUPPORTED, Family, GROUPS_DISABLED, METHOD_NOT_FOUND,
    NODE_METHOD_NON_LOOPBACK, SERVICE_NOT_INITIALIZED,
};
use crate::jsonrpc::RpcError;
use crate::state::AppState;
use aim_service::Service;
use serde_json::{json, Value};

/// Methods that work even when no domain [`Service`] is wired (spec §4.8
/// step 9).
const SERVICE_FREE_METHODS: &[&str] = &["rpc.version", "rpc.capabilities", "health_check"];

pub async fn dispatch(state: &AppState, method: &str, params: &Value, is_loopback: bool) -> Result<Value, RpcError> {
    tracing::debug!(%method, "dispatching rpc method");
    match method {
        "rpc.version" => {
            return Ok(json!({
                "current_version": crate::jsonrpc::CURRENT_API_VERSION,
                "min_supported_version": crate::jsonrpc::MIN_SUPPORTED_API_VERSION,
            }))
        }
        "health_check" => return Ok(json!({ "status": "ok" })),
        "rpc.capabilities" => {
            let caps = state.service.as_ref().map(|s| s.capabilities()).unwrap_or_default();
            return Ok(json!({
                "groups_enabled": state.config.groups_enabled,
                "data_wipe": caps.data_wipe,
                "diagnostics_export": caps.diagnostics_export,
                "blob_pin_replication_acl": caps.blob_pin_replication_acl,
                "node_binding": caps.node_binding,
            }));
        }
        _ => {}
    }

    if method.starts_with("node.") && !is_loopback {
        return Err(RpcError::new(NODE_METHOD_NON_LOOPBACK, "node methods require a loopback peer"));
    }

    let Some(service) = state.service.as_ref() else {
        if SERVICE_FREE_METHODS.contains(&method) {
            unreachable!("handled above");
        }
        return Err(RpcError::new(SERVICE_NOT_INITIALIZED, "domain service is not wired"));
    };
    let service: &dyn Service = service.as_ref();

    if !state.config.groups_enabled && (method.starts_with("group.") || method.starts_with("channel.")) {
        return Err(RpcError::new(GROUPS_DISABLED, "group/channel methods are disabled"));
    }

    if method == "identity.attachments.configure_replication" && !service.capabilities().blob_pin_replication_acl {
        return Err(RpcError::new(BLOB_REPLICATION_UNSUPPORTED, "blob pin/replication/ACL presets are not supported"));
    }
    if identity::owns(method) {
        return identity::dispatch(service, method, params).await.map_err(|e| {
            RpcError::new(family_code(Family::Identity, &e), e.to_string())
        });
    }
    if privacy::owns(method) {
        return privacy::dispatch(service, method, params)
            .await
            .map_err(|e| RpcError::new(family_code(Family::Privacy, &e), e.to_string()));
    }
    if inbox::owns(method) {
        return inbox::dispatch(service, method, params)
            .await
            .map_err(|e| RpcError::new(family_code(Family::Inbox, &e), e.to_string()));
    }
    if messaging::owns(method) {
        return messaging::dispatch(service, method, params)
            .await
            .map_err(|e| RpcError::new(family_code(Family::Messaging, &e), e.to_string()));
    }
    if group::owns(method) {
        return group::dispatch(service, method, params)
            .await
            .map_err(|e| RpcError::new(family_code(Family::Group, &e), e.to_string()));
    }
    if channel::owns(method) {
        return channel::dispatch(service, method, params).await.map_err(|e| RpcError::new(channel_code(&e), e.to_string()));
    }
    if network::owns(method) {
        return match network::dispatch(service, method, params).await {
            Ok(network::NetworkOutcome::Value(v)) => Ok(v),
            Ok(network::NetworkOutcome::DedicatedError(code, message)) => Err(RpcError::new(code, message)),
            Err(e) => Err(RpcError::new(family_code(Family::Network, &e), e.to_string())),
        };
    }
    if node::owns(method) {
        return node::dispatch(service, method, params)
            .await
            .map_err(|e| RpcError::new(family_code(Family::Node, &e), e.to_string()));
    }

    Err(RpcError::new(METHOD_NOT_FOUND, format!("unknown method {method}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_core::config::AimConfig;
    use aim_core::time::FixedClock;
    use chrono::Utc;
    use std::sync::Arc;

    fn bare_state() -> AppState {
        AppState::new(AimConfig::default(), Arc::new(FixedClock::new(Utc::now())), None)
    }

    #[tokio::test]
    async fn rpc_version_works_without_service() {
        let state = bare_state();
        let result = dispatch(&state, "rpc.version", &Value::Null, true).await.unwrap();
        assert_eq!(result["current_version"], 1);
    }

    #[tokio::test]
    async fn other_methods_fail_without_service() {
        let state = bare_state();
        let err = dispatch(&state, "identity.whoami", &Value::Null, true).await.unwrap_err();
        assert_eq!(err.code, SERVICE_NOT_INITIALIZED);
    }

    #[tokio::test]
    async fn node_methods_require_loopback() {
        let state = bare_state();
        let err = dispatch(&state, "node.status", &Value::Null, false).await.unwrap_err();
        assert_eq!(err.code, NODE_METHOD_NON_LOOPBACK);
    }

    #[tokio::test]
    async fn blob_replication_without_capability_uses_dedicated_code() {
        let state = crate::testing::wired_state(AimConfig::default());
        let err = dispatch(&state, "identity.attachments.configure_replication", &Value::Null, true).await.unwrap_err();
        assert_eq!(err.code, BLOB_REPLICATION_UNSUPPORTED);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let state = bare_state();
        let err = dispatch(&state, "bogus.method", &Value::Null, true).await.unwrap_err();
        assert_eq!(err.code, METHOD_NOT_FOUND);
    }
}
