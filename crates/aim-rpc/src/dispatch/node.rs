//! `node.*` method family: node-binding lifecycle, invokable only from a
//! loopback peer (enforced by the caller before this dispatches; spec
//! §4.8 step 6).

use aim_core::errors::{AimError, Result};
use aim_service::Service;
use serde_json::{json, Value};

pub async fn dispatch(service: &dyn Service, method: &str, _params: &Value) -> Result<Value> {
    match method {
        "node.status" => {
            let caps = service.capabilities();
            if !caps.node_binding {
                return Err(AimError::unsupported("node binding is not supported by this service"));
            }
            Ok(json!({ "bound": false }))
        }
        _ => Err(AimError::not_found(format!("unknown node method {method}"))),
    }
}

pub fn owns(method: &str) -> bool {
    method.starts_with("node.")
}
