//! `messaging.*` method family: 1-to-1 messaging (spec §4.10).

use super::params::{as_str, positional};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::ContactId;
use aim_service::Service;
use serde_json::{json, Value};

pub async fn dispatch(service: &dyn Service, method: &str, params: &Value) -> Result<Value> {
    match method {
        "messaging.send_direct_message" => {
            let args = positional(params, 2)?;
            let peer = as_str(&args[0], "peer")?;
            let content = as_str(&args[1], "content")?;
            let message_id = service.send_direct_message(ContactId::new(peer), content.to_owned()).await?;
            Ok(json!({ "message_id": message_id.as_str() }))
        }
        _ => Err(AimError::not_found(format!("unknown messaging method {method}"))),
    }
}

pub fn owns(method: &str) -> bool {
    method.starts_with("messaging.")
}
