//! `inbox.*` method family: the message-request inbox (spec §4.4, §4.10).

use super::params::{as_str, positional};
use aim_core::errors::{AimError, Result};
use aim_service::Service;
use serde_json::{json, Value};

pub async fn dispatch(service: &dyn Service, method: &str, params: &Value) -> Result<Value> {
    match method {
        "inbox.list_requests" => {
            let requests = service.list_pending_requests().await?;
            Ok(json!(requests))
        }
        "inbox.accept_request" => {
            let args = positional(params, 2)?;
            let sender_id = as_str(&args[0], "sender_id")?;
            let display_name = as_str(&args[1], "display_name")?;
            service.accept_request(sender_id.to_owned(), display_name.to_owned()).await?;
            Ok(json!({ "accepted": true }))
        }
        "inbox.reject_request" => {
            let args = positional(params, 1)?;
            let sender_id = as_str(&args[0], "sender_id")?;
            service.reject_request(sender_id.to_owned()).await?;
            Ok(json!({ "rejected": true }))
        }
        _ => Err(AimError::not_found(format!("unknown inbox method {method}"))),
    }
}

pub fn owns(method: &str) -> bool {
    method.starts_with("inbox.")
}
