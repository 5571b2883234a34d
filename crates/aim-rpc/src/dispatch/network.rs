//! `network.*` method family: overlay lifecycle plus the optional
//! capability-gated data-wipe and diagnostics-export operations (spec
//! §4.10, §9 "Dynamic capability probing").

use crate::error_codes::{DATA_WIPE_UNSUPPORTED, DIAGNOSTICS_UNSUPPORTED};
use aim_core::errors::{AimError, Result};
use aim_service::Service;
use serde_json::{json, Value};

/// A method handled here that must bypass the generic family-code mapper
/// because it has its own dedicated unsupported-capability code.
pub enum NetworkOutcome {
    Value(Value),
    DedicatedError(i64, &'static str),
}

pub async fn dispatch(service: &dyn Service, method: &str, _params: &Value) -> Result<NetworkOutcome> {
    match method {
        "network.start" => {
            service.start_network().await?;
            Ok(NetworkOutcome::Value(json!({ "started": true })))
        }
        "network.stop" => {
            service.stop_network().await?;
            Ok(NetworkOutcome::Value(json!({ "stopped": true })))
        }
        "network.wipe_data" => {
            if !service.capabilities().data_wipe {
                return Ok(NetworkOutcome::DedicatedError(DATA_WIPE_UNSUPPORTED, "data wipe is not supported"));
            }
            service.wipe_data().await?;
            Ok(NetworkOutcome::Value(json!({ "wiped": true })))
        }
        "network.export_diagnostics" => {
            if !service.capabilities().diagnostics_export {
                return Ok(NetworkOutcome::DedicatedError(
                    DIAGNOSTICS_UNSUPPORTED,
                    "diagnostics export is not supported",
                ));
            }
            let bytes = service.export_diagnostics().await?;
            use base64::Engine;
            Ok(NetworkOutcome::Value(
                json!({ "content_base64": base64::engine::general_purpose::STANDARD.encode(bytes) }),
            ))
        }
        _ => Err(AimError::not_found(format!("unknown network method {method}"))),
    }
}

pub fn owns(method: &str) -> bool {
    method.starts_with("network.")
}
