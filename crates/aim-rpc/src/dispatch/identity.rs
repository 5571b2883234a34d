//! `identity.*` method family.

use super::params::{as_str, positional};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::ContactId;
use aim_service::Service;
use serde_json::{json, Value};

pub async fn dispatch(service: &dyn Service, method: &str, params: &Value) -> Result<Value> {
    match method {
        "identity.whoami" => {
            let id = service.whoami().await?;
            Ok(json!({ "member_id": id.as_str() }))
        }
        "identity.contacts.list" => {
            let contacts = service.list_contacts().await?;
            Ok(json!(contacts
                .into_iter()
                .map(|c| json!({ "id": c.id.as_str(), "display_name": c.display_name }))
                .collect::<Vec<_>>()))
        }
        "identity.contacts.add" => {
            let args = positional(params, 2)?;
            let id = as_str(&args[0], "id")?;
            let display_name = as_str(&args[1], "display_name")?;
            service.add_contact(ContactId::new(id), display_name.to_owned()).await?;
            Ok(json!({ "added": true }))
        }
        "identity.contacts.remove" => {
            let args = positional(params, 1)?;
            let id = as_str(&args[0], "id")?;
            service.remove_contact(ContactId::new(id)).await?;
            Ok(json!({ "removed": true }))
        }
        "identity.attachments.upload" => {
            let args = positional(params, 1)?;
            let b64 = as_str(&args[0], "content_base64")?;
            use base64::Engine;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| AimError::invalid(format!("invalid base64 content: {e}")))?;
            let id = service.upload_attachment(bytes).await?;
            Ok(json!({ "attachment_id": id }))
        }
        "identity.attachments.configure_replication" => {
            let args = positional(params, 2)?;
            let attachment_id = as_str(&args[0], "attachment_id")?;
            let acl_preset = as_str(&args[1], "acl_preset")?;
            service.configure_attachment_replication(attachment_id.to_owned(), acl_preset.to_owned()).await?;
            Ok(json!({ "configured": true }))
        }
        "identity.attachments.download" => {
            let args = positional(params, 1)?;
            let id = as_str(&args[0], "attachment_id")?;
            match service.download_attachment(id.to_owned()).await? {
                Some(bytes) => {
                    use base64::Engine;
                    Ok(json!({ "content_base64": base64::engine::general_purpose::STANDARD.encode(bytes) }))
                }
                None => Err(AimError::not_found("attachment does not exist")),
            }
        }
        _ => Err(AimError::not_found(format!("unknown identity method {method}"))),
    }
}

pub fn owns(method: &str) -> bool {
    method.starts_with("identity.")
}
