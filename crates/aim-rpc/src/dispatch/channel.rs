//! `channel.*` method family: channels are groups whose title carries the
//! `[channel:public]`/`[channel:private]` marker (GLOSSARY "Channel"),
//! restricting post permission to `owner|admin` (spec §4.6, §8 seed
//! scenarios 4–6).

use super::group::{fanout_to_json, group_state_to_json};
use super::params::{as_str, positional};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::GroupId;
use aim_groups::types::Group;
use serde_json::{json, Value};

use aim_service::Service;

pub async fn dispatch(service: &dyn Service, method: &str, params: &Value) -> Result<Value> {
    match method {
        "channel.create" => {
            let args = params.as_array().ok_or_else(|| AimError::invalid("params must be a positional array"))?;
            if args.len() < 2 || args.len() > 3 {
                return Err(AimError::invalid("expected 2 or 3 positional params"));
            }
            let name = as_str(&args[0], "name")?;
            let visibility = as_str(&args[1], "visibility")?;
            let visibility = match visibility {
                "public" | "private" => visibility,
                _ => return Err(AimError::invalid("visibility must be public or private")),
            };
            let title = format!("[channel:{visibility}] {name}");
            let actor = service.whoami().await?;
            let group_id = service.create_group(title, actor).await?;
            Ok(json!({ "group_id": group_id.as_str() }))
        }
        "channel.list" => {
            let ids = service.list_groups().await?;
            let mut channels = Vec::new();
            for id in ids {
                if let Ok(state) = service.group_snapshot(id).await {
                    if is_channel(&state.group) {
                        channels.push(json!({ "group_id": state.group.id.as_str(), "title": state.group.title }));
                    }
                }
            }
            Ok(json!(channels))
        }
        "channel.send" => {
            let args = positional(params, 2)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let content = as_str(&args[1], "content")?.to_owned();

            let state = service.group_snapshot(group_id.clone()).await?;
            if !is_channel(&state.group) {
                return Err(AimError::not_found("not a channel"));
            }

            let result = service.send_group_message(group_id, content, None).await?;
            Ok(fanout_to_json(&result))
        }
        "channel.snapshot" => {
            let args = positional(params, 1)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let state = service.group_snapshot(group_id).await?;
            if !is_channel(&state.group) {
                return Err(AimError::not_found("not a channel"));
            }
            Ok(group_state_to_json(&state))
        }
        _ => Err(AimError::not_found(format!("unknown channel method {method}"))),
    }
}

fn is_channel(group: &Group) -> bool {
    group.is_channel()
}

pub fn owns(method: &str) -> bool {
    method.starts_with("channel.")
}
