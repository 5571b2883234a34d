//! `group.*` method family: membership, role, and fan-out operations
//! (spec §4.5, §4.6, §4.10).

use super::params::{as_opt_str, as_str, list_limit, list_offset, positional};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::GroupId;
use aim_fanout::FanoutResult;
use aim_groups::state::GroupState;
use serde_json::{json, Value};

use aim_service::Service;

pub async fn dispatch(service: &dyn Service, method: &str, params: &Value) -> Result<Value> {
    match method {
        "group.create" => {
            let args = positional(params, 1)?;
            let title = as_str(&args[0], "title")?;
            let actor = service.whoami().await?;
            let group_id = service.create_group(title.to_owned(), actor).await?;
            Ok(json!({ "group_id": group_id.as_str() }))
        }
        "group.invite_member" => {
            let args = positional(params, 3)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let target = aim_core::identifiers::MemberId::new(as_str(&args[1], "target")?);
            let role = as_str(&args[2], "role")?.to_owned();
            let actor = service.whoami().await?;
            service.invite_member(group_id, actor, target, role).await?;
            Ok(json!({ "invited": true }))
        }
        "group.remove_member" => {
            let args = positional(params, 2)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let target = aim_core::identifiers::MemberId::new(as_str(&args[1], "target")?);
            let actor = service.whoami().await?;
            service.remove_member(group_id, actor, target).await?;
            Ok(json!({ "removed": true }))
        }
        "group.leave" => {
            let args = positional(params, 1)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let actor = service.whoami().await?;
            service.leave_group(group_id, actor).await?;
            Ok(json!({ "left": true }))
        }
        "group.rename" => {
            let args = positional(params, 2)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let title = as_str(&args[1], "title")?.to_owned();
            let actor = service.whoami().await?;
            service.rename_group(group_id, actor, title).await?;
            Ok(json!({ "renamed": true }))
        }
        "group.rotate_key" => {
            let args = positional(params, 1)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let actor = service.whoami().await?;
            let key_version = service.rotate_group_key(group_id, actor).await?;
            Ok(json!({ "key_version": key_version }))
        }
        "group.send_message" => {
            let args = params.as_array().ok_or_else(|| AimError::invalid("params must be a positional array"))?;
            if args.len() < 2 || args.len() > 3 {
                return Err(AimError::invalid("expected 2 or 3 positional params"));
            }
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let content = as_str(&args[1], "content")?.to_owned();
            let thread_id = args.get(2).and_then(as_opt_str);
            let result = service.send_group_message(group_id, content, thread_id).await?;
            Ok(fanout_to_json(&result))
        }
        "group.list" => {
            let (limit, offset) = list_limit_offset(params)?;
            let mut ids = service.list_groups().await?;
            ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            let page: Vec<_> = ids
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .map(|id| json!(id.as_str()))
                .collect();
            Ok(json!(page))
        }
        "group.snapshot" => {
            let args = positional(params, 1)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let state = service.group_snapshot(group_id).await?;
            Ok(group_state_to_json(&state))
        }
        "group.list_messages" => {
            let args = positional(params, 1)?;
            let group_id = GroupId::new(as_str(&args[0], "group_id")?);
            let messages = service.list_group_messages(group_id).await?;
            Ok(json!(messages
                .iter()
                .map(|m| json!({
                    "id": m.id.as_str(),
                    "contact_id": m.contact_id.as_str(),
                    "conversation_id": m.conversation_id.as_str(),
                    "thread_id": m.thread_id,
                    "content": m.content,
                    "timestamp": m.timestamp,
                    "direction": m.direction,
                    "status": m.status,
                    "content_type": m.content_type,
                }))
                .collect::<Vec<_>>()))
        }
        _ => Err(AimError::not_found(format!("unknown group method {method}"))),
    }
}

fn list_limit_offset(params: &Value) -> Result<(i64, i64)> {
    match params.as_array() {
        None if params.is_null() => Ok((100, 0)),
        Some(arr) if arr.is_empty() => Ok((100, 0)),
        Some(arr) if arr.len() == 2 => Ok((list_limit(&arr[0])?, list_offset(&arr[1])?)),
        _ => Err(AimError::invalid("expected [] or [limit, offset]")),
    }
}

pub fn group_state_to_json(state: &GroupState) -> Value {
    let members: Vec<Value> = state
        .members
        .values()
        .map(|m| {
            json!({
                "member_id": m.member_id.as_str(),
                "role": m.role,
                "status": m.status,
                "invited_at": m.invited_at,
                "updated_at": m.updated_at,
            })
        })
        .collect();
    json!({
        "group": {
            "id": state.group.id.as_str(),
            "title": state.group.title,
            "description": state.group.description,
            "avatar": state.group.avatar,
            "created_by": state.group.created_by.as_str(),
            "created_at": state.group.created_at,
            "updated_at": state.group.updated_at,
        },
        "version": state.version,
        "last_key_version": state.last_key_version,
        "members": members,
    })
}

pub fn fanout_to_json(result: &FanoutResult) -> Value {
    json!({
        "group_id": result.group_id.as_str(),
        "event_id": result.event_id.as_str(),
        "attempted": result.attempted,
        "delivered": result.delivered,
        "pending": result.pending,
        "failed": result.failed,
        "recipients": result.recipients.iter().map(|r| json!({
            "recipient_id": r.recipient_id.as_str(),
            "message_id": r.message_id.as_str(),
            "status": r.status,
            "error": r.error,
        })).collect::<Vec<_>>(),
    })
}

pub fn owns(method: &str) -> bool {
    method.starts_with("group.")
}
