//! Shared test-only fakes for wiring a real [`AimService`] into gateway
//! tests without pulling in disk-backed collaborators.

#![cfg(test)]

use aim_core::config::AimConfig;
use aim_core::errors::Result;
use aim_core::identifiers::{ContactId, DeviceId, MemberId, MessageId};
use aim_core::time::FixedClock;
use aim_fanout::message::FanoutMessage;
use aim_fanout::{MessagePublisher, MessageStore};
use aim_service::{AimService, AttachmentStore, ContactDirectory, ContactSummary, IdentityResolver, NetworkPublisher, SessionCrypto};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

struct FixedIdentity;
#[async_trait]
impl IdentityResolver for FixedIdentity {
    async fn local_identity(&self) -> Result<MemberId> {
        Ok(MemberId::new("owner"))
    }
    async fn local_device(&self) -> Result<DeviceId> {
        Ok(DeviceId::new("d1"))
    }
}

struct EchoCrypto;
#[async_trait]
impl SessionCrypto for EchoCrypto {
    async fn seal(&self, _peer: &ContactId, plaintext: &str) -> Result<Vec<u8>> {
        Ok(plaintext.as_bytes().to_vec())
    }
    async fn open(&self, _peer: &ContactId, ciphertext: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(ciphertext).into_owned())
    }
}

struct NullNetwork;
#[async_trait]
impl NetworkPublisher for NullNetwork {
    async fn start(&self) -> Result<()> {
        Ok(())
    }
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
    async fn send_direct(&self, _peer: &ContactId, _ciphertext: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Echoes back whatever was put, so download tests can round-trip a blob.
#[derive(Default)]
struct EchoAttachments(std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>);
#[async_trait]
impl AttachmentStore for EchoAttachments {
    async fn put(&self, bytes: Vec<u8>) -> Result<String> {
        let id = format!("att_{}", self.0.lock().unwrap().len());
        self.0.lock().unwrap().insert(id.clone(), bytes);
        Ok(id)
    }
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }
}

#[derive(Default)]
struct NoContacts;
#[async_trait]
impl ContactDirectory for NoContacts {
    async fn is_known(&self, _id: &ContactId) -> Result<bool> {
        Ok(false)
    }
    async fn list(&self) -> Result<Vec<ContactSummary>> {
        Ok(vec![])
    }
    async fn add(&self, _id: &ContactId, _display_name: &str) -> Result<()> {
        Ok(())
    }
    async fn remove(&self, _id: &ContactId) -> Result<()> {
        Ok(())
    }
}

struct NoopPublisher;
#[async_trait]
impl MessagePublisher for NoopPublisher {
    async fn prepare_and_publish(
        &self,
        _content: &str,
        _recipient_id: &MemberId,
        _membership_version: u64,
        _group_key_version: u64,
        _sender_device_id: &DeviceId,
        _occurred_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct NoMessages;
#[async_trait]
impl MessageStore for NoMessages {
    async fn find(&self, _id: &MessageId) -> Result<Option<FanoutMessage>> {
        Ok(None)
    }
    async fn save(&self, _message: FanoutMessage) -> Result<()> {
        Ok(())
    }
    async fn list_for_conversation(&self, _conversation_id: &aim_core::identifiers::GroupId) -> Result<Vec<FanoutMessage>> {
        Ok(Vec::new())
    }
}

/// A real [`AimService`] backed by in-memory fakes, wrapped in an
/// [`crate::state::AppState`] built from `config`.
pub fn wired_state(config: AimConfig) -> crate::state::AppState {
    let service = AimService::new(
        Arc::new(FixedClock::new(Utc::now())),
        Arc::new(FixedIdentity),
        Arc::new(EchoCrypto),
        Arc::new(NullNetwork),
        Arc::new(EchoAttachments::default()),
        Arc::new(NoContacts),
        Arc::new(NoopPublisher),
        Arc::new(NoMessages),
        aim_limits::RateLimitRule { rps: 100.0, burst: 100 },
        aim_limits::RateLimitRule { rps: 100.0, burst: 100 },
    );
    crate::state::AppState::new(config, Arc::new(FixedClock::new(Utc::now())), Some(Arc::new(service)))
}

/// An [`crate::state::AppState`] with no domain service wired.
pub fn bare_state(config: AimConfig) -> crate::state::AppState {
    crate::state::AppState::new(config, Arc::new(FixedClock::new(Utc::now())), None)
}

pub fn peer() -> std::net::SocketAddr {
    "127.0.0.1:9999".parse().unwrap()
}
