//! Injected collaborators for concerns the facade does not own: the
//! identity/session layer, attachment bytes, the contact directory, and
//! the networking lifecycle (spec §1 "Out of scope").

use aim_core::errors::Result;
use aim_core::identifiers::{ContactId, DeviceId, MemberId};
use async_trait::async_trait;

/// Resolves the local identity the daemon is running as.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn local_identity(&self) -> Result<MemberId>;
    async fn local_device(&self) -> Result<DeviceId>;
}

/// Seals and opens 1-to-1 message payloads. The X3DH handshake and ratchet
/// state live behind this seam, entirely out of scope here.
#[async_trait]
pub trait SessionCrypto: Send + Sync {
    async fn seal(&self, peer: &ContactId, plaintext: &str) -> Result<Vec<u8>>;
    async fn open(&self, peer: &ContactId, ciphertext: &[u8]) -> Result<String>;
}

/// Starts and stops the overlay networking stack, and hands a sealed 1-to-1
/// payload to the pub/sub transport (out of scope here; see spec §1).
#[async_trait]
pub trait NetworkPublisher: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn send_direct(&self, peer: &ContactId, ciphertext: &[u8]) -> Result<()>;
}

/// Opaque attachment blob storage, keyed by content id.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>) -> Result<String>;
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;
}

/// Contact-card bookkeeping the privacy routing table consults.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSummary {
    pub id: ContactId,
    pub display_name: String,
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn is_known(&self, id: &ContactId) -> Result<bool>;
    async fn list(&self) -> Result<Vec<ContactSummary>>;
    async fn add(&self, id: &ContactId, display_name: &str) -> Result<()>;
    async fn remove(&self, id: &ContactId) -> Result<()>;
}
