//! Default collaborator implementations wiring `AimService` to local disk.
//!
//! The identity/session/transport layer is explicitly out of scope for the
//! core (spec §1 "Out of scope"), so these are the daemon's own stand-ins:
//! a persisted local identity, attachments and contacts held behind the
//! Secure Envelope (§4.1), and a networking/session layer that is a no-op
//! until a real transport is wired in.

use aim_core::errors::{AimError, Result};
use aim_core::identifiers::{ContactId, DeviceId, GroupId, MemberId};
use aim_crypto::store::{read_encrypted_json, write_encrypted_json};
use aim_fanout::message::FanoutMessage;
use aim_fanout::{MessagePublisher, MessageStore};
use aim_service::{AttachmentStore, ContactDirectory, ContactSummary, IdentityResolver, NetworkPublisher, SessionCrypto};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalIdentityRecord {
    member_id: String,
    device_id: String,
}

/// Loads (or mints on first run) the local `MemberId`/`DeviceId` pair from
/// `identity.json`. These are not secrets, so the record is plain JSON
/// rather than behind the Secure Envelope.
pub struct PersistedIdentity {
    member_id: MemberId,
    device_id: DeviceId,
}

impl PersistedIdentity {
    pub fn load_or_init(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("identity.json");
        if let Ok(raw) = std::fs::read_to_string(&path) {
            let record: LocalIdentityRecord = serde_json::from_str(&raw)?;
            return Ok(Self { member_id: MemberId::new(record.member_id), device_id: DeviceId::new(record.device_id) });
        }

        let member_id = MemberId::generate();
        let device_id = DeviceId::generate();
        aim_crypto::store::ensure_private_dir(data_dir)?;
        let record = LocalIdentityRecord { member_id: member_id.as_str().to_owned(), device_id: device_id.as_str().to_owned() };
        std::fs::write(&path, serde_json::to_vec_pretty(&record)?)?;
        Ok(Self { member_id, device_id })
    }
}

#[async_trait]
impl IdentityResolver for PersistedIdentity {
    async fn local_identity(&self) -> Result<MemberId> {
        Ok(self.member_id.clone())
    }

    async fn local_device(&self) -> Result<DeviceId> {
        Ok(self.device_id.clone())
    }
}

/// Seals and opens 1-to-1 message payloads under the local storage key. The
/// X3DH handshake and double ratchet this would front are out of scope
/// here (spec §1); this is a placeholder until that session layer exists.
pub struct LocalSessionCrypto {
    passphrase: String,
}

impl LocalSessionCrypto {
    pub fn new(passphrase: String) -> Self {
        Self { passphrase }
    }
}

#[async_trait]
impl SessionCrypto for LocalSessionCrypto {
    async fn seal(&self, peer: &ContactId, plaintext: &str) -> Result<Vec<u8>> {
        let per_peer_passphrase = format!("{}|{}", self.passphrase, peer.as_str());
        aim_crypto::envelope::encrypt(&per_peer_passphrase, plaintext.as_bytes())
    }

    async fn open(&self, peer: &ContactId, ciphertext: &[u8]) -> Result<String> {
        let per_peer_passphrase = format!("{}|{}", self.passphrase, peer.as_str());
        let plaintext = aim_crypto::envelope::decrypt(&per_peer_passphrase, ciphertext)?;
        String::from_utf8(plaintext).map_err(|e| AimError::crypto(format!("decrypted payload is not valid utf-8: {e}")))
    }
}

/// Overlay networking stack stand-in; no peers are ever actually reached
/// (spec §1 "wire transport to peers" is out of scope).
pub struct NoopNetwork;

#[async_trait]
impl NetworkPublisher for NoopNetwork {
    async fn start(&self) -> Result<()> {
        tracing::info!("network.start: no transport wired, this is a no-op");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        tracing::info!("network.stop: no transport wired, this is a no-op");
        Ok(())
    }

    async fn send_direct(&self, peer: &ContactId, ciphertext: &[u8]) -> Result<()> {
        tracing::debug!(peer = %peer, bytes = ciphertext.len(), "send_direct: no transport wired, dropping");
        Ok(())
    }
}

/// Group fan-out publisher stand-in mirroring [`NoopNetwork`]: recipients
/// are logged but never actually reached over the wire.
pub struct NoopGroupPublisher;

#[async_trait]
impl MessagePublisher for NoopGroupPublisher {
    async fn prepare_and_publish(
        &self,
        _content: &str,
        recipient_id: &MemberId,
        _membership_version: u64,
        _group_key_version: u64,
        _sender_device_id: &DeviceId,
        _occurred_at: DateTime<Utc>,
    ) -> Result<()> {
        tracing::debug!(recipient = %recipient_id, "prepare_and_publish: no transport wired, dropping");
        Ok(())
    }
}

/// Attachment blobs, each framed individually through the Secure Envelope
/// and named by the SHA-256 of their plaintext so repeated uploads dedupe.
pub struct FileAttachmentStore {
    dir: PathBuf,
    passphrase: String,
}

impl FileAttachmentStore {
    pub fn new(data_dir: &Path, passphrase: String) -> Result<Self> {
        let dir = data_dir.join("attachments");
        aim_crypto::store::ensure_private_dir(&dir)?;
        Ok(Self { dir, passphrase })
    }

    fn id_for(bytes: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(bytes))
    }
}

#[async_trait]
impl AttachmentStore for FileAttachmentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String> {
        let id = Self::id_for(&bytes);
        let path = self.dir.join(format!("{id}.enc"));
        if !path.exists() {
            let framed = aim_crypto::envelope::encrypt(&self.passphrase, &bytes)?;
            std::fs::write(&path, framed)?;
        }
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(format!("{id}.enc"));
        if !path.exists() {
            return Ok(None);
        }
        let framed = std::fs::read(&path)?;
        let plaintext = aim_crypto::envelope::decrypt(&self.passphrase, &framed)?;
        Ok(Some(plaintext))
    }
}

/// A whole-file encrypted snapshot of a `HashMap`, loaded at startup and
/// rewritten on every mutation. Adequate for the contact list and message
/// rows a single daemon holds; not a design meant to scale to bulk data.
struct EncryptedSnapshot<T> {
    path: PathBuf,
    passphrase: String,
    data: Mutex<T>,
}

impl<T> EncryptedSnapshot<T>
where
    T: Default + Clone + serde::Serialize + serde::de::DeserializeOwned,
{
    fn load_or_init(data_dir: &Path, file_name: &str, passphrase: String) -> Result<Self> {
        aim_crypto::store::ensure_private_dir(data_dir)?;
        let path = data_dir.join(file_name);
        let data = if path.exists() { read_encrypted_json(&path, &passphrase)? } else { T::default() };
        Ok(Self { path, passphrase, data: Mutex::new(data) })
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut guard = self.data.lock().expect("snapshot mutex poisoned");
        let result = f(&mut guard);
        write_encrypted_json(&self.path, &self.passphrase, &*guard)?;
        Ok(result)
    }

    fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.data.lock().expect("snapshot mutex poisoned"))
    }
}

/// Contact directory persisted as an encrypted snapshot (`contacts.enc`).
pub struct PersistedContacts {
    snapshot: EncryptedSnapshot<HashMap<String, String>>,
}

impl PersistedContacts {
    pub fn load_or_init(data_dir: &Path, passphrase: String) -> Result<Self> {
        Ok(Self { snapshot: EncryptedSnapshot::load_or_init(data_dir, "contacts.enc", passphrase)? })
    }
}

#[async_trait]
impl ContactDirectory for PersistedContacts {
    async fn is_known(&self, id: &ContactId) -> Result<bool> {
        Ok(self.snapshot.read(|map| map.contains_key(id.as_str())))
    }

    async fn list(&self) -> Result<Vec<ContactSummary>> {
        Ok(self.snapshot.read(|map| {
            map.iter().map(|(id, name)| ContactSummary { id: ContactId::new(id.clone()), display_name: name.clone() }).collect()
        }))
    }

    async fn add(&self, id: &ContactId, display_name: &str) -> Result<()> {
        self.snapshot.with_mut(|map| {
            map.insert(id.as_str().to_owned(), display_name.to_owned());
        })
    }

    async fn remove(&self, id: &ContactId) -> Result<()> {
        self.snapshot.with_mut(|map| {
            map.remove(id.as_str());
        })
    }
}

/// Per-recipient fan-out message rows persisted as an encrypted snapshot
/// (`messages.enc`).
pub struct PersistedMessageStore {
    snapshot: EncryptedSnapshot<HashMap<String, FanoutMessage>>,
}

impl PersistedMessageStore {
    pub fn load_or_init(data_dir: &Path, passphrase: String) -> Result<Self> {
        Ok(Self { snapshot: EncryptedSnapshot::load_or_init(data_dir, "messages.enc", passphrase)? })
    }
}

#[async_trait]
impl MessageStore for PersistedMessageStore {
    async fn find(&self, id: &aim_core::identifiers::MessageId) -> Result<Option<FanoutMessage>> {
        Ok(self.snapshot.read(|map| map.get(id.as_str()).cloned()))
    }

    async fn save(&self, message: FanoutMessage) -> Result<()> {
        self.snapshot.with_mut(|map| {
            map.insert(message.id.as_str().to_owned(), message);
        })
    }

    async fn list_for_conversation(&self, conversation_id: &GroupId) -> Result<Vec<FanoutMessage>> {
        Ok(self
            .snapshot
            .read(|map| map.values().filter(|m| &m.conversation_id == conversation_id).cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_core::identifiers::{GroupId, MessageId};
    use aim_fanout::message::{MessageDirection, MessageStatus, CONTENT_TYPE_TEXT};
    use chrono::Utc;

    #[test]
    fn identity_is_stable_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let first = PersistedIdentity::load_or_init(dir.path()).unwrap();
        let second = PersistedIdentity::load_or_init(dir.path()).unwrap();
        assert_eq!(first.member_id, second.member_id);
        assert_eq!(first.device_id, second.device_id);
    }

    #[tokio::test]
    async fn attachment_put_get_round_trips_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAttachmentStore::new(dir.path(), "pass".into()).unwrap();
        let id_a = store.put(b"hello world".to_vec()).await.unwrap();
        let id_b = store.put(b"hello world".to_vec()).await.unwrap();
        assert_eq!(id_a, id_b);
        let bytes = store.get(&id_a).await.unwrap().unwrap();
        assert_eq!(bytes, b"hello world");
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn attachment_store_rejects_wrong_passphrase_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAttachmentStore::new(dir.path(), "pass".into()).unwrap();
        let id = store.put(b"secret bytes".to_vec()).await.unwrap();

        let reopened = FileAttachmentStore::new(dir.path(), "wrong".into()).unwrap();
        assert!(reopened.get(&id).await.is_err());
    }

    #[tokio::test]
    async fn contacts_persist_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let contacts = PersistedContacts::load_or_init(dir.path(), "pass".into()).unwrap();
            contacts.add(&ContactId::new("alice"), "Alice").await.unwrap();
        }
        let reloaded = PersistedContacts::load_or_init(dir.path(), "pass".into()).unwrap();
        assert!(reloaded.is_known(&ContactId::new("alice")).await.unwrap());
        let listed = reloaded.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].display_name, "Alice");

        reloaded.remove(&ContactId::new("alice")).await.unwrap();
        assert!(!reloaded.is_known(&ContactId::new("alice")).await.unwrap());
    }

    #[tokio::test]
    async fn message_store_persists_and_finds_saved_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistedMessageStore::load_or_init(dir.path(), "pass".into()).unwrap();
        let message = FanoutMessage {
            id: MessageId::new("msg-1"),
            contact_id: ContactId::new("m2"),
            conversation_id: GroupId::new("g1"),
            conversation_type: "group".to_owned(),
            thread_id: None,
            content: "hi".into(),
            timestamp: Utc::now(),
            direction: MessageDirection::Outbound,
            status: MessageStatus::Sent,
            content_type: CONTENT_TYPE_TEXT.to_owned(),
        };
        store.save(message.clone()).await.unwrap();

        let found = store.find(&MessageId::new("msg-1")).await.unwrap().unwrap();
        assert_eq!(found.content, "hi");
        assert!(store.find(&MessageId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_crypto_round_trips_per_peer() {
        let session = LocalSessionCrypto::new("pass".into());
        let peer = ContactId::new("bob");
        let sealed = session.seal(&peer, "hello").await.unwrap();
        let opened = session.open(&peer, &sealed).await.unwrap();
        assert_eq!(opened, "hello");
    }
}
