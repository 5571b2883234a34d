//! `storage.key` lifecycle: first-run generation and legacy-secret detection.
//!
//! The daemon derives the passphrase used for every `.enc` file from a
//! single random secret persisted as `storage.key` in the data directory.
//! If `.enc` files already exist without a matching key, that is treated as
//! a pre-existing install using an externally supplied passphrase, and the
//! operator must provide it explicitly rather than have the daemon guess.

use crate::store;
use aim_core::errors::{AimError, Result};
use rand::RngCore;
use std::path::Path;

const KEY_LEN: usize = 32;

/// Load the data directory's storage secret, generating one on first run.
///
/// Returns `LEGACY_SECRET_REQUIRED` (an [`AimError::permission_denied`]) if
/// `.enc` files are already present in `data_dir` but no `storage.key`
/// exists yet, unless `legacy_passphrase` supplies the pre-existing secret.
pub fn load_or_init(data_dir: &Path, legacy_passphrase: Option<&str>) -> Result<String> {
    store::ensure_private_dir(data_dir)?;
    let key_path = data_dir.join("storage.key");

    if key_path.exists() {
        let raw = std::fs::read_to_string(&key_path)?;
        return Ok(raw.trim().to_owned());
    }

    if let Some(passphrase) = legacy_passphrase {
        persist_key(&key_path, passphrase)?;
        return Ok(passphrase.to_owned());
    }

    if has_existing_enc_files(data_dir)? {
        return Err(AimError::permission_denied("LEGACY_SECRET_REQUIRED"));
    }

    let mut raw_key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut raw_key);
    let passphrase = hex::encode(raw_key);
    persist_key(&key_path, &passphrase)?;
    Ok(passphrase)
}

fn persist_key(key_path: &Path, passphrase: &str) -> Result<()> {
    std::fs::write(key_path, passphrase)?;
    set_private_file_mode(key_path)
}

#[cfg(unix)]
fn set_private_file_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| AimError::storage(format!("chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn set_private_file_mode(_path: &Path) -> Result<()> {
    Ok(())
}

fn has_existing_enc_files(data_dir: &Path) -> Result<bool> {
    if !data_dir.exists() {
        return Ok(false);
    }
    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) == Some("enc") {
            return Ok(true);
        }
    }
    Ok(false)
}
