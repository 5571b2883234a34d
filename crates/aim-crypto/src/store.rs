//! File-backed helpers for reading and writing Secure Envelope blobs.
//!
//! Directories are created owner-only (`0o700`) and files owner-only
//! (`0o600`) on unix platforms; Windows relies on the filesystem's default
//! ACLs since there is no portable equivalent here.

use crate::envelope;
use aim_core::errors::{AimError, Result};
use std::path::Path;

/// Serialize `value` to JSON, encrypt it under `passphrase`, and write it
/// atomically (write-to-temp then rename) to `path`.
pub fn write_encrypted_json<T: serde::Serialize>(
    path: &Path,
    passphrase: &str,
    value: &T,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    let plaintext = serde_json::to_vec(value)?;
    let framed = envelope::encrypt(passphrase, &plaintext)?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, &framed)?;
    set_private_file_mode(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read, decrypt, and deserialize a JSON value previously written by
/// [`write_encrypted_json`].
pub fn read_encrypted_json<T: serde::de::DeserializeOwned>(path: &Path, passphrase: &str) -> Result<T> {
    let framed = std::fs::read(path)?;
    let plaintext = envelope::decrypt(passphrase, &framed)?;
    let value = serde_json::from_slice(&plaintext)?;
    Ok(value)
}

/// Create `dir` (and parents) with owner-only permissions if it does not
/// already exist.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    set_private_dir_mode(dir)?;
    Ok(())
}

#[cfg(unix)]
fn set_private_dir_mode(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| AimError::storage(format!("chmod {}: {e}", dir.display())))
}

#[cfg(not(unix))]
fn set_private_dir_mode(_dir: &Path) -> Result<()> {
    Ok(())
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
