//! Pass/fail gate for externally verified data files.
//!
//! The store does not implement any signing scheme. A verifier is asked about the metadata
//! file before the first read; if it says no, the dataset is not opened.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Address, Result, StoreError};

pub trait IntegrityVerifier: Send + Sync {
    /// Check `path`, returning a human-readable reason on failure.
    fn verify(&self, path: &Path) -> std::result::Result<(), String>;
}

pub(crate) fn require_verified(verifier: &dyn IntegrityVerifier, path: &Path) -> Result<()> {
    verifier
        .verify(path)
        .map_err(|reason| StoreError::IntegrityCheckFailed {
            path: path.to_path_buf(),
            reason,
        })
}

/// Streamed SHA-256 of a file, lowercase hex.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Verifies a file against a detached `<file>.sha256` holding its hex digest.
///
/// A missing digest file fails closed.
#[derive(Clone, Copy, Debug, Default)]
pub struct DigestFileVerifier;

impl DigestFileVerifier {
    pub const SUFFIX: &'static str = ".sha256";

    /// Write the detached digest for `path`.
    pub fn sign(path: &Path) -> Result<()> {
        let digest_path = rowcol_fs::sibling_path_with_suffix(path, Self::SUFFIX);
        let digest =
            sha256_file(path).map_err(|err| StoreError::io(Address::File(path.to_path_buf()), err))?;
        rowcol_fs::atomic_write_bytes(&digest_path, format!("{digest}\n").as_bytes())
            .map_err(|err| StoreError::io(Address::File(digest_path), err))
    }
}

impl IntegrityVerifier for DigestFileVerifier {
    fn verify(&self, path: &Path) -> std::result::Result<(), String> {
        let digest_path = rowcol_fs::sibling_path_with_suffix(path, Self::SUFFIX);
        let expected = std::fs::read_to_string(&digest_path)
            .map_err(|err| format!("cannot read {}: {err}", digest_path.display()))?;
        let expected = expected.split_whitespace().next().unwrap_or_default();
        let actual = sha256_file(path).map_err(|err| format!("cannot hash file: {err}"))?;
        if expected.eq_ignore_ascii_case(&actual) {
            Ok(())
        } else {
            Err(format!("digest mismatch (expected {expected}, found {actual})"))
        }
    }
}
