//! Integrity checks for classifier model files.
//!
//! A model is verified against an explicit SHA-256 digest, or against a
//! `sha256sum`-style sidecar (`model.onnx.sha256`) sitting next to it. Models
//! with neither are loaded unchecked.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("model file not found: {path}")]
    MissingModel { path: PathBuf },

    #[error("failed to open file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed checksum sidecar: {path}")]
    MalformedSidecar { path: PathBuf },

    #[error("model checksum mismatch ({path})\n  expected: {expected}\n  got:      {got}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// Outcome of [`verify_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Digest matched; carries the digest.
    Verified(String),
    /// No expected digest was available.
    Unchecked,
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file_hex(path: &Path) -> Result<String, ModelIntegrityError> {
    let mut file = fs::File::open(path).map_err(|source| ModelIntegrityError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|source| ModelIntegrityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn verify_file_sha256(
    path: &Path,
    expected_sha256: &str,
) -> Result<String, ModelIntegrityError> {
    if !path.exists() {
        return Err(ModelIntegrityError::MissingModel {
            path: path.to_path_buf(),
        });
    }

    let digest = sha256_file_hex(path)?;
    if !digest.eq_ignore_ascii_case(expected_sha256.trim()) {
        return Err(ModelIntegrityError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected_sha256.trim().to_ascii_lowercase(),
            got: digest,
        });
    }

    Ok(digest)
}

/// Path of the checksum sidecar for `model_path` (`<model>.sha256`).
pub fn sidecar_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

/// Read the digest from a sidecar, if one exists. Accepts a bare digest or
/// `sha256sum` output (`<digest>  <filename>`).
pub fn read_sidecar(model_path: &Path) -> Result<Option<String>, ModelIntegrityError> {
    let path = sidecar_path(model_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&path).map_err(|source| ModelIntegrityError::Read {
        path: path.clone(),
        source,
    })?;
    let digest = contents.split_whitespace().next().unwrap_or_default();
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ModelIntegrityError::MalformedSidecar { path });
    }

    Ok(Some(digest.to_ascii_lowercase()))
}

/// Verify a model before loading it.
///
/// An explicit digest takes precedence over the sidecar. A missing model file
/// is always an error, even when there is nothing to verify against.
pub fn verify_model(
    model_path: &Path,
    expected_sha256: Option<&str>,
) -> Result<Verification, ModelIntegrityError> {
    if !model_path.exists() {
        return Err(ModelIntegrityError::MissingModel {
            path: model_path.to_path_buf(),
        });
    }

    let expected = match expected_sha256 {
        Some(d) => Some(d.to_string()),
        None => read_sidecar(model_path)?,
    };

    match expected {
        Some(expected) => verify_file_sha256(model_path, &expected).map(Verification::Verified),
        None => Ok(Verification::Unchecked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hello")
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pulsegate-models-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn verify_file_sha256_rejects_missing() {
        let path = temp_dir("missing").join("nope.onnx");
        let err = verify_file_sha256(&path, "00").unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));
    }

    #[test]
    fn verify_file_sha256_rejects_mismatch() {
        let dir = temp_dir("mismatch");
        let path = dir.join("model.onnx");
        fs::write(&path, b"hello").unwrap();

        let err = verify_file_sha256(&path, "00").unwrap_err();
        assert!(matches!(err, ModelIntegrityError::ChecksumMismatch { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_file_sha256_accepts_match_any_case() {
        let dir = temp_dir("match");
        let path = dir.join("model.onnx");
        fs::write(&path, b"hello").unwrap();

        assert_eq!(sha256_file_hex(&path).unwrap(), HELLO_SHA256);
        verify_file_sha256(&path, &HELLO_SHA256.to_ascii_uppercase()).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/models/finger.onnx")),
            PathBuf::from("/models/finger.onnx.sha256")
        );
    }

    #[test]
    fn verify_model_uses_sidecar() {
        let dir = temp_dir("sidecar");
        let path = dir.join("finger.onnx");
        fs::write(&path, b"hello").unwrap();
        fs::write(sidecar_path(&path), format!("{HELLO_SHA256}  finger.onnx\n")).unwrap();

        assert_eq!(
            verify_model(&path, None).unwrap(),
            Verification::Verified(HELLO_SHA256.to_string())
        );

        // explicit digest overrides the sidecar
        let err = verify_model(&path, Some("ab")).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::ChecksumMismatch { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_model_rejects_malformed_sidecar() {
        let dir = temp_dir("malformed");
        let path = dir.join("finger.onnx");
        fs::write(&path, b"hello").unwrap();
        fs::write(sidecar_path(&path), "not-a-digest").unwrap();

        let err = verify_model(&path, None).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MalformedSidecar { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_model_unchecked_without_digest() {
        let dir = temp_dir("unchecked");
        let path = dir.join("finger.onnx");
        fs::write(&path, b"hello").unwrap();

        assert_eq!(verify_model(&path, None).unwrap(), Verification::Unchecked);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_model_reports_missing() {
        let path = temp_dir("gone").join("finger.onnx");
        let err = verify_model(&path, None).unwrap_err();
        assert!(matches!(err, ModelIntegrityError::MissingModel { .. }));
    }
}
