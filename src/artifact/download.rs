//! Artifact download and digest verification.

use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ArtifactErrorKind, SetupError};

/// Whole-request ceiling for a release download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetch a URL into memory.
///
/// Any network failure or non-success status maps to the reserved
/// download-failure class.
pub fn download(url: &str) -> Result<Vec<u8>, SetupError> {
    let failed = |message: String| SetupError::Artifact {
        kind: ArtifactErrorKind::DownloadFailed {
            url: url.to_string(),
            message,
        },
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(concat!("prootctl/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().map_err(|e| failed(e.to_string()))?;
    debug!(url, size = bytes.len(), "downloaded artifact");
    Ok(bytes.to_vec())
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compare the payload digest against an expected hex digest.
///
/// A mismatch is fatal to the whole install; callers must not extract or
/// move anything afterwards.
pub fn verify_sha256(bytes: &[u8], expected: &str) -> Result<(), SetupError> {
    let actual = sha256_hex(bytes);
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(SetupError::Artifact {
            kind: ArtifactErrorKind::ChecksumMismatch {
                expected: expected.trim().to_string(),
                actual,
            },
        });
    }
    Ok(())
}
