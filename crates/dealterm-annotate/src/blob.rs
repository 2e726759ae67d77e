//! Write-once blob upload for assembled packet artifacts.
//!
//! Keys are content-addressed (sha256 of the payload), so re-uploading the
//! same artifact is a no-op and nothing ever needs read-modify-write.

use sha2::{Digest, Sha256};

use crate::error::AnnotateError;

/// Reference to an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub url: String,
    pub digest: String,
}

pub struct BlobStore {
    client: reqwest::Client,
    base_url: String,
}

impl BlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Upload `bytes` and return a fetchable reference. An already-present
    /// blob (409/412 from the store) counts as success.
    pub async fn put(&self, bytes: &[u8], content_type: &str) -> Result<BlobRef, AnnotateError> {
        let digest = hex_digest(bytes);
        let url = format!("{}/blobs/{digest}", self.base_url);

        let response = self
            .client
            .put(&url)
            .header("Content-Type", content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| AnnotateError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 409 || status.as_u16() == 412 {
            tracing::debug!(%digest, already_present = !status.is_success(), "blob stored");
            return Ok(BlobRef { url, digest });
        }

        let body = response.text().await.unwrap_or_default();
        Err(AnnotateError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let a = hex_digest(b"packet bytes");
        let b = hex_digest(b"packet bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_content_different_key() {
        assert_ne!(hex_digest(b"a"), hex_digest(b"b"));
    }
}
