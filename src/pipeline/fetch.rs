//! Document fetch: resolve the caller-supplied location to raw bytes.
//!
//! The document reference is always caller-supplied, so every failure here —
//! bad scheme, HTTP error, timeout, non-PDF content — is bad-request class,
//! not a server fault. We validate the PDF magic bytes (`%PDF`) before
//! handing the buffer to any provider so callers get a meaningful error
//! rather than an opaque layout-analysis failure.

use crate::error::ProcessError;
use tracing::{debug, info};

/// Check if the input string looks like a fetchable URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Download the document and validate it is a PDF.
pub async fn fetch_document(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ProcessError> {
    if !is_url(url) {
        return Err(ProcessError::InvalidRequest {
            detail: format!("document_url must be an HTTP/HTTPS URL, got '{url}'"),
        });
    }

    info!("Fetching document: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProcessError::Internal(format!("http client: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ProcessError::DocumentFetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ProcessError::DocumentFetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ProcessError::DocumentFetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ProcessError::DocumentFetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ProcessError::NotAPdf { magic });
    }

    debug!("Fetched {} bytes", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/inv.pdf"));
        assert!(is_url("http://example.com/inv.pdf"));
        assert!(!is_url("/tmp/inv.pdf"));
        assert!(!is_url("inv.pdf"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn non_url_rejected_without_network() {
        let err = fetch_document("not-a-url", 5).await.unwrap_err();
        assert!(matches!(err, ProcessError::InvalidRequest { .. }));
    }
}
