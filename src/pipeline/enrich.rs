//! Best-effort semantic enrichment of reconciled line items.
//!
//! Each line gets a deterministic text fingerprint — part number, brand,
//! description, and categories — which an external embedding provider turns
//! into a vector for downstream similarity search. Enrichment is strictly
//! optional and failure-isolated: lines are embedded one at a time, and a
//! failed or timed-out call degrades to "no embedding for this line" without
//! touching the others or the overall response.

use crate::config::ProcessingConfig;
use crate::providers::EmbeddingProvider;
use crate::record::{EmbeddingSummary, LineItem};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Build the embedding input for one line.
///
/// Deterministic and pure: non-empty fields only, joined by `" | "`, with the
/// categories space-joined. Missing fields are omitted — never rendered as a
/// literal "None"/"null".
pub fn embedding_text(line: &LineItem) -> String {
    let categories = line.categories.join(" ");
    [
        line.part_number.as_deref().unwrap_or(""),
        line.brand.as_deref().unwrap_or(""),
        line.description.as_deref().unwrap_or(""),
        &categories,
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" | ")
}

/// Attach embeddings to the lines in place, returning the enrichment summary.
///
/// Sequential by design: each call is independent, and one line's failure
/// must not abort the rest.
pub async fn enrich_lines(
    provider: Option<&Arc<dyn EmbeddingProvider>>,
    lines: &mut [LineItem],
    config: &ProcessingConfig,
) -> EmbeddingSummary {
    let Some(provider) = provider else {
        return EmbeddingSummary::default();
    };

    let mut count = 0usize;
    for (idx, line) in lines.iter_mut().enumerate() {
        let text = embedding_text(line);
        if text.is_empty() {
            continue;
        }
        let capped = truncate_chars(&text, config.embedding_input_cap);

        match timeout(
            Duration::from_secs(config.embedding_timeout_secs),
            provider.embed(capped),
        )
        .await
        {
            Ok(Ok(vector)) if !vector.is_empty() => {
                line.embedding = Some(vector);
                count += 1;
            }
            Ok(Ok(_)) => warn!(line = idx, "embedding provider returned an empty vector"),
            Ok(Err(e)) => warn!(line = idx, error = %e, "embedding generation failed"),
            Err(_) => warn!(
                line = idx,
                secs = config.embedding_timeout_secs,
                "embedding generation timed out"
            ),
        }
    }

    EmbeddingSummary {
        enabled: count > 0,
        count,
        deployment: provider.deployment(),
        model: provider.model(),
    }
}

/// Truncate to at most `cap` characters on a char boundary.
fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn embedding_text_joins_non_empty_fields() {
        let line = LineItem {
            part_number: Some("BRK-123".into()),
            brand: Some("ACME".into()),
            description: Some("Front brake pad set".into()),
            categories: vec!["Brakes".into(), "Accessories".into()],
            ..Default::default()
        };
        assert_eq!(
            embedding_text(&line),
            "BRK-123 | ACME | Front brake pad set | Brakes Accessories"
        );
    }

    #[test]
    fn embedding_text_omits_missing_fields() {
        let line = LineItem {
            description: Some("Oil filter".into()),
            ..Default::default()
        };
        let text = embedding_text(&line);
        assert_eq!(text, "Oil filter");
        assert!(!text.contains("None"));
        assert!(!text.contains("null"));
    }

    #[test]
    fn embedding_text_is_deterministic() {
        let line = LineItem {
            part_number: Some("X-1".into()),
            brand: Some("Bosch".into()),
            ..Default::default()
        };
        assert_eq!(embedding_text(&line), embedding_text(&line));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("äöü", 2), "äö");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    struct FlakyProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProcessError> {
            // Fail every second call.
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 1 {
                Err(ProcessError::Internal("embeddings: HTTP 503".into()))
            } else {
                Ok(vec![0.1, 0.2])
            }
        }
    }

    #[tokio::test]
    async fn one_failed_line_does_not_abort_the_rest() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FlakyProvider {
            calls: AtomicUsize::new(0),
        });
        let mut lines = vec![
            LineItem {
                part_number: Some("A-1".into()),
                ..Default::default()
            },
            LineItem {
                part_number: Some("B-2".into()),
                ..Default::default()
            },
            LineItem {
                part_number: Some("C-3".into()),
                ..Default::default()
            },
        ];
        let config = ProcessingConfig::default();
        let summary = enrich_lines(Some(&provider), &mut lines, &config).await;

        assert!(summary.enabled);
        assert_eq!(summary.count, 2);
        assert!(lines[0].embedding.is_some());
        assert!(lines[1].embedding.is_none());
        assert!(lines[2].embedding.is_some());
    }

    #[tokio::test]
    async fn no_provider_means_enrichment_disabled() {
        let mut lines = vec![LineItem::default()];
        let summary = enrich_lines(None, &mut lines, &ProcessingConfig::default()).await;
        assert!(!summary.enabled);
        assert_eq!(summary.count, 0);
    }
}
