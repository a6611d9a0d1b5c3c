//! End-to-end pipeline tests over stub providers.
//!
//! Every external capability is injected as a stub returning canned values,
//! and the document itself is served from a local HTTP fixture — the full
//! fetch → layout → extract ∥ extract → reconcile → enrich → project path
//! runs with zero network or cloud dependencies.

use async_trait::async_trait;
use invoice2db::pipeline::layout::{KeyValuePair, LayoutPayload};
use invoice2db::{
    process, Confidence, EmbeddingProvider, ExtractionPass, ExtractionProvider, LayoutProvider,
    ProcessError, ProcessRequest, ProcessingConfig, PromptPart,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Stub providers ───────────────────────────────────────────────────────

struct StubLayout {
    payload: LayoutPayload,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LayoutProvider for StubLayout {
    async fn analyze(&self, _document: &[u8]) -> Result<LayoutPayload, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

/// One stub serves both passes: the layout pass sends text parts only, the
/// document pass includes the inline PDF, so the stub can tell them apart
/// exactly as a real provider would see them.
struct StubExtraction {
    layout_response: String,
    document_response: String,
}

#[async_trait]
impl ExtractionProvider for StubExtraction {
    async fn generate(&self, parts: &[PromptPart]) -> Result<String, ProcessError> {
        let has_document = parts
            .iter()
            .any(|p| matches!(p, PromptPart::Document { .. }));
        Ok(if has_document {
            self.document_response.clone()
        } else {
            self.layout_response.clone()
        })
    }
}

struct StubEmbedding;

#[async_trait]
impl EmbeddingProvider for StubEmbedding {
    fn deployment(&self) -> Option<String> {
        Some("text-embed-stub".into())
    }

    fn model(&self) -> Option<String> {
        Some("text-embedding-3-small".into())
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProcessError> {
        Ok(vec![0.25, 0.5, 0.75])
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

/// Serve a minimal PDF fixture from a local listener, returning its URL.
async fn serve_fixture_pdf() -> String {
    let app = axum::Router::new().route(
        "/invoice.pdf",
        axum::routing::get(|| async { b"%PDF-1.4 fixture invoice".to_vec() }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/invoice.pdf")
}

fn fixture_layout() -> LayoutPayload {
    LayoutPayload {
        model_id: Some("prebuilt-layout".into()),
        content: "ACME Parts\nINVOICE 4411\nSubtotal $20.00\nInvoice Total $21.60".into(),
        pages: 1,
        documents: 1,
        tables: Vec::new(),
        key_values: vec![
            KeyValuePair {
                key: "Subtotal".into(),
                value: "$20.00".into(),
            },
            KeyValuePair {
                key: "Invoice Total".into(),
                value: "$21.60".into(),
            },
        ],
    }
}

fn record_json(grand_total: f64, categories: &[&str]) -> String {
    serde_json::json!({
        "header": {
            "vendor_name": "ACME Parts",
            "invoice_number": "4411",
            "currency": "USD"
        },
        "totals": {
            "subtotal": 20.00,
            "tax": 1.60,
            "grand_total": grand_total
        },
        "line_items": [{
            "line_number": 1,
            "part_number": "abc-123",
            "description": "Front brake pad set",
            "brand": "ACME Parts",
            "quantity": 2.0,
            "unit_price": 10.00,
            "line_discount": 0.0,
            "core_charge": 0.0,
            "line_total": 20.00,
            "categories": categories,
            "is_core": false
        }]
    })
    .to_string()
}

fn config_with(
    layout: Arc<dyn LayoutProvider>,
    extraction: Arc<dyn ExtractionProvider>,
) -> ProcessingConfig {
    ProcessingConfig::builder()
        .layout_provider(layout)
        .extraction_provider(extraction)
        .build()
        .unwrap()
}

fn request_for(url: String) -> ProcessRequest {
    ProcessRequest {
        document_url: url,
        shop_id: Some("shop-42".into()),
        invoice_id: Some("4411".into()),
        ..Default::default()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn agreeing_passes_produce_high_confidence_envelope() {
    let url = serve_fixture_pdf().await;
    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: record_json(21.60, &["Brakes"]),
        // The document pass wraps its output in fences; the normalizer strips them.
        document_response: format!("```json\n{}\n```", record_json(21.60, &["Brakes"])),
    });
    let config = config_with(layout, extraction);

    let output = process(&request_for(url.clone()), &config).await.unwrap();

    // Reconciled record
    assert_eq!(output.final_result.confidence, Confidence::High);
    assert!(output.final_result.warnings.is_empty());
    assert!(output.final_result.fields_needing_review.is_empty());
    assert_eq!(output.final_result.record.totals.grand_total, Some(21.60));
    assert_eq!(output.final_result.record.line_items[0].line_total, Some(20.00));

    // Both raw candidates echoed
    assert_eq!(output.pass_a.header.invoice_number.as_deref(), Some("4411"));
    assert_eq!(output.pass_b.header.invoice_number.as_deref(), Some("4411"));

    // Layout summary and source echo
    assert_eq!(output.layout.pages, 1);
    assert_eq!(output.layout.model_id.as_deref(), Some("prebuilt-layout"));
    assert_eq!(output.source.document_url, url);
    assert_eq!(output.source.invoice_hint.as_deref(), Some("4411"));

    // No embedding provider: enrichment reported off
    assert!(!output.embedding.enabled);
    assert_eq!(output.embedding.count, 0);

    // Projection
    assert_eq!(output.db_ready.repair_order.ro_number.as_deref(), Some("4411"));
    assert_eq!(output.db_ready.repair_order.total_spend, Some(21.60));
    assert_eq!(output.db_ready.repair_order.shop_id.as_deref(), Some("shop-42"));
    let line = &output.db_ready.line_items[0];
    assert_eq!(line.clean_part_number.as_deref(), Some("ABC123"));
    assert_eq!(line.line_code.as_deref(), Some("ACM"));
    assert_eq!(line.category.as_deref(), Some("Brakes"));
}

#[tokio::test]
async fn grand_total_disagreement_resolved_by_layout_anchor() {
    let url = serve_fixture_pdf().await;
    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(), // anchors Invoice Total at $21.60
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: record_json(21.60, &["Brakes"]),
        document_response: record_json(71.60, &["Brakes"]),
    });
    let config = config_with(layout, extraction);

    let output = process(&request_for(url), &config).await.unwrap();

    assert_eq!(output.final_result.record.totals.grand_total, Some(21.60));
    assert!(output
        .final_result
        .fields_needing_review
        .contains(&"totals.grand_total".to_string()));
    assert_ne!(output.final_result.confidence, Confidence::High);
}

#[tokio::test]
async fn unknown_category_never_reaches_the_final_record() {
    let url = serve_fixture_pdf().await;
    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: record_json(21.60, &["Brakes", "Upholstery"]),
        document_response: record_json(21.60, &["Brakes"]),
    });
    let config = config_with(layout, extraction);

    let output = process(&request_for(url), &config).await.unwrap();

    let categories = &output.final_result.record.line_items[0].categories;
    assert_eq!(categories, &vec!["Brakes".to_string()]);
    assert_eq!(
        output.db_ready.line_items[0].category.as_deref(),
        Some("Brakes")
    );
}

#[tokio::test]
async fn missing_document_url_rejected_before_any_collaborator() {
    let calls = Arc::new(AtomicUsize::new(0));
    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(),
        calls: Arc::clone(&calls),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: String::new(),
        document_response: String::new(),
    });
    let config = config_with(layout, extraction);

    let request = ProcessRequest::default();
    let err = process(&request, &config).await.unwrap_err();

    assert!(matches!(err, ProcessError::InvalidRequest { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "layout must not be invoked");
}

#[tokio::test]
async fn embeddings_attach_to_lines_and_projection() {
    let url = serve_fixture_pdf().await;
    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: record_json(21.60, &["Brakes"]),
        document_response: record_json(21.60, &["Brakes"]),
    });
    let config = ProcessingConfig::builder()
        .layout_provider(layout)
        .extraction_provider(extraction)
        .embedding_provider(Arc::new(StubEmbedding))
        .build()
        .unwrap();

    let output = process(&request_for(url), &config).await.unwrap();

    assert!(output.embedding.enabled);
    assert_eq!(output.embedding.count, 1);
    assert_eq!(output.embedding.deployment.as_deref(), Some("text-embed-stub"));
    assert_eq!(
        output.final_result.record.line_items[0].embedding,
        Some(vec![0.25, 0.5, 0.75])
    );
    assert_eq!(
        output.db_ready.line_items[0].embedding,
        Some(vec![0.25, 0.5, 0.75])
    );
}

#[tokio::test]
async fn malformed_document_pass_output_is_tagged() {
    let url = serve_fixture_pdf().await;
    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: record_json(21.60, &["Brakes"]),
        document_response: "I could not find an invoice in this document.".into(),
    });
    let config = config_with(layout, extraction);

    let err = process(&request_for(url), &config).await.unwrap_err();
    match err {
        ProcessError::MalformedExtraction { pass, .. } => {
            assert_eq!(pass, ExtractionPass::Document)
        }
        other => panic!("expected MalformedExtraction, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_document_is_caller_fault() {
    // Nothing listens on this port.
    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: String::new(),
        document_response: String::new(),
    });
    let config = config_with(layout, extraction);

    let request = ProcessRequest {
        document_url: "http://127.0.0.1:9/unreachable.pdf".into(),
        ..Default::default()
    };
    let err = process(&request, &config).await.unwrap_err();
    assert!(err.is_caller_fault(), "got {err:?}");
}

#[tokio::test]
async fn non_pdf_content_is_rejected() {
    let app = axum::Router::new().route(
        "/not-a-pdf",
        axum::routing::get(|| async { b"<html>hello</html>".to_vec() }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let layout: Arc<dyn LayoutProvider> = Arc::new(StubLayout {
        payload: fixture_layout(),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let extraction: Arc<dyn ExtractionProvider> = Arc::new(StubExtraction {
        layout_response: String::new(),
        document_response: String::new(),
    });
    let config = config_with(layout, extraction);

    let request = ProcessRequest {
        document_url: format!("http://{addr}/not-a-pdf"),
        ..Default::default()
    };
    let err = process(&request, &config).await.unwrap_err();
    assert!(matches!(err, ProcessError::NotAPdf { .. }));
}
