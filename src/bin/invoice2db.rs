//! CLI binary for invoice2db.
//!
//! A thin shim over the library crate: resolves providers from the
//! environment, maps CLI flags to `ProcessingConfig`, and either serves the
//! HTTP surface or processes a single document and prints the JSON envelope.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use invoice2db::{providers, ProcessRequest, ProcessingConfig, ProcessingConfigBuilder};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "invoice2db",
    version,
    about = "Extract, reconcile, and categorize vendor invoices into database-ready records"
)]
struct Cli {
    /// Absolute tolerance for line-total cross-checks, in currency units.
    #[arg(long, env = "INVOICE2DB_LINE_TOLERANCE", default_value_t = 0.01)]
    line_tolerance: f64,

    /// Absolute tolerance for invoice-total cross-checks, in currency units.
    #[arg(long, env = "INVOICE2DB_TOTALS_TOLERANCE", default_value_t = 0.01)]
    totals_tolerance: f64,

    /// Totals disagreement above this caps confidence at "low".
    #[arg(long, env = "INVOICE2DB_MAJOR_MISMATCH", default_value_t = 1.00)]
    major_mismatch_threshold: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to bind.
        #[arg(long, env = "INVOICE2DB_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Process a single document and print the JSON response envelope.
    Process {
        /// HTTP/HTTPS URL of the invoice PDF.
        url: String,

        #[arg(long)]
        shop_id: Option<String>,

        #[arg(long)]
        invoice_id: Option<String>,

        #[arg(long)]
        po_number: Option<String>,

        #[arg(long)]
        vendor_hint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(build_config(&cli)?);

    match cli.command {
        Command::Serve { bind } => {
            let app = invoice2db::server::router(Arc::clone(&config));
            info!("Listening on {}", bind);
            info!("  POST /invoices/process");
            info!("  GET  /health");
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            axum::serve(listener, app).await?;
        }
        Command::Process {
            url,
            shop_id,
            invoice_id,
            po_number,
            vendor_hint,
        } => {
            let request = ProcessRequest {
                document_url: url,
                shop_id,
                invoice_id,
                po_number,
                vendor_hint,
            };
            let output = invoice2db::process(&request, &config)
                .await
                .context("processing failed")?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<ProcessingConfig> {
    let providers = providers::resolve_from_env().context("provider configuration")?;

    let mut builder: ProcessingConfigBuilder = ProcessingConfig::builder()
        .layout_provider(providers.layout)
        .extraction_provider(providers.extraction)
        .line_tolerance(cli.line_tolerance)
        .totals_tolerance(cli.totals_tolerance)
        .major_mismatch_threshold(cli.major_mismatch_threshold);

    if let Some(embedding) = providers.embedding {
        builder = builder.embedding_provider(embedding);
    }

    // Static shared-secret gate, supplied out-of-band.
    if let (Ok(name), Ok(value)) = (
        std::env::var("EXPECT_HEADER_NAME"),
        std::env::var("EXPECT_HEADER_VALUE"),
    ) {
        if !name.is_empty() && !value.is_empty() {
            builder = builder.expected_header(name, value);
        }
    }

    Ok(builder.build()?)
}
