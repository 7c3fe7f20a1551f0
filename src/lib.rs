//! # workbook-forge
//!
//! Turn an uploaded document into an editable, printable workbook.
//!
//! A user uploads a PDF or an image; its text is extracted and handed to an
//! LLM that designs a multi-page workbook, each page a self-contained block of
//! Tailwind-styled markup. Pages can then be rewritten one at a time or all at
//! once, themed with a brand kit and printed to PDF through headless Chrome.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (pdf / png / jpg)
//!  │
//!  ├─ 1. Extract   pdf text layer (spawn_blocking) or tesseract OCR
//!  ├─ 2. Prompt    first N chars embedded in the generate prompt
//!  ├─ 3. LLM       single-turn session, assistant text concatenated
//!  ├─ 4. JSON      first {...} region parsed into {pages:[...]}
//!  │
//!  │   ... client edits, rewrites, brands ...
//!  │
//!  ├─ 5. Render    pages + brand CSS → one HTML document
//!  └─ 6. Print     headless Chrome, network idle, A4 PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use workbook_forge::pipeline::export::ChromiumExporter;
//! use workbook_forge::pipeline::llm::ProviderSession;
//! use workbook_forge::{resolve_provider, router, AppState, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = ServerConfig::default();
//!     let provider = resolve_provider(&config)?;
//!     let state = AppState {
//!         session: Arc::new(ProviderSession::new(provider, &config)),
//!         exporter: Arc::new(ChromiumExporter::new(None, config.network_idle_timeout_secs)),
//!         sandbox: None,
//!         config: Arc::new(config),
//!     };
//!     let listener = tokio::net::TcpListener::bind(state.config.bind_addr).await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `workbook-server` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## External tools
//!
//! Image OCR needs the `tesseract` binary; PDF export needs Chrome or
//! Chromium. Both paths are configurable on [`ServerConfig`], and each is
//! only touched by the endpoint that needs it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod workbook;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrConfig, ServerConfig, ServerConfigBuilder};
pub use error::{SandboxError, WorkbookError};
pub use model::{
    BrandKit, BrandRequest, ExecuteCodeRequest, ExecutionResult, ExportPdfRequest,
    RewriteGlobalRequest, RewritePageRequest, WorkbookPage,
};
pub use server::{router, AppState};
pub use workbook::{export_pdf, generate, resolve_provider, rewrite_global, rewrite_page};
