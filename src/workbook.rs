//! Request-level workbook operations.
//!
//! Each function here is one endpoint's worth of work with the HTTP layer
//! peeled off: it takes already-decoded input, drives the pipeline stages in
//! order and returns the value the endpoint serialises. All steps within one
//! call run sequentially; nothing is retried.

use crate::config::ServerConfig;
use crate::error::WorkbookError;
use crate::model::{BrandKit, WorkbookPage};
use crate::pipeline::export::PdfExporter;
use crate::pipeline::llm::{run_prompt, LlmSession};
use crate::pipeline::postprocess::{parse_with_fallback, JsonFallback};
use crate::pipeline::{extract, html};
use crate::prompts;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Generate a workbook from an uploaded document.
///
/// # Errors
/// - [`WorkbookError::UnsupportedFileType`] / [`WorkbookError::ExtractionFailed`]
///   when the upload cannot be read
/// - [`WorkbookError::PromptFailed`] when the LLM session fails
/// - [`WorkbookError::GenerationFailed`] when the answer holds no parsable JSON
pub async fn generate(
    session: &dyn LlmSession,
    config: &ServerConfig,
    bytes: &[u8],
    filename: &str,
) -> Result<Value, WorkbookError> {
    let total_start = Instant::now();
    let extension = extract::extension_of(filename);
    info!("Generating workbook from '{}' ({} bytes)", filename, bytes.len());

    // ── Step 1: Extract text ─────────────────────────────────────────────
    let text = extract::extract(bytes, &extension, &config.ocr).await?;

    // ── Step 2: Bounded prefix into the prompt ───────────────────────────
    let prefix = extract::truncate_chars(&text, config.text_prefix_chars);
    debug!(
        "Embedding {} of {} chars in the prompt",
        prefix.chars().count(),
        text.chars().count()
    );

    // ── Step 3: Single-turn LLM call ─────────────────────────────────────
    let answer = run_prompt(
        session,
        prompts::generate_prompt(prefix),
        prompts::GENERATE_SYSTEM_PROMPT,
    )
    .await?;

    // ── Step 4: JSON out of the answer ───────────────────────────────────
    let workbook = parse_with_fallback(&answer, JsonFallback::Fail)?;

    let page_count = page_count(&workbook);
    info!(
        "Workbook generated: {} pages, {}ms total",
        page_count,
        total_start.elapsed().as_millis()
    );
    Ok(workbook)
}

/// Number of entries in a generated workbook's `pages` array (0 if absent).
fn page_count(workbook: &Value) -> usize {
    workbook
        .get("pages")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Rewrite one page's code per `instruction`.
///
/// Returns `{"code": <answer>}` with the answer untouched: no parsing, no
/// check that it is valid markup.
pub async fn rewrite_page(
    session: &dyn LlmSession,
    page_index: usize,
    code: &str,
    instruction: &str,
) -> Result<Value, WorkbookError> {
    info!("Rewriting page {}", page_index);
    let answer = run_prompt(
        session,
        prompts::rewrite_page_prompt(code, instruction),
        prompts::REWRITE_PAGE_SYSTEM_PROMPT,
    )
    .await?;
    Ok(json!({ "code": answer }))
}

/// Apply `instruction` across the whole workbook.
///
/// Returns the JSON object from the answer, or `{"changes": <answer>}` when
/// the answer has none.
pub async fn rewrite_global(
    session: &dyn LlmSession,
    code: &str,
    instruction: &str,
) -> Result<Value, WorkbookError> {
    info!("Applying global instruction to {} bytes of workbook code", code.len());
    let answer = run_prompt(
        session,
        prompts::rewrite_global_prompt(code, instruction),
        prompts::REWRITE_GLOBAL_SYSTEM_PROMPT,
    )
    .await?;
    parse_with_fallback(&answer, JsonFallback::RawText("changes"))
}

/// Render `pages` with `brand` and print them to PDF.
pub async fn export_pdf(
    exporter: &dyn PdfExporter,
    pages: &[WorkbookPage],
    brand: &BrandKit,
) -> Result<Vec<u8>, WorkbookError> {
    info!("Exporting {} pages to PDF", pages.len());
    let document = html::render_html(pages, brand);
    exporter.export(document).await
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Model used when a provider is picked without an explicit model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// The configured model, or [`DEFAULT_MODEL`].
fn model_or_default(config: &ServerConfig) -> &str {
    config.model.as_deref().unwrap_or(DEFAULT_MODEL)
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, WorkbookError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        WorkbookError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// Workbook prompts are plain text, so any chat-capable provider will do;
/// the chain only decides whose credentials win when several are present.
/// Models default to [`DEFAULT_MODEL`], which is large enough to emit a
/// multi-page workbook in one answer.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Only the server binary calls this, once, at startup.
pub fn resolve_provider(config: &ServerConfig) -> Result<Arc<dyn LLMProvider>, WorkbookError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model_or_default(config));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model_or_default(config));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| WorkbookError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider / --model\n\
                to the workbook server.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{MessageStream, SessionMessage, SessionRequest};
    use futures::future::BoxFuture;
    use futures::stream;
    use std::sync::Mutex;

    /// Answers every query with `answer`, remembering the last request.
    struct Echo {
        answer: String,
        last: Mutex<Option<SessionRequest>>,
    }

    impl Echo {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                last: Mutex::new(None),
            }
        }

        fn last_prompt(&self) -> String {
            self.last.lock().unwrap().as_ref().unwrap().prompt.clone()
        }
    }

    impl LlmSession for Echo {
        fn query(&self, request: SessionRequest) -> MessageStream {
            *self.last.lock().unwrap() = Some(request);
            let msg = SessionMessage::assistant_text(self.answer.clone());
            Box::pin(stream::iter(vec![Ok(msg)]))
        }
    }

    struct Recorder(Mutex<Option<String>>);

    impl PdfExporter for Recorder {
        fn export(&self, html: String) -> BoxFuture<'static, Result<Vec<u8>, WorkbookError>> {
            *self.0.lock().unwrap() = Some(html);
            Box::pin(async { Ok(b"%PDF-1.4 stub".to_vec()) })
        }
    }

    #[tokio::test]
    async fn rewrite_page_returns_answer_verbatim() {
        let session = Echo::new("<div><b>A</b></div>");
        let v = rewrite_page(&session, 0, "<div>A</div>", "make bold").await.unwrap();
        assert_eq!(v, json!({"code": "<div><b>A</b></div>"}));
        let prompt = session.last_prompt();
        assert!(prompt.contains("<div>A</div>") && prompt.contains("make bold"));
    }

    #[tokio::test]
    async fn rewrite_page_does_not_parse_json_answers() {
        let session = Echo::new(r#"{"not": "parsed"}"#);
        let v = rewrite_page(&session, 3, "x", "y").await.unwrap();
        assert_eq!(v, json!({"code": r#"{"not": "parsed"}"#}));
    }

    #[tokio::test]
    async fn rewrite_global_parses_json() {
        let session = Echo::new("Sure!\n{\"pages\": {\"0\": \"<p/>\"}}");
        let v = rewrite_global(&session, "all code", "use blue").await.unwrap();
        assert_eq!(v, json!({"pages": {"0": "<p/>"}}));
    }

    #[tokio::test]
    async fn rewrite_global_falls_back_to_raw_text() {
        let session = Echo::new("I changed every heading to blue.");
        let v = rewrite_global(&session, "all code", "use blue").await.unwrap();
        assert_eq!(v, json!({"changes": "I changed every heading to blue."}));
    }

    #[test]
    fn page_count_reads_pages_array() {
        assert_eq!(page_count(&json!({"pages": [{}, {}, {}]})), 3);
        assert_eq!(page_count(&json!({"pages": "not a list"})), 0);
        assert_eq!(page_count(&json!({})), 0);
    }

    #[test]
    fn explicit_model_overrides_default() {
        assert_eq!(model_or_default(&ServerConfig::default()), DEFAULT_MODEL);
        let c = ServerConfig::builder().model("claude-sonnet-4-20250514").build().unwrap();
        assert_eq!(model_or_default(&c), "claude-sonnet-4-20250514");
    }

    #[tokio::test]
    async fn generate_rejects_unsupported_type_without_calling_llm() {
        let session = Echo::new("{}");
        let err = generate(&session, &ServerConfig::default(), b"hello", "notes.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbookError::UnsupportedFileType { .. }));
        assert!(session.last.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn export_renders_html_and_returns_exporter_bytes() {
        let exporter = Recorder(Mutex::new(None));
        let pages = vec![
            WorkbookPage {
                index: 0,
                title: "One".into(),
                code: "<h1>one</h1>".into(),
            },
            WorkbookPage {
                index: 1,
                title: "Two".into(),
                code: "<h1>two</h1>".into(),
            },
        ];
        let pdf = export_pdf(&exporter, &pages, &BrandKit::default()).await.unwrap();
        assert_eq!(pdf, b"%PDF-1.4 stub");
        let html = exporter.0.lock().unwrap().clone().unwrap();
        assert_eq!(html.matches(html::PAGE_BREAK).count(), 1);
        assert!(html.contains("<h1>one</h1>") && html.contains("<h1>two</h1>"));
    }
}
