//! HTTP server binary for workbook-forge.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServerConfig`, resolves the LLM provider once and serves the
//! router until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use workbook_forge::pipeline::export::ChromiumExporter;
use workbook_forge::pipeline::llm::ProviderSession;
use workbook_forge::pipeline::sandbox::{HttpSandbox, SandboxBackend};
use workbook_forge::{resolve_provider, router, AppState, ServerConfig};

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (0.0.0.0:8000)
  workbook-server

  # Use a specific model
  workbook-server --provider anthropic --model claude-sonnet-4-20250514

  # Allow a deployed frontend and enable code execution
  workbook-server --cors-origins https://app.example.com \
      --sandbox-url https://sandbox.example.com --sandbox-api-key ...

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  SANDBOX_API_KEY         Code sandbox credential (E2B_API_KEY also accepted)
  RUST_LOG                Log filter, overrides --verbose / --quiet

EXTERNAL TOOLS:
  tesseract               OCR for image uploads (--tesseract-bin)
  chrome / chromium       PDF export (--browser), auto-detected if omitted
"#;

/// Serve the workbook API.
#[derive(Parser, Debug)]
#[command(
    name = "workbook-server",
    version,
    about = "Generate, edit and print LLM-designed workbooks over HTTP",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "WORKBOOK_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Comma-separated CORS origins. Default: the local dev servers.
    #[arg(long, env = "WORKBOOK_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "WORKBOOK_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0). Provider default if omitted.
    #[arg(long, env = "WORKBOOK_TEMPERATURE")]
    temperature: Option<f32>,

    /// Characters of extracted text embedded in the generate prompt.
    #[arg(long, env = "WORKBOOK_TEXT_PREFIX", default_value_t = 5000)]
    text_prefix: usize,

    /// Maximum request body size in bytes.
    #[arg(long, env = "WORKBOOK_MAX_UPLOAD", default_value_t = 20 * 1024 * 1024)]
    max_upload: usize,

    /// Tesseract binary used for image OCR.
    #[arg(long, env = "WORKBOOK_TESSERACT", default_value = "tesseract")]
    tesseract_bin: PathBuf,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    #[arg(long, env = "WORKBOOK_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Chrome/Chromium executable for PDF export.
    #[arg(long, env = "WORKBOOK_BROWSER")]
    browser: Option<PathBuf>,

    /// Seconds to wait for network idle before printing.
    #[arg(long, env = "WORKBOOK_NETWORK_IDLE_TIMEOUT", default_value_t = 30)]
    network_idle_timeout: u64,

    /// Remote code sandbox credential.
    #[arg(long, env = "SANDBOX_API_KEY", hide_env_values = true)]
    sandbox_api_key: Option<String>,

    /// Remote code sandbox base URL.
    #[arg(long, env = "SANDBOX_URL")]
    sandbox_url: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WORKBOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WORKBOOK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    info!("{:?}", config);

    // ── Collaborators ────────────────────────────────────────────────────
    let provider = resolve_provider(&config).context("Failed to initialise LLM provider")?;
    info!(
        "LLM provider ready (provider={}, model={})",
        config.provider_name.as_deref().unwrap_or("auto"),
        config.model.as_deref().unwrap_or("default")
    );

    let session = Arc::new(ProviderSession::new(provider, &config));
    let exporter = Arc::new(ChromiumExporter::new(
        config.browser_executable.clone(),
        config.network_idle_timeout_secs,
    ));
    let sandbox = HttpSandbox::from_config(&config)
        .context("Failed to set up sandbox backend")?
        .map(|s| Arc::new(s) as Arc<dyn SandboxBackend>);
    if config.sandbox_configured() && sandbox.is_none() {
        info!("Sandbox key set but no sandbox URL; code execution stays disabled");
    }

    let bind_addr = config.bind_addr;
    let state = AppState {
        config: Arc::new(config),
        session,
        exporter,
        sandbox,
    };

    // ── Serve ────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested, draining connections");
    }
}

fn build_config(cli: &Cli) -> Result<ServerConfig> {
    let mut builder = ServerConfig::builder()
        .bind_addr(cli.bind)
        .max_tokens(cli.max_tokens)
        .text_prefix_chars(cli.text_prefix)
        .max_upload_bytes(cli.max_upload)
        .tesseract_bin(&cli.tesseract_bin)
        .ocr_language(&cli.ocr_lang)
        .network_idle_timeout_secs(cli.network_idle_timeout);

    if !cli.cors_origins.is_empty() {
        builder = builder.cors_origins(cli.cors_origins.iter().map(|o| o.trim()));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(ref browser) = cli.browser {
        builder = builder.browser_executable(browser);
    }

    let sandbox_key = cli
        .sandbox_api_key
        .clone()
        .or_else(|| std::env::var("E2B_API_KEY").ok());
    if let Some(key) = sandbox_key {
        builder = builder.sandbox_api_key(key);
    }
    if let Some(ref url) = cli.sandbox_url {
        builder = builder.sandbox_url(url);
    }

    builder.build().context("Invalid server configuration")
}
