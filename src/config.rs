//! Configuration types for the workbook service.
//!
//! Everything the HTTP surface and the pipeline need is carried by one
//! [`ServerConfig`], built once at startup via its [`ServerConfigBuilder`] and
//! handed to [`crate::server::router`]. Nothing below the binary reads the
//! process environment, so tests construct configs directly.

use crate::error::WorkbookError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Origins allowed by CORS when none are configured: the Vite and CRA dev servers.
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

/// Configuration for the workbook service.
///
/// # Example
/// ```rust
/// use workbook_forge::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .text_prefix_chars(2000)
///     .sandbox_api_key("e2b_...")
///     .build()
///     .unwrap();
/// assert_eq!(config.sandbox_timeout_secs, 30);
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to. Default: `0.0.0.0:8000`.
    pub bind_addr: SocketAddr,

    /// Origins allowed by CORS. Default: [`DEFAULT_CORS_ORIGINS`].
    pub cors_origins: Vec<String>,

    /// Number of characters of extracted text embedded in the generate
    /// prompt. Default: 5000.
    ///
    /// Long documents would otherwise blow through the context window; the
    /// first few thousand characters are enough to seed a workbook.
    pub text_prefix_chars: usize,

    /// Maximum accepted request body in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,

    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum tokens the LLM may generate per call. Default: 8192.
    ///
    /// A generated workbook carries component source for every page, which is
    /// far longer than a typical chat answer.
    pub max_tokens: usize,

    /// Sampling temperature. Default: None (provider default).
    pub temperature: Option<f32>,

    /// OCR engine settings for image uploads.
    pub ocr: OcrConfig,

    /// Chrome/Chromium binary used for PDF export. If None, auto-detected.
    pub browser_executable: Option<PathBuf>,

    /// Upper bound on the wait for network quiescence before printing. Default: 30.
    pub network_idle_timeout_secs: u64,

    /// Credential for the remote code sandbox. None disables execution.
    pub sandbox_api_key: Option<String>,

    /// Base URL of the remote sandbox API. None disables execution.
    pub sandbox_url: Option<String>,

    /// Execution timeout handed to the sandbox. Default: 30.
    pub sandbox_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            text_prefix_chars: 5000,
            max_upload_bytes: 20 * 1024 * 1024,
            model: None,
            provider_name: None,
            provider: None,
            max_tokens: 8192,
            temperature: None,
            ocr: OcrConfig::default(),
            browser_executable: None,
            network_idle_timeout_secs: 30,
            sandbox_api_key: None,
            sandbox_url: None,
            sandbox_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("cors_origins", &self.cors_origins)
            .field("text_prefix_chars", &self.text_prefix_chars)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("ocr", &self.ocr)
            .field("browser_executable", &self.browser_executable)
            .field("network_idle_timeout_secs", &self.network_idle_timeout_secs)
            .field(
                "sandbox_api_key",
                &self.sandbox_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("sandbox_url", &self.sandbox_url)
            .field("sandbox_timeout_secs", &self.sandbox_timeout_secs)
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether a sandbox credential is present (empty strings count as absent).
    pub fn sandbox_configured(&self) -> bool {
        self.sandbox_api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

/// OCR engine settings.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Path or name of the tesseract binary. Default: `tesseract`.
    pub tesseract_bin: PathBuf,
    /// Tesseract language code. Default: `eng`.
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: PathBuf::from("tesseract"),
            language: "eng".to_string(),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn cors_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cors_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn text_prefix_chars(mut self, n: usize) -> Self {
        self.config.text_prefix_chars = n.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn tesseract_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ocr.tesseract_bin = path.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.language = lang.into();
        self
    }

    pub fn browser_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser_executable = Some(path.into());
        self
    }

    pub fn network_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.config.network_idle_timeout_secs = secs;
        self
    }

    pub fn sandbox_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.sandbox_api_key = Some(key.into());
        self
    }

    pub fn sandbox_url(mut self, url: impl Into<String>) -> Self {
        self.config.sandbox_url = Some(url.into());
        self
    }

    pub fn sandbox_timeout_secs(mut self, secs: u64) -> Self {
        self.config.sandbox_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, WorkbookError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(WorkbookError::InvalidConfig(
                "max_upload_bytes must be > 0".into(),
            ));
        }
        if c.sandbox_timeout_secs == 0 {
            return Err(WorkbookError::InvalidConfig(
                "sandbox timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(origin) = c
            .cors_origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(WorkbookError::InvalidConfig(format!(
                "CORS origin '{origin}' must start with http:// or https://"
            )));
        }
        if let Some(url) = c.sandbox_url.as_deref() {
            if reqwest::Url::parse(url).is_err() {
                return Err(WorkbookError::InvalidConfig(format!(
                    "sandbox URL '{url}' is not a valid URL"
                )));
            }
        }
        Ok(self.config)
    }
}
