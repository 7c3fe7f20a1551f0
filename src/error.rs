//! Error types for the workbook-forge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`WorkbookError`] is **fatal for the request**. The operation cannot
//!   produce its result (unsupported upload, unreadable PDF, LLM transport
//!   failure, browser crash). Returned as `Err(WorkbookError)` from the
//!   operations in [`crate::workbook`] and mapped to an HTTP status by
//!   [`crate::server`].
//!
//! * [`SandboxError`] is **non-fatal**. Remote code execution failed. The
//!   execute endpoint never raises, so these are folded into an
//!   [`crate::model::ExecutionResult`] instead of being propagated.

use thiserror::Error;

/// All request-level errors returned by the workbook-forge library.
#[derive(Debug, Error)]
pub enum WorkbookError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded file's extension is not one we can extract text from.
    #[error("Unsupported file type '{extension}'\nSupported types: pdf, png, jpg, jpeg.")]
    UnsupportedFileType { extension: String },

    /// The multipart upload was malformed or had no `file` field.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Text extraction from a supported file type failed.
    #[error("Error extracting text from {kind}: {detail}")]
    ExtractionFailed { kind: &'static str, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM session or its transport failed.
    #[error("LLM session failed: {message}")]
    PromptFailed { message: String },

    /// The LLM answered, but the expected JSON object was absent or malformed.
    #[error("{detail}")]
    GenerationFailed { detail: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Browser launch, navigation or PDF printing failed.
    #[error("PDF export failed: {detail}")]
    ExportFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkbookError {
    /// Whether the failure was caused by the caller's input rather than by a
    /// collaborator. Client errors map to HTTP 400, everything else to 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            WorkbookError::UnsupportedFileType { .. }
                | WorkbookError::InvalidUpload(_)
                | WorkbookError::ExtractionFailed { .. }
        )
    }
}

/// A non-fatal failure of the remote code sandbox.
#[derive(Debug, Clone, Error)]
pub enum SandboxError {
    /// The HTTP client for the sandbox could not be constructed.
    #[error("Could not build sandbox HTTP client: {0}")]
    ClientBuild(String),

    /// Creating the remote sandbox session failed.
    #[error("Failed to open sandbox session: {0}")]
    SessionFailed(String),

    /// The sandbox accepted the session but running the code failed.
    #[error("Sandbox execution failed: {0}")]
    ExecutionFailed(String),

    /// The sandbox did not answer within the execution timeout.
    #[error("Sandbox execution timed out after {secs}s")]
    Timeout { secs: u64 },
}
