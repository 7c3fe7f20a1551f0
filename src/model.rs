//! Data types exchanged with callers.
//!
//! The server keeps no copy of any of these once a response is sent; pages
//! and brand kits round-trip through the client between requests.

use serde::{Deserialize, Serialize};

/// Default brand colours and fonts, applied when a [`BrandKit`] field is missing.
pub const DEFAULT_PRIMARY_COLOR: &str = "#3b82f6";
pub const DEFAULT_SECONDARY_COLOR: &str = "#8b5cf6";
pub const DEFAULT_ACCENT_COLOR: &str = "#10b981";
pub const DEFAULT_FONT_PRIMARY: &str = "Inter";
pub const DEFAULT_FONT_SECONDARY: &str = "Roboto";

/// One page of a workbook: a title and the component markup that renders it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookPage {
    pub index: usize,
    pub title: String,
    pub code: String,
}

/// Brand styling as sent by the editor (camelCase, every field optional).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrandKit {
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub accent_color: Option<String>,
    pub font_primary: Option<String>,
    pub font_secondary: Option<String>,
    pub logo_url: Option<String>,
}

impl BrandKit {
    pub fn primary_color(&self) -> &str {
        self.primary_color.as_deref().unwrap_or(DEFAULT_PRIMARY_COLOR)
    }

    pub fn secondary_color(&self) -> &str {
        self.secondary_color
            .as_deref()
            .unwrap_or(DEFAULT_SECONDARY_COLOR)
    }

    pub fn accent_color(&self) -> &str {
        self.accent_color.as_deref().unwrap_or(DEFAULT_ACCENT_COLOR)
    }

    pub fn font_primary(&self) -> &str {
        self.font_primary.as_deref().unwrap_or(DEFAULT_FONT_PRIMARY)
    }

    pub fn font_secondary(&self) -> &str {
        self.font_secondary
            .as_deref()
            .unwrap_or(DEFAULT_FONT_SECONDARY)
    }
}

/// Body of `POST /api/brand` (snake_case, five required fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandRequest {
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub font_primary: String,
    pub font_secondary: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// Body of `POST /api/rewrite_page`.
#[derive(Debug, Clone, Deserialize)]
pub struct RewritePageRequest {
    pub page_index: usize,
    pub code: String,
    pub instruction: String,
}

/// Body of `POST /api/rewrite_global`.
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteGlobalRequest {
    pub code: String,
    pub instruction: String,
}

/// Body of `POST /api/export-pdf`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportPdfRequest {
    pub pages: Vec<WorkbookPage>,
    #[serde(rename = "brandKit", default)]
    pub brand_kit: BrandKit,
}

/// Body of `POST /api/execute-code`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteCodeRequest {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "javascript".to_string()
}

/// Outcome of a sandbox run. `success` is absent when the sandbox was never
/// reached (not configured / unavailable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
