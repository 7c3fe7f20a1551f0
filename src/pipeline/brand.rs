//! Brand styling → CSS custom properties.
//!
//! Two renditions exist. [`brand_css`] serves `POST /api/brand` and
//! interpolates the five values verbatim. [`render_css`] feeds the PDF
//! render path: it applies the defaults from [`crate::model`] and wraps the
//! fonts in a quoted family with a `sans-serif` fallback. Neither validates
//! colour or font syntax.

use crate::model::{BrandKit, BrandRequest};

/// `:root` block for an explicit brand request.
pub fn brand_css(request: &BrandRequest) -> String {
    format!(
        r#"
:root {{
    --color-primary: {};
    --color-secondary: {};
    --color-accent: {};
    --font-primary: {};
    --font-secondary: {};
}}
"#,
        request.primary_color,
        request.secondary_color,
        request.accent_color,
        request.font_primary,
        request.font_secondary,
    )
}

/// `:root` block for a (possibly partial) brand kit, defaults applied.
pub fn render_css(kit: &BrandKit) -> String {
    format!(
        r#"
:root {{
    --color-primary: {};
    --color-secondary: {};
    --color-accent: {};
    --font-primary: '{}', sans-serif;
    --font-secondary: '{}', sans-serif;
}}
"#,
        kit.primary_color(),
        kit.secondary_color(),
        kit.accent_color(),
        kit.font_primary(),
        kit.font_secondary(),
    )
}
