//! Workbook HTML assembly for the print path.
//!
//! Pages are stacked in one document, each in its own block; every block but
//! the first forces a page break so the browser starts each workbook page on
//! a fresh sheet. The Tailwind CDN script is loaded by reference, which is
//! why [`crate::pipeline::export`] waits for network idle before printing.
//!
//! Page code is embedded **verbatim**. LLM-authored or client-supplied markup
//! can therefore alter the surrounding document (scripts, styles, closing
//! tags). That injection surface is accepted: the output is only ever loaded
//! into a throwaway browser page whose sole job is to print it.

use crate::model::{BrandKit, WorkbookPage};
use crate::pipeline::brand::render_css;

/// The style directive inserted before every page except the first.
pub const PAGE_BREAK: &str = "page-break-before: always;";

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// Assemble the printable HTML document. Pure and deterministic.
pub fn render_html(pages: &[WorkbookPage], brand: &BrandKit) -> String {
    let brand_css = render_css(brand);

    let mut pages_html = String::new();
    for (i, page) in pages.iter().enumerate() {
        let page_break = if i > 0 { PAGE_BREAK } else { "" };
        pages_html.push_str(&format!(
            r#"
<div style="{page_break} min-height: 100vh; padding: 2rem;">
    <div class="page-content">
        {}
    </div>
</div>
"#,
            page.code
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <script src="{TAILWIND_CDN}"></script>
    <style>
        {brand_css}
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            font-family: var(--font-primary);
            color: var(--color-text, #1f2937);
            background-color: var(--color-background, #ffffff);
        }}
        @media print {{
            body {{
                -webkit-print-color-adjust: exact !important;
                print-color-adjust: exact !important;
            }}
        }}
    </style>
</head>
<body>
{pages_html}
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(n: usize) -> Vec<WorkbookPage> {
        (0..n)
            .map(|i| WorkbookPage {
                index: i,
                title: format!("P{i}"),
                code: format!("<section>page {i}</section>"),
            })
            .collect()
    }

    #[test]
    fn n_pages_have_n_minus_one_breaks() {
        for n in 0..5 {
            let html = render_html(&pages(n), &BrandKit::default());
            assert_eq!(html.matches(PAGE_BREAK).count(), n.saturating_sub(1), "n={n}");
        }
    }

    #[test]
    fn no_break_before_first_page() {
        let html = render_html(&pages(3), &BrandKit::default());
        let first = html.find("<section>page 0</section>").unwrap();
        assert!(!html[..first].contains(PAGE_BREAK));
    }

    #[test]
    fn break_follows_iteration_order_not_index_field() {
        let mut ps = pages(2);
        ps[0].index = 7;
        ps[1].index = 0;
        let html = render_html(&ps, &BrandKit::default());
        let first = html.find("<section>page 0</section>").unwrap();
        assert!(!html[..first].contains(PAGE_BREAK));
        assert_eq!(html.matches(PAGE_BREAK).count(), 1);
    }

    #[test]
    fn deterministic() {
        let kit = BrandKit {
            accent_color: Some("#abcdef".into()),
            ..Default::default()
        };
        assert_eq!(render_html(&pages(3), &kit), render_html(&pages(3), &kit));
    }

    #[test]
    fn code_is_embedded_verbatim() {
        let ps = vec![WorkbookPage {
            index: 0,
            title: "raw".into(),
            code: r#"<script>alert("x")</script><b>&amp;</b>"#.into(),
        }];
        let html = render_html(&ps, &BrandKit::default());
        assert!(html.contains(r#"<script>alert("x")</script><b>&amp;</b>"#));
    }

    #[test]
    fn document_loads_tailwind_and_print_rules() {
        let html = render_html(&pages(1), &BrandKit::default());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<script src="https://cdn.tailwindcss.com"></script>"#));
        assert!(html.contains("@media print"));
        assert!(html.contains("print-color-adjust: exact !important;"));
        assert!(html.contains("--font-primary: 'Inter', sans-serif;"));
    }
}
