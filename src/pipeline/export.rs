//! PDF export: print assembled workbook HTML through a headless browser.
//!
//! ## Why wait for network idle?
//!
//! The document pulls Tailwind from a CDN and Tailwind generates its styles
//! at runtime. Printing on the `load` event can catch the page before those
//! styles exist, so we wait for Chrome's `networkIdle` lifecycle event. The
//! wait is bounded; if the network never settles we print what we have.
//!
//! Only the event carrying our navigation's loader id counts. The blank
//! page the tab opens on, and any iframe in page code, report their own
//! `networkIdle` on the same stream.
//!
//! ## Lifetime
//!
//! One browser per export. It is launched, used and closed inside
//! [`ChromiumExporter::export`]; the close runs whatever the outcome.

use crate::error::WorkbookError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, PrintToPdfParams,
};
use futures::future::BoxFuture;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A4 in inches, the unit Chrome's print API takes.
pub const A4_WIDTH_IN: f64 = 8.27;
pub const A4_HEIGHT_IN: f64 = 11.69;
/// Margin on all four sides, in inches.
pub const MARGIN_IN: f64 = 1.0;

/// Something that turns an HTML document into PDF bytes.
///
/// The production implementation is [`ChromiumExporter`]; tests substitute
/// recorders that capture the HTML.
pub trait PdfExporter: Send + Sync {
    fn export(&self, html: String) -> BoxFuture<'static, Result<Vec<u8>, WorkbookError>>;
}

/// Print parameters used for every export.
pub fn print_params() -> PrintToPdfParams {
    PrintToPdfParams {
        print_background: Some(true),
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        margin_top: Some(MARGIN_IN),
        margin_bottom: Some(MARGIN_IN),
        margin_left: Some(MARGIN_IN),
        margin_right: Some(MARGIN_IN),
        ..Default::default()
    }
}

/// [`PdfExporter`] that drives Chrome/Chromium over CDP.
#[derive(Debug, Clone)]
pub struct ChromiumExporter {
    executable: Option<PathBuf>,
    network_idle_timeout: Duration,
}

impl ChromiumExporter {
    pub fn new(executable: Option<PathBuf>, network_idle_timeout_secs: u64) -> Self {
        Self {
            executable,
            network_idle_timeout: Duration::from_secs(network_idle_timeout_secs),
        }
    }
}

impl PdfExporter for ChromiumExporter {
    fn export(&self, html: String) -> BoxFuture<'static, Result<Vec<u8>, WorkbookError>> {
        let this = self.clone();
        Box::pin(async move { this.export_html(html).await })
    }
}

impl ChromiumExporter {
    async fn export_html(&self, html: String) -> Result<Vec<u8>, WorkbookError> {
        let start = Instant::now();

        // Chrome loads the document from disk; `tmp` lives until we return.
        let mut tmp = tempfile::Builder::new()
            .suffix(".html")
            .tempfile()
            .map_err(|e| WorkbookError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(html.as_bytes())
            .map_err(|e| WorkbookError::Internal(format!("tempfile write: {e}")))?;
        let url = format!("file://{}", tmp.path().display());

        let mut builder = BrowserConfig::builder();
        if let Some(ref exe) = self.executable {
            builder = builder.chrome_executable(exe);
        }
        let browser_config = builder.build().map_err(export_error)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| export_error(format!("browser launch failed: {e}")))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("Browser launched in {:?}", start.elapsed());

        let result = self.print(&browser, &url).await;

        if let Err(e) = browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Browser did not exit cleanly: {}", e);
        }
        handler_task.abort();

        let pdf = result?;
        info!(
            "Exported {} bytes of HTML → {} bytes of PDF in {:?}",
            html.len(),
            pdf.len(),
            start.elapsed()
        );
        Ok(pdf)
    }

    async fn print(&self, browser: &Browser, url: &str) -> Result<Vec<u8>, WorkbookError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| export_error(format!("could not open page: {e}")))?;

        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| export_error(format!("could not subscribe to lifecycle events: {e}")))?;

        let navigation = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| export_error(format!("navigation failed: {e}")))?;
        if let Some(ref text) = navigation.result.error_text {
            return Err(export_error(format!("navigation failed: {text}")));
        }
        let loader_id: Option<String> = navigation
            .result
            .loader_id
            .as_ref()
            .map(|id| AsRef::<str>::as_ref(id).to_string());

        let idle = tokio::time::timeout(self.network_idle_timeout, async {
            while let Some(event) = lifecycle.next().await {
                let event_loader = AsRef::<str>::as_ref(&event.loader_id);
                if settles_navigation(&event.name, event_loader, loader_id.as_deref()) {
                    return true;
                }
            }
            false
        })
        .await;
        match idle {
            Ok(true) => debug!("Network idle reached"),
            Ok(false) => warn!("Lifecycle stream ended before network idle"),
            Err(_) => warn!(
                "Network not idle after {:?}; printing anyway",
                self.network_idle_timeout
            ),
        }

        page.pdf(print_params())
            .await
            .map_err(|e| export_error(format!("printing failed: {e}")))
    }
}

/// Whether a lifecycle event marks network quiescence for our navigation.
///
/// A same-document navigation reports no loader id; then any `networkIdle`
/// is accepted.
fn settles_navigation(name: &str, event_loader: &str, navigation_loader: Option<&str>) -> bool {
    name == "networkIdle" && navigation_loader.map_or(true, |id| id == event_loader)
}

fn export_error(detail: impl Into<String>) -> WorkbookError {
    WorkbookError::ExportFailed {
        detail: detail.into(),
    }
}
