//! HTML to PDF via a headless Chromium instance.
//!
//! ## Why a browser
//!
//! The contract template is real CSS (flex signature rows, fixed table
//! layout, embedded CJK fonts) and the output has to match what a human
//! sees when previewing the HTML. A browser print engine is the only
//! renderer that honors all of that; pure-Rust HTML layouters do not.
//!
//! The `headless_chrome` API is synchronous, so the actual render runs in
//! [`tokio::task::spawn_blocking`], keeping the async executor free. Each
//! call launches a fresh browser: slower than pooling, but the process tree
//! is torn down unconditionally on drop and one bad render cannot poison
//! the next.

use crate::error::ContractError;
use async_trait::async_trait;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use std::time::Duration;
use tracing::debug;

/// A4 portrait in inches, as the print API wants it.
const PAGE_WIDTH_IN: f64 = 8.27;
const PAGE_HEIGHT_IN: f64 = 11.69;
/// 12mm page margins on all sides.
const MARGIN_IN: f64 = 0.47;

const NAV_TIMEOUT: Duration = Duration::from_secs(60);

/// Rendering backend seam. The production implementation drives Chromium;
/// tests substitute a fake that captures the HTML.
#[async_trait]
pub trait HtmlRenderer: Send + Sync {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, ContractError>;
}

/// Production renderer backed by headless Chromium.
pub struct ChromiumRenderer {
    settle_ms: u64,
}

impl ChromiumRenderer {
    /// `settle_ms` is an extra pause after fonts report ready, covering
    /// layout of the multi-megabyte embedded faces.
    pub fn new(settle_ms: u64) -> Self {
        Self { settle_ms }
    }
}

#[async_trait]
impl HtmlRenderer for ChromiumRenderer {
    async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, ContractError> {
        let html = html.to_string();
        let settle_ms = self.settle_ms;

        tokio::task::spawn_blocking(move || render_blocking(&html, settle_ms))
            .await
            .map_err(|e| ContractError::Render(format!("render task panicked: {e}")))?
    }
}

fn render_blocking(html: &str, settle_ms: u64) -> Result<Vec<u8>, ContractError> {
    // Data URLs inside the document can push it past command-line limits,
    // so the page is staged on disk and navigated to as a file URL.
    let dir = tempfile::tempdir().map_err(|e| ContractError::Render(format!("tempdir: {e}")))?;
    let page_path = dir.path().join("index.html");
    std::fs::write(&page_path, html)
        .map_err(|e| ContractError::Render(format!("stage page: {e}")))?;
    let url = format!("file://{}", page_path.display());

    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .idle_browser_timeout(NAV_TIMEOUT)
        .build()
        .map_err(|e| ContractError::Render(format!("launch options: {e}")))?;

    // Browser and its process tree are killed when `browser` drops.
    let browser = Browser::new(options)
        .map_err(|e| ContractError::Render(format!("launch browser: {e}")))?;

    let tab = browser
        .new_tab()
        .map_err(|e| ContractError::Render(format!("open tab: {e}")))?;
    tab.set_default_timeout(NAV_TIMEOUT);

    tab.navigate_to(&url)
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| ContractError::Render(format!("load page: {e}")))?;

    // Without this wait the CJK text renders as blank boxes.
    tab.evaluate(
        "(async () => { if (document.fonts && document.fonts.ready) { await document.fonts.ready; } })()",
        true,
    )
    .map_err(|e| ContractError::Render(format!("await fonts: {e}")))?;
    std::thread::sleep(Duration::from_millis(settle_ms));

    let pdf = tab
        .print_to_pdf(Some(PrintToPdfOptions {
            print_background: Some(true),
            paper_width: Some(PAGE_WIDTH_IN),
            paper_height: Some(PAGE_HEIGHT_IN),
            margin_top: Some(MARGIN_IN),
            margin_bottom: Some(MARGIN_IN),
            margin_left: Some(MARGIN_IN),
            margin_right: Some(MARGIN_IN),
            ..Default::default()
        }))
        .map_err(|e| ContractError::Render(format!("print to pdf: {e}")))?;

    debug!(bytes = pdf.len(), "pdf rendered");
    Ok(pdf)
}
