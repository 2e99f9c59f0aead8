//! Headless browser capture behind a narrow capability trait.

use crate::rows::{ImageBytes, ViewportProfile};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptionsBuilder};
use std::error::Error;
use std::ffi::OsStr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task;
use url::Url;

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

/// Ensures a website URL carries a scheme, prefixing `https://` when absent.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(_) => raw.to_string(),
        Err(_) => format!("https://{raw}"),
    }
}

/// Capability that renders a URL under a viewport profile into a screenshot.
///
/// The concrete browser engine is external and swappable; a failed capture is
/// "no capture available" for that row, never fatal to the pipeline.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders `url` under `profile` and returns PNG screenshot bytes.
    async fn capture(&self, url: &str, profile: ViewportProfile)
        -> Result<ImageBytes, RenderError>;
}

/// Errors surfaced while capturing a page.
#[derive(Debug)]
pub enum RenderError {
    /// The browser process could not be launched.
    Launch(String),
    /// Navigation or the page-ready wait failed or timed out.
    Navigation(String),
    /// The screenshot itself could not be taken.
    Capture(String),
    /// The blocking capture worker was lost.
    Worker(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch(msg) => write!(f, "browser launch failed: {msg}"),
            Self::Navigation(msg) => write!(f, "navigation failed: {msg}"),
            Self::Capture(msg) => write!(f, "screenshot failed: {msg}"),
            Self::Worker(msg) => write!(f, "capture worker lost: {msg}"),
        }
    }
}

impl Error for RenderError {}

/// `Renderer` backed by a scoped headless Chrome instance per call.
///
/// Each capture launches its own browser and releases it when the call ends;
/// dropping the `Browser` kills the process on every exit path. A semaphore
/// caps simultaneous instances independently of row concurrency, since each
/// browser is resource-heavy.
pub struct ChromeRenderer {
    permits: Arc<Semaphore>,
    page_timeout: Duration,
}

impl ChromeRenderer {
    /// Builds a renderer allowing at most `max_browsers` concurrent instances,
    /// each waiting up to `page_timeout` for navigation and page readiness.
    pub fn new(max_browsers: usize, page_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_browsers.max(1))),
            page_timeout,
        }
    }

    fn capture_blocking(
        url: &str,
        profile: ViewportProfile,
        page_timeout: Duration,
    ) -> Result<ImageBytes, RenderError> {
        let (width, height) = profile.window_size();
        let ua_arg = format!("--user-agent={MOBILE_USER_AGENT}");
        let mut args = vec![OsStr::new("--hide-scrollbars")];
        if profile == ViewportProfile::Mobile {
            args.push(OsStr::new(&ua_arg));
        }

        let options = LaunchOptionsBuilder::default()
            .headless(true)
            .window_size(Some((width, height)))
            .idle_browser_timeout(page_timeout.max(Duration::from_secs(30)))
            .args(args)
            .build()
            .map_err(|err| RenderError::Launch(err.to_string()))?;

        // Browser ownership is scoped to this call; drop quits the process.
        let browser = Browser::new(options).map_err(|err| RenderError::Launch(err.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|err| RenderError::Launch(err.to_string()))?;
        tab.set_default_timeout(page_timeout);

        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|err| RenderError::Navigation(err.to_string()))?;
        // Basic page-ready signal: the document body exists.
        tab.wait_for_element("body")
            .map_err(|err| RenderError::Navigation(err.to_string()))?;

        let png = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|err| RenderError::Capture(err.to_string()))?;
        Ok(ImageBytes::new(png))
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn capture(
        &self,
        url: &str,
        profile: ViewportProfile,
    ) -> Result<ImageBytes, RenderError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| RenderError::Worker("browser semaphore closed".to_string()))?;

        let url = url.to_string();
        let page_timeout = self.page_timeout;
        task::spawn_blocking(move || Self::capture_blocking(&url, profile, page_timeout))
            .await
            .map_err(|err| RenderError::Worker(err.to_string()))?
    }
}
