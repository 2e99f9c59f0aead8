//! Pipeline tuning knobs and the command-line interface.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Tunable knobs that bound pipeline behavior.
///
/// Constructed explicitly and passed into the coordinator; the capabilities
/// it configures hold no process-wide state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineControls {
    row_concurrency: usize,
    browser_concurrency: usize,
    fetch_timeout: Duration,
    page_timeout: Duration,
    screenshot_dir: PathBuf,
}

impl PipelineControls {
    /// Constructs a new set of pipeline controls.
    pub fn new(
        row_concurrency: usize,
        browser_concurrency: usize,
        fetch_timeout: Duration,
        page_timeout: Duration,
        screenshot_dir: PathBuf,
    ) -> Self {
        Self {
            row_concurrency: row_concurrency.max(1),
            browser_concurrency: browser_concurrency.max(1),
            fetch_timeout,
            page_timeout,
            screenshot_dir,
        }
    }

    /// Maximum rows processed simultaneously.
    pub fn row_concurrency(&self) -> usize {
        self.row_concurrency
    }

    /// Maximum simultaneous browser instances, independent of row concurrency.
    pub fn browser_concurrency(&self) -> usize {
        self.browser_concurrency
    }

    /// Timeout applied to each reference-image download.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Bound on navigation plus page-ready wait per capture.
    pub fn page_timeout(&self) -> Duration {
        self.page_timeout
    }

    /// Directory captured screenshots are persisted into.
    pub fn screenshot_dir(&self) -> &PathBuf {
        &self.screenshot_dir
    }
}

impl Default for PipelineControls {
    fn default() -> Self {
        Self {
            row_concurrency: 10,
            browser_concurrency: 4,
            fetch_timeout: Duration::from_secs(10),
            page_timeout: Duration::from_secs(10),
            screenshot_dir: PathBuf::from("website_screenshots"),
        }
    }
}

/// Command-line interface for the comparison pipeline.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sitematch",
    about = "Score live websites against reference design screenshots"
)]
pub struct Cli {
    /// Input CSV with reference links and website URLs
    #[arg(long, env = "SITEMATCH_INPUT")]
    pub input: PathBuf,

    /// Write-back target; defaults to replacing the input file
    #[arg(long, env = "SITEMATCH_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Secondary local export of the completed sheet
    #[arg(long, env = "SITEMATCH_EXPORT", default_value = "sitematch_results.csv")]
    pub export: PathBuf,

    /// Maximum rows processed concurrently
    #[arg(long, env = "SITEMATCH_ROWS", default_value_t = 10)]
    pub max_rows: usize,

    /// Maximum simultaneous browser instances
    #[arg(long, env = "SITEMATCH_BROWSERS", default_value_t = 4)]
    pub max_browsers: usize,

    /// Seconds before a reference download is abandoned
    #[arg(long, env = "SITEMATCH_FETCH_TIMEOUT", default_value_t = 10)]
    pub fetch_timeout_secs: u64,

    /// Seconds to wait for navigation and page readiness per capture
    #[arg(long, env = "SITEMATCH_PAGE_TIMEOUT", default_value_t = 10)]
    pub page_timeout_secs: u64,

    /// Directory captured screenshots are written into
    #[arg(long, env = "SITEMATCH_SCREENSHOT_DIR", default_value = "website_screenshots")]
    pub screenshot_dir: PathBuf,
}

impl Cli {
    /// Converts the parsed CLI into `PipelineControls`.
    pub fn build_controls(&self) -> PipelineControls {
        PipelineControls::new(
            self.max_rows,
            self.max_browsers,
            Duration::from_secs(self.fetch_timeout_secs),
            Duration::from_secs(self.page_timeout_secs),
            self.screenshot_dir.clone(),
        )
    }

    /// The path the completed sheet replaces, defaulting to the input.
    pub fn write_back_path(&self) -> &PathBuf {
        self.output.as_ref().unwrap_or(&self.input)
    }
}
