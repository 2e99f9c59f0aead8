//! Pipeline runtime coordinating bounded-concurrency row comparison.

use crate::controls::PipelineControls;
use crate::fetch::ReferenceFetcher;
use crate::render::{normalize_url, Renderer};
use crate::rows::{ImageBytes, InputRow, OutputTable, RowResult, ViewportProfile, SENTINEL_SCORE};
use crate::score;
use crate::shots::ScreenshotStore;
use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task;

/// Processes one input row: 4-way concurrent acquisition, screenshot
/// persistence, and two similarity scores.
pub struct RowProcessor {
    fetcher: Arc<dyn ReferenceFetcher>,
    renderer: Arc<dyn Renderer>,
    store: ScreenshotStore,
    metrics: Arc<Metrics>,
}

impl RowProcessor {
    /// Assembles a processor from its injected capabilities.
    pub fn new(
        fetcher: Arc<dyn ReferenceFetcher>,
        renderer: Arc<dyn Renderer>,
        store: ScreenshotStore,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            store,
            metrics,
        }
    }

    /// Runs the full per-row comparison, always yielding a result.
    ///
    /// The four acquisitions are mutually independent and all run to their
    /// own completion or timeout; a failed sibling cancels nothing. Every
    /// failure inside degrades the affected viewport to the sentinel score.
    pub async fn process_row(&self, row: InputRow) -> RowResult {
        let index = row.index;
        let url = normalize_url(&row.website_url);

        let (mobile_ref, desktop_ref, mobile_cap, desktop_cap) = tokio::join!(
            self.fetch_reference(index, ViewportProfile::Mobile, &row.mobile_reference),
            self.fetch_reference(index, ViewportProfile::Desktop, &row.desktop_reference),
            self.capture(index, ViewportProfile::Mobile, &url),
            self.capture(index, ViewportProfile::Desktop, &url),
        );

        self.persist(index, ViewportProfile::Mobile, mobile_cap.as_ref())
            .await;
        self.persist(index, ViewportProfile::Desktop, desktop_cap.as_ref())
            .await;

        // Decode + SSIM is CPU-bound and runs off the async workers. The join
        // is the row boundary: a panic in scoring degrades this row alone.
        let scored = task::spawn_blocking(move || {
            (
                score_pair(mobile_ref, mobile_cap),
                score_pair(desktop_ref, desktop_cap),
            )
        })
        .await;

        let (mobile, desktop) = match scored {
            Ok(pair) => pair,
            Err(err) => {
                error!("row {index}: scoring worker lost: {err}");
                self.metrics.record_row_failed();
                return RowResult::failed(index);
            }
        };

        if mobile == SENTINEL_SCORE || desktop == SENTINEL_SCORE {
            self.metrics.record_row_degraded();
        }
        self.metrics.record_row_completed();
        RowResult::new(index, mobile, desktop)
    }

    async fn fetch_reference(
        &self,
        index: usize,
        profile: ViewportProfile,
        source: &str,
    ) -> Option<ImageBytes> {
        match self.fetcher.fetch(source).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!("row {index}: {profile} reference unavailable: {err}");
                self.metrics.record_fetch_error();
                None
            }
        }
    }

    async fn capture(
        &self,
        index: usize,
        profile: ViewportProfile,
        url: &str,
    ) -> Option<ImageBytes> {
        match self.renderer.capture(url, profile).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!("row {index}: {profile} capture unavailable: {err}");
                self.metrics.record_capture_error();
                None
            }
        }
    }

    async fn persist(&self, index: usize, profile: ViewportProfile, bytes: Option<&ImageBytes>) {
        let Some(bytes) = bytes else {
            return;
        };
        if let Err(err) = self.store.save(profile, index, bytes).await {
            warn!("row {index}: could not persist {profile} screenshot: {err}");
            self.metrics.record_persist_error();
        }
    }
}

fn score_pair(reference: Option<ImageBytes>, candidate: Option<ImageBytes>) -> f64 {
    match (reference, candidate) {
        (Some(reference), Some(candidate)) => score::similarity(&reference, &candidate),
        _ => SENTINEL_SCORE,
    }
}

/// Coordinates row processing across a bounded worker pool and merges
/// completions into the output table.
pub struct Pipeline {
    processor: Arc<RowProcessor>,
    row_limit: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    /// Wires a pipeline from controls and its injected capabilities.
    pub fn new(
        controls: &PipelineControls,
        fetcher: Arc<dyn ReferenceFetcher>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let metrics = Arc::new(Metrics::default());
        let store = ScreenshotStore::new(controls.screenshot_dir().clone());
        Self {
            processor: Arc::new(RowProcessor::new(
                fetcher,
                renderer,
                store,
                Arc::clone(&metrics),
            )),
            row_limit: Arc::new(Semaphore::new(controls.row_concurrency())),
            metrics,
        }
    }

    /// Counters accumulated by this pipeline instance.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Processes every row under the concurrency cap and returns a table
    /// holding exactly one result per input index.
    ///
    /// Rows complete in arbitrary order; the merge is keyed by index and
    /// performed only here, by the single owning task.
    pub async fn run(&self, rows: Vec<InputRow>) -> OutputTable {
        let total = rows.len();
        info!("dispatching {total} rows (cap {})", self.row_limit.available_permits());

        let mut inflight = FuturesUnordered::new();
        for row in rows {
            let index = row.index;
            let limit = Arc::clone(&self.row_limit);
            let processor = Arc::clone(&self.processor);
            let metrics = Arc::clone(&self.metrics);
            inflight.push(async move {
                let handle = task::spawn(async move {
                    let _permit = match limit.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            error!("row {index}: row semaphore closed");
                            return RowResult::failed(index);
                        }
                    };
                    let _active = ActiveRowGuard::new(metrics.as_ref());
                    processor.process_row(row).await
                });
                match handle.await {
                    Ok(result) => result,
                    Err(err) => {
                        error!("row {index}: processing aborted: {err}");
                        RowResult::failed(index)
                    }
                }
            });
        }

        let mut table = OutputTable::new();
        while let Some(result) = inflight.next().await {
            table.merge(result);
        }
        table
    }
}

struct ActiveRowGuard<'a> {
    metrics: &'a Metrics,
}

impl<'a> ActiveRowGuard<'a> {
    fn new(metrics: &'a Metrics) -> Self {
        let active = metrics.active_rows.fetch_add(1, Ordering::AcqRel) + 1;
        metrics.peak_active_rows.fetch_max(active, Ordering::AcqRel);
        Self { metrics }
    }
}

impl Drop for ActiveRowGuard<'_> {
    fn drop(&mut self) {
        self.metrics.active_rows.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Run counters shared across the pipeline's workers.
#[derive(Default)]
pub struct Metrics {
    rows_completed: AtomicUsize,
    rows_failed: AtomicUsize,
    rows_degraded: AtomicUsize,
    fetch_errors: AtomicUsize,
    capture_errors: AtomicUsize,
    persist_errors: AtomicUsize,
    active_rows: AtomicUsize,
    peak_active_rows: AtomicUsize,
}

impl Metrics {
    fn record_row_completed(&self) {
        self.rows_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_row_failed(&self) {
        self.rows_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_row_degraded(&self) {
        self.rows_degraded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_capture_error(&self) {
        self.capture_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_persist_error(&self) {
        self.persist_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Highest number of rows observed in flight simultaneously.
    pub fn peak_active_rows(&self) -> usize {
        self.peak_active_rows.load(Ordering::Acquire)
    }

    /// Rows that produced at least one sentinel score.
    pub fn rows_degraded(&self) -> usize {
        self.rows_degraded.load(Ordering::Relaxed)
    }

    /// Prints the run summary.
    pub fn report(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f32().max(f32::EPSILON);
        println!("--- comparison metrics ({secs:.2}s) ---");
        println!(
            "rows completed: {}",
            self.rows_completed.load(Ordering::Relaxed)
        );
        println!(
            "rows fully failed: {}",
            self.rows_failed.load(Ordering::Relaxed)
        );
        println!(
            "rows degraded to sentinel: {}",
            self.rows_degraded.load(Ordering::Relaxed)
        );
        println!(
            "reference fetch errors: {}",
            self.fetch_errors.load(Ordering::Relaxed)
        );
        println!(
            "capture errors: {}",
            self.capture_errors.load(Ordering::Relaxed)
        );
        println!(
            "screenshot write errors: {}",
            self.persist_errors.load(Ordering::Relaxed)
        );
        println!("peak concurrent rows: {}", self.peak_active_rows());
    }
}
