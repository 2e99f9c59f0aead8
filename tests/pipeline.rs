//! End-to-end pipeline scenarios with mocked fetch and render capabilities.

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use sitematch::{
    FetchError, ImageBytes, InputRow, Pipeline, PipelineControls, ReferenceFetcher, RenderError,
    Renderer, ViewportProfile, SENTINEL_SCORE,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn white_png(width: u32, height: u32) -> ImageBytes {
    let img = GrayImage::from_pixel(width, height, Luma([255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("png encode succeeds");
    ImageBytes::new(buf.into_inner())
}

fn controls(row_cap: usize, screenshot_dir: &Path) -> PipelineControls {
    PipelineControls::new(
        row_cap,
        row_cap,
        Duration::from_secs(10),
        Duration::from_secs(10),
        screenshot_dir.to_path_buf(),
    )
}

fn row(index: usize) -> InputRow {
    InputRow {
        index,
        mobile_reference: format!("https://img.test/mobile_{index}.png"),
        desktop_reference: format!("https://img.test/desktop_{index}.png"),
        website_url: format!("site-{index}.example"),
    }
}

struct StaticFetcher {
    bytes: ImageBytes,
    fail_for: Option<String>,
}

impl StaticFetcher {
    fn always(bytes: ImageBytes) -> Self {
        Self {
            bytes,
            fail_for: None,
        }
    }

    fn failing_for(bytes: ImageBytes, source: impl Into<String>) -> Self {
        Self {
            bytes,
            fail_for: Some(source.into()),
        }
    }
}

#[async_trait]
impl ReferenceFetcher for StaticFetcher {
    async fn fetch(&self, source: &str) -> Result<ImageBytes, FetchError> {
        if self.fail_for.as_deref() == Some(source) {
            return Err(FetchError::Status(reqwest::StatusCode::NOT_FOUND));
        }
        Ok(self.bytes.clone())
    }
}

struct StaticRenderer {
    bytes: ImageBytes,
    delay: Duration,
}

impl StaticRenderer {
    fn new(bytes: ImageBytes) -> Self {
        Self {
            bytes,
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn capture(
        &self,
        _url: &str,
        _profile: ViewportProfile,
    ) -> Result<ImageBytes, RenderError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        Ok(self.bytes.clone())
    }
}

struct DownRenderer;

#[async_trait]
impl Renderer for DownRenderer {
    async fn capture(
        &self,
        url: &str,
        _profile: ViewportProfile,
    ) -> Result<ImageBytes, RenderError> {
        Err(RenderError::Navigation(format!("unreachable: {url}")))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_row_yields_exactly_one_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let img = white_png(40, 40);
    let pipeline = Pipeline::new(
        &controls(10, dir.path()),
        Arc::new(StaticFetcher::always(img.clone())),
        Arc::new(StaticRenderer::new(img).with_delay(Duration::from_millis(10))),
    );

    let rows: Vec<InputRow> = (0..25).map(row).collect();
    let table = pipeline.run(rows).await;

    assert_eq!(table.len(), 25);
    for index in 0..25 {
        assert!(table.get(index).is_some(), "row {index} missing");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_cap_never_exceeded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let img = white_png(40, 40);
    let pipeline = Pipeline::new(
        &controls(10, dir.path()),
        Arc::new(StaticFetcher::always(img.clone())),
        Arc::new(StaticRenderer::new(img).with_delay(Duration::from_millis(20))),
    );
    let metrics = pipeline.metrics();

    let rows: Vec<InputRow> = (0..25).map(row).collect();
    let table = pipeline.run(rows).await;

    assert_eq!(table.len(), 25);
    let peak = metrics.peak_active_rows();
    assert!(peak <= 10, "peak active rows {peak} exceeded cap");
    assert!(peak >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identical_reference_and_capture_score_one_hundred() {
    let dir = tempfile::tempdir().expect("tempdir");
    let img = white_png(100, 100);
    let pipeline = Pipeline::new(
        &controls(2, dir.path()),
        Arc::new(StaticFetcher::always(img.clone())),
        Arc::new(StaticRenderer::new(img)),
    );

    let table = pipeline.run(vec![row(0)]).await;
    let result = table.get(0).expect("row present");
    assert!(
        (result.mobile_similarity - 100.0).abs() < 0.01,
        "mobile {}",
        result.mobile_similarity
    );
    assert!(
        (result.desktop_similarity - 100.0).abs() < 0.01,
        "desktop {}",
        result.desktop_similarity
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn capture_failure_zeroes_both_viewports() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = Pipeline::new(
        &controls(2, dir.path()),
        Arc::new(StaticFetcher::always(white_png(50, 50))),
        Arc::new(DownRenderer),
    );

    let table = pipeline.run(vec![row(0)]).await;
    let result = table.get(0).expect("row present");
    assert_eq!(result.mobile_similarity, SENTINEL_SCORE);
    assert_eq!(result.desktop_similarity, SENTINEL_SCORE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reference_failure_degrades_only_its_viewport() {
    let dir = tempfile::tempdir().expect("tempdir");
    let img = white_png(60, 60);
    let input = row(0);
    let pipeline = Pipeline::new(
        &controls(2, dir.path()),
        Arc::new(StaticFetcher::failing_for(
            img.clone(),
            input.mobile_reference.clone(),
        )),
        Arc::new(StaticRenderer::new(img)),
    );

    let table = pipeline.run(vec![input]).await;
    let result = table.get(0).expect("row present");
    assert_eq!(result.mobile_similarity, SENTINEL_SCORE);
    assert!(
        (result.desktop_similarity - 100.0).abs() < 0.01,
        "desktop {}",
        result.desktop_similarity
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deterministic_inputs_rerun_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let img = white_png(30, 30);
    let rows: Vec<InputRow> = (0..8).map(row).collect();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let pipeline = Pipeline::new(
            &controls(4, dir.path()),
            Arc::new(StaticFetcher::failing_for(
                img.clone(),
                rows[3].desktop_reference.clone(),
            )),
            Arc::new(StaticRenderer::new(img.clone())),
        );
        let table = pipeline.run(rows.clone()).await;
        let results: Vec<_> = table.iter().copied().collect();
        runs.push(results);
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn screenshots_persisted_per_viewport_and_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let img = white_png(20, 20);
    let pipeline = Pipeline::new(
        &controls(2, dir.path()),
        Arc::new(StaticFetcher::always(img.clone())),
        Arc::new(StaticRenderer::new(img)),
    );

    pipeline.run(vec![row(0), row(1)]).await;

    for name in ["mobile_0.png", "desktop_0.png", "mobile_1.png", "desktop_1.png"] {
        assert!(dir.path().join(name).exists(), "{name} not written");
    }
}
