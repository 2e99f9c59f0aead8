#![warn(missing_docs)]
//! Core library entry points for the sitematch visual-regression pipeline.

pub mod controls;
pub mod fetch;
pub mod render;
pub mod rows;
pub mod runtime;
pub mod score;
pub mod shots;
pub mod table;

pub use controls::{Cli, PipelineControls};
pub use fetch::{direct_download_url, FetchError, HttpFetcher, ReferenceFetcher};
pub use render::{normalize_url, ChromeRenderer, RenderError, Renderer};
pub use rows::{ImageBytes, InputRow, OutputTable, RowResult, ViewportProfile, SENTINEL_SCORE};
pub use runtime::{Metrics, Pipeline, RowProcessor};
pub use score::similarity;
pub use shots::ScreenshotStore;
pub use table::{Sheet, TableError};
