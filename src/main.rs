//! Command-line entry point for the comparison pipeline.

use clap::Parser;
use log::info;
use sitematch::{ChromeRenderer, Cli, HttpFetcher, Pipeline, Sheet};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Builder;

type DynError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), DynError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<(), DynError> {
    let controls = cli.build_controls();

    // Source unavailability is the only fatal failure; nothing dispatches
    // until the sheet loads.
    let sheet = Sheet::from_csv_path(&cli.input)?;
    let rows = sheet.input_rows()?;
    info!("loaded {} rows from {}", rows.len(), cli.input.display());

    let fetcher = Arc::new(HttpFetcher::new(controls.fetch_timeout())?);
    let renderer = Arc::new(ChromeRenderer::new(
        controls.browser_concurrency(),
        controls.page_timeout(),
    ));
    let pipeline = Pipeline::new(&controls, fetcher, renderer);

    let start = Instant::now();
    let table = pipeline.run(rows).await;
    pipeline.metrics().report(start.elapsed());

    let completed = sheet.with_results(&table);
    completed.write_csv_path(cli.write_back_path())?;
    completed.write_csv_path(&cli.export)?;
    info!(
        "results written to {} and {}",
        cli.write_back_path().display(),
        cli.export.display()
    );
    Ok(())
}
