//! Reference image retrieval over HTTP.

use crate::rows::ImageBytes;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::Duration;

const USER_AGENT: &str = concat!("sitematch/", env!("CARGO_PKG_VERSION"));

/// Capability that resolves a reference-image locator into raw bytes.
///
/// A failed fetch degrades one row's score to the sentinel; it never aborts
/// the pipeline, so implementations do not retry.
#[async_trait]
pub trait ReferenceFetcher: Send + Sync {
    /// Downloads the image behind `source`, rewriting sharing links first.
    async fn fetch(&self, source: &str) -> Result<ImageBytes, FetchError>;
}

/// Errors surfaced while retrieving a reference image.
#[derive(Debug)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    Client(reqwest::Error),
    /// The request failed (network error or timeout).
    Http(reqwest::Error),
    /// The server answered with a non-success status.
    Status(reqwest::StatusCode),
    /// The response body could not be read.
    Body(reqwest::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(err) => write!(f, "http client error: {err}"),
            Self::Http(err) => write!(f, "fetch failed: {err}"),
            Self::Status(status) => write!(f, "fetch returned status {status}"),
            Self::Body(err) => write!(f, "fetch body unreadable: {err}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Client(err) | Self::Http(err) | Self::Body(err) => Some(err),
            Self::Status(_) => None,
        }
    }
}

/// Rewrites a Drive sharing link into its direct-download form.
///
/// Sources that do not match the sharing-link pattern pass through verbatim.
pub fn direct_download_url(source: &str) -> String {
    if !source.contains("drive.google.com") {
        return source.to_string();
    }
    let file_id = source
        .split_once("/d/")
        .map(|(_, rest)| rest.split('/').next().unwrap_or(rest));
    match file_id {
        Some(id) if !id.is_empty() => {
            format!("https://drive.google.com/uc?id={id}&export=download")
        }
        _ => source.to_string(),
    }
}

/// `ReferenceFetcher` backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReferenceFetcher for HttpFetcher {
    async fn fetch(&self, source: &str) -> Result<ImageBytes, FetchError> {
        let url = direct_download_url(source);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await.map_err(FetchError::Body)?;
        Ok(ImageBytes::new(body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharing_link_rewritten_to_direct_download() {
        let link = "https://drive.google.com/file/d/1AbCdEf/view?usp=sharing";
        assert_eq!(
            direct_download_url(link),
            "https://drive.google.com/uc?id=1AbCdEf&export=download"
        );
    }

    #[test]
    fn sharing_link_without_trailing_segment() {
        let link = "https://drive.google.com/file/d/1AbCdEf";
        assert_eq!(
            direct_download_url(link),
            "https://drive.google.com/uc?id=1AbCdEf&export=download"
        );
    }

    #[test]
    fn plain_url_passes_through() {
        let url = "https://example.com/design.png";
        assert_eq!(direct_download_url(url), url);
    }

    #[test]
    fn drive_url_without_file_id_passes_through() {
        let url = "https://drive.google.com/drive/folders/xyz";
        assert_eq!(direct_download_url(url), url);
    }
}
