use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::Downloader;

const USER_AGENT: &str = concat!("wagon/", env!("CARGO_PKG_VERSION"));

/// Fetches `http(s)://` sources with a blocking client and copies `file://` ones.
pub struct HttpDownloader {
    timeout: Duration,
}

impl HttpDownloader {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
            .context("failed to build http client")
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let parsed = Url::parse(url).with_context(|| format!("invalid url {url}"))?;
        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|()| anyhow!("file url {url} has no local path"))?;
            debug!(from = %path.display(), to = %dest.display(), "copying file url");
            fs::copy(&path, dest)
                .with_context(|| format!("copying {} to {}", path.display(), dest.display()))?;
            return Ok(());
        }
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("unsupported url scheme '{}'", parsed.scheme());
        }

        info!(%url, dest = %dest.display(), "downloading");
        let mut response = self
            .client()?
            .get(parsed.clone())
            .send()
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("unexpected response for {url}"))?;
        if response.url() != &parsed {
            debug!(final_url = %response.url(), "redirected");
        }
        let mut file =
            File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
        response
            .copy_to(&mut file)
            .with_context(|| format!("stream error for {url}"))?;
        Ok(())
    }

    fn fetch_json(&self, url: &str) -> Result<Value> {
        debug!(%url, "fetching json");
        self.client()?
            .get(url)
            .send()
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("unexpected response for {url}"))?
            .json::<Value>()
            .with_context(|| format!("invalid json from {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_are_copied() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"payload").unwrap();
        let url = Url::from_file_path(&src).unwrap();
        let dest = dir.path().join("dest.bin");

        HttpDownloader::new(Duration::from_secs(1))
            .download(url.as_str(), &dest)
            .unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"payload");
    }

    #[test]
    fn other_schemes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = HttpDownloader::new(Duration::from_secs(1))
            .download("ftp://example.com/a.tar.gz", &dir.path().join("a"))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported url scheme"));
    }
}
