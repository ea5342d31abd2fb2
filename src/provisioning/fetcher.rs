use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::FetchError;

/// Transport that copies a model artifact from `source` into `dest`.
///
/// Implementations write the whole payload to `dest` or return an error; the
/// caller owns validation and the final rename.
pub trait ArtifactFetcher: Send + Sync {
    fn fetch(&self, source: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Blocking HTTP(S) download.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
        }
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<(), FetchError> {
        let http_err = |source_err: reqwest::Error| FetchError::Http {
            url: source.to_string(),
            source: source_err,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(http_err)?;

        log::info!("Downloading model artifact from {source}");
        let mut response = client.get(source).send().map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: source.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = File::create(dest)?;
        let written = response.copy_to(&mut file).map_err(http_err)?;
        file.flush()?;
        file.sync_all()?;

        log::debug!("Wrote {written} bytes to {}", dest.display());
        Ok(())
    }
}
