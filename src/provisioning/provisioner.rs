use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::ProvisionError;
use crate::provisioning::{ArtifactFetcher, HttpFetcher};
use crate::utils::human_bytes;

/// Makes sure the model artifact exists on local disk before it is loaded.
#[derive(Clone)]
pub struct ModelProvisioner {
    source_url: String,
    checksum: Option<String>,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl std::fmt::Debug for ModelProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvisioner")
            .field("source_url", &self.source_url)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

impl ModelProvisioner {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            checksum: None,
            fetcher: Arc::new(HttpFetcher::new()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Expected SHA-256 of the artifact, hex encoded.
    pub fn with_checksum(mut self, checksum: Option<String>) -> Self {
        self.checksum = checksum.map(|c| c.trim().to_lowercase());
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Ensures a complete artifact is present at `path`.
    ///
    /// An existing non-empty file is trusted as is, unless it is a zip archive
    /// or an HTML page, which are deleted and fetched again. Otherwise the
    /// artifact is fetched into `<path>.part`, validated and renamed onto
    /// `path`, so a failed attempt never leaves anything at `path`.
    pub fn ensure_artifact(&self, path: &Path) -> Result<(), ProvisionError> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => match foreign_payload(path)? {
                None => {
                    log::debug!("Model artifact present at {} ({})", path.display(), human_bytes(meta.len() as f64));
                    return Ok(());
                }
                Some(kind) => {
                    log::warn!("Replacing model artifact at {}: file is {kind}", path.display());
                    fs::remove_file(path).map_err(|e| ProvisionError::io(path, e))?;
                }
            },
            Ok(meta) if meta.is_file() => {
                log::warn!("Ignoring empty model artifact at {}", path.display());
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(ProvisionError::io(path, err)),
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ProvisionError::io(parent, e))?;
        }

        let part = part_path(path);
        let result = self.fetch_and_validate(&part, path);
        if result.is_err() {
            let _ = fs::remove_file(&part);
        }
        result
    }

    fn fetch_and_validate(&self, part: &Path, path: &Path) -> Result<(), ProvisionError> {
        self.fetcher
            .fetch(&self.source_url, part)
            .map_err(|error| ProvisionError::Fetch {
                source_url: self.source_url.clone(),
                error,
            })?;

        let size = fs::metadata(part).map_err(|e| ProvisionError::io(part, e))?.len();
        if size == 0 {
            return Err(ProvisionError::EmptyArtifact(path.to_path_buf()));
        }

        if let Some(kind) = foreign_payload(part)? {
            return Err(ProvisionError::UnexpectedPayload {
                path: path.to_path_buf(),
                kind,
            });
        }

        if let Some(expected) = &self.checksum {
            let actual = sha256_file(part)?;
            if &actual != expected {
                return Err(ProvisionError::ChecksumMismatch {
                    path: path.to_path_buf(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        fs::rename(part, path).map_err(|e| ProvisionError::io(path, e))?;
        log::info!("Model artifact saved to {} ({})", path.display(), human_bytes(size as f64));
        Ok(())
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Recognises payloads that are never an ONNX graph: PyTorch checkpoints
/// (zip archives) and HTML pages served instead of the file.
fn foreign_payload(path: &Path) -> Result<Option<&'static str>, ProvisionError> {
    let mut head = Vec::with_capacity(512);
    File::open(path)
        .and_then(|file| file.take(512).read_to_end(&mut head))
        .map_err(|e| ProvisionError::io(path, e))?;

    if head.starts_with(b"PK\x03\x04") {
        return Ok(Some("a zip archive (PyTorch checkpoint?)"));
    }
    let text = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&head[..]);
    if text.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'<') {
        return Ok(Some("an HTML page"));
    }
    Ok(None)
}

fn sha256_file(path: &Path) -> Result<String, ProvisionError> {
    let mut file = File::open(path).map_err(|e| ProvisionError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| ProvisionError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}
