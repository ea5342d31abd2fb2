//! Per-user directories used for the model artifact and the configuration file.

use std::path::PathBuf;

pub(crate) const APP_DIR: &str = "woody";

#[derive(Debug, Clone, Copy)]
pub enum FsAccess {
    Cache,
    Config,
}

impl FsAccess {
    /// Retrieves the base path for the specified directory type, optionally appending the `woody` subdirectory.
    ///
    /// # Arguments
    /// * `raw` - If `true`, returns the base path without adding the `woody` subdirectory.
    fn get_path(&self, raw: bool) -> anyhow::Result<PathBuf> {
        let base_path = match self {
            FsAccess::Cache => dirs::cache_dir(),
            FsAccess::Config => dirs::config_dir(),
        };

        let mut path = base_path.ok_or_else(|| {
            anyhow::anyhow!("Unsupported operating system. Supported OS: Linux, MacOS, Windows.")
        })?;

        if !raw {
            path.push(APP_DIR);
        }
        Ok(path)
    }

    /// Returns the `woody` directory path without creating it.
    ///
    /// Examples:
    /// `~/.cache/woody`, `~/.config/woody`.
    pub fn dir(&self) -> anyhow::Result<PathBuf> {
        self.get_path(false)
    }

    /// Path of `name` inside the `woody` directory, falling back to the
    /// current directory when the platform has no such location.
    pub fn file_or_local(&self, name: &str) -> PathBuf {
        match self.dir() {
            Ok(dir) => dir.join(name),
            Err(err) => {
                log::warn!("{err}; using ./{name}");
                PathBuf::from(name)
            }
        }
    }
}
