use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ScreenshotConfig;
use crate::utils::error::Result;

/// Writes failure screenshots under the configured directory.
pub struct Screenshoter {
    enabled: bool,
    dir: PathBuf,
}

impl Screenshoter {
    pub fn new(config: &ScreenshotConfig) -> Self {
        Self {
            enabled: config.enabled,
            dir: PathBuf::from(&config.dir),
        }
    }

    /// Persists PNG bytes with a timestamped unique name. Returns the path,
    /// or `None` when screenshots are disabled.
    pub fn save(&self, png: &[u8]) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("failure_{}_{}.png", timestamp, uuid::Uuid::new_v4().simple());
        let path = self.dir.join(filename);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, png)?;
        debug!(path = %path.display(), "saved failure screenshot");

        Ok(Some(path))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
