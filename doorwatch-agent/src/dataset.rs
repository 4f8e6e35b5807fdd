use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use doorwatch_core::ports::{DatasetSink, DoorLabel};
use std::path::PathBuf;
use tracing::debug;

/// Image-classification directory tree: `<root>/<open|closed>/<timestamp>.jpg`
pub struct DirectoryDataset {
    root: PathBuf,
}

impl DirectoryDataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target(&self, label: DoorLabel, at: DateTime<Tz>) -> PathBuf {
        self.root
            .join(label.as_str())
            .join(format!("{}.jpg", at.format("%Y%m%d_%H%M%S")))
    }
}

#[async_trait]
impl DatasetSink for DirectoryDataset {
    async fn archive(&self, label: DoorLabel, image: &[u8], at: DateTime<Tz>) -> std::io::Result<PathBuf> {
        let path = self.target(label, at);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, image).await?;
        debug!(path = %path.display(), "image archived");
        Ok(path)
    }
}
