use crate::garmin::Activity;
use anyhow::Result;
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Keeps a copy of every downloaded archive and its extracted payload on disk.
/// Optional: the pipeline uploads whether or not saving works.
pub struct ArtifactStore {
    dir: PathBuf,
}

#[derive(Debug)]
pub struct SavedArtifacts {
    pub archive_path: PathBuf,
    pub payload_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, activity: &Activity, archive: &[u8], payload: &[u8]) -> Result<SavedArtifacts> {
        fs::create_dir_all(&self.dir).await?;

        let stem = artifact_stem(activity);
        let archive_path = self.dir.join(format!("{stem}.zip"));
        let payload_path = self.dir.join(format!("{stem}.fit"));

        fs::write(&archive_path, archive).await?;
        info!("Saved archive: {}", archive_path.display());
        fs::write(&payload_path, payload).await?;
        info!("Saved FIT file: {}", payload_path.display());

        Ok(SavedArtifacts {
            archive_path,
            payload_path,
        })
    }
}

fn artifact_stem(activity: &Activity) -> String {
    format!(
        "{}_{}_{}",
        activity.start_time.format("%Y%m%d_%H%M%S"),
        sanitize(activity.id.as_str()),
        sanitize(&activity.activity_type)
    )
}
