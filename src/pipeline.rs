//! The per-caption flow: fetch the cat, store it on the disk, record its size.

use crate::{
    api::UploadResult,
    cataas::CatClient,
    cli::sanitize,
    disk::{DiskClient, DiskError, UploadSource},
    ledger::Ledger,
    token::{CredentialSource, TokenStore},
};
use anyhow::Context;
use clap::ValueEnum;
use log::{debug, error, info, warn};
use std::{fmt, fs, path::PathBuf};

/// How the image gets onto the disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum UploadMode {
    /// Download the image here, then upload the bytes
    Local,
    /// Have the disk download the image from the cat service itself
    #[default]
    Remote,
}

/// Where a caption is in its trip through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Start,
    ImageAcquired,
    FolderReady,
    Uploaded,
    MetadataConfirmed,
    LedgerUpdated,
}

impl Stage {
    /// Number of steps after `Start`.
    pub const STEPS: u64 = 5;

    /// 0 for `Start`, up to [`Stage::STEPS`] for `LedgerUpdated`.
    pub fn step(self) -> u64 {
        match self {
            Stage::Start => 0,
            Stage::ImageAcquired => 1,
            Stage::FolderReady => 2,
            Stage::Uploaded => 3,
            Stage::MetadataConfirmed => 4,
            Stage::LedgerUpdated => 5,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "Starting",
            Stage::ImageAcquired => "Image ready",
            Stage::FolderReady => "Folder ready",
            Stage::Uploaded => "Uploaded",
            Stage::MetadataConfirmed => "Size confirmed",
            Stage::LedgerUpdated => "Ledger updated",
        };
        f.write_str(s)
    }
}

pub struct Pipeline {
    pub cats: CatClient,
    pub disk: DiskClient,
    pub ledger: Ledger,
    pub tokens: TokenStore,
    /// Whether a rejected token should be cleared from `tokens`
    pub token_source: CredentialSource,
    pub mode: UploadMode,
    /// Disk folder that receives the images
    pub folder: String,
    /// Keep a local copy of downloaded images here (local mode only)
    pub save_dir: Option<PathBuf>,
}

impl Pipeline {
    /// Run one caption through every stage, reporting each stage reached.
    ///
    /// Returns `Ok(None)` if the upload was accepted but the file never
    /// showed up on the disk; the ledger is left alone in that case.
    pub fn process(
        &mut self,
        caption: &str,
        mut on_stage: impl FnMut(Stage),
    ) -> anyhow::Result<Option<UploadResult>> {
        on_stage(Stage::Start);
        let file_name = sanitize::file_name(caption);
        let remote_path = format!("{}/{}", self.folder, file_name);
        debug!("Caption {caption:?} -> {remote_path:?}");

        // Acquire the image (or just its address)
        let image = match self.mode {
            UploadMode::Local => {
                let bytes = self
                    .cats
                    .fetch(caption)
                    .context("Failed to download cat image")?;
                self.save_local_copy(&file_name, &bytes)?;
                Image::Bytes(bytes)
            }
            UploadMode::Remote => Image::Url(self.cats.image_url(caption)),
        };
        on_stage(Stage::ImageAcquired);

        let folder = self.folder.clone();
        self.disk_step(|disk| disk.create_folder(&folder))?;
        on_stage(Stage::FolderReady);

        let source = match &image {
            Image::Bytes(bytes) => UploadSource::Bytes(bytes),
            Image::Url(url) => UploadSource::Url(url),
        };
        self.disk_step(|disk| disk.upload(&remote_path, source))?;
        on_stage(Stage::Uploaded);

        let Some(resource) =
            self.disk_step(|disk| disk.poll_for_metadata(&remote_path))?
        else {
            return Ok(None);
        };
        on_stage(Stage::MetadataConfirmed);

        let record = UploadResult {
            name: file_name,
            size: resource.size,
        };
        self.ledger.append(record.clone())?;
        on_stage(Stage::LedgerUpdated);

        info!("✓ {caption:?} stored as {remote_path:?} ({} bytes)", record.size);
        Ok(Some(record))
    }

    /// Run a disk call, clearing the saved token if the disk rejected it.
    /// A token passed in by flag or environment is left for the user to fix.
    fn disk_step<T>(
        &mut self,
        op: impl FnOnce(&mut DiskClient) -> Result<T, DiskError>,
    ) -> anyhow::Result<T> {
        match op(&mut self.disk) {
            Ok(value) => Ok(value),
            Err(DiskError::Unauthorized) => {
                match self.token_source {
                    CredentialSource::Stored => {
                        if let Err(err) = self.tokens.invalidate() {
                            error!("Failed to clear the saved token: {err}");
                        }
                    }
                    CredentialSource::Flag => warn!(
                        "The token from --token / YANDEX_DISK_TOKEN was \
                         rejected; fix it there (or in .env). The saved \
                         token in {} was left alone",
                        self.tokens.path().display()
                    ),
                }
                Err(DiskError::Unauthorized.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save_local_copy(&self, file_name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let Some(dir) = &self.save_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(file_name);
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!("Cat image saved as: {}", path.display());
        Ok(())
    }
}

enum Image {
    Bytes(Vec<u8>),
    Url(String),
}
