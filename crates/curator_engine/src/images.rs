use std::io::Cursor;
use std::path::{Path, PathBuf};

use curator_core::ImageTask;
use curator_logging::{curator_debug, curator_info, curator_warn};
use futures_util::stream::{self, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use tokio_util::sync::CancellationToken;

use crate::config::DownloadSettings;
use crate::fetch::Fetcher;
use crate::persist::{write_atomically, WriteError};
use crate::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("could not store image: {0}")]
    Write(#[from] WriteError),
    #[error("download cancelled")]
    Cancelled,
    #[error("image worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub recompressed: bool,
}

#[derive(Debug)]
pub struct ImageOutcome {
    pub task: ImageTask,
    pub result: Result<StoredImage, ImageError>,
}

impl ImageOutcome {
    pub fn is_stored(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fetches the images of accepted items into `root`, a bounded number at a
/// time. Every task yields an outcome; a failure never affects other tasks.
pub struct ImageDownloader<'a> {
    fetcher: &'a dyn Fetcher,
    settings: DownloadSettings,
    root: PathBuf,
}

impl<'a> ImageDownloader<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, settings: DownloadSettings, root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            settings,
            root: root.into(),
        }
    }

    /// Outcomes are returned ordered by image index.
    pub async fn download_all(&self, tasks: Vec<ImageTask>, cancel: &CancellationToken) -> Vec<ImageOutcome> {
        let limit = self.settings.max_concurrency.max(1);
        let mut outcomes: Vec<ImageOutcome> = stream::iter(tasks)
            .map(|task| self.download_one(task, cancel))
            .buffer_unordered(limit)
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| outcome.task.index);
        outcomes
    }

    async fn download_one(&self, task: ImageTask, cancel: &CancellationToken) -> ImageOutcome {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ImageError::Cancelled),
            result = self.fetch_and_store(&task) => result,
        };
        match &result {
            Ok(stored) => curator_info!(
                "Image {} saved to {:?} ({} bytes{})",
                task.index,
                stored.path,
                stored.bytes_written,
                if stored.recompressed { ", recompressed" } else { "" }
            ),
            Err(err) => curator_warn!("Image {} from {} skipped: {}", task.index, task.source_url, err),
        }
        ImageOutcome { task, result }
    }

    async fn fetch_and_store(&self, task: &ImageTask) -> Result<StoredImage, ImageError> {
        let output = self.fetcher.fetch(&task.source_url, self.settings.tls).await?;
        let path = self.root.join(&task.target_path);
        let threshold = self.settings.recompress_threshold_bytes;
        let quality = self.settings.recompress_quality;
        let reencode = is_jpeg_target(&task.extension);

        tokio::task::spawn_blocking(move || store(&path, output.bytes, reencode, threshold, quality))
            .await
            .map_err(|err| ImageError::Worker(err.to_string()))?
    }
}

fn is_jpeg_target(extension: &str) -> bool {
    extension.eq_ignore_ascii_case("jpg") || extension.eq_ignore_ascii_case("jpeg")
}

fn store(
    path: &Path,
    bytes: Vec<u8>,
    reencode: bool,
    threshold: u64,
    quality: u8,
) -> Result<StoredImage, ImageError> {
    let oversized = bytes.len() as u64 > threshold;
    if oversized && !reencode {
        curator_debug!("Storing {:?} as downloaded, only JPEG targets are re-encoded", path);
    }
    let (bytes, recompressed) = if oversized && reencode {
        match recompress(&bytes, quality) {
            Ok(smaller) => {
                curator_debug!("Re-encoded {:?}: {} -> {} bytes", path, bytes.len(), smaller.len());
                (smaller, true)
            }
            Err(err) => {
                curator_warn!("Keeping original bytes for {:?}: {}", path, err);
                (bytes, false)
            }
        }
    } else {
        (bytes, false)
    };

    let path = write_atomically(path, &bytes)?;
    Ok(StoredImage {
        path,
        bytes_written: bytes.len() as u64,
        recompressed,
    })
}

/// Decode any supported format and encode it again as JPEG at `quality`.
pub fn recompress(bytes: &[u8], quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).encode_image(&img.to_rgb8())?;
    Ok(out.into_inner())
}
