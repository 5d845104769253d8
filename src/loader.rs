//! Background image decoding.
//!
//! Decoding is the only asynchronous step of an editing session. A load is a
//! one-shot: it resolves once with the decoded image, or never resolves when
//! decoding fails.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{info, warn};

use crate::error::OverlayError;
use crate::geometry::Axis;

#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageSource {
    fn describe(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Decoded background with its native pixel size.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pixels: RgbaImage,
}

impl LoadedImage {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> Axis {
        Axis::from_dimensions(self.width(), self.height())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Decodes `source` on the calling thread.
pub fn load_blocking(source: &ImageSource) -> Result<LoadedImage> {
    let decoded = match source {
        ImageSource::Path(path) => image::open(path)
            .with_context(|| format!("failed to decode image: {}", path.display())),
        ImageSource::Bytes(bytes) => {
            image::load_from_memory(bytes).with_context(|| "failed to decode image bytes")
        }
    }
    .map_err(|err| OverlayError::ImageLoadFailure(format!("{:#}", err)))?;
    let pixels = decoded.to_rgba8();
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(OverlayError::ImageLoadFailure(format!(
            "{} has no pixels",
            source.describe()
        ))
        .into());
    }
    Ok(LoadedImage { pixels })
}

pub async fn load(source: ImageSource) -> Result<LoadedImage> {
    tokio::task::spawn_blocking(move || load_blocking(&source))
        .await
        .with_context(|| "image decode task panicked")?
}

/// Result of polling a [`PendingImage`].
#[derive(Debug)]
pub enum LoadState {
    Loading,
    Ready(LoadedImage),
}

/// Handle to an in-flight decode.
pub struct PendingImage {
    rx: oneshot::Receiver<LoadedImage>,
    failed: bool,
}

impl PendingImage {
    /// Already-decoded image, e.g. for embedding callers.
    pub fn ready(image: LoadedImage) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(image);
        Self { rx, failed: false }
    }

    /// Non-blocking check. A failed decode stays `Loading` forever.
    pub fn poll(&mut self) -> LoadState {
        match self.rx.try_recv() {
            Ok(image) => LoadState::Ready(image),
            Err(TryRecvError::Empty) => LoadState::Loading,
            Err(TryRecvError::Closed) => {
                if !self.failed {
                    self.failed = true;
                    warn!("background image never finished loading");
                }
                LoadState::Loading
            }
        }
    }

    /// Waits for the decode. Never returns if decoding failed.
    pub async fn wait(self) -> LoadedImage {
        match self.rx.await {
            Ok(image) => image,
            Err(_) => std::future::pending().await,
        }
    }
}

/// Starts decoding on a blocking task of the current tokio runtime.
pub fn spawn_load(source: ImageSource) -> PendingImage {
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || match load_blocking(&source) {
        Ok(image) => {
            info!(
                "loaded {} ({}x{})",
                source.describe(),
                image.width(),
                image.height()
            );
            let _ = tx.send(image);
        }
        Err(err) => {
            warn!("{:#}", err);
        }
    });
    PendingImage { rx, failed: false }
}
