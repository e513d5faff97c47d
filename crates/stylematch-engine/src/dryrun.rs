use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{GrayImage, Luma, RgbaImage};

use crate::error::CameraError;
use crate::tryon::{FrameSource, Segmenter};

/// Camera stand-in that replays still images from a directory, in file
/// name order, looping when exhausted. Lets the try-on loop run end to end
/// without hardware.
pub struct DirectoryFrameSource {
    frames: Vec<PathBuf>,
    cursor: usize,
    closed: bool,
}

impl DirectoryFrameSource {
    /// Acquisition point: filesystem errors classify into the camera
    /// taxonomy (permission denied, not found, other), and a directory
    /// with no usable frames counts as a missing device.
    pub fn open(dir: &Path) -> Result<Self, CameraError> {
        let entries = fs::read_dir(dir).map_err(|err| CameraError::from_io(&err))?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("png") | Some("jpg") | Some("jpeg") | Some("webp")
                )
            })
            .collect();
        frames.sort();
        if frames.is_empty() {
            return Err(CameraError::DeviceNotFound);
        }
        Ok(Self {
            frames,
            cursor: 0,
            closed: false,
        })
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Result<RgbaImage> {
        anyhow::ensure!(!self.closed, "frame source already closed");
        let path = &self.frames[self.cursor % self.frames.len()];
        self.cursor += 1;
        let frame = image::open(path)
            .with_context(|| format!("failed decoding frame {}", path.display()))?;
        Ok(frame.to_rgba8())
    }

    fn close(&mut self) {
        self.closed = true;
        self.frames.clear();
    }
}

/// Segmentation stand-in: an elliptical "person" centered in the frame,
/// opaque inside and transparent outside.
#[derive(Debug, Default)]
pub struct SilhouetteSegmenter {
    ready: bool,
}

impl SilhouetteSegmenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Segmenter for SilhouetteSegmenter {
    fn initialize(&mut self) -> Result<()> {
        self.ready = true;
        Ok(())
    }

    fn segment(&mut self, frame: &RgbaImage) -> Result<GrayImage> {
        anyhow::ensure!(self.ready, "segmenter used before initialization");
        let (width, height) = frame.dimensions();
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        // Torso-ish ellipse: 60% of the width, 90% of the height.
        let (rx, ry) = (width as f32 * 0.3, height as f32 * 0.45);
        Ok(GrayImage::from_fn(width, height, |x, y| {
            let dx = (x as f32 + 0.5 - cx) / rx;
            let dy = (y as f32 + 0.5 - cy) / ry;
            Luma([if dx * dx + dy * dy <= 1.0 { 255 } else { 0 }])
        }))
    }

    fn close(&mut self) {
        self.ready = false;
    }
}
