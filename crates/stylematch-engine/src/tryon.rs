use anyhow::{Context, Result};
use image::{GrayImage, ImageFormat, RgbaImage};
use serde_json::json;
use sha2::{Digest, Sha256};
use stylematch_contracts::events::{EventLog, EventPayload};
use stylematch_contracts::modes::ImageAsset;

use crate::compositor::composite_frame;
use crate::error::CameraError;

/// Live camera analogue. Opening the source is where acquisition failures
/// are classified; `close` must release the underlying handle and is
/// required on every exit path.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<RgbaImage>;
    fn close(&mut self);
}

/// External person-segmentation model, consumed as initialize/send/close.
/// `segment` returns the mask for exactly the submitted frame.
pub trait Segmenter {
    fn initialize(&mut self) -> Result<()>;
    fn segment(&mut self, frame: &RgbaImage) -> Result<GrayImage>;
    fn close(&mut self);
}

/// A composited preview frozen by capture: PNG bytes plus a
/// content-derived artifact name.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub png_bytes: Vec<u8>,
    pub name: String,
}

impl CapturedImage {
    /// The frozen look as an input asset for a follow-up analysis.
    pub fn as_asset(&self) -> ImageAsset {
        ImageAsset::new(self.png_bytes.clone(), "image/png")
    }
}

/// Cooperative try-on preview loop.
///
/// Each tick pulls one camera frame, submits it to the segmenter, and only
/// composites once the mask for that frame is back, so at most one
/// segmentation request is ever in flight. Capture freezes the current
/// preview and stops the loop; retake resumes it. Camera and segmenter are
/// released on close, and drop closes the session if the caller did not.
pub struct TryOnSession<C: FrameSource, S: Segmenter> {
    camera: C,
    segmenter: S,
    garment: RgbaImage,
    preview: Option<RgbaImage>,
    frozen: Option<CapturedImage>,
    closed: bool,
    events: Option<EventLog>,
}

impl<C: FrameSource, S: Segmenter> TryOnSession<C, S> {
    /// Initializes the segmenter and binds the already-acquired camera.
    /// A segmenter initialization failure is classified as `Other` and the
    /// loop never starts.
    pub fn start(mut camera: C, mut segmenter: S, garment: RgbaImage) -> Result<Self, CameraError> {
        if let Err(err) = segmenter.initialize() {
            segmenter.close();
            camera.close();
            return Err(CameraError::Other(format!(
                "segmentation model failed to initialize: {err:#}"
            )));
        }
        Ok(Self {
            camera,
            segmenter,
            garment,
            preview: None,
            frozen: None,
            closed: false,
            events: None,
        })
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Runs one frame through the pipeline. Returns `false` without
    /// touching the camera while a captured frame is frozen or after the
    /// session is closed.
    pub fn tick(&mut self) -> Result<bool> {
        if self.closed || self.frozen.is_some() {
            return Ok(false);
        }
        let frame = self.camera.next_frame().context("camera frame read failed")?;
        let mask = self
            .segmenter
            .segment(&frame)
            .context("segmentation request failed")?;
        let composited = composite_frame(&frame, &mask, &self.garment)?;
        self.emit(
            "frame_composited",
            json!({ "width": composited.width(), "height": composited.height() }),
        );
        self.preview = Some(composited);
        Ok(true)
    }

    pub fn preview(&self) -> Option<&RgbaImage> {
        self.preview.as_ref()
    }

    /// Freezes the current preview into a standalone artifact and stops
    /// the loop until retake.
    pub fn capture(&mut self) -> Result<&CapturedImage> {
        let preview = self
            .preview
            .as_ref()
            .context("no composited frame available to capture")?;
        let mut png_bytes = Vec::new();
        image::DynamicImage::ImageRgba8(preview.clone())
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
            .context("captured frame PNG encoding failed")?;
        let name = format!("look-{}.png", short_digest(&png_bytes));
        self.emit("capture_frozen", json!({ "artifact": name }));
        self.frozen = Some(CapturedImage { png_bytes, name });
        Ok(self.frozen.as_ref().expect("capture just stored"))
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        self.frozen.as_ref()
    }

    /// Discards the frozen artifact so the next tick resumes the loop.
    pub fn retake(&mut self) {
        self.frozen = None;
    }

    /// Releases the camera and segmenter handles. Idempotent; also invoked
    /// from drop so no exit path leaks the hardware.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.camera.close();
        self.segmenter.close();
        self.emit("tryon_closed", json!({}));
    }

    fn emit(&self, event: &str, payload: serde_json::Value) {
        if let Some(events) = &self.events {
            let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
            let _ = events.emit(event, payload);
        }
    }
}

impl<C: FrameSource, S: Segmenter> Drop for TryOnSession<C, S> {
    fn drop(&mut self) {
        self.close();
    }
}

fn short_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
