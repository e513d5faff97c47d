use anyhow::{bail, Result};
use image::{GrayImage, Rgba, RgbaImage};

/// Repeats the garment image across a canvas of the requested size,
/// anchored at the top-left corner.
pub fn tile_pattern(garment: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (gw, gh) = garment.dimensions();
    RgbaImage::from_fn(width, height, |x, y| *garment.get_pixel(x % gw, y % gh))
}

/// One preview frame: the garment tiled over the canvas, cut to the person
/// silhouette, with the live camera frame filling everything else.
///
/// This is the canvas sequence `destination-in` (keep tile where the mask
/// is opaque) followed by `destination-over` (camera behind), collapsed
/// into a single per-pixel blend. Every call starts from a fresh canvas,
/// so no compositing state leaks into the next frame.
pub fn composite_frame(
    camera: &RgbaImage,
    mask: &GrayImage,
    garment: &RgbaImage,
) -> Result<RgbaImage> {
    let (width, height) = camera.dimensions();
    if mask.dimensions() != (width, height) {
        bail!(
            "segmentation mask {}x{} does not match camera frame {width}x{height}",
            mask.width(),
            mask.height()
        );
    }
    if garment.width() == 0 || garment.height() == 0 {
        bail!("garment image is empty");
    }

    let tile = tile_pattern(garment, width, height);
    let mut frame = RgbaImage::new(width, height);
    for (x, y, out) in frame.enumerate_pixels_mut() {
        let Rgba([tr, tg, tb, ta]) = *tile.get_pixel(x, y);
        let Rgba([cr, cg, cb, _]) = *camera.get_pixel(x, y);
        // Tile coverage after the mask cut: mask value scaled by the tile's
        // own alpha.
        let coverage = scale(mask.get_pixel(x, y).0[0], ta);
        *out = Rgba([
            blend(tr, cr, coverage),
            blend(tg, cg, coverage),
            blend(tb, cb, coverage),
            255,
        ]);
    }
    Ok(frame)
}

fn scale(value: u8, by: u8) -> u8 {
    ((value as u32 * by as u32 + 127) / 255) as u8
}

fn blend(top: u8, bottom: u8, coverage: u8) -> u8 {
    let c = coverage as u32;
    ((top as u32 * c + bottom as u32 * (255 - c) + 127) / 255) as u8
}
