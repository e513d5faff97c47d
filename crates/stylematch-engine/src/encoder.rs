use anyhow::anyhow;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use stylematch_contracts::modes::ImageAsset;

use crate::error::AnalysisError;

/// One image payload ready for the remote call: base64 data plus the MIME
/// type the remote side should decode it as.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

/// Pure transcoding of an asset into the wire payload. Pixel content is
/// untouched, so the same input bytes always yield the same output.
pub fn encode(asset: &ImageAsset) -> Result<EncodedImage, AnalysisError> {
    if asset.bytes.is_empty() {
        return Err(AnalysisError::Encoding(anyhow!(
            "image source read produced no bytes"
        )));
    }
    let mime_type = sniff_mime(&asset.bytes)
        .map(str::to_string)
        .or_else(|| {
            let declared = asset.mime_type.trim();
            (!declared.is_empty()).then(|| declared.to_string())
        })
        .unwrap_or_else(|| "image/png".to_string());
    Ok(EncodedImage {
        data: BASE64.encode(&asset.bytes),
        mime_type,
    })
}

/// Magic-byte detection for the formats the remote service accepts. The
/// asset's declared type is only a fallback for unrecognized signatures.
fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}
