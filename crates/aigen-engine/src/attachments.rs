use std::fs;
use std::path::Path;

use aigen_contracts::store::OutgoingMessage;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub const UPLOAD_FIELD: &str = "data";
pub const TEXT_FIELD: &str = "text";
pub const UPLOAD_FILE_NAME: &str = "uploaded-image.jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Multipart body for the ad webhook: the text plus, at most, the first
/// uploaded image as a binary part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookPayload {
    pub text: String,
    pub image: Option<DecodedImage>,
}

impl WebhookPayload {
    pub fn from_message(message: &OutgoingMessage) -> Result<Self> {
        let image = message
            .uploaded_images
            .first()
            .map(|uri| decode_data_uri(uri))
            .transpose()
            .context("failed decoding uploaded image")?;
        Ok(Self {
            text: message.text.clone(),
            image,
        })
    }
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

pub fn decode_data_uri(uri: &str) -> Result<DecodedImage> {
    let Some(rest) = uri.strip_prefix("data:") else {
        bail!("not a data URI");
    };
    let Some((meta, data)) = rest.split_once(',') else {
        bail!("data URI has no payload");
    };
    let Some(mime_type) = meta.strip_suffix(";base64") else {
        bail!("only base64 data URIs are supported");
    };
    let bytes = BASE64
        .decode(data.trim())
        .context("data URI payload is not valid base64")?;
    Ok(DecodedImage {
        mime_type: if mime_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            mime_type.to_string()
        },
        bytes,
    })
}

/// Reads an image file into an inline `data:` URI. Non-image files are
/// rejected.
pub fn image_data_uri_from_path(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let mime_type = mime_for_path(path)
        .or_else(|| sniff_image_mime(&bytes))
        .with_context(|| format!("{} is not an image", path.display()))?;
    Ok(encode_data_uri(mime_type, &bytes))
}

/// Inline URI for pasted image bytes, typed by content.
pub fn image_data_uri_from_bytes(bytes: &[u8]) -> Result<String> {
    let Some(mime_type) = sniff_image_mime(bytes) else {
        bail!("pasted content is not a recognized image");
    };
    Ok(encode_data_uri(mime_type, bytes))
}

pub(crate) fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
        .filter(|mime| mime.starts_with("image/"))
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
