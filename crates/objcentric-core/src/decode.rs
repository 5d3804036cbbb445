use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use image::DynamicImage;

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("image_base64 must not be empty")]
    Empty,
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),
    #[error("invalid base64 image payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Undecodable(#[from] image::ImageError),
}

/// Decode the `image_base64` field of a prediction request into an image.
pub fn decode_image(payload: &str) -> Result<DynamicImage, ImageError> {
    let bytes = decode_base64(payload)?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Strip an optional `data:` prefix and whitespace, then decode the base64 body.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, ImageError> {
    let trimmed = payload.trim();
    let body = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (meta, body) = rest
                .split_once(',')
                .ok_or_else(|| ImageError::InvalidDataUrl("missing `,` separator".into()))?;
            if !meta.ends_with(";base64") {
                return Err(ImageError::InvalidDataUrl(
                    "data URLs must specify base64 encoding".into(),
                ));
            }
            body
        }
        None => trimmed,
    };

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(ImageError::Empty);
    }

    if compact.ends_with('=') {
        Ok(STANDARD.decode(compact.as_bytes())?)
    } else {
        Ok(STANDARD_NO_PAD.decode(compact.as_bytes())?)
    }
}
