use image::GenericImageView;

use crate::data::DecodedImage;
use crate::error::DecodeError;

/// Decode an image payload.
///
/// Empty input is rejected before any format probing.
///
/// # Examples
///
/// ```
/// use avatar_fetch::{DecodeError, decode};
///
/// assert_eq!(decode(&[]).unwrap_err(), DecodeError::Empty);
/// assert!(matches!(decode(b"not an image"), Err(DecodeError::Malformed(_))));
/// ```
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let format = image::guess_format(bytes).ok();
    let image = image::load_from_memory(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let (width, height) = image.dimensions();

    Ok(DecodedImage {
        image,
        width,
        height,
        format,
    })
}
