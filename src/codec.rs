use std::{io::Cursor, path::Path};

use image::{DynamicImage, ImageFormat};

use crate::{
    error::{PixelioError, PixelioResult},
    frame::Frame,
    store::ByteStore,
};

/// Decodes compressed image bytes, keeping the source channel count where the
/// buffer is already 8-bit (gray, rgb, rgba). Everything else is normalized
/// to rgba8.
pub fn decode_image(bytes: &[u8]) -> PixelioResult<Frame> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| PixelioError::decode(format!("image decode failed: {e}")))?;

    let frame = match dyn_img {
        DynamicImage::ImageLuma8(img) => {
            let (w, h) = img.dimensions();
            Frame::from_raw(w, h, 1, img.into_raw())?
        }
        DynamicImage::ImageRgb8(img) => {
            let (w, h) = img.dimensions();
            Frame::from_raw(w, h, 3, img.into_raw())?
        }
        DynamicImage::ImageRgba8(img) => {
            let (w, h) = img.dimensions();
            Frame::from_raw(w, h, 4, img.into_raw())?
        }
        other => {
            let rgba = other.to_rgba8();
            let (w, h) = rgba.dimensions();
            Frame::from_raw(w, h, 4, rgba.into_raw())?
        }
    };
    Ok(frame)
}

pub fn encode_image(frame: &Frame, format: ImageFormat) -> PixelioResult<Vec<u8>> {
    let color = match frame.channels {
        1 => image::ColorType::L8,
        2 => image::ColorType::La8,
        3 => image::ColorType::Rgb8,
        4 => image::ColorType::Rgba8,
        c => {
            return Err(PixelioError::validation(format!(
                "cannot encode a {c}-channel frame"
            )));
        }
    };

    let mut buf = Vec::new();
    image::write_buffer_with_format(
        &mut Cursor::new(&mut buf),
        &frame.data,
        frame.width,
        frame.height,
        color,
        format,
    )
    .map_err(|e| PixelioError::encode(format!("image encode failed: {e}")))?;
    Ok(buf)
}

pub fn read_image(store: &dyn ByteStore, path: &Path) -> PixelioResult<Frame> {
    let bytes = store.read(path)?;
    decode_image(&bytes)
}

pub fn write_image(
    store: &dyn ByteStore,
    path: &Path,
    frame: &Frame,
    format: ImageFormat,
) -> PixelioResult<()> {
    let bytes = encode_image(frame, format)?;
    store.write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(frame: &Frame) -> Vec<u8> {
        encode_image(frame, ImageFormat::Png).unwrap()
    }

    #[test]
    fn decode_preserves_rgba_channel_count() {
        let src = Frame::from_raw(2, 1, 4, vec![10, 20, 30, 128, 40, 50, 60, 255]).unwrap();
        let decoded = decode_image(&png_bytes(&src)).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn decode_preserves_rgb_and_gray_channel_counts() {
        let rgb = Frame::from_raw(2, 2, 3, vec![7; 12]).unwrap();
        assert_eq!(decode_image(&png_bytes(&rgb)).unwrap().channels, 3);

        let gray = Frame::from_raw(3, 1, 1, vec![0, 128, 255]).unwrap();
        assert_eq!(decode_image(&png_bytes(&gray)).unwrap().channels, 1);
    }

    #[test]
    fn decode_garbage_is_decode_kind() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(err.to_string().contains("decode error:"));
    }

    #[test]
    fn encode_alpha_into_jpeg_is_encode_kind() {
        let rgba = Frame::filled(2, 2, 4, 255).unwrap();
        let err = encode_image(&rgba, ImageFormat::Jpeg).unwrap_err();
        assert!(err.to_string().contains("encode error:"));
    }
}
