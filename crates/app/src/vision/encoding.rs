//! Image decode/encode helpers shared by the CLI and the preview server.

use image::{ImageResult, RgbImage, codecs::jpeg::JpegEncoder};

/// Decode an uploaded JPEG/PNG into an RGB buffer.
pub(crate) fn decode_image(bytes: &[u8]) -> ImageResult<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

pub(crate) fn encode_jpeg(image: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb};

    use super::*;

    #[test]
    fn png_upload_round_trips_dimensions() {
        let image = RgbImage::from_pixel(12, 7, Rgb([10, 200, 30]));
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        let decoded = decode_image(&png).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn jpeg_output_is_decodable() {
        let image = RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]));
        let jpeg = encode_jpeg(&image, 85).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(decode_image(&jpeg).unwrap().dimensions(), (16, 16));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
