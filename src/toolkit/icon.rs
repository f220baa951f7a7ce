use crate::config::IconData;
use image::ImageFormat;

/// Decoded icon in the layout tray backends expect (8-bit RGBA, row major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaIcon {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes icon bytes using their format tag. An empty tag sniffs the bytes.
/// Anything that fails to decode yields `None`; the caller carries on iconless.
pub fn decode_icon(icon: &IconData) -> Option<RgbaIcon> {
    if icon.bytes.is_empty() {
        return None;
    }

    let decoded = match image_format(&icon.format) {
        FormatTag::Known(format) => image::load_from_memory_with_format(&icon.bytes, format),
        FormatTag::Sniff => image::load_from_memory(&icon.bytes),
        FormatTag::Unsupported => {
            log::warn!("Unsupported icon format '{}', continuing without icon", icon.format);
            return None;
        }
    };

    let image = match decoded {
        Ok(image) => image,
        Err(e) => {
            log::warn!("Failed to decode {} icon: {}", display_tag(&icon.format), e);
            return None;
        }
    };

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    Some(RgbaIcon {
        rgba: rgba.into_raw(),
        width,
        height,
    })
}

enum FormatTag {
    Known(ImageFormat),
    Sniff,
    Unsupported,
}

fn image_format(tag: &str) -> FormatTag {
    let tag = tag.trim().trim_start_matches('.').to_ascii_lowercase();
    if tag.is_empty() {
        return FormatTag::Sniff;
    }
    match ImageFormat::from_extension(&tag) {
        Some(format) => FormatTag::Known(format),
        None => FormatTag::Unsupported,
    }
}

fn display_tag(tag: &str) -> &str {
    if tag.is_empty() { "untagged" } else { tag }
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([230, 150, 0, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_to_rgba() {
        // Arrange
        let icon = IconData::new(sample_png(4, 2), "png");

        // Act
        let decoded = decode_icon(&icon).unwrap();

        // Assert
        assert_eq!((decoded.width, decoded.height), (4, 2));
        assert_eq!(decoded.rgba.len(), 4 * 2 * 4);
        assert_eq!(&decoded.rgba[..4], &[230, 150, 0, 255]);
    }

    #[test]
    fn format_tag_is_case_insensitive() {
        let cases = ["png", "PNG", ".png", " Png "];

        for tag in cases {
            let icon = IconData::new(sample_png(1, 1), tag);
            assert!(decode_icon(&icon).is_some(), "tag: {:?}", tag);
        }
    }

    #[test]
    fn empty_tag_sniffs_bytes() {
        let icon = IconData::new(sample_png(2, 2), "");

        assert!(decode_icon(&icon).is_some());
    }

    #[test]
    fn undecodable_input_yields_none() {
        let cases = [
            IconData::new(vec![0u8, 1, 2, 3, 4], "png"),
            IconData::new(Vec::<u8>::new(), "png"),
            IconData::new(sample_png(1, 1), "svg-but-not-really"),
            IconData::new(b"not an image".to_vec(), ""),
        ];

        for icon in cases {
            assert!(decode_icon(&icon).is_none(), "format: {:?}", icon.format);
        }
    }
}
