use infer::Infer;
use once_cell::sync::Lazy;

static INFER: Lazy<Infer> = Lazy::new(Infer::new);

/// Best-effort pixel dimensions of encoded image bytes.
pub trait DimensionProbe: Send + Sync {
    /// Returns `(0, 0)` when the bytes cannot be decoded.
    fn dimensions(&self, data: &[u8]) -> (i32, i32);
}

/// Reads dimensions from the image header without decoding pixel data.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderProbe;

impl DimensionProbe for HeaderProbe {
    fn dimensions(&self, data: &[u8]) -> (i32, i32) {
        match imagesize::blob_size(data) {
            Ok(size) => (clamp_dimension(size.width), clamp_dimension(size.height)),
            Err(e) => {
                tracing::debug!("Dimension probe failed: {}", e);
                (0, 0)
            }
        }
    }
}

fn clamp_dimension(value: usize) -> i32 {
    value.min(i32::MAX as usize) as i32
}

/// MIME type detected from magic bytes.
pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    INFER.get(data).map(|kind| kind.mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG.
    pub const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn reads_png_header() {
        assert_eq!(HeaderProbe.dimensions(PNG_1X1), (1, 1));
        assert_eq!(sniff_mime_type(PNG_1X1), Some("image/png"));
    }

    #[test]
    fn undecodable_bytes_yield_zero() {
        assert_eq!(HeaderProbe.dimensions(b"definitely not an image"), (0, 0));
        assert_eq!(sniff_mime_type(b"definitely not an image"), None);
    }
}
