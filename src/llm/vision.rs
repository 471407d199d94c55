//! Image validation and the constrain/align/re-encode pipeline the vision
//! capability runs before handing bytes to the model: sniff real image
//! magic bytes (reject payloads that are actually HTML/JSON/XML error
//! pages), then resize to fit a max long side and snap both dimensions to
//! a multiple of 32.

/// Returned to the downstream prompt on any vision failure — fetch,
/// sniff, decode, or model error. Stable and explicit so the headline
/// prompt doesn't hallucinate image contents it never saw.
pub const VISION_UNAVAILABLE: &str =
    "[image unavailable - do not describe or guess its contents]";

const MAX_LONG_SIDE: u32 = 1024;
const ALIGNMENT: u32 = 32;

/// Sniffs JPEG (`FF D8`), PNG (`89 50 4E 47`), and WebP (`RIFF....WEBP`)
/// magic bytes.
pub fn looks_like_image_bytes(bytes: &[u8]) -> bool {
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8 {
        return true;
    }
    if bytes.len() >= 4 && bytes[0..4] == [0x89, 0x50, 0x4E, 0x47] {
        return true;
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return true;
    }
    false
}

/// Rejects payloads that sniff as text — an HTML error page, a JSON
/// error body, an XML response, or an "access denied" message — served
/// where image bytes were expected.
pub fn looks_like_text_payload(bytes: &[u8]) -> bool {
    let sample_len = bytes.len().min(512);
    let sample = String::from_utf8_lossy(&bytes[..sample_len]);
    let trimmed = sample.trim_start();
    let lower = sample.to_lowercase();

    trimmed.starts_with('<')
        || trimmed.starts_with('{')
        || trimmed.starts_with('[')
        || lower.contains("access denied")
        || lower.contains("<!doctype html")
}

/// Scales `(width, height)` down (never up) so the long side fits
/// `MAX_LONG_SIDE`, then snaps each dimension to the nearest multiple of
/// `ALIGNMENT`, clamped to a minimum of one alignment unit.
pub fn constrain_and_align(width: u32, height: u32) -> (u32, u32) {
    constrain_and_align_to(width, height, MAX_LONG_SIDE, ALIGNMENT)
}

fn constrain_and_align_to(width: u32, height: u32, max_long_side: u32, alignment: u32) -> (u32, u32) {
    let long_side = width.max(height).max(1);
    let scale = if long_side > max_long_side {
        max_long_side as f64 / long_side as f64
    } else {
        1.0
    };

    let scaled_w = (width as f64 * scale).round().max(1.0) as u32;
    let scaled_h = (height as f64 * scale).round().max(1.0) as u32;

    (align(scaled_w, alignment), align(scaled_h, alignment))
}

fn align(value: u32, alignment: u32) -> u32 {
    let rounded = ((value as f64 / alignment as f64).round() as u32) * alignment;
    rounded.max(alignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_magic_bytes_are_recognized() {
        assert!(looks_like_image_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]));
    }

    #[test]
    fn png_magic_bytes_are_recognized() {
        assert!(looks_like_image_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]));
    }

    #[test]
    fn webp_magic_bytes_are_recognized() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBP");
        assert!(looks_like_image_bytes(&bytes));
    }

    #[test]
    fn html_payload_is_rejected() {
        assert!(looks_like_text_payload(b"<!DOCTYPE html><html>access denied</html>"));
    }

    #[test]
    fn json_error_payload_is_rejected() {
        assert!(looks_like_text_payload(br#"{"error": "access denied"}"#));
    }

    #[test]
    fn tiny_image_constrains_up_to_one_alignment_unit() {
        assert_eq!(constrain_and_align(1, 1), (32, 32));
    }

    #[test]
    fn wide_image_scales_down_preserving_aspect_ratio() {
        assert_eq!(constrain_and_align(2048, 1024), (1024, 512));
    }

    #[test]
    fn square_image_scales_to_max_long_side() {
        assert_eq!(constrain_and_align(2000, 2000), (1024, 1024));
    }

    #[test]
    fn already_small_aligned_image_is_unchanged() {
        assert_eq!(constrain_and_align(256, 128), (256, 128));
    }
}
