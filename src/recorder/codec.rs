//! Encoding format selection

use crate::capture::CapturePlatform;

/// Container/codec combinations, best first
pub const PREFERRED_MIME_TYPES: &[&str] = &[
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=h264,opus",
    "video/mp4;codecs=avc1,mp4a",
    "video/webm",
];

/// Pick the first preferred format the platform can encode
pub fn select_mime_type<S: AsRef<str>>(
    platform: &dyn CapturePlatform,
    preferred: &[S],
) -> Option<String> {
    preferred
        .iter()
        .map(AsRef::as_ref)
        .find(|mime| platform.is_mime_type_supported(mime))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockPlatform;

    #[test]
    fn test_selects_first_supported() {
        let platform =
            MockPlatform::new().with_supported_mime_types(&["video/webm", "video/webm;codecs=vp8,opus"]);
        assert_eq!(
            select_mime_type(&platform, PREFERRED_MIME_TYPES).as_deref(),
            Some("video/webm;codecs=vp8,opus")
        );
    }

    #[test]
    fn test_none_when_nothing_supported() {
        let platform = MockPlatform::new().with_supported_mime_types(&["video/x-matroska"]);
        assert_eq!(select_mime_type(&platform, PREFERRED_MIME_TYPES), None);
    }
}
