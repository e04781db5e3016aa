/// Image formats accepted for upload, by filename extension.
pub const SUPPORTED_EXTENSIONS: [&str; 7] =
    [".jpg", ".jpeg", ".png", ".bmp", ".gif", ".tiff", ".webp"];

/// Cheap pre-decode gate on the filename. Checks the pattern only; a file
/// with a misleading extension passes here and fails at decode.
pub fn is_supported_image(filename: &str) -> bool {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_ascii_lowercase();
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|supported| supported[1..] == extension)
}
