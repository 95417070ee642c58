//! Output format names and their MIME types.

/// Canonical spelling of a format name (`jpg` becomes `jpeg`, `htm` becomes
/// `html`, everything lowercased).
pub fn normalize_format(format: &str) -> String {
    match format.to_ascii_lowercase().as_str() {
        "jpg" => "jpeg".to_string(),
        "htm" => "html".to_string(),
        other => other.to_string(),
    }
}

/// MIME type produced for an output format, if the format is known.
pub fn mime_type_for(format: &str) -> Option<&'static str> {
    let mime = match normalize_format(format).as_str() {
        "png" => "image/png",
        "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "html" => "text/html",
        "pdf" => "application/pdf",
        "zip" | "extract" => "application/zip",
        _ => return None,
    };
    Some(mime)
}

/// File extension used when writing an output of the given format.
pub fn extension_for(format: &str) -> String {
    match normalize_format(format).as_str() {
        "extract" => "zip".to_string(),
        other => other.to_string(),
    }
}
