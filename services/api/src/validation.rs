//! Upload input validation

use regex::Regex;
use std::sync::OnceLock;

/// Content type assumed when the client does not send one
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Validate the uploaded file name
pub fn validate_filename(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("File name is required".to_string());
    }

    if name.len() > 255 {
        return Err("File name must be at most 255 characters long".to_string());
    }

    if name == "." || name == ".." {
        return Err("Invalid file name".to_string());
    }

    static FILENAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = FILENAME_REGEX
        .get_or_init(|| Regex::new(r"^[^/\\\x00-\x1f]+$").expect("Failed to compile file name regex"));

    if !regex.is_match(name) {
        return Err("File name cannot contain path separators or control characters".to_string());
    }

    Ok(())
}

/// Resolve the content type of an upload, defaulting to `video/mp4`
pub fn resolve_content_type(content_type: Option<&str>) -> Result<String, String> {
    let Some(content_type) = content_type.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(DEFAULT_CONTENT_TYPE.to_string());
    };

    static CONTENT_TYPE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = CONTENT_TYPE_REGEX.get_or_init(|| {
        Regex::new(r"^video/[a-zA-Z0-9][a-zA-Z0-9.+-]*$").expect("Failed to compile content type regex")
    });

    if !regex.is_match(content_type) {
        return Err(format!("Unsupported content type: {}", content_type));
    }

    Ok(content_type.to_string())
}

/// Validate the uploaded payload
pub fn validate_payload(data: &[u8]) -> Result<(), String> {
    if data.is_empty() {
        return Err("Uploaded file is empty".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename() {
        assert!(validate_filename("clip.mp4").is_ok());
        assert!(validate_filename("holiday video (1).mov").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("   ").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("dir\\clip.mp4").is_err());
        assert!(validate_filename(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_content_type() {
        assert_eq!(resolve_content_type(None).unwrap(), "video/mp4");
        assert_eq!(resolve_content_type(Some("")).unwrap(), "video/mp4");
        assert_eq!(resolve_content_type(Some("video/webm")).unwrap(), "video/webm");
        assert_eq!(
            resolve_content_type(Some("video/vnd.dlna.mpeg-tts")).unwrap(),
            "video/vnd.dlna.mpeg-tts"
        );
        assert!(resolve_content_type(Some("image/png")).is_err());
        assert!(resolve_content_type(Some("video/")).is_err());
    }

    #[test]
    fn test_payload() {
        assert!(validate_payload(b"data").is_ok());
        assert!(validate_payload(b"").is_err());
    }
}
