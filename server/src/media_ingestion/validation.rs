use std::fmt;

use thiserror::Error;

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

const IMAGE_ID_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid file type. Allowed types: jpg, jpeg, png")]
    UnsupportedExtension,

    #[error("File too large. Maximum size: {max} bytes")]
    FileTooLarge { max: usize },

    #[error("Invalid file content. File must be a valid image (JPEG or PNG)")]
    ContentMismatch,
}

impl ValidationError {
    /// Machine-readable reason returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedExtension => "unsupported_extension",
            ValidationError::FileTooLarge { .. } => "file_too_large",
            ValidationError::ContentMismatch => "content_mismatch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    /// Detect the real format from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_SIGNATURE) {
            return Some(ImageKind::Png);
        }
        if bytes.starts_with(JPEG_SIGNATURE) {
            return Some(ImageKind::Jpeg);
        }
        None
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

fn extension_of(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    // ".png" is a hidden file without an extension
    if stem.is_empty() {
        return None;
    }
    Some(ext)
}

/// Extension gate, usable as soon as the multipart filename is known.
pub fn check_extension(file_name: &str) -> Result<ImageKind, ValidationError> {
    extension_of(file_name)
        .and_then(ImageKind::from_extension)
        .ok_or(ValidationError::UnsupportedExtension)
}

/// Gate an upload before it reaches storage.
///
/// Checks run cheapest first and stop at the first failure: extension, size,
/// then the magic-number inspection. On success the detected kind is returned.
pub fn validate_upload(
    file_name: &str,
    content_type: Option<&str>,
    file_data: &[u8],
    max_file_size: usize,
) -> Result<ImageKind, ValidationError> {
    let declared = check_extension(file_name)?;

    if file_data.len() > max_file_size {
        return Err(ValidationError::FileTooLarge { max: max_file_size });
    }

    let detected = ImageKind::sniff(file_data).ok_or(ValidationError::ContentMismatch)?;
    if detected != declared {
        return Err(ValidationError::ContentMismatch);
    }

    // Only an explicit image type can contradict the bytes; generic types are ignored.
    if let Some(claimed) = content_type.and_then(ImageKind::from_mime_type) {
        if claimed != detected {
            return Err(ValidationError::ContentMismatch);
        }
    }

    Ok(detected)
}

pub fn is_valid_image_id(image_id: &str) -> bool {
    // ids are issued in lowercase only
    image_id.len() == IMAGE_ID_LEN
        && image_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    fn jpeg_bytes() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0u8; 60]);
        data
    }

    fn png_bytes() -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&[0u8; 60]);
        data
    }

    #[test]
    fn test_validate_extension() {
        let data = jpeg_bytes();
        assert_eq!(validate_upload("face.jpg", None, &data, MAX), Ok(ImageKind::Jpeg));
        assert_eq!(validate_upload("FACE.JPEG", None, &data, MAX), Ok(ImageKind::Jpeg));
        assert_eq!(
            validate_upload("face.gif", None, &data, MAX),
            Err(ValidationError::UnsupportedExtension)
        );
        assert_eq!(
            validate_upload("face", None, &data, MAX),
            Err(ValidationError::UnsupportedExtension)
        );
    }

    #[test]
    fn test_validate_file_size() {
        let mut data = jpeg_bytes();
        data.resize(MAX, 0);
        assert!(validate_upload("face.jpg", None, &data, MAX).is_ok());

        data.push(0);
        assert_eq!(
            validate_upload("face.jpg", None, &data, MAX),
            Err(ValidationError::FileTooLarge { max: MAX })
        );
    }

    #[test]
    fn test_size_checked_before_content() {
        let data = vec![b'a'; MAX + 10];
        let err = validate_upload("notes.jpg", None, &data, MAX).unwrap_err();
        assert_eq!(err.code(), "file_too_large");
    }

    #[test]
    fn test_extension_checked_before_size() {
        let data = vec![b'a'; MAX + 10];
        let err = validate_upload("notes.txt", None, &data, MAX).unwrap_err();
        assert_eq!(err.code(), "unsupported_extension");
    }

    #[test]
    fn test_check_extension() {
        assert_eq!(check_extension("face.PNG"), Ok(ImageKind::Png));
        assert_eq!(check_extension("face.jpeg"), Ok(ImageKind::Jpeg));
        assert_eq!(check_extension("notes.txt"), Err(ValidationError::UnsupportedExtension));
        assert_eq!(check_extension(".png"), Err(ValidationError::UnsupportedExtension));
    }

    #[test]
    fn test_renamed_text_file_rejected() {
        let data = b"just some notes, definitely not an image".to_vec();
        assert_eq!(
            validate_upload("notes.jpg", None, &data, MAX),
            Err(ValidationError::ContentMismatch)
        );
    }

    #[test]
    fn test_signature_must_match_extension() {
        assert_eq!(
            validate_upload("face.png", None, &jpeg_bytes(), MAX),
            Err(ValidationError::ContentMismatch)
        );
        assert_eq!(
            validate_upload("face.jpg", None, &png_bytes(), MAX),
            Err(ValidationError::ContentMismatch)
        );
        assert_eq!(validate_upload("face.png", None, &png_bytes(), MAX), Ok(ImageKind::Png));
    }

    #[test]
    fn test_empty_file_rejected() {
        assert_eq!(
            validate_upload("face.png", None, &[], MAX),
            Err(ValidationError::ContentMismatch)
        );
    }

    #[test]
    fn test_declared_content_type() {
        let data = jpeg_bytes();
        assert!(validate_upload("face.jpg", Some("image/jpeg"), &data, MAX).is_ok());
        assert!(validate_upload("face.jpg", Some("application/octet-stream"), &data, MAX).is_ok());
        assert_eq!(
            validate_upload("face.jpg", Some("image/png"), &data, MAX),
            Err(ValidationError::ContentMismatch)
        );
    }

    #[test]
    fn test_image_id_format() {
        assert!(is_valid_image_id("0123456789abcdef0123456789abcdef"));
        assert!(!is_valid_image_id("abc123"));
        assert!(!is_valid_image_id("../../etc/passwd000000000000000000"));
        assert!(!is_valid_image_id("0123456789abcdef0123456789abcdeg"));
        assert!(!is_valid_image_id("0123456789ABCDEF0123456789ABCDEF"));
        assert!(!is_valid_image_id(""));
    }
}
