use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record written next to every stored payload. Never mutated after upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub image_id: String,
    pub filename: String,
    pub size: usize,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}
