use serde::{Deserialize, Serialize};
use std::path::Path;

/// Directory a merged object is filed under, derived from the filename's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkClass {
    Media,
    Videos,
    Other,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv"];

impl ChunkClass {
    /// Classify a filename by its extension, matching the original image/video
    /// extension lists case-insensitively.
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some(e) if IMAGE_EXTENSIONS.contains(&e) => ChunkClass::Media,
            Some(e) if VIDEO_EXTENSIONS.contains(&e) => ChunkClass::Videos,
            _ => ChunkClass::Other,
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            ChunkClass::Media => "media",
            ChunkClass::Videos => "videos",
            ChunkClass::Other => "other",
        }
    }
}

/// Strip the `upload-` prefix from a session id and join with the filename,
/// matching the original `MakeKey` helper. This is the key the progress counter
/// and failed-job ledger are indexed by.
pub fn normalise(session_id: &str, filename: &str) -> String {
    let stripped = session_id.strip_prefix("upload-").unwrap_or(session_id);
    format!("{stripped}_{filename}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub path: std::path::PathBuf,
    pub merged_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_images() {
        assert_eq!(ChunkClass::from_filename("a.JPG"), ChunkClass::Media);
        assert_eq!(ChunkClass::from_filename("a.png"), ChunkClass::Media);
    }

    #[test]
    fn classifies_videos() {
        assert_eq!(ChunkClass::from_filename("movie.MP4"), ChunkClass::Videos);
    }

    #[test]
    fn classifies_other() {
        assert_eq!(ChunkClass::from_filename("doc.pdf"), ChunkClass::Other);
        assert_eq!(ChunkClass::from_filename("noext"), ChunkClass::Other);
    }

    #[test]
    fn normalise_strips_upload_prefix() {
        assert_eq!(normalise("upload-abc123", "file.txt"), "abc123_file.txt");
        assert_eq!(normalise("abc123", "file.txt"), "abc123_file.txt");
    }
}
