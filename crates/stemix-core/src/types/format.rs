//! Audio container/codec detection for fetched stems.

use serde::{Deserialize, Serialize};

/// Audio codec/format of a stem payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    /// Ogg container (Vorbis or Opus).
    Ogg,
    /// MP4/M4A container (AAC or ALAC).
    M4a,
    WebM,
    #[default]
    Unknown,
}

impl AudioFormat {
    /// Parse from a MIME type such as `audio/mpeg` or `audio/wav`.
    pub fn from_mime(mime: &str) -> Self {
        let mime_lower = mime.to_lowercase();

        if mime_lower.contains("wav") || mime_lower.contains("wave") {
            Self::Wav
        } else if mime_lower.contains("mpeg") || mime_lower.contains("mp3") {
            Self::Mp3
        } else if mime_lower.contains("flac") {
            Self::Flac
        } else if mime_lower.contains("ogg") || mime_lower.contains("vorbis") {
            Self::Ogg
        } else if mime_lower.contains("mp4") || mime_lower.contains("m4a") || mime_lower.contains("aac") {
            Self::M4a
        } else if mime_lower.contains("webm") || mime_lower.contains("opus") {
            Self::WebM
        } else {
            Self::Unknown
        }
    }

    /// Guess from the file extension at the end of a path or URL.
    ///
    /// Query strings and fragments are ignored.
    pub fn from_locator(locator: &str) -> Self {
        let path = locator
            .split(['?', '#'])
            .next()
            .unwrap_or(locator);
        let Some((_, ext)) = path.rsplit_once('.') else {
            return Self::Unknown;
        };
        if ext.contains('/') {
            return Self::Unknown;
        }

        match ext.to_lowercase().as_str() {
            "wav" | "wave" => Self::Wav,
            "mp3" => Self::Mp3,
            "flac" => Self::Flac,
            "ogg" | "oga" | "opus" => Self::Ogg,
            "m4a" | "mp4" | "aac" => Self::M4a,
            "webm" => Self::WebM,
            _ => Self::Unknown,
        }
    }

    /// File extension used as a demuxer hint.
    pub const fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Wav => Some("wav"),
            Self::Mp3 => Some("mp3"),
            Self::Flac => Some("flac"),
            Self::Ogg => Some("ogg"),
            Self::M4a => Some("m4a"),
            Self::WebM => Some("webm"),
            Self::Unknown => None,
        }
    }
}
