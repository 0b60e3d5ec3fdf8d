//! Audio item types, format allow-list, and pre-admission validation.
//!
//! Validation runs before admission so invalid requests never occupy a
//! quota slot or a worker: size limit, non-empty payload, recognized
//! format, and a cheap WAV header sanity check for declared-WAV payloads.

use crate::error::{Result, ScribeqError};
use std::fmt;
use std::io::Cursor;

/// Accepted audio formats.
///
/// Fixed allow-list; anything outside it is rejected at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Ogg,
    Opus,
    Mp3,
    M4a,
    Wav,
    Flac,
    Aac,
    Webm,
}

impl AudioFormat {
    /// All accepted formats, in allow-list order.
    pub const ALL: &'static [AudioFormat] = &[
        AudioFormat::Ogg,
        AudioFormat::Opus,
        AudioFormat::Mp3,
        AudioFormat::M4a,
        AudioFormat::Wav,
        AudioFormat::Flac,
        AudioFormat::Aac,
        AudioFormat::Webm,
    ];

    /// Resolve a MIME type to a format, if it is on the allow-list.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "audio/ogg" => Some(AudioFormat::Ogg),
            "audio/opus" => Some(AudioFormat::Opus),
            "audio/mpeg" | "audio/mp3" => Some(AudioFormat::Mp3),
            "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some(AudioFormat::M4a),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(AudioFormat::Wav),
            "audio/flac" | "audio/x-flac" => Some(AudioFormat::Flac),
            "audio/aac" => Some(AudioFormat::Aac),
            "audio/webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Resolve a file extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ogg" | "oga" => Some(AudioFormat::Ogg),
            "opus" => Some(AudioFormat::Opus),
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "mp4" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "aac" => Some(AudioFormat::Aac),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Canonical file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::Opus => "opus",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
            AudioFormat::Webm => "webm",
        }
    }

    /// Canonical MIME type for this format.
    pub fn mime(&self) -> &'static str {
        match self {
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Opus => "audio/opus",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Aac => "audio/aac",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One inbound audio payload as handed over by the transport collaborator.
#[derive(Debug, Clone)]
pub struct AudioItem {
    /// Raw audio bytes.
    pub payload: Vec<u8>,
    /// Declared MIME type (e.g. "audio/ogg").
    pub mime_type: String,
    /// Original file name, if the transport provided one. Voice messages
    /// typically arrive without a name.
    pub file_name: Option<String>,
}

impl AudioItem {
    /// Creates a new audio item.
    pub fn new(payload: Vec<u8>, mime_type: &str, file_name: Option<&str>) -> Self {
        Self {
            payload,
            mime_type: mime_type.to_string(),
            file_name: file_name.map(str::to_string),
        }
    }

    /// Resolve the declared format: MIME type first, file extension as a
    /// fallback for transports that send generic MIME types.
    pub fn format(&self) -> Option<AudioFormat> {
        AudioFormat::from_mime(&self.mime_type).or_else(|| {
            self.file_name
                .as_deref()
                .and_then(|name| name.rsplit_once('.'))
                .and_then(|(_, ext)| AudioFormat::from_extension(ext))
        })
    }

    /// Effective file name for logging and temp files.
    ///
    /// Unnamed payloads get a derived name: voice messages become
    /// `voice_message.<ext>`, everything else `audio_file.<ext>`.
    pub fn display_name(&self, format: AudioFormat) -> String {
        match &self.file_name {
            Some(name) => name.clone(),
            None if format == AudioFormat::Ogg || format == AudioFormat::Opus => {
                format!("voice_message.{}", format.extension())
            }
            None => format!("audio_file.{}", format.extension()),
        }
    }
}

/// Validation limits, taken from configuration.
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    /// Maximum accepted payload size in bytes.
    pub max_payload_bytes: u64,
    /// Accepted file extensions (lowercase, no dot).
    pub accepted_extensions: Vec<String>,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: crate::defaults::MAX_PAYLOAD_BYTES,
            accepted_extensions: AudioFormat::ALL
                .iter()
                .map(|f| f.extension().to_string())
                .collect(),
        }
    }
}

/// Validate an inbound audio item against the configured limits.
///
/// Returns the resolved format on success. Checks, in order: payload
/// non-empty, payload within the size limit, format recognized and on the
/// configured allow-list, and (for declared-WAV payloads) a parseable
/// WAV header.
pub fn validate(item: &AudioItem, limits: &ValidationLimits) -> Result<AudioFormat> {
    if item.payload.is_empty() {
        return Err(ScribeqError::EmptyPayload);
    }

    let size = item.payload.len() as u64;
    if size > limits.max_payload_bytes {
        return Err(ScribeqError::PayloadTooLarge {
            size,
            limit: limits.max_payload_bytes,
        });
    }

    let format = item.format().ok_or_else(|| ScribeqError::UnsupportedFormat {
        format: item
            .file_name
            .clone()
            .unwrap_or_else(|| item.mime_type.clone()),
    })?;

    if !limits
        .accepted_extensions
        .iter()
        .any(|ext| ext == format.extension())
    {
        return Err(ScribeqError::UnsupportedFormat {
            format: format.extension().to_string(),
        });
    }

    // WAV is the one container we can sanity-check without a decoder stack;
    // a truncated or bogus header would otherwise burn a worker slot.
    if format == AudioFormat::Wav {
        hound::WavReader::new(Cursor::new(&item.payload)).map_err(|e| {
            ScribeqError::UnreadableAudio {
                message: e.to_string(),
            }
        })?;
    }

    Ok(format)
}
