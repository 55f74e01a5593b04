//! Recording state management
//!
//! Defines the recording state machine, the public snapshot and the
//! recording configuration.

use crate::capture::{DisplayConstraints, MicrophoneConstraints};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::codec::PREFERRED_MIME_TYPES;

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Acquiring capture sources
    Capturing,
    /// Currently recording
    Recording,
    /// Encoder paused without stopping
    Paused,
    /// Recording finalized
    Stopped,
}

impl RecordingState {
    /// Whether the session holds capture resources for an active attempt
    pub fn is_active(self) -> bool {
        matches!(self, Self::Capturing | Self::Recording | Self::Paused)
    }
}

/// Point-in-time view of a recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSnapshot {
    pub state: RecordingState,
    pub is_recording: bool,
    pub is_paused: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub segment_count: usize,
    pub recorded_bytes: usize,
    pub artifact_size: Option<usize>,
    pub mime_type: Option<String>,
    pub error: Option<String>,
    pub persist_across_navigation: bool,
}

/// The finalized output of one recording attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl RecordingArtifact {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension matching the container format
    pub fn extension(&self) -> &'static str {
        if self.mime_type.starts_with("video/mp4") {
            "mp4"
        } else {
            "webm"
        }
    }
}

/// Configuration for a recording session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingConfig {
    pub display: DisplayConstraints,

    pub microphone: MicrophoneConstraints,

    /// Target video bitrate in bits per second
    pub video_bits_per_second: u32,

    /// Target audio bitrate in bits per second
    pub audio_bits_per_second: u32,

    /// Encoder flush interval in milliseconds
    pub timeslice_ms: u64,

    /// Upper bound on waiting for the encoder to finalize, in milliseconds
    pub finalize_timeout_ms: u64,

    /// Container/codec combinations in order of preference
    pub preferred_mime_types: Vec<String>,
}

impl RecordingConfig {
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            display: DisplayConstraints::default(),
            microphone: MicrophoneConstraints::default(),
            video_bits_per_second: 5_000_000,
            audio_bits_per_second: 192_000,
            timeslice_ms: 1_000,
            finalize_timeout_ms: 10_000,
            preferred_mime_types: PREFERRED_MIME_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(!RecordingState::Idle.is_active());
        assert!(RecordingState::Capturing.is_active());
        assert!(RecordingState::Recording.is_active());
        assert!(RecordingState::Paused.is_active());
        assert!(!RecordingState::Stopped.is_active());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: RecordingConfig = serde_json::from_str(r#"{"timesliceMs": 500}"#).unwrap();
        assert_eq!(config.timeslice(), Duration::from_millis(500));
        assert_eq!(config.video_bits_per_second, 5_000_000);
        assert_eq!(config.audio_bits_per_second, 192_000);
        assert_eq!(config.preferred_mime_types.len(), PREFERRED_MIME_TYPES.len());
    }

    #[test]
    fn test_artifact_extension() {
        let webm = RecordingArtifact {
            data: vec![1],
            mime_type: "video/webm;codecs=vp9,opus".into(),
        };
        assert_eq!(webm.extension(), "webm");
        let mp4 = RecordingArtifact {
            data: vec![],
            mime_type: "video/mp4;codecs=avc1,mp4a".into(),
        };
        assert_eq!(mp4.extension(), "mp4");
        assert!(mp4.is_empty());
    }
}
