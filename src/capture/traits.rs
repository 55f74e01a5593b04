//! Capture trait definitions
//!
//! Platform-agnostic handles and traits for capture sources. A platform
//! backend hands out [`MediaTrack`]s grouped into [`MediaStream`]s; the
//! recorder only ever talks to these types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Errors reported by a capture platform
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No capture source available: {0}")]
    NotFound(String),

    #[error("Device busy: {0}")]
    DeviceBusy(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Lifecycle of a single track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// Producing media
    Live,
    /// Stopped by its owner
    Stopped,
    /// Ended by the source (user stopped sharing, device unplugged)
    Revoked,
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    state: watch::Sender<TrackState>,
}

/// Shared handle to a media track
///
/// Clones refer to the same underlying track, so a track that appears in
/// several streams (e.g. the screen video inside the composite stream) is
/// stopped once for all of them.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        let (state, _) = watch::channel(TrackState::Live);
        Self {
            inner: Arc::new(TrackInner {
                id: uuid::Uuid::new_v4().to_string(),
                kind,
                label: label.into(),
                state,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn state(&self) -> TrackState {
        *self.inner.state.borrow()
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    /// Stop the track. Stopping an ended track is a no-op.
    ///
    /// Returns `true` if this call ended the track.
    pub fn stop(&self) -> bool {
        self.end_with(TrackState::Stopped)
    }

    /// Mark the track as ended by its source.
    ///
    /// Platform backends call this when capture is revoked from outside the
    /// application.
    pub fn revoke(&self) -> bool {
        self.end_with(TrackState::Revoked)
    }

    fn end_with(&self, end: TrackState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if *state == TrackState::Live {
                *state = end;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once the track is no longer live, with the way it ended.
    pub async fn ended(&self) -> TrackState {
        let mut rx = self.inner.state.subscribe();
        // The sender lives as long as this handle, so the error arm is
        // unreachable in practice.
        let state = rx
            .wait_for(|state| *state != TrackState::Live)
            .await
            .map(|state| *state)
            .unwrap_or(TrackState::Stopped);
        state
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}

/// A group of tracks captured or composed together
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn from_tracks(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn active_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Stop every track in the stream, returning how many were still live.
    pub fn stop(&self) -> usize {
        self.tracks.iter().filter(|t| t.stop()).count()
    }
}

/// Constraints for a display capture request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Ask for system audio. The platform may still return a stream
    /// without audio if the user does not consent.
    pub system_audio: bool,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate: 30,
            system_audio: true,
        }
    }
}

/// Constraints for a microphone capture request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MicrophoneConstraints {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Encoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderOptions {
    pub mime_type: String,
    pub video_bits_per_second: u32,
    pub audio_bits_per_second: u32,
}

/// Notifications emitted by an encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A chunk of encoded output
    Data(Vec<u8>),
    Paused,
    Resumed,
    Error(String),
    /// The encoder has flushed its last chunk and finished
    Stopped,
}

/// Encoder lifecycle as seen by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Inactive,
    Recording,
    Paused,
}

/// Chunked media encoder
///
/// Output and notifications are delivered on the channel returned alongside
/// the encoder in [`EncoderHandle`].
pub trait MediaEncoder: Send {
    fn mime_type(&self) -> &str;

    fn state(&self) -> EncoderState;

    /// Start encoding, flushing accumulated output every `timeslice`.
    fn start(&mut self, timeslice: Duration) -> CaptureResult<()>;

    /// Request finalization. The encoder emits its last `Data` chunk and then
    /// `Stopped`.
    fn stop(&mut self) -> CaptureResult<()>;

    fn pause(&mut self) -> CaptureResult<()>;

    fn resume(&mut self) -> CaptureResult<()>;
}

/// A freshly created encoder and its event channel
pub struct EncoderHandle {
    pub encoder: Box<dyn MediaEncoder>,
    pub events: mpsc::UnboundedReceiver<EncoderEvent>,
}

/// Audio-processing graph combining several audio tracks into one
pub trait AudioMixer: Send {
    /// Route an audio track into the graph
    fn connect(&mut self, track: &MediaTrack) -> CaptureResult<()>;

    /// The stream carrying the single mixed output track
    fn output(&self) -> MediaStream;

    /// Tear down the graph. Closing twice is a no-op.
    fn close(&mut self);
}

/// A capture backend
#[async_trait]
pub trait CapturePlatform: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    fn supports_display_capture(&self) -> bool;

    fn supports_encoding(&self) -> bool;

    fn is_mime_type_supported(&self, mime_type: &str) -> bool;

    async fn capture_display(&self, constraints: &DisplayConstraints) -> CaptureResult<MediaStream>;

    async fn capture_microphone(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> CaptureResult<MediaStream>;

    fn create_mixer(&self) -> CaptureResult<Box<dyn AudioMixer>>;

    fn create_encoder(
        &self,
        stream: &MediaStream,
        options: &EncoderOptions,
    ) -> CaptureResult<EncoderHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_idempotent() {
        let track = MediaTrack::new(TrackKind::Audio, "mic");
        assert!(track.is_live());
        assert!(track.stop());
        assert!(!track.stop());
        assert!(!track.revoke());
        assert_eq!(track.state(), TrackState::Stopped);
    }

    #[test]
    fn test_stream_stop_counts_live_tracks() {
        let video = MediaTrack::new(TrackKind::Video, "screen");
        let audio = MediaTrack::new(TrackKind::Audio, "mic");
        audio.stop();

        let stream = MediaStream::from_tracks(vec![video.clone(), audio]);
        assert_eq!(stream.active_track_count(), 1);
        assert_eq!(stream.stop(), 1);
        assert_eq!(stream.active_track_count(), 0);
        assert!(!video.is_live());
    }

    #[tokio::test]
    async fn test_ended_reports_revocation() {
        let track = MediaTrack::new(TrackKind::Video, "screen");
        let watcher = {
            let track = track.clone();
            tokio::spawn(async move { track.ended().await })
        };
        tokio::task::yield_now().await;
        track.revoke();
        assert_eq!(watcher.await.unwrap(), TrackState::Revoked);
    }

    #[tokio::test]
    async fn test_ended_resolves_for_stopped_track() {
        let track = MediaTrack::new(TrackKind::Audio, "mic");
        track.stop();
        assert_eq!(track.ended().await, TrackState::Stopped);
    }

    #[test]
    fn test_default_constraints() {
        let display = DisplayConstraints::default();
        assert_eq!((display.width, display.height, display.frame_rate), (1280, 720, 30));
        assert!(display.system_audio);

        let mic = MicrophoneConstraints::default();
        assert_eq!(mic.sample_rate, 48_000);
        assert!(mic.echo_cancellation && mic.noise_suppression && mic.auto_gain_control);
    }
}
