//! Recording session
//!
//! Acquires the screen and microphone streams, mixes their audio, feeds the
//! composite stream to a chunked encoder and tears everything down again.
//! All four streams are held together or not at all.

use super::codec::select_mime_type;
use super::state::{RecordingArtifact, RecordingConfig, RecordingSnapshot, RecordingState};
use crate::capture::{
    AudioMixer, CaptureError, CapturePlatform, EncoderEvent, EncoderHandle, EncoderOptions,
    MediaEncoder, MediaStream, MediaTrack, TrackState,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Reason recorded when the platform cannot capture the display at all
pub const UNSUPPORTED_MESSAGE: &str = "Screen recording not supported in this browser";

/// Recording-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("{0}")]
    CapabilityUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("No supported recording format found")]
    EncodingUnsupported,

    #[error("Failed to acquire {failed} after acquiring {acquired}: {source}")]
    AcquisitionPartialFailure {
        acquired: &'static str,
        failed: &'static str,
        source: CaptureError,
    },

    #[error("Encoder error: {0}")]
    EncoderRuntime(String),

    #[error("A recording is already in progress")]
    AlreadyActive,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Screen capture failed: {0}")]
    Capture(CaptureError),
}

impl RecordingError {
    /// Whether the user declined a capture prompt
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::AcquisitionPartialFailure {
                    source: CaptureError::PermissionDenied(_),
                    ..
                }
        )
    }

    /// Short message suitable for a notification
    pub fn user_message(&self) -> &'static str {
        if self.is_permission_denied() {
            return "Screen or microphone access was denied. Please allow access and try again.";
        }
        match self {
            Self::CapabilityUnavailable(_) => "Screen recording is not supported on this device.",
            Self::EncodingUnsupported => "Recording is not supported in this browser.",
            Self::EncoderRuntime(_) => "The recording ran into a problem.",
            Self::AlreadyActive => "A recording is already in progress.",
            Self::NotRecording => "There is no recording in progress.",
            _ => "Could not start recording. Please check your devices and try again.",
        }
    }

    fn from_display_error(error: CaptureError) -> Self {
        match error {
            CaptureError::PermissionDenied(reason) => Self::PermissionDenied(reason),
            CaptureError::Unsupported(_) => Self::CapabilityUnavailable(UNSUPPORTED_MESSAGE.to_string()),
            other => Self::Capture(other),
        }
    }
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Encoder running against the composite stream
    Started { mime_type: String },
    /// One flushed chunk appended
    SegmentRecorded { bytes: usize, segments: usize },
    Paused,
    Resumed,
    Error(String),
    /// The screen source was ended from outside the application
    SourceEnded { persisted: bool },
    /// Artifact assembled
    Stopped { artifact_size: usize },
    /// Every owned track has been stopped
    ResourcesReleased { tracks_stopped: usize },
}

#[derive(Default)]
struct SessionState {
    phase: RecordingState,
    /// Bumped on every start so callbacks from an earlier attempt are ignored
    generation: u64,
    start_time: Option<DateTime<Utc>>,
    started_at: Option<Instant>,
    final_duration: Option<Duration>,
    segments: Vec<Vec<u8>>,
    accepting_segments: bool,
    artifact: Option<RecordingArtifact>,
    mime_type: Option<String>,
    error: Option<String>,
    persist: bool,
}

/// Streams acquired for one attempt
struct CaptureResources {
    screen: MediaStream,
    microphone: MediaStream,
    mixed: MediaStream,
    composite: MediaStream,
    mixer: Box<dyn AudioMixer>,
}

impl CaptureResources {
    /// Stop every owned track. Safe to call repeatedly.
    fn release(&mut self) -> usize {
        let mut stopped = self.composite.stop() + self.mixed.stop();
        self.mixer.close();
        stopped += self.microphone.stop();
        stopped += self.screen.stop();
        stopped
    }
}

impl Drop for CaptureResources {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resources acquired so far during `start_recording`
///
/// Dropping it stops everything it holds, so any early return rolls back.
#[derive(Default)]
struct PendingCapture {
    screen: Option<MediaStream>,
    microphone: Option<MediaStream>,
    mixer: Option<Box<dyn AudioMixer>>,
}

impl PendingCapture {
    fn commit(mut self, mixed: MediaStream, composite: MediaStream) -> Option<CaptureResources> {
        Some(CaptureResources {
            screen: self.screen.take()?,
            microphone: self.microphone.take()?,
            mixer: self.mixer.take()?,
            mixed,
            composite,
        })
    }
}

impl Drop for PendingCapture {
    fn drop(&mut self) {
        let mut stopped = 0;
        if let Some(mut mixer) = self.mixer.take() {
            mixer.close();
        }
        if let Some(microphone) = self.microphone.take() {
            stopped += microphone.stop();
        }
        if let Some(screen) = self.screen.take() {
            stopped += screen.stop();
        }
        if stopped > 0 {
            tracing::debug!(tracks_stopped = stopped, "Rolled back partial capture");
        }
    }
}

struct ActiveCapture {
    resources: CaptureResources,
    encoder: Box<dyn MediaEncoder>,
    finalized: oneshot::Receiver<()>,
    pump: JoinHandle<()>,
}

struct Inner {
    platform: Arc<dyn CapturePlatform>,
    config: RecordingConfig,
    state: RwLock<SessionState>,
    active: Mutex<Option<ActiveCapture>>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl Inner {
    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Apply one encoder notification. Returns `true` once the encoder has
    /// finalized.
    fn handle_encoder_event(&self, generation: u64, event: EncoderEvent) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            tracing::debug!("Ignoring encoder event from an earlier recording");
            return matches!(event, EncoderEvent::Stopped);
        }

        let (notify, finished) = match event {
            EncoderEvent::Data(chunk) => {
                if chunk.is_empty() {
                    (None, false)
                } else if !state.accepting_segments {
                    tracing::debug!(bytes = chunk.len(), "Dropping segment after finalization");
                    (None, false)
                } else {
                    let bytes = chunk.len();
                    state.segments.push(chunk);
                    let segments = state.segments.len();
                    tracing::debug!(bytes, segments, "Segment recorded");
                    (Some(RecordingEvent::SegmentRecorded { bytes, segments }), false)
                }
            }
            EncoderEvent::Paused => {
                if state.phase == RecordingState::Recording {
                    state.phase = RecordingState::Paused;
                    tracing::info!("Recording paused");
                    (Some(RecordingEvent::Paused), false)
                } else {
                    (None, false)
                }
            }
            EncoderEvent::Resumed => {
                if state.phase == RecordingState::Paused {
                    state.phase = RecordingState::Recording;
                    tracing::info!("Recording resumed");
                    (Some(RecordingEvent::Resumed), false)
                } else {
                    (None, false)
                }
            }
            EncoderEvent::Error(message) => {
                tracing::error!("Encoder error: {}", message);
                let reason = RecordingError::EncoderRuntime(message).to_string();
                state.error = Some(reason.clone());
                (Some(RecordingEvent::Error(reason)), false)
            }
            EncoderEvent::Stopped => {
                state.accepting_segments = false;
                (None, true)
            }
        };
        drop(state);

        if let Some(event) = notify {
            self.emit(event);
        }
        finished
    }
}

async fn pump_encoder_events(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<EncoderEvent>,
    finalized: oneshot::Sender<()>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.handle_encoder_event(generation, event) {
            let _ = finalized.send(());
            return;
        }
    }
}

/// Manages one screen + microphone recording at a time
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct RecordingSession {
    inner: Arc<Inner>,
}

impl RecordingSession {
    pub fn new(platform: Arc<dyn CapturePlatform>, config: RecordingConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(Inner {
                platform,
                config,
                state: RwLock::new(SessionState::default()),
                active: Mutex::new(None),
                event_tx,
            }),
        }
    }

    /// Whether a platform exposes the minimum capture and encoding primitives
    pub fn is_supported(platform: &dyn CapturePlatform) -> bool {
        platform.supports_display_capture() && platform.supports_encoding()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.inner.config
    }

    /// Check capture and codec support without acquiring anything
    pub fn initialize_recording(&self) -> bool {
        let platform = self.inner.platform.as_ref();
        let failure = if !platform.supports_display_capture() {
            Some(UNSUPPORTED_MESSAGE.to_string())
        } else if !platform.supports_encoding() {
            Some(RecordingError::EncodingUnsupported.to_string())
        } else {
            match select_mime_type(platform, &self.inner.config.preferred_mime_types) {
                Some(mime_type) => {
                    tracing::info!(
                        platform = platform.name(),
                        mime_type = %mime_type,
                        "Recording capability check passed"
                    );
                    None
                }
                None => Some(RecordingError::EncodingUnsupported.to_string()),
            }
        };

        match failure {
            Some(reason) => {
                tracing::warn!(platform = platform.name(), "Recording unavailable: {}", reason);
                self.inner.state.write().error = Some(reason);
                false
            }
            None => true,
        }
    }

    /// Keep the recording alive when the screen source is ended externally
    pub fn set_persist_recording(&self, persist: bool) {
        tracing::debug!(persist, "Persist recording flag updated");
        self.inner.state.write().persist = persist;
    }

    /// Start recording
    pub async fn start_recording(&self) -> RecordingResult<()> {
        let generation = {
            let mut state = self.inner.state.write();
            if state.phase.is_active() {
                return Err(RecordingError::AlreadyActive);
            }
            let persist = state.persist;
            let generation = state.generation + 1;
            *state = SessionState {
                phase: RecordingState::Capturing,
                generation,
                persist,
                ..SessionState::default()
            };
            generation
        };

        match self.acquire_and_start(generation).await {
            Ok(mime_type) => {
                tracing::info!(mime_type = %mime_type, "Recording started");
                self.inner.emit(RecordingEvent::Started { mime_type });
                Ok(())
            }
            Err(err) => {
                tracing::error!("Failed to start recording: {}", err);
                {
                    let mut state = self.inner.state.write();
                    if state.generation == generation {
                        state.phase = RecordingState::Idle;
                        state.error = Some(err.to_string());
                    }
                }
                self.inner.emit(RecordingEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn acquire_and_start(&self, generation: u64) -> RecordingResult<String> {
        let platform = self.inner.platform.as_ref();
        let config = &self.inner.config;

        if !Self::is_supported(platform) {
            return Err(RecordingError::CapabilityUnavailable(UNSUPPORTED_MESSAGE.to_string()));
        }
        let mime_type = select_mime_type(platform, &config.preferred_mime_types)
            .ok_or(RecordingError::EncodingUnsupported)?;

        let mut pending = PendingCapture::default();

        let screen = platform
            .capture_display(&config.display)
            .await
            .map_err(RecordingError::from_display_error)?;
        tracing::info!(
            video_tracks = screen.video_tracks().count(),
            audio_tracks = screen.audio_tracks().count(),
            "Screen capture acquired"
        );
        let screen = pending.screen.insert(screen).clone();
        let screen_video = screen.video_tracks().next().cloned().ok_or_else(|| {
            RecordingError::Capture(CaptureError::NotFound("display stream has no video track".into()))
        })?;
        if screen.audio_tracks().next().is_none() {
            tracing::info!("Screen capture has no system audio, recording microphone only");
        }

        let microphone = platform
            .capture_microphone(&config.microphone)
            .await
            .map_err(|source| RecordingError::AcquisitionPartialFailure {
                acquired: "screen",
                failed: "microphone",
                source,
            })?;
        tracing::info!("Microphone acquired");
        let microphone = pending.microphone.insert(microphone).clone();

        let partial = |failed: &'static str| {
            move |source: CaptureError| RecordingError::AcquisitionPartialFailure {
                acquired: "screen and microphone",
                failed,
                source,
            }
        };

        let mixer = pending
            .mixer
            .insert(platform.create_mixer().map_err(partial("audio mixer"))?);
        for track in screen.audio_tracks().chain(microphone.audio_tracks()) {
            mixer.connect(track).map_err(partial("audio mixer"))?;
        }
        let mixed = mixer.output();
        let mixed_audio = mixed.audio_tracks().next().cloned().ok_or_else(|| {
            RecordingError::Capture(CaptureError::Platform("mixer produced no audio track".into()))
        })?;

        let composite = MediaStream::from_tracks(vec![screen_video.clone(), mixed_audio]);
        let options = EncoderOptions {
            mime_type: mime_type.clone(),
            video_bits_per_second: config.video_bits_per_second,
            audio_bits_per_second: config.audio_bits_per_second,
        };
        let EncoderHandle { mut encoder, events } = platform
            .create_encoder(&composite, &options)
            .map_err(|err| match err {
                CaptureError::Unsupported(_) => RecordingError::EncodingUnsupported,
                other => RecordingError::EncoderRuntime(other.to_string()),
            })?;
        encoder
            .start(config.timeslice())
            .map_err(|err| RecordingError::EncoderRuntime(err.to_string()))?;

        let Some(resources) = pending.commit(mixed, composite) else {
            return Err(RecordingError::Capture(CaptureError::Platform(
                "capture resources incomplete".into(),
            )));
        };

        {
            let mut state = self.inner.state.write();
            state.accepting_segments = true;
            state.mime_type = Some(mime_type.clone());
        }

        let (finalized_tx, finalized) = oneshot::channel();
        let pump = tokio::spawn(pump_encoder_events(
            Arc::downgrade(&self.inner),
            generation,
            events,
            finalized_tx,
        ));
        *self.inner.active.lock() = Some(ActiveCapture {
            resources,
            encoder,
            finalized,
            pump,
        });

        {
            let mut state = self.inner.state.write();
            state.phase = RecordingState::Recording;
            state.start_time = Some(Utc::now());
            state.started_at = Some(Instant::now());
        }

        self.watch_screen_source(generation, screen_video);
        Ok(mime_type)
    }

    /// Stop automatically when the screen source is revoked, unless the
    /// recording is marked to persist.
    fn watch_screen_source(&self, generation: u64, track: MediaTrack) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            if track.ended().await != TrackState::Revoked {
                return;
            }
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let session = RecordingSession { inner };

            let persisted = {
                let state = session.inner.state.read();
                if state.generation != generation
                    || !matches!(state.phase, RecordingState::Recording | RecordingState::Paused)
                {
                    return;
                }
                state.persist
            };

            tracing::warn!(persisted, "Screen capture source ended externally");
            session.inner.emit(RecordingEvent::SourceEnded { persisted });
            if persisted {
                return;
            }
            if let Some(artifact) = session.stop_recording().await {
                tracing::info!(
                    artifact_size = artifact.size(),
                    "Recording stopped after capture source ended"
                );
            }
        });
    }

    /// Stop recording and return the finalized artifact
    ///
    /// Returns `None` if nothing was recording. Every owned track is stopped
    /// before this resolves, whether or not the encoder finalized cleanly.
    pub async fn stop_recording(&self) -> Option<RecordingArtifact> {
        {
            let mut state = self.inner.state.write();
            if !matches!(state.phase, RecordingState::Recording | RecordingState::Paused) {
                tracing::debug!(state = ?state.phase, "Stop requested with nothing recording");
                return None;
            }
            state.persist = false;
        }
        let active = self.inner.active.lock().take()?;
        let ActiveCapture {
            mut resources,
            mut encoder,
            finalized,
            pump,
        } = active;

        tracing::info!("Stopping recording");

        match encoder.stop() {
            Ok(()) => {
                let timeout = self.inner.config.finalize_timeout();
                match tokio::time::timeout(timeout, finalized).await {
                    Ok(Ok(())) => tracing::debug!("Encoder finalized"),
                    Ok(Err(_)) => tracing::warn!("Encoder events closed before finalizing"),
                    Err(_) => tracing::warn!(?timeout, "Timed out waiting for encoder to finalize"),
                }
            }
            Err(err) => {
                tracing::error!("Failed to finalize encoder: {}", err);
                self.inner.state.write().error =
                    Some(RecordingError::EncoderRuntime(err.to_string()).to_string());
            }
        }
        pump.abort();
        drop(encoder);

        let artifact = {
            let mut state = self.inner.state.write();
            state.accepting_segments = false;
            let artifact = RecordingArtifact {
                data: state.segments.concat(),
                mime_type: state.mime_type.clone().unwrap_or_default(),
            };
            state.final_duration = state.started_at.map(|t| t.elapsed());
            state.started_at = None;
            state.start_time = None;
            state.phase = RecordingState::Stopped;
            state.artifact = Some(artifact.clone());
            artifact
        };

        let tracks_stopped = resources.release();
        drop(resources);

        tracing::info!(
            artifact_size = artifact.size(),
            tracks_stopped,
            "Recording stopped"
        );
        self.inner.emit(RecordingEvent::Stopped {
            artifact_size: artifact.size(),
        });
        self.inner
            .emit(RecordingEvent::ResourcesReleased { tracks_stopped });

        Some(artifact)
    }

    /// Ask the encoder to pause. The state changes on its notification.
    pub fn pause_recording(&self) -> RecordingResult<()> {
        let mut active = self.inner.active.lock();
        let active = active.as_mut().ok_or(RecordingError::NotRecording)?;
        active
            .encoder
            .pause()
            .map_err(|err| RecordingError::EncoderRuntime(err.to_string()))
    }

    /// Ask the encoder to resume. The state changes on its notification.
    pub fn resume_recording(&self) -> RecordingResult<()> {
        let mut active = self.inner.active.lock();
        let active = active.as_mut().ok_or(RecordingError::NotRecording)?;
        active
            .encoder
            .resume()
            .map_err(|err| RecordingError::EncoderRuntime(err.to_string()))
    }

    /// Get the current state snapshot
    pub fn get_state(&self) -> RecordingSnapshot {
        let state = self.inner.state.read();
        RecordingSnapshot {
            state: state.phase,
            is_recording: matches!(state.phase, RecordingState::Recording | RecordingState::Paused),
            is_paused: state.phase == RecordingState::Paused,
            start_time: state.start_time,
            segment_count: state.segments.len(),
            recorded_bytes: state.segments.iter().map(Vec::len).sum(),
            artifact_size: state.artifact.as_ref().map(RecordingArtifact::size),
            mime_type: state.mime_type.clone(),
            error: state.error.clone(),
            persist_across_navigation: state.persist,
        }
    }

    /// Elapsed whole seconds of the current (or last finished) recording
    pub fn get_recording_duration(&self) -> u64 {
        let state = self.inner.state.read();
        match (state.started_at, state.final_duration) {
            (Some(started_at), _) => started_at.elapsed().as_secs(),
            (None, Some(duration)) => duration.as_secs(),
            (None, None) => 0,
        }
    }

    /// Hand out the finalized artifact, leaving none behind
    pub fn take_artifact(&self) -> Option<RecordingArtifact> {
        self.inner.state.write().artifact.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockPlatform;

    fn session_with(platform: &MockPlatform) -> RecordingSession {
        RecordingSession::new(Arc::new(platform.clone()), RecordingConfig::default())
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[test]
    fn test_initialize_without_display_capture() {
        let platform = MockPlatform::new().without_display_capture();
        let session = session_with(&platform);

        assert!(!session.initialize_recording());
        assert_eq!(session.get_state().error.as_deref(), Some(UNSUPPORTED_MESSAGE));
        assert!(!RecordingSession::is_supported(&platform));
        assert_eq!(platform.created_track_count(), 0);
    }

    #[test]
    fn test_initialize_without_supported_codec() {
        let platform = MockPlatform::new().with_supported_mime_types(&["video/ogg"]);
        let session = session_with(&platform);

        assert!(!session.initialize_recording());
        assert_eq!(
            session.get_state().error.as_deref(),
            Some("No supported recording format found")
        );
    }

    #[test]
    fn test_initialize_succeeds() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);
        assert!(session.initialize_recording());
        assert!(session.get_state().error.is_none());
        assert_eq!(session.get_state().state, RecordingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_three_seconds() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        let snapshot = session.get_state();
        assert_eq!(snapshot.state, RecordingState::Recording);
        assert!(snapshot.is_recording);
        assert!(snapshot.start_time.is_some());
        assert_eq!(snapshot.mime_type.as_deref(), Some("video/webm;codecs=vp8,opus"));
        // screen video, system audio, microphone, mixed output
        assert_eq!(platform.live_track_count(), 4);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(session.get_recording_duration() >= 3);

        let artifact = session.stop_recording().await.unwrap();
        assert!(!artifact.is_empty());
        assert_eq!(platform.live_track_count(), 0);

        let snapshot = session.get_state();
        assert_eq!(snapshot.state, RecordingState::Stopped);
        assert!(!snapshot.is_recording);
        assert!(snapshot.start_time.is_none());
        assert_eq!(snapshot.artifact_size, Some(artifact.size()));
        assert_eq!(snapshot.recorded_bytes, artifact.size());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(session.stop_recording().await.is_some());
        assert!(session.stop_recording().await.is_none());
        assert!(session.get_state().error.is_none());
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let session = session_with(&MockPlatform::new());
        assert!(session.stop_recording().await.is_none());
        assert!(session.get_state().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_microphone_denied_rolls_back_screen() {
        let platform = MockPlatform::new().deny_microphone();
        let session = session_with(&platform);

        let err = session.start_recording().await.unwrap_err();
        assert!(matches!(err, RecordingError::AcquisitionPartialFailure { failed: "microphone", .. }));
        assert!(err.is_permission_denied());

        let snapshot = session.get_state();
        assert_eq!(snapshot.state, RecordingState::Idle);
        assert!(!snapshot.error.unwrap_or_default().is_empty());
        // screen video and system audio were handed out, then stopped
        assert_eq!(platform.created_track_count(), 2);
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_display_denied() {
        let platform = MockPlatform::new().deny_display();
        let session = session_with(&platform);

        let err = session.start_recording().await.unwrap_err();
        assert!(matches!(err, RecordingError::PermissionDenied(_)));
        assert_eq!(platform.created_track_count(), 0);
        assert!(session.get_state().error.is_some());
    }

    #[tokio::test]
    async fn test_mixer_failure_releases_both_streams() {
        let platform = MockPlatform::new().fail_mixer();
        let session = session_with(&platform);

        let err = session.start_recording().await.unwrap_err();
        assert!(matches!(
            err,
            RecordingError::AcquisitionPartialFailure { failed: "audio mixer", .. }
        ));
        assert_eq!(platform.created_track_count(), 3);
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_codec_acquires_nothing() {
        let platform = MockPlatform::new().with_supported_mime_types(&[]);
        let session = session_with(&platform);

        let err = session.start_recording().await.unwrap_err();
        assert_eq!(err, RecordingError::EncodingUnsupported);
        assert_eq!(platform.created_track_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_microphone_only_when_no_system_audio() {
        let platform = MockPlatform::new().without_system_audio();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        assert_eq!(platform.live_track_count(), 3);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(session.stop_recording().await.is_some());
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        assert_eq!(session.start_recording().await.unwrap_err(), RecordingError::AlreadyActive);
        assert_eq!(session.get_state().state, RecordingState::Recording);
        assert_eq!(platform.live_track_count(), 4);
        session.stop_recording().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_accounting() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);
        assert_eq!(session.get_recording_duration(), 0);

        session.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let during = session.get_recording_duration();
        assert_eq!(during, 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(session.get_recording_duration() >= during);

        session.stop_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.get_recording_duration(), 3);

        session.start_recording().await.unwrap();
        assert_eq!(session.get_recording_duration(), 0);
        session.stop_recording().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_transient_state() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        session.stop_recording().await.unwrap();

        session.start_recording().await.unwrap();
        let snapshot = session.get_state();
        assert_eq!(snapshot.segment_count, 0);
        assert_eq!(snapshot.artifact_size, None);
        assert!(snapshot.error.is_none());
        session.stop_recording().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_revoked_source_stops_recording() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(platform.revoke_display(), 1);
        settle().await;

        let snapshot = session.get_state();
        assert_eq!(snapshot.state, RecordingState::Stopped);
        assert!(snapshot.artifact_size.unwrap_or_default() > 0);
        assert_eq!(platform.live_track_count(), 0);
        assert!(session.take_artifact().is_some());
        assert!(session.take_artifact().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persisted_recording_survives_revocation() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        session.set_persist_recording(true);
        platform.revoke_display();
        settle().await;

        let snapshot = session.get_state();
        assert_eq!(snapshot.state, RecordingState::Recording);
        assert!(snapshot.persist_across_navigation);

        let artifact = session.stop_recording().await.unwrap();
        assert!(!artifact.is_empty());
        assert!(!session.get_state().persist_across_navigation);
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_error_keeps_recording() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        platform.last_encoder().unwrap().emit_error("disk full");
        settle().await;

        let snapshot = session.get_state();
        assert_eq!(snapshot.state, RecordingState::Recording);
        assert_eq!(snapshot.error.as_deref(), Some("Encoder error: disk full"));
        session.stop_recording().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_follow_encoder() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        session.pause_recording().unwrap();
        settle().await;
        let snapshot = session.get_state();
        assert_eq!(snapshot.state, RecordingState::Paused);
        assert!(snapshot.is_paused && snapshot.is_recording);

        session.resume_recording().unwrap();
        settle().await;
        assert_eq!(session.get_state().state, RecordingState::Recording);

        session.pause_recording().unwrap();
        settle().await;
        assert!(session.stop_recording().await.is_some());
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_segment_is_dropped() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);

        session.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let control = platform.last_encoder().unwrap();
        let artifact = session.stop_recording().await.unwrap();

        control.emit(EncoderEvent::Data(vec![9; 64]));
        settle().await;

        let snapshot = session.get_state();
        assert_eq!(snapshot.recorded_bytes, artifact.size());
        assert_eq!(snapshot.artifact_size, Some(artifact.size()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_published() {
        let platform = MockPlatform::new();
        let session = session_with(&platform);
        let mut events = session.subscribe();

        session.start_recording().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        session.stop_recording().await.unwrap();

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received.first(), Some(RecordingEvent::Started { .. })));
        assert!(received
            .iter()
            .any(|e| matches!(e, RecordingEvent::SegmentRecorded { .. })));
        assert!(matches!(
            received.last(),
            Some(RecordingEvent::ResourcesReleased { tracks_stopped: 4 })
        ));
    }
}
