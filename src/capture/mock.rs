//! In-process capture backend
//!
//! `MockPlatform` implements [`CapturePlatform`] without touching real
//! devices. Every capability and failure mode is configurable, and the
//! platform keeps a registry of every track it handed out so callers can
//! check that nothing leaks.

use super::traits::{
    AudioMixer, CaptureError, CapturePlatform, CaptureResult, DisplayConstraints, EncoderEvent,
    EncoderHandle, EncoderOptions, EncoderState, MediaEncoder, MediaStream, MediaTrack,
    MicrophoneConstraints, TrackKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Behaviour switches for [`MockPlatform`]
#[derive(Debug, Clone)]
pub struct MockSettings {
    pub display_capture: bool,
    pub encoding: bool,
    pub supported_mime_types: Vec<String>,
    pub display_error: Option<CaptureError>,
    pub microphone_error: Option<CaptureError>,
    pub mixer_error: Option<CaptureError>,
    /// Whether the display stream carries a system audio track
    pub system_audio: bool,
    /// Bytes emitted per encoder flush
    pub chunk_size: usize,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            display_capture: true,
            encoding: true,
            supported_mime_types: vec![
                "video/webm;codecs=vp8,opus".to_string(),
                "video/webm".to_string(),
            ],
            display_error: None,
            microphone_error: None,
            mixer_error: None,
            system_audio: true,
            chunk_size: 1024,
        }
    }
}

#[derive(Default)]
struct MockInner {
    settings: Mutex<MockSettings>,
    tracks: Mutex<Vec<MediaTrack>>,
    display_tracks: Mutex<Vec<MediaTrack>>,
    encoders: Mutex<Vec<MockEncoderControl>>,
}

/// Configurable in-process capture platform
#[derive(Clone, Default)]
pub struct MockPlatform {
    inner: Arc<MockInner>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: MockSettings) -> Self {
        let platform = Self::default();
        *platform.inner.settings.lock() = settings;
        platform
    }

    /// Adjust settings in place
    pub fn configure(&self, f: impl FnOnce(&mut MockSettings)) {
        f(&mut self.inner.settings.lock());
    }

    pub fn without_display_capture(self) -> Self {
        self.configure(|s| s.display_capture = false);
        self
    }

    pub fn without_system_audio(self) -> Self {
        self.configure(|s| s.system_audio = false);
        self
    }

    pub fn with_supported_mime_types(self, types: &[&str]) -> Self {
        self.configure(|s| s.supported_mime_types = types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn deny_display(self) -> Self {
        self.configure(|s| {
            s.display_error = Some(CaptureError::PermissionDenied("screen share declined".into()))
        });
        self
    }

    pub fn deny_microphone(self) -> Self {
        self.configure(|s| {
            s.microphone_error =
                Some(CaptureError::PermissionDenied("microphone access declined".into()))
        });
        self
    }

    pub fn fail_mixer(self) -> Self {
        self.configure(|s| s.mixer_error = Some(CaptureError::Platform("audio graph unavailable".into())));
        self
    }

    /// Number of tracks handed out that are still live
    pub fn live_track_count(&self) -> usize {
        self.inner.tracks.lock().iter().filter(|t| t.is_live()).count()
    }

    /// Number of tracks handed out so far
    pub fn created_track_count(&self) -> usize {
        self.inner.tracks.lock().len()
    }

    /// Simulate the user ending the screen share from outside the app
    pub fn revoke_display(&self) -> usize {
        self.inner
            .display_tracks
            .lock()
            .iter()
            .filter(|t| t.kind() == TrackKind::Video && t.revoke())
            .count()
    }

    /// Control handle for the most recently created encoder
    pub fn last_encoder(&self) -> Option<MockEncoderControl> {
        self.inner.encoders.lock().last().cloned()
    }

    fn register(&self, track: MediaTrack) -> MediaTrack {
        self.inner.tracks.lock().push(track.clone());
        track
    }
}

#[async_trait]
impl CapturePlatform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_display_capture(&self) -> bool {
        self.inner.settings.lock().display_capture
    }

    fn supports_encoding(&self) -> bool {
        self.inner.settings.lock().encoding
    }

    fn is_mime_type_supported(&self, mime_type: &str) -> bool {
        let settings = self.inner.settings.lock();
        settings.encoding && settings.supported_mime_types.iter().any(|t| t == mime_type)
    }

    async fn capture_display(&self, constraints: &DisplayConstraints) -> CaptureResult<MediaStream> {
        let (error, system_audio) = {
            let settings = self.inner.settings.lock();
            if !settings.display_capture {
                return Err(CaptureError::Unsupported("display capture".into()));
            }
            (settings.display_error.clone(), settings.system_audio)
        };
        if let Some(error) = error {
            return Err(error);
        }

        let label = format!(
            "screen {}x{}@{}",
            constraints.width, constraints.height, constraints.frame_rate
        );
        let mut tracks = vec![self.register(MediaTrack::new(TrackKind::Video, label))];
        if constraints.system_audio && system_audio {
            tracks.push(self.register(MediaTrack::new(TrackKind::Audio, "system audio")));
        }
        self.inner.display_tracks.lock().extend(tracks.iter().cloned());
        Ok(MediaStream::from_tracks(tracks))
    }

    async fn capture_microphone(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> CaptureResult<MediaStream> {
        if let Some(error) = self.inner.settings.lock().microphone_error.clone() {
            return Err(error);
        }
        let label = format!("microphone {}Hz", constraints.sample_rate);
        let track = self.register(MediaTrack::new(TrackKind::Audio, label));
        Ok(MediaStream::from_tracks(vec![track]))
    }

    fn create_mixer(&self) -> CaptureResult<Box<dyn AudioMixer>> {
        if let Some(error) = self.inner.settings.lock().mixer_error.clone() {
            return Err(error);
        }
        let output = self.register(MediaTrack::new(TrackKind::Audio, "mixed audio"));
        Ok(Box::new(MockMixer {
            output,
            sources: Vec::new(),
            closed: false,
        }))
    }

    fn create_encoder(
        &self,
        stream: &MediaStream,
        options: &EncoderOptions,
    ) -> CaptureResult<EncoderHandle> {
        if !self.is_mime_type_supported(&options.mime_type) {
            return Err(CaptureError::Unsupported(options.mime_type.clone()));
        }
        if stream.video_tracks().next().is_none() {
            return Err(CaptureError::Platform("stream has no video track".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let chunk_size = self.inner.settings.lock().chunk_size;
        self.inner.encoders.lock().push(MockEncoderControl { events: tx.clone() });

        let encoder = MockEncoder {
            mime_type: options.mime_type.clone(),
            state: EncoderState::Inactive,
            events: tx,
            chunk_size,
            ticker: None,
        };
        Ok(EncoderHandle {
            encoder: Box::new(encoder),
            events: rx,
        })
    }
}

/// Injects encoder notifications from outside, as a real encoder would
#[derive(Clone)]
pub struct MockEncoderControl {
    events: mpsc::UnboundedSender<EncoderEvent>,
}

impl MockEncoderControl {
    pub fn emit(&self, event: EncoderEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn emit_error(&self, message: &str) -> bool {
        self.emit(EncoderEvent::Error(message.to_string()))
    }
}

struct MockMixer {
    output: MediaTrack,
    sources: Vec<String>,
    closed: bool,
}

impl AudioMixer for MockMixer {
    fn connect(&mut self, track: &MediaTrack) -> CaptureResult<()> {
        if self.closed {
            return Err(CaptureError::Platform("audio graph closed".into()));
        }
        if track.kind() != TrackKind::Audio {
            return Err(CaptureError::Unsupported("mixer only accepts audio tracks".into()));
        }
        self.sources.push(track.id().to_string());
        Ok(())
    }

    fn output(&self) -> MediaStream {
        MediaStream::from_tracks(vec![self.output.clone()])
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.output.stop();
            self.sources.clear();
        }
    }
}

struct MockEncoder {
    mime_type: String,
    state: EncoderState,
    events: mpsc::UnboundedSender<EncoderEvent>,
    chunk_size: usize,
    ticker: Option<JoinHandle<()>>,
}

impl MediaEncoder for MockEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn state(&self) -> EncoderState {
        self.state
    }

    fn start(&mut self, timeslice: Duration) -> CaptureResult<()> {
        if self.state != EncoderState::Inactive {
            return Err(CaptureError::Platform("encoder already started".into()));
        }
        let events = self.events.clone();
        let chunk_size = self.chunk_size;
        self.ticker = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + timeslice;
            let mut interval = tokio::time::interval_at(start, timeslice);
            let mut sequence: u8 = 0;
            loop {
                interval.tick().await;
                sequence = sequence.wrapping_add(1);
                if events.send(EncoderEvent::Data(vec![sequence; chunk_size])).is_err() {
                    break;
                }
            }
        }));
        self.state = EncoderState::Recording;
        Ok(())
    }

    fn stop(&mut self) -> CaptureResult<()> {
        if self.state == EncoderState::Inactive {
            return Err(CaptureError::Platform("encoder is not running".into()));
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.state = EncoderState::Inactive;
        // Flush the partial last interval before signalling completion.
        let _ = self.events.send(EncoderEvent::Data(vec![0; self.chunk_size / 2]));
        let _ = self.events.send(EncoderEvent::Stopped);
        Ok(())
    }

    fn pause(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Recording {
            return Err(CaptureError::Platform("encoder is not recording".into()));
        }
        self.state = EncoderState::Paused;
        let _ = self.events.send(EncoderEvent::Paused);
        Ok(())
    }

    fn resume(&mut self) -> CaptureResult<()> {
        if self.state != EncoderState::Paused {
            return Err(CaptureError::Platform("encoder is not paused".into()));
        }
        self.state = EncoderState::Recording;
        let _ = self.events.send(EncoderEvent::Resumed);
        Ok(())
    }
}

impl Drop for MockEncoder {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_display_capture_includes_system_audio() {
        let platform = MockPlatform::new();
        let stream = platform
            .capture_display(&DisplayConstraints::default())
            .await
            .unwrap();
        assert_eq!(stream.video_tracks().count(), 1);
        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(platform.live_track_count(), 2);

        let silent = MockPlatform::new().without_system_audio();
        let stream = silent.capture_display(&DisplayConstraints::default()).await.unwrap();
        assert_eq!(stream.audio_tracks().count(), 0);
    }

    #[tokio::test]
    async fn test_denied_microphone_creates_no_tracks() {
        let platform = MockPlatform::new().deny_microphone();
        let err = platform
            .capture_microphone(&MicrophoneConstraints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert_eq!(platform.created_track_count(), 0);
    }

    #[test]
    fn test_mixer_rejects_video() {
        let platform = MockPlatform::new();
        let mut mixer = platform.create_mixer().unwrap();
        let video = MediaTrack::new(TrackKind::Video, "screen");
        assert!(mixer.connect(&video).is_err());
        mixer.close();
        mixer.close();
        assert_eq!(platform.live_track_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_flushes_on_interval_and_stop() {
        let platform = MockPlatform::new();
        let video = MediaTrack::new(TrackKind::Video, "screen");
        let stream = MediaStream::from_tracks(vec![video]);
        let options = EncoderOptions {
            mime_type: "video/webm".into(),
            video_bits_per_second: 1,
            audio_bits_per_second: 1,
        };
        let EncoderHandle { mut encoder, mut events } =
            platform.create_encoder(&stream, &options).unwrap();

        encoder.start(Duration::from_secs(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        encoder.stop().unwrap();

        let mut chunks = 0;
        let mut stopped = false;
        while let Ok(event) = events.try_recv() {
            match event {
                EncoderEvent::Data(_) => chunks += 1,
                EncoderEvent::Stopped => stopped = true,
                _ => {}
            }
        }
        assert_eq!(chunks, 3);
        assert!(stopped);
    }
}
