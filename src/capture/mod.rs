//! Capture sources
//!
//! This module provides the platform abstraction for screen and audio
//! capture, plus an in-process backend.

pub mod mock;
pub mod traits;

pub use mock::{MockEncoderControl, MockPlatform, MockSettings};
pub use traits::{
    AudioMixer, CaptureError, CapturePlatform, CaptureResult, DisplayConstraints, EncoderEvent,
    EncoderHandle, EncoderOptions, EncoderState, MediaEncoder, MediaStream, MediaTrack,
    MicrophoneConstraints, TrackKind, TrackState,
};
