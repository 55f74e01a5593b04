//! Recording system module
//!
//! - `RecordingSession` owns one screen + microphone recording at a time
//! - codec selection and recording configuration
//! - handoff of the finished artifact to object storage

pub mod codec;
pub mod session;
pub mod state;
pub mod upload;

pub use session::{RecordingError, RecordingEvent, RecordingResult, RecordingSession, UNSUPPORTED_MESSAGE};
pub use state::{RecordingArtifact, RecordingConfig, RecordingSnapshot, RecordingState};
pub use upload::{ArtifactUploader, HttpArtifactUploader, UploadError};
