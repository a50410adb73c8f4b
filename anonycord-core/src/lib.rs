//! # anonycord-core
//!
//! Platform-agnostic capture-session controller.
//!
//! Owns the camera and microphone through the `CaptureDevice` trait, builds
//! and live-reconfigures the capture graph, runs the video/audio recording
//! state machines and hands finished artifacts to a `MediaLibrary`.
//! Platform backends (and the `anonycord-sim` software device) implement the
//! traits and plug into `MediaRecorder`.
//!
//! ## Architecture
//!
//! ```text
//! anonycord-core (this crate)
//! ├── traits/       ← CaptureDevice, MediaLibrary, RecorderDelegate, Dispatcher
//! ├── models/       ← CaptureError, CaptureConfiguration, DeviceCapabilities, RecordingState, etc.
//! ├── processing/   ← WAV header generation and parsing
//! ├── session/      ← MediaRecorder, session builder, recording lifecycle, permission gate
//! └── storage/      ← PersistenceSink, DirectoryLibrary, metadata sidecars
//! ```
//!
//! All graph mutations and lifecycle transitions run on one session thread;
//! persistence runs on a second one. Every `MediaRecorder` method returns
//! immediately.

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::artifact::{Artifact, ArtifactKind, PersistOutcome, PersistResult, RecordingKind};
pub use models::capabilities::{AudioFormat, DeviceCapabilities, VideoFormat};
pub use models::config::{AudioChannels, CaptureConfiguration, FrameRate, Lens, Resolution};
pub use models::error::{CaptureError, LibraryError};
pub use models::graph::Port;
pub use models::permissions::{Authorization, Medium, PermissionState};
pub use models::settings::RecorderSettings;
pub use models::state::{ActiveRecording, RecorderStatus, RecordingState, SessionSnapshot};
pub use session::recorder::MediaRecorder;
pub use storage::directory_library::DirectoryLibrary;
pub use traits::capture_device::{AccessCallback, CaptureDevice, OutputEvent, OutputEvents, OutputSignal};
pub use traits::dispatcher::{DispatchJob, Dispatcher, InlineDispatcher};
pub use traits::media_library::{MediaLibrary, SavedAsset};
pub use traits::recorder_delegate::RecorderDelegate;
