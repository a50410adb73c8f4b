//! # anonycord-sim
//!
//! Software capture backend for anonycord-core.
//!
//! Provides:
//! - `SimulatedDevice` — camera + microphone implementing `CaptureDevice`;
//!   writes YUV4MPEG2 video, 16-bit PCM WAV audio and PNG stills
//! - `SimControl` — answers permission prompts, confirms outputs and
//!   injects hardware faults
//! - `FlakyLibrary` — media library wrapper failing scripted saves
//!
//! ## Usage
//! ```ignore
//! use anonycord_core::{CaptureConfiguration, DirectoryLibrary, MediaRecorder, RecorderSettings};
//! use anonycord_sim::{SimConfig, SimulatedDevice};
//!
//! let (device, _control) = SimulatedDevice::new(SimConfig::default());
//! let library = DirectoryLibrary::new("/tmp/anonycord-library");
//! let recorder = MediaRecorder::new(Box::new(device), Box::new(library), RecorderSettings::default())?;
//! recorder.request_permissions()?;
//! recorder.setup_capture_session(CaptureConfiguration::default(), |_| {})?;
//! ```

pub mod device;
pub mod faults;
pub mod synth;

pub use device::{budget_capabilities, flagship_capabilities, SimConfig, SimControl, SimGraph, SimulatedDevice};
pub use faults::FlakyLibrary;
