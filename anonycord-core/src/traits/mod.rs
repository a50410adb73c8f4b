pub mod capture_device;
pub mod dispatcher;
pub mod media_library;
pub mod recorder_delegate;
