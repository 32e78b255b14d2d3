//! Test utilities shared across crate-level unit tests.

pub mod logging;

pub use logging::{captured_for_current_thread, install_capture_logger, CapturedRecord};
