//! Utility functions and helpers
//!
//! Clock abstraction, timestamp conversion and atomic file rewrites.

pub mod atomic;
pub mod clock;

pub use atomic::{atomic_write_with, cleanup_temp_files};
pub use clock::{
    current_timestamp_ms, datetime_from_secs, millis_to_datetime, Clock, ManualClock, SystemClock,
};
