//! Device backends.
//!
//! The engines never touch the OS directly; they drive these traits. The
//! shipped implementation ([`evdev`]) talks to `/dev/input` and uinput, and
//! tests substitute scripted devices.

use crate::error::Result;
use crate::event::RawEvent;
use std::path::Path;
use std::time::Duration;

#[cfg(target_os = "linux")]
pub mod evdev;

#[cfg(test)]
pub(crate) mod mock;

/// Factory for source and virtual devices.
pub trait Backend {
    /// Open a device node read-only and non-blocking for capture.
    fn open_source(&self, path: &Path) -> Result<Box<dyn SourceDevice>>;

    /// Create a live virtual device from capability text produced by
    /// [`SourceDevice::describe`]. Dropping the returned handle destroys the
    /// virtual device.
    fn create_virtual(&self, name: &str, capability: &str) -> Result<Box<dyn VirtualInput>>;
}

/// An open input device being captured.
pub trait SourceDevice {
    /// Kernel-reported device name, if any.
    fn name(&self) -> Option<String>;

    /// Extract the device's capability descriptor as text.
    fn describe(&mut self) -> Result<String>;

    /// Request exclusive ownership so no other consumer sees the events.
    fn grab(&mut self) -> Result<()>;

    /// Wait up to `timeout` for readiness, then return every queued event.
    /// An empty vector means nothing arrived.
    fn fetch(&mut self, timeout: Duration) -> Result<Vec<RawEvent>>;
}

/// A live virtual device accepting replayed events.
pub trait VirtualInput {
    /// Whether the device declared this type/code pair in its capabilities.
    fn supports(&self, event_type: u16, code: u16) -> bool;

    /// Write one event to the device.
    fn emit(&mut self, event_type: u16, code: u16, value: i32) -> Result<()>;
}
