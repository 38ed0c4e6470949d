//! # recio
//!
//! Record and replay Linux input devices with timing-accurate playback.
//!
//! ## Features
//!
//! - Captures several devices at once into a single line-oriented text log
//! - Grabs devices exclusively while recording, so nothing else sees the
//!   events
//! - Replays a log by recreating equivalent uinput virtual devices and
//!   re-emitting the events with their original relative timing
//! - Walks a relative pointer to its recorded starting offsets before
//!   playback begins
//! - Backend trait seam, so engines are testable without real hardware
//!
//! ## Recording
//!
//! ```no_run
//! use recio::backend::evdev::EvdevBackend;
//! use recio::{CapturePlan, MouseCapture, capture};
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! let cancel = Arc::new(AtomicBool::new(false));
//! let plan = CapturePlan {
//!     mouse: Some(MouseCapture {
//!         path: "/dev/input/event12".into(),
//!         x: 100,
//!         y: -50,
//!     }),
//!     devices: vec!["/dev/input/event10".into()],
//! };
//! capture(&EvdevBackend, &plan, std::io::stdout().lock(), &cancel)?;
//! # Ok::<(), recio::Error>(())
//! ```
//!
//! Capture runs until `cancel` is set (the shipped `recio-record` binary
//! wires it to Ctrl-C), then flushes the log and releases every device.
//!
//! ## Replaying
//!
//! ```no_run
//! use recio::backend::evdev::EvdevBackend;
//! use recio::{ReplayOptions, replay};
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//!
//! let cancel = Arc::new(AtomicBool::new(false));
//! let stdin = std::io::stdin();
//! replay(&EvdevBackend, stdin.lock(), &ReplayOptions::default(), &cancel)?;
//! # Ok::<(), recio::Error>(())
//! ```
//!
//! ## Log format
//!
//! ```text
//! [Devices Begin]
//! count = 2
//! [Devices End]
//! [Device Begin]
//! id = 0
//! type = mouse
//! X = 100
//! Y = -50
//! K: 0110 0111
//! R: 0000 0001
//! [Device End]
//! [Device Begin]
//! id = 1
//! type = unknown
//! name = AT Translated Set 2 keyboard
//! K: 001e 001f
//! [Device End]
//! [Events]
//! E: 0 1.000000 0002 0000 5
//! E: 1 1.000137 0001 001e 1
//! ```
//!
//! Blank lines and `#` comments are ignored everywhere. A mouse device, when
//! present, is always id 0 and is the only device carrying `X`/`Y` offsets.
//! The `K:`/`R:` capability lines are opaque to the engines; only the
//! backend reads them.

pub mod backend;
pub mod caps;
pub mod capture;
pub mod error;
pub mod event;
pub mod reader;
pub mod registry;
pub mod replay;
pub mod section;

// Re-exports
pub use backend::{Backend, SourceDevice, VirtualInput};
pub use caps::CapabilitySet;
pub use capture::{CapturePlan, MouseCapture, capture};
pub use error::{Error, Result};
pub use event::{EventTime, RawEvent, TaggedEvent};
pub use reader::LineReader;
pub use registry::{DeviceKind, DeviceRecord, MAX_DEVICES, Registry};
pub use replay::{ReplayOptions, replay};
pub use section::{SectionSink, read_section};
