//! Linux backend: evdev device nodes for capture, uinput for replay.

use crate::backend::{Backend, SourceDevice, VirtualInput};
use crate::caps::CapabilitySet;
use crate::error::{Error, Result};
use crate::event::{EventTime, RawEvent};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key, RelativeAxisType};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

/// Backend over `/dev/input` and `/dev/uinput`.
#[derive(Debug, Default)]
pub struct EvdevBackend;

impl Backend for EvdevBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn SourceDevice>> {
        let device = Device::open(path).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => Error::PermissionDenied(format!(
                "cannot open {}: {}. Make sure you're in the 'input' group.",
                path.display(),
                e
            )),
            _ => Error::Resource(format!("could not open {}: {}", path.display(), e)),
        })?;
        Ok(Box::new(EvdevSource { device }))
    }

    fn create_virtual(&self, name: &str, capability: &str) -> Result<Box<dyn VirtualInput>> {
        let caps = CapabilitySet::parse(capability)?;

        let mut keys = AttributeSet::<Key>::new();
        for code in caps.keys() {
            keys.insert(Key::new(code));
        }
        let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
        for code in caps.relative_axes() {
            rel_axes.insert(RelativeAxisType(code));
        }

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(|e| Error::Resource(format!("failed to create virtual device builder: {e}")))?
            .name(name);
        if keys.iter().next().is_some() {
            builder = builder
                .with_keys(&keys)
                .map_err(|e| Error::Resource(format!("failed to add keys: {e}")))?;
        }
        if rel_axes.iter().next().is_some() {
            builder = builder
                .with_relative_axes(&rel_axes)
                .map_err(|e| Error::Resource(format!("failed to add relative axes: {e}")))?;
        }

        let device = builder.build().map_err(|e| {
            Error::PermissionDenied(format!(
                "failed to create virtual device {name:?}: {e}. Make sure /dev/uinput is \
                 accessible (you may need to be in the 'input' group or have appropriate \
                 udev rules)."
            ))
        })?;

        Ok(Box::new(EvdevVirtual { device, caps }))
    }
}

/// An open `/dev/input/event*` node.
struct EvdevSource {
    device: Device,
}

impl SourceDevice for EvdevSource {
    fn name(&self) -> Option<String> {
        self.device.name().map(str::to_string)
    }

    fn describe(&mut self) -> Result<String> {
        let mut caps = CapabilitySet::new();
        if let Some(keys) = self.device.supported_keys() {
            for key in keys.iter() {
                caps.insert_key(key.code());
            }
        }
        if let Some(axes) = self.device.supported_relative_axes() {
            for axis in axes.iter() {
                caps.insert_relative(axis.0);
            }
        }
        Ok(caps.to_text())
    }

    fn grab(&mut self) -> Result<()> {
        self.device.grab().map_err(|e| {
            Error::Resource(format!(
                "device is grabbed by another process and cannot be recorded: {e}"
            ))
        })
    }

    fn fetch(&mut self, timeout: Duration) -> Result<Vec<RawEvent>> {
        let mut pfd = libc::pollfd {
            fd: self.device.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as i32) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(Error::Resource(format!("poll error: {err}")));
        }
        if ret == 0 || pfd.revents & libc::POLLIN == 0 {
            return Ok(Vec::new());
        }

        match self.device.fetch_events() {
            Ok(events) => Ok(events.map(convert_event).collect()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(Error::Resource(format!("could not read events: {e}"))),
        }
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        let _ = self.device.ungrab();
    }
}

fn convert_event(ev: InputEvent) -> RawEvent {
    let time = ev
        .timestamp()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    RawEvent {
        time: EventTime::new(time.as_secs(), time.subsec_micros()),
        event_type: ev.event_type().0,
        code: ev.code(),
        value: ev.value(),
    }
}

/// A uinput virtual device serving as a replay target.
struct EvdevVirtual {
    device: VirtualDevice,
    caps: CapabilitySet,
}

impl VirtualInput for EvdevVirtual {
    fn supports(&self, event_type: u16, code: u16) -> bool {
        self.caps.supports(event_type, code)
    }

    fn emit(&mut self, event_type: u16, code: u16, value: i32) -> Result<()> {
        let event = InputEvent::new(EventType(event_type), code, value);
        self.device
            .emit(&[event])
            .map_err(|e| Error::Resource(format!("failed to write event: {e}")))
    }
}

/// Enumerate `/dev/input/event*` nodes that expose key or relative events,
/// the device classes worth recording.
pub fn discover() -> Result<Vec<PathBuf>> {
    let dir = fs::read_dir("/dev/input").map_err(|e| {
        Error::PermissionDenied(format!(
            "cannot access /dev/input: {e}. Make sure you're in the 'input' group."
        ))
    })?;

    let mut found = Vec::new();
    for entry in dir.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !file_name.starts_with("event") {
            continue;
        }
        match Device::open(&path) {
            Ok(device) => {
                let supported = device.supported_events();
                if supported.contains(EventType::KEY) || supported.contains(EventType::RELATIVE) {
                    found.push(path);
                }
            }
            Err(e) => {
                log::debug!("failed to open {}: {}", path.display(), e);
            }
        }
    }
    found.sort();
    Ok(found)
}
