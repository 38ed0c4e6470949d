//! Device registry and per-device lifecycle state.
//!
//! One [`Registry`] is the ambient state of a capture or replay session. It
//! owns every [`DeviceRecord`] and, through them, every OS handle, so that
//! dropping the registry releases everything exactly once no matter how the
//! session ended. Slot 0 is reserved for the pointer device when one is
//! configured; all other device ids shift up by one.

use crate::backend::{Backend, SourceDevice, VirtualInput};
use crate::error::{Error, Result};

/// Most non-pointer devices one session can hold.
pub const MAX_DEVICES: usize = 10;

/// What a device record is known to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// A relative pointer; the only kind allowed to carry X/Y offsets, and
    /// always registered at id 0.
    Mouse,
    /// Anything else; identified by name only.
    Unknown,
}

impl DeviceKind {
    /// Log-format spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Mouse => "mouse",
            DeviceKind::Unknown => "unknown",
        }
    }

    /// Parse the log-format spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mouse" => Some(DeviceKind::Mouse),
            "unknown" => Some(DeviceKind::Unknown),
            _ => None,
        }
    }
}

/// Pointer priming axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

enum Handle {
    Source(Box<dyn SourceDevice>),
    Virtual(Box<dyn VirtualInput>),
}

/// One physical or virtual device; its index in the registry is its identity
/// in the log.
pub struct DeviceRecord {
    id: usize,
    kind: Option<DeviceKind>,
    name: Option<String>,
    capability: String,
    frozen: bool,
    x: i32,
    y: i32,
    handle: Option<Handle>,
}

impl DeviceRecord {
    fn new(id: usize) -> Self {
        Self {
            id,
            kind: None,
            name: None,
            capability: String::new(),
            frozen: false,
            x: 0,
            y: 0,
            handle: None,
        }
    }

    /// The record's kind, once a `type` line set it.
    pub fn kind(&self) -> Option<DeviceKind> {
        self.kind
    }

    /// Descriptive label, informational only.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The buffered capability text.
    pub fn capability_text(&self) -> &str {
        &self.capability
    }

    /// True once a live virtual device backs this record.
    pub fn is_materialized(&self) -> bool {
        matches!(self.handle, Some(Handle::Virtual(_)))
    }
}

/// Indexed table of device records for one session.
pub struct Registry {
    device_count: usize,
    records: Vec<Option<DeviceRecord>>,
}

impl Registry {
    /// Create a registry sized for `device_count` devices.
    pub fn new(device_count: usize) -> Result<Self> {
        if device_count > MAX_DEVICES + 1 {
            return Err(Error::Format(format!(
                "count = {} exceeds the supported maximum of {}",
                device_count,
                MAX_DEVICES + 1
            )));
        }
        let mut records = Vec::new();
        records.resize_with(device_count, || None);
        Ok(Self {
            device_count,
            records,
        })
    }

    /// Number of devices this session was declared with.
    pub fn device_count(&self) -> usize {
        self.device_count
    }

    /// Whether slot 0 holds a pointer device.
    pub fn has_pointer(&self) -> bool {
        self.record(0)
            .is_some_and(|r| r.kind == Some(DeviceKind::Mouse))
    }

    /// Recorded initial pointer offsets, when a pointer device is present.
    pub fn pointer_offsets(&self) -> Option<(i32, i32)> {
        let rec = self.record(0)?;
        (rec.kind == Some(DeviceKind::Mouse)).then_some((rec.x, rec.y))
    }

    /// Shared access to a record.
    pub fn record(&self, id: usize) -> Option<&DeviceRecord> {
        self.records.get(id).and_then(|slot| slot.as_ref())
    }

    fn record_mut(&mut self, id: usize) -> Result<&mut DeviceRecord> {
        self.records
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| Error::Format(format!("no device with id {id}")))
    }

    /// Start a new record. Fails on an out-of-range or already-seen id.
    pub fn begin_device(&mut self, id: usize) -> Result<()> {
        if id >= self.device_count {
            return Err(Error::Format(format!(
                "device id {} out of range, count = {}",
                id, self.device_count
            )));
        }
        let slot = &mut self.records[id];
        if slot.is_some() {
            return Err(Error::Format(format!("duplicate device id {id}")));
        }
        *slot = Some(DeviceRecord::new(id));
        Ok(())
    }

    /// Set the record's kind. A pointer device may only occupy slot 0, and a
    /// record's kind is set at most once.
    pub fn set_kind(&mut self, id: usize, kind: DeviceKind) -> Result<()> {
        if kind == DeviceKind::Mouse && id != 0 {
            return Err(Error::Format(format!(
                "mouse device must have id 0, got {id}"
            )));
        }
        let rec = self.record_mut(id)?;
        if rec.kind.is_some() {
            return Err(Error::Format(format!("duplicate type for device {id}")));
        }
        rec.kind = Some(kind);
        Ok(())
    }

    /// Set an initial pointer offset. Only meaningful for mouse records.
    pub fn set_axis(&mut self, id: usize, axis: Axis, value: i32) -> Result<()> {
        let rec = self.record_mut(id)?;
        if rec.kind != Some(DeviceKind::Mouse) {
            return Err(Error::Format(format!(
                "axis offset on non-mouse device {id}"
            )));
        }
        match axis {
            Axis::X => rec.x = value,
            Axis::Y => rec.y = value,
        }
        Ok(())
    }

    /// Set the descriptive name. Mouse records are identified by their slot,
    /// not a name, so only unknown-kind records take one.
    pub fn set_name(&mut self, id: usize, name: &str) -> Result<()> {
        let rec = self.record_mut(id)?;
        if rec.kind != Some(DeviceKind::Unknown) {
            return Err(Error::Format(format!("name on non-unknown device {id}")));
        }
        rec.name = Some(name.to_string());
        Ok(())
    }

    /// Append one line of opaque capability text to the record's buffer.
    pub fn append_capability_line(&mut self, id: usize, line: &str) -> Result<()> {
        let rec = self.record_mut(id)?;
        if rec.kind.is_none() {
            return Err(Error::Format(format!(
                "capability text before type for device {id}"
            )));
        }
        if rec.frozen {
            return Err(Error::Format(format!(
                "capability text after device {id} was finalized"
            )));
        }
        rec.capability.push_str(line);
        rec.capability.push('\n');
        Ok(())
    }

    /// Freeze the record: its capability buffer becomes read-only and its
    /// metadata must be complete.
    pub fn finalize(&mut self, id: usize) -> Result<()> {
        let rec = self.record_mut(id)?;
        if rec.kind.is_none() {
            return Err(Error::Format(format!("device {id} has no type")));
        }
        rec.frozen = true;
        Ok(())
    }

    /// Hand an open capture handle to the record.
    pub fn attach_source(&mut self, id: usize, source: Box<dyn SourceDevice>) -> Result<()> {
        let rec = self.record_mut(id)?;
        if rec.handle.is_some() {
            return Err(Error::Resource(format!("device {id} already has a handle")));
        }
        rec.handle = Some(Handle::Source(source));
        Ok(())
    }

    /// Turn the frozen capability buffer into a live virtual device.
    pub fn materialize(&mut self, id: usize, backend: &dyn Backend) -> Result<()> {
        let rec = self.record_mut(id)?;
        if !rec.frozen {
            return Err(Error::Format(format!("device {id} was never finalized")));
        }
        if rec.handle.is_some() {
            return Err(Error::Resource(format!("device {id} already has a handle")));
        }
        let name = match &rec.name {
            Some(name) => format!("recio {name}"),
            None => format!("recio device {id}"),
        };
        let sink = backend.create_virtual(&name, &rec.capability)?;
        rec.handle = Some(Handle::Virtual(sink));
        Ok(())
    }

    /// Materialize every declared device; the first failure tears down what
    /// was already created so no partial virtual-device set is left running.
    pub fn materialize_all(&mut self, backend: &dyn Backend) -> Result<()> {
        for id in 0..self.device_count {
            if self.record(id).is_none() {
                return Err(Error::Format(format!("device {id} missing from log")));
            }
            if let Err(e) = self.materialize(id, backend) {
                self.teardown_all();
                return Err(e);
            }
        }
        Ok(())
    }

    /// The write handle for a materialized record.
    pub fn virtual_mut(&mut self, id: usize) -> Result<&mut dyn VirtualInput> {
        match self.record_mut(id)?.handle.as_mut() {
            Some(Handle::Virtual(sink)) => Ok(sink.as_mut()),
            _ => Err(Error::Format(format!(
                "event targets device {id} which was never materialized"
            ))),
        }
    }

    /// Every record holding an open capture handle, in id order.
    pub fn sources_mut(&mut self) -> impl Iterator<Item = (usize, &mut (dyn SourceDevice + 'static))> + '_ {
        self.records.iter_mut().filter_map(move |slot| {
            let rec = slot.as_mut()?;
            match rec.handle.as_mut()? {
                Handle::Source(src) => Some((rec.id, src.as_mut())),
                Handle::Virtual(_) => None,
            }
        })
    }

    /// Release the record's OS handle. Idempotent; safe on a record that
    /// never materialized.
    pub fn teardown(&mut self, id: usize) {
        if let Some(Some(rec)) = self.records.get_mut(id) {
            if rec.handle.take().is_some() {
                log::debug!("released device {id}");
            }
        }
    }

    /// Release every handle in the registry.
    pub fn teardown_all(&mut self) {
        for id in 0..self.records.len() {
            self.teardown(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MockSource};

    fn registry_with_device(kind: DeviceKind) -> Registry {
        let mut reg = Registry::new(1).unwrap();
        reg.begin_device(0).unwrap();
        reg.set_kind(0, kind).unwrap();
        reg
    }

    #[test]
    fn test_count_bound() {
        assert!(Registry::new(MAX_DEVICES + 1).is_ok());
        assert!(Registry::new(MAX_DEVICES + 2).is_err());
    }

    #[test]
    fn test_begin_device_range_and_duplicates() {
        let mut reg = Registry::new(2).unwrap();
        reg.begin_device(1).unwrap();
        assert!(reg.begin_device(2).is_err());
        assert!(reg.begin_device(1).is_err());
    }

    #[test]
    fn test_axis_requires_mouse() {
        let mut reg = registry_with_device(DeviceKind::Unknown);
        assert!(reg.set_axis(0, Axis::X, 100).is_err());

        let mut reg = registry_with_device(DeviceKind::Mouse);
        reg.set_axis(0, Axis::X, 100).unwrap();
        reg.set_axis(0, Axis::Y, -50).unwrap();
        assert_eq!(reg.pointer_offsets(), Some((100, -50)));
    }

    #[test]
    fn test_axis_before_type_rejected() {
        let mut reg = Registry::new(1).unwrap();
        reg.begin_device(0).unwrap();
        assert!(reg.set_axis(0, Axis::X, 1).is_err());
    }

    #[test]
    fn test_mouse_only_at_slot_zero() {
        let mut reg = Registry::new(2).unwrap();
        reg.begin_device(1).unwrap();
        assert!(reg.set_kind(1, DeviceKind::Mouse).is_err());
        reg.set_kind(1, DeviceKind::Unknown).unwrap();
        assert!(reg.set_kind(1, DeviceKind::Unknown).is_err());
    }

    #[test]
    fn test_name_only_on_unknown() {
        let mut reg = registry_with_device(DeviceKind::Mouse);
        assert!(reg.set_name(0, "pad").is_err());

        let mut reg = registry_with_device(DeviceKind::Unknown);
        reg.set_name(0, "pad").unwrap();
        assert_eq!(reg.record(0).unwrap().name(), Some("pad"));
    }

    #[test]
    fn test_capability_buffer_rules() {
        let mut reg = Registry::new(1).unwrap();
        reg.begin_device(0).unwrap();
        assert!(reg.append_capability_line(0, "K: 001e").is_err());

        reg.set_kind(0, DeviceKind::Unknown).unwrap();
        reg.append_capability_line(0, "K: 001e").unwrap();
        reg.append_capability_line(0, "R: 0000").unwrap();
        reg.finalize(0).unwrap();
        assert!(reg.append_capability_line(0, "K: 0030").is_err());
        assert_eq!(reg.record(0).unwrap().capability_text(), "K: 001e\nR: 0000\n");
    }

    #[test]
    fn test_finalize_requires_type() {
        let mut reg = Registry::new(1).unwrap();
        reg.begin_device(0).unwrap();
        assert!(reg.finalize(0).is_err());
    }

    #[test]
    fn test_materialize_and_idempotent_teardown() {
        let backend = MockBackend::new();
        let mut reg = registry_with_device(DeviceKind::Unknown);
        reg.append_capability_line(0, "K: 001e").unwrap();
        reg.finalize(0).unwrap();

        reg.materialize(0, &backend).unwrap();
        assert!(reg.record(0).unwrap().is_materialized());
        assert!(reg.virtual_mut(0).is_ok());

        reg.teardown(0);
        reg.teardown(0);
        assert_eq!(backend.log.destroyed.get(), 1);
        assert!(reg.virtual_mut(0).is_err());
    }

    #[test]
    fn test_materialize_requires_finalize() {
        let backend = MockBackend::new();
        let mut reg = registry_with_device(DeviceKind::Unknown);
        assert!(reg.materialize(0, &backend).is_err());
    }

    #[test]
    fn test_materialize_all_tears_down_on_failure() {
        let backend = MockBackend::new();
        backend.fail_create_at(1);

        let mut reg = Registry::new(2).unwrap();
        for id in 0..2 {
            reg.begin_device(id).unwrap();
            reg.set_kind(id, DeviceKind::Unknown).unwrap();
            reg.append_capability_line(id, "K: 001e").unwrap();
            reg.finalize(id).unwrap();
        }

        assert!(reg.materialize_all(&backend).is_err());
        assert_eq!(backend.log.created.borrow().len(), 1);
        assert_eq!(backend.log.destroyed.get(), 1);
        assert!(!reg.record(0).unwrap().is_materialized());
    }

    #[test]
    fn test_registry_drop_releases_sources() {
        let mut reg = Registry::new(1).unwrap();
        reg.begin_device(0).unwrap();
        reg.set_kind(0, DeviceKind::Unknown).unwrap();
        reg.attach_source(0, Box::new(MockSource::new("K: 001e\n")))
            .unwrap();
        assert_eq!(reg.sources_mut().count(), 1);
        drop(reg);
    }
}
