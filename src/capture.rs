//! Capture engine: device acquisition, log emission, event recording.
//!
//! Capture walks a fixed sequence: open every configured device node
//! (all-or-nothing), write the device sections, grab every device
//! exclusively, then stream tagged events until the cancellation token
//! fires. Handles live in the [`Registry`], so any early return releases
//! everything already acquired.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::event::TaggedEvent;
use crate::registry::{Axis, DeviceKind, MAX_DEVICES, Registry};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Per-device readiness wait. Bounds both event latency and how quickly the
/// cancellation token is noticed.
const POLL_WAIT: Duration = Duration::from_millis(10);

/// The pointer device to capture, with its recorded initial offsets.
#[derive(Debug, Clone)]
pub struct MouseCapture {
    /// Device node path, e.g. `/dev/input/event12`.
    pub path: PathBuf,
    /// Initial X offset the pointer sits at when capture starts.
    pub x: i32,
    /// Initial Y offset the pointer sits at when capture starts.
    pub y: i32,
}

/// Which devices one capture session records.
#[derive(Debug, Clone, Default)]
pub struct CapturePlan {
    /// Optional pointer device; always becomes id 0.
    pub mouse: Option<MouseCapture>,
    /// Remaining device node paths, ids assigned in order.
    pub devices: Vec<PathBuf>,
}

impl CapturePlan {
    /// Total number of device records this plan produces.
    pub fn device_count(&self) -> usize {
        self.devices.len() + usize::from(self.mouse.is_some())
    }
}

/// Capture the devices in `plan` into `out` until `cancel` is set.
///
/// A fired cancellation token is the designed way to end capture and is not
/// an error: the log is flushed and every device released, same as any other
/// completion.
pub fn capture<W: Write>(
    backend: &dyn Backend,
    plan: &CapturePlan,
    mut out: W,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    if plan.device_count() == 0 {
        return Err(Error::Resource("no devices to capture".into()));
    }
    if plan.devices.len() > MAX_DEVICES {
        return Err(Error::Resource(format!(
            "at most {MAX_DEVICES} non-pointer devices per session"
        )));
    }

    let mut registry = Registry::new(plan.device_count())?;

    open_all(backend, plan, &mut registry)?;
    write_preamble(&mut out, &registry)?;
    grab_all(&mut registry)?;

    writeln!(out, "[Events]")?;
    record_loop(&mut out, &mut registry, cancel)?;

    out.flush()?;
    log::info!("capture stopped, {} devices released", registry.device_count());
    Ok(())
}

/// Open every device node and populate its registry record, capability text
/// included. Any failure releases the handles already opened.
fn open_all(backend: &dyn Backend, plan: &CapturePlan, registry: &mut Registry) -> Result<()> {
    let mut next_id = 0;

    if let Some(mouse) = &plan.mouse {
        let mut source = backend.open_source(&mouse.path)?;
        registry.begin_device(0)?;
        registry.set_kind(0, DeviceKind::Mouse)?;
        registry.set_axis(0, Axis::X, mouse.x)?;
        registry.set_axis(0, Axis::Y, mouse.y)?;
        for line in source.describe()?.lines() {
            registry.append_capability_line(0, line)?;
        }
        registry.finalize(0)?;
        registry.attach_source(0, source)?;
        next_id = 1;
    }

    for path in &plan.devices {
        let mut source = backend.open_source(path)?;
        registry.begin_device(next_id)?;
        registry.set_kind(next_id, DeviceKind::Unknown)?;
        if let Some(name) = source.name() {
            registry.set_name(next_id, &name)?;
        }
        for line in source.describe()?.lines() {
            registry.append_capability_line(next_id, line)?;
        }
        registry.finalize(next_id)?;
        registry.attach_source(next_id, source)?;
        next_id += 1;
    }

    Ok(())
}

/// Write the `[Devices]` summary and one `[Device]` block per record.
fn write_preamble<W: Write>(out: &mut W, registry: &Registry) -> Result<()> {
    writeln!(out, "# recorded by recio")?;
    writeln!(out, "[Devices Begin]")?;
    writeln!(out, "count = {}", registry.device_count())?;
    writeln!(out, "[Devices End]")?;

    for id in 0..registry.device_count() {
        let rec = registry
            .record(id)
            .ok_or_else(|| Error::Resource(format!("device {id} was not opened")))?;
        let kind = rec
            .kind()
            .ok_or_else(|| Error::Resource(format!("device {id} has no kind")))?;

        writeln!(out, "[Device Begin]")?;
        writeln!(out, "id = {id}")?;
        writeln!(out, "type = {}", kind.as_str())?;
        match kind {
            DeviceKind::Mouse => {
                let (x, y) = registry.pointer_offsets().unwrap_or((0, 0));
                writeln!(out, "X = {x}")?;
                writeln!(out, "Y = {y}")?;
            }
            DeviceKind::Unknown => {
                if let Some(name) = rec.name() {
                    writeln!(out, "name = {name}")?;
                }
            }
        }
        out.write_all(rec.capability_text().as_bytes())?;
        writeln!(out, "[Device End]")?;
    }

    Ok(())
}

/// Request an exclusive grab on every open device. A device grabbed
/// elsewhere aborts capture; recording a stream another consumer is also
/// seeing is never silently accepted.
fn grab_all(registry: &mut Registry) -> Result<()> {
    for (id, source) in registry.sources_mut() {
        source.grab().map_err(|e| {
            Error::Resource(format!(
                "cannot grab device {id} for exclusive capture: {e}"
            ))
        })?;
    }
    Ok(())
}

/// Stream tagged events from every device until cancelled.
fn record_loop<W: Write>(
    out: &mut W,
    registry: &mut Registry,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    while !cancel.load(Ordering::SeqCst) {
        for (id, source) in registry.sources_mut() {
            for raw in source.fetch(POLL_WAIT)? {
                writeln!(out, "{}", TaggedEvent::from_raw(id, raw))?;
            }
        }
    }
    Ok(())
}
