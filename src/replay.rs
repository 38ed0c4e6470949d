//! Replay engine: log parsing, device materialization, paced dispatch.
//!
//! Replay walks a fixed sequence: parse the `[Devices]` summary and every
//! `[Device]` block into the [`Registry`], materialize a virtual device from
//! each frozen capability buffer (all-or-nothing), prime the pointer device
//! if one is present, then dispatch the `[Events]` stream in log order with
//! the original inter-event pacing. Every materialized device is torn down
//! no matter how dispatch ends.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::event::{EV_REL, EV_SYN, EventTime, REL_X, REL_Y, SYN_REPORT, TaggedEvent};
use crate::reader::LineReader;
use crate::registry::{Axis, DeviceKind, Registry};
use crate::section::{SectionSink, read_section};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const DEVICES_BEGIN: &str = "[Devices Begin]";
const DEVICES_END: &str = "[Devices End]";
const DEVICE_BEGIN: &str = "[Device Begin]";
const DEVICE_END: &str = "[Device End]";
const EVENTS_HEADER: &str = "[Events]";

/// Delay between the unit steps of the pointer priming walk.
const PRIME_STEP_DELAY: Duration = Duration::from_millis(2);

/// Playback tuning.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Pacing multiplier: 1.0 replays at original speed, 2.0 at double
    /// speed.
    pub speed: f64,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

/// Replay a device log read from `input`, creating virtual devices through
/// `backend`. Stops early, still tearing everything down, once `cancel` is
/// set.
pub fn replay<R: BufRead>(
    backend: &dyn Backend,
    input: R,
    options: &ReplayOptions,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    if !(options.speed > 0.0) {
        return Err(Error::Format(format!(
            "playback speed must be positive, got {}",
            options.speed
        )));
    }

    let mut lines = LineReader::new(input);
    let mut registry = parse_devices(&mut lines)?;

    registry.materialize_all(backend)?;
    dump_devices(&registry);

    prime_pointer(&mut registry)?;
    dispatch_events(&mut lines, &mut registry, options, cancel)?;

    registry.teardown_all();
    Ok(())
}

/// Parse the `[Devices]` summary and every `[Device]` block into a fresh
/// registry. The declared count must match the number of blocks present.
fn parse_devices<R: BufRead>(lines: &mut LineReader<R>) -> Result<Registry> {
    let mut summary = DevicesSink { count: None };
    read_section(lines, DEVICES_BEGIN, DEVICES_END, &mut summary)?;
    let count = summary
        .count
        .ok_or_else(|| Error::Format("devices section has no count".into()))?;

    let mut registry = Registry::new(count)?;
    for _ in 0..count {
        let mut block = DeviceSink {
            registry: &mut registry,
            current: None,
        };
        read_section(lines, DEVICE_BEGIN, DEVICE_END, &mut block)?;
        let id = block
            .current
            .ok_or_else(|| Error::Format("device block has no id".into()))?;
        registry.finalize(id)?;
    }
    Ok(registry)
}

fn split_pair(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Content handler for the `[Devices]` summary.
struct DevicesSink {
    count: Option<usize>,
}

impl SectionSink for DevicesSink {
    fn content(&mut self, line: &str) -> Result<()> {
        let Some((key, value)) = split_pair(line) else {
            return Err(Error::Format(format!(
                "expected key = value in devices section, got {line:?}"
            )));
        };
        match key {
            "count" => {
                if self.count.is_some() {
                    return Err(Error::Format("duplicate count".into()));
                }
                let count = value
                    .parse()
                    .map_err(|_| Error::Format(format!("bad count {value:?}")))?;
                self.count = Some(count);
                Ok(())
            }
            _ => Err(Error::Format(format!("unknown key {key:?} in devices section"))),
        }
    }
}

/// Content handler for one `[Device]` block. Key lines update the record,
/// everything else is buffered as opaque capability text.
struct DeviceSink<'a> {
    registry: &'a mut Registry,
    current: Option<usize>,
}

impl DeviceSink<'_> {
    fn require_id(&self) -> Result<usize> {
        self.current
            .ok_or_else(|| Error::Format("device block content before its id".into()))
    }
}

impl SectionSink for DeviceSink<'_> {
    fn content(&mut self, line: &str) -> Result<()> {
        let Some((key, value)) = split_pair(line) else {
            let id = self.require_id()?;
            return self.registry.append_capability_line(id, line);
        };

        match key {
            "id" => {
                if self.current.is_some() {
                    return Err(Error::Format("second id line in device block".into()));
                }
                let id = value
                    .parse()
                    .map_err(|_| Error::Format(format!("bad device id {value:?}")))?;
                self.registry.begin_device(id)?;
                self.current = Some(id);
                Ok(())
            }
            "type" => {
                let id = self.require_id()?;
                let kind = DeviceKind::parse(value)
                    .ok_or_else(|| Error::Format(format!("unknown device type {value:?}")))?;
                self.registry.set_kind(id, kind)
            }
            "name" => {
                let id = self.require_id()?;
                self.registry.set_name(id, value)
            }
            "X" => {
                let id = self.require_id()?;
                self.registry.set_axis(id, Axis::X, parse_offset(value)?)
            }
            "Y" => {
                let id = self.require_id()?;
                self.registry.set_axis(id, Axis::Y, parse_offset(value)?)
            }
            _ => Err(Error::Format(format!("unknown key {key:?} in device block"))),
        }
    }
}

fn parse_offset(value: &str) -> Result<i32> {
    value
        .parse()
        .map_err(|_| Error::Format(format!("bad axis offset {value:?}")))
}

/// Log the parsed device table for diagnosis.
fn dump_devices(registry: &Registry) {
    for id in 0..registry.device_count() {
        if let Some(rec) = registry.record(id) {
            log::debug!(
                "device {id}: type = {}, name = {:?}",
                rec.kind().map_or("?", |k| k.as_str()),
                rec.name()
            );
            for line in rec.capability_text().lines() {
                log::debug!("  {line}");
            }
        }
    }
}

/// Walk the pointer device to its recorded initial offsets, one relative
/// unit per report. Virtual pointers are relative-motion only, so absolute
/// start positions can only be reached by walking there.
fn prime_pointer(registry: &mut Registry) -> Result<()> {
    let Some((x, y)) = registry.pointer_offsets() else {
        return Ok(());
    };
    if x != 0 || y != 0 {
        log::debug!("priming pointer to ({x}, {y})");
    }
    let sink = registry.virtual_mut(0)?;
    for (axis, offset) in [(REL_X, x), (REL_Y, y)] {
        let step = offset.signum();
        for _ in 0..offset.unsigned_abs() {
            sink.emit(EV_REL, axis, step)?;
            sink.emit(EV_SYN, SYN_REPORT, 0)?;
            thread::sleep(PRIME_STEP_DELAY);
        }
    }
    Ok(())
}

/// Consume the `[Events]` header and stream every event line through the
/// events sink until end of stream or cancellation.
fn dispatch_events<R: BufRead>(
    lines: &mut LineReader<R>,
    registry: &mut Registry,
    options: &ReplayOptions,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    match lines.next_line()? {
        Some(line) if line == EVENTS_HEADER => {}
        Some(line) => {
            return Err(Error::format_at(
                lines.line_number(),
                format!("expected {EVENTS_HEADER:?}, got {line:?}"),
            ));
        }
        None => return Err(Error::Format(format!("missing {EVENTS_HEADER:?} section"))),
    }

    let mut sink = EventsSink::new(registry, options.speed, cancel.clone());
    while let Some(line) = lines.next_line()? {
        sink.content(&line)?;
        if sink.cancelled {
            log::info!("replay cancelled, tearing down");
            break;
        }
    }
    Ok(())
}

/// Content handler for the event stream: validates, paces, and dispatches.
struct EventsSink<'a> {
    registry: &'a mut Registry,
    speed: f64,
    cancel: Arc<AtomicBool>,
    cancelled: bool,
    /// Wall-clock origin, fixed when the first event is dispatched.
    origin: Option<(EventTime, Instant)>,
    /// Last timestamp seen per device id, for the per-substream ordering
    /// invariant.
    last_seen: Vec<Option<EventTime>>,
}

impl<'a> EventsSink<'a> {
    fn new(registry: &'a mut Registry, speed: f64, cancel: Arc<AtomicBool>) -> Self {
        let count = registry.device_count();
        Self {
            registry,
            speed,
            cancel,
            cancelled: false,
            origin: None,
            last_seen: vec![None; count],
        }
    }

    /// Sleep until the event's position on the recorded timeline, scaled by
    /// the speed multiplier.
    fn pace(&mut self, time: EventTime) {
        let (first, started) = *self.origin.get_or_insert((time, Instant::now()));
        let target = time.since(&first).div_f64(self.speed);
        let elapsed = started.elapsed();
        if target > elapsed {
            thread::sleep(target - elapsed);
        }
    }
}

impl SectionSink for EventsSink<'_> {
    fn content(&mut self, line: &str) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            self.cancelled = true;
            return Ok(());
        }

        let ev = TaggedEvent::parse(line)?;

        // The target must already be materialized; checked before pacing so
        // a bad id fails fast instead of after a sleep.
        self.registry.virtual_mut(ev.device)?;

        let last = &mut self.last_seen[ev.device];
        if last.is_some_and(|prev| ev.time < prev) {
            return Err(Error::Format(format!(
                "timestamps of device {} went backwards at {}",
                ev.device, ev.time
            )));
        }
        *last = Some(ev.time);

        self.pace(ev.time);

        let sink = self.registry.virtual_mut(ev.device)?;
        if !sink.supports(ev.event_type, ev.code) {
            // Capture and replay environments drifted apart; forward the
            // event anyway.
            log::warn!(
                "device {} does not declare event {:04x}/{:04x}",
                ev.device,
                ev.event_type,
                ev.code
            );
        }
        sink.emit(ev.event_type, ev.code, ev.value)
    }
}
