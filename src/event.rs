//! Event types shared by the capture and replay engines.
//!
//! Events travel through the log as `E:` lines:
//!
//! ```text
//! E: <id> <sec>.<usec> <type_hex> <code_hex> <value>
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// Event type codes from the input-event taxonomy.
/// Synchronization event type.
pub const EV_SYN: u16 = 0x00;
/// Key/button event type.
pub const EV_KEY: u16 = 0x01;
/// Relative axis event type.
pub const EV_REL: u16 = 0x02;
/// Absolute axis event type.
pub const EV_ABS: u16 = 0x03;

/// Relative X axis code.
pub const REL_X: u16 = 0x00;
/// Relative Y axis code.
pub const REL_Y: u16 = 0x01;
/// Report-boundary synchronization code.
pub const SYN_REPORT: u16 = 0x00;

/// A device timestamp, seconds and microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventTime {
    /// Whole seconds.
    pub secs: u64,
    /// Microsecond fraction, always < 1_000_000.
    pub usecs: u32,
}

impl EventTime {
    /// Create a timestamp, normalizing an overflowing microsecond part.
    pub fn new(secs: u64, usecs: u32) -> Self {
        Self {
            secs: secs + u64::from(usecs / 1_000_000),
            usecs: usecs % 1_000_000,
        }
    }

    /// Elapsed time since `earlier`, or zero if `earlier` is later.
    pub fn since(&self, earlier: &EventTime) -> Duration {
        let this = Duration::new(self.secs, self.usecs * 1_000);
        let other = Duration::new(earlier.secs, earlier.usecs * 1_000);
        this.saturating_sub(other)
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.usecs)
    }
}

/// A raw input event as read from a source device, before it is tagged with
/// the id of the device it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawEvent {
    /// When the event occurred.
    pub time: EventTime,
    /// Event type from the input-event taxonomy.
    pub event_type: u16,
    /// Event code within the type.
    pub code: u16,
    /// Event value.
    pub value: i32,
}

/// An input event tagged with the id of the device it originated from during
/// capture, or targets during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaggedEvent {
    /// Registry id of the device this event belongs to.
    pub device: usize,
    /// When the event occurred.
    pub time: EventTime,
    /// Event type from the input-event taxonomy.
    pub event_type: u16,
    /// Event code within the type.
    pub code: u16,
    /// Event value.
    pub value: i32,
}

impl TaggedEvent {
    /// Tag a raw event with its originating device id.
    pub fn from_raw(device: usize, raw: RawEvent) -> Self {
        Self {
            device,
            time: raw.time,
            event_type: raw.event_type,
            code: raw.code,
            value: raw.value,
        }
    }

    /// Parse one `E:` line.
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("E:") {
            return Err(Error::Format(format!(
                "expected an event line, got {:?}",
                line.trim_end()
            )));
        }

        let device = fields
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| Error::Format("event line has no device id".into()))?;

        let time = fields
            .next()
            .and_then(parse_time)
            .ok_or_else(|| Error::Format("event line has no sec.usec timestamp".into()))?;

        let event_type = fields
            .next()
            .and_then(|s| u16::from_str_radix(s, 16).ok())
            .ok_or_else(|| Error::Format("event line has no hex type".into()))?;

        let code = fields
            .next()
            .and_then(|s| u16::from_str_radix(s, 16).ok())
            .ok_or_else(|| Error::Format("event line has no hex code".into()))?;

        let value = fields
            .next()
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or_else(|| Error::Format("event line has no value".into()))?;

        if fields.next().is_some() {
            return Err(Error::Format(format!(
                "trailing fields on event line {:?}",
                line.trim_end()
            )));
        }

        Ok(Self {
            device,
            time,
            event_type,
            code,
            value,
        })
    }
}

fn parse_time(field: &str) -> Option<EventTime> {
    let (secs, usecs) = field.split_once('.')?;
    if usecs.len() != 6 {
        return None;
    }
    Some(EventTime {
        secs: secs.parse().ok()?,
        usecs: usecs.parse().ok()?,
    })
}

impl fmt::Display for TaggedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "E: {} {} {:04x} {:04x} {}",
            self.device, self.time, self.event_type, self.code, self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_line() {
        let ev = TaggedEvent::parse("E: 0 1.000000 0001 001e 1").unwrap();
        assert_eq!(ev.device, 0);
        assert_eq!(ev.time, EventTime::new(1, 0));
        assert_eq!(ev.event_type, EV_KEY);
        assert_eq!(ev.code, 0x1e);
        assert_eq!(ev.value, 1);
    }

    #[test]
    fn test_parse_negative_value() {
        let ev = TaggedEvent::parse("E: 2 10.250000 0002 0001 -5").unwrap();
        assert_eq!(ev.device, 2);
        assert_eq!(ev.event_type, EV_REL);
        assert_eq!(ev.code, REL_Y);
        assert_eq!(ev.value, -5);
    }

    #[test]
    fn test_display_round_trip() {
        let ev = TaggedEvent {
            device: 1,
            time: EventTime::new(3, 42),
            event_type: EV_KEY,
            code: 0x110,
            value: 0,
        };
        let line = ev.to_string();
        assert_eq!(line, "E: 1 3.000042 0001 0110 0");
        assert_eq!(TaggedEvent::parse(&line).unwrap(), ev);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TaggedEvent::parse("not an event").is_err());
        assert!(TaggedEvent::parse("E: 0").is_err());
        assert!(TaggedEvent::parse("E: 0 1.000000 zzzz 001e 1").is_err());
        assert!(TaggedEvent::parse("E: 0 1.5 0001 001e 1").is_err());
        assert!(TaggedEvent::parse("E: 0 1.000000 0001 001e 1 extra").is_err());
    }

    #[test]
    fn test_time_delta() {
        let a = EventTime::new(1, 0);
        let b = EventTime::new(1, 250_000);
        assert_eq!(b.since(&a), Duration::from_millis(250));
        // Regressions clamp to zero rather than going negative.
        assert_eq!(a.since(&b), Duration::ZERO);
    }

    #[test]
    fn test_time_normalizes_overflow() {
        let t = EventTime::new(1, 2_500_000);
        assert_eq!(t.secs, 3);
        assert_eq!(t.usecs, 500_000);
    }
}
