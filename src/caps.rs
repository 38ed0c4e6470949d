//! Capability descriptor codec.
//!
//! A device's capability text names the key/button and relative-axis codes
//! it can emit, one prefixed line group per event class:
//!
//! ```text
//! K: 001e 001f 0020
//! R: 0000 0001 0008
//! ```
//!
//! The capture and replay engines treat this text as an opaque blob inside a
//! `[Device Begin]` block; only the backend that extracts it from a real
//! device and rebuilds a virtual device from it looks inside. Lines with an
//! unrecognized prefix are ignored, so older binaries can replay logs
//! written by newer recorders.

use crate::error::Result;
use crate::event::{EV_KEY, EV_REL, EV_SYN};
use std::collections::BTreeSet;
use std::fmt::Write as _;

const CODES_PER_LINE: usize = 8;

/// The set of event type/code pairs a device declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    keys: BTreeSet<u16>,
    relative: BTreeSet<u16>,
}

impl CapabilitySet {
    /// An empty capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a key or button code.
    pub fn insert_key(&mut self, code: u16) {
        self.keys.insert(code);
    }

    /// Declare a relative axis code.
    pub fn insert_relative(&mut self, code: u16) {
        self.relative.insert(code);
    }

    /// Declared key/button codes, ascending.
    pub fn keys(&self) -> impl Iterator<Item = u16> + '_ {
        self.keys.iter().copied()
    }

    /// Declared relative axis codes, ascending.
    pub fn relative_axes(&self) -> impl Iterator<Item = u16> + '_ {
        self.relative.iter().copied()
    }

    /// True if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.relative.is_empty()
    }

    /// Whether an event of `event_type`/`code` is within the declared
    /// capabilities. Synchronization events are always in bounds.
    pub fn supports(&self, event_type: u16, code: u16) -> bool {
        match event_type {
            EV_SYN => true,
            EV_KEY => self.keys.contains(&code),
            EV_REL => self.relative.contains(&code),
            _ => false,
        }
    }

    /// Parse capability text back into a set.
    pub fn parse(text: &str) -> Result<Self> {
        let mut set = Self::new();
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let class = match fields.next() {
                Some(c) => c,
                None => continue,
            };
            let target = match class {
                "K:" => &mut set.keys,
                "R:" => &mut set.relative,
                // Unrecognized capability classes are skipped, not fatal.
                _ => continue,
            };
            for field in fields {
                if let Ok(code) = u16::from_str_radix(field, 16) {
                    target.insert(code);
                }
            }
        }
        Ok(set)
    }

    /// Render the set as capability text, trailing newline included.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        write_class(&mut out, "K:", &self.keys);
        write_class(&mut out, "R:", &self.relative);
        out
    }
}

fn write_class(out: &mut String, prefix: &str, codes: &BTreeSet<u16>) {
    for chunk in codes.iter().collect::<Vec<_>>().chunks(CODES_PER_LINE) {
        out.push_str(prefix);
        for code in chunk {
            let _ = write!(out, " {:04x}", code);
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CapabilitySet {
        let mut set = CapabilitySet::new();
        set.insert_key(0x1e);
        set.insert_key(0x110);
        set.insert_relative(0x00);
        set.insert_relative(0x01);
        set
    }

    #[test]
    fn test_text_round_trip() {
        let set = sample();
        let parsed = CapabilitySet::parse(&set.to_text()).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_supports() {
        let set = sample();
        assert!(set.supports(EV_KEY, 0x1e));
        assert!(set.supports(EV_REL, 0x01));
        assert!(!set.supports(EV_KEY, 0x1f));
        assert!(!set.supports(EV_REL, 0x08));
        // SYN reports are always considered in-capability.
        assert!(set.supports(EV_SYN, 0x00));
    }

    #[test]
    fn test_long_class_wraps_lines() {
        let mut set = CapabilitySet::new();
        for code in 0..20u16 {
            set.insert_key(code);
        }
        let text = set.to_text();
        assert_eq!(text.lines().filter(|l| l.starts_with("K:")).count(), 3);
        assert_eq!(CapabilitySet::parse(&text).unwrap(), set);
    }

    #[test]
    fn test_unknown_lines_ignored() {
        let set = CapabilitySet::parse("KEY 30\nA: 0000 0 1023\nK: 001e\n").unwrap();
        assert!(set.supports(EV_KEY, 0x1e));
        assert_eq!(set.keys().count(), 1);
        assert_eq!(set.relative_axes().count(), 0);
    }

    #[test]
    fn test_empty_text() {
        let set = CapabilitySet::parse("").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.to_text(), "");
    }
}
