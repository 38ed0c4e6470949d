//! Scripted backend for engine tests, in place of real hardware.

use crate::backend::{Backend, SourceDevice, VirtualInput};
use crate::caps::CapabilitySet;
use crate::error::{Error, Result};
use crate::event::RawEvent;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One event written to a mock virtual device, tagged with the creation
/// order of the device that received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitted {
    pub device: usize,
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

/// Shared observation log for a [`MockBackend`] and everything it creates.
#[derive(Default)]
pub struct MockLog {
    pub emitted: RefCell<Vec<Emitted>>,
    pub created: RefCell<Vec<String>>,
    pub destroyed: Cell<usize>,
}

pub struct MockBackend {
    sources: RefCell<HashMap<PathBuf, MockSource>>,
    fail_create_at: Cell<Option<usize>>,
    pub log: Rc<MockLog>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            sources: RefCell::new(HashMap::new()),
            fail_create_at: Cell::new(None),
            log: Rc::new(MockLog::default()),
        }
    }

    /// Register a source device to be handed out by `open_source`.
    pub fn add_source(&self, path: impl Into<PathBuf>, source: MockSource) {
        self.sources.borrow_mut().insert(path.into(), source);
    }

    /// Make the n-th (0-based) `create_virtual` call fail.
    pub fn fail_create_at(&self, n: usize) {
        self.fail_create_at.set(Some(n));
    }
}

impl Backend for MockBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn SourceDevice>> {
        self.sources
            .borrow_mut()
            .remove(path)
            .map(|s| Box::new(s) as Box<dyn SourceDevice>)
            .ok_or_else(|| Error::Resource(format!("could not open {}", path.display())))
    }

    fn create_virtual(&self, name: &str, capability: &str) -> Result<Box<dyn VirtualInput>> {
        let index = self.log.created.borrow().len();
        if self.fail_create_at.get() == Some(index) {
            return Err(Error::Resource(format!("could not create {name}")));
        }
        self.log.created.borrow_mut().push(name.to_string());
        Ok(Box::new(MockVirtual {
            index,
            caps: CapabilitySet::parse(capability)?,
            log: self.log.clone(),
        }))
    }
}

/// A scripted capture source: fixed capability text plus a queue of events.
pub struct MockSource {
    name: Option<String>,
    capability: String,
    events: VecDeque<RawEvent>,
    fail_grab: bool,
    grabbed: bool,
    /// Set once the event queue is exhausted, standing in for the interrupt
    /// that ends a real capture.
    drained_flag: Option<Arc<AtomicBool>>,
}

impl MockSource {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            name: None,
            capability: capability.into(),
            events: VecDeque::new(),
            fail_grab: false,
            grabbed: false,
            drained_flag: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = RawEvent>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn failing_grab(mut self) -> Self {
        self.fail_grab = true;
        self
    }

    pub fn signal_when_drained(mut self, flag: Arc<AtomicBool>) -> Self {
        self.drained_flag = Some(flag);
        self
    }
}

impl SourceDevice for MockSource {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn describe(&mut self) -> Result<String> {
        Ok(self.capability.clone())
    }

    fn grab(&mut self) -> Result<()> {
        if self.fail_grab {
            return Err(Error::Resource("device is grabbed elsewhere".into()));
        }
        self.grabbed = true;
        Ok(())
    }

    fn fetch(&mut self, _timeout: Duration) -> Result<Vec<RawEvent>> {
        if self.events.is_empty() {
            if let Some(flag) = &self.drained_flag {
                flag.store(true, Ordering::SeqCst);
            }
            return Ok(Vec::new());
        }
        Ok(self.events.drain(..).collect())
    }
}

struct MockVirtual {
    index: usize,
    caps: CapabilitySet,
    log: Rc<MockLog>,
}

impl VirtualInput for MockVirtual {
    fn supports(&self, event_type: u16, code: u16) -> bool {
        self.caps.supports(event_type, code)
    }

    fn emit(&mut self, event_type: u16, code: u16, value: i32) -> Result<()> {
        self.log.emitted.borrow_mut().push(Emitted {
            device: self.index,
            event_type,
            code,
            value,
        });
        Ok(())
    }
}

impl Drop for MockVirtual {
    fn drop(&mut self) {
        self.log.destroyed.set(self.log.destroyed.get() + 1);
    }
}
