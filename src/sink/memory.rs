//! In-memory sink that records what the recorder asked of it.

use super::{SinkError, SinkSpec, VideoSink, VideoWriter};
use crate::source::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One call observed by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Opened(SinkSpec),
    Written { identifier: String },
    Closed { identifier: String },
}

/// Sink that keeps an event log instead of writing files.
///
/// Clones share the log, so a caller can keep a handle while the recorder
/// owns the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
    fail_opens: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open` calls fail with `SinkError::Unavailable`.
    pub fn set_fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn opened_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Opened(_)))
    }

    pub fn closed_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Closed { .. }))
    }

    pub fn written_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Written { .. }))
    }

    fn count(&self, pred: impl Fn(&SinkEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| pred(e)).count())
            .unwrap_or(0)
    }

    fn push(events: &Mutex<Vec<SinkEvent>>, event: SinkEvent) {
        if let Ok(mut events) = events.lock() {
            events.push(event);
        }
    }
}

impl VideoSink for MemorySink {
    type Writer = MemoryWriter;

    fn open(&mut self, spec: &SinkSpec) -> Result<MemoryWriter, SinkError> {
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable(format!(
                "refusing to open {}",
                spec.identifier
            )));
        }

        Self::push(&self.events, SinkEvent::Opened(spec.clone()));
        Ok(MemoryWriter {
            identifier: spec.identifier.clone(),
            events: Arc::clone(&self.events),
            closed: false,
        })
    }
}

/// Writer half of a [`MemorySink`].
#[derive(Debug)]
pub struct MemoryWriter {
    identifier: String,
    events: Arc<Mutex<Vec<SinkEvent>>>,
    closed: bool,
}

impl VideoWriter for MemoryWriter {
    fn write(&mut self, _frame: &Frame) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Write("recording already closed".to_string()));
        }
        MemorySink::push(
            &self.events,
            SinkEvent::Written {
                identifier: self.identifier.clone(),
            },
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if !self.closed {
            self.closed = true;
            MemorySink::push(
                &self.events,
                SinkEvent::Closed {
                    identifier: self.identifier.clone(),
                },
            );
        }
        Ok(())
    }
}
