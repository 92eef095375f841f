//! DOM-style events feeding event-based timing values, and the time events
//! elements fire as they progress.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::root::TimedDocumentRoot;
use crate::time::{Time, seconds_to_millis};
use crate::types::{ElementId, SpecifierId, TimeEventKind, TimingError};

/// Maximum number of distinct events buffered per element between samples.
pub const MAX_PENDING_EVENTS: usize = 16;

/// Where an event is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventTarget {
    /// The element with this XML id.
    Element(String),
    /// The document itself.
    Document,
}

/// An event delivered to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DomEvent {
    /// Target of the event.
    pub target: EventTarget,
    /// Namespace of the event type, if any.
    pub namespace_uri: Option<String>,
    /// Event type such as `click` or `beginEvent`.
    pub event_type: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Repeat iteration for repeat events, otherwise zero.
    pub detail: u32,
    /// Key for keyboard events.
    pub key: Option<String>,
}

impl DomEvent {
    /// An event of `event_type` targeted at `target`.
    pub fn new(target: EventTarget, event_type: &str, timestamp: i64) -> Self {
        Self {
            target,
            namespace_uri: None,
            event_type: String::from(event_type),
            timestamp,
            detail: 0,
            key: None,
        }
    }

    /// Sets the namespace URI.
    pub fn with_namespace(mut self, namespace_uri: &str) -> Self {
        self.namespace_uri = Some(String::from(namespace_uri));
        self
    }

    /// Sets the detail value.
    pub fn with_detail(mut self, detail: u32) -> Self {
        self.detail = detail;
        self
    }

    /// Sets the key.
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(String::from(key));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EventListener {
    pub(crate) target: EventTarget,
    pub(crate) namespace_uri: Option<String>,
    pub(crate) event_type: String,
    pub(crate) specifier: SpecifierId,
}

impl EventListener {
    fn matches(&self, event: &DomEvent) -> bool {
        if self.event_type != event.event_type {
            return false;
        }
        if let Some(ns) = &self.namespace_uri
            && event.namespace_uri.as_ref() != Some(ns)
        {
            return false;
        }
        match &self.target {
            EventTarget::Document => true,
            target => *target == event.target,
        }
    }
}

/// An event buffered on an element until its next sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HandledEvent {
    pub(crate) seq: u64,
    pub(crate) timestamp: i64,
    pub(crate) specifiers: Vec<SpecifierId>,
}

impl TimedDocumentRoot {
    /// Delivers an event to every specifier listening for it.
    ///
    /// Matching specifiers are buffered on their owning elements and resolved
    /// into instance times at the next sample.
    pub fn dispatch_event(&mut self, event: &DomEvent) -> Result<(), TimingError> {
        let seq = self.event_seq;
        self.event_seq += 1;
        let matching: Vec<SpecifierId> = self
            .event_listeners
            .iter()
            .filter(|l| l.matches(event))
            .map(|l| l.specifier)
            .collect();
        let mut result = Ok(());
        for sid in matching {
            if !self.specifier_accepts(sid, event) {
                continue;
            }
            let owner = self.specifier(sid).owner;
            if let Err(e) = self.event_occurred(owner, sid, seq, event.timestamp) {
                result = Err(e);
            }
        }
        result
    }

    fn event_occurred(
        &mut self,
        owner: ElementId,
        sid: SpecifierId,
        seq: u64,
        timestamp: i64,
    ) -> Result<(), TimingError> {
        let el = self.el_mut(owner);
        if let Some(handled) = el.pending_events.iter_mut().find(|h| h.seq == seq) {
            handled.specifiers.push(sid);
        } else {
            el.pending_events
                .push(HandledEvent {
                    seq,
                    timestamp,
                    specifiers: vec![sid],
                })
                .map_err(|_| TimingError::EventQueueFull(owner))?;
        }
        el.should_update_current_interval = true;
        trace!("{} buffered event", owner);
        self.current_interval_will_update();
        Ok(())
    }

    /// Reports a time event to the behavior and listeners, then dispatches it.
    pub(crate) fn fire_time_event(&mut self, id: ElementId, kind: TimeEventKind, time: Time, detail: u32) {
        let el = self.el_mut(id);
        el.behavior.fire_time_event(kind, time, detail);
        let target = el.xml_id.clone();
        if kind == TimeEventKind::Repeat {
            self.notify_element(id, crate::listener::ElementNotice::Repeated(detail, time));
        }
        let Some(target) = target else {
            return;
        };
        if !time.is_finite() {
            trace!("{} {} at {} not dispatched", id, kind.event_type(), time);
            return;
        }
        let event = DomEvent {
            target: EventTarget::Element(target),
            namespace_uri: self.config.event_namespace_uri.clone(),
            event_type: String::from(self.config.event_type(kind)),
            timestamp: self.document_begin_millis.saturating_add(seconds_to_millis(time)),
            detail,
            key: None,
        };
        if self.dispatch_event(&event).is_err() {
            warn!("{} dropped {} at {}: event queue full", id, kind.event_type(), time);
        }
    }
}
