//! The document root: owns every element, instance time and interval, and
//! runs sampling passes until the timegraph settles.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use crate::element::TimedElement;
use crate::event::EventListener;
use crate::instance::InstanceTime;
use crate::interval::Interval;
use crate::listener::TimegraphListener;
use crate::parser::{AccessKeySyntax, WallclockValue};
use crate::specifier::TimingSpecifier;
use crate::time::{INDEFINITE, Time, earliest};
use crate::types::{ElementId, InstanceId, IntervalId, SpecifierId, TimeEventKind};

/// Upper bound on settle passes after the initial sample of a seek.
const MAX_SETTLE_PASSES: usize = 256;

/// Document-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentConfig {
    pub(crate) access_keys: AccessKeySyntax,
    pub(crate) event_namespace_uri: Option<String>,
    pub(crate) begin_event_type: String,
    pub(crate) end_event_type: String,
    pub(crate) repeat_event_type: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            access_keys: AccessKeySyntax::default(),
            event_namespace_uri: None,
            begin_event_type: String::from(TimeEventKind::Begin.event_type()),
            end_event_type: String::from(TimeEventKind::End.event_type()),
            repeat_event_type: String::from(TimeEventKind::Repeat.event_type()),
        }
    }
}

impl DocumentConfig {
    /// Default settings: SVG 1.1 access keys, no event namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `accessKey(c)` with a single character.
    pub fn svg11_access_keys(mut self, enabled: bool) -> Self {
        self.access_keys.svg11 = enabled;
        self
    }

    /// Accepts `accessKey(KeyName)`.
    pub fn svg12_access_keys(mut self, enabled: bool) -> Self {
        self.access_keys.svg12 = enabled;
        self
    }

    /// Namespace listeners require and time events carry.
    pub fn event_namespace(mut self, namespace_uri: &str) -> Self {
        self.event_namespace_uri = Some(String::from(namespace_uri));
        self
    }

    /// Overrides the event type used for begin events.
    pub fn begin_event_type(mut self, event_type: &str) -> Self {
        self.begin_event_type = String::from(event_type);
        self
    }

    /// Overrides the event type used for end events.
    pub fn end_event_type(mut self, event_type: &str) -> Self {
        self.end_event_type = String::from(event_type);
        self
    }

    /// Overrides the event type used for repeat events.
    pub fn repeat_event_type(mut self, event_type: &str) -> Self {
        self.repeat_event_type = String::from(event_type);
        self
    }

    /// Access key syntax used when parsing begin and end lists.
    pub fn access_keys(&self) -> AccessKeySyntax {
        self.access_keys
    }

    /// The event type fired for a time event.
    pub fn event_type(&self, kind: TimeEventKind) -> &str {
        match kind {
            TimeEventKind::Begin => &self.begin_event_type,
            TimeEventKind::End => &self.end_event_type,
            TimeEventKind::Repeat => &self.repeat_event_type,
        }
    }
}

/// Identity of a propagation from an interval endpoint to a dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PropagationKey {
    /// An endpoint taken from an instance time, with the endpoint's bits.
    Instance(InstanceId, u32),
    /// An endpoint with no instance time behind it.
    Interval(IntervalId),
}

/// Root of a timed document.
///
/// Elements, specifiers, instance times and intervals live in arenas owned
/// here and refer to each other through ids.
///
/// Public entry points validate element ids and return
/// [`TimingError::UnknownElement`](crate::TimingError::UnknownElement) for
/// removed or foreign ones. Past that boundary every id reachable from a
/// live element names a live slot: `remove_element` unlinks an element from
/// its parent, its syncbase dependents and the id index before freeing its
/// slot, and intervals are released only once no element holds them as
/// current or previous.
pub struct TimedDocumentRoot {
    pub(crate) config: DocumentConfig,
    pub(crate) elements: Vec<Option<TimedElement>>,
    pub(crate) specifiers: Vec<Option<TimingSpecifier>>,
    pub(crate) instances: BTreeMap<InstanceId, InstanceTime>,
    pub(crate) intervals: BTreeMap<IntervalId, Interval>,
    pub(crate) next_instance: u64,
    pub(crate) next_interval: u64,
    pub(crate) children: Vec<ElementId>,
    pub(crate) ids: BTreeMap<String, ElementId>,
    pub(crate) event_listeners: Vec<EventListener>,
    pub(crate) listeners: Vec<Box<dyn TimegraphListener>>,
    pub(crate) event_seq: u64,
    pub(crate) document_begin_millis: i64,
    pub(crate) current_time: Time,
    pub(crate) is_sampling: bool,
    pub(crate) is_hyperlinking: bool,
    propagation_flags: BTreeSet<(PropagationKey, SpecifierId)>,
    resample_requested: bool,
}

impl Default for TimedDocumentRoot {
    fn default() -> Self {
        Self::new(DocumentConfig::default())
    }
}

impl TimedDocumentRoot {
    /// An empty document beginning at the Unix epoch.
    pub fn new(config: DocumentConfig) -> Self {
        Self {
            config,
            elements: Vec::new(),
            specifiers: Vec::new(),
            instances: BTreeMap::new(),
            intervals: BTreeMap::new(),
            next_instance: 0,
            next_interval: 0,
            children: Vec::new(),
            ids: BTreeMap::new(),
            event_listeners: Vec::new(),
            listeners: Vec::new(),
            event_seq: 0,
            document_begin_millis: 0,
            current_time: 0.0,
            is_sampling: false,
            is_hyperlinking: false,
            propagation_flags: BTreeSet::new(),
            resample_requested: false,
        }
    }

    /// Document settings.
    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Registers a timegraph listener.
    pub fn add_listener(&mut self, listener: impl TimegraphListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Looks up a live element.
    pub fn element(&self, id: ElementId) -> Option<&TimedElement> {
        self.elements.get(id.0)?.as_ref()
    }

    /// Looks up an element by XML id.
    pub fn element_by_id(&self, xml_id: &str) -> Option<ElementId> {
        self.ids.get(xml_id).copied()
    }

    /// Top-level elements in document order.
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// Timing specifier by handle.
    pub fn timing_specifier(&self, sid: SpecifierId) -> Option<&TimingSpecifier> {
        self.specifiers.get(sid.0)?.as_ref()
    }

    /// Begin list of an element.
    pub fn begin_specifiers(&self, id: ElementId) -> &[SpecifierId] {
        self.element(id).map_or(&[], |el| &el.begin_specifiers)
    }

    /// End list of an element.
    pub fn end_specifiers(&self, id: ElementId) -> &[SpecifierId] {
        self.element(id).map_or(&[], |el| &el.end_specifiers)
    }

    /// Epoch milliseconds at which document time zero occurs.
    pub fn document_begin_millis(&self) -> i64 {
        self.document_begin_millis
    }

    /// Time of the last seek.
    pub fn current_time(&self) -> Time {
        self.current_time
    }

    /// Whether a seek is in progress.
    pub fn is_sampling(&self) -> bool {
        self.is_sampling
    }

    /// Whether the current seek is a hyperlink seek.
    pub fn is_hyperlinking(&self) -> bool {
        self.is_hyperlinking
    }

    /// Converts epoch milliseconds to document time.
    pub fn convert_epoch_time(&self, millis: i64) -> Time {
        (millis.saturating_sub(self.document_begin_millis) as f64 / 1000.0) as Time
    }

    /// Converts a wallclock value to document time.
    pub fn convert_wallclock_time(&self, value: &WallclockValue) -> Time {
        self.convert_epoch_time(value.to_epoch_millis(self.document_begin_millis))
    }

    /// Moves document time zero without resetting elements.
    ///
    /// Wallclock instance times are re-derived against the new origin.
    pub fn set_document_begin(&mut self, millis: i64) {
        self.document_begin_millis = millis;
        self.reconvert_wallclock_times();
    }

    fn reconvert_wallclock_times(&mut self) {
        let wallclocks: Vec<SpecifierId> = self
            .specifiers
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.as_ref()
                    .filter(|s| s.state.wallclock_instance.is_some())
                    .map(|_| SpecifierId(i))
            })
            .collect();
        for sid in wallclocks {
            self.reconvert_wallclock(sid);
        }
    }

    /// Restarts the document with time zero at `begin_millis`.
    pub fn reset_document(&mut self, begin_millis: i64) {
        debug!("document reset");
        self.document_begin_millis = begin_millis;
        for id in self.children.clone() {
            self.reset(id, true);
        }
        self.reconvert_wallclock_times();
        self.current_interval_will_update();
    }

    /// Samples the whole document at `time`.
    ///
    /// Repeats sampling of elements whose intervals were invalidated until no
    /// element needs updating, and returns the time until the next change
    /// (zero while something is animating, `INDEFINITE` when idle).
    pub fn seek_to(&mut self, time: Time, hyperlinking: bool) -> Time {
        trace!("seek to {} (hyperlinking: {})", time, hyperlinking);
        self.is_sampling = true;
        self.current_time = time;
        self.is_hyperlinking = hyperlinking;
        self.propagation_flags.clear();
        self.resample_requested = false;

        let mut wait = INDEFINITE;
        for id in self.children.clone() {
            wait = earliest(wait, self.sample_at(id, time, hyperlinking));
        }
        self.is_hyperlinking = false;

        let mut passes = 0;
        loop {
            let pending: Vec<ElementId> = self
                .document_order()
                .into_iter()
                .filter(|&id| self.el(id).should_update_current_interval)
                .collect();
            if pending.is_empty() {
                break;
            }
            passes += 1;
            if passes > MAX_SETTLE_PASSES {
                warn!("timegraph did not settle at {}", time);
                break;
            }
            for id in pending {
                if self.el(id).should_update_current_interval {
                    wait = earliest(wait, self.sample_element(id, time, false));
                }
            }
        }

        self.is_sampling = false;
        self.resample_requested = false;
        wait
    }

    /// Records that a dependent was notified of an endpoint during this seek.
    ///
    /// Returns `false` if it already was.
    pub(crate) fn should_propagate(&mut self, key: PropagationKey, sid: SpecifierId) -> bool {
        self.propagation_flags.insert((key, sid))
    }

    /// Signals that an interval may change outside of a seek.
    pub(crate) fn current_interval_will_update(&mut self) {
        if !self.is_sampling {
            self.resample_requested = true;
        }
    }

    /// Returns and clears the request for a new seek.
    ///
    /// Set when instance times change or events arrive outside of a seek.
    pub fn take_resample_request(&mut self) -> bool {
        core::mem::take(&mut self.resample_requested)
    }
}

impl core::fmt::Debug for TimedDocumentRoot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimedDocumentRoot")
            .field("config", &self.config)
            .field("children", &self.children)
            .field("document_begin_millis", &self.document_begin_millis)
            .field("current_time", &self.current_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_conversion_is_relative_to_document_begin() {
        let mut root = TimedDocumentRoot::default();
        root.reset_document(10_000);
        assert_eq!(root.convert_epoch_time(12_500), 2.5);
        assert_eq!(root.convert_epoch_time(9_000), -1.0);
    }

    #[test]
    fn event_types_follow_config() {
        let config = DocumentConfig::new().repeat_event_type("repeat");
        assert_eq!(config.event_type(TimeEventKind::Repeat), "repeat");
        assert_eq!(config.event_type(TimeEventKind::Begin), "beginEvent");
    }

    #[test]
    fn empty_document_is_idle() {
        let mut root = TimedDocumentRoot::default();
        assert_eq!(root.seek_to(3.0, false), INDEFINITE);
        assert_eq!(root.current_time(), 3.0);
    }

    #[test]
    fn resample_request_is_taken_once() {
        let mut root = TimedDocumentRoot::default();
        root.reset_document(0);
        assert!(root.take_resample_request());
        assert!(!root.take_resample_request());
    }
}
