//! Shared test infrastructure for smil-timing integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::cell::RefCell;
use std::rc::Rc;

use palette::{Mix, Srgb};
use smil_timing::{
    ElementDecl, ElementId, Interval, TimeDuration, TimeEventKind, TimeInstant, TimeSource,
    TimedBehavior, TimedDocumentRoot, TimegraphListener, TimingAttributes,
    time::Time,
};

// ============================================================================
// Mock Time Types
// ============================================================================

/// Mock duration type for testing (wraps milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDuration(pub u64);

impl TimeDuration for TestDuration {
    const ZERO: Self = TestDuration(0);

    fn as_millis(&self) -> u64 {
        self.0
    }

    fn from_millis(millis: u64) -> Self {
        TestDuration(millis)
    }

    fn saturating_sub(self, other: Self) -> Self {
        TestDuration(self.0.saturating_sub(other.0))
    }
}

/// Mock instant type for testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestInstant(pub u64);

impl TimeInstant for TestInstant {
    type Duration = TestDuration;

    fn duration_since(&self, earlier: Self) -> Self::Duration {
        TestDuration(self.0 - earlier.0)
    }

    fn checked_add(self, duration: Self::Duration) -> Option<Self> {
        Some(TestInstant(self.0 + duration.0))
    }

    fn checked_sub(self, duration: Self::Duration) -> Option<Self> {
        self.0.checked_sub(duration.0).map(TestInstant)
    }
}

// ============================================================================
// Mock Time Source
// ============================================================================

/// Mock time source with controllable time advancement
pub struct MockTimeSource {
    current_time: core::cell::Cell<TestInstant>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self {
            current_time: core::cell::Cell::new(TestInstant(0)),
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: TestDuration) {
        let current = self.current_time.get();
        self.current_time.set(TestInstant(current.0 + duration.0));
    }

    pub fn set_time(&self, time: TestInstant) {
        self.current_time.set(time);
    }
}

impl TimeSource<TestInstant> for MockTimeSource {
    fn now(&self) -> TestInstant {
        self.current_time.get()
    }
}

// ============================================================================
// Recording Behavior
// ============================================================================

/// One call the engine made into a behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Active(Time),
    Inactive { still_active: bool, frozen: bool },
    RemoveFill,
    Sampled { simple_time: Time, iteration: u32 },
    LastValue(u32),
    Event(TimeEventKind, Time, u32),
}

pub type CallLog = Rc<RefCell<heapless::Vec<Call, 256>>>;

/// Behavior that records every call it receives
pub struct RecordingBehavior {
    log: CallLog,
}

impl RecordingBehavior {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        (Self { log: log.clone() }, log)
    }

    fn push(&self, call: Call) {
        let _ = self.log.borrow_mut().push(call);
    }
}

impl TimedBehavior for RecordingBehavior {
    fn to_active(&mut self, begin: Time) {
        self.push(Call::Active(begin));
    }

    fn to_inactive(&mut self, still_active: bool, is_frozen: bool) {
        self.push(Call::Inactive {
            still_active,
            frozen: is_frozen,
        });
    }

    fn remove_fill(&mut self) {
        self.push(Call::RemoveFill);
    }

    fn sampled_at(&mut self, simple_time: Time, _simple_dur: Time, repeat_iteration: u32) {
        self.push(Call::Sampled {
            simple_time,
            iteration: repeat_iteration,
        });
    }

    fn sampled_last_value(&mut self, repeat_iteration: u32) {
        self.push(Call::LastValue(repeat_iteration));
    }

    fn fire_time_event(&mut self, kind: TimeEventKind, time: Time, detail: u32) {
        self.push(Call::Event(kind, time, detail));
    }
}

/// Count the time events of one kind in a log
pub fn count_events(log: &CallLog, kind: TimeEventKind) -> usize {
    log.borrow()
        .iter()
        .filter(|c| matches!(c, Call::Event(k, _, _) if *k == kind))
        .count()
}

// ============================================================================
// Color Behavior
// ============================================================================

pub const BLACK: Srgb = Srgb::new(0.0, 0.0, 0.0);
pub const RED: Srgb = Srgb::new(1.0, 0.0, 0.0);
pub const BLUE: Srgb = Srgb::new(0.0, 0.0, 1.0);

/// Animates a color from `from` to `to` over each simple duration
pub struct ColorAnimation {
    from: Srgb,
    to: Srgb,
    base: Srgb,
    color: Rc<RefCell<Srgb>>,
}

impl ColorAnimation {
    pub fn new(from: Srgb, to: Srgb) -> (Self, Rc<RefCell<Srgb>>) {
        let color = Rc::new(RefCell::new(BLACK));
        (
            Self {
                from,
                to,
                base: BLACK,
                color: color.clone(),
            },
            color,
        )
    }
}

impl TimedBehavior for ColorAnimation {
    fn to_active(&mut self, _begin: Time) {}

    fn to_inactive(&mut self, _still_active: bool, is_frozen: bool) {
        if !is_frozen {
            *self.color.borrow_mut() = self.base;
        }
    }

    fn remove_fill(&mut self) {
        *self.color.borrow_mut() = self.base;
    }

    fn sampled_at(&mut self, simple_time: Time, simple_dur: Time, _repeat_iteration: u32) {
        let progress = (simple_time / simple_dur).clamp(0.0, 1.0);
        *self.color.borrow_mut() = self.from.mix(self.to, progress);
    }

    fn sampled_last_value(&mut self, _repeat_iteration: u32) {
        *self.color.borrow_mut() = self.to;
    }
}

/// Compare two colors with floating-point tolerance
pub fn colors_equal(a: Srgb, b: Srgb) -> bool {
    const EPSILON: f32 = 0.001;
    (a.red - b.red).abs() < EPSILON
        && (a.green - b.green).abs() < EPSILON
        && (a.blue - b.blue).abs() < EPSILON
}

// ============================================================================
// Recording Listener
// ============================================================================

/// One timegraph notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice {
    Added(ElementId),
    Removed(ElementId),
    Activated(ElementId, Time),
    Filled(ElementId, Time),
    Deactivated(ElementId, Time),
    IntervalCreated(ElementId, Time, Time),
    IntervalRemoved(ElementId, Time, Time),
    IntervalChanged(ElementId, Time, Time),
    IntervalBegan(ElementId, Time),
    Repeated(ElementId, u32, Time),
}

pub type NoticeLog = Rc<RefCell<Vec<Notice>>>;

/// Listener that records every notification
pub struct RecordingListener {
    log: NoticeLog,
}

impl RecordingListener {
    pub fn new() -> (Self, NoticeLog) {
        let log = NoticeLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl TimegraphListener for RecordingListener {
    fn element_added(&mut self, id: ElementId) {
        self.log.borrow_mut().push(Notice::Added(id));
    }

    fn element_removed(&mut self, id: ElementId) {
        self.log.borrow_mut().push(Notice::Removed(id));
    }

    fn element_activated(&mut self, id: ElementId, t: Time) {
        self.log.borrow_mut().push(Notice::Activated(id, t));
    }

    fn element_filled(&mut self, id: ElementId, t: Time) {
        self.log.borrow_mut().push(Notice::Filled(id, t));
    }

    fn element_deactivated(&mut self, id: ElementId, t: Time) {
        self.log.borrow_mut().push(Notice::Deactivated(id, t));
    }

    fn interval_created(&mut self, id: ElementId, interval: &Interval) {
        self.log
            .borrow_mut()
            .push(Notice::IntervalCreated(id, interval.begin(), interval.end()));
    }

    fn interval_removed(&mut self, id: ElementId, interval: &Interval) {
        self.log
            .borrow_mut()
            .push(Notice::IntervalRemoved(id, interval.begin(), interval.end()));
    }

    fn interval_changed(&mut self, id: ElementId, interval: &Interval) {
        self.log
            .borrow_mut()
            .push(Notice::IntervalChanged(id, interval.begin(), interval.end()));
    }

    fn interval_began(&mut self, id: ElementId, interval: &Interval) {
        self.log.borrow_mut().push(Notice::IntervalBegan(id, interval.begin()));
    }

    fn element_repeated(&mut self, id: ElementId, iteration: u32, t: Time) {
        self.log.borrow_mut().push(Notice::Repeated(id, iteration, t));
    }
}

// ============================================================================
// Document Helpers
// ============================================================================

/// Adds a top-level element with a recording behavior
pub fn add_recorded(
    root: &mut TimedDocumentRoot,
    id: &str,
    timing: TimingAttributes,
) -> (ElementId, CallLog) {
    let (behavior, log) = RecordingBehavior::new();
    let element = root
        .add_element(None, ElementDecl::new(behavior).id(id).timing(timing))
        .unwrap();
    (element, log)
}

/// Current interval of an element as a `(begin, end)` pair
pub fn interval_of(root: &TimedDocumentRoot, id: ElementId) -> Option<(Time, Time)> {
    root.current_interval(id).map(|i| (i.begin(), i.end()))
}
