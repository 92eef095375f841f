//! Document timeline driven by a host clock.
//!
//! Provides [`DocumentTimeline`], which owns a [`TimedDocumentRoot`] and maps
//! host instants to document time. It handles start, pause, resume and
//! hyperlink seeks, and tells the host when the document next needs sampling.

use crate::command::TimelineAction;
use crate::event::DomEvent;
use crate::root::TimedDocumentRoot;
use crate::time::{
    INDEFINITE, Time, TimeDuration, TimeInstant, TimeSource, duration_from_secs, is_unresolved,
};
use crate::types::{ElementId, TimingError};

/// The current state of a document timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimelineState {
    /// Not started. The document has not been sampled.
    Idle,
    /// Document time advances with the host clock.
    Running,
    /// Document time is held at the moment pause was called.
    Paused,
}

/// Timing information returned by service operations.
///
/// Indicates when the timeline needs to be serviced again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceTiming<D> {
    /// Some element is animating. Service again at your desired frame rate.
    Continuous,

    /// Nothing changes until the delay has passed.
    Delay(D),

    /// Nothing is scheduled. Service again after the next event or seek.
    Idle,
}

/// Errors that can occur during timeline operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimelineError {
    /// Operation called from an invalid state.
    #[error("invalid state: expected {expected}, but timeline is in {actual:?}")]
    InvalidState {
        /// Description of the valid state(s), e.g. "Running" or "Running or Paused"
        expected: &'static str,
        /// The actual current state
        actual: TimelineState,
    },
    /// The document rejected the operation.
    #[error(transparent)]
    Timing(#[from] TimingError),
}

/// Plays a timed document against a host clock.
///
/// # Type Parameters
/// * `'t` - Lifetime of the time source reference
/// * `I` - Time instant type
/// * `T` - Time source implementation type
pub struct DocumentTimeline<'t, I: TimeInstant, T: TimeSource<I>> {
    root: TimedDocumentRoot,
    time_source: &'t T,
    state: TimelineState,
    start_time: Option<I>,
    pause_start_time: Option<I>,
}

impl<'t, I: TimeInstant, T: TimeSource<I>> DocumentTimeline<'t, I, T> {
    /// Creates an idle timeline for `root`.
    pub fn new(root: TimedDocumentRoot, time_source: &'t T) -> Self {
        Self {
            root,
            time_source,
            state: TimelineState::Idle,
            start_time: None,
            pause_start_time: None,
        }
    }

    /// Handles a timeline action by dispatching to the appropriate method.
    ///
    /// # Returns
    /// * `Ok(ServiceTiming)` - When to service next
    /// * `Err` - Operation failed (invalid state, unknown element, etc.)
    pub fn handle_action(
        &mut self,
        action: TimelineAction,
    ) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        match action {
            TimelineAction::Start { epoch_millis } => self.start(epoch_millis),
            TimelineAction::Pause => {
                self.pause()?;
                Ok(ServiceTiming::Idle)
            }
            TimelineAction::Resume => self.resume(),
            TimelineAction::Stop => {
                self.stop()?;
                Ok(ServiceTiming::Idle)
            }
            TimelineAction::Seek(time) => self.set_current_time(time),
            TimelineAction::BeginElement { element, offset } => self.begin_element(element, offset),
            TimelineAction::EndElement { element, offset } => self.end_element(element, offset),
            TimelineAction::Dispatch(event) => self.dispatch_event(&event),
        }
    }

    /// The document being played.
    pub fn root(&self) -> &TimedDocumentRoot {
        &self.root
    }

    /// Mutable access to the document, e.g. to add elements before starting.
    pub fn root_mut(&mut self) -> &mut TimedDocumentRoot {
        &mut self.root
    }

    /// Consumes the timeline, returning the document.
    pub fn into_root(self) -> TimedDocumentRoot {
        self.root
    }

    /// Starts the document with time zero at `epoch_millis`.
    ///
    /// Must be called from `Idle` state. Initializes every element and
    /// samples the document at time zero.
    pub fn start(&mut self, epoch_millis: i64) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        if self.state != TimelineState::Idle {
            return Err(TimelineError::InvalidState {
                expected: "Idle",
                actual: self.state,
            });
        }
        self.root.initialize_all()?;
        self.root.reset_document(epoch_millis);
        self.start_time = Some(self.time_source.now());
        self.pause_start_time = None;
        self.state = TimelineState::Running;
        debug!("timeline started at epoch {}", epoch_millis);
        self.service()
    }

    /// Samples the document at the current host time.
    ///
    /// Must be called from `Running` state.
    ///
    /// # Returns
    /// - `Ok(ServiceTiming::Continuous)` - Something is animating
    /// - `Ok(ServiceTiming::Delay(duration))` - Service after this delay
    /// - `Ok(ServiceTiming::Idle)` - Nothing is scheduled
    /// - `Err` - Invalid state
    pub fn service(&mut self) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        if self.state != TimelineState::Running {
            return Err(TimelineError::InvalidState {
                expected: "Running",
                actual: self.state,
            });
        }
        let time = self.current_time();
        let wait = self.root.seek_to(time, false);
        Ok(to_service_timing(wait))
    }

    /// Pauses document time.
    ///
    /// Must be called from `Running` state.
    pub fn pause(&mut self) -> Result<(), TimelineError> {
        if self.state != TimelineState::Running {
            return Err(TimelineError::InvalidState {
                expected: "Running",
                actual: self.state,
            });
        }
        self.pause_start_time = Some(self.time_source.now());
        self.state = TimelineState::Paused;
        Ok(())
    }

    /// Resumes a paused document, shifting its begin by the pause duration.
    ///
    /// Must be called from `Paused` state.
    pub fn resume(&mut self) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        if self.state != TimelineState::Paused {
            return Err(TimelineError::InvalidState {
                expected: "Paused",
                actual: self.state,
            });
        }
        let now = self.time_source.now();
        if let (Some(pause_start), Some(start)) = (self.pause_start_time, self.start_time) {
            let paused = now.duration_since(pause_start);
            // On overflow the document jumps forward instead of failing.
            self.start_time = Some(start.checked_add(paused).unwrap_or(start));
            let begin = self.root.document_begin_millis() + paused.as_millis() as i64;
            self.root.set_document_begin(begin);
        }
        self.pause_start_time = None;
        self.state = TimelineState::Running;
        self.service()
    }

    /// Stops the document and returns to `Idle`.
    ///
    /// Event-derived instance times are discarded. Can be called from
    /// `Running` or `Paused`.
    pub fn stop(&mut self) -> Result<(), TimelineError> {
        match self.state {
            TimelineState::Running | TimelineState::Paused => {
                let begin = self.root.document_begin_millis();
                self.root.reset_document(begin);
                self.start_time = None;
                self.pause_start_time = None;
                self.state = TimelineState::Idle;
                Ok(())
            }
            TimelineState::Idle => Err(TimelineError::InvalidState {
                expected: "Running or Paused",
                actual: self.state,
            }),
        }
    }

    /// Seeks to `time` as a hyperlink does.
    ///
    /// Can be called from `Running` or `Paused`. The document begin moves so
    /// that event timestamps keep mapping onto the new document time.
    pub fn set_current_time(&mut self, time: Time) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        let Some(start) = self.start_time else {
            return Err(TimelineError::InvalidState {
                expected: "Running or Paused",
                actual: self.state,
            });
        };
        let reference = self.pause_start_time.unwrap_or_else(|| self.time_source.now());
        let elapsed_millis = reference.duration_since(start).as_millis() as i64;
        let target = I::Duration::from_millis(crate::time::seconds_to_millis(time.max(0.0)) as u64);
        let new_start = reference.checked_sub(target).unwrap_or(start);
        let shift = elapsed_millis - reference.duration_since(new_start).as_millis() as i64;
        self.start_time = Some(new_start);
        let begin = self.root.document_begin_millis() + shift;
        self.root.set_document_begin(begin);
        debug!("timeline seek to {}", time);

        let wait = self.root.seek_to(self.current_time(), true);
        if self.state == TimelineState::Running {
            Ok(to_service_timing(wait))
        } else {
            Ok(ServiceTiming::Idle)
        }
    }

    /// Document time now, in seconds. Zero before `start`.
    pub fn current_time(&self) -> Time {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        let reference = self.pause_start_time.unwrap_or_else(|| self.time_source.now());
        reference.duration_since(start).as_secs()
    }

    /// Begins an element `offset` seconds from now.
    pub fn begin_element(
        &mut self,
        element: ElementId,
        offset: Time,
    ) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        let now = self.current_time();
        self.root.begin_element_at(element, now + offset)?;
        self.after_change()
    }

    /// Ends an element `offset` seconds from now.
    pub fn end_element(
        &mut self,
        element: ElementId,
        offset: Time,
    ) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        let now = self.current_time();
        self.root.end_element_at(element, now + offset)?;
        self.after_change()
    }

    /// Delivers an event to the document.
    pub fn dispatch_event(&mut self, event: &DomEvent) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        self.root.dispatch_event(event)?;
        self.after_change()
    }

    fn after_change(&mut self) -> Result<ServiceTiming<I::Duration>, TimelineError> {
        if self.root.take_resample_request() && self.state == TimelineState::Running {
            self.service()
        } else {
            Ok(ServiceTiming::Idle)
        }
    }

    /// Returns the current state of the timeline.
    pub fn state(&self) -> TimelineState {
        self.state
    }

    /// Returns true if the timeline is currently paused.
    pub fn is_paused(&self) -> bool {
        self.state == TimelineState::Paused
    }

    /// Returns true if the timeline is currently running.
    pub fn is_running(&self) -> bool {
        self.state == TimelineState::Running
    }
}

fn to_service_timing<D: TimeDuration>(wait: Time) -> ServiceTiming<D> {
    if is_unresolved(wait) || wait == INDEFINITE {
        ServiceTiming::Idle
    } else if wait <= 0.0 {
        ServiceTiming::Continuous
    } else {
        ServiceTiming::Delay(duration_from_secs(wait))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{ElementDecl, TimingAttributes};
    use crate::element::NullBehavior;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct TestDuration(u64);

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

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct TestInstant(u64);

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

    struct MockTimeSource {
        current_time: core::cell::Cell<TestInstant>,
    }

    impl MockTimeSource {
        fn new() -> Self {
            Self {
                current_time: core::cell::Cell::new(TestInstant(10_000)),
            }
        }

        fn advance(&self, millis: u64) {
            let current = self.current_time.get();
            self.current_time.set(TestInstant(current.0 + millis));
        }
    }

    impl TimeSource<TestInstant> for MockTimeSource {
        fn now(&self) -> TestInstant {
            self.current_time.get()
        }
    }

    fn document(begin: &str) -> (TimedDocumentRoot, ElementId) {
        let mut root = TimedDocumentRoot::default();
        let id = root
            .add_element(
                None,
                ElementDecl::new(NullBehavior)
                    .id("a")
                    .timing(TimingAttributes::new().begin(begin).dur("2s")),
            )
            .unwrap();
        (root, id)
    }

    #[test]
    fn service_requires_running_state() {
        let timer = MockTimeSource::new();
        let (root, _) = document("0s");
        let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
        assert!(matches!(
            timeline.service(),
            Err(TimelineError::InvalidState { .. })
        ));
        assert!(matches!(timeline.pause(), Err(TimelineError::InvalidState { .. })));
        assert!(matches!(timeline.resume(), Err(TimelineError::InvalidState { .. })));
    }

    #[test]
    fn start_reports_delay_until_begin() {
        let timer = MockTimeSource::new();
        let (root, id) = document("1.5s");
        let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
        let timing = timeline.start(0).unwrap();
        assert_eq!(timing, ServiceTiming::Delay(TestDuration(1500)));
        assert!(!timeline.root().element(id).unwrap().is_active());

        timer.advance(1500);
        assert_eq!(timeline.service().unwrap(), ServiceTiming::Continuous);
        assert!(timeline.root().element(id).unwrap().is_active());
    }

    #[test]
    fn pause_holds_document_time() {
        let timer = MockTimeSource::new();
        let (root, _) = document("0s");
        let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
        timeline.start(0).unwrap();
        timer.advance(500);
        timeline.pause().unwrap();
        timer.advance(3000);
        assert_eq!(timeline.current_time(), 0.5);

        timeline.resume().unwrap();
        assert_eq!(timeline.current_time(), 0.5);
        assert_eq!(timeline.root().document_begin_millis(), 3000);
    }

    #[test]
    fn seek_moves_document_time() {
        let timer = MockTimeSource::new();
        let (root, id) = document("0s");
        let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
        timeline.start(0).unwrap();
        timer.advance(1000);
        timeline.set_current_time(3.0).unwrap();
        assert_eq!(timeline.current_time(), 3.0);
        assert_eq!(timeline.root().document_begin_millis(), -2000);
        assert!(!timeline.root().element(id).unwrap().is_active());
    }

    #[test]
    fn begin_element_is_sampled_immediately() {
        let timer = MockTimeSource::new();
        let (root, id) = document("indefinite");
        let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
        assert_eq!(timeline.start(0).unwrap(), ServiceTiming::Idle);
        timer.advance(250);
        assert_eq!(timeline.begin_element(id, 0.0).unwrap(), ServiceTiming::Continuous);
        assert!(timeline.root().element(id).unwrap().is_active());
    }

    #[test]
    fn stop_returns_to_idle() {
        let timer = MockTimeSource::new();
        let (root, _) = document("0s");
        let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
        timeline.start(0).unwrap();
        timeline.stop().unwrap();
        assert_eq!(timeline.state(), TimelineState::Idle);
        assert!(timeline.stop().is_err());
    }
}
