//! Observers of timegraph changes.

use crate::interval::Interval;
use crate::root::TimedDocumentRoot;
use crate::time::Time;
use crate::types::{ElementId, IntervalId};

/// Receives notifications about elements and intervals in a document.
///
/// All methods default to doing nothing.
pub trait TimegraphListener {
    /// An element was added to the document.
    fn element_added(&mut self, _id: ElementId) {}

    /// An element was removed from the document.
    fn element_removed(&mut self, _id: ElementId) {}

    /// An element became active.
    fn element_activated(&mut self, _id: ElementId, _t: Time) {}

    /// An element started holding its fill value.
    fn element_filled(&mut self, _id: ElementId, _t: Time) {}

    /// An element stopped being active.
    fn element_deactivated(&mut self, _id: ElementId, _t: Time) {}

    /// An element selected a new interval.
    fn interval_created(&mut self, _id: ElementId, _interval: &Interval) {}

    /// An element dropped an interval before it ended.
    fn interval_removed(&mut self, _id: ElementId, _interval: &Interval) {}

    /// An interval's begin or end moved.
    fn interval_changed(&mut self, _id: ElementId, _interval: &Interval) {}

    /// An interval began.
    fn interval_began(&mut self, _id: ElementId, _interval: &Interval) {}

    /// An element started a new repeat iteration.
    fn element_repeated(&mut self, _id: ElementId, _iteration: u32, _t: Time) {}

    /// An element's begin or end instance list changed.
    fn element_instance_times_changed(&mut self, _id: ElementId, _is_begin: bool) {}
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ElementNotice {
    Added,
    Removed,
    Activated(Time),
    Filled(Time),
    Deactivated(Time),
    Repeated(u32, Time),
    InstanceTimesChanged(bool),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum IntervalNotice {
    Created,
    Removed,
    Changed,
    Began,
}

impl TimedDocumentRoot {
    pub(crate) fn notify_element(&mut self, id: ElementId, notice: ElementNotice) {
        for l in self.listeners.iter_mut() {
            match notice {
                ElementNotice::Added => l.element_added(id),
                ElementNotice::Removed => l.element_removed(id),
                ElementNotice::Activated(t) => l.element_activated(id, t),
                ElementNotice::Filled(t) => l.element_filled(id, t),
                ElementNotice::Deactivated(t) => l.element_deactivated(id, t),
                ElementNotice::Repeated(n, t) => l.element_repeated(id, n, t),
                ElementNotice::InstanceTimesChanged(is_begin) => {
                    l.element_instance_times_changed(id, is_begin)
                }
            }
        }
    }

    pub(crate) fn notify_interval(&mut self, id: ElementId, iv: IntervalId, notice: IntervalNotice) {
        let Some(interval) = self.intervals.get(&iv) else {
            return;
        };
        for l in self.listeners.iter_mut() {
            match notice {
                IntervalNotice::Created => l.interval_created(id, interval),
                IntervalNotice::Removed => l.interval_removed(id, interval),
                IntervalNotice::Changed => l.interval_changed(id, interval),
                IntervalNotice::Began => l.interval_began(id, interval),
            }
        }
    }
}
