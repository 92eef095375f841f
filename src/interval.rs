//! Intervals: a resolved begin/end pair and the instance times that depend on it.

use alloc::vec::Vec;
use core::fmt;

use crate::root::TimedDocumentRoot;
use crate::time::{DisplayTime, INDEFINITE, Time, earliest};
use crate::types::{InstanceId, IntervalId};

/// A begin/end pair selected for an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub(crate) begin: Time,
    pub(crate) end: Time,
    pub(crate) begin_instance: Option<InstanceId>,
    pub(crate) end_instance: Option<InstanceId>,
    pub(crate) begin_dependents: Vec<InstanceId>,
    pub(crate) end_dependents: Vec<InstanceId>,
}

impl Interval {
    pub(crate) fn new(
        begin: Time,
        end: Time,
        begin_instance: Option<InstanceId>,
        end_instance: Option<InstanceId>,
    ) -> Self {
        Self {
            begin,
            end,
            begin_instance,
            end_instance,
            begin_dependents: Vec::new(),
            end_dependents: Vec::new(),
        }
    }

    /// Begin time.
    #[inline]
    pub fn begin(&self) -> Time {
        self.begin
    }

    /// End time; may be unresolved or indefinite.
    #[inline]
    pub fn end(&self) -> Time {
        self.end
    }

    /// Instance time the begin came from.
    #[inline]
    pub fn begin_instance(&self) -> Option<InstanceId> {
        self.begin_instance
    }

    /// Instance time the end came from.
    #[inline]
    pub fn end_instance(&self) -> Option<InstanceId> {
        self.end_instance
    }

    /// Instance times derived from this interval's begin.
    pub fn begin_dependents(&self) -> &[InstanceId] {
        &self.begin_dependents
    }

    /// Instance times derived from this interval's end.
    pub fn end_dependents(&self) -> &[InstanceId] {
        &self.end_dependents
    }

    pub(crate) fn add_dependent(&mut self, instance: InstanceId, for_begin: bool) {
        if for_begin {
            self.begin_dependents.push(instance);
        } else {
            self.end_dependents.push(instance);
        }
    }

    pub(crate) fn remove_dependent(&mut self, instance: InstanceId, for_begin: bool) {
        let list = if for_begin {
            &mut self.begin_dependents
        } else {
            &mut self.end_dependents
        };
        list.retain(|&d| d != instance);
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", DisplayTime(self.begin), DisplayTime(self.end))
    }
}

/// Result of an interval computation, not yet installed on the element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalCandidate {
    /// Begin time.
    pub begin: Time,
    /// End time.
    pub end: Time,
    /// Instance time the begin was taken from.
    pub begin_instance: Option<InstanceId>,
    /// Instance time the end was taken from.
    pub end_instance: Option<InstanceId>,
    /// Repeat duration computed alongside the end.
    pub repeat_duration: Time,
}

impl TimedDocumentRoot {
    pub(crate) fn alloc_interval(&mut self, candidate: &IntervalCandidate) -> IntervalId {
        let id = IntervalId(self.next_interval);
        self.next_interval += 1;
        self.intervals.insert(
            id,
            Interval::new(
                candidate.begin,
                candidate.end,
                candidate.begin_instance,
                candidate.end_instance,
            ),
        );
        id
    }

    /// Drops an interval that is no longer current or previous.
    ///
    /// Syncbase specifiers forget their mapping for it; the instance times
    /// they created stay in their owners' lists.
    pub(crate) fn release_interval(&mut self, iv: IntervalId) {
        let Some(interval) = self.intervals.remove(&iv) else {
            return;
        };
        for inst in interval.begin_dependents.iter().chain(interval.end_dependents.iter()) {
            if let Some(sid) = self.instances.get(inst).and_then(|i| i.creator) {
                self.forget_interval(sid, iv);
            }
        }
    }

    /// Moves an interval's begin and pushes the new time to its dependents.
    pub(crate) fn set_interval_begin(&mut self, iv: IntervalId, begin: Time) -> Time {
        let dependents = match self.intervals.get_mut(&iv) {
            Some(interval) => {
                interval.begin = begin;
                interval.begin_dependents.clone()
            }
            None => return INDEFINITE,
        };
        let mut min = INDEFINITE;
        for inst in dependents {
            min = earliest(min, self.dependent_update(inst, begin));
        }
        min
    }

    /// Moves an interval's end and pushes the new time to its dependents.
    pub(crate) fn set_interval_end(
        &mut self,
        iv: IntervalId,
        end: Time,
        end_instance: Option<InstanceId>,
    ) -> Time {
        let dependents = match self.intervals.get_mut(&iv) {
            Some(interval) => {
                interval.end = end;
                interval.end_instance = end_instance;
                interval.end_dependents.clone()
            }
            None => return INDEFINITE,
        };
        let mut min = INDEFINITE;
        for inst in dependents {
            min = earliest(min, self.dependent_update(inst, end));
        }
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    use crate::time::UNRESOLVED;

    #[test]
    fn dependents_are_removed_by_identity() {
        let mut interval = Interval::new(0.0, 2.0, None, None);
        interval.add_dependent(InstanceId(1), true);
        interval.add_dependent(InstanceId(2), true);
        interval.add_dependent(InstanceId(3), false);
        interval.remove_dependent(InstanceId(1), true);
        interval.remove_dependent(InstanceId(3), true);
        assert_eq!(interval.begin_dependents(), &[InstanceId(2)]);
        assert_eq!(interval.end_dependents(), &[InstanceId(3)]);
    }

    #[test]
    fn display_names_open_ends() {
        let interval = Interval::new(1.0, UNRESOLVED, None, None);
        assert_eq!(interval.to_string(), "[1, UNRESOLVED)");
    }
}
