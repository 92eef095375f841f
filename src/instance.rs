//! Instance times: candidate begin or end times held in an element's sorted lists.

use core::cmp::Ordering;

use crate::time::{Time, is_unresolved};
use crate::types::SpecifierId;

/// A candidate begin or end time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTime {
    pub(crate) time: Time,
    pub(crate) creator: Option<SpecifierId>,
    pub(crate) clear_on_reset: bool,
}

impl InstanceTime {
    /// Creates an instance time.
    ///
    /// `creator` is the timing specifier that produced it, `None` for times
    /// added through the DOM-style begin/end calls.
    pub fn new(creator: Option<SpecifierId>, time: Time, clear_on_reset: bool) -> Self {
        Self {
            time,
            creator,
            clear_on_reset,
        }
    }

    /// The candidate time.
    #[inline]
    pub fn time(&self) -> Time {
        self.time
    }

    /// The specifier that created this instance, if any.
    #[inline]
    pub fn creator(&self) -> Option<SpecifierId> {
        self.creator
    }

    /// Whether an element reset discards this instance.
    #[inline]
    pub fn clear_on_reset(&self) -> bool {
        self.clear_on_reset
    }
}

/// Total order used for instance lists. Unresolved sorts after everything.
pub(crate) fn compare_times(a: Time, b: Time) -> Ordering {
    match (is_unresolved(a), is_unresolved(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{INDEFINITE, UNRESOLVED};

    #[test]
    fn unresolved_sorts_last() {
        assert_eq!(compare_times(UNRESOLVED, INDEFINITE), Ordering::Greater);
        assert_eq!(compare_times(INDEFINITE, UNRESOLVED), Ordering::Less);
        assert_eq!(compare_times(UNRESOLVED, UNRESOLVED), Ordering::Equal);
        assert_eq!(compare_times(-0.0, 0.0), Ordering::Equal);
        assert_eq!(compare_times(1.0, 2.0), Ordering::Less);
    }
}
