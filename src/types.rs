//! Core types shared across the timing graph.

use alloc::string::String;
use core::fmt;

use thiserror::Error;

use crate::parser::ParseError;

/// What happens to an element's effect once its active duration ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FillMode {
    /// The effect is removed.
    #[default]
    Remove,

    /// The last sampled value is held.
    Freeze,
}

/// When an element may begin a new interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartMode {
    /// Restart at any time, even while active.
    #[default]
    Always,

    /// Restart only when not active.
    WhenNotActive,

    /// Never restart after the first interval.
    Never,
}

/// Handle to a timed element or container within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    /// Index of this element in document creation order.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a parsed timing specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpecifierId(pub(crate) usize);

/// Handle to an instance time. Never reused within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstanceId(pub(crate) u64);

/// Handle to an interval. Never reused within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IntervalId(pub(crate) u64);

/// Time events fired by elements as they progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeEventKind {
    /// An interval became active.
    Begin,

    /// An interval ended.
    End,

    /// A new repeat iteration started.
    Repeat,
}

impl TimeEventKind {
    /// The DOM event type name (`beginEvent`, `endEvent`, `repeatEvent`).
    pub fn event_type(self) -> &'static str {
        match self {
            TimeEventKind::Begin => "beginEvent",
            TimeEventKind::End => "endEvent",
            TimeEventKind::Repeat => "repeatEvent",
        }
    }
}

/// Errors reported while building or driving a timed document.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingError {
    /// A timing attribute could not be parsed.
    #[error("invalid value for attribute '{attribute}' on element {element}")]
    MalformedAttribute {
        /// The element's id, or its handle when it has none.
        element: String,
        /// Attribute name.
        attribute: &'static str,
        /// Underlying parse failure.
        #[source]
        source: ParseError,
    },

    /// A syncbase, repeat or marker reference names an unknown element.
    #[error("unknown timing reference '{0}'")]
    UnknownSyncbase(String),

    /// The handle does not refer to a live element.
    #[error("element {0} is not part of this document")]
    UnknownElement(ElementId),

    /// The element handle refers to a leaf, not a container.
    #[error("element {0} is not a time container")]
    NotAContainer(ElementId),

    /// Another element already uses this id.
    #[error("duplicate element id '{0}'")]
    DuplicateId(String),

    /// Too many events are waiting to be resolved on one element.
    #[error("pending event queue of element {0} is full")]
    EventQueueFull(ElementId),
}
