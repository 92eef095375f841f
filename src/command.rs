//! Command-based control for document timelines.

use crate::event::DomEvent;
use crate::time::Time;
use crate::types::ElementId;

/// Actions for controlling a [`DocumentTimeline`](crate::timeline::DocumentTimeline).
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineAction {
    /// Start the document with time zero at this epoch timestamp.
    Start {
        /// Milliseconds since the Unix epoch.
        epoch_millis: i64,
    },
    /// Pause document time.
    Pause,
    /// Resume document time.
    Resume,
    /// Stop and reset the document.
    Stop,
    /// Hyperlink seek to a document time.
    Seek(Time),
    /// Begin an element, as `beginElementAt`.
    BeginElement {
        /// Target element.
        element: ElementId,
        /// Seconds from now.
        offset: Time,
    },
    /// End an element, as `endElementAt`.
    EndElement {
        /// Target element.
        element: ElementId,
        /// Seconds from now.
        offset: Time,
    },
    /// Deliver an event.
    Dispatch(DomEvent),
}

/// Command targeting a specific timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineCommand<Id> {
    pub timeline_id: Id,
    pub action: TimelineAction,
}

impl<Id> TimelineCommand<Id> {
    /// Creates command.
    pub fn new(timeline_id: Id, action: TimelineAction) -> Self {
        Self {
            timeline_id,
            action,
        }
    }
}
