#![cfg_attr(not(feature = "std"), no_std)]
#![doc = include_str!("../README.md")]

//! # Core Concepts
//!
//! - **`TimedDocumentRoot`**: Owns every timed element and samples the document at a time
//! - **`ElementDecl`**: Declares an element with its timing attributes and behavior
//! - **`TimingAttributes`**: Raw `begin`, `dur`, `end`, `min`, `max`, `repeatCount`, `repeatDur`, `fill` and `restart` values
//! - **`TimedBehavior`**: Trait to implement for the effect an element drives
//! - **`Interval`**: A begin/end pair selected from an element's instance times
//! - **`TimingSpec`**: One parsed entry of a begin or end list
//! - **`TimegraphListener`**: Observer for activation, fill, repeat and interval changes
//! - **`DomEvent`**: An event feeding event-based and access key timing values
//! - **`DocumentTimeline`**: Plays a document against a host clock
//! - **`TimeSource`**: Trait to implement for your timing system
//! - **`TimelineAction`**: Commands that can be sent to control timelines
//!
//! Document times are `f32` seconds with two reserved values, [`UNRESOLVED`]
//! and [`INDEFINITE`]. Event timestamps are milliseconds since the Unix epoch.

extern crate alloc;

#[macro_use]
mod fmt;

pub mod time;
pub mod types;
pub mod parser;
pub mod attributes;
pub mod instance;
pub mod interval;
pub mod specifier;
pub mod element;
pub mod container;
pub mod event;
pub mod listener;
pub mod root;
pub mod timeline;
pub mod command;

pub use attributes::{ElementDecl, ParsedTiming, TimingAttributes, TimingParams};
pub use command::{TimelineAction, TimelineCommand};
pub use element::{NullBehavior, TimedBehavior, TimedElement};
pub use event::{DomEvent, EventTarget, MAX_PENDING_EVENTS};
pub use instance::InstanceTime;
pub use interval::{Interval, IntervalCandidate};
pub use listener::TimegraphListener;
pub use parser::{
    AccessKey, AccessKeySyntax, ParseError, ParseErrorKind, TimingSpec, WallclockValue,
    parse_clock_value, parse_offset, parse_timing_specifier_list, parse_wallclock,
};
pub use root::{DocumentConfig, TimedDocumentRoot};
pub use specifier::TimingSpecifier;
pub use time::{
    INDEFINITE, Time, TimeDuration, TimeInstant, TimeSource, UNRESOLVED, display_time, is_unresolved,
    max_time, min_time, minus_time, multiply_time,
};
pub use timeline::{DocumentTimeline, ServiceTiming, TimelineError, TimelineState};
pub use types::{
    ElementId, FillMode, InstanceId, IntervalId, RestartMode, SpecifierId, TimeEventKind, TimingError,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_compile() {
        let _ = FillMode::Freeze;
        let _ = RestartMode::WhenNotActive;
        let _ = TimeEventKind::Repeat;
        let _ = TimedDocumentRoot::default();
    }
}
