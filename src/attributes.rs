//! Timing attributes and element declarations.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::element::TimedBehavior;
use crate::parser::{
    AccessKeySyntax, ParseError, ParseErrorKind, TimingSpec, parse_clock_value, parse_duration,
    parse_timing_specifier_list,
};
use crate::time::{INDEFINITE, Time, UNRESOLVED};
use crate::types::{FillMode, RestartMode};

const BEGIN_DEFAULT: &str = "0";

/// Raw SMIL timing attribute values. Empty strings mean "not specified".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingAttributes {
    begin: String,
    dur: String,
    end: String,
    min: String,
    max: String,
    repeat_count: String,
    repeat_dur: String,
    fill: String,
    restart: String,
}

macro_rules! attribute_setter {
    ($(#[$doc:meta] $name:ident),* $(,)?) => {
        $(
            #[$doc]
            pub fn $name(mut self, value: &str) -> Self {
                self.$name = String::from(value);
                self
            }
        )*
    };
}

impl TimingAttributes {
    /// All attributes unspecified.
    pub fn new() -> Self {
        Self::default()
    }

    attribute_setter! {
        /// Sets `begin`.
        begin,
        /// Sets `dur`.
        dur,
        /// Sets `end`.
        end,
        /// Sets `min`.
        min,
        /// Sets `max`.
        max,
        /// Sets `repeatCount`.
        repeat_count,
        /// Sets `repeatDur`.
        repeat_dur,
        /// Sets `fill`.
        fill,
        /// Sets `restart`.
        restart,
    }

    /// Parses every attribute.
    pub fn parse(&self, syntax: AccessKeySyntax) -> Result<ParsedTiming, AttributeError> {
        let begin = if self.begin.is_empty() {
            BEGIN_DEFAULT
        } else {
            self.begin.as_str()
        };
        let begin = parse_timing_specifier_list(begin, syntax).map_err(at("begin"))?;
        let (simple_dur, dur_media) = parse_dur(self.dur.trim()).map_err(at("dur"))?;
        let end = parse_timing_specifier_list(&self.end, syntax).map_err(at("end"))?;
        let (mut min, min_media) = parse_min(self.min.trim());
        let (mut max, max_media) = parse_max(self.max.trim());
        if min > max {
            min = 0.0;
            max = INDEFINITE;
        }
        let repeat_count = parse_repeat_count(self.repeat_count.trim()).map_err(at("repeatCount"))?;
        let repeat_dur = match self.repeat_dur.trim() {
            "" => UNRESOLVED,
            "indefinite" => INDEFINITE,
            v => parse_clock_value(v).map_err(at("repeatDur"))?,
        };
        let fill = match self.fill.trim() {
            "" | "remove" => FillMode::Remove,
            "freeze" => FillMode::Freeze,
            _ => return Err(AttributeError::invalid("fill")),
        };
        let restart = match self.restart.trim() {
            "" | "always" => RestartMode::Always,
            "whenNotActive" => RestartMode::WhenNotActive,
            "never" => RestartMode::Never,
            _ => return Err(AttributeError::invalid("restart")),
        };
        Ok(ParsedTiming {
            params: TimingParams {
                simple_dur,
                dur_media,
                repeat_count,
                repeat_dur,
                min,
                min_media,
                max,
                max_media,
                fill,
                restart,
            },
            begin,
            end,
        })
    }
}

/// An attribute that failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeError {
    /// SMIL attribute name.
    pub attribute: &'static str,
    /// Underlying failure.
    pub source: ParseError,
}

impl AttributeError {
    fn invalid(attribute: &'static str) -> Self {
        Self {
            attribute,
            source: ParseError::new(ParseErrorKind::UnexpectedCharacter, 0),
        }
    }
}

fn at(attribute: &'static str) -> impl Fn(ParseError) -> AttributeError {
    move |source| AttributeError { attribute, source }
}

fn parse_dur(value: &str) -> Result<(Time, bool), ParseError> {
    match value {
        "media" => Ok((UNRESOLVED, true)),
        "" => Ok((INDEFINITE, false)),
        v => {
            let d = parse_duration(v)?;
            Ok((if d < 0.0 { INDEFINITE } else { d }, false))
        }
    }
}

fn parse_min(value: &str) -> (Time, bool) {
    match value {
        "media" => (0.0, true),
        "" => (0.0, false),
        v => match parse_clock_value(v) {
            Ok(t) if t >= 0.0 => (t, false),
            _ => (0.0, false),
        },
    }
}

fn parse_max(value: &str) -> (Time, bool) {
    match value {
        "media" => (INDEFINITE, true),
        "" | "indefinite" => (INDEFINITE, false),
        v => match parse_clock_value(v) {
            Ok(t) if t < 0.0 => (0.0, false),
            Ok(t) => (t, false),
            Err(_) => (INDEFINITE, false),
        },
    }
}

fn parse_repeat_count(value: &str) -> Result<Time, ParseError> {
    match value {
        "" => Ok(UNRESOLVED),
        "indefinite" => Ok(INDEFINITE),
        v => {
            let n: f32 = v
                .parse()
                .map_err(|_| ParseError::new(ParseErrorKind::InvalidNumber, 0))?;
            Ok(if n > 0.0 { n } else { UNRESOLVED })
        }
    }
}

/// Parsed numeric timing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingParams {
    /// Explicit simple duration; unresolved with `dur="media"`.
    pub simple_dur: Time,
    /// `dur="media"`.
    pub dur_media: bool,
    /// `repeatCount`; unresolved when unspecified.
    pub repeat_count: Time,
    /// `repeatDur`; unresolved when unspecified.
    pub repeat_dur: Time,
    /// Lower bound on the active duration.
    pub min: Time,
    /// `min="media"`.
    pub min_media: bool,
    /// Upper bound on the active duration.
    pub max: Time,
    /// `max="media"`.
    pub max_media: bool,
    /// Fill behaviour.
    pub fill: FillMode,
    /// Restart behaviour.
    pub restart: RestartMode,
}

/// Parsed attributes ready to build an element from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTiming {
    /// Numeric parameters.
    pub params: TimingParams,
    /// Begin list.
    pub begin: Vec<TimingSpec>,
    /// End list.
    pub end: Vec<TimingSpec>,
}

/// Everything needed to add a timed element to a document.
pub struct ElementDecl {
    pub(crate) id: Option<String>,
    pub(crate) event_target: Option<String>,
    pub(crate) attributes: TimingAttributes,
    pub(crate) behavior: Box<dyn TimedBehavior>,
    pub(crate) container: bool,
}

impl ElementDecl {
    /// A leaf element driving `behavior`.
    pub fn new(behavior: impl TimedBehavior + 'static) -> Self {
        Self {
            id: None,
            event_target: None,
            attributes: TimingAttributes::default(),
            behavior: Box::new(behavior),
            container: false,
        }
    }

    /// A time container. Its children share the document time space.
    pub fn container(behavior: impl TimedBehavior + 'static) -> Self {
        Self {
            container: true,
            ..Self::new(behavior)
        }
    }

    /// Sets the XML id other elements refer to.
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(String::from(id));
        self
    }

    /// Sets the element observed by event values without an id prefix.
    pub fn event_target(mut self, id: &str) -> Self {
        self.event_target = Some(String::from(id));
        self
    }

    /// Sets the timing attributes.
    pub fn timing(mut self, attributes: TimingAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

impl core::fmt::Debug for ElementDecl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ElementDecl")
            .field("id", &self.id)
            .field("event_target", &self.event_target)
            .field("attributes", &self.attributes)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}
