//! Parsers for SMIL timing attribute values.
//!
//! Handles clock values (`02:30:03.5`, `5:12`, `3.2h`, `45min`, `30s`,
//! `120ms`, `12.5`), signed offsets and `;`-separated begin/end lists made of
//! offset, syncbase, event, repeat, accesskey, media marker, wallclock and
//! `indefinite` values.

use alloc::string::String;
use alloc::vec::Vec;

use thiserror::Error;

use crate::time::{INDEFINITE, Time};

/// What went wrong while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseErrorKind {
    /// A character that cannot appear here.
    #[error("unexpected character")]
    UnexpectedCharacter,

    /// The value ended early.
    #[error("unexpected end of value")]
    UnexpectedEnd,

    /// Input continues after a complete value.
    #[error("expected end of value")]
    TrailingInput,

    /// A number is missing or out of range.
    #[error("invalid number")]
    InvalidNumber,

    /// A wallclock field is out of range.
    #[error("invalid wallclock value")]
    InvalidWallclock,
}

/// A parse failure and the character offset it was detected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("{kind} at offset {position}")]
pub struct ParseError {
    /// Failure kind.
    pub kind: ParseErrorKind,
    /// Character offset into the attribute value.
    pub position: usize,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, position: usize) -> Self {
        Self { kind, position }
    }
}

/// Which accesskey spellings are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessKeySyntax {
    /// `accessKey(c)` with a single character (SVG 1.1).
    pub svg11: bool,
    /// `accessKey(Name)` with a key name (SVG 1.2). `accesskey(c)` is always accepted.
    pub svg12: bool,
}

impl Default for AccessKeySyntax {
    fn default() -> Self {
        Self {
            svg11: true,
            svg12: false,
        }
    }
}

/// The key an accesskey value waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessKey {
    /// A single character, matched against `keypress` events.
    Char(char),
    /// A key name, matched against `keydown` events.
    Named(String),
}

/// A wallclock value: an optional date, a time of day and an optional zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WallclockValue {
    /// `(year, month, day)` when a date was given.
    pub date: Option<(i64, u32, u32)>,
    /// Milliseconds since local midnight.
    pub millis_of_day: i64,
    /// Zone offset east of UTC in milliseconds; `None` is read as UTC.
    pub zone_offset_millis: Option<i64>,
}

const MILLIS_PER_DAY: i64 = 86_400_000;

impl WallclockValue {
    /// Converts to milliseconds since the Unix epoch.
    ///
    /// A time-only value is placed on the UTC date of `anchor_epoch_millis`.
    pub fn to_epoch_millis(&self, anchor_epoch_millis: i64) -> i64 {
        let day = match self.date {
            Some((y, m, d)) => days_from_civil(y, m, d),
            None => anchor_epoch_millis.div_euclid(MILLIS_PER_DAY),
        };
        day * MILLIS_PER_DAY + self.millis_of_day - self.zone_offset_millis.unwrap_or(0)
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (i64::from(m) + 9) % 12;
    let doy = (153 * mp + 2) / 5 + i64::from(d) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// One parsed entry of a begin or end list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingSpec {
    /// A plain offset from the parent's begin.
    Offset {
        /// Offset in seconds.
        offset: Time,
    },
    /// `id.begin[+offset]` or `id.end[+offset]`.
    Syncbase {
        /// Offset in seconds.
        offset: Time,
        /// Referenced element id.
        syncbase_id: String,
        /// Whether the reference is to the begin of the other element's interval.
        sync_begin: bool,
    },
    /// `[id.]event[+offset]`.
    Eventbase {
        /// Offset in seconds.
        offset: Time,
        /// Event target id; `None` means the element's own target.
        eventbase_id: Option<String>,
        /// DOM event type.
        event_type: String,
    },
    /// `id.repeat[(n)][+offset]`.
    Repeat {
        /// Offset in seconds.
        offset: Time,
        /// Element whose repeats are observed.
        eventbase_id: String,
        /// Only this iteration counts when given.
        repeat_iteration: Option<u32>,
    },
    /// `accessKey(c)[+offset]`.
    Accesskey {
        /// Offset in seconds.
        offset: Time,
        /// Key to wait for.
        key: AccessKey,
    },
    /// `id.marker(name)`. Parsed but never produces instance times.
    MediaMarker {
        /// Media element id.
        syncbase_id: String,
        /// Marker name.
        marker_name: String,
    },
    /// `wallclock(...)`.
    Wallclock {
        /// Parsed value.
        value: WallclockValue,
    },
    /// `indefinite`.
    Indefinite,
}

impl TimingSpec {
    /// Whether this entry resolves from DOM events.
    pub fn is_event_condition(&self) -> bool {
        matches!(
            self,
            TimingSpec::Eventbase { .. } | TimingSpec::Repeat { .. } | TimingSpec::Accesskey { .. }
        )
    }
}

/// Parses a non-negative clock value.
pub fn parse_clock_value(value: &str) -> Result<Time, ParseError> {
    let mut c = Cursor::new(value.trim());
    let t = c.clock_value()?;
    c.expect_end()?;
    Ok(t)
}

/// Parses a clock value with an optional sign.
pub fn parse_offset(value: &str) -> Result<Time, ParseError> {
    let mut c = Cursor::new(value.trim());
    let t = c.offset()?;
    c.expect_end()?;
    Ok(t)
}

/// Parses a bare wallclock value such as `2024-05-01T12:00:00Z`.
pub fn parse_wallclock(value: &str) -> Result<WallclockValue, ParseError> {
    let mut c = Cursor::new(value.trim());
    let v = c.wallclock_value()?;
    c.expect_end()?;
    Ok(v)
}

/// Parses a `;`-separated begin or end list.
///
/// Whitespace-only input yields an empty list.
pub fn parse_timing_specifier_list(
    value: &str,
    syntax: AccessKeySyntax,
) -> Result<Vec<TimingSpec>, ParseError> {
    let mut list = Vec::new();
    if value.trim().is_empty() {
        return Ok(list);
    }
    let mut c = Cursor::new(value);
    c.syntax = syntax;
    loop {
        list.push(c.timing_specifier()?);
        c.skip_spaces();
        match c.current() {
            None => break,
            Some(';') => c.advance(),
            Some(_) => return Err(c.error(ParseErrorKind::UnexpectedCharacter)),
        }
    }
    Ok(list)
}

fn is_name_first(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == ':'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | ':' | '-' | '.')
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    syntax: AccessKeySyntax,
}

impl Cursor {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            syntax: AccessKeySyntax::default(),
        }
    }

    #[inline]
    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    #[inline]
    fn advance(&mut self) {
        self.pos += 1;
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        let kind = if kind == ParseErrorKind::UnexpectedCharacter && self.current().is_none() {
            ParseErrorKind::UnexpectedEnd
        } else {
            kind
        };
        ParseError::new(kind, self.pos)
    }

    fn skip_spaces(&mut self) {
        while matches!(self.current(), Some(' ' | '\t' | '\n' | '\r')) {
            self.advance();
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ParseError> {
        if self.current() != Some(ch) {
            return Err(self.error(ParseErrorKind::UnexpectedCharacter));
        }
        self.advance();
        Ok(())
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.current() {
            None => Ok(()),
            Some(_) => Err(ParseError::new(ParseErrorKind::TrailingInput, self.pos)),
        }
    }

    fn digits(&mut self) -> Result<u64, ParseError> {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(d) = self.current().and_then(|ch| ch.to_digit(10)) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(d)))
                .ok_or(ParseError::new(ParseErrorKind::InvalidNumber, start))?;
            self.advance();
        }
        if self.pos == start {
            return Err(self.error(ParseErrorKind::InvalidNumber));
        }
        Ok(value)
    }

    /// Digits after a decimal point, as a fraction in `[0, 1)`.
    fn fraction(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        let mut value = 0.0f64;
        let mut weight = 0.1f64;
        while let Some(d) = self.current().and_then(|ch| ch.to_digit(10)) {
            value += f64::from(d) * weight;
            weight /= 10.0;
            self.advance();
        }
        if self.pos == start {
            return Err(self.error(ParseErrorKind::InvalidNumber));
        }
        Ok(value)
    }

    fn clock_value(&mut self) -> Result<Time, ParseError> {
        let d1 = self.digits()? as f64;
        let value = if self.current() == Some(':') {
            self.advance();
            let d2 = self.digits()? as f64;
            let mut v = if self.current() == Some(':') {
                self.advance();
                let d3 = self.digits()? as f64;
                d1 * 3600.0 + d2 * 60.0 + d3
            } else {
                d1 * 60.0 + d2
            };
            if self.current() == Some('.') {
                self.advance();
                v += self.fraction()?;
            }
            v
        } else if self.current() == Some('.') {
            self.advance();
            (d1 + self.fraction()?) * self.unit()?
        } else {
            d1 * self.unit()?
        };
        Ok(value as Time)
    }

    fn unit(&mut self) -> Result<f64, ParseError> {
        match self.current() {
            Some('h') => {
                self.advance();
                Ok(3600.0)
            }
            Some('m') => {
                self.advance();
                match self.current() {
                    Some('i') => {
                        self.advance();
                        self.expect('n')?;
                        Ok(60.0)
                    }
                    Some('s') => {
                        self.advance();
                        Ok(0.001)
                    }
                    _ => Err(self.error(ParseErrorKind::UnexpectedCharacter)),
                }
            }
            Some('s') => {
                self.advance();
                Ok(1.0)
            }
            _ => Ok(1.0),
        }
    }

    fn offset(&mut self) -> Result<Time, ParseError> {
        let negative = match self.current() {
            Some('-') => {
                self.advance();
                self.skip_spaces();
                true
            }
            Some('+') => {
                self.advance();
                self.skip_spaces();
                false
            }
            _ => false,
        };
        let v = self.clock_value()?;
        Ok(if negative { -v } else { v })
    }

    fn trailing_offset(&mut self) -> Result<Time, ParseError> {
        if matches!(self.current(), Some('+' | '-')) {
            self.offset()
        } else {
            Ok(0.0)
        }
    }

    fn name(&mut self) -> Result<String, ParseError> {
        let mut s = String::new();
        let Some(first) = self.current() else {
            return Err(self.error(ParseErrorKind::UnexpectedEnd));
        };
        if !is_name_first(first) {
            return Err(self.error(ParseErrorKind::UnexpectedCharacter));
        }
        loop {
            let Some(ch) = self.current() else { break };
            s.push(ch);
            self.advance();
            let mut escaped = false;
            if self.current() == Some('\\') {
                escaped = true;
                self.advance();
            }
            match self.current() {
                Some(ch) if is_name_char(ch) && (escaped || (ch != '-' && ch != '.')) => {}
                _ => break,
            }
        }
        Ok(s)
    }

    fn timing_specifier(&mut self) -> Result<TimingSpec, ParseError> {
        self.skip_spaces();
        let mut escaped = false;
        if self.current() == Some('\\') {
            escaped = true;
            self.advance();
        }
        match self.current() {
            Some('+') => Ok(TimingSpec::Offset { offset: self.offset()? }),
            Some('-') if !escaped => Ok(TimingSpec::Offset { offset: self.offset()? }),
            Some(ch) if ch.is_ascii_digit() => Ok(TimingSpec::Offset { offset: self.offset()? }),
            Some(ch) if is_name_first(ch) => self.id_value(escaped),
            _ => Err(self.error(ParseErrorKind::UnexpectedCharacter)),
        }
    }

    fn id_value(&mut self, escaped: bool) -> Result<TimingSpec, ParseError> {
        let id = self.name()?;
        if !escaped && ((id == "accessKey" && self.syntax.svg11) || id == "accesskey") {
            self.expect('(')?;
            let Some(key) = self.current() else {
                return Err(self.error(ParseErrorKind::UnexpectedEnd));
            };
            self.advance();
            self.expect(')')?;
            self.skip_spaces();
            let offset = self.trailing_offset()?;
            return Ok(TimingSpec::Accesskey {
                offset,
                key: AccessKey::Char(key),
            });
        }
        if !escaped && id == "accessKey" && self.syntax.svg12 {
            self.expect('(')?;
            let mut name = String::new();
            while let Some(ch) = self.current() {
                if !(ch.is_ascii_alphanumeric() || ch == '+') {
                    break;
                }
                name.push(ch);
                self.advance();
            }
            if name.is_empty() {
                return Err(self.error(ParseErrorKind::UnexpectedCharacter));
            }
            self.expect(')')?;
            self.skip_spaces();
            let offset = self.trailing_offset()?;
            return Ok(TimingSpec::Accesskey {
                offset,
                key: AccessKey::Named(name),
            });
        }
        if !escaped && id == "wallclock" {
            self.expect('(')?;
            self.skip_spaces();
            let value = self.wallclock_value()?;
            self.skip_spaces();
            self.expect(')')?;
            return Ok(TimingSpec::Wallclock { value });
        }
        if !escaped && id == "indefinite" {
            return Ok(TimingSpec::Indefinite);
        }
        if self.current() == Some('.') {
            self.advance();
            let mut member_escaped = false;
            if self.current() == Some('\\') {
                member_escaped = true;
                self.advance();
            }
            let member = self.name()?;
            if !member_escaped && (member == "begin" || member == "end") {
                self.skip_spaces();
                let offset = self.trailing_offset()?;
                return Ok(TimingSpec::Syncbase {
                    offset,
                    syncbase_id: id,
                    sync_begin: member == "begin",
                });
            }
            if !member_escaped && member == "repeat" {
                let mut repeat_iteration = None;
                if self.current() == Some('(') {
                    self.advance();
                    let n = self.digits()?;
                    let n = u32::try_from(n)
                        .map_err(|_| ParseError::new(ParseErrorKind::InvalidNumber, self.pos))?;
                    repeat_iteration = Some(n);
                    self.expect(')')?;
                }
                self.skip_spaces();
                let offset = self.trailing_offset()?;
                return Ok(TimingSpec::Repeat {
                    offset,
                    eventbase_id: id,
                    repeat_iteration,
                });
            }
            if !member_escaped && member == "marker" {
                self.expect('(')?;
                let marker_name = self.name()?;
                self.expect(')')?;
                return Ok(TimingSpec::MediaMarker {
                    syncbase_id: id,
                    marker_name,
                });
            }
            self.skip_spaces();
            let offset = self.trailing_offset()?;
            return Ok(TimingSpec::Eventbase {
                offset,
                eventbase_id: Some(id),
                event_type: member,
            });
        }
        self.skip_spaces();
        let offset = self.trailing_offset()?;
        Ok(TimingSpec::Eventbase {
            offset,
            eventbase_id: None,
            event_type: id,
        })
    }

    fn two_digit_field(&mut self, max: u64) -> Result<u32, ParseError> {
        let start = self.pos;
        let v = self.digits()?;
        if v > max {
            return Err(ParseError::new(ParseErrorKind::InvalidWallclock, start));
        }
        Ok(v as u32)
    }

    fn wallclock_value(&mut self) -> Result<WallclockValue, ParseError> {
        let start = self.pos;
        let first = self.digits()?;
        let mut date = None;
        let mut hours = first;
        let mut has_time = false;
        if self.current() == Some('-') {
            self.advance();
            let month = self.two_digit_field(12)?;
            self.expect('-')?;
            let day = self.two_digit_field(31)?;
            if month == 0 || day == 0 {
                return Err(ParseError::new(ParseErrorKind::InvalidWallclock, start));
            }
            let year = i64::try_from(first)
                .map_err(|_| ParseError::new(ParseErrorKind::InvalidNumber, start))?;
            date = Some((year, month, day));
            if self.current() != Some('T') {
                return Ok(WallclockValue {
                    date,
                    millis_of_day: 0,
                    zone_offset_millis: None,
                });
            }
            self.advance();
            hours = self.digits()?;
            if self.current() != Some(':') {
                return Err(self.error(ParseErrorKind::UnexpectedCharacter));
            }
        }
        let mut millis_of_day = 0i64;
        let mut zone_offset_millis = None;
        if self.current() == Some(':') {
            has_time = true;
            if hours > 23 {
                return Err(ParseError::new(ParseErrorKind::InvalidWallclock, start));
            }
            self.advance();
            let minutes = self.two_digit_field(59)?;
            let mut seconds = 0.0f64;
            if self.current() == Some(':') {
                self.advance();
                seconds = f64::from(self.two_digit_field(60)?);
                if self.current() == Some('.') {
                    self.advance();
                    seconds += self.fraction()?;
                }
            }
            millis_of_day = hours as i64 * 3_600_000
                + i64::from(minutes) * 60_000
                + (seconds * 1000.0 + 0.5) as i64;
            match self.current() {
                Some('Z') => {
                    self.advance();
                    zone_offset_millis = Some(0);
                }
                Some(sign @ ('+' | '-')) => {
                    self.advance();
                    let tz_hours = self.two_digit_field(23)?;
                    self.expect(':')?;
                    let tz_minutes = self.two_digit_field(59)?;
                    let magnitude = i64::from(tz_hours) * 3_600_000 + i64::from(tz_minutes) * 60_000;
                    zone_offset_millis = Some(if sign == '-' { -magnitude } else { magnitude });
                }
                _ => {}
            }
        }
        if date.is_none() && !has_time {
            return Err(self.error(ParseErrorKind::UnexpectedCharacter));
        }
        Ok(WallclockValue {
            date,
            millis_of_day,
            zone_offset_millis,
        })
    }
}

/// Parses a `dur`-style value: `indefinite` or a clock value.
pub(crate) fn parse_duration(value: &str) -> Result<Time, ParseError> {
    if value.trim() == "indefinite" {
        return Ok(INDEFINITE);
    }
    parse_clock_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn clock_value_forms() {
        assert_eq!(parse_clock_value("02:30:03").unwrap(), 9003.0);
        assert_eq!(parse_clock_value("5:12.5").unwrap(), 312.5);
        assert_eq!(parse_clock_value("3.5h").unwrap(), 12600.0);
        assert_eq!(parse_clock_value("45min").unwrap(), 2700.0);
        assert_eq!(parse_clock_value("250ms").unwrap(), 0.25);
        assert_eq!(parse_clock_value("12").unwrap(), 12.0);
    }

    #[test]
    fn clock_value_rejects_bad_units() {
        assert!(parse_clock_value("3mx").is_err());
        assert!(parse_clock_value("abc").is_err());
        assert_eq!(
            parse_clock_value("3s4").unwrap_err().kind,
            ParseErrorKind::TrailingInput
        );
    }

    #[test]
    fn offset_allows_space_after_sign() {
        assert_eq!(parse_offset("- 2s").unwrap(), -2.0);
        assert_eq!(parse_offset("+1.5").unwrap(), 1.5);
    }

    #[test]
    fn list_of_mixed_values() {
        let list = parse_timing_specifier_list(
            "0; a.end+2s; click; b.repeat(2); indefinite",
            AccessKeySyntax::default(),
        )
        .unwrap();
        assert_eq!(
            list,
            vec![
                TimingSpec::Offset { offset: 0.0 },
                TimingSpec::Syncbase {
                    offset: 2.0,
                    syncbase_id: "a".to_string(),
                    sync_begin: false,
                },
                TimingSpec::Eventbase {
                    offset: 0.0,
                    eventbase_id: None,
                    event_type: "click".to_string(),
                },
                TimingSpec::Repeat {
                    offset: 0.0,
                    eventbase_id: "b".to_string(),
                    repeat_iteration: Some(2),
                },
                TimingSpec::Indefinite,
            ]
        );
    }

    #[test]
    fn escaped_names() {
        let list =
            parse_timing_specifier_list("my\\-id.click", AccessKeySyntax::default()).unwrap();
        assert_eq!(
            list,
            vec![TimingSpec::Eventbase {
                offset: 0.0,
                eventbase_id: Some("my-id".to_string()),
                event_type: "click".to_string(),
            }]
        );
        let list = parse_timing_specifier_list("\\indefinite", AccessKeySyntax::default()).unwrap();
        assert!(matches!(list[0], TimingSpec::Eventbase { .. }));
    }

    #[test]
    fn trailing_semicolon_is_an_error() {
        assert!(parse_timing_specifier_list("1s;", AccessKeySyntax::default()).is_err());
        assert!(parse_timing_specifier_list("   ", AccessKeySyntax::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn accesskey_spellings() {
        let svg12 = AccessKeySyntax {
            svg11: false,
            svg12: true,
        };
        let list = parse_timing_specifier_list("accessKey(Enter)+1s", svg12).unwrap();
        assert_eq!(
            list,
            vec![TimingSpec::Accesskey {
                offset: 1.0,
                key: AccessKey::Named("Enter".to_string()),
            }]
        );
        let list = parse_timing_specifier_list("accesskey(x)", svg12).unwrap();
        assert_eq!(
            list,
            vec![TimingSpec::Accesskey {
                offset: 0.0,
                key: AccessKey::Char('x'),
            }]
        );
    }

    #[test]
    fn wallclock_to_epoch() {
        let v = parse_wallclock("1970-01-02T00:00:01Z").unwrap();
        assert_eq!(v.to_epoch_millis(0), 86_401_000);
        let v = parse_wallclock("2000-03-01").unwrap();
        assert_eq!(v.to_epoch_millis(0), 951_868_800_000);
        let v = parse_wallclock("01:00+01:00").unwrap();
        assert_eq!(v.to_epoch_millis(5 * MILLIS_PER_DAY + 123), 5 * MILLIS_PER_DAY);
    }

    #[test]
    fn wallclock_rejects_out_of_range_fields() {
        assert_eq!(
            parse_wallclock("2020-13-01").unwrap_err().kind,
            ParseErrorKind::InvalidWallclock
        );
        assert!(parse_wallclock("25:00").is_err());
    }
}
