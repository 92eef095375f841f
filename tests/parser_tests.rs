//! Integration tests for timing attribute parsing

use smil_timing::{
    AccessKeySyntax, FillMode, INDEFINITE, ParseErrorKind, RestartMode, TimingAttributes,
    TimingSpec, is_unresolved, parse_clock_value, parse_offset, parse_timing_specifier_list,
    parse_wallclock,
};

#[test]
fn clock_values_in_every_form() {
    assert_eq!(parse_clock_value("02:30:03").unwrap(), 9003.0);
    assert_eq!(parse_clock_value("00:10.5").unwrap(), 10.5);
    assert_eq!(parse_clock_value("1.5min").unwrap(), 90.0);
    assert_eq!(parse_clock_value("250ms").unwrap(), 0.25);
    assert_eq!(parse_clock_value("2h").unwrap(), 7200.0);
    assert_eq!(parse_clock_value("7").unwrap(), 7.0);
}

#[test]
fn malformed_clock_values_are_rejected() {
    assert!(parse_clock_value("").is_err());
    assert!(parse_clock_value("5 s").is_err());
    assert!(parse_offset("--1s").is_err());
}

#[test]
fn offsets_carry_their_sign() {
    assert_eq!(parse_offset("-1.5s").unwrap(), -1.5);
    assert_eq!(parse_offset(" +3 ").unwrap(), 3.0);
}

#[test]
fn syncbase_with_negative_offset() {
    let list = parse_timing_specifier_list("intro.begin - 500ms", AccessKeySyntax::default()).unwrap();
    assert_eq!(
        list,
        vec![TimingSpec::Syncbase {
            offset: -0.5,
            syncbase_id: "intro".into(),
            sync_begin: true,
        }]
    );
}

#[test]
fn event_with_offset_and_media_marker() {
    let list = parse_timing_specifier_list(
        "button.click+1s; video.marker(chapter2)",
        AccessKeySyntax::default(),
    )
    .unwrap();
    assert_eq!(
        list,
        vec![
            TimingSpec::Eventbase {
                offset: 1.0,
                eventbase_id: Some("button".into()),
                event_type: "click".into(),
            },
            TimingSpec::MediaMarker {
                syncbase_id: "video".into(),
                marker_name: "chapter2".into(),
            },
        ]
    );
}

#[test]
fn wallclock_with_zone_offset() {
    let value = parse_wallclock("1970-01-01T01:00:00+01:00").unwrap();
    assert_eq!(value.to_epoch_millis(0), 0);
    let value = parse_wallclock("1970-01-01T00:00:01.25Z").unwrap();
    assert_eq!(value.to_epoch_millis(0), 1250);
}

#[test]
fn timing_attributes_parse_into_params() {
    let parsed = TimingAttributes::new()
        .begin("1s; a.end")
        .dur(" 2s ")
        .repeat_count("indefinite")
        .repeat_dur("9s")
        .fill("freeze")
        .restart("whenNotActive")
        .parse(AccessKeySyntax::default())
        .unwrap();
    assert_eq!(parsed.begin.len(), 2);
    assert!(parsed.end.is_empty());
    assert_eq!(parsed.params.simple_dur, 2.0);
    assert_eq!(parsed.params.repeat_count, INDEFINITE);
    assert_eq!(parsed.params.repeat_dur, 9.0);
    assert_eq!(parsed.params.fill, FillMode::Freeze);
    assert_eq!(parsed.params.restart, RestartMode::WhenNotActive);
}

#[test]
fn non_positive_repeat_count_is_unresolved() {
    let parsed = TimingAttributes::new()
        .repeat_count("0")
        .parse(AccessKeySyntax::default())
        .unwrap();
    assert!(is_unresolved(parsed.params.repeat_count));
}

#[test]
fn min_greater_than_max_is_ignored() {
    let parsed = TimingAttributes::new()
        .min("5s")
        .max("2s")
        .parse(AccessKeySyntax::default())
        .unwrap();
    assert_eq!(parsed.params.min, 0.0);
    assert_eq!(parsed.params.max, INDEFINITE);
}

#[test]
fn bad_attribute_names_the_attribute() {
    let err = TimingAttributes::new()
        .end("a.end+")
        .parse(AccessKeySyntax::default())
        .unwrap_err();
    assert_eq!(err.attribute, "end");
    assert_eq!(err.source.kind, ParseErrorKind::InvalidNumber);

    let err = TimingAttributes::new()
        .fill("hold")
        .parse(AccessKeySyntax::default())
        .unwrap_err();
    assert_eq!(err.attribute, "fill");
}
