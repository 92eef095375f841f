//! Integration tests for DocumentTimeline

mod common;
use common::*;

use smil_timing::{
    DocumentTimeline, DomEvent, EventTarget, ServiceTiming, TimeEventKind, TimedDocumentRoot,
    TimelineAction, TimelineCommand, TimelineError, TimelineState, TimingAttributes,
};

fn two_second_document() -> (TimedDocumentRoot, CallLog) {
    let mut root = TimedDocumentRoot::default();
    let (_, log) = add_recorded(&mut root, "a", TimingAttributes::new().begin("1s").dur("2s"));
    (root, log)
}

#[test]
fn start_requires_idle_state() {
    let timer = MockTimeSource::new();
    let (root, _) = two_second_document();
    let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
    timeline.start(0).unwrap();

    let result = timeline.start(0);
    assert!(matches!(
        result,
        Err(TimelineError::InvalidState {
            actual: TimelineState::Running,
            ..
        })
    ));
}

#[test]
fn service_timing_follows_the_document() {
    let timer = MockTimeSource::new();
    let (root, log) = two_second_document();
    let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);

    assert_eq!(timeline.start(0).unwrap(), ServiceTiming::Delay(TestDuration(1000)));

    timer.advance(TestDuration(1000));
    assert_eq!(timeline.service().unwrap(), ServiceTiming::Continuous);
    assert_eq!(count_events(&log, TimeEventKind::Begin), 1);

    timer.advance(TestDuration(2500));
    assert_eq!(timeline.service().unwrap(), ServiceTiming::Idle);
    assert_eq!(count_events(&log, TimeEventKind::End), 1);
}

#[test]
fn pause_resume_maintains_position() {
    let timer = MockTimeSource::new();
    let (root, log) = two_second_document();
    let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
    timeline.start(0).unwrap();

    timer.advance(TestDuration(1500));
    timeline.service().unwrap();
    timeline.pause().unwrap();
    assert!(timeline.is_paused());

    timer.advance(TestDuration(10_000));
    timeline.resume().unwrap();
    assert_eq!(timeline.current_time(), 1.5);
    assert_eq!(count_events(&log, TimeEventKind::End), 0);

    timer.advance(TestDuration(1500));
    timeline.service().unwrap();
    assert_eq!(count_events(&log, TimeEventKind::End), 1);
}

#[test]
fn events_map_through_shifted_document_begin() {
    let timer = MockTimeSource::new();
    let mut root = TimedDocumentRoot::default();
    let (a, _) = add_recorded(&mut root, "a", TimingAttributes::new().begin("b.click").dur("1s"));
    let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
    timeline.start(50_000).unwrap();

    timer.advance(TestDuration(1000));
    timeline.pause().unwrap();
    timer.advance(TestDuration(4000));
    timeline.resume().unwrap();

    // Host epoch is now 55_000; document time is 1.0.
    let click = DomEvent::new(EventTarget::Element("b".into()), "click", 55_000);
    assert_eq!(timeline.dispatch_event(&click).unwrap(), ServiceTiming::Continuous);
    assert_eq!(interval_of(timeline.root(), a), Some((1.0, 2.0)));
}

#[test]
fn commands_drive_the_timeline() {
    let timer = MockTimeSource::new();
    timer.set_time(TestInstant(10_000));
    let (mut root, _) = two_second_document();
    let (b, _) = add_recorded(&mut root, "b", TimingAttributes::new().begin("indefinite").dur("1s"));
    let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
    let a = timeline.root().element_by_id("a").unwrap();

    let commands = [
        TimelineCommand::new(0u8, TimelineAction::Start { epoch_millis: 0 }),
        TimelineCommand::new(0u8, TimelineAction::Seek(1.5)),
        TimelineCommand::new(0u8, TimelineAction::Pause),
    ];
    for command in commands {
        timeline.handle_action(command.action).unwrap();
    }
    assert_eq!(timeline.state(), TimelineState::Paused);
    assert!(timeline.root().element(a).unwrap().is_active());

    let timing = timeline
        .handle_action(TimelineAction::BeginElement {
            element: b,
            offset: 0.0,
        })
        .unwrap();
    assert_eq!(timing, ServiceTiming::Idle);
    assert!(!timeline.root().element(b).unwrap().is_active());

    timeline.handle_action(TimelineAction::Resume).unwrap();
    assert_eq!(interval_of(timeline.root(), b), Some((1.5, 2.5)));
    assert!(timeline.root().element(b).unwrap().is_active());

    timeline.handle_action(TimelineAction::Stop).unwrap();
    assert_eq!(timeline.state(), TimelineState::Idle);
}

#[test]
fn own_end_event_keeps_the_timeline_scheduled() {
    let timer = MockTimeSource::new();
    let mut root = TimedDocumentRoot::default();
    let (a, log) = add_recorded(&mut root, "a", TimingAttributes::new().begin("0s; a.endEvent+1s").dur("1s"));
    let mut timeline = DocumentTimeline::<TestInstant, MockTimeSource>::new(root, &timer);
    assert_eq!(timeline.start(0).unwrap(), ServiceTiming::Continuous);

    timer.advance(TestDuration(1000));
    assert_eq!(timeline.service().unwrap(), ServiceTiming::Delay(TestDuration(1000)));

    timer.advance(TestDuration(1000));
    assert_eq!(timeline.service().unwrap(), ServiceTiming::Continuous);
    assert!(timeline.root().element(a).unwrap().is_active());
    assert_eq!(count_events(&log, TimeEventKind::Begin), 2);
}
