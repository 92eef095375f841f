//! Timed elements and the interval state machine that drives them.
//!
//! An element owns sorted lists of begin and end instance times. Each sample
//! folds them, together with the simple/active duration rules, into at most
//! one current interval, tracks activation, repeats and fill, and notifies the
//! elements whose syncbase values depend on it.

use alloc::string::String;
use alloc::vec::Vec;

use crate::attributes::TimingParams;
use crate::event::{HandledEvent, MAX_PENDING_EVENTS};
use crate::instance::{InstanceTime, compare_times};
use crate::interval::{Interval, IntervalCandidate};
use crate::listener::{ElementNotice, IntervalNotice};
use crate::root::TimedDocumentRoot;
use crate::time::{
    INDEFINITE, Time, UNRESOLVED, earliest, is_unresolved, max_time, min_time, minus_time,
    multiply_time, same_time,
};
use crate::types::{
    ElementId, FillMode, InstanceId, IntervalId, RestartMode, SpecifierId, TimeEventKind,
    TimingError,
};

/// Hooks through which the timing engine drives an element's effect.
pub trait TimedBehavior {
    /// The element became active at `begin`.
    fn to_active(&mut self, begin: Time);

    /// The element stopped being active, or reached the end of its repeat
    /// duration while `still_active`.
    fn to_inactive(&mut self, still_active: bool, is_frozen: bool);

    /// A frozen effect must be removed.
    fn remove_fill(&mut self);

    /// Samples the effect at a simple time within `repeat_iteration`.
    fn sampled_at(&mut self, simple_time: Time, simple_dur: Time, repeat_iteration: u32);

    /// Samples the final value of the simple duration.
    fn sampled_last_value(&mut self, repeat_iteration: u32);

    /// A begin, end or repeat event fired. `detail` is the repeat iteration.
    fn fire_time_event(&mut self, _kind: TimeEventKind, _time: Time, _detail: u32) {}

    /// Duration implied by the element's media when `dur` is absent or `media`.
    fn implicit_dur(&self) -> Time {
        UNRESOLVED
    }

    /// Whether every sample of the effect yields the same value.
    fn is_constant_animation(&self) -> bool {
        false
    }
}

/// Behavior with no effect, for containers and markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBehavior;

impl TimedBehavior for NullBehavior {
    fn to_active(&mut self, _begin: Time) {}
    fn to_inactive(&mut self, _still_active: bool, _is_frozen: bool) {}
    fn remove_fill(&mut self) {}
    fn sampled_at(&mut self, _simple_time: Time, _simple_dur: Time, _repeat_iteration: u32) {}
    fn sampled_last_value(&mut self, _repeat_iteration: u32) {}
}

/// A timed element in the document.
pub struct TimedElement {
    pub(crate) xml_id: Option<String>,
    pub(crate) event_target: Option<String>,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Option<Vec<ElementId>>,
    pub(crate) behavior: alloc::boxed::Box<dyn TimedBehavior>,
    pub(crate) params: TimingParams,
    pub(crate) begin_specifiers: Vec<SpecifierId>,
    pub(crate) end_specifiers: Vec<SpecifierId>,
    pub(crate) begin_instances: Vec<InstanceId>,
    pub(crate) end_instances: Vec<InstanceId>,
    pub(crate) current_interval: Option<IntervalId>,
    pub(crate) previous_interval: Option<IntervalId>,
    pub(crate) begin_dependents: Vec<SpecifierId>,
    pub(crate) end_dependents: Vec<SpecifierId>,
    pub(crate) current_repeat_iteration: u32,
    pub(crate) last_repeat_time: Time,
    pub(crate) repeat_duration: Time,
    pub(crate) last_sample_time: Time,
    pub(crate) is_active: bool,
    pub(crate) is_frozen: bool,
    pub(crate) is_sampling: bool,
    pub(crate) has_propagated: bool,
    pub(crate) should_update_current_interval: bool,
    pub(crate) initialized: bool,
    pub(crate) pending_events: heapless::Vec<HandledEvent, MAX_PENDING_EVENTS>,
}

impl TimedElement {
    pub(crate) fn new(
        xml_id: Option<String>,
        event_target: Option<String>,
        parent: Option<ElementId>,
        container: bool,
        behavior: alloc::boxed::Box<dyn TimedBehavior>,
        params: TimingParams,
    ) -> Self {
        Self {
            xml_id,
            event_target,
            parent,
            children: container.then(Vec::new),
            behavior,
            params,
            begin_specifiers: Vec::new(),
            end_specifiers: Vec::new(),
            begin_instances: Vec::new(),
            end_instances: Vec::new(),
            current_interval: None,
            previous_interval: None,
            begin_dependents: Vec::new(),
            end_dependents: Vec::new(),
            current_repeat_iteration: 0,
            last_repeat_time: UNRESOLVED,
            repeat_duration: UNRESOLVED,
            last_sample_time: UNRESOLVED,
            is_active: false,
            is_frozen: false,
            is_sampling: false,
            has_propagated: false,
            should_update_current_interval: true,
            initialized: false,
            pending_events: heapless::Vec::new(),
        }
    }

    /// The XML id, if any.
    pub fn xml_id(&self) -> Option<&str> {
        self.xml_id.as_deref()
    }

    /// The parent container; `None` for children of the document root.
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Whether this element is a time container.
    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    /// Child elements in document order. Empty for leaves.
    pub fn children(&self) -> &[ElementId] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Parsed timing parameters.
    pub fn params(&self) -> &TimingParams {
        &self.params
    }

    /// Fill mode.
    pub fn fill(&self) -> FillMode {
        self.params.fill
    }

    /// Restart mode.
    pub fn restart(&self) -> RestartMode {
        self.params.restart
    }

    /// Whether the element is within an active interval.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Whether the element is holding its fill value.
    pub fn is_frozen(&self) -> bool {
        self.is_frozen
    }

    /// Zero-based repeat iteration of the current interval.
    pub fn current_repeat_iteration(&self) -> u32 {
        self.current_repeat_iteration
    }

    /// Time of the last sample, unresolved before the first.
    pub fn last_sample_time(&self) -> Time {
        self.last_sample_time
    }

    /// Repeat duration of the current interval.
    pub fn repeat_duration(&self) -> Time {
        self.repeat_duration
    }

    /// Position within the current repeat iteration at the last sample.
    pub fn simple_time(&self) -> Time {
        self.last_sample_time - self.last_repeat_time
    }

    /// Implicit duration: indefinite for containers, otherwise from the behavior.
    pub fn implicit_dur(&self) -> Time {
        if self.is_container() {
            INDEFINITE
        } else {
            self.behavior.implicit_dur()
        }
    }

    /// The simple duration.
    pub fn simple_dur(&self) -> Time {
        let p = &self.params;
        if p.dur_media {
            self.implicit_dur()
        } else if is_unresolved(p.simple_dur) {
            if is_unresolved(p.repeat_count)
                && is_unresolved(p.repeat_dur)
                && !self.end_specifiers.is_empty()
            {
                INDEFINITE
            } else {
                self.implicit_dur()
            }
        } else {
            p.simple_dur
        }
    }

    /// Active duration for an interval beginning at `begin` with the given end.
    pub fn active_dur(&self, begin: Time, end: Time) -> Time {
        self.active_and_repeat_dur(begin, end).0
    }

    /// Active duration and the repeat duration computed on the way.
    pub(crate) fn active_and_repeat_dur(&self, begin: Time, end: Time) -> (Time, Time) {
        let p = &self.params;
        let d = self.simple_dur();
        if !is_unresolved(end) && d == INDEFINITE {
            let pad = minus_time(end, begin);
            let repeat = min_time(p.max, max_time(p.min, pad));
            return (repeat, repeat);
        }
        let iad = if d == 0.0 {
            0.0
        } else if is_unresolved(p.repeat_dur) && is_unresolved(p.repeat_count) {
            d
        } else {
            let p1 = if is_unresolved(p.repeat_count) {
                INDEFINITE
            } else {
                multiply_time(d, p.repeat_count)
            };
            let p2 = if is_unresolved(p.repeat_dur) {
                INDEFINITE
            } else {
                p.repeat_dur
            };
            min_time(min_time(p1, p2), INDEFINITE)
        };
        let pad = if is_unresolved(end) || end == INDEFINITE {
            iad
        } else {
            min_time(iad, minus_time(end, begin))
        };
        (min_time(p.max, max_time(p.min, pad)), iad)
    }
}

impl core::fmt::Debug for TimedElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimedElement")
            .field("xml_id", &self.xml_id)
            .field("parent", &self.parent)
            .field("params", &self.params)
            .field("current_interval", &self.current_interval)
            .field("is_active", &self.is_active)
            .field("is_frozen", &self.is_frozen)
            .finish_non_exhaustive()
    }
}

fn repeat_limit(begin: Time, repeat_duration: Time, end: Time) -> Time {
    let limit = begin + repeat_duration;
    if is_unresolved(end) || limit < end {
        limit
    } else {
        end
    }
}

impl TimedDocumentRoot {
    // Internal accessors for ids already validated by `checked` or reached
    // through live links; a miss is a broken arena invariant.
    pub(crate) fn el(&self, id: ElementId) -> &TimedElement {
        match self.elements.get(id.0) {
            Some(Some(el)) => el,
            _ => panic!("timed element {} is not part of this document", id),
        }
    }

    pub(crate) fn el_mut(&mut self, id: ElementId) -> &mut TimedElement {
        match self.elements.get_mut(id.0) {
            Some(Some(el)) => el,
            _ => panic!("timed element {} is not part of this document", id),
        }
    }

    pub(crate) fn interval(&self, iv: IntervalId) -> &Interval {
        match self.intervals.get(&iv) {
            Some(interval) => interval,
            None => panic!("interval {} is no longer live", iv.0),
        }
    }

    pub(crate) fn checked(&self, id: ElementId) -> Result<&TimedElement, TimingError> {
        match self.elements.get(id.0) {
            Some(Some(el)) => Ok(el),
            _ => Err(TimingError::UnknownElement(id)),
        }
    }

    pub(crate) fn instance_time(&self, inst: InstanceId) -> Time {
        self.instances.get(&inst).map_or(UNRESOLVED, |i| i.time)
    }

    pub(crate) fn alloc_instance(&mut self, instance: InstanceTime) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        self.instances.insert(id, instance);
        id
    }

    fn instance_list_mut(&mut self, id: ElementId, is_begin: bool) -> &mut Vec<InstanceId> {
        let el = self.el_mut(id);
        if is_begin {
            &mut el.begin_instances
        } else {
            &mut el.end_instances
        }
    }

    fn insert_sorted(&mut self, id: ElementId, inst: InstanceId, is_begin: bool) {
        let t = self.instance_time(inst);
        let el = self.el(id);
        let list = if is_begin {
            &el.begin_instances
        } else {
            &el.end_instances
        };
        let at = list.partition_point(|&other| compare_times(self.instance_time(other), t).is_le());
        self.instance_list_mut(id, is_begin).insert(at, inst);
    }

    /// Adds an allocated instance time to an element's begin or end list.
    pub(crate) fn add_instance_time(&mut self, id: ElementId, inst: InstanceId, is_begin: bool) -> Time {
        trace!(
            "{} add {} instance time {}",
            id,
            if is_begin { "begin" } else { "end" },
            self.instance_time(inst)
        );
        self.insert_sorted(id, inst, is_begin);
        self.instance_times_updated(id, is_begin)
    }

    /// Removes an instance time and frees it.
    pub(crate) fn remove_instance_time(&mut self, id: ElementId, inst: InstanceId, is_begin: bool) -> Time {
        let list = self.instance_list_mut(id, is_begin);
        let Some(at) = list.iter().position(|&i| i == inst) else {
            return INDEFINITE;
        };
        list.remove(at);
        self.instances.remove(&inst);
        self.instance_times_updated(id, is_begin)
    }

    /// Re-sorts an instance time whose value changed.
    pub(crate) fn instance_time_changed(&mut self, id: ElementId, inst: InstanceId, is_begin: bool) -> Time {
        let list = self.instance_list_mut(id, is_begin);
        let Some(at) = list.iter().position(|&i| i == inst) else {
            return INDEFINITE;
        };
        list.remove(at);
        self.insert_sorted(id, inst, is_begin);
        self.instance_times_updated(id, is_begin)
    }

    fn instance_times_updated(&mut self, id: ElementId, is_begin: bool) -> Time {
        self.notify_element(id, ElementNotice::InstanceTimesChanged(is_begin));
        let el = self.el_mut(id);
        let nested = el.has_propagated;
        el.has_propagated = true;
        el.should_update_current_interval = true;
        let sampling = el.is_sampling;
        let mut ret = INDEFINITE;
        if !nested && self.is_sampling && !sampling {
            ret = self.sample_at(id, self.current_time, self.is_hyperlinking);
        }
        self.el_mut(id).has_propagated = nested;
        self.current_interval_will_update();
        ret
    }

    /// Drops an instance time everywhere it is referenced.
    pub(crate) fn discard_instance(&mut self, inst: InstanceId) {
        let Some(instance) = self.instances.remove(&inst) else {
            return;
        };
        let Some(sid) = instance.creator else {
            return;
        };
        let Some(Some(spec)) = self.specifiers.get_mut(sid.0) else {
            return;
        };
        let mut freed = Vec::new();
        spec.state.instances.retain(|&iv, &mut i| {
            if i == inst {
                freed.push(iv);
                false
            } else {
                true
            }
        });
        for iv in freed {
            if let Some(interval) = self.intervals.get_mut(&iv) {
                interval.begin_dependents.retain(|&d| d != inst);
                interval.end_dependents.retain(|&d| d != inst);
            }
        }
    }

    /// Whether any end specifier resolves from events.
    pub(crate) fn end_has_event_conditions(&self, id: ElementId) -> bool {
        self.el(id)
            .end_specifiers
            .iter()
            .any(|&sid| self.specifier(sid).is_event_condition())
    }

    fn parent_simple_dur(&self, id: ElementId) -> Time {
        match self.el(id).parent {
            Some(parent) => self.el(parent).simple_dur(),
            None => INDEFINITE,
        }
    }

    /// Computes the next interval for an element without installing it.
    ///
    /// With `fixed_begin` the begin is `begin_after` itself and only the end
    /// is searched for. Otherwise the first begin instance at or after
    /// `begin_after` (strictly after when `incl` is false) is used. `first`
    /// selects the rules for the very first interval of the element.
    /// Returns `None` when no further interval exists.
    pub fn compute_interval(
        &self,
        id: ElementId,
        first: bool,
        fixed_begin: bool,
        begin_after: Time,
        incl: bool,
    ) -> Option<IntervalCandidate> {
        let el = self.elements.get(id.0)?.as_ref()?;
        let time_of = |inst: InstanceId| self.instance_time(inst);
        let parent_simple_dur = self.parent_simple_dur(id);
        let begins = &el.begin_instances;
        let ends = &el.end_instances;
        let current_end = el.current_interval.map(|iv| self.interval(iv).end);

        let mut begin_after = begin_after;
        let mut bi = 0usize;
        let mut ei = 0usize;
        let mut end_instance = ends.first().copied();
        if end_instance.is_some() {
            ei = 1;
        }
        let mut first_end = true;
        let mut begin_instance = None;

        loop {
            let temp_begin;
            if fixed_begin {
                temp_begin = begin_after;
            } else {
                loop {
                    let &candidate = begins.get(bi)?;
                    bi += 1;
                    let t = time_of(candidate);
                    if (incl && t >= begin_after) || (!incl && t > begin_after) {
                        begin_instance = Some(candidate);
                        temp_begin = t;
                        break;
                    }
                }
            }
            // Coincident begin instances are skipped over when looking for
            // the one that may truncate this interval.
            let next_begin = begins[bi..]
                .iter()
                .copied()
                .find(|&b| compare_times(time_of(b), temp_begin).is_gt() && !is_unresolved(time_of(b)));

            if temp_begin >= parent_simple_dur {
                return None;
            }

            let mut temp_end;
            let repeat_duration;
            if el.end_specifiers.is_empty() {
                let (ad, rd) = el.active_and_repeat_dur(temp_begin, INDEFINITE);
                temp_end = temp_begin + ad;
                repeat_duration = rd;
            } else {
                if end_instance.is_none() {
                    temp_end = UNRESOLVED;
                } else {
                    temp_end = end_instance.map_or(UNRESOLVED, time_of);
                    let skip_current = (first && !first_end && temp_end == temp_begin)
                        || (!first
                            && current_end.is_some_and(|e| temp_end == e)
                            && ((incl && begin_after >= temp_end) || (!incl && begin_after > temp_end)));
                    if skip_current {
                        loop {
                            let Some(&next) = ends.get(ei) else {
                                if self.end_has_event_conditions(id) {
                                    temp_end = UNRESOLVED;
                                    break;
                                }
                                return None;
                            };
                            ei += 1;
                            end_instance = Some(next);
                            temp_end = time_of(next);
                            if temp_end > temp_begin {
                                break;
                            }
                        }
                    }
                    first_end = false;
                    loop {
                        if temp_end >= temp_begin {
                            break;
                        }
                        let Some(&next) = ends.get(ei) else {
                            if self.end_has_event_conditions(id) {
                                temp_end = UNRESOLVED;
                                break;
                            }
                            return None;
                        };
                        ei += 1;
                        end_instance = Some(next);
                        temp_end = time_of(next);
                    }
                }
                let (ad, rd) = el.active_and_repeat_dur(temp_begin, temp_end);
                temp_end = temp_begin + ad;
                repeat_duration = rd;
            }

            if !first
                || temp_end > 0.0
                || (temp_begin == 0.0 && temp_end == 0.0)
                || is_unresolved(temp_end)
            {
                let mut end_instance = end_instance;
                if el.params.restart == RestartMode::Always
                    && let Some(next) = next_begin
                {
                    let next_time = time_of(next);
                    if next_time < temp_end || is_unresolved(temp_end) {
                        temp_end = next_time;
                        end_instance = Some(next);
                    }
                }
                return Some(IntervalCandidate {
                    begin: temp_begin,
                    end: temp_end,
                    begin_instance,
                    end_instance,
                    repeat_duration,
                });
            }

            if fixed_begin {
                return None;
            }
            begin_after = temp_end;
        }
    }

    /// Resolves buffered events into instance times, honouring restart rules.
    fn process_pending_events(&mut self, id: ElementId) {
        let events = core::mem::take(&mut self.el_mut(id).pending_events);
        for event in events {
            let mut has_begin = false;
            let mut has_end = false;
            for &sid in &event.specifiers {
                if self.specifier(sid).is_begin {
                    has_begin = true;
                } else {
                    has_end = true;
                }
            }
            let el = self.el(id);
            let may_restart = !el.is_active || el.params.restart == RestartMode::Always;
            let (use_begin, use_end) = if has_begin && has_end {
                (may_restart, !may_restart)
            } else if has_begin && may_restart {
                (true, false)
            } else if has_end && el.is_active {
                (false, true)
            } else {
                trace!("{} ignored event", id);
                continue;
            };
            for sid in event.specifiers {
                let is_begin = self.specifier(sid).is_begin;
                if (is_begin && use_begin) || (!is_begin && use_end) {
                    self.resolve_event(sid, event.timestamp);
                    self.el_mut(id).should_update_current_interval = true;
                }
            }
        }
    }

    fn current_has_ended(&self, id: ElementId, time: Time) -> bool {
        self.el(id)
            .current_interval
            .is_some_and(|iv| self.intervals.get(&iv).is_some_and(|i| time >= i.end))
    }

    fn activate(&mut self, id: ElementId, iv: IntervalId, begin: Time, force: bool) {
        let event_time = if begin < 0.0 { 0.0 } else { begin };
        let el = self.el_mut(id);
        if force || !el.is_active {
            el.behavior.to_active(event_time);
        }
        el.is_active = true;
        el.is_frozen = false;
        el.last_repeat_time = begin;
        el.current_repeat_iteration = 0;
        debug!("{} active at {}", id, event_time);
        self.notify_element(id, ElementNotice::Activated(event_time));
        self.notify_interval(id, iv, IntervalNotice::Began);
        self.fire_time_event(id, TimeEventKind::Begin, event_time, 0);
    }

    fn fire_repeats(&mut self, id: ElementId, time: Time, limit: Time) {
        let d = self.el(id).simple_dur();
        loop {
            let el = self.el_mut(id);
            if !(time - el.last_repeat_time >= d && el.last_repeat_time + d < limit) {
                break;
            }
            el.last_repeat_time += d;
            el.current_repeat_iteration += 1;
            let (t, iteration) = (el.last_repeat_time, el.current_repeat_iteration);
            self.fire_time_event(id, TimeEventKind::Repeat, t, iteration);
        }
    }

    fn end_current_interval(&mut self, id: ElementId, iv: IntervalId) {
        let frozen = self.el(id).params.fill == FillMode::Freeze;
        self.set_previous_interval(id, iv);
        let el = self.el_mut(id);
        el.is_active = false;
        el.is_frozen = frozen;
        el.behavior.to_inactive(false, frozen);
        let end = self.interval(iv).end;
        debug!("{} ended at {}", id, end);
        self.notify_element(id, ElementNotice::Deactivated(end));
        if frozen {
            self.notify_element(id, ElementNotice::Filled(end));
        }
        self.fire_time_event(id, TimeEventKind::End, end, 0);
    }

    fn set_previous_interval(&mut self, id: ElementId, iv: IntervalId) {
        let el = self.el_mut(id);
        let old = el.previous_interval.replace(iv);
        let current = el.current_interval;
        if let Some(old) = old
            && old != iv
            && current != Some(old)
        {
            self.release_interval(old);
        }
    }

    fn drop_interval(&mut self, id: ElementId, iv: IntervalId) -> Time {
        let dependent_min = self.notify_remove_interval(id, iv);
        self.notify_interval(id, iv, IntervalNotice::Removed);
        let el = self.el(id);
        if el.previous_interval != Some(iv) && el.current_interval != Some(iv) {
            self.release_interval(iv);
        }
        dependent_min
    }

    /// Installs a computed interval as the current one.
    fn select_new_interval(&mut self, id: ElementId, time: Time, candidate: IntervalCandidate) -> Time {
        let iv = self.alloc_interval(&candidate);
        let el = self.el_mut(id);
        el.current_interval = Some(iv);
        el.repeat_duration = candidate.repeat_duration;
        debug!("{} new interval {} .. {}", id, candidate.begin, candidate.end);
        self.notify_interval(id, iv, IntervalNotice::Created);
        let dependent_min = self.notify_new_interval(id, iv);
        if time >= candidate.begin {
            self.activate(id, iv, candidate.begin, true);
            let el = self.el(id);
            let limit = repeat_limit(candidate.begin, el.repeat_duration, candidate.end);
            self.fire_repeats(id, time, limit);
        }
        dependent_min
    }

    fn notify_new_interval(&mut self, id: ElementId, iv: IntervalId) -> Time {
        let el = self.el(id);
        let dependents: Vec<SpecifierId> = el
            .begin_dependents
            .iter()
            .chain(el.end_dependents.iter())
            .copied()
            .collect();
        let mut min = INDEFINITE;
        for sid in dependents {
            min = earliest(min, self.specifier_new_interval(sid, iv));
        }
        min
    }

    pub(crate) fn notify_remove_interval(&mut self, id: ElementId, iv: IntervalId) -> Time {
        let el = self.el(id);
        let dependents: Vec<SpecifierId> = el
            .begin_dependents
            .iter()
            .chain(el.end_dependents.iter())
            .copied()
            .collect();
        let mut min = INDEFINITE;
        for sid in dependents {
            min = earliest(min, self.specifier_remove_interval(sid, iv));
        }
        min
    }

    /// Samples one element (not its children) at a parent simple time.
    ///
    /// Returns how long the caller may wait before something observable
    /// happens to this element or an element it notified.
    pub(crate) fn sample_element(&mut self, id: ElementId, time: Time, hyperlinking: bool) -> Time {
        self.el_mut(id).is_sampling = true;
        self.process_pending_events(id);

        let el = self.el(id);
        if let Some(cur) = el.current_interval {
            let begin = self.interval(cur).begin;
            let last = el.last_sample_time;
            if (is_unresolved(last) || last < begin) && time >= begin {
                self.activate(id, cur, begin, false);
            }
        }

        let mut has_ended = self.current_has_ended(id, time);
        if let Some(cur) = self.el(id).current_interval {
            let (begin, end) = {
                let i = self.interval(cur);
                (i.begin, i.end)
            };
            if time >= begin {
                let limit = repeat_limit(begin, self.el(id).repeat_duration, end);
                self.fire_repeats(id, time, limit);
            }
        }

        let mut dependent_min = INDEFINITE;
        let mut hyperlinking = hyperlinking;
        if hyperlinking {
            self.el_mut(id).should_update_current_interval = true;
        }
        while self.el(id).should_update_current_interval || has_ended {
            self.process_pending_events(id);
            if has_ended && let Some(cur) = self.el(id).current_interval {
                self.end_current_interval(id, cur);
            }

            let el = self.el(id);
            let first = el.current_interval.is_none() && el.previous_interval.is_none();
            if hyperlinking && let Some(cur) = el.current_interval {
                let el = self.el_mut(id);
                el.is_active = false;
                el.is_frozen = false;
                el.behavior.to_inactive(false, false);
                el.current_interval = None;
                has_ended = false;
                dependent_min = earliest(dependent_min, self.drop_interval(id, cur));
            }

            let el = self.el(id);
            let restart = el.params.restart;
            let previous = el.previous_interval.map(|iv| {
                let i = self.interval(iv);
                (i.begin, i.end)
            });
            let after_previous = match previous {
                Some((begin, end)) => (end, end != begin),
                None => (f32::NEG_INFINITY, true),
            };

            let current = el.current_interval;
            match current {
                Some(cur) if !has_ended => {
                    let current_begin = self.interval(cur).begin;
                    if current_begin > time {
                        let (begin_after, incl) = after_previous;
                        let candidate = self.compute_interval(id, false, false, begin_after, incl);
                        dependent_min = earliest(
                            dependent_min,
                            self.update_pending_interval(id, cur, time, candidate),
                        );
                    } else if let Some(candidate) = self.compute_interval(id, false, true, current_begin, true)
                    {
                        self.el_mut(id).repeat_duration = candidate.repeat_duration;
                        let i = self.interval(cur);
                        if !same_time(i.end, candidate.end) {
                            dependent_min = earliest(
                                dependent_min,
                                self.set_interval_end(cur, candidate.end, candidate.end_instance),
                            );
                            self.notify_interval(id, cur, IntervalNotice::Changed);
                        }
                    } else {
                        trace!("{} keeps its current end", id);
                    }
                }
                _ => {
                    if first || hyperlinking || restart != RestartMode::Never {
                        let (begin_after, incl) = if first || hyperlinking {
                            (f32::NEG_INFINITY, true)
                        } else {
                            after_previous
                        };
                        match self.compute_interval(id, first, false, begin_after, incl) {
                            Some(candidate) => {
                                dependent_min =
                                    earliest(dependent_min, self.select_new_interval(id, time, candidate));
                            }
                            None => self.el_mut(id).current_interval = None,
                        }
                    } else {
                        self.el_mut(id).current_interval = None;
                    }
                }
            }

            // Events this element fired on itself during the pass.
            let el = self.el_mut(id);
            el.should_update_current_interval = !el.pending_events.is_empty();
            hyperlinking = false;
            has_ended = self.current_has_ended(id, time);
        }

        self.sample_effect(id, time);

        let el = self.el_mut(id);
        el.is_sampling = false;
        el.last_sample_time = time;
        let Some(cur) = el.current_interval else {
            return dependent_min;
        };
        let (begin, end) = {
            let i = self.interval(cur);
            (i.begin, i.end)
        };
        let el = self.el(id);
        let mut t = begin - time;
        if t <= 0.0 {
            t = if el.behavior.is_constant_animation() || el.is_frozen {
                end - time
            } else {
                0.0
            };
        }
        earliest(dependent_min, t)
    }

    /// Recomputes an interval that has not begun yet.
    fn update_pending_interval(
        &mut self,
        id: ElementId,
        cur: IntervalId,
        time: Time,
        candidate: Option<IntervalCandidate>,
    ) -> Time {
        let existing = self.interval(cur);
        let (old_begin, old_end) = (existing.begin, existing.end);
        let (old_begin_instance, old_end_instance) = (existing.begin_instance, existing.end_instance);
        match candidate {
            Some(c) if c.begin_instance.is_some() && c.begin_instance == old_begin_instance => {
                let mut dependent_min = INDEFINITE;
                let mut changed = false;
                if !same_time(old_begin, c.begin) {
                    dependent_min = earliest(dependent_min, self.set_interval_begin(cur, c.begin));
                    changed = true;
                }
                if !same_time(old_end, c.end) {
                    dependent_min =
                        earliest(dependent_min, self.set_interval_end(cur, c.end, c.end_instance));
                    changed = true;
                } else if old_end_instance != c.end_instance
                    && let Some(i) = self.intervals.get_mut(&cur)
                {
                    i.end_instance = c.end_instance;
                }
                self.el_mut(id).repeat_duration = c.repeat_duration;
                if changed {
                    self.notify_interval(id, cur, IntervalNotice::Changed);
                }
                if time >= c.begin {
                    self.activate(id, cur, c.begin, true);
                    let limit = repeat_limit(c.begin, c.repeat_duration, c.end);
                    self.fire_repeats(id, time, limit);
                }
                dependent_min
            }
            candidate => {
                self.el_mut(id).current_interval = None;
                let mut dependent_min = self.drop_interval(id, cur);
                if let Some(c) = candidate {
                    dependent_min = earliest(dependent_min, self.select_new_interval(id, time, c));
                }
                dependent_min
            }
        }
    }

    /// Drives the behavior hooks for the state reached at `time`.
    fn sample_effect(&mut self, id: ElementId, time: Time) {
        let el = self.el(id);
        let d = el.simple_dur();
        let current = el.current_interval.and_then(|iv| self.intervals.get(&iv));
        let previous = el.previous_interval.and_then(|iv| self.intervals.get(&iv));
        let current_begin = current.map(|i| i.begin);
        let previous_end = previous.map(|i| i.end);

        if el.is_active
            && !el.is_frozen
            && let Some(begin) = current_begin
        {
            if time - begin >= el.repeat_duration {
                let frozen = el.params.fill == FillMode::Freeze;
                let fill_time = begin + el.repeat_duration;
                let el = self.el_mut(id);
                el.is_frozen = frozen;
                el.behavior.to_inactive(true, frozen);
                if frozen {
                    self.notify_element(id, ElementNotice::Filled(fill_time));
                }
            } else {
                let el = self.el_mut(id);
                let iteration = el.current_repeat_iteration;
                let simple_time = time - el.last_repeat_time;
                el.behavior.sampled_at(simple_time, d, iteration);
            }
        }

        let el = self.el_mut(id);
        if !el.is_frozen {
            return;
        }
        let last_repeat = el.last_repeat_time;
        let (t, at_last) = if el.is_active {
            let Some(begin) = current_begin else { return };
            let fill_end = begin + el.repeat_duration;
            (fill_end - last_repeat, last_repeat + d == fill_end)
        } else {
            let Some(end) = previous_end else { return };
            (end - last_repeat, last_repeat + d == end)
        };
        let iteration = el.current_repeat_iteration;
        if at_last {
            el.behavior.sampled_last_value(iteration);
        } else {
            el.behavior.sampled_at(t % d, d, iteration);
        }
    }

    /// Clears event-derived state before a restart of the document.
    pub(crate) fn reset_element(&mut self, id: ElementId, clear_current_begin: bool) {
        let el = self.el(id);
        let keep = if clear_current_begin {
            None
        } else {
            el.current_interval.and_then(|iv| self.interval(iv).begin_instance)
        };
        let discard = |inst: &InstanceId| {
            Some(*inst) != keep && self.instances.get(inst).is_some_and(|i| i.clear_on_reset)
        };
        let dropped: Vec<InstanceId> = el
            .begin_instances
            .iter()
            .chain(el.end_instances.iter())
            .filter(|i| discard(*i))
            .copied()
            .collect();

        let el = self.el_mut(id);
        el.begin_instances.retain(|i| !dropped.contains(i));
        el.end_instances.retain(|i| !dropped.contains(i));
        if el.is_frozen {
            el.behavior.remove_fill();
        }
        el.current_repeat_iteration = 0;
        el.last_repeat_time = UNRESOLVED;
        el.is_active = false;
        el.is_frozen = false;
        el.last_sample_time = UNRESOLVED;
        el.pending_events.clear();
        if !dropped.is_empty() {
            el.should_update_current_interval = true;
        }
        for inst in dropped {
            self.discard_instance(inst);
        }
    }

    /// Adds a begin instance time at `time`, as the DOM `beginElementAt` does.
    pub fn begin_element_at(&mut self, id: ElementId, time: Time) -> Result<(), TimingError> {
        self.checked(id)?;
        let inst = self.alloc_instance(InstanceTime::new(None, time, true));
        self.add_instance_time(id, inst, true);
        Ok(())
    }

    /// Adds an end instance time at `time`, as the DOM `endElementAt` does.
    pub fn end_element_at(&mut self, id: ElementId, time: Time) -> Result<(), TimingError> {
        self.checked(id)?;
        let inst = self.alloc_instance(InstanceTime::new(None, time, true));
        self.add_instance_time(id, inst, false);
        Ok(())
    }

    /// Begins the element `offset` seconds after the last sample time.
    pub fn begin_element(&mut self, id: ElementId, offset: Time) -> Result<(), TimingError> {
        self.begin_element_at(id, self.current_time + offset)
    }

    /// Ends the element `offset` seconds after the last sample time.
    pub fn end_element(&mut self, id: ElementId, offset: Time) -> Result<(), TimingError> {
        self.end_element_at(id, self.current_time + offset)
    }

    /// Whether a begin request would take effect now.
    pub fn can_begin(&self, id: ElementId) -> Result<bool, TimingError> {
        let el = self.checked(id)?;
        Ok(el.current_interval.is_none() || (el.is_active && el.params.restart != RestartMode::Never))
    }

    /// Whether an end request would take effect now.
    pub fn can_end(&self, id: ElementId) -> Result<bool, TimingError> {
        Ok(self.checked(id)?.is_active)
    }

    /// Begin of the current interval if it has not been passed yet.
    pub fn current_begin_time(&self, id: ElementId) -> Result<Time, TimingError> {
        let el = self.checked(id)?;
        Ok(match el.current_interval.map(|iv| self.interval(iv).begin) {
            Some(begin) if !(begin < el.last_sample_time) => begin,
            _ => UNRESOLVED,
        })
    }

    /// Time a hyperlink to this element should seek to.
    pub fn hyperlink_begin_time(&self, id: ElementId) -> Result<Time, TimingError> {
        let el = self.checked(id)?;
        if el.is_active
            && let Some(iv) = el.current_interval
        {
            return Ok(self.interval(iv).begin);
        }
        Ok(el
            .begin_instances
            .first()
            .map_or(UNRESOLVED, |&inst| self.instance_time(inst)))
    }

    /// Time since the current interval began, at the last sample.
    pub fn active_time(&self, id: ElementId) -> Result<Time, TimingError> {
        let el = self.checked(id)?;
        Ok(el
            .current_interval
            .map_or(UNRESOLVED, |iv| el.last_sample_time - self.interval(iv).begin))
    }

    /// Position within the current repeat iteration at the last sample.
    pub fn simple_time(&self, id: ElementId) -> Result<Time, TimingError> {
        Ok(self.checked(id)?.simple_time())
    }

    /// The current interval, if any.
    pub fn current_interval(&self, id: ElementId) -> Option<&Interval> {
        let iv = self.element(id)?.current_interval?;
        self.intervals.get(&iv)
    }

    /// The interval before the current one, if any.
    pub fn previous_interval(&self, id: ElementId) -> Option<&Interval> {
        let iv = self.element(id)?.previous_interval?;
        self.intervals.get(&iv)
    }

    /// Sorted begin instance times.
    pub fn begin_instance_times(&self, id: ElementId) -> Vec<Time> {
        self.element(id).map_or_else(Vec::new, |el| {
            el.begin_instances.iter().map(|&i| self.instance_time(i)).collect()
        })
    }

    /// Sorted end instance times.
    pub fn end_instance_times(&self, id: ElementId) -> Vec<Time> {
        self.element(id).map_or_else(Vec::new, |el| {
            el.end_instances.iter().map(|&i| self.instance_time(i)).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::TimingAttributes;
    use crate::parser::AccessKeySyntax;
    use alloc::boxed::Box;

    fn element(attrs: TimingAttributes) -> TimedElement {
        let parsed = attrs.parse(AccessKeySyntax::default()).unwrap();
        TimedElement::new(None, None, None, false, Box::new(NullBehavior), parsed.params)
    }

    #[test]
    fn simple_dur_defaults_to_indefinite() {
        let el = element(TimingAttributes::new());
        assert_eq!(el.simple_dur(), INDEFINITE);
    }

    #[test]
    fn media_dur_uses_implicit_dur() {
        let el = element(TimingAttributes::new().dur("media"));
        assert!(is_unresolved(el.simple_dur()));
    }

    #[test]
    fn active_dur_with_repeat_count() {
        let el = element(TimingAttributes::new().dur("5s").repeat_count("3"));
        assert_eq!(el.active_and_repeat_dur(0.0, INDEFINITE), (15.0, 15.0));
    }

    #[test]
    fn active_dur_truncated_by_end() {
        let el = element(TimingAttributes::new().dur("5s").repeat_count("3"));
        assert_eq!(el.active_and_repeat_dur(2.0, 9.0), (7.0, 15.0));
    }

    #[test]
    fn active_dur_respects_min_and_max() {
        let el = element(TimingAttributes::new().dur("2s").min("4s"));
        assert_eq!(el.active_dur(0.0, INDEFINITE), 4.0);
        let el = element(TimingAttributes::new().dur("6s").max("3s"));
        assert_eq!(el.active_dur(0.0, INDEFINITE), 3.0);
    }

    #[test]
    fn repeat_dur_caps_repeats() {
        let el = element(TimingAttributes::new().dur("2s").repeat_count("indefinite").repeat_dur("7s"));
        assert_eq!(el.active_dur(0.0, INDEFINITE), 7.0);
    }

    #[test]
    fn zero_dur_yields_zero_active_dur() {
        let el = element(TimingAttributes::new().dur("0s").repeat_count("4"));
        assert_eq!(el.active_dur(1.0, INDEFINITE), 0.0);
    }

    #[test]
    fn repeat_limit_prefers_earlier_bound() {
        assert_eq!(repeat_limit(0.0, 4.0, 10.0), 4.0);
        assert_eq!(repeat_limit(0.0, 4.0, 2.5), 2.5);
        assert_eq!(repeat_limit(0.0, 4.0, UNRESOLVED), 4.0);
    }
}
