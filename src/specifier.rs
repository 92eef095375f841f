//! Timing specifiers: the parsed entries of an element's begin and end lists
//! and the instance times they feed into their owner.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::event::{DomEvent, EventListener, EventTarget};
use crate::instance::InstanceTime;
use crate::parser::{AccessKey, TimingSpec};
use crate::root::{PropagationKey, TimedDocumentRoot};
use crate::time::{INDEFINITE, Time, earliest};
use crate::types::{ElementId, InstanceId, IntervalId, SpecifierId, TimeEventKind, TimingError};

/// One entry of an element's begin or end list.
#[derive(Debug)]
pub struct TimingSpecifier {
    pub(crate) owner: ElementId,
    pub(crate) is_begin: bool,
    pub(crate) spec: TimingSpec,
    pub(crate) state: SpecifierState,
}

/// Bookkeeping that changes as the document runs.
#[derive(Debug, Default)]
pub(crate) struct SpecifierState {
    /// Resolved syncbase element.
    pub(crate) syncbase: Option<ElementId>,
    /// Instance time created for each interval of the syncbase.
    pub(crate) instances: BTreeMap<IntervalId, InstanceId>,
    /// Instance time created for a wallclock value.
    pub(crate) wallclock_instance: Option<InstanceId>,
}

impl TimingSpecifier {
    pub(crate) fn new(owner: ElementId, is_begin: bool, spec: TimingSpec) -> Self {
        Self {
            owner,
            is_begin,
            spec,
            state: SpecifierState::default(),
        }
    }

    /// The element whose begin or end list this belongs to.
    #[inline]
    pub fn owner(&self) -> ElementId {
        self.owner
    }

    /// Whether this is a begin (not end) specifier.
    #[inline]
    pub fn is_begin(&self) -> bool {
        self.is_begin
    }

    /// The parsed declaration.
    #[inline]
    pub fn spec(&self) -> &TimingSpec {
        &self.spec
    }

    /// Whether instance times come from DOM events.
    #[inline]
    pub fn is_event_condition(&self) -> bool {
        self.spec.is_event_condition()
    }

    fn offset(&self) -> Time {
        match &self.spec {
            TimingSpec::Offset { offset }
            | TimingSpec::Syncbase { offset, .. }
            | TimingSpec::Eventbase { offset, .. }
            | TimingSpec::Repeat { offset, .. }
            | TimingSpec::Accesskey { offset, .. } => *offset,
            _ => 0.0,
        }
    }

    fn sync_begin(&self) -> Option<bool> {
        match &self.spec {
            TimingSpec::Syncbase { sync_begin, .. } => Some(*sync_begin),
            _ => None,
        }
    }
}

impl TimedDocumentRoot {
    // Specifier ids come from live elements' lists and dependent sets, which
    // `remove_element` prunes before freeing a slot.
    pub(crate) fn specifier(&self, sid: SpecifierId) -> &TimingSpecifier {
        match self.specifiers.get(sid.0) {
            Some(Some(spec)) => spec,
            _ => panic!("timing specifier {} is not part of this document", sid.0),
        }
    }

    fn specifier_mut(&mut self, sid: SpecifierId) -> &mut TimingSpecifier {
        match self.specifiers.get_mut(sid.0) {
            Some(Some(spec)) => spec,
            _ => panic!("timing specifier {} is not part of this document", sid.0),
        }
    }

    /// Resolves references and pushes any statically known instance time.
    pub(crate) fn initialize_specifier(&mut self, sid: SpecifierId) -> Result<(), TimingError> {
        let spec = self.specifier(sid);
        let owner = spec.owner;
        let is_begin = spec.is_begin;
        match spec.spec.clone() {
            TimingSpec::Offset { offset } => {
                let inst = self.alloc_instance(InstanceTime::new(Some(sid), offset, false));
                self.add_instance_time(owner, inst, is_begin);
            }
            TimingSpec::Indefinite => {
                if !is_begin {
                    let inst = self.alloc_instance(InstanceTime::new(Some(sid), INDEFINITE, false));
                    self.add_instance_time(owner, inst, is_begin);
                }
            }
            TimingSpec::Wallclock { value } => {
                let t = self.convert_wallclock_time(&value);
                let inst = self.alloc_instance(InstanceTime::new(Some(sid), t, false));
                self.specifier_mut(sid).state.wallclock_instance = Some(inst);
                self.add_instance_time(owner, inst, is_begin);
            }
            TimingSpec::Syncbase {
                syncbase_id,
                sync_begin,
                ..
            } => {
                let syncbase = self.lookup_id(&syncbase_id)?;
                self.specifier_mut(sid).state.syncbase = Some(syncbase);
                let base = self.el_mut(syncbase);
                if sync_begin {
                    base.begin_dependents.push(sid);
                } else {
                    base.end_dependents.push(sid);
                }
                if let Some(cur) = self.el(syncbase).current_interval {
                    self.specifier_new_interval(sid, cur);
                }
            }
            TimingSpec::Eventbase {
                eventbase_id,
                event_type,
                ..
            } => {
                let target = match eventbase_id {
                    Some(id) => Some(id),
                    None => {
                        let el = self.el(owner);
                        el.event_target.clone().or_else(|| el.xml_id.clone())
                    }
                };
                match target {
                    Some(id) => self.listen(sid, EventTarget::Element(id), event_type),
                    None => warn!("event specifier on {} has no event target", owner),
                }
            }
            TimingSpec::Repeat { eventbase_id, .. } => {
                self.lookup_id(&eventbase_id)?;
                self.listen(
                    sid,
                    EventTarget::Element(eventbase_id),
                    self.config.event_type(TimeEventKind::Repeat).to_string(),
                );
            }
            TimingSpec::Accesskey { key, .. } => {
                let event_type = match key {
                    AccessKey::Char(_) => "keypress",
                    AccessKey::Named(_) => "keydown",
                };
                self.listen(sid, EventTarget::Document, event_type.to_string());
            }
            TimingSpec::MediaMarker { .. } => {}
        }
        Ok(())
    }

    /// Undoes [`initialize_specifier`](Self::initialize_specifier) registrations.
    pub(crate) fn deinitialize_specifier(&mut self, sid: SpecifierId) {
        self.event_listeners.retain(|l| l.specifier != sid);
        let state = &mut self.specifier_mut(sid).state;
        let syncbase = state.syncbase.take();
        state.instances.clear();
        state.wallclock_instance = None;
        if let Some(base) = syncbase
            && let Some(Some(base)) = self.elements.get_mut(base.0)
        {
            base.begin_dependents.retain(|&d| d != sid);
            base.end_dependents.retain(|&d| d != sid);
        }
    }

    fn listen(&mut self, sid: SpecifierId, target: EventTarget, event_type: String) {
        trace!("specifier {} listening for {}", sid.0, event_type.as_str());
        self.event_listeners.push(EventListener {
            target,
            namespace_uri: self.config.event_namespace_uri.clone(),
            event_type,
            specifier: sid,
        });
    }

    fn lookup_id(&self, id: &str) -> Result<ElementId, TimingError> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| TimingError::UnknownSyncbase(id.to_string()))
    }


    /// Re-derives a wallclock instance time after the document begin moved.
    pub(crate) fn reconvert_wallclock(&mut self, sid: SpecifierId) {
        let spec = self.specifier(sid);
        let (TimingSpec::Wallclock { value }, Some(inst)) = (&spec.spec, spec.state.wallclock_instance)
        else {
            return;
        };
        let (owner, is_begin) = (spec.owner, spec.is_begin);
        let t = self.convert_wallclock_time(value);
        if let Some(instance) = self.instances.get_mut(&inst) {
            instance.time = t;
            self.instance_time_changed(owner, inst, is_begin);
        }
    }

    /// Called when a syncbase element selects a new interval.
    pub(crate) fn specifier_new_interval(&mut self, sid: SpecifierId, iv: IntervalId) -> Time {
        let spec = self.specifier(sid);
        let Some(sync_begin) = spec.sync_begin() else {
            return INDEFINITE;
        };
        let (owner, is_begin, offset) = (spec.owner, spec.is_begin, spec.offset());
        if self.el(owner).has_propagated {
            return INDEFINITE;
        }
        let Some(interval) = self.intervals.get(&iv) else {
            return INDEFINITE;
        };
        let (endpoint, source) = if sync_begin {
            (interval.begin, interval.begin_instance)
        } else {
            (interval.end, interval.end_instance)
        };
        let key = match source {
            Some(inst) => PropagationKey::Instance(inst, endpoint.to_bits()),
            None => PropagationKey::Interval(iv),
        };
        if !self.should_propagate(key, sid) {
            trace!("propagation of interval to specifier {} suppressed", sid.0);
            return INDEFINITE;
        }
        let inst = self.alloc_instance(InstanceTime::new(Some(sid), endpoint + offset, true));
        self.specifier_mut(sid).state.instances.insert(iv, inst);
        if let Some(interval) = self.intervals.get_mut(&iv) {
            interval.add_dependent(inst, sync_begin);
        }
        self.add_instance_time(owner, inst, is_begin)
    }

    /// Called when a syncbase element drops an interval.
    pub(crate) fn specifier_remove_interval(&mut self, sid: SpecifierId, iv: IntervalId) -> Time {
        let spec = self.specifier(sid);
        let Some(sync_begin) = spec.sync_begin() else {
            return INDEFINITE;
        };
        let (owner, is_begin) = (spec.owner, spec.is_begin);
        let Some(inst) = self.specifier_mut(sid).state.instances.remove(&iv) else {
            return INDEFINITE;
        };
        if let Some(interval) = self.intervals.get_mut(&iv) {
            interval.remove_dependent(inst, sync_begin);
        }
        self.remove_instance_time(owner, inst, is_begin)
    }

    /// Withdraws every instance time a syncbase specifier created, including
    /// those of syncbase intervals that were already released.
    pub(crate) fn withdraw_syncbase_instances(&mut self, sid: SpecifierId) -> Time {
        let Some(Some(spec)) = self.specifiers.get(sid.0) else {
            return INDEFINITE;
        };
        if spec.sync_begin().is_none() {
            return INDEFINITE;
        }
        let (owner, is_begin) = (spec.owner, spec.is_begin);
        let Some(Some(el)) = self.elements.get(owner.0) else {
            return INDEFINITE;
        };
        let list = if is_begin { &el.begin_instances } else { &el.end_instances };
        let created: Vec<InstanceId> = list
            .iter()
            .copied()
            .filter(|inst| self.instances.get(inst).is_some_and(|i| i.creator == Some(sid)))
            .collect();
        let mut min = INDEFINITE;
        for inst in created {
            min = earliest(min, self.remove_instance_time(owner, inst, is_begin));
        }
        if let Some(Some(spec)) = self.specifiers.get_mut(sid.0) {
            spec.state.instances.clear();
        }
        min
    }

    pub(crate) fn forget_interval(&mut self, sid: SpecifierId, iv: IntervalId) {
        if let Some(Some(spec)) = self.specifiers.get_mut(sid.0) {
            spec.state.instances.remove(&iv);
        }
    }

    /// An interval endpoint moved; re-derive the dependent instance time.
    pub(crate) fn dependent_update(&mut self, inst: InstanceId, new_time: Time) -> Time {
        let Some(sid) = self.instances.get(&inst).and_then(|i| i.creator) else {
            return INDEFINITE;
        };
        self.handle_timebase_update(sid, inst, new_time)
    }

    fn handle_timebase_update(&mut self, sid: SpecifierId, inst: InstanceId, new_time: Time) -> Time {
        let spec = self.specifier(sid);
        if spec.sync_begin().is_none() {
            return INDEFINITE;
        }
        let (owner, is_begin, offset) = (spec.owner, spec.is_begin, spec.offset());
        match self.instances.get_mut(&inst) {
            Some(instance) => instance.time = new_time + offset,
            None => return INDEFINITE,
        }
        self.instance_time_changed(owner, inst, is_begin)
    }

    /// Whether an incoming event satisfies the specifier's filters.
    pub(crate) fn specifier_accepts(&self, sid: SpecifierId, event: &DomEvent) -> bool {
        match &self.specifier(sid).spec {
            TimingSpec::Repeat {
                repeat_iteration: Some(n),
                ..
            } => event.detail == *n,
            TimingSpec::Accesskey {
                key: AccessKey::Char(c),
                ..
            } => {
                let mut buf = [0u8; 4];
                event.key.as_deref() == Some(&*c.encode_utf8(&mut buf))
            }
            TimingSpec::Accesskey {
                key: AccessKey::Named(name),
                ..
            } => event.key.as_deref() == Some(name.as_str()),
            _ => true,
        }
    }

    /// Turns a buffered event into an instance time on the owner.
    pub(crate) fn resolve_event(&mut self, sid: SpecifierId, timestamp: i64) {
        let spec = self.specifier(sid);
        let (owner, is_begin) = (spec.owner, spec.is_begin);
        let t = self.convert_epoch_time(timestamp) + spec.offset();
        debug!("event resolved for {} at {}", owner, t);
        let inst = self.alloc_instance(InstanceTime::new(Some(sid), t, true));
        self.add_instance_time(owner, inst, is_begin);
    }
}
