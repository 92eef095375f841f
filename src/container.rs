//! Time containers: building and tearing down the element tree, and the
//! recursive operations that walk it.

use alloc::string::ToString;
use alloc::vec::Vec;

use crate::attributes::ElementDecl;
use crate::element::TimedElement;
use crate::listener::{ElementNotice, IntervalNotice};
use crate::root::TimedDocumentRoot;
use crate::specifier::TimingSpecifier;
use crate::time::{Time, earliest};
use crate::types::{ElementId, SpecifierId, TimingError};

impl TimedDocumentRoot {
    /// Adds an element under `parent`, or at the top level when `None`.
    ///
    /// Timing attributes are parsed here; the element does nothing until
    /// [`initialize`](Self::initialize) resolves its begin and end lists.
    pub fn add_element(
        &mut self,
        parent: Option<ElementId>,
        decl: ElementDecl,
    ) -> Result<ElementId, TimingError> {
        if let Some(p) = parent
            && !self.checked(p)?.is_container()
        {
            return Err(TimingError::NotAContainer(p));
        }
        if let Some(xml_id) = &decl.id
            && self.ids.contains_key(xml_id)
        {
            return Err(TimingError::DuplicateId(xml_id.clone()));
        }
        let id = ElementId(self.elements.len());
        let parsed = decl.attributes.parse(self.config.access_keys).map_err(|e| {
            let element = decl.id.clone().unwrap_or_else(|| id.to_string());
            warn!("malformed {} attribute on {}", e.attribute, element.as_str());
            TimingError::MalformedAttribute {
                element,
                attribute: e.attribute,
                source: e.source,
            }
        })?;

        let mut el = TimedElement::new(
            decl.id.clone(),
            decl.event_target,
            parent,
            decl.container,
            decl.behavior,
            parsed.params,
        );
        for spec in parsed.begin {
            el.begin_specifiers.push(self.push_specifier(TimingSpecifier::new(id, true, spec)));
        }
        for spec in parsed.end {
            el.end_specifiers.push(self.push_specifier(TimingSpecifier::new(id, false, spec)));
        }
        self.elements.push(Some(el));
        if let Some(xml_id) = decl.id {
            self.ids.insert(xml_id, id);
        }
        match parent {
            Some(p) => {
                if let Some(children) = self.el_mut(p).children.as_mut() {
                    children.push(id);
                }
            }
            None => self.children.push(id),
        }
        debug!("added element {}", id);
        self.notify_element(id, ElementNotice::Added);
        self.current_interval_will_update();
        Ok(id)
    }

    fn push_specifier(&mut self, spec: TimingSpecifier) -> SpecifierId {
        let sid = SpecifierId(self.specifiers.len());
        self.specifiers.push(Some(spec));
        sid
    }

    /// Removes an element and its descendants.
    ///
    /// Instance times it contributed to other elements are withdrawn and
    /// syncbase values referring to it become unresolved.
    pub fn remove_element(&mut self, id: ElementId) -> Result<(), TimingError> {
        self.checked(id)?;
        for child in self.el(id).children().to_vec() {
            self.remove_element(child)?;
        }
        self.deinitialize(id)?;

        let el = self.el(id);
        let mut intervals: Vec<_> = el.current_interval.into_iter().collect();
        if let Some(prev) = el.previous_interval
            && !intervals.contains(&prev)
        {
            intervals.push(prev);
        }
        for &iv in &intervals {
            self.notify_remove_interval(id, iv);
        }
        let el = self.el_mut(id);
        el.current_interval = None;
        el.previous_interval = None;
        for iv in intervals {
            self.notify_interval(id, iv, IntervalNotice::Removed);
            self.release_interval(iv);
        }

        let el = self.el(id);
        let dependents: Vec<SpecifierId> = el
            .begin_dependents
            .iter()
            .chain(el.end_dependents.iter())
            .copied()
            .collect();
        for sid in dependents {
            self.withdraw_syncbase_instances(sid);
            if let Some(Some(spec)) = self.specifiers.get_mut(sid.0) {
                spec.state.syncbase = None;
            }
        }

        let Some(el) = self.elements.get_mut(id.0).and_then(Option::take) else {
            return Err(TimingError::UnknownElement(id));
        };
        for inst in el.begin_instances.iter().chain(el.end_instances.iter()) {
            self.discard_instance(*inst);
        }
        for sid in el.begin_specifiers.iter().chain(el.end_specifiers.iter()) {
            self.specifiers[sid.0] = None;
        }
        match el.parent {
            Some(p) => {
                if let Some(Some(parent)) = self.elements.get_mut(p.0)
                    && let Some(children) = parent.children.as_mut()
                {
                    children.retain(|&c| c != id);
                }
            }
            None => self.children.retain(|&c| c != id),
        }
        if let Some(xml_id) = &el.xml_id {
            self.ids.remove(xml_id);
        }
        debug!("removed element {}", id);
        self.notify_element(id, ElementNotice::Removed);
        self.current_interval_will_update();
        Ok(())
    }

    /// Resolves an element's begin and end lists.
    pub fn initialize(&mut self, id: ElementId) -> Result<(), TimingError> {
        let el = self.checked(id)?;
        if el.initialized {
            return Ok(());
        }
        let specifiers: Vec<SpecifierId> = el
            .begin_specifiers
            .iter()
            .chain(el.end_specifiers.iter())
            .copied()
            .collect();
        for sid in specifiers {
            self.initialize_specifier(sid)?;
        }
        self.el_mut(id).initialized = true;
        Ok(())
    }

    /// Initializes every element in document order.
    pub fn initialize_all(&mut self) -> Result<(), TimingError> {
        for id in self.document_order() {
            self.initialize(id)?;
        }
        Ok(())
    }

    /// Tears down an element's listeners and syncbase registrations.
    pub fn deinitialize(&mut self, id: ElementId) -> Result<(), TimingError> {
        let el = self.checked(id)?;
        if !el.initialized {
            return Ok(());
        }
        let specifiers: Vec<SpecifierId> = el
            .begin_specifiers
            .iter()
            .chain(el.end_specifiers.iter())
            .copied()
            .collect();
        for sid in specifiers {
            self.deinitialize_specifier(sid);
        }
        self.el_mut(id).initialized = false;
        Ok(())
    }

    /// Samples an element and, for containers, all of its descendants.
    pub(crate) fn sample_at(&mut self, id: ElementId, time: Time, hyperlinking: bool) -> Time {
        let mut wait = self.sample_element(id, time, hyperlinking);
        for child in self.el(id).children().to_vec() {
            wait = earliest(wait, self.sample_at(child, time, hyperlinking));
        }
        wait
    }

    /// Resets an element and its descendants.
    pub(crate) fn reset(&mut self, id: ElementId, clear_current_begin: bool) {
        self.reset_element(id, clear_current_begin);
        for child in self.el(id).children().to_vec() {
            self.reset(child, clear_current_begin);
        }
    }

    /// Every live element, parents before children.
    pub(crate) fn document_order(&self) -> Vec<ElementId> {
        let mut order = Vec::new();
        let mut stack: Vec<ElementId> = self.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.el(id).children().iter().rev().copied());
        }
        order
    }
}
