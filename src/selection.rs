//! Tie-aware event selections
//!
//! An `EventSelection` is a non-owning subset of one segment's events,
//! held as generation-tagged handles. It registers itself as a segment
//! observer so that an event erased from the segment leaves the selection
//! immediately (and without cascading through tie chains). Adding or
//! removing an event with tie-chasing enabled pulls the whole chain of
//! tied same-pitch notes along in both directions.
//!
//! Cached time bounds only ever expand: removals deliberately do not
//! shrink them (recomputing would cost a scan per removal, and callers
//! of the original behavior rely on the lazy bounds).

use std::cell::RefCell;
use std::collections::HashSet;
use std::ops::Range;
use std::rc::{Rc, Weak};

use crate::models::duration::TimeT;
use crate::models::event::{Event, EventKind};
use crate::segment::{EventId, Segment, SegmentObserver};

struct SelectionState {
    ids: HashSet<EventId>,
    begin_time: TimeT,
    end_time: TimeT,
    have_real_start_time: bool,
}

impl SelectionState {
    fn new() -> Self {
        SelectionState {
            ids: HashSet::new(),
            begin_time: 0,
            end_time: 0,
            have_real_start_time: false,
        }
    }

    /// Insert and expand bounds. True if newly added.
    fn insert(&mut self, event: &Event, id: EventId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        if !self.have_real_start_time {
            self.begin_time = event.absolute_time();
            self.end_time = event.end_time();
            self.have_real_start_time = true;
        } else {
            self.begin_time = self.begin_time.min(event.absolute_time());
            self.end_time = self.end_time.max(event.end_time());
        }
        true
    }
}

impl SegmentObserver for SelectionState {
    fn event_removed(&mut self, _segment: &Segment, id: EventId, _event: &Event) {
        // Externally forced removal must not cascade through ties.
        self.ids.remove(&id);
    }

    fn segment_deleted(&mut self, _segment: &Segment) {
        // A selection should not outlive its segment, but must not crash
        // if it does.
        log::warn!("selection notified of segment deletion; clearing");
        self.ids.clear();
    }
}

/// Non-owning, observer-synchronized subset of one segment's events.
pub struct EventSelection {
    state: Rc<RefCell<SelectionState>>,
}

impl EventSelection {
    /// Empty selection observing `segment`.
    pub fn new(segment: &Segment) -> Self {
        let state = Rc::new(RefCell::new(SelectionState::new()));
        segment.add_observer(Rc::downgrade(&state) as Weak<RefCell<dyn SegmentObserver>>);
        EventSelection { state }
    }

    /// Selection of every event starting in `[begin, end)`. With
    /// `overlap`, additionally walks backward from `begin` including
    /// events whose span overlaps the start boundary, stopping at the
    /// first that does not. Only the leading edge is extended this way.
    pub fn from_range(segment: &Segment, begin: TimeT, end: TimeT, overlap: bool) -> Self {
        let selection = Self::new(segment);
        {
            let mut state = selection.state.borrow_mut();

            for (id, e) in segment.iter().skip(segment.find_time(begin)) {
                if e.absolute_time() >= end {
                    break;
                }
                state.insert(e, id);
            }

            if overlap {
                let leading: Vec<(EventId, &Event)> =
                    segment.iter().take(segment.find_time(begin)).collect();
                for &(id, e) in leading.iter().rev() {
                    if e.end_time() <= begin {
                        break;
                    }
                    state.insert(e, id);
                }
            }
        }
        selection
    }

    pub fn len(&self) -> usize {
        self.state.borrow().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().ids.is_empty()
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.state.borrow().ids.contains(&id)
    }

    /// True if any selected event has the given kind. Linear scan;
    /// selections are bounded by interaction size.
    pub fn contains_kind(&self, segment: &Segment, kind: &EventKind) -> bool {
        let state = self.state.borrow();
        state
            .ids
            .iter()
            .filter_map(|&id| segment.get(id))
            .any(|e| e.kind() == kind)
    }

    /// Earliest start among events ever added. Not shrunk by removals.
    pub fn start_time(&self) -> TimeT {
        self.state.borrow().begin_time
    }

    /// Latest end among events ever added. Not shrunk by removals.
    pub fn end_time(&self) -> TimeT {
        self.state.borrow().end_time
    }

    /// Distinguishes "no events yet" from "starts at time 0".
    pub fn has_real_start_time(&self) -> bool {
        self.state.borrow().have_real_start_time
    }

    /// Add an event; with `ties`, pull in the whole chain of tied
    /// same-pitch notes in both directions. Returns how many events were
    /// added in the requested direction (the initial event included);
    /// zero if it was already selected or the handle is stale.
    pub fn add_event(&mut self, segment: &Segment, id: EventId, ties: bool, forward: bool) -> usize {
        let Some(event) = segment.get(id) else {
            return 0;
        };
        {
            let mut state = self.state.borrow_mut();
            if !state.insert(event, id) {
                return 0;
            }
        }
        let mut count = 1;

        if ties {
            let mut forward_added = 0;
            let mut cur = id;
            while let Some(next) = tie_successor(segment, cur) {
                if let Some(e) = segment.get(next) {
                    if self.state.borrow_mut().insert(e, next) {
                        forward_added += 1;
                    }
                }
                cur = next;
            }

            let mut backward_added = 0;
            let mut cur = id;
            while let Some(prev) = tie_predecessor(segment, cur) {
                if let Some(e) = segment.get(prev) {
                    if self.state.borrow_mut().insert(e, prev) {
                        backward_added += 1;
                    }
                }
                cur = prev;
            }

            count += if forward { forward_added } else { backward_added };
        }
        count
    }

    /// Remove an event, with the same tie-chasing as `add_event`.
    /// Returns how many events were removed in the requested direction.
    /// Bounds are not recomputed.
    pub fn remove_event(
        &mut self,
        segment: &Segment,
        id: EventId,
        ties: bool,
        forward: bool,
    ) -> usize {
        if !self.state.borrow_mut().ids.remove(&id) {
            return 0;
        }
        let mut count = 1;

        if ties {
            let mut forward_removed = 0;
            let mut cur = id;
            while let Some(next) = tie_successor(segment, cur) {
                if self.state.borrow_mut().ids.remove(&next) {
                    forward_removed += 1;
                }
                cur = next;
            }

            let mut backward_removed = 0;
            let mut cur = id;
            while let Some(prev) = tie_predecessor(segment, cur) {
                if self.state.borrow_mut().ids.remove(&prev) {
                    backward_removed += 1;
                }
                cur = prev;
            }

            count += if forward { forward_removed } else { backward_removed };
        }
        count
    }

    /// Selected handles in the segment's container order.
    pub fn ids_in_order(&self, segment: &Segment) -> Vec<EventId> {
        let state = self.state.borrow();
        segment
            .iter()
            .map(|(id, _)| id)
            .filter(|id| state.ids.contains(id))
            .collect()
    }

    /// Maximal runs of selected events, as position ranges in the
    /// segment's container order. "Contiguous" means unbroken runs of
    /// selected-vs-unselected in iteration order, not musical adjacency.
    pub fn ranges(&self, segment: &Segment) -> Vec<Range<usize>> {
        let state = self.state.borrow();
        let mut result = Vec::new();
        let mut run_start: Option<usize> = None;

        for (pos, &id) in segment.ids().iter().enumerate() {
            if state.ids.contains(&id) {
                run_start.get_or_insert(pos);
            } else if let Some(start) = run_start.take() {
                result.push(start..pos);
            }
        }
        if let Some(start) = run_start {
            result.push(start..segment.len());
        }
        result
    }

    /// Time spans of the maximal contiguous runs: (first event's start,
    /// last event's end) for each run.
    pub fn range_times(&self, segment: &Segment) -> Vec<(TimeT, TimeT)> {
        self.ranges(segment)
            .into_iter()
            .filter_map(|range| {
                let first = segment.event_at(range.start)?;
                let last = segment.event_at(range.end - 1)?;
                Some((first.absolute_time(), last.end_time()))
            })
            .collect()
    }
}

/// Next note in a tie chain: the note starting at this one's end with the
/// same pitch and a backward tie. `None` at a pitch mismatch, an untied
/// note, or end of segment.
fn tie_successor(segment: &Segment, id: EventId) -> Option<EventId> {
    let e = segment.get(id)?;
    if !e.is_note() || !e.tied_forward() {
        return None;
    }
    let pitch = e.pitch()?;
    segment
        .time_slice(e.end_time())
        .filter_map(|pos| segment.id_at(pos))
        .find(|&cid| {
            segment
                .get(cid)
                .map(|c| c.is_note() && c.tied_backward() && c.pitch() == Some(pitch))
                .unwrap_or(false)
        })
}

/// Mirror of `tie_successor`, walking backward.
fn tie_predecessor(segment: &Segment, id: EventId) -> Option<EventId> {
    let e = segment.get(id)?;
    if !e.is_note() || !e.tied_backward() {
        return None;
    }
    let pitch = e.pitch()?;
    let start = e.absolute_time();

    let mut pos = segment.find_time(start);
    while pos > 0 {
        pos -= 1;
        let cid = segment.id_at(pos)?;
        let c = segment.get(cid)?;
        if c.is_note() && c.tied_forward() && c.end_time() == start && c.pitch() == Some(pitch) {
            return Some(cid);
        }
    }
    None
}
