//! The Segment: an ordered container of events for one part's timeline
//!
//! Events are stored in a slotmap arena and addressed by generation-tagged
//! `EventId` handles, so a handle to an erased event dereferences to `None`
//! instead of dangling. Alongside the arena the segment keeps an order
//! vector sorted by (absolute time, sub-ordering), stable by insertion
//! order among simultaneous events.
//!
//! Every structural mutation notifies registered observers synchronously,
//! before the mutating call returns; dependent structures (selections)
//! therefore always see a consistent segment.

pub mod editor;

use serde::de::Deserializer;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::ops::Range;
use std::rc::{Rc, Weak};

use crate::models::duration::{nearest_viable, TimeT};
use crate::models::event::{Event, EventKind};
use crate::models::time_signature::TimeSignatureMap;

new_key_type! {
    /// Stable, generation-tagged handle to an event in one segment.
    pub struct EventId;
}

/// Dot limit used when decomposing rest gaps during normalization.
const NORMALIZE_MAX_DOTS: u8 = 2;

/// Receiver for segment mutation notifications.
///
/// Callbacks run synchronously inside the mutating call. They receive the
/// segment read-only; re-entrant mutation is not part of the contract.
pub trait SegmentObserver {
    fn event_added(&mut self, segment: &Segment, id: EventId) {
        let _ = (segment, id);
    }

    fn event_removed(&mut self, segment: &Segment, id: EventId, event: &Event) {
        let _ = (segment, id, event);
    }

    fn segment_deleted(&mut self, segment: &Segment) {
        let _ = segment;
    }
}

/// Ordered multiset of events keyed by (absolute time, sub-ordering).
#[derive(Debug)]
pub struct Segment {
    events: SlotMap<EventId, Event>,
    order: Vec<EventId>,
    start_time: TimeT,
    timeline: Rc<TimeSignatureMap>,
    observers: RefCell<Vec<Weak<RefCell<dyn SegmentObserver>>>>,
    next_group_id: i64,
}

impl Segment {
    /// Empty segment starting at time 0 with a default 4/4 timeline.
    pub fn new() -> Self {
        Self::with_timeline(Rc::new(TimeSignatureMap::new()))
    }

    pub fn with_timeline(timeline: Rc<TimeSignatureMap>) -> Self {
        Segment {
            events: SlotMap::with_key(),
            order: Vec::new(),
            start_time: 0,
            timeline,
            observers: RefCell::new(Vec::new()),
            next_group_id: 0,
        }
    }

    pub fn set_start_time(&mut self, start_time: TimeT) {
        self.start_time = start_time;
    }

    /// Earliest time considered inside the segment: the configured start,
    /// or the first event's time if that is earlier.
    pub fn start_time(&self) -> TimeT {
        match self.order.first() {
            Some(&id) => self.start_time.min(self.events[id].absolute_time()),
            None => self.start_time,
        }
    }

    /// One past the last covered time: the latest event end, or the start
    /// time when empty.
    pub fn end_time(&self) -> TimeT {
        self.iter()
            .map(|(_, e)| e.end_time())
            .max()
            .unwrap_or(self.start_time)
            .max(self.start_time)
    }

    pub fn timeline(&self) -> &TimeSignatureMap {
        &self.timeline
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // --- queries ---

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(id)
    }

    /// Mutable access for property edits. Timing fields are private to
    /// `Event`, so ordering cannot be invalidated through this.
    pub fn event_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.get_mut(id)
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(id)
    }

    /// Events in container order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.order.iter().map(move |&id| (id, &self.events[id]))
    }

    /// Event handles in container order.
    pub fn ids(&self) -> &[EventId] {
        &self.order
    }

    pub fn id_at(&self, pos: usize) -> Option<EventId> {
        self.order.get(pos).copied()
    }

    pub fn event_at(&self, pos: usize) -> Option<&Event> {
        self.id_at(pos).map(|id| &self.events[id])
    }

    /// Position of the first event with `absolute_time >= time`.
    pub fn find_time(&self, time: TimeT) -> usize {
        self.order
            .partition_point(|&id| self.events[id].absolute_time() < time)
    }

    /// Position of an event located by identity. Needed because several
    /// events can share a time; never rely on a stale position across
    /// mutations.
    pub fn find_single(&self, id: EventId) -> Option<usize> {
        let key = self.events.get(id)?.ordering_key();
        let mut pos = self
            .order
            .partition_point(|&e| self.events[e].ordering_key() < key);
        while let Some(&candidate) = self.order.get(pos) {
            if self.events[candidate].ordering_key() != key {
                break;
            }
            if candidate == id {
                return Some(pos);
            }
            pos += 1;
        }
        None
    }

    /// Positions of all events at exactly `time` (the chord at one
    /// instant).
    pub fn time_slice(&self, time: TimeT) -> Range<usize> {
        let start = self.find_time(time);
        let end = self
            .order
            .partition_point(|&id| self.events[id].absolute_time() <= time);
        start..end
    }

    // --- bar oracle delegation ---

    pub fn bar_start_for_time(&self, time: TimeT) -> TimeT {
        self.timeline.bar_start_for_time(time)
    }

    pub fn bar_end_for_time(&self, time: TimeT) -> TimeT {
        self.timeline.bar_end_for_time(time)
    }

    pub fn bar_number(&self, time: TimeT) -> i64 {
        self.timeline.bar_number(time)
    }

    // --- mutation ---

    /// Insert an event, taking ownership. Returns its handle. Simultaneous
    /// events keep insertion order among themselves.
    pub fn insert(&mut self, event: Event) -> EventId {
        let key = event.ordering_key();
        log::trace!(
            "segment insert: {:?} at {} dur {}",
            event.kind(),
            event.absolute_time(),
            event.duration()
        );
        let id = self.events.insert(event);
        let pos = self
            .order
            .partition_point(|&e| self.events[e].ordering_key() <= key);
        self.order.insert(pos, id);
        self.notify_added(id);
        id
    }

    /// Remove an event, returning ownership of it to the caller. `None`
    /// for a stale handle. Observers are notified before this returns.
    pub fn erase(&mut self, id: EventId) -> Option<Event> {
        let pos = self.find_single(id)?;
        self.order.remove(pos);
        let event = self.events.remove(id)?;
        log::trace!(
            "segment erase: {:?} at {} dur {}",
            event.kind(),
            event.absolute_time(),
            event.duration()
        );
        self.notify_removed(id, &event);
        Some(event)
    }

    /// Allocate a fresh rendering-group id for beam/tuplet tagging.
    pub fn allocate_group_id(&mut self) -> i64 {
        self.next_group_id += 1;
        self.next_group_id
    }

    /// Repair the note/rest coverage of `[from, to)`: remove the rests in
    /// the range (widened to bar boundaries and to any rest overlapping
    /// it), then refill every gap between notes with rests split at
    /// barlines and greedily decomposed into viable durations.
    pub fn normalize_rests(&mut self, from: TimeT, to: TimeT) {
        if to <= from {
            return;
        }
        let mut from = self.bar_start_for_time(from);
        let mut to = self.bar_end_for_time(to - 1);

        // Widen over rests straddling either boundary so no partial rest
        // survives inside the range. Overlapping rests can straddle the
        // widened boundary in turn, so repeat until stable.
        loop {
            let mut changed = false;
            for (_, e) in self.iter() {
                if !e.is_rest() {
                    continue;
                }
                if e.absolute_time() < from && e.end_time() > from {
                    from = e.absolute_time();
                    changed = true;
                }
                if e.absolute_time() < to && e.end_time() > to {
                    to = e.end_time();
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        log::debug!("normalize_rests: [{}, {})", from, to);

        let stale: Vec<EventId> = self
            .iter()
            .filter(|(_, e)| e.is_rest() && e.absolute_time() >= from && e.absolute_time() < to)
            .map(|(id, _)| id)
            .collect();
        for id in stale {
            self.erase(id);
        }

        // Note coverage, in order; overlapping notes extend the covered
        // position monotonically.
        let spans: Vec<(TimeT, TimeT)> = self
            .iter()
            .filter(|(_, e)| e.is_note() && e.end_time() > from && e.absolute_time() < to)
            .map(|(_, e)| (e.absolute_time(), e.end_time()))
            .collect();

        let mut gaps: Vec<(TimeT, TimeT)> = Vec::new();
        let mut pos = from;
        for (start, end) in spans {
            if start > pos {
                gaps.push((pos, start));
            }
            pos = pos.max(end);
        }
        if pos < to {
            gaps.push((pos, to));
        }

        for (gap_start, gap_end) in gaps {
            self.fill_gap_with_rests(gap_start.max(from), gap_end.min(to));
        }
    }

    fn fill_gap_with_rests(&mut self, gap_start: TimeT, gap_end: TimeT) {
        let mut t = gap_start;
        while t < gap_end {
            let chunk_end = gap_end.min(self.bar_end_for_time(t));
            let mut remaining = chunk_end - t;
            while remaining > 0 {
                let d = nearest_viable(remaining, NORMALIZE_MAX_DOTS).unwrap_or(remaining);
                self.insert(Event::new(EventKind::Rest, t, d));
                t += d;
                remaining -= d;
            }
            t = chunk_end;
        }
    }

    // --- observers ---

    /// Register an observer. Dead weak references are pruned on each
    /// notification round; dropping the observer is deregistration.
    pub fn add_observer(&self, observer: Weak<RefCell<dyn SegmentObserver>>) {
        self.observers.borrow_mut().push(observer);
    }

    fn live_observers(&self) -> Vec<Rc<RefCell<dyn SegmentObserver>>> {
        let mut list = self.observers.borrow_mut();
        list.retain(|w| w.strong_count() > 0);
        list.iter().filter_map(Weak::upgrade).collect()
    }

    fn notify_added(&self, id: EventId) {
        for obs in self.live_observers() {
            obs.borrow_mut().event_added(self, id);
        }
    }

    fn notify_removed(&self, id: EventId, event: &Event) {
        for obs in self.live_observers() {
            obs.borrow_mut().event_removed(self, id, event);
        }
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        for obs in self.live_observers() {
            obs.borrow_mut().segment_deleted(self);
        }
    }
}

// Persistence: a segment serializes as its start time plus ordered event
// list. Timeline and observers are transient wiring, reattached by the
// owning document on load.
impl Serialize for Segment {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let events: Vec<&Event> = self.order.iter().map(|&id| &self.events[id]).collect();
        let mut state = serializer.serialize_struct("Segment", 2)?;
        state.serialize_field("start_time", &self.start_time)?;
        state.serialize_field("events", &events)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct SegmentData {
            start_time: TimeT,
            events: Vec<Event>,
        }

        let data = SegmentData::deserialize(deserializer)?;
        let mut segment = Segment::new();
        segment.set_start_time(data.start_time);
        for event in data.events {
            segment.insert(event);
        }
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{note, rest};

    #[test]
    fn test_insert_keeps_time_order() {
        let mut s = Segment::new();
        s.insert(note(480, 480, 62));
        s.insert(note(0, 480, 60));
        s.insert(note(960, 480, 64));

        let times: Vec<TimeT> = s.iter().map(|(_, e)| e.absolute_time()).collect();
        assert_eq!(times, vec![0, 480, 960]);
    }

    #[test]
    fn test_sub_ordering_sorts_before_notes() {
        let mut s = Segment::new();
        let n = s.insert(note(480, 480, 60));
        let clef = s.insert(Event::with_sub_ordering(EventKind::Clef, 480, 0, -3));

        assert_eq!(s.id_at(0), Some(clef));
        assert_eq!(s.id_at(1), Some(n));
    }

    #[test]
    fn test_find_single_with_simultaneous_events() {
        let mut s = Segment::new();
        let a = s.insert(note(0, 480, 60));
        let b = s.insert(note(0, 480, 64));
        let c = s.insert(note(0, 480, 67));

        assert_eq!(s.find_single(a), Some(0));
        assert_eq!(s.find_single(b), Some(1));
        assert_eq!(s.find_single(c), Some(2));
    }

    #[test]
    fn test_time_slice_is_the_chord() {
        let mut s = Segment::new();
        s.insert(note(0, 480, 60));
        s.insert(note(480, 480, 62));
        s.insert(note(480, 480, 65));
        s.insert(note(960, 480, 64));

        let slice = s.time_slice(480);
        assert_eq!(slice, 1..3);
        assert!(s.time_slice(240).is_empty());
    }

    #[test]
    fn test_erase_returns_ownership_and_invalidates_handle() {
        let mut s = Segment::new();
        let id = s.insert(note(0, 480, 60));
        let e = s.erase(id).unwrap();
        assert_eq!(e.pitch(), Some(60));
        assert!(s.get(id).is_none());
        assert!(s.erase(id).is_none());
    }

    #[test]
    fn test_normalize_rests_fills_empty_bar() {
        let mut s = Segment::new();
        s.normalize_rests(0, 1920);
        // One semibreve rest covers the whole 4/4 bar
        assert_eq!(s.len(), 1);
        let (_, e) = s.iter().next().unwrap();
        assert!(e.is_rest());
        assert_eq!(e.absolute_time(), 0);
        assert_eq!(e.duration(), 1920);
    }

    #[test]
    fn test_normalize_rests_fills_around_note() {
        let mut s = Segment::new();
        s.insert(note(480, 480, 60));
        s.normalize_rests(0, 1920);

        let spans: Vec<(TimeT, TimeT, bool)> = s
            .iter()
            .map(|(_, e)| (e.absolute_time(), e.end_time(), e.is_rest()))
            .collect();
        // Coverage is total and non-overlapping
        let mut pos = 0;
        for (start, end, _) in &spans {
            assert_eq!(*start, pos);
            pos = *end;
        }
        assert_eq!(pos, 1920);
        assert!(spans[0].2);
        assert!(!spans[1].2);
    }

    struct CountingObserver {
        added: usize,
        removed: usize,
    }

    impl SegmentObserver for CountingObserver {
        fn event_added(&mut self, _segment: &Segment, _id: EventId) {
            self.added += 1;
        }
        fn event_removed(&mut self, _segment: &Segment, _id: EventId, _event: &Event) {
            self.removed += 1;
        }
    }

    #[test]
    fn test_observer_notified_synchronously() {
        let mut s = Segment::new();
        let obs = Rc::new(RefCell::new(CountingObserver { added: 0, removed: 0 }));
        s.add_observer(Rc::downgrade(&obs) as Weak<RefCell<dyn SegmentObserver>>);

        let id = s.insert(rest(0, 480));
        assert_eq!(obs.borrow().added, 1);
        s.erase(id);
        assert_eq!(obs.borrow().removed, 1);
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let mut s = Segment::new();
        {
            let obs = Rc::new(RefCell::new(CountingObserver { added: 0, removed: 0 }));
            s.add_observer(Rc::downgrade(&obs) as Weak<RefCell<dyn SegmentObserver>>);
        }
        // Must not panic or notify a dead observer
        s.insert(rest(0, 480));
    }
}
