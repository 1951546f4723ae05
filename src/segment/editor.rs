//! Notation-aware editing algorithms over one segment
//!
//! `SegmentEditor` borrows a segment and exposes the operations editing
//! commands use: viability splitting with ties, typed-hole insertion,
//! note/rest deletion with uniform tie repair, rest collapsing, beam and
//! tuplet grouping, and probe-mode rest removal.
//!
//! Expected infeasibility ("no absorbing rest", "hit a note") comes back
//! as `bool`/`Option` sentinels; precondition violations come back as
//! `EditError`. Multi-step operations either complete or leave the
//! segment unchanged (the probe operations scan first and mutate after).

use num_rational::Ratio;

use crate::error::{EditError, Result};
use crate::models::duration::{self, NoteValue, TimeT};
use crate::models::event::{
    Event, EventKind, PropertyKey, PropertyValue, GROUP_TYPE_BEAMED, GROUP_TYPE_TUPLED,
};
use crate::models::pitch::Accidental;
use crate::quantizer::Quantizer;

use super::{EventId, Segment};

/// Which neighbor a rest was merged into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollapseDirection {
    Forward,
    Backward,
}

/// Editor bound to one segment. Stateless apart from the quantizer
/// configuration; all state lives in the segment.
pub struct SegmentEditor<'a> {
    segment: &'a mut Segment,
    quantizer: Quantizer,
}

impl<'a> SegmentEditor<'a> {
    pub fn new(segment: &'a mut Segment) -> Self {
        Self::with_quantizer(segment, Quantizer::default())
    }

    pub fn with_quantizer(segment: &'a mut Segment, quantizer: Quantizer) -> Self {
        SegmentEditor { segment, quantizer }
    }

    pub fn segment(&self) -> &Segment {
        self.segment
    }

    pub fn quantizer(&self) -> Quantizer {
        self.quantizer
    }

    // --- viability ---

    /// True if `duration` can be written as one note value with at most
    /// `max_dots` dots (the quantizer's limit when `None`).
    pub fn is_viable(&self, duration: TimeT, max_dots: Option<u8>) -> bool {
        duration::is_viable(duration, max_dots.unwrap_or(self.quantizer.max_dots))
    }

    /// Split one note or rest into two pieces of `base` and the
    /// remainder, preserving sub-ordering and properties by copy. Note
    /// pieces are tied together; rest pieces are not (ties are a
    /// sustained-pitch concept). Returns the two new handles in time
    /// order.
    pub fn split_event_into_tie(&mut self, id: EventId, base: TimeT) -> Result<(EventId, EventId)> {
        let e = self.segment.get(id).ok_or(EditError::NoSuchEvent)?;
        if !e.is_note_or_rest() {
            return Err(EditError::NotNoteOrRest);
        }
        let total = e.duration();
        if base <= 0 || base >= total {
            return Err(EditError::InvalidSplit {
                base,
                duration: total,
            });
        }

        let original = self.segment.erase(id).ok_or(EditError::NoSuchEvent)?;
        let t = original.absolute_time();
        let mut first = original.copy_with_times(t, base);
        let mut second = original.copy_with_times(t + base, total - base);

        if original.is_note() {
            // first keeps the original's backward tie, second keeps the
            // original's forward tie; the new boundary is tied.
            first.set_tied_forward(true);
            second.set_tied_backward(true);
        } else {
            first.set_tied_forward(false);
            first.set_tied_backward(false);
            second.set_tied_forward(false);
            second.set_tied_backward(false);
        }

        let a = self.segment.insert(first);
        let b = self.segment.insert(second);
        Ok((a, b))
    }

    /// Split every note/rest of the chord at `time` into a piece of
    /// `base` plus a tied continuation. Returns the first new event of
    /// the first split.
    pub fn split_into_tie(&mut self, time: TimeT, base: TimeT) -> Result<EventId> {
        let ids: Vec<EventId> = self
            .segment
            .time_slice(time)
            .filter_map(|pos| self.segment.id_at(pos))
            .filter(|&id| self.segment.get(id).map(Event::is_note_or_rest).unwrap_or(false))
            .collect();
        if ids.is_empty() {
            return Err(EditError::NoEventAtTime(time));
        }

        let mut first: Option<EventId> = None;
        for id in ids {
            let (a, _) = self.split_event_into_tie(id, base)?;
            first.get_or_insert(a);
        }
        first.ok_or(EditError::NoEventAtTime(time))
    }

    /// Decompose the event's duration into a chain of viable pieces,
    /// longest first, tying note pieces together. With `split_at_bars`,
    /// a split is also forced at every barline the event crosses.
    /// Returns the first event of the resulting chain.
    pub fn make_this_note_viable(&mut self, id: EventId, split_at_bars: bool) -> Result<EventId> {
        {
            let e = self.segment.get(id).ok_or(EditError::NoSuchEvent)?;
            if !e.is_note_or_rest() {
                return Err(EditError::NotNoteOrRest);
            }
        }

        let max_dots = self.quantizer.max_dots;
        let mut first: Option<EventId> = None;
        // Pieces still to examine; the leftmost is always on top, so the
        // first piece to come off finished is the chain head.
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let (t, d) = {
                let e = self.segment.get(current).ok_or(EditError::NoSuchEvent)?;
                (e.absolute_time(), e.duration())
            };

            let bar_end = self.segment.bar_end_for_time(t);
            let split_at = if split_at_bars && d > 0 && t + d > bar_end && bar_end > t {
                Some(bar_end - t)
            } else if d > 0 && !duration::is_viable(d, max_dots) {
                match duration::nearest_viable(d, max_dots) {
                    Some(v) if v < d => Some(v),
                    // Shorter than any viable value; leave it alone.
                    _ => None,
                }
            } else {
                None
            };

            match split_at {
                Some(base) => {
                    let (a, b) = self.split_event_into_tie(current, base)?;
                    stack.push(b);
                    stack.push(a);
                }
                None => {
                    first.get_or_insert(current);
                }
            }
        }

        Ok(first.unwrap_or(id))
    }

    /// Apply `make_this_note_viable` to every note/rest starting in
    /// `[from, to)`.
    pub fn make_notes_viable(&mut self, from: TimeT, to: TimeT, split_at_bars: bool) -> Result<()> {
        if to <= from {
            return Err(EditError::EmptyRange);
        }
        let ids: Vec<EventId> = self
            .segment
            .iter()
            .filter(|(_, e)| {
                e.is_note_or_rest() && e.absolute_time() >= from && e.absolute_time() < to
            })
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            if self.segment.contains(id) {
                self.make_this_note_viable(id, split_at_bars)?;
            }
        }
        Ok(())
    }

    // --- adjacency ---

    /// The next note whose (quantized) start coincides with this note's
    /// (quantized) end. With `allow_overlap`, an overlapping note also
    /// qualifies so long as neither note encloses the other. `None` if
    /// the handle is stale or not a note.
    pub fn next_adjacent_note(
        &self,
        id: EventId,
        same_pitch: bool,
        allow_overlap: bool,
    ) -> Option<EventId> {
        let e = self.segment.get(id)?;
        if !e.is_note() {
            return None;
        }
        let q = self.quantizer;
        let e_end_q = q.quantize_time(e.end_time());

        let mut pos = self.segment.find_single(id)? + 1;
        while let Some(cid) = self.segment.id_at(pos) {
            let c = self.segment.get(cid)?;
            let c_start_q = q.quantize_time(c.absolute_time());
            if c_start_q > e_end_q {
                break;
            }
            if c.is_note() {
                let adjacent = c_start_q == e_end_q
                    || (allow_overlap
                        && c.absolute_time() > e.absolute_time()
                        && c_start_q < e_end_q
                        && q.quantize_time(c.end_time()) > e_end_q);
                if adjacent && (!same_pitch || c.pitch() == e.pitch()) {
                    return Some(cid);
                }
            }
            pos += 1;
        }
        None
    }

    /// Mirror of `next_adjacent_note`, scanning backward.
    pub fn previous_adjacent_note(
        &self,
        id: EventId,
        same_pitch: bool,
        allow_overlap: bool,
    ) -> Option<EventId> {
        let e = self.segment.get(id)?;
        if !e.is_note() {
            return None;
        }
        let q = self.quantizer;
        let e_start_q = q.quantize_time(e.absolute_time());
        let e_end_q = q.quantize_time(e.end_time());

        let mut pos = self.segment.find_single(id)?;
        while pos > 0 {
            pos -= 1;
            let cid = self.segment.id_at(pos)?;
            let c = self.segment.get(cid)?;
            if !c.is_note() {
                continue;
            }
            let c_end_q = q.quantize_time(c.end_time());
            let adjacent = c_end_q == e_start_q
                || (allow_overlap
                    && c.absolute_time() < e.absolute_time()
                    && c_end_q > e_start_q
                    && c_end_q < e_end_q);
            if adjacent && (!same_pitch || c.pitch() == e.pitch()) {
                return Some(cid);
            }
        }
        None
    }

    // --- rest collapsing ---

    /// Merge a rest into its immediately following rest, or failing that
    /// its immediately preceding one, when the merged span stays within
    /// one bar or covers whole bars. Reports which direction succeeded;
    /// `None` if the event is not a rest or neither neighbor merges.
    pub fn collapse_rests_if_valid(&mut self, id: EventId) -> Option<CollapseDirection> {
        let (t, end) = {
            let e = self.segment.get(id)?;
            if !e.is_rest() {
                return None;
            }
            (e.absolute_time(), e.end_time())
        };

        if let Some(nid) = self.rest_starting_at(end) {
            let merged_end = self.segment.get(nid)?.end_time();
            if self.merge_span_ok(t, merged_end) {
                self.segment.erase(nid);
                let original = self.segment.erase(id)?;
                self.segment
                    .insert(original.copy_with_times(t, merged_end - t));
                return Some(CollapseDirection::Forward);
            }
        }

        if let Some(pid) = self.rest_ending_at(t) {
            let p_start = self.segment.get(pid)?.absolute_time();
            if self.merge_span_ok(p_start, end) {
                self.segment.erase(id);
                let previous = self.segment.erase(pid)?;
                self.segment
                    .insert(previous.copy_with_times(p_start, end - p_start));
                return Some(CollapseDirection::Backward);
            }
        }

        None
    }

    fn rest_starting_at(&self, time: TimeT) -> Option<EventId> {
        self.segment
            .time_slice(time)
            .filter_map(|pos| self.segment.id_at(pos))
            .find(|&id| self.segment.get(id).map(Event::is_rest).unwrap_or(false))
    }

    fn rest_ending_at(&self, time: TimeT) -> Option<EventId> {
        let mut pos = self.segment.find_time(time);
        while pos > 0 {
            pos -= 1;
            let id = self.segment.id_at(pos)?;
            let e = self.segment.get(id)?;
            if e.is_rest() && e.end_time() == time {
                return Some(id);
            }
        }
        None
    }

    /// A merged rest span is acceptable when it does not cross a barline,
    /// or starts on a barline and ends on one (whole bars).
    fn merge_span_ok(&self, start: TimeT, end: TimeT) -> bool {
        let bar_end = self.segment.bar_end_for_time(start);
        if end <= bar_end {
            return true;
        }
        if start != self.segment.bar_start_for_time(start) {
            return false;
        }
        let mut t = start;
        while t < end {
            t = self.segment.bar_end_for_time(t);
        }
        t == end
    }

    // --- insertion ---

    /// Insert a note at `time`, which must already be occupied by a note
    /// or rest (the typed-hole model). A note starting exactly at `time`
    /// makes this a chord-member insert. A rest hole is carved: borrow
    /// from following rests if the hole is too small (clipping to what is
    /// available), return the excess as a trailing rest, then split the
    /// note for viability and at barlines. Returns the first event of the
    /// inserted chain.
    pub fn insert_note(
        &mut self,
        time: TimeT,
        note_duration: TimeT,
        pitch: i64,
        accidental: Accidental,
    ) -> Result<EventId> {
        self.insert_something(time, note_duration, move |t, d| {
            let mut e = Event::new(EventKind::Note, t, d);
            e.set_pitch(pitch);
            e.set_accidental(accidental);
            e
        })
    }

    /// Insert a rest at `time` under the same typed-hole rules as
    /// `insert_note`. Mostly re-carves existing rest coverage.
    pub fn insert_rest(&mut self, time: TimeT, rest_duration: TimeT) -> Result<EventId> {
        self.insert_something(time, rest_duration, |t, d| Event::new(EventKind::Rest, t, d))
    }

    /// The general typed-hole insertion algorithm; `make` is the
    /// strategy producing the event for the carved span.
    fn insert_something(
        &mut self,
        time: TimeT,
        wanted: TimeT,
        make: impl Fn(TimeT, TimeT) -> Event,
    ) -> Result<EventId> {
        if wanted <= 0 {
            return Err(EditError::NonPositiveDuration(wanted));
        }

        // Chord-member insert: a note already starts exactly here.
        let note_here = self
            .segment
            .time_slice(time)
            .filter_map(|pos| self.segment.id_at(pos))
            .any(|id| self.segment.get(id).map(Event::is_note).unwrap_or(false));
        if note_here {
            let probe = make(time, wanted);
            if probe.is_note() {
                let id = self.segment.insert(probe);
                return self.make_this_note_viable(id, true);
            }
        }

        // Otherwise we need a rest hole covering `time`.
        let mut hole_id = self.rest_covering(time).ok_or(EditError::NoEventAtTime(time))?;

        let hole_start = self
            .segment
            .get(hole_id)
            .ok_or(EditError::NoSuchEvent)?
            .absolute_time();
        if hole_start < time {
            let (_, right) = self.split_event_into_tie(hole_id, time - hole_start)?;
            hole_id = right;
        }

        hole_id = self.collapse_rests_for_insert(hole_id, wanted);
        let available = self
            .segment
            .get(hole_id)
            .ok_or(EditError::NoSuchEvent)?
            .duration();
        let actual = wanted.min(available);
        if actual < wanted {
            log::debug!(
                "insert at {}: clipping duration {} to available rest space {}",
                time,
                wanted,
                actual
            );
        }

        self.segment.erase(hole_id);
        let id = self.segment.insert(make(time, actual));
        if available > actual {
            self.segment
                .insert(Event::new(EventKind::Rest, time + actual, available - actual));
        }
        self.make_this_note_viable(id, true)
    }

    /// The note-or-rest event whose span contains `time` (rest holes
    /// only; a note covering `time` without starting there blocks
    /// insertion).
    fn rest_covering(&self, time: TimeT) -> Option<EventId> {
        let mut found = None;
        for (id, e) in self.segment.iter() {
            if e.absolute_time() > time {
                break;
            }
            if e.is_rest() && e.absolute_time() <= time && e.end_time() > time {
                found = Some(id);
            }
        }
        found
    }

    /// Grow a rest hole by swallowing immediately following rests until
    /// it can hold `needed` ticks or no rest follows. Unlike
    /// `collapse_rests_if_valid` this ignores barlines: the insertion
    /// result is re-split at bars afterwards.
    fn collapse_rests_for_insert(&mut self, mut hole_id: EventId, needed: TimeT) -> EventId {
        loop {
            let (t, d, end) = match self.segment.get(hole_id) {
                Some(e) => (e.absolute_time(), e.duration(), e.end_time()),
                None => return hole_id,
            };
            if d >= needed {
                return hole_id;
            }
            let Some(next) = self.rest_starting_at(end) else {
                return hole_id;
            };
            let next_end = match self.segment.get(next) {
                Some(e) => e.end_time(),
                None => return hole_id,
            };
            self.segment.erase(next);
            let original = match self.segment.erase(hole_id) {
                Some(e) => e,
                None => return hole_id,
            };
            hole_id = self.segment.insert(original.copy_with_times(t, next_end - t));
        }
    }

    // --- deletion ---

    /// Delete a note, replacing its span with a rest unless another note
    /// at the same time still covers it. Neighboring tie flags are
    /// repaired uniformly: the predecessor loses TiedForward, the
    /// successor loses TiedBackward. With `collapse_rest`, the new rest
    /// is merged into a neighbor where valid.
    pub fn delete_note(&mut self, id: EventId, collapse_rest: bool) -> Result<()> {
        let (t, d, end, tied_back, tied_fwd) = {
            let e = self.segment.get(id).ok_or(EditError::NoSuchEvent)?;
            if !e.is_note() {
                return Err(EditError::NotANote);
            }
            (
                e.absolute_time(),
                e.duration(),
                e.end_time(),
                e.tied_backward(),
                e.tied_forward(),
            )
        };

        if tied_back {
            if let Some(pid) = self.previous_adjacent_note(id, true, false) {
                if let Some(p) = self.segment.event_mut(pid) {
                    p.set_tied_forward(false);
                }
            }
        }
        if tied_fwd {
            if let Some(nid) = self.next_adjacent_note(id, true, false) {
                if let Some(n) = self.segment.event_mut(nid) {
                    n.set_tied_backward(false);
                }
            }
        }

        let has_covering_chord_mate = self
            .segment
            .time_slice(t)
            .filter_map(|pos| self.segment.id_at(pos))
            .any(|other| {
                other != id
                    && self
                        .segment
                        .get(other)
                        .map(|e| e.is_note() && e.end_time() >= end)
                        .unwrap_or(false)
            });

        self.segment.erase(id).ok_or(EditError::NoSuchEvent)?;

        if !has_covering_chord_mate && d > 0 {
            let rest_id = self.segment.insert(Event::new(EventKind::Rest, t, d));
            if collapse_rest {
                self.collapse_rests_if_valid(rest_id);
            }
        }
        Ok(())
    }

    /// Delete a rest by merging it into an adjacent rest. Returns false
    /// (segment unchanged) when the handle is stale, not a rest, or no
    /// neighbor can absorb the span.
    pub fn delete_rest(&mut self, id: EventId) -> bool {
        match self.segment.get(id) {
            Some(e) if e.is_rest() => self.collapse_rests_if_valid(id).is_some(),
            _ => false,
        }
    }

    /// Kind-dispatching delete. Non-note, non-rest events (clefs, keys,
    /// texts, indications) are simply erased.
    pub fn delete_event(&mut self, id: EventId, collapse_rest: bool) -> bool {
        match self.segment.get(id).map(|e| e.kind().clone()) {
            Some(EventKind::Note) => self.delete_note(id, collapse_rest).is_ok(),
            Some(EventKind::Rest) => self.delete_rest(id),
            Some(_) => self.segment.erase(id).is_some(),
            None => false,
        }
    }

    // --- grouping ---

    /// Tag every note/rest starting in `[from, to)` with a fresh shared
    /// group id and the given type. Returns the id, or `None` if the
    /// range holds no note or rest.
    pub fn make_beamed_group(&mut self, from: TimeT, to: TimeT, group_type: &str) -> Option<i64> {
        let ids: Vec<EventId> = self
            .segment
            .iter()
            .filter(|(_, e)| {
                e.is_note_or_rest() && e.absolute_time() >= from && e.absolute_time() < to
            })
            .map(|(id, _)| id)
            .collect();
        if ids.is_empty() {
            return None;
        }
        let gid = self.segment.allocate_group_id();
        self.tag_group(&ids, gid, group_type);
        Some(gid)
    }

    fn tag_group(&mut self, ids: &[EventId], gid: i64, group_type: &str) {
        for &id in ids {
            if let Some(e) = self.segment.event_mut(id) {
                e.set(PropertyKey::BeamedGroupId, PropertyValue::Int(gid));
                e.set(
                    PropertyKey::BeamedGroupType,
                    PropertyValue::Text(group_type.to_string()),
                );
            }
        }
    }

    /// Compress the contiguous run of notes starting at `time` into
    /// tuplet time: durations and offsets scale by `tupled / untupled`
    /// exactly, every note is tagged with a shared group id, type
    /// "tupled", the tupled/untupled counts and the notated base `unit`,
    /// and the freed time becomes one trailing rest. Returns the group
    /// id.
    pub fn make_tuplet_group(
        &mut self,
        time: TimeT,
        untupled: u32,
        tupled: u32,
        unit: TimeT,
    ) -> Result<i64> {
        if untupled == 0 || tupled == 0 {
            return Err(EditError::EmptyRange);
        }

        // Gather the maximal contiguous note run: every note starting at
        // the running cursor, advancing past the longest of each chord.
        let mut run: Vec<EventId> = Vec::new();
        let mut cursor = time;
        loop {
            let chord: Vec<EventId> = self
                .segment
                .time_slice(cursor)
                .filter_map(|pos| self.segment.id_at(pos))
                .filter(|&id| self.segment.get(id).map(Event::is_note).unwrap_or(false))
                .collect();
            let Some(next) = chord
                .iter()
                .filter_map(|&id| self.segment.get(id))
                .map(Event::end_time)
                .max()
            else {
                break;
            };
            run.extend(chord);
            // A zero-duration chord (grace notes) cannot advance the run.
            if next <= cursor {
                break;
            }
            cursor = next;
        }
        if run.is_empty() {
            return Err(EditError::NoEventAtTime(time));
        }
        let old_end = cursor;

        let ratio = Ratio::new(tupled as i64, untupled as i64);
        let scale = |t: TimeT| -> TimeT {
            let scaled = Ratio::from_integer(t - time) * ratio;
            time + scaled.round().to_integer()
        };

        let gid = self.segment.allocate_group_id();
        log::debug!(
            "make_tuplet_group: {} events at {} scaled by {}/{}",
            run.len(),
            time,
            tupled,
            untupled
        );

        for id in run {
            let original = self.segment.erase(id).ok_or(EditError::NoSuchEvent)?;
            let new_start = scale(original.absolute_time());
            let new_dur = scale(original.end_time()) - new_start;
            let mut e = original.copy_with_times(new_start, new_dur);
            e.set(PropertyKey::BeamedGroupId, PropertyValue::Int(gid));
            e.set(
                PropertyKey::BeamedGroupType,
                PropertyValue::Text(GROUP_TYPE_TUPLED.to_string()),
            );
            e.set(
                PropertyKey::BeamedGroupTupledCount,
                PropertyValue::Int(tupled as i64),
            );
            e.set(
                PropertyKey::BeamedGroupUntupledCount,
                PropertyValue::Int(untupled as i64),
            );
            e.set(PropertyKey::BeamedGroupTupletBase, PropertyValue::Int(unit));
            self.segment.insert(e);
        }

        let new_end = scale(old_end);
        if new_end < old_end {
            self.segment
                .insert(Event::new(EventKind::Rest, new_end, old_end - new_end));
        }
        Ok(gid)
    }

    /// Beam each bar overlapping `[from, to)` by its natural beats: runs
    /// of two or more consecutive beamable notes (shorter than a
    /// crotchet) within one beat become a group; a note spanning beats
    /// breaks the group and stays unbeamed.
    pub fn auto_beam(&mut self, from: TimeT, to: TimeT) {
        let crotchet = NoteValue::Crotchet.duration();
        let mut bar_start = self.segment.bar_start_for_time(from);

        while bar_start < to {
            let (_, sig) = self.segment.timeline().time_signature_at(bar_start);
            let bar_end = bar_start + sig.bar_duration();
            let beat = sig.beat_duration();

            // Snapshot, then tag: grouping decisions must not fight the
            // borrow of the iteration.
            let notes: Vec<(EventId, TimeT, TimeT, TimeT)> = self
                .segment
                .iter()
                .filter(|(_, e)| {
                    e.absolute_time() >= bar_start.max(from) && e.absolute_time() < bar_end.min(to)
                })
                .map(|(id, e)| {
                    (
                        id,
                        e.absolute_time(),
                        e.end_time(),
                        if e.is_note() { e.duration() } else { -1 },
                    )
                })
                .collect();

            let mut groups: Vec<Vec<EventId>> = Vec::new();
            let mut current: Vec<EventId> = Vec::new();
            let mut current_beat: Option<TimeT> = None;

            for (id, start, end, note_dur) in notes {
                let beamable = note_dur > 0 && note_dur < crotchet;
                let start_beat = (start - bar_start) / beat;
                let end_beat = (end - 1 - bar_start) / beat;

                if !beamable || start_beat != end_beat {
                    // Rests, long notes, and beat-spanning notes all
                    // close the open group.
                    if current.len() >= 2 {
                        groups.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                    current_beat = None;
                    continue;
                }

                match current_beat {
                    Some(b) if b == start_beat => current.push(id),
                    _ => {
                        if current.len() >= 2 {
                            groups.push(std::mem::take(&mut current));
                        } else {
                            current.clear();
                        }
                        current.push(id);
                        current_beat = Some(start_beat);
                    }
                }
            }
            if current.len() >= 2 {
                groups.push(current);
            }

            for group in groups {
                let gid = self.segment.allocate_group_id();
                self.tag_group(&group, gid, GROUP_TYPE_BEAMED);
            }

            bar_start = bar_end;
        }
    }

    // --- rest removal ---

    /// Remove pure-rest time starting at `time` for `*duration` ticks,
    /// splitting a final rest that extends past the span. If anything
    /// other than rest coverage is encountered first, nothing changes,
    /// `*duration` is rewritten to the span that would succeed, and the
    /// call returns false. With `test_only`, a feasible request also
    /// leaves the segment unchanged (probe mode).
    pub fn remove_rests(&mut self, time: TimeT, duration: &mut TimeT, test_only: bool) -> bool {
        let requested_end = time + *duration;
        let mut t = time;
        let mut to_erase: Vec<EventId> = Vec::new();
        let mut to_split: Option<EventId> = None;

        while t < requested_end {
            let rests_here: Vec<(EventId, TimeT)> = self
                .segment
                .time_slice(t)
                .filter_map(|pos| self.segment.id_at(pos))
                .filter_map(|id| {
                    self.segment
                        .get(id)
                        .filter(|e| e.is_rest())
                        .map(|e| (id, e.end_time()))
                })
                .collect();

            // Zero-length rests at t are swept up without advancing; the
            // scan moves on the first rest with real extent.
            let mut advance: Option<(EventId, TimeT)> = None;
            for (id, end) in rests_here {
                if end <= t {
                    to_erase.push(id);
                } else if advance.is_none() {
                    advance = Some((id, end));
                }
            }

            match advance {
                Some((id, end)) if end <= requested_end => {
                    to_erase.push(id);
                    t = end;
                }
                Some((id, _)) => {
                    to_split = Some(id);
                    t = requested_end;
                }
                None => {
                    // Note, gap, or other coverage: report how far we got.
                    *duration = t - time;
                    return false;
                }
            }
        }

        if test_only {
            return true;
        }

        for id in to_erase {
            self.segment.erase(id);
        }
        if let Some(id) = to_split {
            if let Some(original) = self.segment.erase(id) {
                let tail = original.copy_with_times(
                    requested_end,
                    original.end_time() - requested_end,
                );
                self.segment.insert(tail);
            }
        }
        true
    }

    // --- aggressive merge ---

    /// Merge a note with the next adjacent (possibly overlapping)
    /// same-pitch note, provided both agree on grace-note expansion and
    /// the neighbor starts before `range_end`. The merged duration is
    /// not re-split for viability; callers wanting written notation run
    /// `make_notes_viable` afterwards. Returns the merged event.
    pub fn collapse_note_aggressively(
        &mut self,
        id: EventId,
        range_end: TimeT,
    ) -> Option<EventId> {
        let next = self.next_adjacent_note(id, true, true)?;

        let (t, e_end, e_grace) = {
            let e = self.segment.get(id)?;
            (
                e.absolute_time(),
                e.end_time(),
                e.get(&PropertyKey::GraceNote).cloned(),
            )
        };
        let (n_start, n_end, n_grace, n_tied_fwd) = {
            let n = self.segment.get(next)?;
            (
                n.absolute_time(),
                n.end_time(),
                n.get(&PropertyKey::GraceNote).cloned(),
                n.tied_forward(),
            )
        };

        if n_start >= range_end || e_grace != n_grace {
            return None;
        }

        self.segment.erase(next);
        let first = self.segment.erase(id)?;
        let mut merged = first.copy_with_times(t, e_end.max(n_end) - t);
        merged.set_tied_forward(n_tied_fwd);
        Some(self.segment.insert(merged))
    }
}
