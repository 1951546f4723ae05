//! Selections stay consistent with their segment through the observer
//! protocol, and tie-chasing selects whole chains.

use editor_core::models::event::{note, rest};
use editor_core::{EventId, EventKind, EventSelection, Segment, SegmentEditor, TimeT};

fn tie_chain(segment: &mut Segment, pitch: i64, starts: &[TimeT], dur: TimeT) -> Vec<EventId> {
    let mut ids = Vec::new();
    for (i, &t) in starts.iter().enumerate() {
        let mut e = note(t, dur, pitch);
        if i + 1 < starts.len() {
            e.set_tied_forward(true);
        }
        if i > 0 {
            e.set_tied_backward(true);
        }
        ids.push(segment.insert(e));
    }
    ids
}

#[test]
fn tie_chase_selects_whole_chain_from_any_member() {
    let mut s = Segment::new();
    let chain = tie_chain(&mut s, 60, &[0, 480, 960, 1440], 480);

    for &member in &chain {
        let mut sel = EventSelection::new(&s);
        sel.add_event(&s, member, true, true);
        assert_eq!(sel.len(), 4, "chain incomplete starting from {:?}", member);
        for &id in &chain {
            assert!(sel.contains(id));
        }
    }
}

#[test]
fn tie_chase_ignores_interleaved_other_pitches() {
    let mut s = Segment::new();
    let chain = tie_chain(&mut s, 60, &[0, 480], 480);
    let other = s.insert(note(0, 480, 64)); // chord mate, different pitch

    let mut sel = EventSelection::new(&s);
    sel.add_event(&s, chain[0], true, true);
    assert_eq!(sel.len(), 2);
    assert!(!sel.contains(other));
}

#[test]
fn erase_removes_from_every_bound_selection() {
    let mut s = Segment::new();
    let a = s.insert(note(0, 480, 60));
    let b = s.insert(note(480, 480, 62));

    let mut sel1 = EventSelection::new(&s);
    let mut sel2 = EventSelection::new(&s);
    sel1.add_event(&s, a, false, true);
    sel1.add_event(&s, b, false, true);
    sel2.add_event(&s, a, false, true);

    s.erase(a);
    assert!(!sel1.contains(a));
    assert!(!sel2.contains(a));
    assert!(sel1.contains(b));
    assert_eq!(sel1.len(), 1);
    assert!(sel2.is_empty());
}

#[test]
fn editor_operations_propagate_to_selections() {
    let mut s = Segment::new();
    let n = s.insert(note(480, 480, 60));
    let mut sel = EventSelection::new(&s);
    sel.add_event(&s, n, false, true);

    let mut ed = SegmentEditor::new(&mut s);
    ed.delete_note(n, false).unwrap();
    assert!(!sel.contains(n), "deletion must reach the selection synchronously");
}

#[test]
fn removal_does_not_cascade_through_ties() {
    let mut s = Segment::new();
    let chain = tie_chain(&mut s, 60, &[0, 480, 960], 480);

    let mut sel = EventSelection::new(&s);
    sel.add_event(&s, chain[0], true, true);
    assert_eq!(sel.len(), 3);

    // Erasing one note from the segment removes exactly that note
    s.erase(chain[1]);
    assert_eq!(sel.len(), 2);
    assert!(sel.contains(chain[0]) && sel.contains(chain[2]));
}

#[test]
fn explicit_remove_event_chases_ties() {
    let mut s = Segment::new();
    let chain = tie_chain(&mut s, 60, &[0, 480, 960], 480);

    let mut sel = EventSelection::new(&s);
    sel.add_event(&s, chain[1], true, true);
    assert_eq!(sel.len(), 3);

    let removed = sel.remove_event(&s, chain[1], true, true);
    assert_eq!(removed, 2, "the note itself plus the forward chain");
    // Both directions are chased; only the requested one is counted
    assert!(sel.is_empty());
}

#[test]
fn from_range_and_kind_queries() {
    let mut s = Segment::new();
    s.insert(note(0, 480, 60));
    s.insert(rest(480, 480));
    s.insert(note(960, 480, 62));

    let sel = EventSelection::from_range(&s, 0, 960, false);
    assert_eq!(sel.len(), 2);
    assert!(sel.contains_kind(&s, &EventKind::Rest));
    assert!(!sel.contains_kind(&s, &EventKind::Clef));
    assert_eq!((sel.start_time(), sel.end_time()), (0, 960));
}

#[test]
fn range_times_reflect_contiguous_runs() {
    let mut s = Segment::new();
    let a = s.insert(note(0, 480, 60));
    s.insert(note(480, 480, 62));
    let c = s.insert(note(960, 480, 64));

    let mut sel = EventSelection::new(&s);
    sel.add_event(&s, a, false, true);
    sel.add_event(&s, c, false, true);

    assert_eq!(sel.range_times(&s), vec![(0, 480), (960, 1440)]);
}

#[test]
fn selection_survives_segment_drop() {
    let s = Segment::new();
    let sel = EventSelection::new(&s);
    drop(s);
    assert!(sel.is_empty());
}
