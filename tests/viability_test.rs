//! Viability: which durations are writable as one note value with a
//! bounded number of augmentation dots, and how unwritable durations
//! decompose into tied chains.

use editor_core::models::duration::{dotted_duration, is_viable};
use editor_core::models::event::{note, rest};
use editor_core::{NoteValue, Segment, SegmentEditor, TimeT};

#[test]
fn is_viable_matches_enumeration() {
    for max_dots in 0..=2u8 {
        // Every duration a single dotted note value can have
        let mut writable = std::collections::BTreeSet::new();
        for value in NoteValue::ALL {
            for dots in 0..=max_dots {
                if let Some(d) = dotted_duration(value.duration(), dots) {
                    writable.insert(d);
                }
            }
        }
        for d in 1..=3840 {
            assert_eq!(
                is_viable(d, max_dots),
                writable.contains(&d),
                "is_viable({}, {}) disagrees with enumeration",
                d,
                max_dots
            );
        }
    }
}

#[test]
fn fractional_dot_durations_are_not_viable() {
    // A double-dotted hemidemisemiquaver would be 52.5 ticks
    assert!(is_viable(30, 2));
    assert!(is_viable(45, 2));
    assert!(!is_viable(52, 2));
    assert!(!is_viable(53, 2));
}

fn assert_viable_chain(segment: &Segment, expect_total: TimeT, notes: bool) {
    let events: Vec<_> = segment.iter().map(|(_, e)| e.clone()).collect();
    let total: TimeT = events.iter().map(|e| e.duration()).sum();
    assert_eq!(total, expect_total, "chain durations must sum to the original");

    for (i, e) in events.iter().enumerate() {
        let last = i + 1 == events.len();
        if notes {
            assert_eq!(e.tied_forward(), !last, "interior pieces tie forward");
            assert_eq!(e.tied_backward(), i != 0, "interior pieces tie backward");
        } else {
            assert!(!e.tied_forward() && !e.tied_backward(), "rests never tie");
        }
    }
}

#[test]
fn make_viable_produces_tied_chain_summing_to_original() {
    for d in [600, 700, 1000, 1100] {
        let mut s = Segment::new();
        let id = s.insert(note(0, d, 60));
        let mut ed = SegmentEditor::new(&mut s);
        let first = ed.make_this_note_viable(id, false).unwrap();
        assert_eq!(s.get(first).unwrap().absolute_time(), 0);
        assert_viable_chain(&s, d, true);
        for (_, e) in s.iter() {
            assert!(is_viable(e.duration(), 2), "piece {} not viable", e.duration());
        }
    }
}

#[test]
fn make_viable_leaves_viable_event_alone() {
    let mut s = Segment::new();
    let id = s.insert(note(0, 720, 60)); // dotted crotchet
    let mut ed = SegmentEditor::new(&mut s);
    let first = ed.make_this_note_viable(id, false).unwrap();
    assert_eq!(first, id);
    assert_eq!(s.len(), 1);
}

#[test]
fn rest_chain_carries_no_ties() {
    let mut s = Segment::new();
    let id = s.insert(rest(0, 1000));
    let mut ed = SegmentEditor::new(&mut s);
    ed.make_this_note_viable(id, false).unwrap();
    assert_viable_chain(&s, 1000, false);
}

#[test]
fn split_then_merge_reconstructs_original() {
    let mut s = Segment::new();
    let mut original = note(0, 480, 60);
    original.set_accidental(editor_core::Accidental::Sharp);
    s.insert(original);

    let mut ed = SegmentEditor::new(&mut s);
    let first = ed.split_into_tie(0, 180).unwrap();
    assert_eq!(s.len(), 2);

    let mut ed = SegmentEditor::new(&mut s);
    let merged = ed.collapse_note_aggressively(first, 1920).unwrap();

    let e = s.get(merged).unwrap();
    assert_eq!(e.duration(), 480);
    assert_eq!(e.pitch(), Some(60));
    assert_eq!(e.accidental(), editor_core::Accidental::Sharp);
    assert!(!e.tied_forward() && !e.tied_backward());
}

#[test]
fn split_into_tie_splits_whole_chord() {
    let mut s = Segment::new();
    s.insert(note(0, 480, 60));
    s.insert(note(0, 480, 64));
    let mut ed = SegmentEditor::new(&mut s);
    ed.split_into_tie(0, 240).unwrap();

    assert_eq!(s.len(), 4);
    let at_zero = s.time_slice(0).len();
    let at_half = s.time_slice(240).len();
    assert_eq!((at_zero, at_half), (2, 2));
    for (_, e) in s.iter() {
        assert_eq!(e.duration(), 240);
    }
}
