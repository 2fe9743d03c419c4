use crate::{
    prelude::{EphemerisHistory, GpsTime, IterationOrder},
    tests::data::equatorial_ephemeris,
};

fn frame(week: i32, toc_s: f64, a_f0: f64) -> crate::prelude::Ephemeris {
    let t = GpsTime::new(week, toc_s);
    let mut eph = equatorial_ephemeris(1, &t, 0.0);
    // well beyond one LSB: distinct broadcast content
    eph.a_f0 = a_f0;
    eph
}

#[test]
fn equivalent_addition_merges() {
    let mut history = EphemerisHistory::default();
    let eph = frame(2000, 7200.0, 1E-4);

    history.add(eph, 1);
    history.add(eph, 1);
    assert_eq!(history.len(), 1, "equivalent frames merge");

    // replacement addition does not duplicate either
    history.add(eph, 0);
    assert_eq!(history.len(), 1);
}

#[test]
fn bucket_priority_ordering() {
    let mut history = EphemerisHistory::default();

    let low = frame(2000, 7200.0, 1E-4);
    let high = frame(2000, 7200.0, 2E-4);
    let late = frame(2000, 14_400.0, 1E-4);

    history.add(low, 1);
    history.add(high, 2);
    history.add(late, 1);
    assert_eq!(history.len(), 3);

    let mut all = Vec::new();
    history.each(IterationOrder::All, |eph| all.push(eph.a_f0));
    assert_eq!(all, vec![2E-4, 1E-4, 1E-4], "descending priority per bucket");

    let mut inverted = Vec::new();
    history.each(IterationOrder::AllInverted, |eph| inverted.push(eph.a_f0));
    assert_eq!(inverted, vec![1E-4, 2E-4, 1E-4]);

    let mut distinct = Vec::new();
    history.each(IterationOrder::NoRedundant, |eph| distinct.push(eph.a_f0));
    assert_eq!(distinct, vec![2E-4, 1E-4], "one frame per bucket");
}

#[test]
fn repeated_reception_promotes() {
    let mut history = EphemerisHistory::default();

    let first = frame(2000, 7200.0, 1E-4);
    let second = frame(2000, 7200.0, 2E-4);

    history.add(first, 1);
    history.add(second, 1);

    // one more reception of `first` raises it above `second`
    history.add(first, 1);

    let mut distinct = Vec::new();
    history.each(IterationOrder::NoRedundant, |eph| distinct.push(eph.a_f0));
    assert_eq!(distinct, vec![1E-4]);
}

#[test]
fn selection_survives_additions() {
    let mut history = EphemerisHistory::default();

    let selected_frame = frame(2000, 7200.0, 1E-4);
    history.add(selected_frame, 1);

    let target = GpsTime::new(2000, 7300.0);
    assert!(history.select(&target));
    assert_eq!(history.current().unwrap().a_f0, 1E-4);

    // an older bucket lands in front: the selection must follow
    history.add(frame(2000, 600.0, 3E-4), 1);
    assert_eq!(history.current().unwrap().a_f0, 1E-4);

    // a newer bucket lands behind: untouched
    history.add(frame(2000, 14_400.0, 4E-4), 1);
    assert_eq!(history.current().unwrap().a_f0, 1E-4);
}

#[test]
fn merge_preserves_order_and_selection() {
    let mut original = EphemerisHistory::default();
    original.add(frame(2000, 7200.0, 1E-4), 1);
    original.add(frame(2000, 14_400.0, 2E-4), 1);

    let target = GpsTime::new(2000, 7300.0);
    assert!(original.select(&target));
    let selected = original.current().unwrap().a_f0;

    let mut other = EphemerisHistory::default();
    other.add(frame(2000, 600.0, 3E-4), 1);
    other.add(frame(2000, 14_400.0, 2E-4), 5); // equivalent of an original frame
    other.add(frame(2000, 21_600.0, 4E-4), 1);

    original.merge(&other, true);

    // equivalent pair collapsed: 2 + 3 - 1
    assert_eq!(original.len(), 4);

    // chronological order held
    let mut toc = Vec::new();
    original.each(IterationOrder::NoRedundant, |eph| toc.push(eph.t_oc_s));
    assert_eq!(toc, vec![600.0, 7200.0, 14_400.0, 21_600.0]);

    // the selection still designates the same frame
    assert_eq!(original.current().unwrap().a_f0, selected);
}
