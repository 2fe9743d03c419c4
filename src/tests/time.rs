use crate::prelude::{Epoch, GpsTime, TimeScale};

#[test]
fn epoch_roundtrip_is_idempotent() {
    for epoch in [
        Epoch::from_gregorian(2020, 6, 15, 12, 30, 45, 0, TimeScale::GPST),
        Epoch::from_gregorian(1999, 12, 31, 23, 59, 59, 0, TimeScale::GPST),
        Epoch::from_gregorian(2016, 2, 29, 0, 0, 0, 0, TimeScale::GPST),
        Epoch::from_gregorian(1980, 1, 6, 0, 0, 0, 0, TimeScale::GPST),
    ] {
        let t = GpsTime::from_epoch(epoch);
        let back = t.to_epoch();
        let error_s = (back - epoch).to_seconds().abs();
        assert!(error_s < 1E-6, "{} roundtrip error {} s", epoch, error_s);
    }
}

#[test]
fn gps_epoch_is_week_zero() {
    let t = GpsTime::from_epoch(Epoch::from_gregorian(1980, 1, 6, 0, 0, 0, 0, TimeScale::GPST));
    assert_eq!(t.week, 0);
    assert!(t.seconds < 1E-6);
}

#[test]
fn leap_year_crossing() {
    // 2016 is a leap year: Feb 29 exists and Mar 1 is one day later
    let feb29 = GpsTime::from_epoch(Epoch::from_gregorian(2016, 2, 29, 0, 0, 0, 0, TimeScale::GPST));
    let mar1 = GpsTime::from_epoch(Epoch::from_gregorian(2016, 3, 1, 0, 0, 0, 0, TimeScale::GPST));
    assert!((mar1 - feb29 - 86_400.0).abs() < 1E-6);
}

#[test]
fn arithmetic_restores_invariant() {
    let mut t = GpsTime::new(2100, 604_799.0);
    t += 2.0;
    assert_eq!(t.week, 2101);
    assert!((t.seconds - 1.0).abs() < 1E-9);

    t -= 2.0;
    assert_eq!(t.week, 2100);
    assert!((t.seconds - 604_799.0).abs() < 1E-9);

    assert!(GpsTime::new(2100, 100.0) < GpsTime::new(2100, 200.0));
    assert!(GpsTime::new(2101, 0.0) > GpsTime::new(2100, 604_799.0));
}

#[test]
fn utc_epoch_with_leap_offset() {
    let utc = Epoch::from_gregorian_utc(2020, 6, 15, 12, 0, 0, 0);
    let without = GpsTime::from_utc_epoch(utc, 0.0);
    let with = GpsTime::from_utc_epoch(utc, 18.0);
    assert!((with - without - 18.0).abs() < 1E-6);
}
