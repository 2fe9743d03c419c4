use nalgebra::{DMatrix, DVector, Vector3};

use crate::{
    constants::SPEED_OF_LIGHT_M_S,
    corrector::CorrectInfo,
    ins::INS_P_SIZE,
    prelude::{BackPropagate, Config, GpsTime, InsFilter, Observation, ObservationSet, RealTime, RtMode},
    tests::data::{equatorial_scenario, geometric_pseudorange, origin_filter},
};

const P_SIZE: usize = InsFilter::<1>::P_SIZE;

fn still() -> (Vector3<f64>, Vector3<f64>) {
    (Vector3::zeros(), Vector3::zeros())
}

/// One clock conditioning range row
fn clock_row_info(residual_m: f64) -> CorrectInfo {
    let mut h = DMatrix::zeros(1, P_SIZE);
    h[(0, INS_P_SIZE)] = -1.0;
    CorrectInfo {
        h,
        z: DVector::from_element(1, residual_m),
        r: DMatrix::from_element(1, 1, 1.0),
    }
}

#[test]
fn back_propagate_snapshot_ages_are_monotonic() {
    let cfg = Config::default();
    let mut estimator = BackPropagate::<1>::new(InsFilter::new(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..10 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    assert_eq!(estimator.snapshots(), 10);

    let ages = estimator.snapshot_ages();
    assert!((ages[0] - 0.01).abs() < 1E-12);
    assert!((ages[9] - 0.10).abs() < 1E-12);
    for w in ages.windows(2) {
        assert!(w[0] <= w[1], "ages must be non decreasing");
        assert!(w[0] >= 0.0);
    }
}

#[test]
fn back_propagate_depth_zero_walk() {
    let cfg = Config::default(); // depth 0
    let mut estimator = BackPropagate::<1>::new(InsFilter::new(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..10 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    // first correction: the newest snapshot is popped, corrected and
    // reinstated; nothing is erased (only 0.1 s of history)
    estimator.correct_with_info(&clock_row_info(10.0));
    assert_eq!(estimator.snapshots(), 10);

    let ages = estimator.snapshot_ages();
    assert!(ages.iter().all(|age| *age <= 1E-12), "all flagged back-propagated");
    assert!(ages[9].abs() < 1E-12);

    // second correction after more history: the already-propagated
    // snapshots are evicted
    for _ in 0..20 {
        estimator.time_update(&accel, &gyro, 0.01);
    }
    assert_eq!(estimator.snapshots(), 30);

    estimator.correct_with_info(&clock_row_info(5.0));
    assert_eq!(estimator.snapshots(), 21);
}

#[test]
fn back_propagate_without_history_skips() {
    let cfg = Config::default();
    let t = GpsTime::new(2200, 345_600.0);
    let space_node = equatorial_scenario(&t);

    let mut estimator = BackPropagate::<1>::new(origin_filter(&cfg), &cfg);

    let mut observations = ObservationSet::new(t, 0);
    observations.insert(5, Observation::from_pseudo_range(2.1E7));

    let before = estimator.filter().covariance().clone();
    estimator.correct(&space_node, &observations);

    // untouched
    assert_eq!(estimator.filter().covariance(), &before);
    assert_eq!(estimator.filter().clock_error_m(0), 0.0);
}

#[test]
fn back_propagate_correction_reaches_live_filter() {
    let cfg = Config::default();
    let t = GpsTime::new(2200, 345_600.0);
    let space_node = equatorial_scenario(&t);

    let mut estimator = BackPropagate::<1>::new(origin_filter(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..5 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    let mut observations = ObservationSet::new(t, 0);
    for prn in [5_u8, 11, 23] {
        let range = geometric_pseudorange(estimator.filter(), &space_node, prn, &t);
        observations.insert(prn, Observation::from_pseudo_range(range + 30.0));
    }

    estimator.correct(&space_node, &observations);

    // the live filter absorbed the common bias into its clock estimate
    assert!(estimator.filter().clock_error_m(0) > 1.0);
}

#[test]
fn back_propagate_clock_jump_shifts_everything() {
    let cfg = Config::default();
    let t = GpsTime::new(2200, 345_600.0);
    let space_node = equatorial_scenario(&t);

    let mut estimator = BackPropagate::<1>::new(origin_filter(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..5 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    let jump_m = SPEED_OF_LIGHT_M_S * 1E-3;
    let mut observations = ObservationSet::new(t, 0);
    for prn in [5_u8, 11, 23] {
        let range = geometric_pseudorange(estimator.filter(), &space_node, prn, &t);
        observations.insert(prn, Observation::from_pseudo_range(range + jump_m));
    }

    estimator.correct(&space_node, &observations);

    let clock_m = estimator.filter().clock_error_m(0);
    assert!(
        (clock_m - jump_m).abs() < 200.0,
        "clock error {} m, expected about {}",
        clock_m,
        jump_m
    );
}

#[test]
fn setup_correct_rejects_future_measurements() {
    let cfg = Config::default();
    let mut estimator = RealTime::<1>::new(InsFilter::new(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..10 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    assert!(!estimator.setup_correct(0.01));
    assert_eq!(estimator.snapshots(), 10, "nothing erased");
}

#[test]
fn setup_correct_brackets_the_measurement_epoch() {
    let cfg = Config::default();
    let mut estimator = RealTime::<1>::new(InsFilter::new(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..10 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    let advance_t = -0.02;
    assert!(estimator.setup_correct(advance_t));

    // the retained span matches the age of the measurement within 5 ms
    assert!((estimator.snapshot_span_s() - (-advance_t)).abs() <= 0.005);
    assert_eq!(estimator.snapshots(), 2);

    // a measurement older than the whole history is refused
    assert!(!estimator.setup_correct(-1.0));
}

#[test]
fn setup_correct_keeps_at_least_one_snapshot() {
    let cfg = Config::default();
    let mut estimator = RealTime::<1>::new(InsFilter::new(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..10 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    // measurement at "now": everything but the newest snapshot goes
    assert!(estimator.setup_correct(0.0));
    assert_eq!(estimator.snapshots(), 1);
}

#[test]
fn realtime_modes_match_on_a_single_snapshot() {
    let cfg = Config::default();
    let normal = {
        let mut rt = RealTime::<1>::new(InsFilter::new(&cfg), &cfg);
        let snapshot = rt.make_snapshot(
            DMatrix::zeros(P_SIZE, P_SIZE),
            DMatrix::identity(P_SIZE, P_SIZE),
            test_gqgt(),
            0.01,
        );
        rt.push_snapshot(snapshot);
        rt
    };

    let light = {
        let cfg = cfg.with_rt_mode(RtMode::LightWeight);
        let mut rt = RealTime::<1>::new(InsFilter::new(&cfg), &cfg);
        let snapshot = rt.make_snapshot(
            DMatrix::zeros(P_SIZE, P_SIZE),
            DMatrix::identity(P_SIZE, P_SIZE),
            test_gqgt(),
            0.01,
        );
        rt.push_snapshot(snapshot);
        rt
    };

    let mut info_normal = test_info();
    let mut info_light = test_info();

    normal.compensate(&mut info_normal);
    light.compensate(&mut info_light);

    // with one snapshot and A dT = 0, both algorithms are the same
    // arithmetic: results must agree to the bit
    assert_eq!(info_normal.h, info_light.h);
    assert_eq!(info_normal.r, info_light.r);
}

#[test]
fn realtime_normal_compensation_inflates_r() {
    let cfg = Config::default();
    let mut rt = RealTime::<1>::new(InsFilter::new(&cfg), &cfg);

    for _ in 0..3 {
        let snapshot = rt.make_snapshot(
            DMatrix::zeros(P_SIZE, P_SIZE),
            DMatrix::identity(P_SIZE, P_SIZE),
            test_gqgt(),
            0.01,
        );
        rt.push_snapshot(snapshot);
    }

    let mut info = test_info();
    let r_before = info.r[(0, 0)];
    rt.compensate(&mut info);

    // stale measurement: the uncertainty can only grow
    assert!(info.r[(0, 0)] > r_before);
}

#[test]
fn realtime_correction_from_aged_measurement() {
    let cfg = Config::default();
    let t = GpsTime::new(2200, 345_600.0);
    let space_node = equatorial_scenario(&t);

    let mut estimator = RealTime::<1>::new(origin_filter(&cfg), &cfg);

    let (accel, gyro) = still();
    for _ in 0..10 {
        estimator.time_update(&accel, &gyro, 0.01);
    }

    // the observation is 50 ms old
    assert!(estimator.setup_correct(-0.05));

    let mut observations = ObservationSet::new(t, 0);
    for prn in [5_u8, 11, 23] {
        let range = geometric_pseudorange(estimator.filter(), &space_node, prn, &t);
        observations.insert(prn, Observation::from_pseudo_range(range + 30.0));
    }

    estimator.correct(&space_node, &observations);

    assert!(estimator.filter().clock_error_m(0) > 1.0);
}

fn test_gqgt() -> DMatrix<f64> {
    // symmetric positive semi definite scratch
    let m = DMatrix::<f64>::from_fn(P_SIZE, P_SIZE, |i, j| ((i * 7 + j * 3) % 5) as f64 * 0.01);
    &m * m.transpose()
}

fn test_info() -> CorrectInfo {
    let h = DMatrix::<f64>::from_fn(1, P_SIZE, |_, j| (j as f64 * 0.37).sin());
    CorrectInfo {
        h,
        z: DVector::from_element(1, 25.0),
        r: DMatrix::from_element(1, 1, 4.0),
    }
}
