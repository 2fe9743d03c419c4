use crate::{
    constants::EARTH_ANGULAR_VEL_RAD_S,
    prelude::{
        Ephemeris, GpsTime, InsFilter, Llh, Observation, ObservationSet, SpaceNode,
    },
};

/// GPS like semi major axis square root (√m)
pub(crate) const SQRT_A: f64 = 5153.55;

/// Circular equatorial orbit whose ascending node cancels the Earth
/// rotation term at `t` = (week, t_oe): the satellite sits at in-plane
/// angle `m0_rad` in ECEF, easy to reason about from a receiver at
/// latitude 0, longitude 0.
pub(crate) fn equatorial_ephemeris(svid: u8, t: &GpsTime, m0_rad: f64) -> Ephemeris {
    Ephemeris {
        svid,
        week: t.week as u32,
        t_oc_s: t.seconds,
        t_oe_s: t.seconds,
        sqrt_a: SQRT_A,
        m0_rad,
        omega0_rad: EARTH_ANGULAR_VEL_RAD_S * t.seconds,
        fit_interval_s: 4.0 * 3600.0,
        ..Default::default()
    }
}

/// Space node with three satellites in sight of a receiver at the
/// geodetic origin: one at zenith, two at about 35 degree elevation.
pub(crate) fn equatorial_scenario(t: &GpsTime) -> SpaceNode {
    let mut space_node = SpaceNode::new();
    for (prn, m0) in [(5_u8, 0.0), (11, 0.698), (23, -0.698)] {
        space_node
            .satellite(prn)
            .register_ephemeris(equatorial_ephemeris(prn, t, m0), 1);
    }
    space_node.update_all_ephemeris(t);
    space_node
}

/// Receiver sitting at the geodetic origin, with a plausible uncertainty:
/// meters of position knowledge, a wide open clock channel.
pub(crate) fn origin_filter(cfg: &crate::prelude::Config) -> InsFilter<1> {
    let mut filter = InsFilter::<1>::new(cfg);
    filter.ins_mut().set_position(&Llh::new(0.0, 0.0, 0.0), 0.0);

    let p_size = InsFilter::<1>::P_SIZE;
    let mut p = nalgebra::DMatrix::<f64>::zeros(p_size, p_size);
    for i in 0..3 {
        p[(i, i)] = 0.01; // (0.1 m/s)²
    }
    for i in 3..6 {
        p[(i, i)] = 1.0E-12; // quaternion error, about 13 m on ground
    }
    p[(6, 6)] = 100.0; // (10 m)²
    for i in 7..10 {
        p[(i, i)] = 1.0E-6;
    }
    p[(10, 10)] = 1.0E12; // clock error wide open
    p[(11, 11)] = 100.0; // (10 m/s)²
    filter.set_covariance(p);

    filter
}

/// The pseudo range a perfect receiver (zero clock error) would sample:
/// iterated until the filter residual vanishes, so atmospheric models
/// and Sagnac compensation are consistently included.
pub(crate) fn geometric_pseudorange(
    filter: &InsFilter<1>,
    space_node: &SpaceNode,
    prn: u8,
    t: &GpsTime,
) -> f64 {
    let mut pseudo_range = 2.0E7;
    for _ in 0..10 {
        let mut observations = ObservationSet::new(*t, 0);
        observations.insert(prn, Observation::from_pseudo_range(pseudo_range));
        let info = filter.correct_info(space_node, &observations, 0.0);
        assert_eq!(info.rows(), 1, "satellite {} did not contribute", prn);
        pseudo_range -= info.z[0];
    }
    pseudo_range
}
