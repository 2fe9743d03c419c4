use std::f64::consts::PI;

use rstest::*;

use crate::{
    constants::SPEED_OF_LIGHT_M_S,
    prelude::{Enu, GpsTime, IonoUtcParameters, IonoUtcRaw, Llh, SpaceNode, Vector3},
    space_node::NiellMapping,
};

fn kb_space_node() -> SpaceNode {
    let mut space_node = SpaceNode::new();
    space_node.update_iono_utc(
        IonoUtcParameters {
            alpha: [1.1176E-8, 7.4506E-9, -5.9605E-8, -5.9605E-8],
            beta: [90_112.0, 0.0, -196_608.0, -65_536.0],
            ..Default::default()
        },
        true,
        false,
    );
    space_node
}

/// Slant direction at the requested elevation (rad), pointing North
fn slant(elevation_rad: f64) -> Enu {
    Enu(Vector3::new(0.0, elevation_rad.cos(), elevation_rad.sin()))
}

#[rstest]
#[case(5.0)]
#[case(15.0)]
#[case(35.0)]
#[case(60.0)]
#[case(90.0)]
fn klobuchar_never_below_5ns(#[case] elevation_deg: f64) {
    let space_node = kb_space_node();
    let user = Llh::new(0.62, 2.44, 100.0);

    for seconds in [0.0, 14_400.0, 50_400.0, 70_000.0] {
        let t = GpsTime::new(2200, seconds);
        let correction_m =
            space_node.iono_correction(&slant(elevation_deg.to_radians()), &user, &t);

        // a delay: negative correction, at least the 5 ns bias
        assert!(correction_m < 0.0);
        let t_iono_s = -correction_m / SPEED_OF_LIGHT_M_S;
        assert!(t_iono_s >= 5E-9, "t_iono {} below floor", t_iono_s);
    }
}

#[test]
fn klobuchar_grows_with_obliquity() {
    let space_node = kb_space_node();
    let user = Llh::new(0.0, 0.0, 0.0);
    // local time close to midnight: pure 5 ns * obliquity regime
    let t = GpsTime::new(2200, 0.0);

    let mut previous = 0.0;
    for elevation_deg in [80.0, 60.0, 40.0, 20.0, 10.0, 5.0] {
        let correction_m =
            space_node.iono_correction(&slant((elevation_deg as f64).to_radians()), &user, &t);
        let t_iono_s = -correction_m / SPEED_OF_LIGHT_M_S;
        assert!(
            t_iono_s >= previous,
            "t_iono must not decrease as elevation drops ({} deg)",
            elevation_deg
        );
        previous = t_iono_s;
    }
}

#[test]
fn iono_utc_scaling() {
    let raw = IonoUtcRaw {
        alpha0: 12,
        alpha1: 1,
        alpha2: -1,
        alpha3: -1,
        beta0: 11,
        beta1: 0,
        beta2: -3,
        beta3: -1,
        a1: -16,
        a0: 1,
        t_ot: 147,
        wn_t: 60,
        delta_t_ls: 18,
        wn_lsf: 137,
        dn: 7,
        delta_t_lsf: 18,
    };

    let params = IonoUtcParameters::from(&raw);
    assert!((params.alpha[0] - 12.0 * (0.5_f64).powi(30)).abs() < 1E-18);
    assert!((params.beta[0] - 11.0 * 2048.0).abs() < 1E-9);
    assert!((params.a1 - -16.0 * (0.5_f64).powi(50)).abs() < 1E-24);
    assert_eq!(params.t_ot, 147 << 12);
    assert_eq!(params.delta_t_ls, 18);
}

#[test]
fn tropo_elevation_and_cutoff() {
    let low = SpaceNode::tropo_correction(&slant(5.0_f64.to_radians()), &Llh::new(0.6, 0.1, 0.0));
    let high = SpaceNode::tropo_correction(&slant(80.0_f64.to_radians()), &Llh::new(0.6, 0.1, 0.0));

    // delays are negative corrections, worse at low elevation
    assert!(low < high && high < 0.0);

    // above the cutoff height the model vanishes
    let space =
        SpaceNode::tropo_correction(&slant(PI / 4.0), &Llh::new(0.6, 0.1, 1.0 / 2.3E-5 + 1.0));
    assert_eq!(space, 0.0);
}

#[test]
fn niell_mapping_is_one_at_zenith() {
    let mapping = NiellMapping::new(2020.5, 0.7, PI / 2.0, 0.1);
    assert!((mapping.hydrostatic - 1.0).abs() < 1E-2);
    assert!((mapping.wet - 1.0).abs() < 1E-2);

    let slanted = NiellMapping::new(2020.5, 0.7, 10.0_f64.to_radians(), 0.1);
    assert!(slanted.hydrostatic > 5.0);
    assert!(slanted.wet > 5.0);
}

#[test]
fn saastamoinen_zenith_delay_is_metric() {
    let zhd = SpaceNode::tropo_zenith_hydrostatic_saastamoinen(0.7, 1013.25, 0.1);
    assert!(zhd > 2.0 && zhd < 2.5, "unexpected ZHD {}", zhd);
}

#[test]
fn pierce_point_moves_toward_satellite() {
    let user = Llh::new(0.5, 0.5, 0.0);
    // northward slant
    let (lat, lon) = SpaceNode::pierce_point(&slant(0.5), &user, 350E3);
    assert!(lat > user.latitude_rad);
    assert!((lon - user.longitude_rad).abs() < 1E-3);

    let factor = SpaceNode::slant_factor(&slant(0.5), 350E3);
    assert!(factor > 0.0 && factor < 1.0);
}
