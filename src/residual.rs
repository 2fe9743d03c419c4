use nalgebra::Vector3;

use crate::{
    constants::{EARTH_ANGULAR_VEL_RAD_S, SPEED_OF_LIGHT_M_S},
    coords::{Enu, Llh, Xyz},
    measurement::Observation,
    prelude::{GpsTime, SpaceNode},
};

/// Receiver side of the residual evaluation: position, velocity and the
/// clock channel conditioned by the pending observation epoch.
#[derive(Debug, Copy, Clone)]
pub struct ReceiverState {
    /// Time of reception, compensated for the estimated clock error
    pub t: GpsTime,
    /// Conditioned clock channel
    pub clock_index: usize,
    /// Estimated receiver clock error (m), shift included
    pub clock_error_m: f64,
    /// Receiver position, ECEF (m)
    pub position: Xyz,
    /// Receiver position, geodetic
    pub llh: Llh,
    /// Receiver velocity, ECEF (m.s⁻¹)
    pub velocity: Xyz,
}

/// Relative satellite/receiver quantities feeding one observation row pair
#[derive(Debug, Default, Copy, Clone)]
pub struct RelativeProperty {
    /// Line of sight unit vector, pointing away from the satellite
    pub los_neg: Vector3<f64>,
    /// Pseudo range residual (m), receiver clock error deduced
    pub range_residual_m: f64,
    /// Relative range rate with negated line of sight, plus the satellite
    /// clock drift (m.s⁻¹). The rate residual is
    /// `measured - clock_error_rate + rate_relative_neg`.
    pub rate_relative_neg_m_s: f64,
    /// Non positive when this satellite must be excluded
    pub weight: f64,
}

impl RelativeProperty {
    fn excluded() -> Self {
        Self {
            weight: -1.0,
            ..Default::default()
        }
    }
}

/// Per satellite residual evaluation against a [SpaceNode]
#[derive(Debug, Copy, Clone)]
pub struct ResidualGenerator<'a> {
    space_node: &'a SpaceNode,
    /// Elevation mask (rad), satellites below are excluded
    min_elevation_rad: Option<f64>,
}

impl<'a> ResidualGenerator<'a> {
    pub fn new(space_node: &'a SpaceNode, min_elevation_rad: Option<f64>) -> Self {
        Self {
            space_node,
            min_elevation_rad,
        }
    }

    /// Evaluates the residual quantities of one satellite. A non positive
    /// weight is returned for intentional exclusions: no range entry,
    /// no usable ephemeris, unhealthy satellite, elevation mask.
    pub fn relative_property(
        &self,
        prn: u8,
        observation: &Observation,
        rx: &ReceiverState,
    ) -> RelativeProperty {
        let pseudo_range_m = match observation.pseudo_range_m {
            Some(range) => range,
            None => return RelativeProperty::excluded(),
        };

        if let Some(weight) = observation.weight {
            if weight <= 0.0 {
                return RelativeProperty::excluded();
            }
        }

        let sat = match self.space_node.satellites().get(&prn) {
            Some(sat) => sat,
            None => return RelativeProperty::excluded(),
        };

        let eph = match sat.ephemeris() {
            Some(eph) if eph.sv_health == 0 => eph,
            _ => return RelativeProperty::excluded(),
        };

        let with_velocity = observation.range_rate_m_s.is_some();
        let constellation = eph.constellation(&rx.t, pseudo_range_m, with_velocity);

        // Sagnac: Earth rotation over the signal transit time
        let transit_s = pseudo_range_m / SPEED_OF_LIGHT_M_S;
        let (sin_rot, cos_rot) = (EARTH_ANGULAR_VEL_RAD_S * transit_s).sin_cos();
        let rotate = |v: &Vector3<f64>| {
            Vector3::new(
                v[0] * cos_rot + v[1] * sin_rot,
                -v[0] * sin_rot + v[1] * cos_rot,
                v[2],
            )
        };

        let sat_position = Xyz(rotate(&constellation.position.0));

        let relative_enu = Enu::relative(&sat_position, &rx.position);
        if let Some(mask) = self.min_elevation_rad {
            if relative_enu.elevation_rad() < mask {
                return RelativeProperty::excluded();
            }
        }

        let relative = rx.position.0 - sat_position.0;
        let range_m = relative.norm();
        let los_neg = relative / range_m;

        let sat_clock_s = eph.clock_error(&rx.t, pseudo_range_m, 1.0);

        let iono_m = if self.space_node.is_valid_iono() {
            self.space_node
                .iono_correction(&relative_enu, &rx.llh, &rx.t)
        } else {
            0.0
        };
        let tropo_m = SpaceNode::tropo_correction(&relative_enu, &rx.llh);

        // corrections carry the delay as negative meters
        let range_residual_m = pseudo_range_m - range_m - rx.clock_error_m
            + sat_clock_s * SPEED_OF_LIGHT_M_S
            + iono_m
            + tropo_m;

        let rate_relative_neg_m_s = if with_velocity {
            let sat_velocity = rotate(&constellation.velocity.0);
            let sat_clock_dot = eph.clock_error_dot(&rx.t, pseudo_range_m);
            -los_neg.dot(&(rx.velocity.0 - sat_velocity)) + sat_clock_dot * SPEED_OF_LIGHT_M_S
        } else {
            0.0
        };

        RelativeProperty {
            los_neg,
            range_residual_m,
            rate_relative_neg_m_s,
            weight: observation.weight.unwrap_or(1.0),
        }
    }
}
