use log::{debug, error, warn};
use nalgebra::{DMatrix, DVector, Vector3};

use crate::{
    constants::{EARTH_ECCENTRICITY_SQ, SPEED_OF_LIGHT_M_S},
    error::Error,
    filter::InsFilter,
    ins::{state, INS_P_SIZE},
    measurement::{Observation, ObservationSet},
    prelude::{GpsTime, SpaceNode},
    residual::{ReceiverState, ResidualGenerator},
};

/// Kalman measurement update input: observation matrix H, residual
/// vector z and measurement covariance R
#[derive(Debug, Clone)]
pub struct CorrectInfo {
    /// Observation matrix (rows x P_SIZE)
    pub h: DMatrix<f64>,
    /// Residual vector
    pub z: DVector<f64>,
    /// Measurement covariance
    pub r: DMatrix<f64>,
}

impl CorrectInfo {
    /// The empty (no-op) value: downstream consumers skip it
    pub fn no_info() -> Self {
        Self {
            h: DMatrix::zeros(0, 0),
            z: DVector::zeros(0),
            r: DMatrix::zeros(0, 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.z.nrows() == 0
    }

    /// Number of observation rows
    pub fn rows(&self) -> usize {
        self.z.nrows()
    }
}

/// Runs the receiver clock jump detector around a [CorrectInfo] generator.
///
/// When the mean range residual reaches 0.9 ms of light time, the epoch is
/// regenerated with a whole millisecond clock shift; if that brings the
/// residual back inside the window, the shift is committed by the caller,
/// otherwise the epoch is dropped.
///
/// Returns the usable correction and the clock shift (m) to commit.
pub(crate) fn with_clock_jump_check<G, M>(generate: G, residual_mean_ms: M) -> Result<(CorrectInfo, f64), Error>
where
    G: Fn(f64) -> CorrectInfo,
    M: Fn(&CorrectInfo) -> f64,
{
    let info = generate(0.0);
    if info.is_empty() {
        return Err(Error::NoObservation);
    }

    let delta_ms = residual_mean_ms(&info);
    if delta_ms.abs() < 0.9 {
        return Ok((info, 0.0));
    }

    warn!("receiver clock jump detected: {:.3} ms", delta_ms);

    let shift_m = SPEED_OF_LIGHT_M_S * 1E-3 * (delta_ms + 0.5).floor();
    let info = generate(shift_m);
    let delta_ms = residual_mean_ms(&info);

    if delta_ms.abs() < 0.9 {
        warn!("receiver clock jump fixed, shift {:.1} m", shift_m);
        Ok((info, shift_m))
    } else {
        error!(
            "receiver clock jump compensation failed, residual {:.3} ms",
            delta_ms
        );
        Err(Error::ClockJump)
    }
}

impl<const CLOCKS: usize> InsFilter<CLOCKS> {
    /// Receiver state snapshot feeding the residual evaluation, with the
    /// estimated (and optionally shifted) clock error deduced from the
    /// nominal reception time.
    pub fn receiver_state(
        &self,
        t: GpsTime,
        clock_index: usize,
        clock_error_shift_m: f64,
    ) -> ReceiverState {
        let clock_error_m = self.clock_error_m(clock_index) + clock_error_shift_m;
        ReceiverState {
            t: t - clock_error_m / SPEED_OF_LIGHT_M_S,
            clock_index,
            clock_error_m,
            position: self.ins().position_xyz(),
            llh: self.ins().position_llh(),
            velocity: self.ins().velocity_xyz(),
        }
    }

    /// Assembles H, z, R for one observation epoch. Satellites screened out
    /// by the residual generator do not contribute rows; an epoch with no
    /// surviving row yields [CorrectInfo::no_info].
    ///
    /// `clock_error_shift_m` forcefully offsets the estimated clock error,
    /// used when the receiver clock exceeds the allowable delta from true
    /// GPS time (normally +/- 1 ms of light time).
    pub fn correct_info(
        &self,
        space_node: &SpaceNode,
        observations: &ObservationSet,
        clock_error_shift_m: f64,
    ) -> CorrectInfo {
        if observations.clock_index >= CLOCKS {
            return CorrectInfo::no_info();
        }

        let rx = self.receiver_state(
            observations.gps_time,
            observations.clock_index,
            clock_error_shift_m,
        );
        let generator = ResidualGenerator::new(space_node, self.min_elevation_rad);

        // scratch sized for range + rate rows of every satellite
        let max_rows = observations.len() * 2;
        let mut h = DMatrix::<f64>::zeros(max_rows, Self::P_SIZE);
        let mut z = DVector::<f64>::zeros(max_rows);
        let mut r_diag = vec![0.0; max_rows];

        let mut rows = 0;
        for (prn, observation) in observations.iter() {
            // Intentional exclusions (no range entry, elevation mask, ...)
            // contribute zero rows.
            rows += self.assign_observation_rows(
                &generator,
                *prn,
                observation,
                &rx,
                rows,
                &mut h,
                &mut z,
                &mut r_diag,
            );
        }

        if rows == 0 {
            return CorrectInfo::no_info();
        }

        CorrectInfo {
            h: h.rows(0, rows).into_owned(),
            z: z.rows(0, rows).into_owned(),
            r: DMatrix::from_diagonal(&DVector::from_row_slice(&r_diag[..rows])),
        }
    }

    /// Fills the observation rows of one satellite, returning how many
    /// rows were used (0 when excluded, 1 range only, 2 range + rate).
    #[allow(clippy::too_many_arguments)]
    fn assign_observation_rows(
        &self,
        generator: &ResidualGenerator,
        prn: u8,
        observation: &Observation,
        rx: &ReceiverState,
        row: usize,
        h: &mut DMatrix<f64>,
        z: &mut DVector<f64>,
        r_diag: &mut [f64],
    ) -> usize {
        let prop = generator.relative_property(prn, observation, rx);
        if prop.weight <= 0.0 {
            return 0;
        }

        z[row] = prop.range_residual_m;

        {
            // Jacobian of the ECEF position against the earth-to-nav
            // quaternion error (half angles) and height
            let (alpha, beta, gamma) = self.ins().q_e2n_cosines();
            let e2 = EARTH_ECCENTRICITY_SQ;
            let n = self.ins().normal_radius_m();
            let height = self.ins().height_m();

            let sf = n * e2 * alpha * -2.0 / (1.0 - e2 * alpha * alpha);
            let n_h = (n + height) * 2.0;

            let mut h_uh = [[0.0_f64; 4]; 3];
            h_uh[0][0] = -gamma * beta * sf;
            h_uh[0][1] = -gamma * gamma * sf - n_h * alpha;
            h_uh[0][2] = -n_h * beta;
            h_uh[0][3] = -gamma;

            h_uh[1][0] = beta * beta * sf + n_h * alpha;
            h_uh[1][1] = beta * gamma * sf;
            h_uh[1][2] = -n_h * gamma;
            h_uh[1][3] = beta;

            {
                let sf2 = sf * -(1.0 - e2);
                let n_h2 = (n * (1.0 - e2) + height) * 2.0;
                h_uh[2][0] = alpha * beta * sf2 + n_h2 * beta;
                h_uh[2][1] = alpha * gamma * sf2 + n_h2 * gamma;
                h_uh[2][3] = -alpha;
            }

            for j in 0..4 {
                for i in 0..3 {
                    // polarity checked
                    h[(row, state::POSITION + j)] -= prop.los_neg[i] * h_uh[i][j];
                }
            }
            h[(row, INS_P_SIZE + rx.clock_index * 2)] = -1.0;
        }

        r_diag[row] = match observation.sigma_range_m {
            // receiver range variance applies when provided
            Some(sigma) => sigma * sigma,
            None => (1.0 / prop.weight.max(0.1)).powi(2),
        };

        let rate = match observation.range_rate_m_s {
            Some(rate) => rate,
            None => return 1,
        };

        // rate residual
        z[row + 1] =
            rate - self.clock_error_rate_m_s(rx.clock_index) + prop.rate_relative_neg_m_s;

        {
            // velocity, resolved in navigation frame axes
            let c_n2e = *self.ins().q_e2n().to_rotation_matrix().matrix();
            for j in 0..3 {
                for i in 0..3 {
                    h[(row + 1, state::VELOCITY + j)] -= prop.los_neg[i] * c_n2e[(i, j)];
                }
            }

            // position, through the earth rotation of the relative velocity
            let v = &rx.velocity.0;
            let los = &prop.los_neg;
            h[(row + 1, state::POSITION)] -= (los[1] * -v[2] + los[2] * v[1]) * 2.0;
            h[(row + 1, state::POSITION + 1)] -= (los[0] * v[2] + los[2] * -v[0]) * 2.0;
            h[(row + 1, state::POSITION + 2)] -= (los[0] * -v[1] + los[1] * v[0]) * 2.0;

            h[(row + 1, INS_P_SIZE + rx.clock_index * 2 + 1)] = -1.0;
        }

        r_diag[row + 1] = match observation.sigma_rate_m_s {
            Some(sigma) => sigma * sigma,
            None => r_diag[row] * 1E-3,
        };

        2
    }

    /// Mean range residual attributable to one clock channel, in
    /// milliseconds of light time. This is the clock jump diagnostic.
    pub fn range_residual_mean_ms(&self, clock_index: usize, info: &CorrectInfo) -> f64 {
        let clock_column = INS_P_SIZE + clock_index * 2;

        let mut sum = 0.0;
        let mut ranges = 0_u32;

        for i in 0..info.rows() {
            if info.h[(i, clock_column)] > -0.5 {
                continue;
            }
            sum += info.z[i];
            ranges += 1;
        }

        if ranges > 0 {
            sum / ranges as f64 / SPEED_OF_LIGHT_M_S / 1E-3
        } else {
            0.0
        }
    }

    /// Measurement update with one GNSS observation epoch, running the
    /// clock jump detector first. Failing epochs are skipped locally, the
    /// filter never diverges on one bad bundle.
    pub fn correct(&mut self, space_node: &SpaceNode, observations: &ObservationSet) {
        let checked = with_clock_jump_check(
            |shift_m| self.correct_info(space_node, observations, shift_m),
            |info| self.range_residual_mean_ms(observations.clock_index, info),
        );

        match checked {
            Ok((info, shift_m)) => {
                if shift_m != 0.0 {
                    self.shift_clock(observations.clock_index, shift_m);
                }
                if let Err(e) = self.correct_primitive(&info) {
                    error!("{} - measurement update skipped: {}", observations.gps_time, e);
                }
            },
            Err(Error::NoObservation) => {
                debug!("{} - nothing to correct with", observations.gps_time);
            },
            Err(e) => {
                error!("{} - measurement update skipped: {}", observations.gps_time, e);
            },
        }
    }

    /// Measurement update with antenna offset context.
    // TODO project the lever arm into the predicted position and velocity
    pub fn correct_with_lever_arm(
        &mut self,
        space_node: &SpaceNode,
        observations: &ObservationSet,
        lever_arm_b: &Vector3<f64>,
        omega_b2i_b: &Vector3<f64>,
    ) {
        let _ = (lever_arm_b, omega_b2i_b);
        self.correct(space_node, observations)
    }
}
