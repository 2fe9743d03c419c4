use std::collections::VecDeque;

use log::{debug, error};
use nalgebra::{DMatrix, Vector3};

use crate::{
    cfg::{Config, RtMode},
    corrector::{with_clock_jump_check, CorrectInfo},
    error::Error,
    filter::InsFilter,
    measurement::ObservationSet,
    prelude::SpaceNode,
};

#[derive(Debug, Clone)]
pub(crate) struct RtSnapshot<const CLOCKS: usize> {
    /// Filter state ahead of the time update this snapshot records
    pub(crate) filter: InsFilter<CLOCKS>,
    /// Continuous system matrix of the recorded step
    pub(crate) a: DMatrix<f64>,
    /// Inverse state transition of the recorded step
    pub(crate) phi_inv: DMatrix<f64>,
    /// Process noise image of the recorded step
    pub(crate) gqgt: DMatrix<f64>,
    /// Interval of the recorded step (s)
    pub(crate) delta_t_s: f64,
}

/// Real-time synchronizer.
///
/// Snapshots accumulate since the last correction. When an observation
/// referring to an earlier epoch arrives, [RealTime::setup_correct] trims
/// the history down to the matching snapshot, and the correction is
/// applied at "now" with H and R compensated for the age of the
/// measurement. [RtMode] selects between exact per snapshot propagation
/// and a mean propagation closed form.
#[derive(Debug, Clone)]
pub struct RealTime<const CLOCKS: usize> {
    filter: InsFilter<CLOCKS>,
    snapshots: VecDeque<RtSnapshot<CLOCKS>>,
    rt_mode: RtMode,
}

impl<const CLOCKS: usize> RealTime<CLOCKS> {
    /// Wraps an [InsFilter], taking the compensation mode from [Config]
    pub fn new(filter: InsFilter<CLOCKS>, cfg: &Config) -> Self {
        Self {
            filter,
            snapshots: VecDeque::new(),
            rt_mode: cfg.rt_mode,
        }
    }

    /// Wrapped live filter, always at "now"
    pub fn filter(&self) -> &InsFilter<CLOCKS> {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut InsFilter<CLOCKS> {
        &mut self.filter
    }

    /// Number of retained snapshots
    pub fn snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Summed interval of the retained snapshots (s)
    pub fn snapshot_span_s(&self) -> f64 {
        self.snapshots.iter().map(|s| s.delta_t_s).sum()
    }

    #[cfg(test)]
    pub(crate) fn push_snapshot(&mut self, snapshot: RtSnapshot<CLOCKS>) {
        self.snapshots.push_back(snapshot);
    }

    #[cfg(test)]
    pub(crate) fn make_snapshot(
        &self,
        a: DMatrix<f64>,
        phi_inv: DMatrix<f64>,
        gqgt: DMatrix<f64>,
        delta_t_s: f64,
    ) -> RtSnapshot<CLOCKS> {
        RtSnapshot {
            filter: self.filter.clone(),
            a,
            phi_inv,
            gqgt,
            delta_t_s,
        }
    }

    /// Time update over one inertial sample, recording a snapshot first
    pub fn time_update(&mut self, accel_b: &Vector3<f64>, gyro_b: &Vector3<f64>, delta_t_s: f64) {
        let (a, b) = self.filter.system_matrices(accel_b, gyro_b);

        let p_size = InsFilter::<CLOCKS>::P_SIZE;
        let mut phi = &a * delta_t_s;
        for i in 0..p_size {
            phi[(i, i)] += 1.0;
        }

        let phi_inv = match phi.try_inverse() {
            Some(inv) => inv,
            None => {
                error!("singular state transition, snapshot degraded to identity");
                DMatrix::identity(p_size, p_size)
            },
        };

        let gamma = &b * delta_t_s;
        let gqgt = &gamma * self.filter.process_noise() * gamma.transpose();

        self.snapshots.push_back(RtSnapshot {
            filter: self.filter.clone(),
            a: a.clone(),
            phi_inv,
            gqgt,
            delta_t_s,
        });

        self.filter.time_update_with(&a, &b, accel_b, gyro_b, delta_t_s);
    }

    /// Trims the snapshot history so that the front snapshot matches the
    /// epoch of the pending observation, `advance_t_s` seconds away from
    /// "now" (negative: the observation is old).
    ///
    /// Returns false, leaving the history untouched, when the observation
    /// claims to come from the future or predates the whole history; the
    /// caller then drops the measurement.
    pub fn setup_correct(&mut self, advance_t_s: f64) -> bool {
        if advance_t_s > 0.0 {
            // future observation is odd
            return false;
        }

        let mut advance = advance_t_s;
        for idx in (0..self.snapshots.len()).rev() {
            advance += self.snapshots[idx].delta_t_s;
            if advance > -0.005 {
                // closest snapshot found: erase everything older,
                // keeping at least this one
                self.snapshots.drain(0..idx);
                return true;
            }
        }

        false // too old
    }

    /// Measurement update: the correction is evaluated at the front
    /// snapshot epoch, then compensated to "now" per the active [RtMode].
    /// Call [Self::setup_correct] first.
    pub fn correct(&mut self, space_node: &SpaceNode, observations: &ObservationSet) {
        let checked = {
            let front = match self.snapshots.front() {
                Some(front) => front,
                None => {
                    debug!("{} - no snapshot history, skipped", observations.gps_time);
                    return;
                },
            };

            with_clock_jump_check(
                |shift_m| front.filter.correct_info(space_node, observations, shift_m),
                |info| {
                    front
                        .filter
                        .range_residual_mean_ms(observations.clock_index, info)
                },
            )
        };

        let (mut info, shift_m) = match checked {
            Ok(res) => res,
            Err(Error::NoObservation) => {
                debug!("{} - nothing to correct with", observations.gps_time);
                return;
            },
            Err(e) => {
                error!("{} - measurement update skipped: {}", observations.gps_time, e);
                return;
            },
        };

        if shift_m != 0.0 {
            self.filter.shift_clock(observations.clock_index, shift_m);
            for snapshot in self.snapshots.iter_mut() {
                snapshot.filter.shift_clock(observations.clock_index, shift_m);
            }
        }

        self.compensate(&mut info);

        if let Err(e) = self.filter.correct_primitive(&info) {
            error!("{} - measurement update skipped: {}", observations.gps_time, e);
        }
    }

    /// Measurement update with antenna offset context, see
    /// [InsFilter::correct_with_lever_arm]
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

    /// Compensates H and R for the age of the measurement, per [RtMode]
    pub(crate) fn compensate(&self, info: &mut CorrectInfo) {
        match self.rt_mode {
            RtMode::LightWeight => {
                if self.snapshots.is_empty() {
                    return;
                }

                let p_size = info.h.ncols();
                let mut sum_a = DMatrix::<f64>::zeros(p_size, p_size);
                let mut sum_gqgt = DMatrix::<f64>::zeros(p_size, p_size);
                let mut bar_delta_t = 0.0;

                for snapshot in &self.snapshots {
                    sum_a += &snapshot.a;
                    sum_gqgt += &snapshot.gqgt;
                    bar_delta_t += snapshot.delta_t_s;
                }

                let n = self.snapshots.len() as f64;
                bar_delta_t /= n;

                let sum_a_gqgt = &sum_a * &sum_gqgt;

                info.r += &info.h
                    * (sum_gqgt
                        - (&sum_a_gqgt + sum_a_gqgt.transpose())
                            * (bar_delta_t * (n - 1.0) / (2.0 * n)))
                    * info.h.transpose();
                info.h = &info.h * (DMatrix::identity(p_size, p_size) - sum_a * bar_delta_t);
            },
            RtMode::Normal => {
                for snapshot in &self.snapshots {
                    info.h = &info.h * &snapshot.phi_inv;
                    info.r += &info.h * &snapshot.gqgt * info.h.transpose();
                }
            },
        }
    }
}
