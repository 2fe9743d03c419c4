use std::collections::VecDeque;

use log::{debug, error};
use nalgebra::{DMatrix, Vector3};

use crate::{
    cfg::Config,
    corrector::{with_clock_jump_check, CorrectInfo},
    error::Error,
    filter::InsFilter,
    measurement::ObservationSet,
    prelude::SpaceNode,
};

#[derive(Debug, Clone)]
struct Snapshot<const CLOCKS: usize> {
    /// Filter state ahead of the time update this snapshot records
    filter: InsFilter<CLOCKS>,
    /// State transition of the recorded step: I + A dT
    phi: DMatrix<f64>,
    /// Process noise image of the recorded step: (B dT) Q (B dT)ᵀ
    gqgt: DMatrix<f64>,
    /// Cumulated interval since the last correction (s). Positive values
    /// flag snapshots not back-propagated yet.
    elapsed_s: f64,
}

/// Back propagating synchronizer.
///
/// Every time update appends a snapshot of the filter. When an observation
/// arrives that corresponds to an earlier epoch, the matching snapshot is
/// retro-corrected with the observation matrix transformed into its frame,
/// while the live filter absorbs the same correction at "now". Snapshots
/// older than `back_propagate_depth` are evicted once enough history has
/// accumulated.
#[derive(Debug, Clone)]
pub struct BackPropagate<const CLOCKS: usize> {
    filter: InsFilter<CLOCKS>,
    snapshots: VecDeque<Snapshot<CLOCKS>>,
    back_propagate_depth_s: f64,
}

impl<const CLOCKS: usize> BackPropagate<CLOCKS> {
    /// Wraps an [InsFilter], taking the propagation depth from [Config]
    pub fn new(filter: InsFilter<CLOCKS>, cfg: &Config) -> Self {
        Self {
            filter,
            snapshots: VecDeque::new(),
            back_propagate_depth_s: cfg.back_propagate_depth,
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

    /// Cumulated age of each snapshot, front (oldest) to back
    pub(crate) fn snapshot_ages(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.elapsed_s).collect()
    }

    /// Time update over one inertial sample, recording a snapshot first
    pub fn time_update(&mut self, accel_b: &Vector3<f64>, gyro_b: &Vector3<f64>, delta_t_s: f64) {
        let (a, b) = self.filter.system_matrices(accel_b, gyro_b);

        let mut phi = &a * delta_t_s;
        for i in 0..InsFilter::<CLOCKS>::P_SIZE {
            phi[(i, i)] += 1.0;
        }
        let gamma = &b * delta_t_s;
        let gqgt = &gamma * self.filter.process_noise() * gamma.transpose();

        let elapsed_s = delta_t_s + self.snapshots.back().map_or(0.0, |s| s.elapsed_s);

        self.snapshots.push_back(Snapshot {
            filter: self.filter.clone(),
            phi,
            gqgt,
            elapsed_s,
        });

        self.filter.time_update_with(&a, &b, accel_b, gyro_b, delta_t_s);
    }

    /// Measurement update: clock jump detection, then back propagation of
    /// the correction into the snapshot matching the observation epoch.
    pub fn correct(&mut self, space_node: &SpaceNode, observations: &ObservationSet) {
        if self.snapshots.is_empty() {
            debug!("{} - no snapshot history, skipped", observations.gps_time);
            return;
        }

        let checked = with_clock_jump_check(
            |shift_m| self.filter.correct_info(space_node, observations, shift_m),
            |info| self.filter.range_residual_mean_ms(observations.clock_index, info),
        );

        let (info, shift_m) = match checked {
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

        self.correct_with_info(&info);
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

    /// Applies an already assembled correction through the snapshot walk
    pub(crate) fn correct_with_info(&mut self, info: &CorrectInfo) {
        let mod_elapsed_s = match self.snapshots.back() {
            Some(snapshot) => snapshot.elapsed_s,
            None => return,
        };

        if mod_elapsed_s > 0.0 {
            // The latest is the first. Snapshots beyond the propagation
            // depth are evicted, but only when enough history exists.
            let mut erase_through = None;
            for idx in (0..self.snapshots.len()).rev() {
                if self.snapshots[idx].elapsed_s < self.back_propagate_depth_s {
                    if mod_elapsed_s > 0.1 {
                        erase_through = Some(idx);
                    }
                    break;
                }
                // flags this snapshot as back-propagated
                self.snapshots[idx].elapsed_s -= mod_elapsed_s;
            }

            if let Some(idx) = erase_through {
                self.snapshots.drain(0..=idx);
                if self.snapshots.is_empty() {
                    return;
                }
            }
        }

        // Retro-correct the newest snapshot in its own epoch frame
        if let Some(mut previous) = self.snapshots.pop_back() {
            let back_info = CorrectInfo {
                h: &info.h * &previous.phi,
                z: info.z.clone(),
                r: &info.r + &info.h * &previous.gqgt * info.h.transpose(),
            };
            if let Err(e) = previous.filter.correct_primitive(&back_info) {
                error!("back propagation skipped: {}", e);
            }
            self.snapshots.push_back(previous);
        }

        // The live filter stays at "now": the same correction applies, and
        // carries forward implicitly through the following snapshots.
        if let Err(e) = self.filter.correct_primitive(info) {
            error!("measurement update skipped: {}", e);
        }
    }
}
