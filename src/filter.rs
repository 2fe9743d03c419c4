use nalgebra::{DMatrix, DVector, Vector3};

use crate::{
    cfg::Config,
    corrector::CorrectInfo,
    error::Error,
    ins::{Ins, INS_P_SIZE, INS_Q_SIZE},
};

/// Clock augmented filtered INS: a wander-azimuth strapdown [Ins] carrying
/// its error covariance, extended with `CLOCKS` receiver clock
/// (error, error rate) pairs. Each pair evolves as a first order
/// Gauss-Markov process coupled into the A / B system matrices.
///
/// `CLOCKS` is the number of heterogeneous receivers the filter conditions,
/// at least 1.
#[derive(Debug, Clone)]
pub struct InsFilter<const CLOCKS: usize> {
    ins: Ins,
    /// Error covariance
    p: DMatrix<f64>,
    /// Process noise covariance
    q: DMatrix<f64>,
    beta_clock_error: [f64; CLOCKS],
    beta_clock_error_rate: [f64; CLOCKS],
    clock_error_m: [f64; CLOCKS],
    clock_error_rate_m_s: [f64; CLOCKS],
    pub(crate) min_elevation_rad: Option<f64>,
}

impl<const CLOCKS: usize> InsFilter<CLOCKS> {
    /// Full error state dimension
    pub const P_SIZE: usize = INS_P_SIZE + 2 * CLOCKS;

    /// Full process noise dimension
    pub const Q_SIZE: usize = INS_Q_SIZE + 2 * CLOCKS;

    /// Builds a new [InsFilter] from [Config], at the default geodetic
    /// origin. Place it with [Self::ins_mut] accessors, then tune P and Q.
    pub fn new(cfg: &Config) -> Self {
        Self {
            ins: Ins::default(),
            p: DMatrix::identity(Self::P_SIZE, Self::P_SIZE),
            q: DMatrix::identity(Self::Q_SIZE, Self::Q_SIZE) * 1.0E-4,
            beta_clock_error: [cfg.beta_clock_error; CLOCKS],
            beta_clock_error_rate: [cfg.beta_clock_error_rate; CLOCKS],
            clock_error_m: [0.0; CLOCKS],
            clock_error_rate_m_s: [0.0; CLOCKS],
            min_elevation_rad: cfg.min_sv_elev.map(map_3d::deg2rad),
        }
    }

    /// Underlying strapdown INS
    pub fn ins(&self) -> &Ins {
        &self.ins
    }

    pub fn ins_mut(&mut self) -> &mut Ins {
        &mut self.ins
    }

    /// Error covariance
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.p
    }

    pub fn set_covariance(&mut self, p: DMatrix<f64>) {
        assert_eq!(p.nrows(), Self::P_SIZE, "invalid covariance dimensions");
        assert_eq!(p.ncols(), Self::P_SIZE, "invalid covariance dimensions");
        self.p = p;
    }

    /// Process noise covariance
    pub fn process_noise(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub fn set_process_noise(&mut self, q: DMatrix<f64>) {
        assert_eq!(q.nrows(), Self::Q_SIZE, "invalid process noise dimensions");
        assert_eq!(q.ncols(), Self::Q_SIZE, "invalid process noise dimensions");
        self.q = q;
    }

    /// Estimated receiver clock error (m)
    pub fn clock_error_m(&self, clock_index: usize) -> f64 {
        self.clock_error_m[clock_index]
    }

    /// Estimated receiver clock error rate (m.s⁻¹)
    pub fn clock_error_rate_m_s(&self, clock_index: usize) -> f64 {
        self.clock_error_rate_m_s[clock_index]
    }

    /// Gauss-Markov reciprocal time constant of one clock error channel
    pub fn beta_clock_error_mut(&mut self, clock_index: usize) -> &mut f64 {
        &mut self.beta_clock_error[clock_index]
    }

    /// Gauss-Markov reciprocal time constant of one clock rate channel
    pub fn beta_clock_error_rate_mut(&mut self, clock_index: usize) -> &mut f64 {
        &mut self.beta_clock_error_rate[clock_index]
    }

    /// Forcefully shifts one clock error channel, used by the clock jump
    /// compensation to re-center the estimate within one light millisecond.
    pub(crate) fn shift_clock(&mut self, clock_index: usize, shift_m: f64) {
        self.clock_error_m[clock_index] += shift_m;
    }

    /// Continuous system matrix A and process noise routing B for the
    /// current inertial sample, clock channels included:
    ///
    /// ```text
    /// [-b_c ] [      1] : clock(j) error
    /// [   0 ] [-b_cdot] : clock(j) error rate
    /// ```
    pub fn system_matrices(
        &self,
        accel_b: &Vector3<f64>,
        gyro_b: &Vector3<f64>,
    ) -> (DMatrix<f64>, DMatrix<f64>) {
        let (a_ins, b_ins) = self.ins.linearize(accel_b, gyro_b);

        let mut a = DMatrix::<f64>::zeros(Self::P_SIZE, Self::P_SIZE);
        let mut b = DMatrix::<f64>::zeros(Self::P_SIZE, Self::Q_SIZE);

        a.view_mut((0, 0), (INS_P_SIZE, INS_P_SIZE)).copy_from(&a_ins);
        b.view_mut((0, 0), (INS_P_SIZE, INS_Q_SIZE)).copy_from(&b_ins);

        for j in 0..CLOCKS {
            let k = INS_P_SIZE + 2 * j;
            a[(k, k)] += -self.beta_clock_error[j];
            a[(k, k + 1)] += 1.0; // d(clock_error)/dt = clock_error_rate
            a[(k + 1, k + 1)] += -self.beta_clock_error_rate[j];
        }

        for k in 0..2 * CLOCKS {
            b[(INS_P_SIZE + k, INS_Q_SIZE + k)] += 1.0;
        }

        (a, b)
    }

    /// Time update over one inertial sample
    pub fn time_update(&mut self, accel_b: &Vector3<f64>, gyro_b: &Vector3<f64>, delta_t_s: f64) {
        let (a, b) = self.system_matrices(accel_b, gyro_b);
        self.time_update_with(&a, &b, accel_b, gyro_b, delta_t_s);
    }

    /// Time update with system matrices already at hand (the synchronizers
    /// evaluate them for their snapshots first)
    pub(crate) fn time_update_with(
        &mut self,
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        accel_b: &Vector3<f64>,
        gyro_b: &Vector3<f64>,
        delta_t_s: f64,
    ) {
        let mut phi = a * delta_t_s;
        for i in 0..Self::P_SIZE {
            phi[(i, i)] += 1.0;
        }
        let gamma = b * delta_t_s;

        self.p = &phi * &self.p * phi.transpose() + &gamma * &self.q * gamma.transpose();

        // clock channels integrate ahead of the strapdown step
        for j in 0..CLOCKS {
            self.clock_error_m[j] += self.clock_error_rate_m_s[j] * delta_t_s;
        }

        self.ins.update(accel_b, gyro_b, delta_t_s);
    }

    /// Primitive Kalman measurement update: K = P Hᵀ (H P Hᵀ + R)⁻¹,
    /// x̂ = K z, P ← (I - K H) P kept symmetric, then the INS and clock
    /// states absorb x̂.
    pub fn correct_primitive(&mut self, info: &CorrectInfo) -> Result<(), Error> {
        if info.is_empty() {
            return Ok(());
        }

        let s = &info.h * &self.p * info.h.transpose() + &info.r;
        let s_inv = s.try_inverse().ok_or(Error::MatrixInversion)?;

        let k = &self.p * info.h.transpose() * s_inv;
        let x_hat = &k * &info.z;

        let identity = DMatrix::<f64>::identity(Self::P_SIZE, Self::P_SIZE);
        let p = (identity - &k * &info.h) * &self.p;
        // symmetry preserved to working precision
        self.p = (&p + p.transpose()) * 0.5;

        self.correct_ins(&x_hat);

        Ok(())
    }

    /// Applies the estimated correction to the INS and clock states
    fn correct_ins(&mut self, x_hat: &DVector<f64>) {
        for j in 0..CLOCKS {
            let k = INS_P_SIZE + 2 * j;
            self.clock_error_m[j] -= x_hat[k];
            self.clock_error_rate_m_s[j] -= x_hat[k + 1];
        }
        self.ins.correct(x_hat.as_slice());
    }
}
