use nalgebra::{Matrix3, Quaternion, SMatrix, UnitQuaternion, Vector3};

use crate::{
    constants::{
        EARTH_ANGULAR_VEL_RAD_S, EARTH_ECCENTRICITY_SQ, EARTH_SEMI_MAJOR_AXIS_M,
    },
    coords::{Llh, Xyz},
};

/// Size of the INS error state: velocity (3), position tilt (3),
/// height (1), attitude tilt (3)
pub const INS_P_SIZE: usize = 10;

/// Size of the INS process noise: accelerometer (3), gyro (3)
pub const INS_Q_SIZE: usize = 6;

/// Column layout of the INS error state
pub mod state {
    /// Navigation frame velocity error
    pub const VELOCITY: usize = 0;
    /// Earth to navigation quaternion error (half angles)
    pub const POSITION: usize = 3;
    /// Height error
    pub const HEIGHT: usize = 6;
    /// Body to navigation quaternion error (half angles)
    pub const ATTITUDE: usize = 7;
}

fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v[2], v[1], v[2], 0.0, -v[0], -v[1], v[0], 0.0)
}

/// Normal gravity (Somigliana) with free air reduction
fn gravity_m_s2(latitude_rad: f64, height_m: f64) -> f64 {
    let sin2 = latitude_rad.sin().powi(2);
    9.7803253359 * (1.0 + 1.931853E-3 * sin2) / (1.0 - EARTH_ECCENTRICITY_SQ * sin2).sqrt()
        - 3.086E-6 * height_m
}

/// Wander-azimuth strapdown INS mechanization.
///
/// The navigation frame is the local level frame whose azimuth is free to
/// accumulate; position is carried as the Earth-to-navigation quaternion
/// plus ellipsoidal height, which keeps the mechanization regular at the
/// poles. Attitude is the body-to-navigation quaternion, velocity is held
/// in navigation frame axes (third axis down).
#[derive(Debug, Clone)]
pub struct Ins {
    /// Body to navigation attitude
    q_b2n: UnitQuaternion<f64>,
    /// Navigation frame velocity (m.s⁻¹)
    v_n: Vector3<f64>,
    /// Earth to navigation frame rotation; as a vector rotation it maps
    /// navigation frame vectors into ECEF
    q_e2n: UnitQuaternion<f64>,
    /// Height above ellipsoid (m)
    h: f64,
}

impl Default for Ins {
    fn default() -> Self {
        let mut ins = Self {
            q_b2n: UnitQuaternion::identity(),
            v_n: Vector3::zeros(),
            q_e2n: UnitQuaternion::identity(),
            h: 0.0,
        };
        ins.set_position(&Llh::default(), 0.0);
        ins
    }
}

impl Ins {
    /// Direction cosines of the Earth-to-navigation quaternion entering
    /// the geodetic mapping: (alpha, beta, gamma) = (-sin lat,
    /// cos lat sin lon, -cos lat cos lon), wander invariant.
    pub(crate) fn q_e2n_cosines(&self) -> (f64, f64, f64) {
        let q = self.q_e2n.quaternion();
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);
        (
            (q0 * q0 + q3 * q3) * 2.0 - 1.0,
            (q0 * q1 - q2 * q3) * 2.0,
            (q0 * q2 + q1 * q3) * 2.0,
        )
    }

    /// Normal radius (m) at the current latitude
    pub(crate) fn normal_radius_m(&self) -> f64 {
        let (alpha, _, _) = self.q_e2n_cosines();
        EARTH_SEMI_MAJOR_AXIS_M / (1.0 - EARTH_ECCENTRICITY_SQ * alpha * alpha).sqrt()
    }

    /// Places the INS at a geodetic position, with the requested wander angle
    pub fn set_position(&mut self, llh: &Llh, wander_rad: f64) {
        let (sin_lat, cos_lat) = llh.latitude_rad.sin_cos();
        let (sin_lon, cos_lon) = llh.longitude_rad.sin_cos();
        let (sin_a, cos_a) = wander_rad.sin_cos();

        // NED axes in ECEF
        let north = Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
        let east = Vector3::new(-sin_lon, cos_lon, 0.0);
        let down = Vector3::new(-cos_lat * cos_lon, -cos_lat * sin_lon, -sin_lat);

        // wander frame axes
        let x = north * cos_a + east * sin_a;
        let y = -north * sin_a + east * cos_a;

        let c_n2e = Matrix3::from_columns(&[x, y, down]);
        self.q_e2n = UnitQuaternion::from_matrix(&c_n2e);
        self.h = llh.height_m;
    }

    /// Geodetic position
    pub fn position_llh(&self) -> Llh {
        let (alpha, beta, gamma) = self.q_e2n_cosines();
        Llh {
            latitude_rad: (-alpha).asin(),
            longitude_rad: beta.atan2(-gamma),
            height_m: self.h,
        }
    }

    /// ECEF position (m)
    pub fn position_xyz(&self) -> Xyz {
        let (alpha, beta, gamma) = self.q_e2n_cosines();
        let n = self.normal_radius_m();
        Xyz::new(
            -gamma * (n + self.h),
            beta * (n + self.h),
            -alpha * (n * (1.0 - EARTH_ECCENTRICITY_SQ) + self.h),
        )
    }

    /// ECEF velocity (m.s⁻¹)
    pub fn velocity_xyz(&self) -> Xyz {
        Xyz(self.q_e2n * self.v_n)
    }

    /// Navigation frame velocity (m.s⁻¹)
    pub fn velocity_n(&self) -> &Vector3<f64> {
        &self.v_n
    }

    pub fn set_velocity_n(&mut self, v_n: Vector3<f64>) {
        self.v_n = v_n;
    }

    /// Height above ellipsoid (m)
    pub fn height_m(&self) -> f64 {
        self.h
    }

    pub fn set_height_m(&mut self, h: f64) {
        self.h = h;
    }

    /// Body to navigation attitude
    pub fn q_b2n(&self) -> &UnitQuaternion<f64> {
        &self.q_b2n
    }

    pub fn set_q_b2n(&mut self, q: UnitQuaternion<f64>) {
        self.q_b2n = q;
    }

    /// Earth to navigation rotation
    pub fn q_e2n(&self) -> &UnitQuaternion<f64> {
        &self.q_e2n
    }

    /// Earth rotation rate expressed in navigation frame (rad/s)
    fn earth_rate_n(&self) -> Vector3<f64> {
        self.q_e2n
            .inverse_transform_vector(&Vector3::new(0.0, 0.0, EARTH_ANGULAR_VEL_RAD_S))
    }

    /// Transport rate in navigation frame (rad/s). The vertical component
    /// stays zero, which is what lets the azimuth wander.
    fn transport_rate_n(&self) -> Vector3<f64> {
        let r = self.normal_radius_m() + self.h;
        Vector3::new(self.v_n[1] / r, -self.v_n[0] / r, 0.0)
    }

    /// Strapdown time update over one inertial sample (Euler step)
    pub fn update(&mut self, accel_b: &Vector3<f64>, gyro_b: &Vector3<f64>, delta_t_s: f64) {
        let llh = self.position_llh();

        let f_n = self.q_b2n * accel_b;
        let g_n = Vector3::new(0.0, 0.0, gravity_m_s2(llh.latitude_rad, self.h));

        let omega_ie_n = self.earth_rate_n();
        let omega_en_n = self.transport_rate_n();

        let v_dot = f_n + g_n - (omega_ie_n * 2.0 + omega_en_n).cross(&self.v_n);

        // attitude: body rate against the rotation of the navigation frame
        let omega_in_n = omega_ie_n + omega_en_n;
        self.q_b2n = UnitQuaternion::from_scaled_axis(-omega_in_n * delta_t_s)
            * self.q_b2n
            * UnitQuaternion::from_scaled_axis(gyro_b * delta_t_s);

        // position: the navigation frame follows the transport rate
        self.q_e2n = self.q_e2n * UnitQuaternion::from_scaled_axis(omega_en_n * delta_t_s);
        self.h -= self.v_n[2] * delta_t_s;

        self.v_n += v_dot * delta_t_s;
    }

    /// Applies the estimated error state (subtractive correction)
    pub fn correct(&mut self, x_hat: &[f64]) {
        self.v_n -= Vector3::new(
            x_hat[state::VELOCITY],
            x_hat[state::VELOCITY + 1],
            x_hat[state::VELOCITY + 2],
        );

        self.q_e2n = apply_half_angle_error(
            &self.q_e2n,
            &Vector3::new(
                x_hat[state::POSITION],
                x_hat[state::POSITION + 1],
                x_hat[state::POSITION + 2],
            ),
        );

        self.h -= x_hat[state::HEIGHT];

        self.q_b2n = apply_half_angle_error(
            &self.q_b2n,
            &Vector3::new(
                x_hat[state::ATTITUDE],
                x_hat[state::ATTITUDE + 1],
                x_hat[state::ATTITUDE + 2],
            ),
        );
    }

    /// Linearized error dynamics: A (continuous system matrix) and B
    /// (process noise routing), for the current inertial sample.
    pub fn linearize(
        &self,
        accel_b: &Vector3<f64>,
        _gyro_b: &Vector3<f64>,
    ) -> (SMatrix<f64, 10, 10>, SMatrix<f64, 10, 6>) {
        let mut a = SMatrix::<f64, 10, 10>::zeros();
        let mut b = SMatrix::<f64, 10, 6>::zeros();

        let llh = self.position_llh();
        let f_n = self.q_b2n * accel_b;
        let omega_ie_n = self.earth_rate_n();
        let omega_en_n = self.transport_rate_n();
        let omega_in_n = omega_ie_n + omega_en_n;

        let r = self.normal_radius_m() + self.h;
        let g = gravity_m_s2(llh.latitude_rad, self.h);

        // velocity error rows
        a.fixed_view_mut::<3, 3>(state::VELOCITY, state::VELOCITY)
            .copy_from(&(-skew(&(omega_ie_n * 2.0 + omega_en_n))));
        a.fixed_view_mut::<3, 3>(state::VELOCITY, state::ATTITUDE)
            .copy_from(&(-skew(&f_n) * 2.0));
        // vertical channel instability
        a[(state::VELOCITY + 2, state::HEIGHT)] = 2.0 * g / r;

        // position tilt error rows (half angle kinematics)
        a[(state::POSITION, state::VELOCITY + 1)] = -0.5 / r;
        a[(state::POSITION + 1, state::VELOCITY)] = 0.5 / r;

        // height error row
        a[(state::HEIGHT, state::VELOCITY + 2)] = -1.0;

        // attitude tilt error rows
        a.fixed_view_mut::<3, 3>(state::ATTITUDE, state::ATTITUDE)
            .copy_from(&(-skew(&omega_in_n)));

        let c_b2n = *self.q_b2n.to_rotation_matrix().matrix();
        b.fixed_view_mut::<3, 3>(state::VELOCITY, 0).copy_from(&c_b2n);
        b.fixed_view_mut::<3, 3>(state::ATTITUDE, 3)
            .copy_from(&(-c_b2n * 0.5));

        (a, b)
    }
}

/// Composes a half angle error quaternion out of the rotation state
fn apply_half_angle_error(q: &UnitQuaternion<f64>, du: &Vector3<f64>) -> UnitQuaternion<f64> {
    let dq = Quaternion::new(1.0, -du[0], -du[1], -du[2]);
    UnitQuaternion::from_quaternion(q.into_inner() * dq)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn geodetic_encoding_roundtrip() {
        let llh = Llh::new(0.62, 2.44, 150.0);

        let mut ins = Ins::default();
        ins.set_position(&llh, 0.0);

        let back = ins.position_llh();
        assert!((back.latitude_rad - llh.latitude_rad).abs() < 1E-9);
        assert!((back.longitude_rad - llh.longitude_rad).abs() < 1E-9);

        let xyz = ins.position_xyz();
        let direct = llh.xyz();
        assert!((xyz.0 - direct.0).norm() < 1E-3);
    }

    #[test]
    fn wander_does_not_move_the_position() {
        let llh = Llh::new(-0.3, 1.0, 0.0);

        let mut ins = Ins::default();
        ins.set_position(&llh, 0.8);

        let back = ins.position_llh();
        assert!((back.latitude_rad - llh.latitude_rad).abs() < 1E-9);
        assert!((back.longitude_rad - llh.longitude_rad).abs() < 1E-9);
    }

    #[test]
    fn static_alignment_is_preserved() {
        let llh = Llh::new(0.62, 2.44, 0.0);

        let mut ins = Ins::default();
        ins.set_position(&llh, 0.0);

        // stationary, leveled: specific force balances gravity
        let accel = Vector3::new(0.0, 0.0, -gravity_m_s2(llh.latitude_rad, 0.0));
        let gyro = ins.q_b2n().inverse_transform_vector(&ins.earth_rate_n());

        for _ in 0..100 {
            ins.update(&accel, &gyro, 0.01);
        }

        assert!(ins.velocity_n().norm() < 1E-3);
        let back = ins.position_llh();
        assert!((back.latitude_rad - llh.latitude_rad).abs() < 1E-7);
    }
}
