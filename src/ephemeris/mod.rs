use crate::{
    constants::{
        EARTH_ANGULAR_VEL_RAD_S, EARTH_GRAVITATION_MU_M3_S2, KEPLER_DELTA_LIMIT, KEPLER_MAX_ITER,
        SC2RAD, SPEED_OF_LIGHT_M_S,
    },
    coords::Xyz,
    prelude::GpsTime,
};

pub(crate) mod history;

pub use history::{EphemerisHistory, IterationOrder};

/// Broadcast LSB weight: 2^n
#[inline]
pub(crate) fn p2(n: i32) -> f64 {
    (2.0_f64).powi(n)
}

/// Satellite position and velocity in ECEF, resolved from [Ephemeris]
#[derive(Debug, Default, Copy, Clone)]
pub struct Constellation {
    /// ECEF position (m)
    pub position: Xyz,
    /// ECEF velocity (m.s⁻¹)
    pub velocity: Xyz,
}

/// GPS broadcast ephemeris (subframes 1, 2, 3), scaled to floating point.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Ephemeris {
    /// Satellite PRN number
    pub svid: u8,

    // Subframe 1
    /// Week number (no 10 bit truncation)
    pub week: u32,
    /// User range accuracy (index)
    pub ura: i32,
    /// Health status, 0 when fully usable
    pub sv_health: u8,
    /// Issue of clock data
    pub iodc: i32,
    /// Group delay (s)
    pub t_gd_s: f64,
    /// Clock data reference time (s of week)
    pub t_oc_s: f64,
    /// Clock correction parameter (s/s²)
    pub a_f2: f64,
    /// Clock correction parameter (s/s)
    pub a_f1: f64,
    /// Clock correction parameter (s)
    pub a_f0: f64,

    // Subframe 2
    /// Issue of ephemeris data
    pub iode: i32,
    /// Sine correction, orbit radius (m)
    pub c_rs_m: f64,
    /// Mean motion difference (rad/s)
    pub delta_n_rad_s: f64,
    /// Mean anomaly at reference time (rad)
    pub m0_rad: f64,
    /// Cosine correction, argument of latitude (rad)
    pub c_uc_rad: f64,
    /// Eccentricity
    pub eccentricity: f64,
    /// Sine correction, argument of latitude (rad)
    pub c_us_rad: f64,
    /// Square root of semi major axis (√m)
    pub sqrt_a: f64,
    /// Reference time ephemeris (s of week)
    pub t_oe_s: f64,
    /// Fit interval (s); negative flags an invalid record
    pub fit_interval_s: f64,

    // Subframe 3
    /// Cosine correction, inclination (rad)
    pub c_ic_rad: f64,
    /// Longitude of ascending node (rad)
    pub omega0_rad: f64,
    /// Sine correction, inclination (rad)
    pub c_is_rad: f64,
    /// Inclination angle (rad)
    pub i0_rad: f64,
    /// Cosine correction, orbit radius (m)
    pub c_rc_m: f64,
    /// Argument of perigee (rad)
    pub omega_rad: f64,
    /// Rate of right ascension (rad/s)
    pub dot_omega0_rad_s: f64,
    /// Rate of inclination angle (rad/s)
    pub dot_i0_rad_s: f64,
}

impl Ephemeris {
    /// Reference [GpsTime] of this frame (week, time of clock)
    pub fn base_time(&self) -> GpsTime {
        GpsTime::new(self.week as i32, self.t_oc_s)
    }

    /// Time elapsed since time of clock (s), positive after t_oc
    pub fn period_from_time_of_clock(&self, t: &GpsTime) -> f64 {
        -t.interval(self.week as i32, self.t_oc_s)
    }

    /// Time elapsed since time of ephemeris (s), positive after t_oe
    pub fn period_from_time_of_ephemeris(&self, t: &GpsTime) -> f64 {
        -t.interval(self.week as i32, self.t_oe_s)
    }

    /// Time elapsed since the first valid transmission of this frame (s).
    /// Always positive over the fit interval of a valid record,
    /// see IS-GPS-200 §20.3.4.5 Table 20-XIII.
    pub fn period_from_first_valid_transmission(&self, t: &GpsTime) -> f64 {
        self.period_from_time_of_clock(t) + self.fit_interval_s / 2.0
    }

    /// True when this frame is applicable at `t`
    pub fn is_valid(&self, t: &GpsTime) -> bool {
        self.period_from_time_of_clock(t).abs() <= self.fit_interval_s / 2.0
    }

    /// True when the constellation may already broadcast a newer frame,
    /// considering the re-transmission interval of IS-GPS-200 §20.3.4.5.
    pub fn maybe_better_one_available(&self, t: &GpsTime) -> bool {
        let delta_t = self.period_from_first_valid_transmission(t);
        let transmission_interval = if self.fit_interval_s > 4.0 * 3600.0 {
            self.fit_interval_s / 2.0
        } else {
            // fit_interval is 4 hours, but some SVs transmit every hour
            3600.0
        };
        !(delta_t >= 0.0 && delta_t < transmission_interval)
    }

    /// Solves the Kepler equation for the eccentric anomaly (rad).
    /// Fixed point iteration, seeded at the mean anomaly, capped at
    /// [KEPLER_MAX_ITER] rounds: the post-cap iterate is used as is.
    pub fn eccentric_anomaly(&self, period_from_toe_s: f64) -> f64 {
        let a = self.sqrt_a * self.sqrt_a;
        let n0 = (EARTH_GRAVITATION_MU_M3_S2 / (a * a * a)).sqrt();
        let m_k = self.m0_rad + (n0 + self.delta_n_rad_s) * period_from_toe_s;

        let mut e_k = m_k;
        for _ in 0..KEPLER_MAX_ITER {
            let e_k2 = m_k + self.eccentricity * e_k.sin();
            if (e_k2 - e_k).abs() < KEPLER_DELTA_LIMIT {
                break;
            }
            e_k = e_k2;
        }
        e_k
    }

    /// Eccentric anomaly rate (rad/s)
    pub fn eccentric_anomaly_dot(&self, eccentric_anomaly_rad: f64) -> f64 {
        let a = self.sqrt_a * self.sqrt_a;
        let n = (EARTH_GRAVITATION_MU_M3_S2 / (a * a * a)).sqrt() + self.delta_n_rad_s;
        n / (1.0 - self.eccentricity * eccentric_anomaly_rad.cos())
    }

    /// Satellite clock correction (s) at time of transmission, including the
    /// relativistic term, minus the group delay scaled by `gamma`
    /// (1 on L1, (77/60)² on L2, see IS-GPS-200 §20.3.3.3.3.2).
    pub fn clock_error(&self, t: &GpsTime, pseudo_range_m: f64, gamma: f64) -> f64 {
        let transit_s = pseudo_range_m / SPEED_OF_LIGHT_M_S;
        let tk = self.period_from_time_of_clock(t) - transit_s;
        let e_k = self.eccentric_anomaly(tk);

        // Relativistic correction term
        let f = -2.0 * EARTH_GRAVITATION_MU_M3_S2.sqrt() / (SPEED_OF_LIGHT_M_S * SPEED_OF_LIGHT_M_S);
        let dt_r = f * self.eccentricity * self.sqrt_a * e_k.sin();

        // IS-GPS-200 §20.3.3.3.1 Eq.(2)
        let dt_sv = self.a_f0 + self.a_f1 * tk + self.a_f2 * tk * tk + dt_r;

        dt_sv - gamma * self.t_gd_s
    }

    /// Satellite clock correction rate (s/s) at time of transmission
    pub fn clock_error_dot(&self, t: &GpsTime, pseudo_range_m: f64) -> f64 {
        let transit_s = pseudo_range_m / SPEED_OF_LIGHT_M_S;
        let tk = self.period_from_time_of_clock(t) - transit_s;
        let e_k = self.eccentric_anomaly(tk);
        let e_k_dot = self.eccentric_anomaly_dot(e_k);

        let f = -2.0 * EARTH_GRAVITATION_MU_M3_S2.sqrt() / (SPEED_OF_LIGHT_M_S * SPEED_OF_LIGHT_M_S);
        let dt_r_dot = f * self.eccentricity * self.sqrt_a * e_k_dot * e_k.cos();

        self.a_f1 + self.a_f2 * 2.0 * tk + dt_r_dot
    }

    /// Resolves satellite position (and velocity, when requested) in ECEF
    /// at the transit compensated epoch `t - pseudo_range / c`.
    pub fn constellation(
        &self,
        t: &GpsTime,
        pseudo_range_m: f64,
        with_velocity: bool,
    ) -> Constellation {
        let e = self.eccentricity;
        let a = self.sqrt_a * self.sqrt_a;

        // Time from ephemeris reference epoch, in receiver then transmit time
        let tk0 = self.period_from_time_of_ephemeris(t);
        let tk = tk0 - pseudo_range_m / SPEED_OF_LIGHT_M_S;

        let e_k = self.eccentric_anomaly(tk);
        let (sin_e_k, cos_e_k) = e_k.sin_cos();

        // True anomaly and argument of latitude
        let v_k = ((1.0 - e * e).sqrt() * sin_e_k).atan2(cos_e_k - e);
        let mut p_k = v_k + self.omega_rad;
        let mut r_k = a * (1.0 - e * cos_e_k);
        let mut i_k = self.i0_rad;

        // Second harmonic perturbations, evaluated at 2(ν+ω)
        let (p_k2_sin, p_k2_cos) = (p_k * 2.0).sin_cos();
        p_k += self.c_us_rad * p_k2_sin + self.c_uc_rad * p_k2_cos;
        r_k += self.c_rs_m * p_k2_sin + self.c_rc_m * p_k2_cos;
        i_k += self.c_is_rad * p_k2_sin + self.c_ic_rad * p_k2_cos + self.dot_i0_rad_s * tk;

        // Position in orbital plane
        let (x_k, y_k) = (r_k * p_k.cos(), r_k * p_k.sin());

        // Corrected longitude of ascending node: the node rate applies over
        // transmit time, the Earth rotation over receiver time
        let omega_k = self.omega0_rad + self.dot_omega0_rad_s * tk
            - EARTH_ANGULAR_VEL_RAD_S * (self.t_oe_s + tk0);

        let (omega_k_sin, omega_k_cos) = omega_k.sin_cos();
        let (i_k_sin, i_k_cos) = i_k.sin_cos();

        let mut res = Constellation {
            position: Xyz::new(
                x_k * omega_k_cos - y_k * omega_k_sin * i_k_cos,
                x_k * omega_k_sin + y_k * omega_k_cos * i_k_cos,
                y_k * i_k_sin,
            ),
            velocity: Default::default(),
        };

        if with_velocity {
            // Analytic differentiation,
            // see GPS solutions vol.8 http://www.ngs.noaa.gov/gps-toolbox/bc_velo.htm
            let e_k_dot = self.eccentric_anomaly_dot(e_k);
            let v_k_dot = e_k_dot * (1.0 - e * e).sqrt() / (1.0 - e * cos_e_k);

            let p_k_dot = ((self.c_us_rad * p_k2_cos - self.c_uc_rad * p_k2_sin) * 2.0 + 1.0) * v_k_dot;
            let r_k_dot = a * e * sin_e_k * e_k_dot
                + (self.c_rs_m * p_k2_cos - self.c_rc_m * p_k2_sin) * 2.0 * v_k_dot;
            let i_k_dot =
                self.dot_i0_rad_s + (self.c_is_rad * p_k2_cos - self.c_ic_rad * p_k2_sin) * 2.0 * v_k_dot;

            let x_k_dot = r_k_dot * p_k.cos() - y_k * p_k_dot;
            let y_k_dot = r_k_dot * p_k.sin() + x_k * p_k_dot;

            let omega_k_dot = self.dot_omega0_rad_s - EARTH_ANGULAR_VEL_RAD_S;

            res.velocity = Xyz::new(
                (x_k_dot - y_k * i_k_cos * omega_k_dot) * omega_k_cos
                    - (x_k * omega_k_dot + y_k_dot * i_k_cos - y_k * i_k_sin * i_k_dot)
                        * omega_k_sin,
                (x_k_dot - y_k * i_k_cos * omega_k_dot) * omega_k_sin
                    + (x_k * omega_k_dot + y_k_dot * i_k_cos - y_k * i_k_sin * i_k_dot)
                        * omega_k_cos,
                y_k_dot * i_k_sin + y_k * i_k_cos * i_k_dot,
            );
        }

        res
    }

    /// True when both frames carry the same broadcast content,
    /// to within one LSB of the published scale factors.
    pub fn is_equivalent(&self, rhs: &Ephemeris) -> bool {
        if self.week != rhs.week || self.ura != rhs.ura || self.sv_health != rhs.sv_health {
            return false;
        }

        macro_rules! check {
            ($field: ident, $lsb: expr) => {
                if (self.$field - rhs.$field).abs() > $lsb {
                    return false;
                }
            };
        }

        check!(t_gd_s, p2(-31));
        check!(t_oc_s, p2(4));
        check!(a_f2, p2(-55));
        check!(a_f1, p2(-43));
        check!(a_f0, p2(-31));

        check!(c_rs_m, p2(-5));
        check!(delta_n_rad_s, SC2RAD * p2(-43));
        check!(m0_rad, SC2RAD * p2(-31));
        check!(c_uc_rad, p2(-29));
        check!(eccentricity, p2(-33));
        check!(c_us_rad, p2(-29));
        check!(sqrt_a, p2(-19));
        check!(t_oe_s, p2(4));

        check!(c_ic_rad, p2(-29));
        check!(omega0_rad, SC2RAD * p2(-31));
        check!(c_is_rad, p2(-29));
        check!(i0_rad, SC2RAD * p2(-31));
        check!(c_rc_m, p2(-5));
        check!(omega_rad, SC2RAD * p2(-31));
        check!(dot_omega0_rad_s, SC2RAD * p2(-43));
        check!(dot_i0_rad_s, SC2RAD * p2(-43));

        true
    }

    /// URA index to meters bound, negative index meaning no accuracy prediction
    pub fn ura_meter(index: i32) -> f64 {
        if index < 0 {
            return -1.0;
        }
        let index = index as usize;
        if index < URA_LIMITS_M.len() {
            URA_LIMITS_M[index]
        } else {
            URA_LIMITS_M[URA_LIMITS_M.len() - 1] * 2.0
        }
    }

    /// Meters bound to URA index
    pub fn ura_index(meter: f64) -> i32 {
        if meter < 0.0 {
            return -1;
        }
        for (i, limit) in URA_LIMITS_M.iter().enumerate() {
            if meter <= *limit {
                return i as i32;
            }
        }
        URA_LIMITS_M.len() as i32
    }
}

/// URA index upper bounds, in meters (IS-GPS-200 §20.3.3.3.1.3)
const URA_LIMITS_M: [f64; 15] = [
    2.40, 3.40, 4.85, 6.85, 9.65, 13.65, 24.00, 48.00, 96.00, 192.00, 384.00, 768.00, 1536.00,
    3072.00, 6144.00,
];

/// GPS broadcast ephemeris in scaled integer (as broadcast) representation.
/// Field comments give the LSB as a power of two, per IS-GPS-200 §20.3.3.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct EphemerisRaw {
    /// Satellite PRN number
    pub svid: u8,

    /// Week number
    pub week: u16,
    /// User range accuracy index
    pub ura: u8,
    /// Health status
    pub sv_health: u8,
    /// Issue of clock data
    pub iodc: u16,
    /// Group delay            (-31, s)
    pub t_gd: i8,
    /// Clock data ref. time   (  4, s)
    pub t_oc: u16,
    /// Clock drift rate       (-55, s/s²)
    pub a_f2: i8,
    /// Clock drift            (-43, s/s)
    pub a_f1: i16,
    /// Clock bias             (-31, s)
    pub a_f0: i32,

    /// Issue of ephemeris data
    pub iode: u8,
    /// Sine correction, orbit ( -5, m)
    pub c_rs: i16,
    /// Mean motion difference (-43, sc/s)
    pub delta_n: i16,
    /// Mean anomaly           (-31, sc)
    pub m0: i32,
    /// Cosine correction, lat (-29, rad)
    pub c_uc: i16,
    /// Eccentricity           (-33)
    pub e: u32,
    /// Sine correction, lat   (-29, rad)
    pub c_us: i16,
    /// Root semi major axis   (-19, √m)
    pub sqrt_a: u32,
    /// Reference time eph.    (  4, s)
    pub t_oe: u16,
    /// Fit interval flag (IS-GPS-200 §20.3.4.4)
    pub fit_interval_flag: bool,

    /// Cosine correction, inc (-29, rad)
    pub c_ic: i16,
    /// Ascending node long.   (-31, sc)
    pub omega0: i32,
    /// Sine correction, inc   (-29, rad)
    pub c_is: i16,
    /// Inclination angle      (-31, sc)
    pub i0: i32,
    /// Cosine correction, orb ( -5, m)
    pub c_rc: i16,
    /// Argument of perigee    (-31, sc)
    pub omega: i32,
    /// Right ascension rate   (-43, sc/s)
    pub dot_omega0: i32,
    /// Inclination rate       (-43, sc/s)
    pub dot_i0: i16,
}

impl EphemerisRaw {
    /// Resolves the 10 bit broadcast week number against a full week hint,
    /// usually the week of the time of reception.
    pub fn full_week(&self, week_hint: i32) -> u32 {
        (week_hint - week_hint.rem_euclid(0x400) + (self.week % 0x400) as i32) as u32
    }

    /// Scaled floating point conversion with the truncated week number
    /// compensated from a full week hint.
    pub fn to_ephemeris(&self, week_hint: i32) -> Ephemeris {
        let mut eph = Ephemeris::from(self);
        eph.week = self.full_week(week_hint);
        eph
    }

    /// Fit interval from the 1 bit flag and IODC (IS-GPS-200 §20.3.4.4)
    pub fn fit_interval_s(flag: bool, iodc: u16) -> f64 {
        let hours = if !flag {
            // normal operations
            4
        } else {
            // short / long term extended operations
            match iodc {
                240..=247 => 8,
                248..=255 | 496 => 14,
                497..=503 => 26,
                504..=510 => 50,
                511 | 752..=756 => 74,
                757..=763 => 98,
                764..=767 | 1008..=1010 => 122,
                1011..=1020 => 146,
                _ => 6,
            }
        };
        (hours * 3600) as f64
    }
}

impl From<&EphemerisRaw> for Ephemeris {
    fn from(raw: &EphemerisRaw) -> Ephemeris {
        Ephemeris {
            svid: raw.svid,

            week: raw.week as u32,
            ura: raw.ura as i32,
            sv_health: raw.sv_health,
            iodc: raw.iodc as i32,
            t_gd_s: raw.t_gd as f64 * p2(-31),
            t_oc_s: raw.t_oc as f64 * p2(4),
            a_f2: raw.a_f2 as f64 * p2(-55),
            a_f1: raw.a_f1 as f64 * p2(-43),
            a_f0: raw.a_f0 as f64 * p2(-31),

            iode: raw.iode as i32,
            c_rs_m: raw.c_rs as f64 * p2(-5),
            delta_n_rad_s: raw.delta_n as f64 * SC2RAD * p2(-43),
            m0_rad: raw.m0 as f64 * SC2RAD * p2(-31),
            c_uc_rad: raw.c_uc as f64 * p2(-29),
            eccentricity: raw.e as f64 * p2(-33),
            c_us_rad: raw.c_us as f64 * p2(-29),
            sqrt_a: raw.sqrt_a as f64 * p2(-19),
            t_oe_s: raw.t_oe as f64 * p2(4),
            fit_interval_s: EphemerisRaw::fit_interval_s(raw.fit_interval_flag, raw.iodc),

            c_ic_rad: raw.c_ic as f64 * p2(-29),
            omega0_rad: raw.omega0 as f64 * SC2RAD * p2(-31),
            c_is_rad: raw.c_is as f64 * p2(-29),
            i0_rad: raw.i0 as f64 * SC2RAD * p2(-31),
            c_rc_m: raw.c_rc as f64 * p2(-5),
            omega_rad: raw.omega as f64 * SC2RAD * p2(-31),
            dot_omega0_rad_s: raw.dot_omega0 as f64 * SC2RAD * p2(-43),
            dot_i0_rad_s: raw.dot_i0 as f64 * SC2RAD * p2(-43),
        }
    }
}

impl From<&Ephemeris> for EphemerisRaw {
    fn from(eph: &Ephemeris) -> EphemerisRaw {
        // round to nearest broadcast step
        fn quantize(value: f64, lsb: f64) -> i64 {
            ((value + 0.5 * lsb) / lsb).floor() as i64
        }

        EphemerisRaw {
            svid: eph.svid,

            week: eph.week as u16,
            ura: eph.ura as u8,
            sv_health: eph.sv_health,
            iodc: eph.iodc as u16,
            t_gd: quantize(eph.t_gd_s, p2(-31)) as i8,
            t_oc: quantize(eph.t_oc_s, p2(4)) as u16,
            a_f2: quantize(eph.a_f2, p2(-55)) as i8,
            a_f1: quantize(eph.a_f1, p2(-43)) as i16,
            a_f0: quantize(eph.a_f0, p2(-31)) as i32,

            iode: eph.iode as u8,
            c_rs: quantize(eph.c_rs_m, p2(-5)) as i16,
            delta_n: quantize(eph.delta_n_rad_s, SC2RAD * p2(-43)) as i16,
            m0: quantize(eph.m0_rad, SC2RAD * p2(-31)) as i32,
            c_uc: quantize(eph.c_uc_rad, p2(-29)) as i16,
            e: quantize(eph.eccentricity, p2(-33)) as u32,
            c_us: quantize(eph.c_us_rad, p2(-29)) as i16,
            sqrt_a: quantize(eph.sqrt_a, p2(-19)) as u32,
            t_oe: quantize(eph.t_oe_s, p2(4)) as u16,
            fit_interval_flag: eph.fit_interval_s > 5.0 * 3600.0,

            c_ic: quantize(eph.c_ic_rad, p2(-29)) as i16,
            omega0: quantize(eph.omega0_rad, SC2RAD * p2(-31)) as i32,
            c_is: quantize(eph.c_is_rad, p2(-29)) as i16,
            i0: quantize(eph.i0_rad, SC2RAD * p2(-31)) as i32,
            c_rc: quantize(eph.c_rc_m, p2(-5)) as i16,
            omega: quantize(eph.omega_rad, SC2RAD * p2(-31)) as i32,
            dot_omega0: quantize(eph.dot_omega0_rad_s, SC2RAD * p2(-43)) as i32,
            dot_i0: quantize(eph.dot_i0_rad_s, SC2RAD * p2(-43)) as i16,
        }
    }
}

/// GPS broadcast almanac (subframes 4, 5), scaled to floating point
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Almanac {
    /// Satellite PRN number
    pub svid: u8,
    /// Eccentricity
    pub eccentricity: f64,
    /// Almanac reference time (s)
    pub t_oa_s: f64,
    /// Correction to inclination (rad), relative to 0.30 semicircles
    pub delta_i_rad: f64,
    /// Rate of right ascension (rad/s)
    pub dot_omega0_rad_s: f64,
    /// Health status
    pub sv_health: u8,
    /// Square root of semi major axis (√m)
    pub sqrt_a: f64,
    /// Longitude of ascending node (rad)
    pub omega0_rad: f64,
    /// Argument of perigee (rad)
    pub omega_rad: f64,
    /// Mean anomaly (rad)
    pub m0_rad: f64,
    /// Clock correction parameter (s)
    pub a_f0: f64,
    /// Clock correction parameter (s/s)
    pub a_f1: f64,
}

/// GPS broadcast almanac in scaled integer representation
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct AlmanacRaw {
    /// Satellite PRN number
    pub svid: u8,
    /// Eccentricity        (-21)
    pub e: u16,
    /// Almanac ref. time   ( 12, s)
    pub t_oa: u8,
    /// Correction to inc.  (-19, sc)
    pub delta_i: i16,
    /// Omega0 rate         (-38, sc/s)
    pub dot_omega0: i16,
    /// Health status
    pub sv_health: u8,
    /// Semi major axis     (-11, √m)
    pub sqrt_a: u32,
    /// Long. of asc. node  (-23, sc)
    pub omega0: i32,
    /// Argument of perigee (-23, sc)
    pub omega: i32,
    /// Mean anomaly        (-23, sc)
    pub m0: i32,
    /// Clock corr. param.  (-20, s)
    pub a_f0: i16,
    /// Clock corr. param.  (-38, s/s)
    pub a_f1: i16,
}

impl From<&AlmanacRaw> for Almanac {
    fn from(raw: &AlmanacRaw) -> Almanac {
        Almanac {
            svid: raw.svid,
            eccentricity: raw.e as f64 * p2(-21),
            t_oa_s: raw.t_oa as f64 * p2(12),
            delta_i_rad: raw.delta_i as f64 * SC2RAD * p2(-19),
            dot_omega0_rad_s: raw.dot_omega0 as f64 * SC2RAD * p2(-38),
            sv_health: raw.sv_health,
            sqrt_a: raw.sqrt_a as f64 * p2(-11),
            omega0_rad: raw.omega0 as f64 * SC2RAD * p2(-23),
            omega_rad: raw.omega as f64 * SC2RAD * p2(-23),
            m0_rad: raw.m0 as f64 * SC2RAD * p2(-23),
            a_f0: raw.a_f0 as f64 * p2(-20),
            a_f1: raw.a_f1 as f64 * p2(-38),
        }
    }
}

impl From<&Almanac> for Ephemeris {
    /// Up-cast to a degraded [Ephemeris]: 4 hour fit interval, zeroed
    /// harmonic corrections, week number left for the caller to configure.
    fn from(alm: &Almanac) -> Ephemeris {
        Ephemeris {
            svid: alm.svid,
            week: 0,
            ura: -1,
            sv_health: alm.sv_health,
            iodc: -1,
            t_oc_s: alm.t_oa_s,
            a_f1: alm.a_f1,
            a_f0: alm.a_f0,
            iode: -1,
            m0_rad: alm.m0_rad,
            eccentricity: alm.eccentricity,
            sqrt_a: alm.sqrt_a,
            t_oe_s: alm.t_oa_s,
            fit_interval_s: 4.0 * 3600.0,
            omega0_rad: alm.omega0_rad,
            // delta_i is broadcast relative to the 54 degree reference
            i0_rad: 0.30 * SC2RAD + alm.delta_i_rad,
            omega_rad: alm.omega_rad,
            dot_omega0_rad_s: alm.dot_omega0_rad_s,
            ..Default::default()
        }
    }
}
