/// Speed of light in m.s⁻¹
pub const SPEED_OF_LIGHT_M_S: f64 = 2.99792458E8;

/// L1 carrier frequency (Hz)
pub const L1_FREQUENCY_HZ: f64 = 1575.42E6;

/// L2 carrier frequency (Hz)
pub const L2_FREQUENCY_HZ: f64 = 1227.6E6;

/// Group delay scaling between L1 and L2, see IS-GPS-200 §20.3.3.3.3.2
pub const GAMMA_L1_L2: f64 = (77.0 * 77.0) / (60.0 * 60.0);

/// Earth angular velocity, in WGS84 frame rad/s
pub const EARTH_ANGULAR_VEL_RAD_S: f64 = 7.2921151467E-5;

/// Earth gravitational constant (m^3 s-2)
pub const EARTH_GRAVITATION_MU_M3_S2: f64 = 3.986005E14;

/// WGS84 Earth Frame Ellipsoid semi-major axis (m)
pub const EARTH_SEMI_MAJOR_AXIS_M: f64 = 6378137.0_f64;

/// WGS84 first eccentricity squared
pub const EARTH_ECCENTRICITY_SQ: f64 = 6.69437999014E-3;

/// Semicircles to radians, with the broadcast π value (IS-GPS-200 §20.3.3.4.3)
pub const SC2RAD: f64 = 3.1415926535898;

/// Eccentric anomaly convergence threshold of the Kepler solver
pub const KEPLER_DELTA_LIMIT: f64 = 1E-12;

/// Kepler solver iteration cap. When reached, the last iterate is used as is.
pub const KEPLER_MAX_ITER: usize = 10;
