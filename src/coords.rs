use nalgebra::Vector3;

use crate::constants::{EARTH_ECCENTRICITY_SQ, EARTH_SEMI_MAJOR_AXIS_M};

/// ECEF position or velocity, in meters (m.s⁻¹)
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Xyz(pub Vector3<f64>);

/// Geodetic coordinates on the WGS84 ellipsoid
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Llh {
    /// Latitude (radians)
    pub latitude_rad: f64,
    /// Longitude (radians)
    pub longitude_rad: f64,
    /// Height above ellipsoid (meters)
    pub height_m: f64,
}

/// Local East North Up vector, relative to an observer
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Enu(pub Vector3<f64>);

impl Xyz {
    pub fn new(x_m: f64, y_m: f64, z_m: f64) -> Self {
        Self(Vector3::new(x_m, y_m, z_m))
    }

    /// Geodetic conversion (iterative, converges to sub millimeter in 5 rounds)
    pub fn llh(&self) -> Llh {
        let (x, y, z) = (self.0[0], self.0[1], self.0[2]);
        let p = (x * x + y * y).sqrt();
        let longitude_rad = y.atan2(x);

        let mut latitude_rad = z.atan2(p * (1.0 - EARTH_ECCENTRICITY_SQ));
        let mut height_m = 0.0;

        for _ in 0..5 {
            let sin_lat = latitude_rad.sin();
            let n = EARTH_SEMI_MAJOR_AXIS_M
                / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
            height_m = p / latitude_rad.cos() - n;
            latitude_rad = z.atan2(p * (1.0 - EARTH_ECCENTRICITY_SQ * n / (n + height_m)));
        }

        Llh {
            latitude_rad,
            longitude_rad,
            height_m,
        }
    }
}

impl Llh {
    pub fn new(latitude_rad: f64, longitude_rad: f64, height_m: f64) -> Self {
        Self {
            latitude_rad,
            longitude_rad,
            height_m,
        }
    }

    /// Cartesian ECEF conversion
    pub fn xyz(&self) -> Xyz {
        let (sin_lat, cos_lat) = self.latitude_rad.sin_cos();
        let (sin_lon, cos_lon) = self.longitude_rad.sin_cos();
        let n =
            EARTH_SEMI_MAJOR_AXIS_M / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        Xyz::new(
            (n + self.height_m) * cos_lat * cos_lon,
            (n + self.height_m) * cos_lat * sin_lon,
            (n * (1.0 - EARTH_ECCENTRICITY_SQ) + self.height_m) * sin_lat,
        )
    }
}

impl Enu {
    /// Position of `target` relative to `observer`, expressed in the
    /// observer local East North Up frame.
    pub fn relative(target: &Xyz, observer: &Xyz) -> Self {
        let llh = observer.llh();
        let d = target.0 - observer.0;
        let (sin_lat, cos_lat) = llh.latitude_rad.sin_cos();
        let (sin_lon, cos_lon) = llh.longitude_rad.sin_cos();
        Self(Vector3::new(
            -sin_lon * d[0] + cos_lon * d[1],
            -sin_lat * cos_lon * d[0] - sin_lat * sin_lon * d[1] + cos_lat * d[2],
            cos_lat * cos_lon * d[0] + cos_lat * sin_lon * d[1] + sin_lat * d[2],
        ))
    }

    /// Elevation angle (radians)
    pub fn elevation_rad(&self) -> f64 {
        let horizontal = (self.0[0] * self.0[0] + self.0[1] * self.0[1]).sqrt();
        self.0[2].atan2(horizontal)
    }

    /// Azimuth angle (radians), clockwise from North
    pub fn azimuth_rad(&self) -> f64 {
        self.0[0].atan2(self.0[1])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn llh_xyz_roundtrip() {
        let llh = Llh::new(0.61, 2.44, 120.0);
        let back = llh.xyz().llh();
        assert!((back.latitude_rad - llh.latitude_rad).abs() < 1E-9);
        assert!((back.longitude_rad - llh.longitude_rad).abs() < 1E-9);
        assert!((back.height_m - llh.height_m).abs() < 1E-3);
    }

    #[test]
    fn zenith_elevation() {
        let user = Llh::new(0.0, 0.0, 0.0).xyz();
        let above = Xyz::new(user.0[0] + 20.0E6, 0.0, 0.0);
        let enu = Enu::relative(&above, &user);
        assert!((enu.elevation_rad().to_degrees() - 90.0).abs() < 1E-6);
    }
}
