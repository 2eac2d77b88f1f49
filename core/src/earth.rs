//! Earth-related constants and functions
//!
//! This module contains the ellipsoid model used by the mechanization equations and the
//! error-state filter. The Earth is modeled as an ellipsoid of revolution described by an
//! [`Ellipsoid`] value (WGS84 by default) with a semi-major axis, flattening, rotation rate,
//! and gravitational constant. Normal gravity is modeled as a function of latitude and
//! altitude using the Somigliana method with a second-order altitude correction.
//!
//! The ellipsoid parameters are carried as a value rather than free-floating globals so
//! that alternate models (a non-rotating Earth for static fixtures, a sphere, a different
//! datum) can be injected into [`crate::strapdown::mechanize`] and the filter.
//!
//! # Coordinate Systems
//! This crate is concerned with three frames:
//! - the Earth-centered Earth-fixed (ECEF) frame, in which satellite positions and
//!   velocities are expressed,
//! - the local-level North-East-Down (NED) frame, in which velocity is integrated,
//! - the body frame of the vehicle, in which the IMU reports specific force and angular rate.
//!
//! Geodetic positions are latitude and longitude in radians and altitude in meters,
//! positive up. All local-level vectors in this module are NED.
//!
//! The radii of curvature divide by `cos(latitude)` in places. Behavior at exactly
//! ±90° latitude is undefined.

// ----------
// Working notes:
// The ECEF <-> NED rotation is the classic Groves eq. 2.150. Position conversion back from ECEF is
// the iterative Bowring-style solution; it converges to sub-millimeter in a handful of passes for
// terrestrial and orbital radii alike.
// ----------
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Speed of light in vacuum, m/s (used to express clock states in meters)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Linear altitude coefficient of the north gravity component (Groves eq. 2.140)
const NORTH_GRAVITY_COEFFICIENT: f64 = -8.08e-9;

/// Ellipsoid and rotation parameters of an Earth model.
///
/// [`WGS84`] is the model used everywhere by default. The fields are public so that test
/// fixtures can derive variants, e.g. `Ellipsoid { rotation_rate: 0.0, ..WGS84 }`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Semi-major (equatorial) radius in meters
    pub equatorial_radius: f64,
    /// Semi-minor (polar) radius in meters
    pub polar_radius: f64,
    /// Flattening factor ($f$)
    pub flattening: f64,
    /// First eccentricity squared ($e^2$)
    pub eccentricity_squared: f64,
    /// Earth's rotation rate in rad/s ($\omega_{ie}$)
    pub rotation_rate: f64,
    /// Earth's gravitational constant in m^3/s^2 ($\mu$)
    pub gravitational_constant: f64,
    /// Normal gravity at the equator in m/s^2 ($g_e$)
    pub equatorial_gravity: f64,
    /// Somigliana's constant ($k$)
    pub somigliana_constant: f64,
}

/// The WGS84 ellipsoid
pub const WGS84: Ellipsoid = Ellipsoid {
    equatorial_radius: 6_378_137.0,
    polar_radius: 6_356_752.314_245_179,
    flattening: 1.0 / 298.257_223_563,
    eccentricity_squared: 6.694_379_990_141_317e-3,
    rotation_rate: 7.292_115e-5,
    gravitational_constant: 3.986_004_418e14,
    equatorial_gravity: 9.780_325_335_9,
    somigliana_constant: 0.001_931_853,
};

impl Default for Ellipsoid {
    fn default() -> Self {
        WGS84
    }
}

/// Latitude-dependent scalars of the ellipsoid at one position.
///
/// These are recomputed on every mechanization step from the current latitude and
/// altitude and are never persisted across steps.
#[derive(Clone, Copy, Debug)]
pub struct LocalEarth {
    /// Latitude in radians the terms were evaluated at
    pub latitude: f64,
    /// Altitude in meters the terms were evaluated at
    pub altitude: f64,
    pub sin_lat: f64,
    pub cos_lat: f64,
    pub tan_lat: f64,
    /// Meridian radius of curvature ($R_N$) in meters
    pub meridian_radius: f64,
    /// Transverse (prime vertical) radius of curvature ($R_E$) in meters
    pub transverse_radius: f64,
    /// Normal gravity magnitude on the ellipsoid surface ($g_0$) in m/s^2
    pub surface_gravity: f64,
    ellipsoid: Ellipsoid,
}

impl Ellipsoid {
    /// The same ellipsoid with the rotation rate set to zero.
    ///
    /// Useful for static fixtures where a zero gyro reading must leave the attitude untouched.
    pub fn non_rotating(&self) -> Ellipsoid {
        Ellipsoid {
            rotation_rate: 0.0,
            ..*self
        }
    }
    /// Evaluate the latitude trig terms, radii of curvature, and surface gravity.
    ///
    /// # Arguments
    /// - `latitude` - geodetic latitude in radians
    /// - `altitude` - altitude above the ellipsoid in meters
    ///
    /// # Example
    /// ```rust
    /// use gnss_ins::earth::WGS84;
    /// let local = WGS84.local(45.0_f64.to_radians(), 100.0);
    /// assert!(local.meridian_radius < local.transverse_radius);
    /// ```
    pub fn local(&self, latitude: f64, altitude: f64) -> LocalEarth {
        let sin_lat = latitude.sin();
        let cos_lat = latitude.cos();
        let sin_lat_sq = sin_lat * sin_lat;
        let t = 1.0 - self.eccentricity_squared * sin_lat_sq;
        let sqrt_t = t.sqrt();
        LocalEarth {
            latitude,
            altitude,
            sin_lat,
            cos_lat,
            tan_lat: sin_lat / cos_lat,
            meridian_radius: self.equatorial_radius * (1.0 - self.eccentricity_squared)
                / (t * sqrt_t),
            transverse_radius: self.equatorial_radius / sqrt_t,
            surface_gravity: self.equatorial_gravity * (1.0 + self.somigliana_constant * sin_lat_sq)
                / sqrt_t,
            ellipsoid: *self,
        }
    }
    /// Principal radii of curvature $(R_N, R_E)$ at the given latitude in radians.
    pub fn principal_radii(&self, latitude: f64) -> (f64, f64) {
        let local = self.local(latitude, 0.0);
        (local.meridian_radius, local.transverse_radius)
    }
    /// Gravity vector (NED, m/s^2) at the given latitude (radians) and altitude (meters).
    ///
    /// # Example
    /// ```rust
    /// use gnss_ins::earth::WGS84;
    /// let g = WGS84.gravity_vector(0.0, 0.0);
    /// assert!((g[2] - 9.7803253359).abs() < 1e-9);
    /// ```
    pub fn gravity_vector(&self, latitude: f64, altitude: f64) -> Vector3<f64> {
        self.local(latitude, altitude).gravity()
    }
    /// Earth rotation rate resolved in the local-level frame (NED, rad/s).
    pub fn earth_rate_vector(&self, latitude: f64) -> Vector3<f64> {
        self.local(latitude, 0.0).earth_rate()
    }
    /// Transport rate of the local-level frame (NED, rad/s) for horizontal motion over the
    /// ellipsoid at the given latitude (radians) and altitude (meters).
    pub fn transport_rate_vector(
        &self,
        latitude: f64,
        altitude: f64,
        velocity_north: f64,
        velocity_east: f64,
    ) -> Vector3<f64> {
        self.local(latitude, altitude)
            .transport_rate(&Vector3::new(velocity_north, velocity_east, 0.0))
    }
    /// Convert a geodetic position to ECEF coordinates (Groves eq. 2.112).
    ///
    /// # Arguments
    /// - `latitude` - geodetic latitude in radians
    /// - `longitude` - longitude in radians
    /// - `altitude` - altitude above the ellipsoid in meters
    ///
    /// # Returns
    /// ECEF position in meters
    pub fn geodetic_to_ecef(&self, latitude: f64, longitude: f64, altitude: f64) -> Vector3<f64> {
        let local = self.local(latitude, altitude);
        let r_e = local.transverse_radius;
        Vector3::new(
            (r_e + altitude) * local.cos_lat * longitude.cos(),
            (r_e + altitude) * local.cos_lat * longitude.sin(),
            (r_e * (1.0 - self.eccentricity_squared) + altitude) * local.sin_lat,
        )
    }
    /// Convert an ECEF position to geodetic latitude, longitude (radians) and altitude (meters).
    ///
    /// # Example
    /// ```rust
    /// use gnss_ins::earth::WGS84;
    /// let ecef = WGS84.geodetic_to_ecef(0.5, -1.2, 350.0);
    /// let (lat, lon, alt) = WGS84.ecef_to_geodetic(&ecef);
    /// assert!((lat - 0.5).abs() < 1e-11);
    /// assert!((lon + 1.2).abs() < 1e-11);
    /// assert!((alt - 350.0).abs() < 1e-4);
    /// ```
    pub fn ecef_to_geodetic(&self, ecef: &Vector3<f64>) -> (f64, f64, f64) {
        const MAX_ITERATIONS: usize = 10;
        const TOLERANCE: f64 = 1e-12;
        let e2 = self.eccentricity_squared;
        let p = (ecef[0] * ecef[0] + ecef[1] * ecef[1]).sqrt();
        let longitude = ecef[1].atan2(ecef[0]);
        let mut latitude = ecef[2].atan2(p * (1.0 - e2));
        let mut altitude = 0.0;
        for _ in 0..MAX_ITERATIONS {
            let sin_lat = latitude.sin();
            let r_e = self.equatorial_radius / (1.0 - e2 * sin_lat * sin_lat).sqrt();
            altitude = if latitude.cos().abs() > 1e-9 {
                p / latitude.cos() - r_e
            } else {
                ecef[2].abs() - r_e * (1.0 - e2)
            };
            let next = ecef[2].atan2(p * (1.0 - e2 * r_e / (r_e + altitude)));
            let change = (next - latitude).abs();
            latitude = next;
            if change < TOLERANCE {
                break;
            }
        }
        (latitude, longitude, altitude)
    }
}

impl LocalEarth {
    /// Gravity vector in NED (Groves eq. 2.139/2.140).
    ///
    /// The down component is normal gravity with the second-order altitude correction; the
    /// north component is the small oblateness term that appears away from the surface. The
    /// east component is zero under this model.
    pub fn gravity(&self) -> Vector3<f64> {
        let e = &self.ellipsoid;
        let h = self.altitude;
        let h_over_r0 = h / e.equatorial_radius;
        let centrifugal_ratio = e.rotation_rate * e.rotation_rate
            * e.equatorial_radius
            * e.equatorial_radius
            * e.polar_radius
            / e.gravitational_constant;
        let sin_lat_sq = self.sin_lat * self.sin_lat;
        let down = self.surface_gravity
            * (1.0
                - 2.0 * h_over_r0
                    * (1.0 + e.flattening * (1.0 - 2.0 * sin_lat_sq) + centrifugal_ratio)
                + 3.0 * h_over_r0 * h_over_r0);
        Vector3::new(
            NORTH_GRAVITY_COEFFICIENT * h * (2.0 * self.latitude).sin(),
            0.0,
            down,
        )
    }
    /// Earth rotation rate resolved in NED (Groves eq. 2.123).
    pub fn earth_rate(&self) -> Vector3<f64> {
        let rate = self.ellipsoid.rotation_rate;
        Vector3::new(rate * self.cos_lat, 0.0, -rate * self.sin_lat)
    }
    /// Transport rate in NED for the given NED velocity (Groves eq. 5.44).
    pub fn transport_rate(&self, velocity: &Vector3<f64>) -> Vector3<f64> {
        let east_term = velocity[1] / (self.transverse_radius + self.altitude);
        Vector3::new(
            east_term,
            -velocity[0] / (self.meridian_radius + self.altitude),
            -east_term * self.tan_lat,
        )
    }
    /// Geocentric radius approximation $\sqrt{R_N R_E}$ used for the gravity gradient.
    pub fn mean_radius(&self) -> f64 {
        (self.meridian_radius * self.transverse_radius).sqrt()
    }
}

/// Convert a three-element vector to a skew-symmetric matrix
///
/// $$
/// x = \begin{bmatrix} a \\\\ b \\\\ c \end{bmatrix} \rightarrow X = \begin{bmatrix} 0 & -c & b \\\\ c & 0 & -a \\\\ -b & a & 0 \end{bmatrix}
/// $$
///
/// # Example
/// ```rust
/// use nalgebra::Vector3;
/// use gnss_ins::earth;
/// let v = Vector3::new(1.0, 2.0, 3.0);
/// let skew = earth::vector_to_skew_symmetric(&v);
/// assert_eq!(skew * v, Vector3::zeros());
/// ```
pub fn vector_to_skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v[2], v[1], v[2], 0.0, -v[0], -v[1], v[0], 0.0)
}
/// Rotation from the local-level NED frame to ECEF ($C_n^e$, Groves eq. 2.150).
///
/// # Arguments
/// - `latitude` - geodetic latitude in radians
/// - `longitude` - longitude in radians
pub fn ned_to_ecef(latitude: f64, longitude: f64) -> Matrix3<f64> {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let (sin_lon, cos_lon) = longitude.sin_cos();
    Matrix3::new(
        -sin_lat * cos_lon,
        -sin_lon,
        -cos_lat * cos_lon,
        -sin_lat * sin_lon,
        cos_lon,
        -cos_lat * sin_lon,
        cos_lat,
        0.0,
        -sin_lat,
    )
}
/// Rotation from ECEF to the local-level NED frame ($C_e^n$).
pub fn ecef_to_ned(latitude: f64, longitude: f64) -> Matrix3<f64> {
    ned_to_ecef(latitude, longitude).transpose()
}
/// Resolve a NED velocity in ECEF axes at the given geodetic latitude and longitude.
pub fn ned_velocity_to_ecef(latitude: f64, longitude: f64, velocity: &Vector3<f64>) -> Vector3<f64> {
    ned_to_ecef(latitude, longitude) * velocity
}
/// Resolve an ECEF velocity in NED axes at the given geodetic latitude and longitude.
pub fn ecef_velocity_to_ned(latitude: f64, longitude: f64, velocity: &Vector3<f64>) -> Vector3<f64> {
    ecef_to_ned(latitude, longitude) * velocity
}
