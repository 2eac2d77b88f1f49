//! Strapdown mechanization in the local-level (NED) frame
//!
//! This module owns the kinematic navigation state and the stand-alone [`mechanize`] function
//! that advances it by one IMU interval. The equations follow chapter 5.4 of _Principles of
//! GNSS, Inertial, and Multisensor Integrated Navigation Systems, 2nd Edition_ by Paul D.
//! Groves, integrated as a first-order scheme:
//!
//! 1. Earth-model terms (radii, gravity, Earth rate, transport rate) are evaluated once from the
//!    state at the start of the interval, using the pre-update velocity.
//! 2. Attitude is integrated as a quaternion. The body-frame rotation vector is
//!    $\psi = (\omega_{ib}^b - C_b^{n\,T}(\omega_{ie}^n + \omega_{en}^n))\,\Delta t$ and the
//!    increment is composed onto the current quaternion, then renormalized.
//! 3. Specific force is resolved with the attitude from the start of the interval and the
//!    velocity increment is $(C_b^n f^b + g^n - (\omega_{ie}^n + 2\omega_{en}^n) \times v^n)\Delta t$.
//! 4. Latitude, longitude and altitude advance with the trapezoidal velocity $v + \Delta v / 2$.
//! 5. The rotation matrix is refreshed from the new quaternion and the velocity is committed.
//!
//! Evaluating the Earth terms at the start of the interval rather than the midpoint is a
//! first-order approximation. It is kept so that results are reproducible against existing
//! reference output; a midpoint scheme would be more accurate at high dynamics.
//!
//! [`mechanize`] does no input validation. `dt` must be positive and the samples finite; NaN or
//! infinite inputs propagate into the state.
use std::fmt::{self, Display};

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::attitude;
use crate::earth::{self, Ellipsoid};

/// Raw IMU sample in the body frame.
///
/// Specific force is what an accelerometer senses, so a vehicle at rest reads the negative
/// of the gravity vector (about -9.8 m/s^2 on the body z axis when level).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IMUData {
    /// Specific force in m/s^2, body frame x, y, z axis
    pub accel: Vector3<f64>,
    /// Angular rate in rad/s, body frame x, y, z axis
    pub gyro: Vector3<f64>,
}
impl IMUData {
    pub fn new(gyro: Vector3<f64>, accel: Vector3<f64>) -> IMUData {
        IMUData { accel, gyro }
    }
}
impl Display for IMUData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IMUData {{ accel: [{:.4}, {:.4}, {:.4}], gyro: [{:.6}, {:.6}, {:.6}] }}",
            self.accel[0], self.accel[1], self.accel[2], self.gyro[0], self.gyro[1], self.gyro[2]
        )
    }
}

/// Kinematic navigation state: geodetic position, NED velocity and body-to-NED attitude.
///
/// The attitude is held as a unit quaternion together with its rotation matrix. Both are
/// private and only change through the setters and [`mechanize`], which always update them
/// as a pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationState {
    /// Latitude in radians
    pub latitude: f64,
    /// Longitude in radians
    pub longitude: f64,
    /// Altitude above the ellipsoid in meters, positive up
    pub altitude: f64,
    /// Velocity in m/s, north/east/down
    pub velocity: Vector3<f64>,
    quaternion: UnitQuaternion<f64>,
    rotation: Rotation3<f64>,
}
impl Default for NavigationState {
    fn default() -> Self {
        NavigationState {
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            velocity: Vector3::zeros(),
            quaternion: UnitQuaternion::identity(),
            rotation: Rotation3::identity(),
        }
    }
}
impl Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (roll, pitch, yaw) = self.euler_angles();
        write!(
            f,
            "NavigationState {{ lat: {:.7} deg, lon: {:.7} deg, alt: {:.3} m, v_n: {:.3} m/s, v_e: {:.3} m/s, v_d: {:.3} m/s, attitude: [{:.3} deg, {:.3} deg, {:.3} deg] }}",
            self.latitude.to_degrees(),
            self.longitude.to_degrees(),
            self.altitude,
            self.velocity[0],
            self.velocity[1],
            self.velocity[2],
            roll.to_degrees(),
            pitch.to_degrees(),
            yaw.to_degrees()
        )
    }
}
impl NavigationState {
    /// Set latitude and longitude (radians) and altitude (meters).
    pub fn set_position(&mut self, latitude: f64, longitude: f64, altitude: f64) {
        self.latitude = latitude;
        self.longitude = longitude;
        self.altitude = altitude;
    }
    /// Set the north, east and down velocity in m/s.
    pub fn set_velocity(&mut self, north: f64, east: f64, down: f64) {
        self.velocity = Vector3::new(north, east, down);
    }
    /// Set the attitude from roll, pitch and yaw in radians (ZYX sequence).
    pub fn set_attitude(&mut self, roll: f64, pitch: f64, yaw: f64) {
        self.set_quaternion(attitude::quaternion_from_euler(roll, pitch, yaw));
    }
    /// Set the attitude from a body-to-NED rotation matrix.
    pub fn set_attitude_matrix(&mut self, matrix: &Matrix3<f64>) {
        self.set_quaternion(attitude::quaternion_from_matrix(matrix));
    }
    /// Set the attitude quaternion; the rotation matrix is derived from it.
    pub fn set_quaternion(&mut self, quaternion: UnitQuaternion<f64>) {
        self.quaternion = quaternion;
        self.rotation = quaternion.to_rotation_matrix();
    }
    /// Body-to-NED attitude quaternion
    pub fn quaternion(&self) -> &UnitQuaternion<f64> {
        &self.quaternion
    }
    /// Body-to-NED rotation matrix ($C_b^n$), always the matrix of [`Self::quaternion`]
    pub fn attitude_matrix(&self) -> &Matrix3<f64> {
        self.rotation.matrix()
    }
    /// Roll, pitch and yaw in radians
    pub fn euler_angles(&self) -> (f64, f64, f64) {
        attitude::euler_from_quaternion(&self.quaternion)
    }
    /// Antenna position in ECEF meters
    pub fn ecef_position(&self, ellipsoid: &Ellipsoid) -> Vector3<f64> {
        ellipsoid.geodetic_to_ecef(self.latitude, self.longitude, self.altitude)
    }
    /// Velocity resolved in ECEF axes, m/s
    pub fn ecef_velocity(&self) -> Vector3<f64> {
        earth::ned_velocity_to_ecef(self.latitude, self.longitude, &self.velocity)
    }
}

/// Advance the navigation state by one IMU interval.
///
/// # Arguments
/// - `state` - the navigation state, updated in place
/// - `ellipsoid` - Earth model supplying radii, gravity and rotation rate
/// - `imu` - body-frame angular rate and specific force over the interval
/// - `dt` - interval length in seconds, must be positive
///
/// # Example
/// ```rust
/// use nalgebra::Vector3;
/// use gnss_ins::earth::WGS84;
/// use gnss_ins::strapdown::{mechanize, IMUData, NavigationState};
/// let mut state = NavigationState::default();
/// state.set_position(0.5, 1.0, 100.0);
/// // Free fall
/// let imu = IMUData::new(Vector3::zeros(), Vector3::zeros());
/// mechanize(&mut state, &WGS84, &imu, 0.1);
/// assert!(state.velocity[2] > 0.97);
/// ```
pub fn mechanize(state: &mut NavigationState, ellipsoid: &Ellipsoid, imu: &IMUData, dt: f64) {
    let local = ellipsoid.local(state.latitude, state.altitude);
    let gravity = local.gravity();
    let earth_rate = local.earth_rate();
    let transport_rate = local.transport_rate(&state.velocity);
    let coriolis_rate = earth_rate + 2.0 * transport_rate;
    let c_0 = *state.rotation.matrix();

    // Attitude
    let psi = (imu.gyro - c_0.transpose() * (earth_rate + transport_rate)) * dt;
    let increment = attitude::rotation_increment(&psi);
    let quaternion = UnitQuaternion::new_normalize(state.quaternion.into_inner() * increment);

    // Velocity, with the specific force resolved by the pre-update attitude
    let specific_force = c_0 * imu.accel;
    let delta_v = (specific_force + gravity - coriolis_rate.cross(&state.velocity)) * dt;

    // Position, trapezoidal in velocity
    let mean_velocity = state.velocity + 0.5 * delta_v;
    state.latitude += mean_velocity[0] / (local.meridian_radius + state.altitude) * dt;
    state.longitude +=
        mean_velocity[1] / ((local.transverse_radius + state.altitude) * local.cos_lat) * dt;
    state.altitude -= mean_velocity[2] * dt;

    state.set_quaternion(quaternion);
    state.velocity += delta_v;
}

/// A navigation state bound to an Earth model.
///
/// Convenience owner for pure dead-reckoning use; the filter keeps its own state and calls
/// [`mechanize`] directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct Strapdown {
    pub state: NavigationState,
    pub ellipsoid: Ellipsoid,
}
impl Strapdown {
    pub fn new(ellipsoid: Ellipsoid) -> Strapdown {
        Strapdown {
            state: NavigationState::default(),
            ellipsoid,
        }
    }
    pub fn set_position(&mut self, latitude: f64, longitude: f64, altitude: f64) {
        self.state.set_position(latitude, longitude, altitude);
    }
    pub fn set_velocity(&mut self, north: f64, east: f64, down: f64) {
        self.state.set_velocity(north, east, down);
    }
    pub fn set_attitude(&mut self, roll: f64, pitch: f64, yaw: f64) {
        self.state.set_attitude(roll, pitch, yaw);
    }
    pub fn set_attitude_matrix(&mut self, matrix: &Matrix3<f64>) {
        self.state.set_attitude_matrix(matrix);
    }
    pub fn mechanize(&mut self, imu: &IMUData, dt: f64) {
        mechanize(&mut self.state, &self.ellipsoid, imu, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earth::WGS84;
    use assert_approx_eq::assert_approx_eq;

    fn state_at(latitude_deg: f64, longitude_deg: f64, altitude: f64) -> NavigationState {
        let mut state = NavigationState::default();
        state.set_position(latitude_deg.to_radians(), longitude_deg.to_radians(), altitude);
        state
    }

    #[test]
    fn setters_keep_attitude_pair_consistent() {
        let mut state = NavigationState::default();
        state.set_attitude(0.1, -0.05, 1.2);
        let from_q = *state.quaternion().to_rotation_matrix().matrix();
        assert_eq!(&from_q, state.attitude_matrix());
        let (roll, pitch, yaw) = state.euler_angles();
        assert_approx_eq!(roll, 0.1, 1e-12);
        assert_approx_eq!(pitch, -0.05, 1e-12);
        assert_approx_eq!(yaw, 1.2, 1e-12);

        let target = *Rotation3::from_euler_angles(-0.3, 0.2, -2.0).matrix();
        state.set_attitude_matrix(&target);
        let from_q = *state.quaternion().to_rotation_matrix().matrix();
        assert_eq!(&from_q, state.attitude_matrix());
        for i in 0..3 {
            for j in 0..3 {
                assert_approx_eq!(state.attitude_matrix()[(i, j)], target[(i, j)], 1e-12);
            }
        }
    }
    #[test]
    fn free_fall() {
        let mut state = state_at(40.0, -75.0, 1000.0);
        let ellipsoid = WGS84.non_rotating();
        let g = ellipsoid.gravity_vector(state.latitude, state.altitude);
        let imu = IMUData::default();
        mechanize(&mut state, &ellipsoid, &imu, 0.1);
        assert_approx_eq!(state.velocity[2], g[2] * 0.1, 1e-12);
        assert_approx_eq!(state.altitude, 1000.0 - 0.5 * g[2] * 0.01, 1e-9);
    }
    #[test]
    fn static_on_rotating_earth() {
        // Level, at rest, gyros sensing exactly the Earth rate
        let mut state = state_at(32.0, -85.5, 200.0);
        let initial = state;
        let g = WGS84.gravity_vector(state.latitude, state.altitude);
        let imu = IMUData::new(WGS84.earth_rate_vector(state.latitude), -g);
        for _ in 0..100 {
            mechanize(&mut state, &WGS84, &imu, 0.01);
        }
        assert_approx_eq!(state.latitude, initial.latitude, 1e-15);
        assert_approx_eq!(state.longitude, initial.longitude, 1e-15);
        assert_approx_eq!(state.altitude, initial.altitude, 1e-9);
        assert_approx_eq!(state.velocity.norm(), 0.0, 1e-12);
        assert_approx_eq!(state.quaternion().w, 1.0, 1e-12);
        assert_approx_eq!(state.quaternion().norm(), 1.0, 1e-12);
    }
    #[test]
    fn north_velocity_moves_latitude() {
        let mut state = state_at(45.0, 0.0, 0.0);
        state.set_velocity(100.0, 0.0, 0.0);
        let ellipsoid = WGS84.non_rotating();
        let g = ellipsoid.gravity_vector(state.latitude, state.altitude);
        let (r_n, _) = ellipsoid.principal_radii(state.latitude);
        // Gyro pitches the body with the local level so the attitude stays level
        let transport = ellipsoid.transport_rate_vector(state.latitude, 0.0, 100.0, 0.0);
        let imu = IMUData::new(transport, -g);
        let lat_0 = state.latitude;
        mechanize(&mut state, &ellipsoid, &imu, 1.0);
        assert_approx_eq!(state.latitude - lat_0, 100.0 / r_n, 1e-9);
        assert_approx_eq!(state.longitude, 0.0, 1e-15);
        assert_approx_eq!(state.velocity[0], 100.0, 1e-2);
    }
    #[test]
    fn east_velocity_moves_longitude() {
        let mut state = state_at(60.0, 10.0, 0.0);
        state.set_velocity(0.0, 50.0, 0.0);
        let ellipsoid = WGS84.non_rotating();
        let (_, r_e) = ellipsoid.principal_radii(state.latitude);
        let g = ellipsoid.gravity_vector(state.latitude, 0.0);
        let imu = IMUData::new(Vector3::zeros(), -g);
        let lon_0 = state.longitude;
        mechanize(&mut state, &ellipsoid, &imu, 0.5);
        let expected = 50.0 / (r_e * 60.0_f64.to_radians().cos()) * 0.5;
        assert_approx_eq!(state.longitude - lon_0, expected, 1e-9);
    }
    #[test]
    fn yaw_rate_integrates() {
        let mut state = state_at(0.0, 0.0, 0.0);
        let ellipsoid = WGS84.non_rotating();
        let g = ellipsoid.gravity_vector(0.0, 0.0);
        let imu = IMUData::new(Vector3::new(0.0, 0.0, 0.1), -g);
        for _ in 0..100 {
            mechanize(&mut state, &ellipsoid, &imu, 0.01);
        }
        let (roll, pitch, yaw) = state.euler_angles();
        assert_approx_eq!(roll, 0.0, 1e-12);
        assert_approx_eq!(pitch, 0.0, 1e-12);
        assert_approx_eq!(yaw, 0.1, 1e-12);
        assert_approx_eq!(state.quaternion().norm(), 1.0, 1e-12);
    }
    #[test]
    fn specific_force_uses_pre_update_attitude() {
        // A single large step: the specific force must be resolved with the initial (level)
        // attitude, not the rotated one
        let mut state = state_at(0.0, 0.0, 0.0);
        let ellipsoid = WGS84.non_rotating();
        let g = ellipsoid.gravity_vector(0.0, 0.0);
        let imu = IMUData::new(
            Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vector3::new(1.0, 0.0, -g[2]),
        );
        mechanize(&mut state, &ellipsoid, &imu, 1.0);
        assert_approx_eq!(state.velocity[0], 1.0, 1e-12);
        assert_approx_eq!(state.velocity[1], 0.0, 1e-12);
    }
    #[test]
    fn strapdown_wrapper() {
        let mut strapdown = Strapdown::new(WGS84);
        strapdown.set_position(0.2, 0.3, 10.0);
        strapdown.set_velocity(1.0, 2.0, 3.0);
        strapdown.set_attitude(0.0, 0.0, 0.5);
        let mut reference = strapdown.state;
        let imu = IMUData::new(Vector3::new(0.01, 0.0, 0.0), Vector3::new(0.0, 0.0, -9.8));
        strapdown.mechanize(&imu, 0.01);
        mechanize(&mut reference, &WGS84, &imu, 0.01);
        assert_eq!(strapdown.state, reference);
        assert!(format!("{}", strapdown.state).starts_with("NavigationState"));
    }
}
