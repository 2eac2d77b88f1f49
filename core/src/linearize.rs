//! Linearized error-state models for the navigation filter
//!
//! The filter tracks the 17-element error state
//!
//! $$
//! \delta x = [\delta p^n, \delta v^n, \phi^n, \delta b_a, \delta b_g, \delta b, \delta \dot b]
//! $$
//!
//! with every error defined as truth minus estimate:
//! - $\delta p^n$: position error in meters along north, east, down,
//! - $\delta v^n$: NED velocity error in m/s,
//! - $\phi^n$: small-angle attitude error resolved in the local-level frame, such that
//!   $C_{b,true}^n = (I + [\phi \times]) C_b^n$,
//! - $\delta b_a$, $\delta b_g$: accelerometer (m/s^2) and gyroscope (rad/s) bias errors,
//! - $\delta b$, $\delta \dot b$: receiver clock bias (m) and drift (m/s) errors.
//!
//! The continuous-time dynamics follow Groves 2nd ed. section 14.2.4 with the Coriolis rate used
//! by [`crate::strapdown::mechanize`], and are discretized to first order, $\Phi = I + F \Delta t$.
//! Bias states are random walks and the clock is a two-state constant-drift model driven by the
//! oscillator's Allan-variance coefficients.
use nalgebra::{DMatrix, DVector, Matrix3, UnitQuaternion, Vector3};

use crate::earth::{self, Ellipsoid, LocalEarth, SPEED_OF_LIGHT, vector_to_skew_symmetric};
use crate::filter::{ClockSpec, ImuSpec};
use crate::least_squares::range_and_rate;
use crate::observation::ObservationEpoch;
use crate::strapdown::NavigationState;

/// Number of error states
pub const ERROR_STATES: usize = 17;
/// Index of the north position error; east and down follow
pub const POSITION: usize = 0;
/// Index of the north velocity error; east and down follow
pub const VELOCITY: usize = 3;
/// Index of the first attitude error component
pub const ATTITUDE: usize = 6;
/// Index of the first accelerometer bias error
pub const ACCEL_BIAS: usize = 9;
/// Index of the first gyroscope bias error
pub const GYRO_BIAS: usize = 12;
/// Index of the clock bias error
pub const CLOCK_BIAS: usize = 15;
/// Index of the clock drift error
pub const CLOCK_DRIFT: usize = 16;

fn set_block(m: &mut DMatrix<f64>, row: usize, col: usize, block: &Matrix3<f64>) {
    m.view_mut((row, col), (3, 3)).copy_from(block);
}

/// Discrete error-state transition matrix $\Phi = I + F \Delta t$.
///
/// # Arguments
/// - `state` - mechanized navigation state to linearize about
/// - `local` - Earth terms evaluated at the state's latitude and altitude
/// - `specific_force` - bias-compensated specific force in the body frame, m/s^2
/// - `dt` - propagation interval in seconds
///
/// # Returns
/// 17×17 transition matrix
pub fn error_state_transition_jacobian(
    state: &NavigationState,
    local: &LocalEarth,
    specific_force: &Vector3<f64>,
    dt: f64,
) -> DMatrix<f64> {
    let mut f = DMatrix::<f64>::zeros(ERROR_STATES, ERROR_STATES);
    let c_bn = state.attitude_matrix();
    let earth_rate = local.earth_rate();
    let transport_rate = local.transport_rate(&state.velocity);

    let (earth_rate_by_position, transport_rate_by_position) = rate_position_partials(state, local);
    let transport_rate_by_velocity = transport_rate_velocity_partial(state, local);
    let velocity_skew = vector_to_skew_symmetric(&state.velocity);

    // Position
    set_block(&mut f, POSITION, VELOCITY, &Matrix3::identity());

    // Velocity
    let coriolis_rate = earth_rate + 2.0 * transport_rate;
    set_block(
        &mut f,
        VELOCITY,
        VELOCITY,
        &(-vector_to_skew_symmetric(&coriolis_rate)
            + 2.0 * velocity_skew * transport_rate_by_velocity),
    );
    let mut velocity_by_position =
        velocity_skew * (earth_rate_by_position + 2.0 * transport_rate_by_position);
    // Vertical gravity gradient
    velocity_by_position[(2, 2)] +=
        2.0 * local.surface_gravity / (local.mean_radius() + state.altitude);
    set_block(&mut f, VELOCITY, POSITION, &velocity_by_position);
    let f_n = c_bn * specific_force;
    set_block(&mut f, VELOCITY, ATTITUDE, &(-vector_to_skew_symmetric(&f_n)));
    set_block(&mut f, VELOCITY, ACCEL_BIAS, &(-c_bn));

    // Attitude
    let inertial_rate = earth_rate + transport_rate;
    set_block(
        &mut f,
        ATTITUDE,
        POSITION,
        &(-(earth_rate_by_position + transport_rate_by_position)),
    );
    set_block(&mut f, ATTITUDE, VELOCITY, &(-transport_rate_by_velocity));
    set_block(&mut f, ATTITUDE, ATTITUDE, &(-vector_to_skew_symmetric(&inertial_rate)));
    set_block(&mut f, ATTITUDE, GYRO_BIAS, &(-c_bn));

    // Clock
    f[(CLOCK_BIAS, CLOCK_DRIFT)] = 1.0;

    DMatrix::<f64>::identity(ERROR_STATES, ERROR_STATES) + f * dt
}

/// Jacobian of the transport rate with respect to NED velocity.
fn transport_rate_velocity_partial(state: &NavigationState, local: &LocalEarth) -> Matrix3<f64> {
    let east_radius = local.transverse_radius + state.altitude;
    let north_radius = local.meridian_radius + state.altitude;
    Matrix3::new(
        0.0, 1.0 / east_radius, 0.0,
        -1.0 / north_radius, 0.0, 0.0,
        0.0, -local.tan_lat / east_radius, 0.0,
    )
}

/// Jacobians of the Earth rate and the transport rate with respect to the NED position error.
///
/// A north error moves the latitude by $\delta p_N / (R_N + h)$ and a down error lowers the
/// altitude. The variation of the radii of curvature with latitude is neglected.
fn rate_position_partials(
    state: &NavigationState,
    local: &LocalEarth,
) -> (Matrix3<f64>, Matrix3<f64>) {
    let east_radius = local.transverse_radius + state.altitude;
    let north_radius = local.meridian_radius + state.altitude;
    let (v_n, v_e) = (state.velocity[0], state.velocity[1]);
    let earth_rate = local.earth_rate();

    let mut earth_rate_by_position = Matrix3::zeros();
    earth_rate_by_position[(0, 0)] = earth_rate[2] / north_radius;
    earth_rate_by_position[(2, 0)] = -earth_rate[0] / north_radius;

    let mut transport_rate_by_position = Matrix3::zeros();
    transport_rate_by_position[(2, 0)] =
        -v_e / (east_radius * local.cos_lat * local.cos_lat * north_radius);
    transport_rate_by_position[(0, 2)] = v_e / (east_radius * east_radius);
    transport_rate_by_position[(1, 2)] = -v_n / (north_radius * north_radius);
    transport_rate_by_position[(2, 2)] = -v_e * local.tan_lat / (east_radius * east_radius);

    (earth_rate_by_position, transport_rate_by_position)
}

/// Discrete process noise covariance $Q_d$ for one propagation interval.
///
/// IMU noise enters as white noise on velocity and attitude and as random walks on the biases,
/// each scaled by `dt`. The clock block is the exact discretization of the two-state oscillator
/// model driven by white frequency noise $S_f = h_0 / 2$ and random-walk frequency noise
/// $S_g = 2\pi^2 h_{-2}$, converted to meters with the speed of light. Flicker noise ($h_{-1}$)
/// has no state in this model and does not contribute.
pub fn process_noise(imu: &ImuSpec, clock: &ClockSpec, dt: f64) -> DMatrix<f64> {
    let mut q = DMatrix::<f64>::zeros(ERROR_STATES, ERROR_STATES);
    let diagonal = [
        (VELOCITY, imu.accel_noise),
        (ATTITUDE, imu.gyro_noise),
        (ACCEL_BIAS, imu.accel_bias_instability),
        (GYRO_BIAS, imu.gyro_bias_instability),
    ];
    for (start, density) in diagonal {
        for i in start..start + 3 {
            q[(i, i)] = density * density * dt;
        }
    }
    let (q_bias, q_cross, q_drift) = clock.process_noise(dt);
    q[(CLOCK_BIAS, CLOCK_BIAS)] = q_bias;
    q[(CLOCK_BIAS, CLOCK_DRIFT)] = q_cross;
    q[(CLOCK_DRIFT, CLOCK_BIAS)] = q_cross;
    q[(CLOCK_DRIFT, CLOCK_DRIFT)] = q_drift;
    q
}

impl ClockSpec {
    /// Clock process noise `(q_bias, q_bias_drift, q_drift)` in meters for interval `dt`.
    pub fn process_noise(&self, dt: f64) -> (f64, f64, f64) {
        let c2 = SPEED_OF_LIGHT * SPEED_OF_LIGHT;
        let s_f = self.h0 / 2.0;
        let s_g = 2.0 * std::f64::consts::PI.powi(2) * self.h2;
        (
            c2 * (s_f * dt + s_g * dt.powi(3) / 3.0),
            c2 * s_g * dt * dt / 2.0,
            c2 * s_g * dt,
        )
    }
}

/// Linearized pseudorange and pseudorange-rate model of one epoch.
///
/// Rows are stacked as all pseudoranges followed by all pseudorange rates, in satellite order.
#[derive(Clone, Debug)]
pub struct GnssMeasurementModel {
    /// Observation Jacobian, 2n×17
    pub jacobian: DMatrix<f64>,
    /// Observed minus predicted measurements
    pub innovation: DVector<f64>,
    /// Diagonal measurement noise covariance
    pub noise: DMatrix<f64>,
}

/// Predict every satellite's pseudorange and pseudorange rate from the mechanized state and
/// build the innovation and observation Jacobian against the error state.
///
/// The receiver ECEF position comes from the geodetic state and its ECEF velocity from the NED
/// velocity, so the geometry rows map through $C_n^e$. The antenna is taken to coincide with the
/// IMU, so the attitude columns are zero.
pub fn gnss_measurement_model(
    state: &NavigationState,
    ellipsoid: &Ellipsoid,
    clock_bias: f64,
    clock_drift: f64,
    epoch: &ObservationEpoch,
) -> GnssMeasurementModel {
    let n = epoch.len();
    let c_ne = earth::ned_to_ecef(state.latitude, state.longitude);
    let position = state.ecef_position(ellipsoid);
    let velocity = c_ne * state.velocity;

    let mut jacobian = DMatrix::<f64>::zeros(2 * n, ERROR_STATES);
    let mut innovation = DVector::<f64>::zeros(2 * n);
    let mut noise = DMatrix::<f64>::zeros(2 * n, 2 * n);
    for (i, satellite) in epoch.iter().enumerate() {
        let prediction = range_and_rate(
            &position,
            &velocity,
            clock_bias,
            clock_drift,
            &satellite.position,
            &satellite.velocity,
        );
        let range_gradient = -(c_ne.transpose() * prediction.line_of_sight);
        let rate_gradient = -(c_ne.transpose() * prediction.line_of_sight_rate);

        let range_row = i;
        jacobian
            .view_mut((range_row, POSITION), (1, 3))
            .copy_from(&range_gradient.transpose());
        jacobian[(range_row, CLOCK_BIAS)] = 1.0;
        innovation[range_row] = satellite.pseudorange - prediction.pseudorange;
        noise[(range_row, range_row)] = satellite.pseudorange_variance;

        let rate_row = n + i;
        jacobian
            .view_mut((rate_row, POSITION), (1, 3))
            .copy_from(&rate_gradient.transpose());
        jacobian
            .view_mut((rate_row, VELOCITY), (1, 3))
            .copy_from(&range_gradient.transpose());
        jacobian[(rate_row, CLOCK_DRIFT)] = 1.0;
        innovation[rate_row] = satellite.pseudorange_rate - prediction.pseudorange_rate;
        noise[(rate_row, rate_row)] = satellite.pseudorange_rate_variance;
    }
    GnssMeasurementModel {
        jacobian,
        innovation,
        noise,
    }
}

/// Fold the position, velocity and attitude part of an error-state estimate into the
/// navigation state.
///
/// NED position errors are converted to latitude, longitude and altitude with the radii of
/// curvature in `local`. The attitude error rotates the body-to-NED quaternion in the
/// local-level frame.
pub fn apply_error_correction(
    state: &mut NavigationState,
    local: &LocalEarth,
    delta_x: &DVector<f64>,
) {
    assert!(
        delta_x.len() >= ATTITUDE + 3,
        "Error state must have at least {} elements, got {}",
        ATTITUDE + 3,
        delta_x.len()
    );
    state.latitude += delta_x[POSITION] / (local.meridian_radius + state.altitude);
    state.longitude +=
        delta_x[POSITION + 1] / ((local.transverse_radius + state.altitude) * local.cos_lat);
    state.altitude -= delta_x[POSITION + 2];

    state.velocity += delta_x.fixed_rows::<3>(VELOCITY);

    let phi = Vector3::new(
        delta_x[ATTITUDE],
        delta_x[ATTITUDE + 1],
        delta_x[ATTITUDE + 2],
    );
    let correction = UnitQuaternion::from_scaled_axis(phi);
    state.set_quaternion(correction * state.quaternion());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earth::WGS84;
    use crate::observation::SatelliteObservation;
    use crate::strapdown::{self, IMUData};
    use assert_approx_eq::assert_approx_eq;

    fn state() -> NavigationState {
        let mut state = NavigationState::default();
        state.set_position(0.6, -1.4, 300.0);
        state.set_velocity(20.0, -5.0, 1.0);
        state.set_attitude(0.05, -0.02, 1.1);
        state
    }

    #[test]
    fn transition_structure() {
        let state = state();
        let local = WGS84.local(state.latitude, state.altitude);
        let f_b = Vector3::new(0.1, 0.2, -9.8);
        let dt = 0.01;
        let phi = error_state_transition_jacobian(&state, &local, &f_b, dt);
        assert_eq!(phi.nrows(), ERROR_STATES);
        assert_eq!(phi.ncols(), ERROR_STATES);
        // Position integrates velocity
        for i in 0..3 {
            assert_eq!(phi[(POSITION + i, VELOCITY + i)], dt);
        }
        // Biases and clock drift persist
        for i in ACCEL_BIAS..ERROR_STATES {
            assert_eq!(phi[(i, i)], 1.0);
        }
        assert_eq!(phi[(CLOCK_BIAS, CLOCK_DRIFT)], dt);
        // Accelerometer bias maps through -C dt
        let c = state.attitude_matrix();
        for i in 0..3 {
            for j in 0..3 {
                assert_approx_eq!(phi[(VELOCITY + i, ACCEL_BIAS + j)], -c[(i, j)] * dt, 1e-15);
                assert_approx_eq!(phi[(ATTITUDE + i, GYRO_BIAS + j)], -c[(i, j)] * dt, 1e-15);
            }
        }
        // Tilt couples into horizontal velocity through the vertical specific force
        let f_n = c * f_b;
        assert_approx_eq!(phi[(VELOCITY, ATTITUDE + 1)], f_n[2] * dt, 1e-12);
        assert!(phi[(VELOCITY + 2, POSITION + 2)] > 0.0);
        // Nothing feeds the biases or the clock from the navigation errors
        for i in ACCEL_BIAS..ERROR_STATES {
            for j in 0..ACCEL_BIAS {
                assert_eq!(phi[(i, j)], 0.0);
            }
        }
    }
    #[test]
    fn tilt_error_matches_perturbed_specific_force() {
        // A small nav-frame tilt changes the resolved specific force by -[f×] phi
        let state = state();
        let local = WGS84.local(state.latitude, state.altitude);
        let f_b = Vector3::new(0.3, -0.1, -9.8);
        let phi_err = Vector3::new(1e-6, -2e-6, 3e-6);
        let perturbed = (Matrix3::identity() + vector_to_skew_symmetric(&phi_err))
            * state.attitude_matrix()
            * f_b;
        let nominal = state.attitude_matrix() * f_b;
        let transition = error_state_transition_jacobian(&state, &local, &f_b, 1.0);
        let predicted = transition.view((VELOCITY, ATTITUDE), (3, 3)) * phi_err;
        for i in 0..3 {
            assert_approx_eq!(perturbed[i] - nominal[i], predicted[i], 1e-12);
        }
    }
    /// Tilt and NED velocity change between two mechanizations that start from the same
    /// attitude, taking `truth` minus `estimate`.
    fn mechanized_difference(
        estimate: &NavigationState,
        truth: &NavigationState,
        imu: &IMUData,
        dt: f64,
    ) -> (Vector3<f64>, Vector3<f64>) {
        let (mut estimate, mut truth) = (*estimate, *truth);
        strapdown::mechanize(&mut estimate, &WGS84, imu, dt);
        strapdown::mechanize(&mut truth, &WGS84, imu, dt);
        let tilt = (truth.quaternion() * estimate.quaternion().inverse()).scaled_axis();
        (tilt, truth.velocity - estimate.velocity)
    }
    #[test]
    fn earth_model_couplings_match_mechanization() {
        let estimate = state();
        let local = WGS84.local(estimate.latitude, estimate.altitude);
        let imu = IMUData::new(
            Vector3::zeros(),
            -(estimate.attitude_matrix().transpose()
                * WGS84.gravity_vector(estimate.latitude, estimate.altitude)),
        );
        let dt = 1.0;
        let transition = error_state_transition_jacobian(&estimate, &local, &imu.accel, dt);

        // Velocity error tilts the platform through the transport rate
        let delta_v = Vector3::new(1.0, -0.5, 0.0);
        let mut truth = estimate;
        truth.velocity += delta_v;
        let (tilt, _) = mechanized_difference(&estimate, &truth, &imu, dt);
        let predicted = transition.view((ATTITUDE, VELOCITY), (3, 3)) * delta_v;
        assert!(predicted.norm() > 1e-7);
        for i in 0..3 {
            assert_approx_eq!(tilt[i], predicted[i], 2e-11);
        }

        // A small velocity error feeds back into velocity through the Coriolis and transport terms
        let delta_v = Vector3::new(1e-4, 2e-4, -1e-4);
        let mut truth = estimate;
        truth.velocity += delta_v;
        let (_, velocity) = mechanized_difference(&estimate, &truth, &imu, dt);
        let predicted = transition.view((VELOCITY, VELOCITY), (3, 3)) * delta_v;
        for i in 0..3 {
            assert_approx_eq!(velocity[i], predicted[i], 1e-12);
        }

        // A north position error moves the latitude the Earth and transport rates are taken at
        let north = 100.0;
        let mut truth = estimate;
        let mut delta_x = DVector::<f64>::zeros(ERROR_STATES);
        delta_x[POSITION] = north;
        apply_error_correction(&mut truth, &local, &delta_x);
        let (tilt, velocity) = mechanized_difference(&estimate, &truth, &imu, dt);
        let predicted_tilt = transition.view((ATTITUDE, POSITION), (3, 1)) * north;
        let predicted_velocity = transition.view((VELOCITY, POSITION), (3, 1)) * north;
        for i in 0..3 {
            assert_approx_eq!(tilt[i], predicted_tilt[i], 1e-2 * predicted_tilt.norm());
        }
        assert!(predicted_tilt.norm() > 1e-10);
        // Gravity has no east component, so east velocity sees only the rate partials
        assert_approx_eq!(velocity[1], predicted_velocity[1], 1e-2 * predicted_velocity[1].abs());
        assert!(predicted_velocity[1].abs() > 1e-9);
    }
    #[test]
    fn clock_noise_composes_over_intervals() {
        let clock = ClockSpec {
            h0: 2e-19,
            h1: 7e-21,
            h2: 2e-20,
        };
        let dt = 0.5;
        let (b1, c1, d1) = clock.process_noise(dt);
        let (b2, c2, d2) = clock.process_noise(2.0 * dt);
        // Two steps through the constant-drift transition equal one step of twice the length
        assert_approx_eq!(b2, 2.0 * b1 + 2.0 * dt * c1 + dt * dt * d1, 1e-9 * b2);
        assert_approx_eq!(c2, 2.0 * c1 + dt * d1, 1e-9 * c2);
        assert_approx_eq!(d2, 2.0 * d1, 1e-9 * d2);
    }
    #[test]
    fn process_noise_diagonal() {
        let imu = ImuSpec {
            accel_bias_instability: 1e-3,
            accel_noise: 1e-2,
            gyro_bias_instability: 1e-5,
            gyro_noise: 1e-4,
        };
        let clock = ClockSpec {
            h0: 2e-19,
            h1: 7e-21,
            h2: 2e-20,
        };
        let dt = 0.1;
        let q = process_noise(&imu, &clock, dt);
        assert_eq!(q[(POSITION, POSITION)], 0.0);
        assert_approx_eq!(q[(VELOCITY, VELOCITY)], 1e-4 * dt, 1e-18);
        assert_approx_eq!(q[(ATTITUDE + 2, ATTITUDE + 2)], 1e-8 * dt, 1e-20);
        assert_approx_eq!(q[(ACCEL_BIAS, ACCEL_BIAS)], 1e-6 * dt, 1e-20);
        assert_approx_eq!(q[(GYRO_BIAS + 1, GYRO_BIAS + 1)], 1e-10 * dt, 1e-24);
        assert!(q[(CLOCK_BIAS, CLOCK_BIAS)] > 0.0);
        assert!(q[(CLOCK_DRIFT, CLOCK_DRIFT)] > 0.0);
        assert_eq!(q[(CLOCK_BIAS, CLOCK_DRIFT)], q[(CLOCK_DRIFT, CLOCK_BIAS)]);
        // The clock block is a valid covariance
        let det = q[(CLOCK_BIAS, CLOCK_BIAS)] * q[(CLOCK_DRIFT, CLOCK_DRIFT)]
            - q[(CLOCK_BIAS, CLOCK_DRIFT)].powi(2);
        assert!(det > 0.0);
    }
    #[test]
    fn measurement_model_at_truth() {
        let state = state();
        let user = state.ecef_position(&WGS84);
        let user_velocity = state.ecef_velocity();
        let c_ne = earth::ned_to_ecef(state.latitude, state.longitude);
        let satellites = [
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(0.7, 0.0, -0.7),
            Vector3::new(-0.3, 0.8, -0.5),
            Vector3::new(-0.4, -0.8, -0.45),
        ]
        .iter()
        .map(|los| {
            SatelliteObservation::from_truth(
                user + 2.2e7 * (c_ne * los.normalize()),
                Vector3::new(1000.0, -2000.0, 500.0),
                &user,
                &user_velocity,
                120.0,
                3.0,
                25.0,
                0.04,
            )
        })
        .collect();
        let epoch = ObservationEpoch::new(0.0, satellites);
        let model = gnss_measurement_model(&state, &WGS84, 120.0, 3.0, &epoch);
        assert_eq!(model.jacobian.nrows(), 8);
        assert_eq!(model.innovation.len(), 8);
        for i in 0..8 {
            assert_approx_eq!(model.innovation[i], 0.0, 1e-6);
        }
        assert_eq!(model.noise[(0, 0)], 25.0);
        assert_eq!(model.noise[(7, 7)], 0.04);
        // Zenith satellite: a receiver truly lower than estimated sees a longer range
        assert_approx_eq!(model.jacobian[(0, POSITION + 2)], 1.0, 1e-12);
        assert_eq!(model.jacobian[(0, CLOCK_BIAS)], 1.0);
        assert_eq!(model.jacobian[(4, CLOCK_DRIFT)], 1.0);
        for j in ATTITUDE..CLOCK_BIAS {
            assert_eq!(model.jacobian[(0, j)], 0.0);
            assert_eq!(model.jacobian[(4, j)], 0.0);
        }
    }
    #[test]
    fn measurement_jacobian_matches_finite_difference() {
        let state = state();
        let user = state.ecef_position(&WGS84);
        let c_ne = earth::ned_to_ecef(state.latitude, state.longitude);
        let satellite = SatelliteObservation::from_truth(
            user + 2.2e7 * (c_ne * Vector3::new(0.5, 0.3, -0.8).normalize()),
            Vector3::new(1000.0, -2000.0, 500.0),
            &user,
            &state.ecef_velocity(),
            0.0,
            0.0,
            1.0,
            1.0,
        );
        let epoch = ObservationEpoch::new(0.0, vec![satellite]);
        let model = gnss_measurement_model(&state, &WGS84, 0.0, 0.0, &epoch);
        // Move the true receiver 10 m north; the innovation must grow by H * dx
        let local = WGS84.local(state.latitude, state.altitude);
        let mut moved = state;
        let mut delta = DVector::<f64>::zeros(ERROR_STATES);
        delta[POSITION] = 10.0;
        apply_error_correction(&mut moved, &local, &delta);
        let truth_obs = SatelliteObservation::from_truth(
            satellite.position,
            satellite.velocity,
            &moved.ecef_position(&WGS84),
            &moved.ecef_velocity(),
            0.0,
            0.0,
            1.0,
            1.0,
        );
        let expected = (&model.jacobian * &delta)[0];
        assert_approx_eq!(truth_obs.pseudorange - satellite.pseudorange, expected, 1e-4);
    }
    #[test]
    fn correction_moves_state() {
        let mut state = state();
        let before = state;
        let local = WGS84.local(state.latitude, state.altitude);
        let mut delta = DVector::<f64>::zeros(ERROR_STATES);
        delta[POSITION] = 10.0;
        delta[POSITION + 1] = -5.0;
        delta[POSITION + 2] = 2.0;
        delta[VELOCITY + 1] = 0.5;
        delta[ATTITUDE + 2] = 0.01;
        apply_error_correction(&mut state, &local, &delta);
        assert_approx_eq!(
            state.latitude - before.latitude,
            10.0 / (local.meridian_radius + 300.0),
            1e-15
        );
        assert!(state.longitude < before.longitude);
        assert_approx_eq!(state.altitude, 298.0, 1e-12);
        assert_approx_eq!(state.velocity[1], -4.5, 1e-12);
        let (_, _, yaw) = state.euler_angles();
        let (_, _, yaw_before) = before.euler_angles();
        assert_approx_eq!(yaw - yaw_before, 0.01, 1e-3);
        assert_approx_eq!(state.quaternion().norm(), 1.0, 1e-15);
    }
}
