//! Tightly-coupled GNSS/INS error-state Kalman filter
//!
//! The [`NavigationFilter`] owns a mechanized [`NavigationState`], the current IMU bias and
//! receiver clock estimates, and a 17×17 covariance over the error state described in
//! [`crate::linearize`]. It is driven by three independent calls:
//!
//! - [`NavigationFilter::mechanize`] integrates one bias-compensated IMU sample into the
//!   navigation state.
//! - [`NavigationFilter::propagate`] advances the error covariance (and the nominal clock) over
//!   an interval. It never touches position, velocity or attitude, so callers may propagate at
//!   a different cadence than they mechanize.
//! - [`NavigationFilter::gnss_update`] fuses one epoch of pseudoranges and pseudorange rates,
//!   folds the estimated errors into the navigation state, biases and clock, and resets the
//!   error mean to zero.
//!
//! A GNSS update that cannot be trusted (too few satellites, singular innovation covariance)
//! is skipped and reported through [`NavigationError`]; the filter is left exactly as it was so
//! the caller can keep mechanizing and try again with the next epoch.
//!
//! The filter is single-owner and performs no locking. Callers sharing one instance across
//! threads must serialize access themselves.
use std::fmt::{self, Display};

use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::{FilterConfig, PriorSigmas};
use crate::earth::{self, Ellipsoid};
use crate::error::NavigationError;
use crate::least_squares::PvtSolution;
use crate::linalg::{spd_solve, symmetrize};
use crate::linearize::{
    self, ACCEL_BIAS, ATTITUDE, CLOCK_BIAS, CLOCK_DRIFT, ERROR_STATES, GYRO_BIAS, POSITION,
    VELOCITY,
};
use crate::observation::ObservationEpoch;
use crate::record::NavResult;
use crate::strapdown::{self, IMUData, NavigationState};

/// Inertial sensor error model.
///
/// All four terms are square roots of white-noise power spectral densities. The bias terms
/// drive random walks on the bias states; the noise terms are velocity and angle random walk.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuSpec {
    /// Accelerometer bias random walk, m/s^2/√s
    pub accel_bias_instability: f64,
    /// Velocity random walk, m/s/√s
    pub accel_noise: f64,
    /// Gyroscope bias random walk, rad/s/√s
    pub gyro_bias_instability: f64,
    /// Angle random walk, rad/√s
    pub gyro_noise: f64,
}
impl Default for ImuSpec {
    fn default() -> Self {
        ImuSpec::from_grade(ImuGrade::Tactical)
    }
}

/// Broad IMU performance classes with typical error figures.
///
/// | Grade      | Gyro bias instability (°/h) | Gyro ARW (°/√h) | Accel bias instability (m/s^2) | Accel VRW (m/s/√h) |
/// |------------|-----------------------------|-----------------|--------------------------------|--------------------|
/// | Consumer   | 100                         | 1.0             | 0.1                            | 0.1                |
/// | Industrial | 50                          | 0.1             | 0.05                           | 0.03               |
/// | Tactical   | 1                           | 0.01            | 0.001                          | 0.01               |
/// | Navigation | 0.01                        | 0.005           | 0.0001                         | 0.005              |
///
/// # References
/// - Principles of GNSS, Inertial, and Multisensor Navigation Systems. Chapter 4.4.1, Paul D.
///   Groves, 2nd Edition. Table 4.1
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImuGrade {
    Consumer,
    Industrial,
    #[default]
    Tactical,
    Navigation,
}
impl ImuSpec {
    /// Typical error model for an IMU grade.
    ///
    /// Bias instabilities are treated as the bias drift accumulated over one hour, so the random
    /// walk density is the instability divided by √3600 s.
    pub fn from_grade(grade: ImuGrade) -> ImuSpec {
        let (gyro_bi_dph, gyro_arw_dpsh, accel_bi, accel_vrw) = match grade {
            ImuGrade::Consumer => (100.0, 1.0, 0.1, 0.1),
            ImuGrade::Industrial => (50.0, 0.1, 0.05, 0.03),
            ImuGrade::Tactical => (1.0, 0.01, 0.001, 0.01),
            ImuGrade::Navigation => (0.01, 0.005, 0.0001, 0.005),
        };
        let root_hour = 60.0;
        ImuSpec {
            accel_bias_instability: accel_bi / root_hour,
            accel_noise: accel_vrw / root_hour,
            gyro_bias_instability: f64::to_radians(gyro_bi_dph) / 3600.0 / root_hour,
            gyro_noise: f64::to_radians(gyro_arw_dpsh) / root_hour,
        }
    }
}

/// Receiver oscillator model from its Allan-variance coefficients.
///
/// `h0` is the white frequency coefficient, `h1` the flicker coefficient ($h_{-1}$) and `h2`
/// the random-walk frequency coefficient ($h_{-2}$).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSpec {
    pub h0: f64,
    pub h1: f64,
    pub h2: f64,
}
impl Default for ClockSpec {
    /// Temperature-compensated crystal oscillator
    fn default() -> Self {
        ClockSpec {
            h0: 2e-19,
            h1: 7e-21,
            h2: 2e-20,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterStatus {
    /// No position has been set; the state is the default origin
    #[default]
    Uninitialized,
    /// Position set, either directly or from a least-squares solution
    Running,
}

/// The error-state navigation filter.
#[derive(Clone, Debug)]
pub struct NavigationFilter {
    state: NavigationState,
    ellipsoid: Ellipsoid,
    accel_bias: Vector3<f64>,
    gyro_bias: Vector3<f64>,
    clock_bias: f64,
    clock_drift: f64,
    error_state: DVector<f64>,
    covariance: DMatrix<f64>,
    imu_spec: ImuSpec,
    clock_spec: ClockSpec,
    min_satellites: usize,
    status: FilterStatus,
}
impl Default for NavigationFilter {
    fn default() -> Self {
        NavigationFilter::from_config(&FilterConfig::default())
    }
}
impl Display for NavigationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NavigationFilter {{ {:?}, {}, clock: [{:.3} m, {:.4} m/s], accel bias: [{:.2e}, {:.2e}, {:.2e}], gyro bias: [{:.2e}, {:.2e}, {:.2e}] }}",
            self.status,
            self.state,
            self.clock_bias,
            self.clock_drift,
            self.accel_bias[0],
            self.accel_bias[1],
            self.accel_bias[2],
            self.gyro_bias[0],
            self.gyro_bias[1],
            self.gyro_bias[2]
        )
    }
}

impl NavigationFilter {
    /// Build a filter from a configuration. The navigation state starts at the origin with
    /// level attitude and the covariance at the configured prior.
    pub fn from_config(config: &FilterConfig) -> NavigationFilter {
        let mut filter = NavigationFilter {
            state: NavigationState::default(),
            ellipsoid: config.ellipsoid.unwrap_or_default(),
            accel_bias: Vector3::zeros(),
            gyro_bias: Vector3::zeros(),
            clock_bias: 0.0,
            clock_drift: 0.0,
            error_state: DVector::zeros(ERROR_STATES),
            covariance: DMatrix::zeros(ERROR_STATES, ERROR_STATES),
            imu_spec: config.imu,
            clock_spec: config.clock,
            min_satellites: config.min_satellites,
            status: FilterStatus::Uninitialized,
        };
        filter.set_prior(&config.prior);
        filter
    }

    // --- Initialization -----------------------------------------------------------------

    /// Set latitude and longitude (radians) and altitude (meters).
    pub fn set_position(&mut self, latitude: f64, longitude: f64, altitude: f64) {
        self.state.set_position(latitude, longitude, altitude);
        self.status = FilterStatus::Running;
    }
    /// Set the north, east and down velocity in m/s.
    pub fn set_velocity(&mut self, north: f64, east: f64, down: f64) {
        self.state.set_velocity(north, east, down);
    }
    /// Set the attitude from roll, pitch and yaw in radians.
    pub fn set_attitude(&mut self, roll: f64, pitch: f64, yaw: f64) {
        self.state.set_attitude(roll, pitch, yaw);
    }
    /// Set the attitude from a body-to-NED rotation matrix.
    pub fn set_attitude_matrix(&mut self, matrix: &Matrix3<f64>) {
        self.state.set_attitude_matrix(matrix);
    }
    /// Set the receiver clock bias (m) and drift (m/s).
    pub fn set_clock(&mut self, bias: f64, drift: f64) {
        self.clock_bias = bias;
        self.clock_drift = drift;
    }
    /// Set the oscillator Allan-variance coefficients.
    pub fn set_clock_spec(&mut self, h0: f64, h1: f64, h2: f64) {
        self.clock_spec = ClockSpec { h0, h1, h2 };
    }
    /// Set the inertial sensor error model; see [`ImuSpec`] for units.
    pub fn set_imu_spec(
        &mut self,
        accel_bias_instability: f64,
        accel_noise: f64,
        gyro_bias_instability: f64,
        gyro_noise: f64,
    ) {
        self.imu_spec = ImuSpec {
            accel_bias_instability,
            accel_noise,
            gyro_bias_instability,
            gyro_noise,
        };
    }
    /// Set the IMU bias estimates that are removed from every raw sample.
    pub fn set_imu_biases(&mut self, accel_bias: Vector3<f64>, gyro_bias: Vector3<f64>) {
        self.accel_bias = accel_bias;
        self.gyro_bias = gyro_bias;
    }
    /// Reset the error-state mean to zero and the covariance to a diagonal prior.
    pub fn set_prior(&mut self, prior: &PriorSigmas) {
        let blocks = [
            (POSITION, 3, prior.position),
            (VELOCITY, 3, prior.velocity),
            (ATTITUDE, 3, prior.attitude),
            (ACCEL_BIAS, 3, prior.accel_bias),
            (GYRO_BIAS, 3, prior.gyro_bias),
            (CLOCK_BIAS, 1, prior.clock_bias),
            (CLOCK_DRIFT, 1, prior.clock_drift),
        ];
        self.covariance = DMatrix::zeros(ERROR_STATES, ERROR_STATES);
        for (start, len, sigma) in blocks {
            for i in start..start + len {
                self.covariance[(i, i)] = sigma * sigma;
            }
        }
        self.error_state.fill(0.0);
    }
    /// Fewest satellites a GNSS update accepts.
    pub fn set_min_satellites(&mut self, min_satellites: usize) {
        self.min_satellites = min_satellites;
    }
    /// Seed position, velocity and clock from a least-squares solution.
    ///
    /// The position, velocity and clock blocks of the covariance are replaced by the solution
    /// covariance rotated from ECEF into NED; their cross-covariances with attitude and biases
    /// are cleared. Attitude and bias estimates are left as they are.
    pub fn initialize_from_solution(&mut self, solution: &PvtSolution) {
        let (latitude, longitude, altitude) = solution.geodetic(&self.ellipsoid);
        self.set_position(latitude, longitude, altitude);
        self.state.velocity = earth::ecef_velocity_to_ned(latitude, longitude, &solution.velocity);
        self.set_clock(solution.clock_bias, solution.clock_drift);

        let c_en = earth::ecef_to_ned(latitude, longitude);
        let mut mapping = DMatrix::<f64>::zeros(ERROR_STATES, 8);
        mapping.view_mut((POSITION, 0), (3, 3)).copy_from(&c_en);
        mapping.view_mut((VELOCITY, 3), (3, 3)).copy_from(&c_en);
        mapping[(CLOCK_BIAS, 6)] = 1.0;
        mapping[(CLOCK_DRIFT, 7)] = 1.0;
        let p_ls = DMatrix::from_iterator(8, 8, solution.covariance.iter().copied());
        let seeded = &mapping * p_ls * mapping.transpose();

        let is_seeded = |i: usize| i < ATTITUDE || i >= CLOCK_BIAS;
        for i in 0..ERROR_STATES {
            for j in 0..ERROR_STATES {
                if is_seeded(i) && is_seeded(j) {
                    self.covariance[(i, j)] = seeded[(i, j)];
                } else if is_seeded(i) != is_seeded(j) {
                    self.covariance[(i, j)] = 0.0;
                }
            }
        }
        self.covariance = symmetrize(&self.covariance);
        debug!(
            "filter seeded from least squares after {} iterations: {}",
            solution.iterations, self.state
        );
    }

    // --- Time update --------------------------------------------------------------------

    fn compensate(&self, imu: &IMUData) -> IMUData {
        IMUData {
            accel: imu.accel - self.accel_bias,
            gyro: imu.gyro - self.gyro_bias,
        }
    }
    /// Mechanize one raw IMU sample after removing the estimated biases.
    pub fn mechanize(&mut self, imu: &IMUData, dt: f64) {
        let compensated = self.compensate(imu);
        strapdown::mechanize(&mut self.state, &self.ellipsoid, &compensated, dt);
    }
    /// Propagate the error covariance over `dt`, linearized about the current navigation state.
    ///
    /// The nominal clock bias advances by drift·dt. Position, velocity and attitude are not
    /// changed.
    pub fn propagate(&mut self, imu: &IMUData, dt: f64) {
        let compensated = self.compensate(imu);
        let local = self.ellipsoid.local(self.state.latitude, self.state.altitude);
        let phi = linearize::error_state_transition_jacobian(
            &self.state,
            &local,
            &compensated.accel,
            dt,
        );
        let q = linearize::process_noise(&self.imu_spec, &self.clock_spec, dt);
        self.covariance = symmetrize(&(&phi * &self.covariance * phi.transpose() + q));
        self.error_state = &phi * &self.error_state;
        self.clock_bias += self.clock_drift * dt;
    }

    // --- Measurement update -------------------------------------------------------------

    /// Fuse one epoch of pseudoranges and pseudorange rates.
    ///
    /// # Returns
    /// - [`NavigationError::InsufficientObservations`] when the epoch has fewer satellites than
    ///   the configured minimum or no satellites at all,
    /// - [`NavigationError::Divergence`] when the innovation covariance is not positive definite.
    ///
    /// In both cases the filter is unchanged.
    pub fn gnss_update(&mut self, epoch: &ObservationEpoch) -> Result<(), NavigationError> {
        // An empty epoch is never an update, whatever the configured minimum
        let required = self.min_satellites.max(1);
        if epoch.len() < required {
            warn!(
                "GNSS update skipped at t = {:.3}: {} satellites, {} required",
                epoch.time,
                epoch.len(),
                required
            );
            return Err(NavigationError::InsufficientObservations {
                required,
                available: epoch.len(),
            });
        }
        let model = linearize::gnss_measurement_model(
            &self.state,
            &self.ellipsoid,
            self.clock_bias,
            self.clock_drift,
            epoch,
        );
        let h = &model.jacobian;
        let ph_t = &self.covariance * h.transpose();
        let s = h * &ph_t + &model.noise;
        // K = P H^T S^-1, solved as S K^T = H P
        let Some(k_t) = spd_solve(&s, &ph_t.transpose()) else {
            warn!(
                "GNSS update skipped at t = {:.3}: innovation covariance is not positive definite",
                epoch.time
            );
            return Err(NavigationError::divergence(
                "innovation covariance is not positive definite",
            ));
        };
        let k = k_t.transpose();
        let delta_x = &self.error_state + &k * (&model.innovation - h * &self.error_state);
        if !delta_x.iter().all(|v| v.is_finite()) {
            warn!("GNSS update skipped at t = {:.3}: non-finite correction", epoch.time);
            return Err(NavigationError::divergence("non-finite state correction"));
        }

        let i_kh = DMatrix::<f64>::identity(ERROR_STATES, ERROR_STATES) - &k * h;
        self.covariance = symmetrize(
            &(&i_kh * &self.covariance * i_kh.transpose() + &k * &model.noise * k.transpose()),
        );

        let local = self.ellipsoid.local(self.state.latitude, self.state.altitude);
        linearize::apply_error_correction(&mut self.state, &local, &delta_x);
        self.accel_bias += delta_x.fixed_rows::<3>(ACCEL_BIAS);
        self.gyro_bias += delta_x.fixed_rows::<3>(GYRO_BIAS);
        self.clock_bias += delta_x[CLOCK_BIAS];
        self.clock_drift += delta_x[CLOCK_DRIFT];
        self.error_state.fill(0.0);

        debug!(
            "GNSS update at t = {:.3}: {} satellites, |innovation| = {:.3e}, |dx| = {:.3e}",
            epoch.time,
            epoch.len(),
            model.innovation.norm(),
            delta_x.norm()
        );
        Ok(())
    }

    // --- Accessors ----------------------------------------------------------------------

    pub fn state(&self) -> &NavigationState {
        &self.state
    }
    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }
    pub fn accel_bias(&self) -> &Vector3<f64> {
        &self.accel_bias
    }
    pub fn gyro_bias(&self) -> &Vector3<f64> {
        &self.gyro_bias
    }
    /// Receiver clock bias (m) and drift (m/s)
    pub fn clock(&self) -> (f64, f64) {
        (self.clock_bias, self.clock_drift)
    }
    /// Error-state mean; zero after every update
    pub fn error_state(&self) -> &DVector<f64> {
        &self.error_state
    }
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
    pub fn imu_spec(&self) -> &ImuSpec {
        &self.imu_spec
    }
    pub fn clock_spec(&self) -> &ClockSpec {
        &self.clock_spec
    }
    pub fn min_satellites(&self) -> usize {
        self.min_satellites
    }
    pub fn status(&self) -> FilterStatus {
        self.status
    }
    /// Result record of the current state stamped with `time` seconds.
    pub fn result(&self, time: f64) -> NavResult {
        NavResult::from_state(time, &self.state, self.clock_bias, self.clock_drift)
    }
}
