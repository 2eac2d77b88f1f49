//! Single-epoch position, velocity and clock solution from pseudoranges and pseudorange rates
//!
//! The solver estimates the eight-element state
//!
//! $$
//! x = [r_x, r_y, r_z, v_x, v_y, v_z, b, \dot b]
//! $$
//!
//! where $r$ and $v$ are the receiver ECEF position (m) and velocity (m/s) and $b$, $\dot b$
//! are the receiver clock bias (m) and drift (m/s), both scaled by the speed of light. For each
//! satellite with line-of-sight unit vector $u$ the measurement models are
//!
//! $$
//! \rho = |r_s - r| + b, \qquad \dot\rho = u \cdot (v_s - v) + \dot b
//! $$
//!
//! and the Gauss-Newton iteration accumulates the weighted normal equations
//! $H^T W H \, \delta x = H^T W (z - h(x))$ satellite by satellite. The covariance of the
//! solution is $(H^T W H)^{-1}$. Earth rotation during signal transit (Sagnac) is not modeled,
//! so pseudoranges are expected to be corrected upstream if that matters.
//!
//! The solve needs at least four satellites. A singular or badly conditioned information
//! matrix, or failure to converge within the iteration cap, is reported as
//! [`NavigationError::Divergence`] and leaves the caller's estimate untouched.
use log::{debug, warn};
use nalgebra::{SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::earth::{self, Ellipsoid};
use crate::error::NavigationError;
use crate::linalg::reciprocal_condition;
use crate::observation::ObservationEpoch;

/// Number of estimated states: position (3), velocity (3), clock bias, clock drift
pub const PVT_STATES: usize = 8;
/// Fewest satellites for which position, velocity and clock are observable
pub const MIN_SATELLITES: usize = 4;
/// Information matrices with a smaller eigenvalue ratio are treated as singular
const MIN_RECIPROCAL_CONDITION: f64 = 1e-12;

pub type PvtVector = SVector<f64, PVT_STATES>;
pub type PvtCovariance = SMatrix<f64, PVT_STATES, PVT_STATES>;

/// Predicted geometry of one satellite as seen from the receiver.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeAndRate {
    /// Unit line-of-sight vector from the receiver to the satellite
    pub line_of_sight: Vector3<f64>,
    /// Time derivative of [`Self::line_of_sight`]
    pub line_of_sight_rate: Vector3<f64>,
    /// Geometric range in meters
    pub range: f64,
    /// Predicted pseudorange (range plus clock bias) in meters
    pub pseudorange: f64,
    /// Predicted pseudorange rate (range rate plus clock drift) in m/s
    pub pseudorange_rate: f64,
}

/// Predict range and range rate to one satellite.
///
/// # Arguments
/// - `user_position`, `user_velocity` - receiver ECEF position (m) and velocity (m/s)
/// - `clock_bias`, `clock_drift` - receiver clock bias (m) and drift (m/s)
/// - `satellite_position`, `satellite_velocity` - satellite ECEF position (m) and velocity (m/s)
///
/// # Example
/// ```rust
/// use nalgebra::Vector3;
/// use gnss_ins::least_squares::range_and_rate;
/// let prediction = range_and_rate(
///     &Vector3::zeros(), &Vector3::zeros(), 10.0, 1.0,
///     &Vector3::new(3.0, 4.0, 0.0), &Vector3::new(0.0, 0.0, 7.0),
/// );
/// assert_eq!(prediction.range, 5.0);
/// assert_eq!(prediction.pseudorange, 15.0);
/// assert_eq!(prediction.pseudorange_rate, 1.0);
/// ```
pub fn range_and_rate(
    user_position: &Vector3<f64>,
    user_velocity: &Vector3<f64>,
    clock_bias: f64,
    clock_drift: f64,
    satellite_position: &Vector3<f64>,
    satellite_velocity: &Vector3<f64>,
) -> RangeAndRate {
    let relative_position = satellite_position - user_position;
    let relative_velocity = satellite_velocity - user_velocity;
    let range = relative_position.norm();
    let line_of_sight = relative_position / range;
    let range_rate = line_of_sight.dot(&relative_velocity);
    let line_of_sight_rate = (relative_velocity - line_of_sight * range_rate) / range;
    RangeAndRate {
        line_of_sight,
        line_of_sight_rate,
        range,
        pseudorange: range + clock_bias,
        pseudorange_rate: range_rate + clock_drift,
    }
}

/// Iteration controls for [`gauss_newton`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeastSquaresConfig {
    /// Iteration cap; reaching it without convergence is a divergence
    pub max_iterations: usize,
    /// Converged once the norm of the state update falls below this value
    pub convergence_threshold: f64,
}
impl Default for LeastSquaresConfig {
    fn default() -> Self {
        LeastSquaresConfig {
            max_iterations: 20,
            convergence_threshold: 1e-6,
        }
    }
}

/// Weighted normal equations $(H^T W H, H^T W (z - h(x)))$ at the estimate `x`.
fn normal_equations(x: &PvtVector, epoch: &ObservationEpoch) -> (PvtCovariance, PvtVector) {
    let position = Vector3::new(x[0], x[1], x[2]);
    let velocity = Vector3::new(x[3], x[4], x[5]);
    let mut information = PvtCovariance::zeros();
    let mut gradient = PvtVector::zeros();
    for satellite in epoch.iter() {
        let prediction = range_and_rate(
            &position,
            &velocity,
            x[6],
            x[7],
            &satellite.position,
            &satellite.velocity,
        );
        let u = prediction.line_of_sight;
        let u_dot = prediction.line_of_sight_rate;

        let mut h_range = PvtVector::zeros();
        h_range.fixed_rows_mut::<3>(0).copy_from(&(-u));
        h_range[6] = 1.0;
        let weight = 1.0 / satellite.pseudorange_variance;
        information += weight * h_range * h_range.transpose();
        gradient += weight * (satellite.pseudorange - prediction.pseudorange) * h_range;

        let mut h_rate = PvtVector::zeros();
        h_rate.fixed_rows_mut::<3>(0).copy_from(&(-u_dot));
        h_rate.fixed_rows_mut::<3>(3).copy_from(&(-u));
        h_rate[7] = 1.0;
        let weight = 1.0 / satellite.pseudorange_rate_variance;
        information += weight * h_rate * h_rate.transpose();
        gradient += weight * (satellite.pseudorange_rate - prediction.pseudorange_rate) * h_rate;
    }
    (information, gradient)
}

/// Iterative weighted least-squares solve over one observation epoch.
///
/// `estimate` is the starting point and, on success, receives the solution; `covariance`
/// receives the inverse of the weighted information matrix evaluated at that solution. Both are
/// left unchanged on error.
///
/// # Returns
/// The number of iterations taken, or
/// - [`NavigationError::InsufficientObservations`] for fewer than four satellites,
/// - [`NavigationError::Divergence`] for a singular or ill-conditioned information matrix, a
///   non-finite update, or when the iteration cap is reached.
pub fn gauss_newton(
    estimate: &mut PvtVector,
    covariance: &mut PvtCovariance,
    epoch: &ObservationEpoch,
    config: &LeastSquaresConfig,
) -> Result<usize, NavigationError> {
    if epoch.len() < MIN_SATELLITES {
        warn!(
            "least squares rejected: {} satellites, {} required",
            epoch.len(),
            MIN_SATELLITES
        );
        return Err(NavigationError::InsufficientObservations {
            required: MIN_SATELLITES,
            available: epoch.len(),
        });
    }
    let mut x = *estimate;
    for iteration in 1..=config.max_iterations {
        let (information, gradient) = normal_equations(&x, epoch);
        let eigenvalues = information.symmetric_eigenvalues();
        let rcond = reciprocal_condition(eigenvalues.as_slice());
        if rcond < MIN_RECIPROCAL_CONDITION {
            warn!("least squares diverged: information matrix rcond {rcond:.3e}");
            return Err(NavigationError::divergence(format!(
                "ill-conditioned information matrix (rcond {rcond:.3e})"
            )));
        }
        let Some(cholesky) = information.cholesky() else {
            warn!("least squares diverged: information matrix is not positive definite");
            return Err(NavigationError::divergence(
                "information matrix is not positive definite",
            ));
        };
        let dx = cholesky.solve(&gradient);
        if !dx.iter().all(|v| v.is_finite()) {
            return Err(NavigationError::divergence("non-finite state update"));
        }
        x += dx;
        let step = dx.norm();
        debug!("least squares iteration {iteration}: |dx| = {step:.3e}");
        if step < config.convergence_threshold {
            // Relinearize so the covariance belongs to the returned estimate
            let (information, _) = normal_equations(&x, epoch);
            let Some(cholesky) = information.cholesky() else {
                warn!("least squares diverged: information matrix at the solution is not positive definite");
                return Err(NavigationError::divergence(
                    "information matrix is not positive definite",
                ));
            };
            *estimate = x;
            *covariance = cholesky.inverse();
            return Ok(iteration);
        }
    }
    warn!(
        "least squares did not converge in {} iterations",
        config.max_iterations
    );
    Err(NavigationError::divergence(format!(
        "no convergence after {} iterations",
        config.max_iterations
    )))
}

/// Converged least-squares solution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PvtSolution {
    /// Receiver ECEF position in meters
    pub position: Vector3<f64>,
    /// Receiver ECEF velocity in m/s
    pub velocity: Vector3<f64>,
    /// Receiver clock bias in meters
    pub clock_bias: f64,
    /// Receiver clock drift in m/s
    pub clock_drift: f64,
    /// Covariance of `[position, velocity, clock bias, clock drift]`
    pub covariance: PvtCovariance,
    /// Gauss-Newton iterations taken
    pub iterations: usize,
}
impl PvtSolution {
    /// Solve an epoch from a cold start at the Earth's center with zero velocity and clock.
    pub fn solve(
        epoch: &ObservationEpoch,
        config: &LeastSquaresConfig,
    ) -> Result<PvtSolution, NavigationError> {
        PvtSolution::solve_from(PvtVector::zeros(), epoch, config)
    }
    /// Solve an epoch starting from a prior estimate.
    pub fn solve_from(
        initial: PvtVector,
        epoch: &ObservationEpoch,
        config: &LeastSquaresConfig,
    ) -> Result<PvtSolution, NavigationError> {
        let mut x = initial;
        let mut covariance = PvtCovariance::zeros();
        let iterations = gauss_newton(&mut x, &mut covariance, epoch, config)?;
        Ok(PvtSolution {
            position: Vector3::new(x[0], x[1], x[2]),
            velocity: Vector3::new(x[3], x[4], x[5]),
            clock_bias: x[6],
            clock_drift: x[7],
            covariance,
            iterations,
        })
    }
    /// Latitude, longitude (radians) and altitude (meters) of the solution
    pub fn geodetic(&self, ellipsoid: &Ellipsoid) -> (f64, f64, f64) {
        ellipsoid.ecef_to_geodetic(&self.position)
    }
    /// Velocity resolved in NED at the solution position
    pub fn ned_velocity(&self, ellipsoid: &Ellipsoid) -> Vector3<f64> {
        let (latitude, longitude, _) = self.geodetic(ellipsoid);
        earth::ecef_velocity_to_ned(latitude, longitude, &self.velocity)
    }
}
