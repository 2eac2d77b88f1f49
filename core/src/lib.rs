//! Tightly-coupled GNSS/INS navigation
//!
//! This crate estimates the position, velocity, attitude and receiver clock of a single rigid
//! platform carrying one IMU and one GNSS antenna. Inertial samples are integrated by a
//! strapdown mechanization in the local-level (North-East-Down) frame, and the accumulated
//! errors are estimated by an error-state Kalman filter fed directly with satellite
//! pseudoranges and pseudorange rates. A weighted Gauss-Newton least-squares solver provides
//! the cold-start position, velocity and clock from a single epoch of observations.
//!
//! The primary reference text is _Principles of GNSS, Inertial, and Multisensor Integrated
//! Navigation Systems, 2nd Edition_ by Paul D. Groves. Variables are named for the quantity they
//! represent rather than the symbol used in the book.
//!
//! ## Crate overview
//!
//! - [earth]: Ellipsoid parameters, radii of curvature, normal gravity, Earth and transport
//!   rates, and geodetic/ECEF/NED conversions.
//! - [attitude]: Quaternion, rotation matrix and Euler angle conversions.
//! - [strapdown]: The [`strapdown::NavigationState`] and the mechanization step.
//! - [least_squares]: Pseudorange/pseudorange-rate geometry and the Gauss-Newton PVT solver.
//! - [filter]: The 17-state error-state [`filter::NavigationFilter`].
//! - [linearize]: Error-state transition, process noise and GNSS measurement Jacobians.
//! - [linalg]: Covariance helpers (symmetrization, Cholesky solves, conditioning).
//! - [observation]: Satellite observation epochs.
//! - [config]: Filter configuration files.
//! - [messages]: Time-ordered IMU/GNSS event streams and the replay driver.
//! - [record]: The fixed-layout navigation result record.
//! - [error]: [`NavigationError`].
//!
//! ## Conventions
//!
//! - Latitude and longitude are geodetic, in radians; altitude is meters above the ellipsoid,
//!   positive up.
//! - Velocity is resolved in NED, m/s.
//! - Attitude is the body-to-NED rotation $C_b^n$ held as a unit quaternion.
//! - IMU samples are body-frame angular rate $\omega_{ib}^b$ (rad/s) and specific force
//!   $f_{ib}^b$ (m/s^2). They include Earth rotation and the reaction to gravity; a level
//!   platform at rest measures a specific force of roughly $[0, 0, -g]$.
//! - Clock bias and drift are expressed in meters and m/s (scaled by the speed of light).
//! - Error states are defined as truth minus estimate.
//!
//! ## Typical use
//!
//! ```rust
//! use gnss_ins::filter::NavigationFilter;
//! use gnss_ins::strapdown::IMUData;
//! use nalgebra::Vector3;
//!
//! let mut filter = NavigationFilter::default();
//! filter.set_position(32.0_f64.to_radians(), -85.5_f64.to_radians(), 200.0);
//! let imu = IMUData::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -9.79));
//! for _ in 0..100 {
//!     filter.mechanize(&imu, 0.01);
//!     filter.propagate(&imu, 0.01);
//! }
//! // Fuse satellite observations as they arrive:
//! // filter.gnss_update(&epoch)?;
//! let record = filter.result(1.0);
//! assert!((record.lat - 32.0).abs() < 1e-3);
//! ```
pub mod attitude;
pub mod config;
pub mod earth;
pub mod error;
pub mod filter;
pub mod least_squares;
pub mod linalg;
pub mod linearize;
pub mod messages;
pub mod observation;
pub mod record;
pub mod strapdown;

pub use error::NavigationError;
pub use filter::NavigationFilter;
pub use strapdown::{IMUData, NavigationState};
