//! Attitude representations and the incremental rotation used by the mechanization.
//!
//! Attitude is the body-to-local-level (NED) rotation. It is carried as a unit quaternion,
//! which is the integrated primitive, with the equivalent rotation matrix derived from it.
//! Euler angles follow the aerospace ZYX (yaw, pitch, roll) sequence, which is also
//! nalgebra's `from_euler_angles(roll, pitch, yaw)` convention.
use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};

/// Half-angle (rad) below which the rotation increment uses the first-order form.
pub const SMALL_ANGLE_THRESHOLD: f64 = 1e-5;

/// Quaternion increment for a rotation vector accumulated over one IMU interval.
///
/// With $\gamma = |\psi| / 2$ the increment is $[\cos\gamma, \psi \sin\gamma / |\psi|]$.
/// Below [`SMALL_ANGLE_THRESHOLD`] the vector part switches to $\psi / 2$, which is the
/// first-order Taylor form and avoids the 0/0 limit of the exact expression. The scalar
/// part is $\cos\gamma$ in both branches, so the result is only approximately unit-norm
/// and must be renormalized by the caller after composition.
///
/// # Arguments
/// - `rotation_vector` - body-frame rotation vector $\psi$ in radians
///
/// # Example
/// ```rust
/// use nalgebra::Vector3;
/// use gnss_ins::attitude::rotation_increment;
/// let dq = rotation_increment(&Vector3::new(0.0, 0.0, 0.2));
/// assert!((dq.w - 0.1_f64.cos()).abs() < 1e-15);
/// assert!((dq.k - 0.1_f64.sin()).abs() < 1e-15);
/// ```
pub fn rotation_increment(rotation_vector: &Vector3<f64>) -> Quaternion<f64> {
    let half_angle = 0.5 * rotation_vector.norm();
    let scale = if half_angle < SMALL_ANGLE_THRESHOLD {
        0.5
    } else {
        0.5 * half_angle.sin() / half_angle
    };
    let vector_part = rotation_vector * scale;
    Quaternion::new(
        half_angle.cos(),
        vector_part[0],
        vector_part[1],
        vector_part[2],
    )
}
/// Body-to-NED quaternion from roll, pitch and yaw in radians.
pub fn quaternion_from_euler(roll: f64, pitch: f64, yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(roll, pitch, yaw)
}
/// Body-to-NED quaternion from a rotation matrix.
///
/// The matrix is assumed orthonormal; nalgebra's extraction picks the numerically best
/// branch of the trace formula so the result is unit-norm even for slightly perturbed input.
pub fn quaternion_from_matrix(matrix: &Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*matrix))
}
/// Roll, pitch and yaw (radians) of a body-to-NED quaternion.
pub fn euler_from_quaternion(quaternion: &UnitQuaternion<f64>) -> (f64, f64, f64) {
    quaternion.euler_angles()
}
/// Wrap an angle in radians to the range $[-\pi, \pi]$
///
/// # Example
/// ```rust
/// use gnss_ins::attitude::wrap_to_pi;
/// use std::f64::consts::PI;
/// assert!((wrap_to_pi(1.5 * PI) + 0.5 * PI).abs() < 1e-12);
/// ```
pub fn wrap_to_pi(angle: f64) -> f64 {
    let mut wrapped = angle;
    while wrapped > std::f64::consts::PI {
        wrapped -= std::f64::consts::TAU;
    }
    while wrapped < -std::f64::consts::PI {
        wrapped += std::f64::consts::TAU;
    }
    wrapped
}
