//! Satellite observations for one GNSS epoch.
//!
//! Satellite positions and velocities come from an external orbit model and are expressed in
//! ECEF meters and m/s. Pseudoranges are assumed to already include the satellite clock
//! correction. Satellites are independent and their order within an epoch is irrelevant.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::least_squares::range_and_rate;

/// One satellite's contribution to an epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SatelliteObservation {
    /// Satellite ECEF position in meters
    pub position: Vector3<f64>,
    /// Satellite ECEF velocity in m/s
    pub velocity: Vector3<f64>,
    /// Pseudorange in meters
    pub pseudorange: f64,
    /// Pseudorange rate in m/s
    pub pseudorange_rate: f64,
    /// Pseudorange variance in m^2
    pub pseudorange_variance: f64,
    /// Pseudorange-rate variance in (m/s)^2
    pub pseudorange_rate_variance: f64,
}
impl SatelliteObservation {
    /// Noiseless observation of a satellite from a known receiver state.
    ///
    /// Clock bias and drift are in meters and m/s. Used to synthesize epochs for simulation
    /// and testing.
    #[allow(clippy::too_many_arguments)]
    pub fn from_truth(
        satellite_position: Vector3<f64>,
        satellite_velocity: Vector3<f64>,
        user_position: &Vector3<f64>,
        user_velocity: &Vector3<f64>,
        clock_bias: f64,
        clock_drift: f64,
        pseudorange_variance: f64,
        pseudorange_rate_variance: f64,
    ) -> SatelliteObservation {
        let geometry = range_and_rate(
            user_position,
            user_velocity,
            clock_bias,
            clock_drift,
            &satellite_position,
            &satellite_velocity,
        );
        SatelliteObservation {
            position: satellite_position,
            velocity: satellite_velocity,
            pseudorange: geometry.pseudorange,
            pseudorange_rate: geometry.pseudorange_rate,
            pseudorange_variance,
            pseudorange_rate_variance,
        }
    }
}

/// All satellite observations sharing one receive time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationEpoch {
    /// Receive time in seconds
    pub time: f64,
    pub satellites: Vec<SatelliteObservation>,
}
impl ObservationEpoch {
    pub fn new(time: f64, satellites: Vec<SatelliteObservation>) -> ObservationEpoch {
        ObservationEpoch { time, satellites }
    }
    /// Build an epoch from parallel per-satellite arrays.
    ///
    /// # Panics
    /// If the arrays do not all have the same length. Mismatched arrays are a caller error.
    pub fn from_arrays(
        time: f64,
        positions: &[Vector3<f64>],
        velocities: &[Vector3<f64>],
        pseudoranges: &[f64],
        pseudorange_rates: &[f64],
        pseudorange_variances: &[f64],
        pseudorange_rate_variances: &[f64],
    ) -> ObservationEpoch {
        let n = positions.len();
        assert!(
            velocities.len() == n
                && pseudoranges.len() == n
                && pseudorange_rates.len() == n
                && pseudorange_variances.len() == n
                && pseudorange_rate_variances.len() == n,
            "per-satellite arrays must have equal length (positions: {}, velocities: {}, psr: {}, psrdot: {}, psr variance: {}, psrdot variance: {})",
            n,
            velocities.len(),
            pseudoranges.len(),
            pseudorange_rates.len(),
            pseudorange_variances.len(),
            pseudorange_rate_variances.len()
        );
        let satellites = (0..n)
            .map(|i| SatelliteObservation {
                position: positions[i],
                velocity: velocities[i],
                pseudorange: pseudoranges[i],
                pseudorange_rate: pseudorange_rates[i],
                pseudorange_variance: pseudorange_variances[i],
                pseudorange_rate_variance: pseudorange_rate_variances[i],
            })
            .collect();
        ObservationEpoch { time, satellites }
    }
    pub fn len(&self) -> usize {
        self.satellites.len()
    }
    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, SatelliteObservation> {
        self.satellites.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn from_arrays() {
        let positions = [Vector3::new(2e7, 0.0, 0.0), Vector3::new(0.0, 2e7, 0.0)];
        let velocities = [Vector3::zeros(), Vector3::new(0.0, 0.0, 3000.0)];
        let epoch = ObservationEpoch::from_arrays(
            12.5,
            &positions,
            &velocities,
            &[2.1e7, 2.2e7],
            &[-10.0, 15.0],
            &[25.0, 36.0],
            &[0.01, 0.04],
        );
        assert_eq!(epoch.len(), 2);
        assert!(!epoch.is_empty());
        assert_eq!(epoch.time, 12.5);
        assert_eq!(epoch.satellites[1].velocity[2], 3000.0);
        assert_eq!(epoch.satellites[1].pseudorange_variance, 36.0);
        assert_eq!(epoch.iter().count(), 2);
    }
    #[test]
    #[should_panic(expected = "per-satellite arrays must have equal length")]
    fn mismatched_arrays_panic() {
        let positions = [Vector3::new(2e7, 0.0, 0.0)];
        let _ = ObservationEpoch::from_arrays(
            0.0,
            &positions,
            &[],
            &[2.1e7],
            &[0.0],
            &[1.0],
            &[1.0],
        );
    }
    #[test]
    fn from_truth() {
        let user = Vector3::new(6_378_137.0, 0.0, 0.0);
        let sat = Vector3::new(26_378_137.0, 0.0, 0.0);
        let obs = SatelliteObservation::from_truth(
            sat,
            Vector3::new(-100.0, 5.0, 0.0),
            &user,
            &Vector3::zeros(),
            30.0,
            -0.5,
            4.0,
            0.01,
        );
        assert_approx_eq!(obs.pseudorange, 20_000_030.0, 1e-6);
        assert_approx_eq!(obs.pseudorange_rate, -100.5, 1e-9);
    }
    #[test]
    fn serde_json() {
        let epoch = ObservationEpoch::new(
            1.0,
            vec![SatelliteObservation {
                position: Vector3::new(1.0, 2.0, 3.0),
                velocity: Vector3::new(4.0, 5.0, 6.0),
                pseudorange: 7.0,
                pseudorange_rate: 8.0,
                pseudorange_variance: 9.0,
                pseudorange_rate_variance: 10.0,
            }],
        );
        let text = serde_json::to_string(&epoch).unwrap();
        let back: ObservationEpoch = serde_json::from_str(&text).unwrap();
        assert_eq!(back, epoch);
    }
}
