//! Time-ordered sensor event streams.
//!
//! An [`EventStream`] interleaves IMU samples and GNSS observation epochs in the order they
//! should reach the filter. Streams are stored as JSON lines, one [`Event`] per line, tagged by
//! `kind`:
//!
//! ```text
//! {"kind":"imu","dt_s":0.01,"imu":{"accel":[0.0,0.0,-9.79],"gyro":[0.0,0.0,0.0]},"elapsed_s":0.01}
//! {"kind":"gnss","epoch":{"time":1.0,"satellites":[...]},"elapsed_s":1.0}
//! ```
//!
//! [`replay`] drives a [`NavigationFilter`] through a stream and returns one [`NavResult`] per
//! accepted GNSS update.
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::filter::{FilterStatus, NavigationFilter};
use crate::least_squares::{LeastSquaresConfig, PvtSolution};
use crate::observation::ObservationEpoch;
use crate::record::NavResult;
use crate::strapdown::IMUData;

/// One input to the filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// IMU sample covering `dt_s` seconds and ending at `elapsed_s`
    Imu {
        dt_s: f64,
        imu: IMUData,
        elapsed_s: f64,
    },
    /// One epoch of satellite observations received at `elapsed_s`
    Gnss {
        epoch: ObservationEpoch,
        elapsed_s: f64,
    },
}
impl Event {
    pub fn elapsed_s(&self) -> f64 {
        match self {
            Event::Imu { elapsed_s, .. } | Event::Gnss { elapsed_s, .. } => *elapsed_s,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventStream {
    pub events: Vec<Event>,
}
impl EventStream {
    pub fn new(events: Vec<Event>) -> EventStream {
        EventStream { events }
    }
    pub fn len(&self) -> usize {
        self.events.len()
    }
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
    /// Number of IMU and GNSS events
    pub fn counts(&self) -> (usize, usize) {
        let imu = self
            .events
            .iter()
            .filter(|e| matches!(e, Event::Imu { .. }))
            .count();
        (imu, self.events.len() - imu)
    }
    /// Write the stream as JSON lines.
    pub fn to_jsonl<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for event in &self.events {
            serde_json::to_writer(&mut writer, event).map_err(io::Error::other)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
    /// Read a JSON-lines stream. Blank lines are ignored. A malformed line, or an event
    /// timestamped before the one preceding it, is reported with its line number.
    pub fn from_jsonl<P: AsRef<Path>>(path: P) -> io::Result<EventStream> {
        let reader = BufReader::new(File::open(path)?);
        let mut events: Vec<Event> = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let invalid = |message: String| {
                io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {message}", number + 1))
            };
            let event: Event = serde_json::from_str(&line).map_err(|e| invalid(e.to_string()))?;
            if let Some(previous) = events.last()
                && event.elapsed_s() < previous.elapsed_s()
            {
                return Err(invalid(format!(
                    "event at {} s precedes the previous event at {} s",
                    event.elapsed_s(),
                    previous.elapsed_s()
                )));
            }
            events.push(event);
        }
        Ok(EventStream { events })
    }
}

/// Run a filter over an event stream.
///
/// IMU events are mechanized and propagated. GNSS events update the filter; a filter that is
/// still [`FilterStatus::Uninitialized`] is instead seeded from a least-squares solution of the
/// epoch. Epochs the filter declines are logged and skipped, and the run continues on inertial
/// data alone until the next epoch.
pub fn replay(
    filter: &mut NavigationFilter,
    stream: &EventStream,
    least_squares: &LeastSquaresConfig,
) -> Vec<NavResult> {
    let mut results = Vec::new();
    let mut skipped = 0usize;
    for event in &stream.events {
        match event {
            Event::Imu { dt_s, imu, .. } => {
                if filter.status() == FilterStatus::Running {
                    filter.mechanize(imu, *dt_s);
                    filter.propagate(imu, *dt_s);
                }
            }
            Event::Gnss { epoch, elapsed_s } => {
                let outcome = match filter.status() {
                    FilterStatus::Uninitialized => PvtSolution::solve(epoch, least_squares)
                        .map(|solution| filter.initialize_from_solution(&solution)),
                    FilterStatus::Running => filter.gnss_update(epoch),
                };
                match outcome {
                    Ok(()) => results.push(filter.result(*elapsed_s)),
                    Err(e) => {
                        skipped += 1;
                        warn!("epoch at {elapsed_s:.3} s not applied: {e}");
                    }
                }
            }
        }
    }
    info!(
        "replayed {} events: {} epochs applied, {} skipped",
        stream.len(),
        results.len(),
        skipped
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use tempfile::NamedTempFile;

    fn imu_event(elapsed_s: f64) -> Event {
        Event::Imu {
            dt_s: 0.01,
            imu: IMUData::new(Vector3::new(0.0, 0.0, 1e-3), Vector3::new(0.0, 0.1, -9.8)),
            elapsed_s,
        }
    }

    #[test]
    fn jsonl_round_trip() {
        let stream = EventStream::new(vec![
            imu_event(0.01),
            imu_event(0.02),
            Event::Gnss {
                epoch: ObservationEpoch::new(0.02, Vec::new()),
                elapsed_s: 0.02,
            },
        ]);
        let f = NamedTempFile::new().unwrap();
        stream.to_jsonl(f.path()).unwrap();
        let text = std::fs::read_to_string(f.path()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains(r#""kind":"imu""#));
        let loaded = EventStream::from_jsonl(f.path()).unwrap();
        assert_eq!(loaded, stream);
        assert_eq!(loaded.counts(), (2, 1));
        assert_eq!(loaded.events[2].elapsed_s(), 0.02);
    }
    #[test]
    fn malformed_line_reports_line_number() {
        let f = NamedTempFile::new().unwrap();
        let good = serde_json::to_string(&imu_event(0.01)).unwrap();
        std::fs::write(f.path(), format!("{good}\n\n{{\"kind\":\"baro\"}}\n")).unwrap();
        let err = EventStream::from_jsonl(f.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().starts_with("line 3"));
    }
    #[test]
    fn out_of_order_event_is_rejected() {
        let f = NamedTempFile::new().unwrap();
        let lines: Vec<String> = [0.01, 0.03, 0.02]
            .into_iter()
            .map(|t| serde_json::to_string(&imu_event(t)).unwrap())
            .collect();
        std::fs::write(f.path(), lines.join("\n")).unwrap();
        let err = EventStream::from_jsonl(f.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().starts_with("line 3"));
    }
    #[test]
    fn uninitialized_filter_ignores_imu_and_skips_bad_epochs() {
        let mut filter = NavigationFilter::default();
        let stream = EventStream::new(vec![
            imu_event(0.01),
            Event::Gnss {
                epoch: ObservationEpoch::new(0.01, Vec::new()),
                elapsed_s: 0.01,
            },
        ]);
        let results = replay(&mut filter, &stream, &LeastSquaresConfig::default());
        assert!(results.is_empty());
        assert_eq!(filter.status(), FilterStatus::Uninitialized);
        assert_eq!(filter.state().velocity, Vector3::zeros());
    }
}
