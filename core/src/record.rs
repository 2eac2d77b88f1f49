//! Navigation result records.
//!
//! A [`NavResult`] is the persisted state layout written once per corrected epoch: twelve
//! little-endian `f64` values, 96 bytes, with no header or padding between records. The same
//! rows can be exported to CSV for inspection.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::attitude::wrap_to_pi;
use crate::strapdown::NavigationState;

/// Number of `f64` fields in a record
pub const RECORD_FIELDS: usize = 12;
/// Size of one binary record in bytes
pub const RECORD_BYTES: usize = RECORD_FIELDS * 8;

/// One navigation solution.
///
/// Latitude, longitude, roll, pitch and yaw are in degrees; longitude and the Euler angles are
/// wrapped to [-180, 180].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NavResult {
    /// Time in seconds
    pub t: f64,
    pub lat: f64,
    pub lon: f64,
    /// Altitude in meters
    pub alt: f64,
    /// North velocity, m/s
    pub vn: f64,
    /// East velocity, m/s
    pub ve: f64,
    /// Down velocity, m/s
    pub vd: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    /// Receiver clock bias, meters
    pub cb: f64,
    /// Receiver clock drift, m/s
    pub cd: f64,
}

impl NavResult {
    pub fn from_state(time: f64, state: &NavigationState, clock_bias: f64, clock_drift: f64) -> NavResult {
        let (roll, pitch, yaw) = state.euler_angles();
        NavResult {
            t: time,
            lat: state.latitude.to_degrees(),
            lon: wrap_to_pi(state.longitude).to_degrees(),
            alt: state.altitude,
            vn: state.velocity[0],
            ve: state.velocity[1],
            vd: state.velocity[2],
            roll: wrap_to_pi(roll).to_degrees(),
            pitch: pitch.to_degrees(),
            yaw: wrap_to_pi(yaw).to_degrees(),
            cb: clock_bias,
            cd: clock_drift,
        }
    }
    /// Fields in record order
    pub fn to_array(&self) -> [f64; RECORD_FIELDS] {
        [
            self.t, self.lat, self.lon, self.alt, self.vn, self.ve, self.vd, self.roll, self.pitch,
            self.yaw, self.cb, self.cd,
        ]
    }
    pub fn from_array(values: [f64; RECORD_FIELDS]) -> NavResult {
        let [t, lat, lon, alt, vn, ve, vd, roll, pitch, yaw, cb, cd] = values;
        NavResult {
            t,
            lat,
            lon,
            alt,
            vn,
            ve,
            vd,
            roll,
            pitch,
            yaw,
            cb,
            cd,
        }
    }
    pub fn to_bytes(&self) -> [u8; RECORD_BYTES] {
        let mut bytes = [0u8; RECORD_BYTES];
        for (chunk, value) in bytes.chunks_exact_mut(8).zip(self.to_array()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }
    pub fn from_bytes(bytes: &[u8; RECORD_BYTES]) -> NavResult {
        let mut values = [0.0; RECORD_FIELDS];
        for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            *value = f64::from_le_bytes(word);
        }
        NavResult::from_array(values)
    }
    /// Append this record to a binary stream.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
    /// Read the next record from a binary stream; `None` at a clean end of stream.
    ///
    /// A trailing partial record is reported as [`io::ErrorKind::UnexpectedEof`].
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Option<NavResult>> {
        let mut bytes = [0u8; RECORD_BYTES];
        let mut filled = 0;
        while filled < RECORD_BYTES {
            match reader.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        match filled {
            0 => Ok(None),
            RECORD_BYTES => Ok(Some(NavResult::from_bytes(&bytes))),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("partial record of {filled} bytes"),
            )),
        }
    }
    /// Write records to a binary file.
    pub fn to_binary<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for record in records {
            record.write_to(&mut writer)?;
        }
        writer.flush()
    }
    /// Read every record of a binary file.
    pub fn from_binary<P: AsRef<Path>>(path: P) -> io::Result<Vec<Self>> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        while let Some(record) = NavResult::read_from(&mut reader)? {
            records.push(record);
        }
        Ok(records)
    }
    /// Write records to a CSV file with a header row of field names.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
    /// Read records from a CSV file written by [`NavResult::to_csv`].
    pub fn from_csv<P: AsRef<Path>>(path: P) -> io::Result<Vec<Self>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in reader.deserialize() {
            records.push(result?);
        }
        Ok(records)
    }
}
