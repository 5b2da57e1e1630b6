//! Persisting trials. Two kinds of files are written per trial:
//!
//! - a CSV with one row per sample and one column per field of
//!   [`PhysicsFrame`], for the spreadsheet and plotting tools in the lab,
//! - the raw [`Trial`], encoded with [serde] and [ron], so the analysis can
//!   be re-run later without the rig.
//!
//! Non-finite values are written as they are (`NaN`, `inf`), so bad trials
//! stay recognisable downstream.

use crate::{
    capture::Trial,
    config::SurfaceConfig,
    physics::{PhysicsFrame, TrialResult},
};

use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
};

/// Things that can go wrong while writing or reading reports.
#[derive(Debug)]
pub enum ReportError {
    /// A report file could not be created, written or read.
    IoError(std::io::Error),

    /// A trial could not be encoded as RON.
    RonError(ron::Error),

    /// A saved trial is not valid RON.
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ReportError as RE;
        let msg = match self {
            RE::IoError(error) => Cow::from(format!("io error: {}", error)),
            RE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            RE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ReportError {}

impl From<std::io::Error> for ReportError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

/// Write `result` as CSV to the [Write]able object provided.
pub fn write_csv(result: &TrialResult, out: &mut impl Write) -> Result<(), ReportError> {
    writeln!(out, "{}", PhysicsFrame::COLUMNS.join(","))?;
    for frame in &result.frames {
        let row: Vec<String> = frame.values().iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

/// Write `result` as CSV to the path provided.
pub fn write_csv_to_path(result: &TrialResult, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let mut handle = BufWriter::new(File::create(path)?);
    write_csv(result, &mut handle)?;
    handle.flush()?;
    Ok(())
}

/// Write the raw samples of `trial` to the [Write]able object provided.
pub fn write_trial(trial: &Trial, out: &mut impl Write) -> Result<(), ReportError> {
    let text = ron::ser::to_string_pretty(trial, ron::ser::PrettyConfig::default())
        .map_err(ReportError::RonError)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Write the raw samples of `trial` to the path provided.
pub fn write_trial_to_path(trial: &Trial, path: impl AsRef<Path>) -> Result<(), ReportError> {
    let mut handle = BufWriter::new(File::create(path)?);
    write_trial(trial, &mut handle)?;
    handle.flush()?;
    Ok(())
}

/// Read a trial saved with [`write_trial`] from the [Read]able object provided.
pub fn read_trial(input: &mut impl Read) -> Result<Trial, ReportError> {
    let mut text = Vec::new();
    input.read_to_end(&mut text)?;
    ron::de::from_bytes(&text).map_err(ReportError::RonSpannedError)
}

/// Read a trial saved with [`write_trial_to_path`] from the path provided.
pub fn read_trial_from_path(path: impl AsRef<Path>) -> Result<Trial, ReportError> {
    let mut handle = File::open(path)?;
    read_trial(&mut handle)
}

/// Names the report files of a trial after its angle, the body mass and the
/// sandpaper on both surfaces.
#[derive(Debug, Clone)]
pub struct ReportNames {
    /// File name shared by both reports, without extension.
    pub stem: String,
}

impl ReportNames {
    /// Build the names for one trial.
    pub fn new(angle_deg: f64, mass_kg: f64, surface: &SurfaceConfig) -> Self {
        Self {
            stem: format!(
                "trial_{}deg_{}kg_c{}_l{}",
                angle_deg, mass_kg, surface.body_grit, surface.table_grit
            ),
        }
    }

    /// Path of the CSV report inside `dir`.
    pub fn csv_in(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(format!("{}.csv", self.stem))
    }

    /// Path of the raw RON archive inside `dir`.
    pub fn raw_in(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(format!("{}.raw.ron", self.stem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{capture::RawSample, physics::derive};
    use std::io::Cursor;

    fn ramp_trial() -> Trial {
        Trial {
            angle_deg: 30.0,
            samples: (0..15)
                .map(|i| RawSample {
                    timestamp_ms: i * 40,
                    distance_cm: 12.0 + 3.0 * (i * i) as f64 / 4.0,
                })
                .collect(),
        }
    }

    #[test]
    fn csv_has_a_header_and_a_row_per_frame() {
        let result = derive(&ramp_trial(), 0.04, 9.81);
        let mut buf = Vec::new();
        write_csv(&result, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 16);
        assert!(lines[0].starts_with("time_s,distance_raw_cm,position_m,velocity_raw_mps"));
        assert!(lines[0].ends_with("friction_work_cumulative_j"));

        for (line, frame) in lines[1..].iter().zip(&result.frames) {
            let fields: Vec<f64> = line.split(',').map(|f| f.parse().unwrap()).collect();
            assert_eq!(fields.len(), PhysicsFrame::COLUMNS.len());
            assert_eq!(fields, frame.values().to_vec());
        }
    }

    #[test]
    fn csv_keeps_non_finite_values() {
        let mut result = derive(&ramp_trial(), 0.04, 9.81);
        result.frames[0].acceleration = f64::NAN;
        result.frames[1].velocity = f64::INFINITY;

        let mut buf = Vec::new();
        write_csv(&result, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("NaN"));
        assert!(text.contains("inf"));
    }

    #[test]
    fn write_csv_to_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let names = ReportNames::new(30.0, 0.04, &SurfaceConfig::default());
        let path = names.csv_in(dir.path());
        assert!(path.ends_with("trial_30deg_0.04kg_c220_l80.csv"));

        let result = derive(&ramp_trial(), 0.04, 9.81);
        write_csv_to_path(&result, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 16);
    }

    #[test]
    fn raw_trial_write_and_read_cursor() {
        let trial = ramp_trial();
        let mut buf = Cursor::new(Vec::new());
        write_trial(&trial, &mut buf).unwrap();
        buf.set_position(0);
        assert_eq!(read_trial(&mut buf).unwrap(), trial);
    }

    #[test]
    fn raw_trial_write_and_read_path() {
        let tempfile = tempfile::NamedTempFile::new().unwrap();
        let trial = ramp_trial();
        write_trial_to_path(&trial, tempfile.path()).unwrap();
        assert_eq!(read_trial_from_path(tempfile.path()).unwrap(), trial);
    }

    #[test]
    fn garbage_is_not_a_trial() {
        let mut buf = Cursor::new(b"(angle_deg: 3".to_vec());
        assert!(matches!(
            read_trial(&mut buf),
            Err(ReportError::RonSpannedError(_))
        ));
    }
}
