//! Movement report import.

mod mapping;
mod normalizer;
mod parser;

use crate::scoring::{EventSource, ScoreWarning, TelemetryEvent};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(&'static str),
    NoReports(PathBuf),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read movement report: {}", err),
            ImportError::Csv(err) => write!(f, "invalid movement report CSV data: {}", err),
            ImportError::MissingColumn(column) => {
                write!(f, "movement report has no '{}' column", column)
            }
            ImportError::NoReports(dir) => {
                write!(f, "no movement reports found in {}", dir.display())
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::MissingColumn(_) | ImportError::NoReports(_) => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// One vehicle's parsed movement report.
#[derive(Debug, Clone, Default)]
pub struct MovementReport {
    pub vehicle: Option<String>,
    pub distance_km: f64,
    pub events: Vec<TelemetryEvent>,
    pub warnings: Vec<ScoreWarning>,
    pub metadata: BTreeMap<String, String>,
}

impl EventSource for MovementReport {
    fn load_events(&self) -> Vec<TelemetryEvent> {
        self.events.clone()
    }

    fn extract_distance(&self) -> f64 {
        self.distance_km
    }

    fn ingestion_warnings(&self) -> Vec<ScoreWarning> {
        self.warnings.clone()
    }
}

pub struct MovementReportImporter;

impl MovementReportImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<MovementReport, ImportError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading movement report");
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<MovementReport, ImportError> {
        let parsed = parser::parse_report(reader)?;
        for warning in &parsed.warnings {
            warn!(%warning, "skipping row");
        }

        let distance_km = parsed
            .metadata
            .get("distance")
            .and_then(|value| normalizer::parse_distance_km(value))
            .or_else(|| odometer_span(&parsed.events))
            .unwrap_or(0.0);
        let vehicle = parsed
            .metadata
            .get("vehicle")
            .filter(|value| !value.is_empty())
            .cloned();

        Ok(MovementReport {
            vehicle,
            distance_km,
            events: parsed.events,
            warnings: parsed.warnings,
            metadata: parsed.metadata,
        })
    }

    /// Most recently modified `.csv` report in `dir`.
    pub fn latest_in<P: AsRef<Path>>(dir: P) -> Result<PathBuf, ImportError> {
        let dir = dir.as_ref();
        let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_csv = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv || !entry.file_type()?.is_file() {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            if latest.as_ref().map_or(true, |(newest, _)| modified > *newest) {
                latest = Some((modified, path));
            }
        }

        latest
            .map(|(_, path)| path)
            .ok_or_else(|| ImportError::NoReports(dir.to_path_buf()))
    }
}

fn odometer_span(events: &[TelemetryEvent]) -> Option<f64> {
    let mut readings = events.iter().filter_map(|event| event.odometer);
    let first = readings.next()?;
    let (min, max) = readings.fold((first, first), |(min, max), value| {
        (min.min(value), max.max(value))
    });
    Some(max - min)
}
