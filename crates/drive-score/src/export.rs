//! Persists score reports into a per-vehicle summary table.

use crate::scoring::ScoreReport;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to access summary file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid summary CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("summary target name must not be empty")]
    EmptyTarget,
}

/// Destination for finished reports, keyed by vehicle or sheet name.
pub trait ReportSink {
    fn write(
        &self,
        target: &str,
        reference_date: NaiveDate,
        report: &ScoreReport,
    ) -> Result<(), ExportError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub target: String,
    pub reference_date: NaiveDate,
    pub driving_penalty: u32,
    pub night_penalty: u32,
    pub no_drive_days: u32,
    pub distance_km: u64,
}

impl SummaryRow {
    pub fn from_report(target: &str, reference_date: NaiveDate, report: &ScoreReport) -> Self {
        Self {
            target: target.to_string(),
            reference_date,
            driving_penalty: report.driving_penalty_total,
            night_penalty: report.night_penalty_total,
            no_drive_days: report.no_drive_days,
            distance_km: report.distance_km.max(0.0).round() as u64,
        }
    }
}

/// Keeps one row per target in a CSV file, replacing the row on rewrite.
#[derive(Debug, Clone)]
pub struct CsvSummaryWriter {
    path: PathBuf,
}

impl CsvSummaryWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> Result<Vec<SummaryRow>, ExportError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        reader
            .deserialize::<SummaryRow>()
            .map(|row| row.map_err(ExportError::from))
            .collect()
    }
}

impl ReportSink for CsvSummaryWriter {
    fn write(
        &self,
        target: &str,
        reference_date: NaiveDate,
        report: &ScoreReport,
    ) -> Result<(), ExportError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ExportError::EmptyTarget);
        }

        let mut rows = self.rows()?;
        let row = SummaryRow::from_report(target, reference_date, report);
        match rows.iter_mut().find(|existing| existing.target == target) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), target, "score summary written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(driving: u32, distance_km: f64) -> ScoreReport {
        ScoreReport {
            no_drive_days: 4,
            driving_penalty_total: driving,
            night_penalty_total: 12,
            distance_km,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, day).expect("valid date")
    }

    #[test]
    fn rewriting_a_target_replaces_its_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = CsvSummaryWriter::new(dir.path().join("summary").join("drive.csv"));

        writer.write("Stefan", date(10), &report(19, 412.6)).expect("write");
        writer.write("DEV", date(10), &report(3, 10.0)).expect("write");
        writer.write("Stefan", date(17), &report(27, 530.2)).expect("rewrite");

        let rows = writer.rows().expect("rows load");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].target, "Stefan");
        assert_eq!(rows[0].reference_date, date(17));
        assert_eq!(rows[0].driving_penalty, 27);
        assert_eq!(rows[0].distance_km, 530);
        assert_eq!(rows[1].target, "DEV");
    }

    #[test]
    fn empty_target_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = CsvSummaryWriter::new(dir.path().join("drive.csv"));
        let error = writer
            .write("  ", date(1), &report(0, 0.0))
            .expect_err("expected rejection");
        assert!(matches!(error, ExportError::EmptyTarget));
        assert!(writer.rows().expect("rows").is_empty());
    }
}
