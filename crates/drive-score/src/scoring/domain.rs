use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telemetry event categories found in a movement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StartUp,
    IgnitionOff,
    HarshBraking,
    HarshAcceleration,
    HarshCornering,
    SpeedViolation,
    HealthCheck,
    Other,
}

impl EventKind {
    /// Harsh maneuver categories in reporting order.
    pub const fn harsh_maneuvers() -> [Self; 3] {
        [
            Self::HarshBraking,
            Self::HarshAcceleration,
            Self::HarshCornering,
        ]
    }

    pub const fn is_harsh_maneuver(self) -> bool {
        matches!(
            self,
            Self::HarshBraking | Self::HarshAcceleration | Self::HarshCornering
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::StartUp => "Start up",
            Self::IgnitionOff => "Ignition off",
            Self::HarshBraking => "Harsh Braking",
            Self::HarshAcceleration => "Harsh Acceleration",
            Self::HarshCornering => "Harsh Cornering",
            Self::SpeedViolation => "Speed Violation",
            Self::HealthCheck => "Health Check",
            Self::Other => "Other",
        }
    }

    /// Maps a report label onto a kind. Unknown labels become [`EventKind::Other`].
    pub fn from_label(raw: &str) -> Self {
        let normalized = raw
            .replace(['\u{feff}', '\u{200b}'], "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();

        match normalized.as_str() {
            "start up" | "startup" | "start-up" => Self::StartUp,
            "ignition off" => Self::IgnitionOff,
            "harsh braking" => Self::HarshBraking,
            "harsh acceleration" => Self::HarshAcceleration,
            "harsh cornering" => Self::HarshCornering,
            "speed violation" => Self::SpeedViolation,
            other if other.starts_with("health check") => Self::HealthCheck,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single normalized telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
    pub speed: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub odometer: Option<f64>,
}

impl TelemetryEvent {
    pub fn new(timestamp: NaiveDateTime, kind: EventKind) -> Self {
        Self {
            timestamp,
            kind,
            speed: None,
            latitude: None,
            longitude: None,
            odometer: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Event annotated with the trip it belongs to. Trip 0 holds events recorded
/// before the first start-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedEvent {
    pub trip_id: u32,
    pub event: TelemetryEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationReport {
    pub category: EventKind,
    pub occurrences: usize,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedPenaltyLine {
    pub timestamp: NaiveDateTime,
    pub speed: f64,
    pub speed_limit: u32,
    pub delta: f64,
    pub penalty_points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NightPenaltyLine {
    pub trip_id: u32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub penalty_points: u32,
}

impl NightPenaltyLine {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}

/// Final figures handed to the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreReport {
    pub no_drive_days: u32,
    pub driving_penalty_total: u32,
    pub night_penalty_total: u32,
    pub distance_km: f64,
}

/// Non-fatal conditions collected while importing or scoring a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreWarning {
    MalformedEvent {
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<NaiveDateTime>,
        reason: String,
    },
    LookupUnavailable {
        timestamp: NaiveDateTime,
        latitude: Option<f64>,
        longitude: Option<f64>,
        reason: String,
    },
    LookupDisabled {
        reason: String,
    },
}

impl fmt::Display for ScoreWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreWarning::MalformedEvent {
                line: Some(line),
                reason,
                ..
            } => write!(f, "malformed event on line {line}: {reason}"),
            ScoreWarning::MalformedEvent {
                timestamp: Some(timestamp),
                reason,
                ..
            } => write!(f, "malformed event at {timestamp}: {reason}"),
            ScoreWarning::MalformedEvent { reason, .. } => write!(f, "malformed event: {reason}"),
            ScoreWarning::LookupUnavailable {
                timestamp,
                latitude,
                longitude,
                reason,
            } => match (latitude, longitude) {
                (Some(lat), Some(lon)) => write!(
                    f,
                    "no speed limit for {timestamp} @ {lat}, {lon}: {reason}"
                ),
                _ => write!(f, "no speed limit for {timestamp}: {reason}"),
            },
            ScoreWarning::LookupDisabled { reason } => {
                write!(f, "speed limit lookup disabled: {reason}")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("insufficient data: {0}")]
    InsufficientData(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_back_onto_kinds() {
        assert_eq!(EventKind::from_label("Start up"), EventKind::StartUp);
        assert_eq!(EventKind::from_label("  IGNITION   off "), EventKind::IgnitionOff);
        assert_eq!(
            EventKind::from_label("Health Check; (Ignition off)"),
            EventKind::HealthCheck
        );
        assert_eq!(EventKind::from_label("Geofence Entry"), EventKind::Other);

        for kind in EventKind::harsh_maneuvers() {
            assert_eq!(EventKind::from_label(kind.label()), kind);
            assert!(kind.is_harsh_maneuver());
        }
        assert!(!EventKind::SpeedViolation.is_harsh_maneuver());
    }
}
