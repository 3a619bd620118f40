use super::domain::{EventKind, ScoreWarning, SpeedPenaltyLine, TaggedEvent, TelemetryEvent};
use crate::speed_limits::SpeedLimitLookup;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Violations less than this far over the default limit are never scored.
pub const SPEED_FLOOR_MARGIN: u32 = 10;
pub const DEFAULT_SPEED_LIMIT: u32 = 60;
pub const DEFAULT_LOOKUP_CONFIRM_THRESHOLD: usize = 10;

/// Where the limit for each violation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedLimitSource {
    Default,
    Posted,
}

impl SpeedLimitSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Default => "default limit",
            Self::Posted => "posted limits",
        }
    }
}

/// Limit resolution for one scoring run.
#[derive(Debug, Clone, Copy)]
pub enum LimitResolver<'a> {
    Fixed(u32),
    Posted(&'a dyn SpeedLimitLookup),
}

/// Decides whether external lookups may go ahead for a batch of violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupGuard {
    pub confirm_threshold: usize,
}

impl Default for LookupGuard {
    fn default() -> Self {
        Self {
            confirm_threshold: DEFAULT_LOOKUP_CONFIRM_THRESHOLD,
        }
    }
}

impl LookupGuard {
    /// Batches above the threshold need explicit confirmation, otherwise the
    /// whole batch falls back to the default limit.
    pub fn resolve(&self, requested: bool, qualifying: usize, confirmed: bool) -> SpeedLimitSource {
        if !requested {
            return SpeedLimitSource::Default;
        }
        if qualifying > self.confirm_threshold && !confirmed {
            return SpeedLimitSource::Default;
        }
        SpeedLimitSource::Posted
    }
}

#[derive(Debug, Default)]
pub struct SpeedEvaluation {
    pub lines: Vec<SpeedPenaltyLine>,
    pub total: u32,
    pub warnings: Vec<ScoreWarning>,
}

pub fn penalty_for_delta(delta: f64) -> u32 {
    if delta < 10.0 {
        0
    } else if delta <= 15.0 {
        3
    } else if delta <= 25.0 {
        8
    } else {
        15
    }
}

/// Speed violations fast enough to be scored, plus warnings for those
/// missing a speed reading.
pub fn qualifying_violations(
    events: &[TaggedEvent],
    default_speed_limit: u32,
) -> (Vec<&TelemetryEvent>, Vec<ScoreWarning>) {
    let floor = f64::from(default_speed_limit.saturating_add(SPEED_FLOOR_MARGIN));
    let mut qualifying = Vec::new();
    let mut warnings = Vec::new();

    for event in events
        .iter()
        .map(|tagged| &tagged.event)
        .filter(|event| event.kind == EventKind::SpeedViolation)
    {
        match event.speed {
            Some(speed) if speed >= floor => qualifying.push(event),
            Some(_) => {}
            None => warnings.push(ScoreWarning::MalformedEvent {
                line: None,
                timestamp: Some(event.timestamp),
                reason: "speed violation without a speed reading".to_string(),
            }),
        }
    }

    (qualifying, warnings)
}

pub fn evaluate_speed_penalties(
    events: &[TaggedEvent],
    default_speed_limit: u32,
    resolver: LimitResolver<'_>,
) -> SpeedEvaluation {
    let (qualifying, mut warnings) = qualifying_violations(events, default_speed_limit);
    let mut lines = Vec::with_capacity(qualifying.len());
    let mut total: u32 = 0;

    for event in qualifying {
        let Some(speed) = event.speed else {
            continue;
        };

        let speed_limit = match resolver {
            LimitResolver::Fixed(limit) => limit,
            LimitResolver::Posted(lookup) => match resolve_posted(lookup, event) {
                Ok(limit) => limit,
                Err(warning) => {
                    warn!(%warning, "skipping speed violation");
                    warnings.push(warning);
                    continue;
                }
            },
        };

        let delta = speed - f64::from(speed_limit);
        let penalty_points = penalty_for_delta(delta);
        total = total.saturating_add(penalty_points);

        debug!(
            timestamp = %event.timestamp,
            speed,
            speed_limit,
            penalty_points,
            "speed violation scored"
        );

        lines.push(SpeedPenaltyLine {
            timestamp: event.timestamp,
            speed,
            speed_limit,
            delta,
            penalty_points,
        });
    }

    SpeedEvaluation {
        lines,
        total,
        warnings,
    }
}

fn resolve_posted(
    lookup: &dyn SpeedLimitLookup,
    event: &TelemetryEvent,
) -> Result<u32, ScoreWarning> {
    let unavailable = |reason: String| ScoreWarning::LookupUnavailable {
        timestamp: event.timestamp,
        latitude: event.latitude,
        longitude: event.longitude,
        reason,
    };

    let Some((latitude, longitude)) = event.coordinates() else {
        return Err(unavailable("event has no coordinates".to_string()));
    };

    match lookup.lookup(latitude, longitude) {
        Ok(Some(limit)) => Ok(limit),
        Ok(None) => Err(unavailable("no posted limit found".to_string())),
        Err(err) => Err(unavailable(err.to_string())),
    }
}
