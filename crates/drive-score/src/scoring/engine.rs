use super::calendar::{CalendarWindow, WindowMode};
use super::domain::{
    EventKind, NightPenaltyLine, ScoreReport, ScoreWarning, ScoringError, SpeedPenaltyLine,
    TaggedEvent, TelemetryEvent, ViolationReport,
};
use super::night::accumulate_night_penalties;
use super::speed::{
    evaluate_speed_penalties, qualifying_violations, LimitResolver, LookupGuard,
    SpeedLimitSource, DEFAULT_SPEED_LIMIT,
};
use super::trips::{segment_trips, sort_chronologically};
use super::violations::{detect_violations, SuppressionMode};
use crate::speed_limits::SpeedLimitLookup;
use serde::Serialize;
use tracing::{info, warn};

/// Supplies the normalized events and distance for one vehicle's report.
pub trait EventSource {
    fn load_events(&self) -> Vec<TelemetryEvent>;
    fn extract_distance(&self) -> f64;

    /// Problems found while reading the source.
    fn ingestion_warnings(&self) -> Vec<ScoreWarning> {
        Vec::new()
    }
}

/// Scoring options decided before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub window_mode: WindowMode,
    pub use_external_lookup: bool,
    pub lookups_confirmed: bool,
    pub default_speed_limit: u32,
    pub lookup_guard: LookupGuard,
    pub suppression: SuppressionMode,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            window_mode: WindowMode::MonthToDate,
            use_external_lookup: false,
            lookups_confirmed: false,
            default_speed_limit: DEFAULT_SPEED_LIMIT,
            lookup_guard: LookupGuard::default(),
            suppression: SuppressionMode::PredecessorDelta,
        }
    }
}

/// Everything produced by one run. Only `report` is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreOutcome {
    pub report: ScoreReport,
    pub window: CalendarWindow,
    pub window_mode: WindowMode,
    pub violations: Vec<ViolationReport>,
    pub speed_limit_source: SpeedLimitSource,
    pub speed_lines: Vec<SpeedPenaltyLine>,
    pub speed_penalty_total: u32,
    pub night_lines: Vec<NightPenaltyLine>,
    pub warnings: Vec<ScoreWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    policy: ScoringPolicy,
}

impl ScoringEngine {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn score_source<S: EventSource + ?Sized>(
        &self,
        source: &S,
        lookup: Option<&dyn SpeedLimitLookup>,
    ) -> Result<ScoreOutcome, ScoringError> {
        let mut outcome = self.score(source.load_events(), source.extract_distance(), lookup)?;
        let mut warnings = source.ingestion_warnings();
        warnings.append(&mut outcome.warnings);
        outcome.warnings = warnings;
        Ok(outcome)
    }

    pub fn score(
        &self,
        mut events: Vec<TelemetryEvent>,
        distance_km: f64,
        lookup: Option<&dyn SpeedLimitLookup>,
    ) -> Result<ScoreOutcome, ScoringError> {
        sort_chronologically(&mut events);
        let events = segment_trips(events);

        let window = CalendarWindow::resolve(&events, self.policy.window_mode)?;
        let no_drive_days = window.no_drive_days(&events);
        info!(
            first_date = %window.first_date,
            last_date = %window.last_date,
            no_drive_days,
            "reporting window resolved"
        );

        let violations: Vec<ViolationReport> = EventKind::harsh_maneuvers()
            .into_iter()
            .map(|category| detect_violations(&events, category, self.policy.suppression))
            .collect();
        for violation in &violations {
            info!(
                category = %violation.category,
                occurrences = violation.occurrences,
                points = violation.points,
                "harsh maneuvers counted"
            );
        }

        let mut warnings = Vec::new();
        let (speed_limit_source, resolver) = self.resolve_limits(&events, lookup, &mut warnings);
        let speed = evaluate_speed_penalties(&events, self.policy.default_speed_limit, resolver);
        warnings.extend(speed.warnings);
        info!(
            source = speed_limit_source.label(),
            violations = speed.lines.len(),
            points = speed.total,
            "speed violations scored"
        );

        let night_lines = accumulate_night_penalties(&events);
        let night_penalty_total = night_lines
            .iter()
            .fold(0u32, |total, line| total.saturating_add(line.penalty_points));
        info!(
            trips = night_lines.len(),
            points = night_penalty_total,
            "night driving scored"
        );

        let driving_penalty_total = violations
            .iter()
            .fold(speed.total, |total, violation| {
                total.saturating_add(violation.points)
            });

        Ok(ScoreOutcome {
            report: ScoreReport {
                no_drive_days,
                driving_penalty_total,
                night_penalty_total,
                distance_km,
            },
            window,
            window_mode: self.policy.window_mode,
            violations,
            speed_limit_source,
            speed_lines: speed.lines,
            speed_penalty_total: speed.total,
            night_lines,
            warnings,
        })
    }

    /// Applies the lookup guard before any lookup is issued.
    fn resolve_limits<'a>(
        &self,
        events: &[TaggedEvent],
        lookup: Option<&'a dyn SpeedLimitLookup>,
        warnings: &mut Vec<ScoreWarning>,
    ) -> (SpeedLimitSource, LimitResolver<'a>) {
        let fixed = (
            SpeedLimitSource::Default,
            LimitResolver::Fixed(self.policy.default_speed_limit),
        );

        if !self.policy.use_external_lookup {
            return fixed;
        }

        let (qualifying, _) = qualifying_violations(events, self.policy.default_speed_limit);
        let source = self.policy.lookup_guard.resolve(
            true,
            qualifying.len(),
            self.policy.lookups_confirmed,
        );

        match (source, lookup) {
            (SpeedLimitSource::Posted, Some(lookup)) => {
                (SpeedLimitSource::Posted, LimitResolver::Posted(lookup))
            }
            (SpeedLimitSource::Posted, None) => {
                let reason = "no speed limit service configured".to_string();
                warn!(%reason, "using default speed limit");
                warnings.push(ScoreWarning::LookupDisabled { reason });
                fixed
            }
            (SpeedLimitSource::Default, _) => {
                let reason = format!(
                    "{} qualifying violations exceed the confirmation threshold of {}",
                    qualifying.len(),
                    self.policy.lookup_guard.confirm_threshold
                );
                warn!(%reason, "using default speed limit");
                warnings.push(ScoreWarning::LookupDisabled { reason });
                fixed
            }
        }
    }
}
