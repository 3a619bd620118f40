use super::domain::{EventKind, TaggedEvent, ViolationReport};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Alerts within this many seconds of their predecessor are treated as false alarms.
pub const FALSE_ALARM_WINDOW_SECS: i64 = 120;
pub const POINTS_PER_HARSH_EVENT: u32 = 8;

/// Strategy for discarding repeated alerts of the same category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionMode {
    /// Drop an alert when its gap to the immediately preceding alert is within
    /// the window, even if that predecessor was itself dropped.
    #[default]
    PredecessorDelta,
    /// Drop an alert when its gap to the last kept alert is within the window.
    MinimumGap,
}

pub fn detect_violations(
    events: &[TaggedEvent],
    category: EventKind,
    mode: SuppressionMode,
) -> ViolationReport {
    let mut timestamps: Vec<NaiveDateTime> = events
        .iter()
        .filter(|tagged| tagged.event.kind == category)
        .map(|tagged| tagged.event.timestamp)
        .collect();
    timestamps.sort();

    let occurrences = surviving_alerts(&timestamps, mode).len();
    ViolationReport {
        category,
        occurrences,
        points: u32::try_from(occurrences)
            .unwrap_or(u32::MAX)
            .saturating_mul(POINTS_PER_HARSH_EVENT),
    }
}

/// Filters sorted alert timestamps down to the ones counted as real events.
pub fn surviving_alerts(sorted: &[NaiveDateTime], mode: SuppressionMode) -> Vec<NaiveDateTime> {
    let mut kept = Vec::with_capacity(sorted.len());

    match mode {
        SuppressionMode::PredecessorDelta => {
            let mut previous: Option<NaiveDateTime> = None;
            for &timestamp in sorted {
                let false_alarm = previous.is_some_and(|prior| within_window(prior, timestamp));
                if !false_alarm {
                    kept.push(timestamp);
                }
                previous = Some(timestamp);
            }
        }
        SuppressionMode::MinimumGap => {
            for &timestamp in sorted {
                let false_alarm = kept
                    .last()
                    .is_some_and(|prior: &NaiveDateTime| within_window(*prior, timestamp));
                if !false_alarm {
                    kept.push(timestamp);
                }
            }
        }
    }

    kept
}

fn within_window(prior: NaiveDateTime, current: NaiveDateTime) -> bool {
    (current - prior).num_seconds().abs() <= FALSE_ALARM_WINDOW_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::TelemetryEvent;
    use crate::scoring::trips::segment_trips;
    use chrono::{Duration, NaiveDate};

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 12)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid timestamp")
    }

    fn alerts(offsets_secs: &[i64], kind: EventKind) -> Vec<TaggedEvent> {
        let mut events = vec![TelemetryEvent::new(base(), EventKind::StartUp)];
        events.extend(
            offsets_secs
                .iter()
                .map(|offset| TelemetryEvent::new(base() + Duration::seconds(*offset), kind)),
        );
        segment_trips(events)
    }

    #[test]
    fn alert_ninety_seconds_after_previous_is_a_false_alarm() {
        let mut events = alerts(&[300, 390], EventKind::HarshBraking);
        events.extend(segment_trips(vec![TelemetryEvent::new(
            base() + Duration::minutes(30),
            EventKind::IgnitionOff,
        )]));

        let report = detect_violations(
            &events,
            EventKind::HarshBraking,
            SuppressionMode::PredecessorDelta,
        );
        assert_eq!(report.occurrences, 1);
        assert_eq!(report.points, 8);
    }

    #[test]
    fn predecessor_delta_does_not_cascade() {
        let events = alerts(&[0, 130, 220], EventKind::HarshCornering);
        let report = detect_violations(
            &events,
            EventKind::HarshCornering,
            SuppressionMode::PredecessorDelta,
        );
        assert_eq!(report.occurrences, 2);

        // 190s is 90s after a dropped alert but 190s after the kept one: still dropped.
        let events = alerts(&[0, 100, 190], EventKind::HarshCornering);
        let report = detect_violations(
            &events,
            EventKind::HarshCornering,
            SuppressionMode::PredecessorDelta,
        );
        assert_eq!(report.occurrences, 1);
    }

    #[test]
    fn minimum_gap_measures_from_last_kept_alert() {
        let events = alerts(&[0, 100, 190], EventKind::HarshAcceleration);
        let report = detect_violations(
            &events,
            EventKind::HarshAcceleration,
            SuppressionMode::MinimumGap,
        );
        assert_eq!(report.occurrences, 2);
        assert_eq!(report.points, 16);
    }

    #[test]
    fn boundary_of_exactly_one_hundred_twenty_seconds_is_suppressed() {
        let events = alerts(&[0, 120, 241], EventKind::HarshBraking);
        let report = detect_violations(
            &events,
            EventKind::HarshBraking,
            SuppressionMode::PredecessorDelta,
        );
        assert_eq!(report.occurrences, 2);
    }

    #[test]
    fn only_the_requested_category_is_counted() {
        let mut events = alerts(&[0, 600], EventKind::HarshBraking);
        events.extend(alerts(&[1200], EventKind::HarshCornering));
        let report = detect_violations(
            &events,
            EventKind::HarshCornering,
            SuppressionMode::PredecessorDelta,
        );
        assert_eq!(report.occurrences, 1);
    }

    #[test]
    fn unsorted_input_is_sorted_before_deltas() {
        let events = alerts(&[900, 0, 60, 1000], EventKind::HarshBraking);
        let report = detect_violations(
            &events,
            EventKind::HarshBraking,
            SuppressionMode::PredecessorDelta,
        );
        assert_eq!(report.occurrences, 2);
    }

    #[test]
    fn detection_is_idempotent_on_its_own_output() {
        let offsets = [0, 45, 130, 200, 330, 340, 700, 800, 1000];
        let mut timestamps: Vec<NaiveDateTime> = offsets
            .iter()
            .map(|offset| base() + Duration::seconds(*offset))
            .collect();
        timestamps.sort();

        for mode in [SuppressionMode::PredecessorDelta, SuppressionMode::MinimumGap] {
            let once = surviving_alerts(&timestamps, mode);
            let twice = surviving_alerts(&once, mode);
            assert_eq!(once, twice);
        }
    }
}
