use super::domain::{EventKind, NightPenaltyLine, TaggedEvent};
use super::trips::events_by_trip;
use chrono::{Duration, NaiveDateTime, Timelike};

/// Points charged for each driving minute that falls in `hour`.
pub const fn night_rate_for_hour(hour: u32) -> u32 {
    match hour {
        23 | 4 => 2,
        0 | 3 => 4,
        1 | 2 => 6,
        _ => 0,
    }
}

/// Start of the minute following `timestamp`.
pub fn ceil_to_minute(timestamp: NaiveDateTime) -> NaiveDateTime {
    let truncated = timestamp
        .with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(timestamp);
    truncated + Duration::minutes(1)
}

/// Samples every whole minute after `start` up to and including `end`.
pub fn trip_night_penalty(start: NaiveDateTime, end: NaiveDateTime) -> u32 {
    let mut penalty: u32 = 0;
    let mut sample = ceil_to_minute(start);
    while sample <= end {
        penalty = penalty.saturating_add(night_rate_for_hour(sample.hour()));
        sample += Duration::minutes(1);
    }
    penalty
}

/// One line per trip with night exposure. Trips need at least two events, a
/// start-up and an ignition-off to be scored.
pub fn accumulate_night_penalties(events: &[TaggedEvent]) -> Vec<NightPenaltyLine> {
    events_by_trip(events)
        .into_iter()
        .filter(|(_, trip)| trip.len() >= 2)
        .filter_map(|(trip_id, trip)| {
            let start_time = trip
                .iter()
                .filter(|event| event.kind == EventKind::StartUp)
                .map(|event| event.timestamp)
                .min()?;
            let end_time = trip
                .iter()
                .filter(|event| event.kind == EventKind::IgnitionOff)
                .map(|event| event.timestamp)
                .max()?;

            let penalty_points = trip_night_penalty(start_time, end_time);
            (penalty_points > 0).then_some(NightPenaltyLine {
                trip_id,
                start_time,
                end_time,
                penalty_points,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::TelemetryEvent;
    use crate::scoring::trips::segment_trips;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .expect("valid timestamp")
    }

    #[test]
    fn hour_rates_cover_the_night_window() {
        let rates: Vec<u32> = (0..24).map(night_rate_for_hour).collect();
        assert_eq!(
            rates,
            vec![4, 6, 6, 4, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]
        );
    }

    #[test]
    fn ceil_moves_to_start_of_next_minute() {
        assert_eq!(ceil_to_minute(at(3, 23, 0, 30)), at(3, 23, 1, 0));
        assert_eq!(ceil_to_minute(at(3, 23, 0, 0)), at(3, 23, 1, 0));
        assert_eq!(ceil_to_minute(at(3, 23, 59, 59)), at(4, 0, 0, 0));
    }

    #[test]
    fn trip_across_midnight_is_sampled_per_minute() {
        let start = at(3, 23, 0, 30);
        let end = at(4, 0, 2, 0);

        // 23:01..=23:59 at 2 points, then 00:00, 00:01 and 00:02 at 4 points.
        let mut expected = 0;
        let mut sample = at(3, 23, 1, 0);
        let mut samples = 0;
        while sample <= end {
            expected += if sample.hour() == 23 { 2 } else { 4 };
            samples += 1;
            sample += Duration::minutes(1);
        }
        assert_eq!(samples, 62);
        assert_eq!(expected, 2 * 59 + 4 * 3);
        assert_eq!(trip_night_penalty(start, end), expected);
    }

    #[test]
    fn early_morning_window_ends_after_four() {
        // 04:01..=04:59 at 2 points each, 05:00 onwards free.
        assert_eq!(trip_night_penalty(at(5, 4, 0, 0), at(5, 5, 30, 0)), 59 * 2);
        assert_eq!(trip_night_penalty(at(5, 9, 0, 0), at(5, 17, 0, 0)), 0);
    }

    #[test]
    fn end_before_first_sample_yields_nothing() {
        assert_eq!(trip_night_penalty(at(5, 1, 0, 10), at(5, 1, 0, 50)), 0);
    }

    #[test]
    fn trips_without_bounds_or_outside_the_night_are_skipped() {
        let events = segment_trips(vec![
            TelemetryEvent::new(at(2, 22, 0, 0), EventKind::IgnitionOff),
            TelemetryEvent::new(at(2, 23, 30, 0), EventKind::HealthCheck),
            TelemetryEvent::new(at(3, 1, 0, 0), EventKind::StartUp),
            TelemetryEvent::new(at(3, 1, 10, 0), EventKind::IgnitionOff),
            TelemetryEvent::new(at(3, 2, 0, 0), EventKind::StartUp),
            TelemetryEvent::new(at(3, 2, 20, 0), EventKind::HarshBraking),
            TelemetryEvent::new(at(3, 8, 0, 0), EventKind::StartUp),
            TelemetryEvent::new(at(3, 9, 0, 0), EventKind::IgnitionOff),
            TelemetryEvent::new(at(3, 23, 50, 0), EventKind::StartUp),
        ]);

        let lines = accumulate_night_penalties(&events);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].trip_id, 1);
        assert_eq!(lines[0].penalty_points, 10 * 6);
        assert_eq!(lines[0].duration(), Duration::minutes(10));
    }
}
