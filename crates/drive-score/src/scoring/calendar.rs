use super::domain::{EventKind, ScoringError, TaggedEvent};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How the end of the reporting window is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    FullMonth,
    #[default]
    MonthToDate,
}

impl WindowMode {
    pub const fn from_full_month(full_month: bool) -> Self {
        if full_month {
            Self::FullMonth
        } else {
            Self::MonthToDate
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FullMonth => "Full month",
            Self::MonthToDate => "Month-to-date",
        }
    }
}

/// Inclusive calendar range covered by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarWindow {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

impl CalendarWindow {
    /// Anchors the window on the month of the earliest event. Needs at least
    /// one event and one start-up.
    pub fn resolve(events: &[TaggedEvent], mode: WindowMode) -> Result<Self, ScoringError> {
        let earliest = events
            .iter()
            .map(|tagged| tagged.event.timestamp.date())
            .min()
            .ok_or(ScoringError::InsufficientData("report contains no events"))?;

        if !events
            .iter()
            .any(|tagged| tagged.event.kind == EventKind::StartUp)
        {
            return Err(ScoringError::InsufficientData(
                "report contains no start-up events to anchor the reporting window",
            ));
        }

        let first_date = first_of_month(earliest);
        let last_date = match mode {
            WindowMode::FullMonth => last_of_month(first_date),
            WindowMode::MonthToDate => events
                .iter()
                .map(|tagged| tagged.event.timestamp.date())
                .max()
                .unwrap_or(earliest),
        };

        Ok(Self {
            first_date,
            last_date,
        })
    }

    pub fn day_count(&self) -> u32 {
        let days = (self.last_date - self.first_date).num_days() + 1;
        u32::try_from(days.max(0)).unwrap_or(u32::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_date <= date && date <= self.last_date
    }

    /// Distinct in-window dates with at least one start-up.
    pub fn driving_dates(&self, events: &[TaggedEvent]) -> BTreeSet<NaiveDate> {
        events
            .iter()
            .filter(|tagged| tagged.event.kind == EventKind::StartUp)
            .map(|tagged| tagged.event.timestamp.date())
            .filter(|date| self.contains(*date))
            .collect()
    }

    pub fn no_drive_days(&self, events: &[TaggedEvent]) -> u32 {
        let driving = u32::try_from(self.driving_dates(events).len()).unwrap_or(u32::MAX);
        self.day_count().saturating_sub(driving)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

fn last_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::TelemetryEvent;
    use crate::scoring::trips::segment_trips;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn event(day: u32, hour: u32, kind: EventKind) -> TelemetryEvent {
        let timestamp = date(2025, 4, day)
            .and_hms_opt(hour, 0, 0)
            .expect("valid timestamp");
        TelemetryEvent::new(timestamp, kind)
    }

    fn april_sample() -> Vec<TaggedEvent> {
        segment_trips(vec![
            event(4, 7, EventKind::StartUp),
            event(4, 8, EventKind::IgnitionOff),
            event(4, 17, EventKind::StartUp),
            event(4, 18, EventKind::IgnitionOff),
            event(9, 7, EventKind::StartUp),
            event(9, 8, EventKind::IgnitionOff),
            event(17, 12, EventKind::HealthCheck),
        ])
    }

    #[test]
    fn month_to_date_ends_on_latest_event() {
        let window = CalendarWindow::resolve(&april_sample(), WindowMode::MonthToDate)
            .expect("window resolves");
        assert_eq!(window.first_date, date(2025, 4, 1));
        assert_eq!(window.last_date, date(2025, 4, 17));
        assert_eq!(window.day_count(), 17);
        assert_eq!(window.no_drive_days(&april_sample()), 15);
    }

    #[test]
    fn full_month_ends_on_last_day_of_month() {
        let window = CalendarWindow::resolve(&april_sample(), WindowMode::FullMonth)
            .expect("window resolves");
        assert_eq!(window.last_date, date(2025, 4, 30));
        assert_eq!(window.no_drive_days(&april_sample()), 28);
    }

    #[test]
    fn full_month_handles_december_and_leap_february() {
        assert_eq!(last_of_month(date(2025, 12, 1)), date(2025, 12, 31));
        assert_eq!(last_of_month(date(2024, 2, 1)), date(2024, 2, 29));
        assert_eq!(last_of_month(date(2025, 2, 1)), date(2025, 2, 28));
    }

    #[test]
    fn empty_report_is_insufficient() {
        let error = CalendarWindow::resolve(&[], WindowMode::MonthToDate)
            .expect_err("expected insufficient data");
        assert!(matches!(error, ScoringError::InsufficientData(_)));
    }

    #[test]
    fn report_without_start_up_is_insufficient() {
        let events = segment_trips(vec![
            event(3, 9, EventKind::HealthCheck),
            event(3, 10, EventKind::IgnitionOff),
        ]);
        let error = CalendarWindow::resolve(&events, WindowMode::FullMonth)
            .expect_err("expected insufficient data");
        assert!(matches!(error, ScoringError::InsufficientData(_)));
    }

    #[test]
    fn no_drive_days_stay_within_window_bounds() {
        let mut events = april_sample();
        events.extend(segment_trips(vec![event(30, 9, EventKind::StartUp)]));
        let mut spill = segment_trips(vec![TelemetryEvent::new(
            date(2025, 5, 2).and_hms_opt(9, 0, 0).expect("valid"),
            EventKind::StartUp,
        )]);
        events.append(&mut spill);

        let window =
            CalendarWindow::resolve(&events, WindowMode::FullMonth).expect("window resolves");
        let no_drive = window.no_drive_days(&events);
        assert!(no_drive <= window.day_count());
        assert_eq!(no_drive, 27);
    }
}
