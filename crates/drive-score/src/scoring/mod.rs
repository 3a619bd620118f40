//! Driving behaviour scoring over one vehicle's event stream.

pub mod calendar;
pub mod domain;
mod engine;
pub mod night;
pub mod speed;
pub mod trips;
pub mod violations;

pub use calendar::{CalendarWindow, WindowMode};
pub use domain::{
    EventKind, NightPenaltyLine, ScoreReport, ScoreWarning, ScoringError, SpeedPenaltyLine,
    TaggedEvent, TelemetryEvent, ViolationReport,
};
pub use engine::{EventSource, ScoreOutcome, ScoringEngine, ScoringPolicy};
pub use speed::{LookupGuard, SpeedLimitSource};
pub use violations::SuppressionMode;
