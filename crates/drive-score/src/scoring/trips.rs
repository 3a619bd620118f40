use super::domain::{EventKind, TaggedEvent, TelemetryEvent};
use std::collections::BTreeMap;

/// Stable chronological sort; events sharing a timestamp keep their report order.
pub fn sort_chronologically(events: &mut [TelemetryEvent]) {
    events.sort_by_key(|event| event.timestamp);
}

/// Tags every event with the running count of start-ups seen so far,
/// including the event itself when it is a start-up.
pub fn segment_trips(events: Vec<TelemetryEvent>) -> Vec<TaggedEvent> {
    let mut trip_id = 0;
    events
        .into_iter()
        .map(|event| {
            if event.kind == EventKind::StartUp {
                trip_id += 1;
            }
            TaggedEvent { trip_id, event }
        })
        .collect()
}

/// Groups events by trip, leaving out trip 0.
pub(crate) fn events_by_trip(events: &[TaggedEvent]) -> BTreeMap<u32, Vec<&TelemetryEvent>> {
    let mut trips: BTreeMap<u32, Vec<&TelemetryEvent>> = BTreeMap::new();
    for tagged in events.iter().filter(|tagged| tagged.trip_id > 0) {
        trips.entry(tagged.trip_id).or_default().push(&tagged.event);
    }
    trips
}
