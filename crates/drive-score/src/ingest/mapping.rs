use super::normalizer::normalize_key;
use std::collections::HashMap;
use std::sync::OnceLock;

pub(crate) const DATE: &str = "Date";
pub(crate) const EVENT: &str = "Event";
pub(crate) const LOCATION: &str = "Location";
pub(crate) const SPEED: &str = "Speed";
pub(crate) const ODOMETER: &str = "Odometer";

pub(crate) const REQUIRED_COLUMNS: &[&str] = &[DATE, EVENT];

static COLUMN_ALIASES: OnceLock<HashMap<String, &'static str>> = OnceLock::new();

/// Canonical column name for a report header, if it is one we read.
pub(crate) fn canonical_column(header: &str) -> Option<&'static str> {
    column_aliases().get(&normalize_key(header)).copied()
}

fn column_aliases() -> &'static HashMap<String, &'static str> {
    COLUMN_ALIASES.get_or_init(|| {
        const HEADER_TO_COLUMN: &[(&str, &str)] = &[
            ("Date", DATE),
            ("Date/Time", DATE),
            ("DateTime", DATE),
            ("GPS Time", DATE),
            ("Event", EVENT),
            ("Event Type", EVENT),
            ("Status", EVENT),
            ("Location", LOCATION),
            ("Position", LOCATION),
            ("Speed", SPEED),
            ("Speed (km/h)", SPEED),
            ("Speed km/h", SPEED),
            ("Odometer", ODOMETER),
            ("Odometer (km)", ODOMETER),
        ];

        HEADER_TO_COLUMN
            .iter()
            .map(|(header, column)| (normalize_key(header), *column))
            .collect()
    })
}
