use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

pub(crate) const MILES_TO_KM: f64 = 1.60934;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

pub(crate) fn normalize_key(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_ascii_lowercase()
}

pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_local())
}

/// Accepts `12.5` and `12,5`. When both separators appear, the last one is
/// the decimal point and the other groups thousands (`1.234,5`, `1,234.5`).
pub(crate) fn parse_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (decimal, grouping) = match (trimmed.rfind('.'), trimmed.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => (',', Some('.')),
        (Some(_), Some(_)) => ('.', Some(',')),
        (None, Some(_)) => (',', None),
        _ => ('.', None),
    };

    let ungrouped = match grouping {
        Some(separator) => trimmed.replace(separator, ""),
        None => trimmed.to_string(),
    };
    if ungrouped.matches(decimal).count() > 1 {
        return None;
    }

    ungrouped
        .replace(decimal, ".")
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

const LONGITUDE_PATTERN: &str = r"(?i)\blong(?:itude)?\s*:\s*(-?\d(?:[\d.,]*\d)?)";
const LATITUDE_PATTERN: &str = r"(?i)\blat(?:itude)?\s*:\s*(-?\d(?:[\d.,]*\d)?)";

static LONGITUDE: OnceLock<Option<Regex>> = OnceLock::new();
static LATITUDE: OnceLock<Option<Regex>> = OnceLock::new();

/// Parses `Long : 28,0473, Lat : -26,2041` into `(latitude, longitude)`.
/// Surrounding street or place text is ignored.
pub(crate) fn parse_location(value: &str) -> Option<(f64, f64)> {
    let longitude = coordinate(&LONGITUDE, LONGITUDE_PATTERN, value)?;
    let latitude = coordinate(&LATITUDE, LATITUDE_PATTERN, value)?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some((latitude, longitude))
}

fn coordinate(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &'static str,
    value: &str,
) -> Option<f64> {
    let regex = cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()?;
    let number = regex.captures(value)?.get(1)?;
    parse_decimal(number.as_str())
}

/// `1234.5 mi` becomes kilometres; bare numbers and `km` are taken as kilometres.
pub(crate) fn parse_distance_km(value: &str) -> Option<f64> {
    let lowered = normalize_key(value);
    let (number, miles) = if let Some(number) = lowered
        .strip_suffix("miles")
        .or_else(|| lowered.strip_suffix("mi"))
    {
        (number, true)
    } else if let Some(number) = lowered.strip_suffix("km") {
        (number, false)
    } else {
        (lowered.as_str(), false)
    };

    let distance = parse_decimal(number)?;
    Some(if miles {
        distance * MILES_TO_KM
    } else {
        distance
    })
}

