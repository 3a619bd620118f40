use super::mapping::{self, canonical_column};
use super::normalizer::{normalize_key, parse_decimal, parse_location, parse_timestamp};
use super::ImportError;
use crate::scoring::{EventKind, ScoreWarning, TelemetryEvent};
use csv::StringRecord;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::io::Read;

#[derive(Debug, Default)]
pub(crate) struct ParsedReport {
    /// Keys are normalized, values as written.
    pub(crate) metadata: BTreeMap<String, String>,
    pub(crate) events: Vec<TelemetryEvent>,
    pub(crate) warnings: Vec<ScoreWarning>,
}

pub(crate) fn parse_report<R: Read>(mut reader: R) -> Result<ParsedReport, ImportError> {
    let mut raw = String::new();
    reader.read_to_string(&mut raw)?;

    let mut metadata = BTreeMap::new();
    let mut body_start = 0;
    let mut preamble_lines = 0;
    for line in raw.split_inclusive('\n') {
        let trimmed = line.trim().trim_start_matches('\u{feff}');
        if let Some(entry) = trimmed.strip_prefix('#') {
            if let Some((key, value)) = entry.split_once(':') {
                metadata.insert(normalize_key(key), value.trim().to_string());
            }
        } else if !trimmed.is_empty() {
            break;
        }
        body_start += line.len();
        preamble_lines += 1;
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(raw[body_start..].as_bytes());
    let headers = canonical_headers(csv_reader.headers()?)?;

    let mut events = Vec::new();
    let mut warnings = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let line = preamble_lines + record.position().map_or(0, |pos| pos.line() as usize);
        let row: MovementRow = record.deserialize(Some(&headers))?;
        match row.into_event() {
            Ok(event) => events.push(event),
            Err(reason) => warnings.push(ScoreWarning::MalformedEvent {
                line: Some(line),
                timestamp: None,
                reason,
            }),
        }
    }

    Ok(ParsedReport {
        metadata,
        events,
        warnings,
    })
}

/// Renames known headers to their canonical column; the first match wins and
/// any later header that would repeat a name gets a numbered suffix.
fn canonical_headers(raw: &StringRecord) -> Result<StringRecord, ImportError> {
    let mut seen: Vec<&'static str> = Vec::new();
    let mut names: HashSet<String> = HashSet::new();
    let mut headers = StringRecord::new();

    for header in raw.iter() {
        let name = match canonical_column(header) {
            Some(column) if !seen.contains(&column) => {
                seen.push(column);
                column.to_string()
            }
            _ => unique_name(header, &names),
        };
        names.insert(name.clone());
        headers.push_field(&name);
    }

    if let Some(missing) = mapping::REQUIRED_COLUMNS
        .iter()
        .copied()
        .find(|column| !seen.contains(column))
    {
        return Err(ImportError::MissingColumn(missing));
    }

    Ok(headers)
}

fn unique_name(header: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(header) {
        return header.to_string();
    }
    (2..)
        .map(|n| format!("{header} ({n})"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| header.to_string())
}

#[derive(Debug, Deserialize)]
struct MovementRow {
    #[serde(rename = "Date", default, deserialize_with = "empty_string_as_none")]
    date: Option<String>,
    #[serde(rename = "Event", default, deserialize_with = "empty_string_as_none")]
    event: Option<String>,
    #[serde(rename = "Location", default, deserialize_with = "empty_string_as_none")]
    location: Option<String>,
    #[serde(rename = "Speed", default, deserialize_with = "empty_string_as_none")]
    speed: Option<String>,
    #[serde(rename = "Odometer", default, deserialize_with = "empty_string_as_none")]
    odometer: Option<String>,
}

impl MovementRow {
    fn into_event(self) -> Result<TelemetryEvent, String> {
        let raw_date = self.date.ok_or_else(|| "missing date".to_string())?;
        let timestamp = parse_timestamp(&raw_date)
            .ok_or_else(|| format!("unparseable date '{raw_date}'"))?;
        let label = self.event.ok_or_else(|| "missing event".to_string())?;

        let mut event = TelemetryEvent::new(timestamp, EventKind::from_label(&label));
        event.speed = self.speed.as_deref().and_then(parse_decimal);
        event.odometer = self.odometer.as_deref().and_then(parse_decimal);
        if let Some((latitude, longitude)) = self.location.as_deref().and_then(parse_location) {
            event = event.with_location(latitude, longitude);
        }

        Ok(event)
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
