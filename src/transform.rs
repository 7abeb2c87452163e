/// Reshapes VitalWeather payloads into canonical observations and events.
///
/// Every function here is pure: identical inputs produce identical records,
/// and field maps are key-ordered so their JSON is byte-for-byte stable.
///
/// Unit decoration renders `"{value} {unit}"` for every field that has an
/// entry in the unit table (the timestamp excepted). This turns numeric
/// fields into strings, which is what the ingestion side expects to display.

use crate::model::{
    DailySummaryRecord, Event, Location, Observation, Reading, ReadingsPayload, Station,
    UnitTable, OBSERVATION_SUBTYPE, OBSERVATION_TYPE, SUMMARY_EVENT_TYPE,
};
use chrono::NaiveTime;
use serde::Serialize;
use serde_json::{Map, Value};

const TIMESTAMP_FIELD: &str = "ts";
const SUMMARY_DATE_FIELD: &str = "Date";

/// Text form of a value or unit label. Arrays such as `[225, "SW"]` join
/// their elements with spaces.
fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

fn to_field_map<T: Serialize>(record: &T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    }
}

/// Overlays the unit table onto a record's fields, skipping the timestamp.
pub fn match_units(mut fields: Map<String, Value>, units: &UnitTable) -> Map<String, Value> {
    for (key, value) in fields.iter_mut() {
        if key == TIMESTAMP_FIELD {
            continue;
        }
        if let Some(unit) = units.get(key) {
            *value = Value::String(format!("{} {}", render(value), render(unit)));
        }
    }
    fields
}

/// One observation per reading, decorated with the payload's units.
pub fn transform_readings<P: ReadingsPayload>(station: &Station, payload: &P) -> Vec<Observation> {
    payload
        .readings()
        .iter()
        .map(|reading| reading_to_observation(station, reading, payload.units()))
        .collect()
}

fn reading_to_observation(station: &Station, reading: &Reading, units: &UnitTable) -> Observation {
    let mut fields = to_field_map(reading);
    fields.remove(TIMESTAMP_FIELD);

    let mut additional = Map::new();
    additional.insert("station_height".to_string(), Value::from(station.height));
    additional.extend(match_units(fields, units));

    Observation {
        source_name: station.name.clone(),
        source: station.id,
        kind: OBSERVATION_TYPE.to_string(),
        subtype: OBSERVATION_SUBTYPE.to_string(),
        recorded_at: reading.ts,
        location: Location::from(station),
        additional,
    }
}

/// One event per daily summary, recorded at UTC midnight of its date.
pub fn transform_daily_summary(
    station: &Station,
    summaries: &[DailySummaryRecord],
    units: &UnitTable,
) -> Vec<Event> {
    summaries
        .iter()
        .map(|summary| {
            let mut fields = to_field_map(summary);
            fields.remove(SUMMARY_DATE_FIELD);

            Event {
                title: format!("{} daily summary", station.name),
                event_type: SUMMARY_EVENT_TYPE.to_string(),
                recorded_at: summary.date.and_time(NaiveTime::MIN).and_utc(),
                location: Location::from(station),
                event_details: match_units(fields, units),
            }
        })
        .collect()
}

/// Latest reading time in epoch seconds; `None` for an empty batch.
pub fn latest_timestamp(readings: &[Reading]) -> Option<i64> {
    readings.iter().map(|r| r.ts.timestamp()).max()
}
