use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::{parse_int, parse_timestamp, parse_tri_bool};

/// One normalized station observation as it travels between pipeline stages:
/// the row shape of the cleaned CSV, the JSONL output, and the message bodies
/// published to the topic.
///
/// `due_date` stays textual here; the ingestion side owns timestamp parsing.
/// `code_insee` and `geo` are allowed to be absent at this stage, the mapper
/// rejects messages that never acquired them.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StationStatusMessage {
    pub station_code: String,
    pub station_name: Option<String>,
    pub commune: Option<String>,
    pub capacity: Option<i32>,
    pub docks_available: Option<i32>,
    pub bikes_available: Option<i32>,
    pub bikes_mechanical: Option<i32>,
    pub bikes_ebike: Option<i32>,
    pub is_installed: Option<bool>,
    pub is_returning: Option<bool>,
    pub due_date: String,
    pub code_insee: Option<String>,
    pub geo: Option<String>,
}

/// A fully validated observation, ready to persist.
///
/// Uniquely identified by `(station_code, due_date)`; re-applying the same
/// record is a no-op state transition, which is what makes broker redelivery
/// safe. Counters and flags that could not be read stay `None` so a missing
/// reading is never confused with a confirmed zero or `false`.
#[derive(Clone, Debug, PartialEq)]
pub struct StationStatusRecord {
    pub station_code: String,
    pub station_name: Option<String>,
    pub commune: Option<String>,
    pub capacity: Option<i32>,
    pub docks_available: Option<i32>,
    pub bikes_available: Option<i32>,
    pub bikes_mechanical: Option<i32>,
    pub bikes_ebike: Option<i32>,
    pub is_installed: Option<bool>,
    pub is_returning: Option<bool>,
    pub due_date: NaiveDateTime,
    pub code_insee: String,
    pub geo: String,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unparseable due_date: {0:?}")]
    InvalidTimestamp(String),
}

// Accepted message keys per canonical field, current spelling first, then the
// spellings older exports used. Extend the lists here, not the mapping code.
const STATION_CODE_KEYS: &[&str] = &["station_code", "stationcode", "stationCode"];
const STATION_NAME_KEYS: &[&str] = &["station_name", "name"];
const COMMUNE_KEYS: &[&str] = &["commune", "nom_arrondissement_communes"];
const CAPACITY_KEYS: &[&str] = &["capacity"];
const DOCKS_AVAILABLE_KEYS: &[&str] = &["docks_available", "numdocksavailable"];
const BIKES_AVAILABLE_KEYS: &[&str] = &["bikes_available", "numbikesavailable"];
const BIKES_MECHANICAL_KEYS: &[&str] = &["bikes_mechanical", "mechanical"];
const BIKES_EBIKE_KEYS: &[&str] = &["bikes_ebike", "ebike"];
const IS_INSTALLED_KEYS: &[&str] = &["is_installed"];
const IS_RETURNING_KEYS: &[&str] = &["is_returning"];
const DUE_DATE_KEYS: &[&str] = &["due_date", "duedate", "last_reported"];
const CODE_INSEE_KEYS: &[&str] = &["code_insee", "codeinsee", "code-insee"];
const GEO_KEYS: &[&str] = &["geo"];

/// Render a JSON scalar to the token text the codec understands. Objects and
/// arrays are not scalars and resolve to nothing.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// First key in `keys` present in the payload with a non-null scalar whose
/// trimmed text is non-empty.
fn resolve(payload: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(scalar_text)
        .find(|text| !text.is_empty())
}

impl StationStatusRecord {
    /// Map one inbound message payload to a validated record.
    ///
    /// `station_code`, `due_date`, `code_insee` and `geo` must resolve to
    /// non-empty values; the error names the first field that does not, so a
    /// malformed message can be told apart from a store failure by the
    /// caller. Every other field degrades to `None` on bad input.
    pub fn from_message(payload: &Map<String, Value>) -> Result<Self, MapError> {
        let station_code =
            resolve(payload, STATION_CODE_KEYS).ok_or(MapError::MissingField("station_code"))?;
        let raw_due_date =
            resolve(payload, DUE_DATE_KEYS).ok_or(MapError::MissingField("due_date"))?;
        let due_date =
            parse_timestamp(&raw_due_date).ok_or(MapError::InvalidTimestamp(raw_due_date))?;
        let code_insee =
            resolve(payload, CODE_INSEE_KEYS).ok_or(MapError::MissingField("code_insee"))?;
        let geo = resolve(payload, GEO_KEYS).ok_or(MapError::MissingField("geo"))?;

        Ok(Self {
            station_code,
            station_name: resolve(payload, STATION_NAME_KEYS),
            commune: resolve(payload, COMMUNE_KEYS),
            capacity: resolve(payload, CAPACITY_KEYS).as_deref().and_then(parse_int),
            docks_available: resolve(payload, DOCKS_AVAILABLE_KEYS)
                .as_deref()
                .and_then(parse_int),
            bikes_available: resolve(payload, BIKES_AVAILABLE_KEYS)
                .as_deref()
                .and_then(parse_int),
            bikes_mechanical: resolve(payload, BIKES_MECHANICAL_KEYS)
                .as_deref()
                .and_then(parse_int),
            bikes_ebike: resolve(payload, BIKES_EBIKE_KEYS).as_deref().and_then(parse_int),
            is_installed: resolve(payload, IS_INSTALLED_KEYS)
                .as_deref()
                .and_then(parse_tri_bool),
            is_returning: resolve(payload, IS_RETURNING_KEYS)
                .as_deref()
                .and_then(parse_tri_bool),
            due_date,
            code_insee,
            geo,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn payload(value: serde_json::Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture must be an object, got {other:?}"),
        }
    }

    #[test]
    fn maps_current_key_spellings() {
        let msg = payload(json!({
            "station_code": "101",
            "station_name": "Gare de Lyon",
            "commune": "Paris",
            "capacity": 20,
            "docks_available": 5,
            "bikes_available": 15,
            "bikes_mechanical": 10,
            "bikes_ebike": 5,
            "is_installed": true,
            "is_returning": "OUI",
            "due_date": "2026-01-22T10:00:00Z",
            "code_insee": "75056",
            "geo": "48.85,2.35"
        }));

        let record = StationStatusRecord::from_message(&msg).unwrap();
        assert_eq!(record.station_code, "101");
        assert_eq!(record.station_name.as_deref(), Some("Gare de Lyon"));
        assert_eq!(record.capacity, Some(20));
        assert_eq!(record.is_installed, Some(true));
        assert_eq!(record.is_returning, Some(true));
        assert_eq!(
            record.due_date,
            NaiveDate::from_ymd_opt(2026, 1, 22).unwrap().and_hms_opt(10, 0, 0).unwrap()
        );
        assert_eq!(record.code_insee, "75056");
        assert_eq!(record.geo, "48.85,2.35");
    }

    #[test]
    fn maps_legacy_key_spellings() {
        let msg = payload(json!({
            "stationcode": "16107",
            "name": "Benjamin Godard - Victor Hugo",
            "nom_arrondissement_communes": "Paris",
            "numdocksavailable": 12,
            "numbikesavailable": "23.0",
            "mechanical": 1,
            "ebike": 0,
            "is_installed": 1,
            "is_returning": 0,
            "last_reported": "2026-01-22 10:00:00",
            "codeinsee": "75116",
            "geo": "48.865,2.275"
        }));

        let record = StationStatusRecord::from_message(&msg).unwrap();
        assert_eq!(record.station_code, "16107");
        assert_eq!(record.station_name.as_deref(), Some("Benjamin Godard - Victor Hugo"));
        assert_eq!(record.commune.as_deref(), Some("Paris"));
        assert_eq!(record.docks_available, Some(12));
        assert_eq!(record.bikes_available, Some(23));
        assert_eq!(record.is_installed, Some(true));
        assert_eq!(record.is_returning, Some(false));
    }

    #[test]
    fn missing_mandatory_fields_are_named() {
        let msg = payload(json!({
            "stationcode": "101",
            "duedate": "2026-01-22T10:00:00Z",
            "geo": "48.85,2.35"
        }));
        let err = StationStatusRecord::from_message(&msg).unwrap_err();
        assert!(matches!(err, MapError::MissingField("code_insee")), "got {err:?}");

        let msg = payload(json!({
            "stationcode": "101",
            "duedate": "2026-01-22T10:00:00Z",
            "code_insee": "75056"
        }));
        let err = StationStatusRecord::from_message(&msg).unwrap_err();
        assert!(matches!(err, MapError::MissingField("geo")), "got {err:?}");

        // Present-but-empty is as missing as absent.
        let msg = payload(json!({
            "station_code": "  ",
            "duedate": "2026-01-22T10:00:00Z",
            "code_insee": "75056",
            "geo": "48.85,2.35"
        }));
        let err = StationStatusRecord::from_message(&msg).unwrap_err();
        assert!(matches!(err, MapError::MissingField("station_code")), "got {err:?}");
    }

    #[test]
    fn null_values_fall_through_to_aliases() {
        let msg = payload(json!({
            "station_code": null,
            "stationcode": "101",
            "due_date": null,
            "duedate": "2026-01-22T10:00:00Z",
            "code_insee": "75056",
            "geo": "48.85,2.35"
        }));
        let record = StationStatusRecord::from_message(&msg).unwrap();
        assert_eq!(record.station_code, "101");
    }

    #[test]
    fn unreadable_optionals_stay_unknown() {
        let msg = payload(json!({
            "station_code": "101",
            "due_date": "2026-01-22T10:00:00Z",
            "code_insee": "75056",
            "geo": "48.85,2.35",
            "capacity": "beaucoup",
            "bikes_ebike": "",
            "is_installed": "peut-être"
        }));
        let record = StationStatusRecord::from_message(&msg).unwrap();
        assert_eq!(record.capacity, None);
        assert_eq!(record.bikes_ebike, None);
        assert_eq!(record.is_installed, None);
        assert_eq!(record.is_returning, None);
    }

    #[test]
    fn bad_timestamp_is_a_distinct_error() {
        let msg = payload(json!({
            "station_code": "101",
            "due_date": "22/01/2026",
            "code_insee": "75056",
            "geo": "48.85,2.35"
        }));
        let err = StationStatusRecord::from_message(&msg).unwrap_err();
        assert!(matches!(err, MapError::InvalidTimestamp(_)), "got {err:?}");
    }

    #[test]
    fn message_jsonl_round_trip_preserves_accents() {
        let message = StationStatusMessage {
            station_code: "101".to_owned(),
            station_name: Some("Gare d'Austerlitz".to_owned()),
            commune: Some("Boulogne-Billancourt".to_owned()),
            capacity: Some(20),
            docks_available: None,
            bikes_available: Some(3),
            bikes_mechanical: None,
            bikes_ebike: None,
            is_installed: Some(true),
            is_returning: None,
            due_date: "2026-01-22 10:00:00".to_owned(),
            code_insee: Some("92012".to_owned()),
            geo: Some("48.83,2.24".to_owned()),
        };
        let line = serde_json::to_string(&message).unwrap();
        assert!(line.contains("Gare d'Austerlitz"));

        let reparsed: StationStatusMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(reparsed, message);

        // A published message maps cleanly on the ingestion side.
        let Value::Object(map) = serde_json::from_str::<Value>(&line).unwrap() else {
            panic!("expected object");
        };
        let record = StationStatusRecord::from_message(&map).unwrap();
        assert_eq!(record.station_code, "101");
        assert_eq!(record.is_installed, Some(true));
        assert_eq!(record.is_returning, None);
    }
}
