use std::collections::HashMap;

use common_types::codec::{normalize_header, parse_int, parse_tri_bool};
use common_types::StationStatusMessage;
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::NormalizeError;

// Accepted source-header spellings per canonical field, in priority order:
// the accented spelling the source currently publishes first, the de-accented
// spelling older exports used as fallback. Spellings are stored in
// `normalize_header` form. Extend the table here when the source renames a
// column, the row mapping below never changes.
const STATION_CODE: &[&str] = &["identifiant_station"];
const STATION_NAME: &[&str] = &["nom_station"];
const COMMUNE: &[&str] = &["nom_communes_équipées", "nom_communes_equipees"];
const CAPACITY: &[&str] = &["capacité_de_la_station", "capacite_de_la_station"];
const DOCKS_AVAILABLE: &[&str] = &["nombre_bornettes_libres"];
const BIKES_AVAILABLE: &[&str] = &[
    "nombre_total_vélos_disponibles",
    "nombre_total_velos_disponibles",
];
const BIKES_MECHANICAL: &[&str] = &[
    "vélos_mécaniques_disponibles",
    "velos_mecaniques_disponibles",
];
const BIKES_EBIKE: &[&str] = &[
    "vélos_électriques_disponibles",
    "velos_electriques_disponibles",
];
const IS_INSTALLED: &[&str] = &["station_en_fonctionnement"];
const IS_RETURNING: &[&str] = &["retour_vélib_possible", "retour_velib_possible"];
const DUE_DATE: &[&str] = &["actualisation_de_la_donnée", "actualisation_de_la_donnee"];
const CODE_INSEE: &[&str] = &[
    "code_insee_communes_équipées",
    "code_insee_communes_equipees",
];
const GEO: &[&str] = &["coordonnées_géographiques", "coordonnees_geographiques"];

/// Lookup from normalized header name to raw column index.
struct HeaderMap {
    index: HashMap<String, usize>,
}

impl HeaderMap {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(column, name)| (normalize_header(name), column))
            .collect();
        Self { index }
    }

    /// First alias present in the header set whose cell is non-empty after
    /// trimming. Cells past the end of a short row read as absent.
    fn resolve<'r>(&self, row: &'r StringRecord, aliases: &[&str]) -> Option<&'r str> {
        for alias in aliases {
            if let Some(&column) = self.index.get(*alias) {
                if let Some(value) = row.get(column) {
                    let value = value.trim();
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
        }
        None
    }
}

/// Normalize one raw snapshot (semicolon-separated, optional UTF-8 BOM) into
/// canonical records.
///
/// A row is only admitted when `station_code` and `due_date` resolve to
/// non-empty values; everything else degrades to unknown. Ragged rows never
/// fail the run: extra cells have no header to land in and are discarded.
/// Zero admitted rows is a pipeline integrity failure, not an empty success.
pub fn normalize(raw: &str) -> Result<Vec<StationStatusMessage>, NormalizeError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = HeaderMap::new(&reader.headers()?.clone());

    let mut accepted = Vec::new();
    let mut skipped = 0usize;
    for (position, row) in reader.records().enumerate() {
        let row = row?;

        let station_code = headers.resolve(&row, STATION_CODE);
        let due_date = headers.resolve(&row, DUE_DATE);
        let (Some(station_code), Some(due_date)) = (station_code, due_date) else {
            skipped += 1;
            debug!(row = position + 2, "skipping row without station_code or due_date");
            continue;
        };

        accepted.push(StationStatusMessage {
            station_code: station_code.to_owned(),
            station_name: headers.resolve(&row, STATION_NAME).map(str::to_owned),
            commune: headers.resolve(&row, COMMUNE).map(str::to_owned),
            capacity: headers.resolve(&row, CAPACITY).and_then(parse_int),
            docks_available: headers.resolve(&row, DOCKS_AVAILABLE).and_then(parse_int),
            bikes_available: headers.resolve(&row, BIKES_AVAILABLE).and_then(parse_int),
            bikes_mechanical: headers.resolve(&row, BIKES_MECHANICAL).and_then(parse_int),
            bikes_ebike: headers.resolve(&row, BIKES_EBIKE).and_then(parse_int),
            is_installed: headers.resolve(&row, IS_INSTALLED).and_then(parse_tri_bool),
            is_returning: headers.resolve(&row, IS_RETURNING).and_then(parse_tri_bool),
            due_date: due_date.to_owned(),
            code_insee: headers.resolve(&row, CODE_INSEE).map(str::to_owned),
            geo: headers.resolve(&row, GEO).map(str::to_owned),
        });
    }

    if accepted.is_empty() {
        return Err(NormalizeError::NoRows);
    }

    info!(accepted = accepted.len(), skipped, "normalized raw snapshot");
    Ok(accepted)
}
