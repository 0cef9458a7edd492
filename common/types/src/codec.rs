use chrono::{DateTime, NaiveDateTime};

/// Normalize a raw CSV header into its canonical lookup form: surrounding
/// whitespace trimmed, lowercased, internal whitespace runs collapsed to a
/// single underscore.
///
/// Alias tables store header spellings in this form, so the same function
/// must be applied when registering an alias and when looking one up.
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Lenient integer parse for open-data cells. Empty input is an unknown
/// reading, not zero. The source system exports some counts as textual
/// floats ("12.0"), which are truncated toward zero.
pub fn parse_int(value: &str) -> Option<i32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(n) = value.parse::<i32>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= i32::MIN as f64 && f <= i32::MAX as f64 => {
            Some(f.trunc() as i32)
        }
        _ => None,
    }
}

/// Tri-state boolean over the tokens the source system emits, French and
/// English. Anything outside the two token sets stays unknown; a missing
/// reading must not turn into a confirmed `false`.
pub fn parse_tri_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "oui" | "true" | "1" | "vrai" => Some(true),
        "non" | "false" | "0" | "faux" => Some(false),
        _ => None,
    }
}

/// Parse an observation timestamp into its timezone-naive wall-clock form.
///
/// Attempted in order: RFC 3339 with an explicit offset (a trailing `Z` is
/// rewritten to `+00:00` first; the offset is discarded after parsing), the
/// offset-less extended form, then the space-separated forms with and
/// without seconds.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    let with_offset = match value.strip_suffix('Z') {
        Some(prefix) => format!("{prefix}+00:00"),
        None => value.to_owned(),
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&with_offset) {
        return Some(parsed.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn header_variants_converge() {
        assert_eq!(normalize_header("Nom Station"), "nom_station");
        assert_eq!(normalize_header("  Capacité de la Station "), "capacité_de_la_station");
        assert_eq!(normalize_header("Actualisation   de la donnée"), "actualisation_de_la_donnée");
        assert_eq!(normalize_header("identifiant_station"), "identifiant_station");
    }

    #[test]
    fn parse_int_unknown_is_not_zero() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("   "), None);
        assert_eq!(parse_int("n/a"), None);
        assert_eq!(parse_int("inf"), None);
        assert_eq!(parse_int("1e99"), None);
    }

    #[test]
    fn parse_int_accepts_textual_floats() {
        assert_eq!(parse_int("20.0"), Some(20));
        assert_eq!(parse_int("12.7"), Some(12));
        assert_eq!(parse_int("-3.9"), Some(-3));
        assert_eq!(parse_int(" 42 "), Some(42));
        assert_eq!(parse_int("1e3"), Some(1000));
    }

    #[test]
    fn tri_bool_token_sets() {
        for token in ["oui", "OUI", "true", "1", "Vrai"] {
            assert_eq!(parse_tri_bool(token), Some(true), "token {token:?}");
        }
        for token in ["non", "NON", "false", "0", "Faux"] {
            assert_eq!(parse_tri_bool(token), Some(false), "token {token:?}");
        }
        for token in ["", "  ", "yes", "2", "peut-être"] {
            assert_eq!(parse_tri_bool(token), None, "token {token:?}");
        }
    }

    #[test]
    fn timestamp_offset_is_discarded_not_converted() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 22)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2026-01-22T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2026-01-22T10:00:00+00:00"), Some(expected));
        // Wall clock is kept as written, whatever the offset said.
        assert_eq!(parse_timestamp("2026-01-22T10:00:00+02:00"), Some(expected));
    }

    #[test]
    fn timestamp_fallback_formats() {
        let with_seconds = NaiveDate::from_ymd_opt(2026, 1, 22)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let without_seconds = NaiveDate::from_ymd_opt(2026, 1, 22)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2026-01-22T10:00:00"), Some(with_seconds));
        assert_eq!(parse_timestamp("2026-01-22 10:00:00"), Some(with_seconds));
        assert_eq!(parse_timestamp("2026-01-22 10:00"), Some(without_seconds));
        assert_eq!(parse_timestamp("22/01/2026 10:00"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
