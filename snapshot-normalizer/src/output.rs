use std::io::Write;

use common_types::StationStatusMessage;

use crate::error::NormalizeError;

/// Tabular encoding: comma-delimited, header row taken from the canonical
/// field set shared by every accepted record.
pub fn write_cleaned_csv<W: Write>(
    records: &[StationStatusMessage],
    writer: W,
) -> Result<(), NormalizeError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Line-delimited encoding: one self-contained record per line, non-ASCII
/// preserved verbatim.
pub fn write_jsonl<W: Write>(
    records: &[StationStatusMessage],
    mut writer: W,
) -> Result<(), NormalizeError> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StationStatusMessage {
        StationStatusMessage {
            station_code: "101".to_owned(),
            station_name: Some("Mairie du 15ème".to_owned()),
            commune: Some("Paris".to_owned()),
            capacity: Some(20),
            docks_available: None,
            bikes_available: Some(3),
            bikes_mechanical: None,
            bikes_ebike: Some(1),
            is_installed: Some(true),
            is_returning: None,
            due_date: "2026-01-22 10:00:00".to_owned(),
            code_insee: Some("75056".to_owned()),
            geo: Some("48.84,2.30".to_owned()),
        }
    }

    #[test]
    fn csv_header_comes_from_the_canonical_field_set() {
        let mut buffer = Vec::new();
        write_cleaned_csv(&[record()], &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "station_code,station_name,commune,capacity,docks_available,bikes_available,\
             bikes_mechanical,bikes_ebike,is_installed,is_returning,due_date,code_insee,geo"
        );
        // Unknown readings serialize as empty cells, not zeros.
        assert_eq!(
            lines.next().unwrap(),
            "101,Mairie du 15ème,Paris,20,,3,,1,true,,2026-01-22 10:00:00,75056,\"48.84,2.30\""
        );
    }

    #[test]
    fn jsonl_is_one_record_per_line_with_accents_verbatim() {
        let mut buffer = Vec::new();
        write_jsonl(&[record(), record()], &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Mairie du 15ème"));
        assert!(!lines[0].contains("\\u"));

        let reparsed: StationStatusMessage = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(reparsed, record());
    }
}
