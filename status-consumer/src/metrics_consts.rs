pub const MESSAGES_RECEIVED: &str = "station_status_messages_received";
pub const ROWS_UPSERTED: &str = "station_status_rows_upserted";
pub const EMPTY_PAYLOADS: &str = "station_status_empty_payloads";
pub const PAYLOAD_DECODE_FAILURES: &str = "station_status_payload_decode_failures";
pub const MAPPING_FAILURES: &str = "station_status_mapping_failures";
pub const UPSERT_FAILURES: &str = "station_status_upsert_failures";
