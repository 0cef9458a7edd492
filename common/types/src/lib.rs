pub mod codec;
pub mod station;

pub use station::{MapError, StationStatusMessage, StationStatusRecord};
