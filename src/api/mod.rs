use chrono::{DateTime, Utc};

pub mod forecast;
pub mod status;

/// The API exchanges instants as integer epoch seconds.
pub trait ToEpochSeconds {
    fn to_epoch_seconds(&self) -> i64;
}

impl ToEpochSeconds for DateTime<Utc> {
    fn to_epoch_seconds(&self) -> i64 {
        self.timestamp()
    }
}
