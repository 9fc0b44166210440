use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub mod account;
pub mod oauth2_client;
pub mod oauth2_code;
pub mod session;
pub mod token;

// Second precision, always UTC: lexicographic order of the text equals time order,
// which the store filters rely on.
const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

pub fn format_timestamp(dt: OffsetDateTime) -> String {
    let dt = dt.to_offset(UtcOffset::UTC);
    dt.format(TIMESTAMP_FORMAT).unwrap_or_else(|_| dt.to_string())
}

/// Inverse of [`format_timestamp`].
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(text, TIMESTAMP_FORMAT).map(PrimitiveDateTime::assume_utc)
}

pub fn now_timestamp() -> String {
    format_timestamp(OffsetDateTime::now_utc())
}

/// Timestamp `age` in the past; rows created before it are expired.
pub fn timestamp_ago(age: Duration) -> String {
    format_timestamp(OffsetDateTime::now_utc() - age)
}

pub fn timestamp_in(ttl: Duration) -> String {
    format_timestamp(OffsetDateTime::now_utc() + ttl)
}
