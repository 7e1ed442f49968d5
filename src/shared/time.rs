use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// Wire format of every protocol timestamp: `yyyy-MM-dd'T'HH:mm:ss.SSSZ`,
/// i.e. fixed-width milliseconds followed by a numeric `+hhmm` offset.
pub const PROTOCOL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%3f%z";
const PROTOCOL_LEN: usize = "2024-01-01T00:00:00.000+0000".len();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp '{0}' does not match yyyy-MM-dd'T'HH:mm:ss.SSSZ")]
    Format(String),

    #[error("timestamp '{0}' is not a valid instant: {1}")]
    Invalid(String, String),
}

/// Parses a protocol timestamp, keeping its original offset.
///
/// Chrono is lenient about offsets (`+00:00`, `Z`) and digit counts, so the
/// shape is checked byte by byte before handing the string to chrono.
pub fn parse_protocol_timestamp(input: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    if !has_protocol_shape(input) {
        return Err(TimestampError::Format(input.to_string()));
    }
    DateTime::parse_from_str(input, PARSE_FORMAT)
        .map_err(|e| TimestampError::Invalid(input.to_string(), e.to_string()))
}

pub fn format_protocol_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format(PROTOCOL_FORMAT).to_string()
}

fn has_protocol_shape(input: &str) -> bool {
    let bytes = input.as_bytes();
    if bytes.len() != PROTOCOL_LEN {
        return false;
    }
    bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T',
        13 | 16 => *b == b':',
        19 => *b == b'.',
        23 => *b == b'+' || *b == b'-',
        _ => b.is_ascii_digit(),
    })
}

/// Serde adapter for `DateTime<FixedOffset>` fields carried in protocol format.
pub mod protocol_format {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_protocol_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_protocol_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
