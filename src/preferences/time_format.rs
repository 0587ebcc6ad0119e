//! `"HH:MM"` wall-clock serialization for preference times.

use chrono::NaiveTime;
use serde::{de::Error, Deserialize, Deserializer, Serializer};

const FORMAT: &str = "%H:%M";

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.format(FORMAT).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time of day: {raw}")))
}

/// Accepts `HH:MM` and `HH:MM:SS`
pub fn parse(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse("09:00"), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(parse("22:30:15"), NaiveTime::from_hms_opt(22, 30, 15));
        assert_eq!(parse("25:00"), None);
        assert_eq!(parse("nine"), None);
    }
}
