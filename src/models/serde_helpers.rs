//! Serde helpers for consistent persisted output

use crate::models::timing::Timing;
use serde::{Deserialize, Deserializer, Serializer};

/// Skip `false` flags when serializing
pub fn is_false(value: &bool) -> bool {
    !*value
}

pub fn is_empty_str(value: &str) -> bool {
    value.is_empty()
}

pub fn default_se_volume() -> f64 {
    1.0
}

/// `Timing` as its `"<bar>:<beat>/<div>"` string with the strict parse
pub mod timing_str {
    use super::*;

    pub fn serialize<S>(value: &Timing, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.serialize())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Timing, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Timing::deserialize(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Span {
        #[serde(with = "timing_str")]
        at: Timing,
        #[serde(default, skip_serializing_if = "is_false")]
        flag: bool,
    }

    #[test]
    fn test_timing_as_string() {
        let span = Span {
            at: Timing::new(1, 2, 4),
            flag: false,
        };
        let json = serde_json::to_string(&span).unwrap();
        assert_eq!(json, r#"{"at":"1:2/4"}"#);
        let back: Span = serde_json::from_str(&json).unwrap();
        assert_eq!(back.at, Timing::new(1, 2, 4));
        assert!(serde_json::from_str::<Span>(r#"{"at":"1:2/0"}"#).is_err());
    }
}
