use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Garmin activity identifier. Numeric on the wire from the HTTP API, sometimes a string
/// from other producers, so it is kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityId(String);

impl ActivityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for ActivityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ActivityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => ActivityId::from(n),
            RawId::Text(s) => ActivityId(s),
        })
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Activity {
    #[serde(rename = "activityId")]
    pub id: ActivityId,
    #[serde(rename = "activityName", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "activityType", deserialize_with = "deserialize_type_key")]
    pub activity_type: String,
    #[serde(rename = "startTimeLocal", deserialize_with = "deserialize_local_time")]
    pub start_time: NaiveDateTime,
    /// meters
    #[serde(default, deserialize_with = "null_as_default")]
    pub distance: f64,
    /// seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
    /// m/s
    #[serde(rename = "averageSpeed", default, deserialize_with = "null_as_default")]
    pub average_speed: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub calories: f64,
}

impl Activity {
    pub fn start_date(&self) -> NaiveDate {
        self.start_time.date()
    }

    pub fn distance_km(&self) -> f64 {
        self.distance / 1000.0
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration / 60.0
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// The search API nests the type as {"typeKey": ...}; the helper script flattens it.
fn deserialize_type_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawType {
        Key(String),
        Object {
            #[serde(rename = "typeKey")]
            type_key: String,
        },
    }

    Ok(match RawType::deserialize(deserializer)? {
        RawType::Key(key) | RawType::Object { type_key: key } => key,
    })
}

fn deserialize_local_time<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_local_time(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised start time: {raw}")))
}

/// Accepts Garmin's `YYYY-MM-DD HH:MM:SS` and RFC 3339. The wall-clock part is kept as-is.
pub fn parse_local_time(raw: &str) -> Option<NaiveDateTime> {
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
}
