use std::time::{Duration, SystemTime};

/// Converts a `SystemTime` object into a float timestamp.
pub fn datetime_to_timestamp(st: &SystemTime) -> f64 {
    match st.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => duration.as_secs_f64(),
        Err(_) => 0.0,
    }
}

/// Converts a float timestamp into a `SystemTime`, rejecting values that
/// cannot represent a point in time.
pub fn timestamp_to_datetime(ts: f64) -> Option<SystemTime> {
    if !ts.is_finite() || ts < 0.0 {
        return None;
    }
    let duration = Duration::from_secs_f64(ts);
    SystemTime::UNIX_EPOCH.checked_add(duration)
}

/// Serde support for `SystemTime` encoded as float seconds since the epoch.
pub mod ts_seconds_float {
    use std::fmt;

    use serde::{de, ser};

    use super::*;

    /// Deserializes a `SystemTime` from integer or float seconds.
    pub fn deserialize<'de, D>(d: D) -> Result<SystemTime, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        d.deserialize_any(SecondsTimestampVisitor)
    }

    /// Serializes a `SystemTime` as seconds since the epoch, as an integer
    /// when the value has no sub-second part.
    pub fn serialize<S>(st: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match st.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(duration) => {
                if duration.subsec_nanos() == 0 {
                    serializer.serialize_u64(duration.as_secs())
                } else {
                    serializer.serialize_f64(duration.as_secs_f64())
                }
            }
            Err(_) => Err(ser::Error::custom(format!(
                "invalid `SystemTime` instance: {st:?}"
            ))),
        }
    }

    struct SecondsTimestampVisitor;

    impl de::Visitor<'_> for SecondsTimestampVisitor {
        type Value = SystemTime;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(formatter, "a unix timestamp")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            timestamp_to_datetime(value)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {value}")))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            if value < 0 {
                return Err(de::Error::custom(format!("invalid timestamp: {value}")));
            }
            Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(value as u64))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(value))
        }
    }
}

/// Serde support for `Option<SystemTime>` encoded as float seconds.
pub mod opt_ts_seconds_float {
    use serde::{de, ser, Deserialize};

    use super::*;

    pub fn deserialize<'de, D>(d: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let opt = Option::<f64>::deserialize(d)?;
        Ok(opt.and_then(timestamp_to_datetime))
    }

    pub fn serialize<S>(st: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        match st {
            Some(st) => super::ts_seconds_float::serialize(st, serializer),
            None => serializer.serialize_none(),
        }
    }
}
