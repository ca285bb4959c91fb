//! Legacy duration encodings.
//!
//! Durations in the JSON config are integer nanoseconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub mod nanos {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super::nanos")]
        timeout: Duration,
    }

    #[test]
    fn reads_nanoseconds() {
        let w: Wrapper = serde_json::from_str(r#"{"timeout":15000000000}"#).unwrap();
        assert_eq!(w.timeout, Duration::from_secs(15));
        assert_eq!(serde_json::to_string(&w).unwrap(), r#"{"timeout":15000000000}"#);
    }
}
