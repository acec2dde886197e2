//! Serializes seeds as decimal strings so JSON clients never round them through a double.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SeedInput {
        Text(String),
        Number(u64),
    }

    match SeedInput::deserialize(deserializer)? {
        SeedInput::Text(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|err| D::Error::custom(format!("invalid seed {raw:?}: {err}"))),
        SeedInput::Number(value) => Ok(value),
    }
}
