//! YAML reading and writing for scenario and config files.
//!
//! Enums are written as single-key maps (`click: { target: [...] }`,
//! `rule: { exactly: 7 }`) rather than YAML `!tags`, at any depth.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml_ng::with::singleton_map_recursive;

/// Deserialize a document, reading enums from single-key maps
pub fn from_str<T: DeserializeOwned>(yaml: &str) -> Result<T, serde_yaml_ng::Error> {
    singleton_map_recursive::deserialize(serde_yaml_ng::Deserializer::from_str(yaml))
}

/// Serialize a value, writing enums as single-key maps
pub fn to_string<T: Serialize>(value: &T) -> Result<String, serde_yaml_ng::Error> {
    let mut buf = Vec::new();
    {
        let mut serializer = serde_yaml_ng::Serializer::new(&mut buf);
        singleton_map_recursive::serialize(value, &mut serializer)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
