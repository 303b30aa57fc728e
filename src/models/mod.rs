//! Data models for the wireless tag bridge

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

// ============================================================================
// Tag Manager Models
// ============================================================================

/// A configured tag manager: a display name bound to the manager's MAC address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagManager {
    pub name: String,
    pub mac: String,
}

/// Ordered list of tag managers.
///
/// Accepts either a map (`{"kitchen": "AA:BB"}`) or a list of
/// `{name, mac}` entries. Map entries keep their source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagManagers(Vec<TagManager>);

impl TagManagers {
    pub fn iter(&self) -> std::slice::Iter<'_, TagManager> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<TagManager> {
        self.0
    }
}

impl<'de> Deserialize<'de> for TagManagers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TagManagersVisitor;

        impl<'de> Visitor<'de> for TagManagersVisitor {
            type Value = TagManagers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of manager name to MAC address, or a list of {name, mac}")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut managers = Vec::new();
                while let Some((name, mac)) = map.next_entry::<String, String>()? {
                    if managers.iter().any(|m: &TagManager| m.name == name) {
                        return Err(de::Error::custom(format!(
                            "duplicate tag manager name: {}",
                            name
                        )));
                    }
                    managers.push(TagManager { name, mac });
                }
                Ok(TagManagers(managers))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut managers = Vec::new();
                while let Some(manager) = seq.next_element::<TagManager>()? {
                    managers.push(manager);
                }
                Ok(TagManagers(managers))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(TagManagers::default())
            }
        }

        deserializer.deserialize_any(TagManagersVisitor)
    }
}

/// Normalize MAC address: uppercase, no separators (e.g. "aa:bb:cc" → "AABBCC")
pub fn normalize_mac(mac: &str) -> String {
    mac.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

// ============================================================================
// Device Models
// ============================================================================

/// One physical sensor as reported by the tag list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    /// MAC of the owning tag manager
    #[serde(default)]
    pub mac: Option<String>,
    /// Degrees Celsius. `None` when the tag did not report one.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(
        default,
        rename = "tagType",
        alias = "type",
        deserialize_with = "string_or_number"
    )]
    pub device_type: Option<String>,
}

impl DeviceRecord {
    /// Reading exposed to the host; a missing temperature reads as 0
    pub fn reading(&self) -> f64 {
        self.temperature.unwrap_or(0.0)
    }
}

/// Response envelope of the tag list endpoint
#[derive(Debug, Deserialize)]
pub struct TagListResponse {
    pub d: Vec<DeviceRecord>,
}

/// `tagType` is numeric on the wire but older firmware reports strings
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
