//! Host framework capability interface
//!
//! The Reconciler only talks to the home-automation host through these
//! traits: stable id generation, accessory construction, registration, and
//! characteristic get/set/update on an accessory.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BridgeError;

/// Namespace for accessory ids derived from device uuids
const ACCESSORY_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

/// Stable identifier of an accessory, derived from a device `uuid`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessoryId(String);

impl AccessoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic accessory id for a raw string (UUIDv5)
pub fn generate_accessory_id(raw: &str) -> AccessoryId {
    AccessoryId(Uuid::new_v5(&ACCESSORY_NAMESPACE, raw.as_bytes()).to_string())
}

/// Characteristics exposed by a tag accessory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicKind {
    Manufacturer,
    Model,
    SerialNumber,
    CurrentTemperature,
}

impl CharacteristicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacteristicKind::Manufacturer => "manufacturer",
            CharacteristicKind::Model => "model",
            CharacteristicKind::SerialNumber => "serial_number",
            CharacteristicKind::CurrentTemperature => "current_temperature",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Number(f64),
    Text(String),
}

impl CharacteristicValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CharacteristicValue::Number(n) => Some(*n),
            CharacteristicValue::Text(_) => None,
        }
    }
}

impl From<f64> for CharacteristicValue {
    fn from(n: f64) -> Self {
        CharacteristicValue::Number(n)
    }
}

impl From<&str> for CharacteristicValue {
    fn from(s: &str) -> Self {
        CharacteristicValue::Text(s.to_string())
    }
}

impl From<String> for CharacteristicValue {
    fn from(s: String) -> Self {
        CharacteristicValue::Text(s)
    }
}

/// An accessory object owned by the host
#[async_trait]
pub trait HostAccessory: Send + Sync {
    fn id(&self) -> &AccessoryId;

    fn display_name(&self) -> &str;

    /// Write a value without notifying subscribers
    async fn set_characteristic(&self, kind: CharacteristicKind, value: CharacteristicValue);

    /// Write a value and notify subscribers
    async fn update_characteristic(&self, kind: CharacteristicKind, value: CharacteristicValue);

    async fn characteristic(&self, kind: CharacteristicKind) -> Option<CharacteristicValue>;

    fn mark_reachable(&self, reachable: bool);
}

/// The home-automation host
#[async_trait]
pub trait AccessoryHost: Send + Sync + 'static {
    type Accessory: HostAccessory + 'static;

    fn generate_id(&self, raw: &str) -> AccessoryId {
        generate_accessory_id(raw)
    }

    fn create_accessory(&self, id: &AccessoryId, display_name: &str) -> Arc<Self::Accessory>;

    async fn register_new(&self, accessory: Arc<Self::Accessory>) -> Result<(), BridgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_deterministic() {
        assert_eq!(generate_accessory_id("u1"), generate_accessory_id("u1"));
        assert_ne!(generate_accessory_id("u1"), generate_accessory_id("u2"));
    }

    #[test]
    fn test_generate_id_is_uuid() {
        let id = generate_accessory_id("0d5d8a3e-0000-4000-8000-000000000001");
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn test_characteristic_value_serializes_untagged() {
        assert_eq!(
            serde_json::to_value(CharacteristicValue::from(4.2)).unwrap(),
            serde_json::json!(4.2)
        );
        assert_eq!(
            serde_json::to_value(CharacteristicValue::from("CAO Gadgets")).unwrap(),
            serde_json::json!("CAO Gadgets")
        );
    }
}
