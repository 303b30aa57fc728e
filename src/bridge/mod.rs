//! Local bridge: in-process accessory host
//!
//! Holds the accessories registered by the Reconciler together with their
//! characteristic values, and broadcasts a `CharacteristicEvent` for every
//! characteristic update so subscribers see the republished readings.

pub mod api;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::accessory::host::{
    AccessoryHost, AccessoryId, CharacteristicKind, CharacteristicValue, HostAccessory,
};
use crate::error::BridgeError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notification emitted on `update_characteristic`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacteristicEvent {
    pub id: AccessoryId,
    pub display_name: String,
    pub kind: CharacteristicKind,
    pub value: CharacteristicValue,
    pub at: DateTime<Utc>,
}

/// An accessory owned by the local bridge
pub struct BridgeAccessory {
    id: AccessoryId,
    display_name: String,
    characteristics: RwLock<HashMap<CharacteristicKind, CharacteristicValue>>,
    reachable: AtomicBool,
    events: broadcast::Sender<CharacteristicEvent>,
}

impl BridgeAccessory {
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Current characteristic values keyed by name
    pub async fn characteristics(&self) -> HashMap<&'static str, CharacteristicValue> {
        self.characteristics
            .read()
            .await
            .iter()
            .map(|(kind, value)| (kind.as_str(), value.clone()))
            .collect()
    }
}

#[async_trait]
impl HostAccessory for BridgeAccessory {
    fn id(&self) -> &AccessoryId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn set_characteristic(&self, kind: CharacteristicKind, value: CharacteristicValue) {
        self.characteristics.write().await.insert(kind, value);
    }

    async fn update_characteristic(&self, kind: CharacteristicKind, value: CharacteristicValue) {
        self.characteristics
            .write()
            .await
            .insert(kind, value.clone());

        // No subscribers is fine
        let _ = self.events.send(CharacteristicEvent {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            kind,
            value,
            at: Utc::now(),
        });
    }

    async fn characteristic(&self, kind: CharacteristicKind) -> Option<CharacteristicValue> {
        self.characteristics.read().await.get(&kind).cloned()
    }

    fn mark_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }
}

/// In-process accessory host
pub struct LocalBridge {
    accessories: RwLock<HashMap<AccessoryId, Arc<BridgeAccessory>>>,
    events: broadcast::Sender<CharacteristicEvent>,
}

impl LocalBridge {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            accessories: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CharacteristicEvent> {
        self.events.subscribe()
    }

    pub async fn get(&self, id: &AccessoryId) -> Option<Arc<BridgeAccessory>> {
        self.accessories.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.accessories.read().await.len()
    }

    /// Accessories the host already holds (handed to the Reconciler at startup)
    pub async fn accessories(&self) -> Vec<Arc<BridgeAccessory>> {
        self.accessories.read().await.values().cloned().collect()
    }

    /// Log every characteristic update (runs until the bridge is dropped)
    pub async fn log_events(self: Arc<Self>) {
        let mut events = self.subscribe();
        drop(self);

        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::debug!(
                        "[Bridge] {} ({}) {} = {:?}",
                        event.display_name,
                        event.id,
                        event.kind.as_str(),
                        event.value
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Bridge] Event logger lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

impl Default for LocalBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessoryHost for LocalBridge {
    type Accessory = BridgeAccessory;

    fn create_accessory(&self, id: &AccessoryId, display_name: &str) -> Arc<BridgeAccessory> {
        Arc::new(BridgeAccessory {
            id: id.clone(),
            display_name: display_name.to_string(),
            characteristics: RwLock::new(HashMap::new()),
            reachable: AtomicBool::new(false),
            events: self.events.clone(),
        })
    }

    async fn register_new(&self, accessory: Arc<BridgeAccessory>) -> Result<(), BridgeError> {
        let mut accessories = self.accessories.write().await;

        if accessories.contains_key(&accessory.id) {
            return Err(BridgeError::HostError(format!(
                "accessory {} is already registered",
                accessory.id
            )));
        }

        tracing::info!(
            "[Bridge] Registered accessory: {} ({})",
            accessory.display_name,
            accessory.id
        );
        accessories.insert(accessory.id.clone(), accessory);
        Ok(())
    }
}
