//! Reconciler: folds fetched device records into the accessory cache
//!
//! One accessory per device `uuid`. The first sighting builds and registers
//! the accessory with the host; later sightings update it in place and push
//! the new reading as a characteristic update. Devices that disappear from
//! the tag list stay cached with their last reading.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::accessory::host::{AccessoryHost, AccessoryId, CharacteristicKind, HostAccessory};
use crate::error::BridgeError;
use crate::models::DeviceRecord;

pub const MANUFACTURER: &str = "CAO Gadgets";
pub const FALLBACK_MODEL: &str = "Wireless Sensor Tag";

/// What a reconcile call did to the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// First sighting: accessory created and registered with the host
    Registered(AccessoryId),
    /// Existing accessory updated in place
    Updated(AccessoryId),
}

/// Cached accessory state
struct Accessory<A> {
    id: AccessoryId,
    display_name: String,
    manager: Option<String>,
    device: Option<DeviceRecord>,
    reading: f64,
    reachable: bool,
    registered_at: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
    handle: Arc<A>,
}

impl<A: HostAccessory> Accessory<A> {
    fn snapshot(&self) -> AccessorySnapshot {
        AccessorySnapshot {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            manager: self.manager.clone(),
            uuid: self.device.as_ref().map(|d| d.uuid.clone()),
            model: self.device.as_ref().map(model_for),
            reading: self.reading,
            temperature_reported: self
                .device
                .as_ref()
                .map(|d| d.temperature.is_some())
                .unwrap_or(false),
            reachable: self.reachable,
            registered_at: self.registered_at,
            last_seen: self.last_seen,
        }
    }
}

/// Read-only view of a cached accessory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessorySnapshot {
    pub id: AccessoryId,
    pub display_name: String,
    pub manager: Option<String>,
    pub uuid: Option<String>,
    pub model: Option<String>,
    pub reading: f64,
    pub temperature_reported: bool,
    pub reachable: bool,
    pub registered_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

fn model_for(device: &DeviceRecord) -> String {
    device
        .device_type
        .clone()
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

fn display_name_for(device: &DeviceRecord) -> String {
    if device.name.trim().is_empty() {
        device.uuid.clone()
    } else {
        device.name.clone()
    }
}

/// Owns the accessory cache. Every mutation goes through the cache mutex,
/// held for the whole reconcile call.
pub struct Reconciler<H: AccessoryHost> {
    host: Arc<H>,
    accessories: Mutex<HashMap<AccessoryId, Accessory<H::Accessory>>>,
}

impl<H: AccessoryHost> Reconciler<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            accessories: Mutex::new(HashMap::new()),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Create or update the accessory for one device record
    pub async fn reconcile(
        &self,
        device: &DeviceRecord,
        manager_name: &str,
    ) -> Result<ReconcileOutcome, BridgeError> {
        let id = self.host.generate_id(&device.uuid);
        let reading = device.reading();

        if device.temperature.is_none() {
            tracing::info!(
                "[Reconciler] {} ({}) reported no temperature; reading 0",
                device.name,
                device.uuid
            );
        }

        let mut accessories = self.accessories.lock().await;

        if let Some(existing) = accessories.get_mut(&id) {
            tracing::info!(
                "[Reconciler] Updating existing accessory: {} ({})",
                device.name,
                id
            );

            existing.device = Some(device.clone());
            existing.manager = Some(manager_name.to_string());
            existing.reachable = true;
            existing.reading = reading;
            existing.last_seen = Some(Utc::now());

            existing.handle.mark_reachable(true);
            existing
                .handle
                .update_characteristic(CharacteristicKind::CurrentTemperature, reading.into())
                .await;

            tracing::debug!(
                "[Reconciler] Updated temperature for {}: {:?}",
                device.name,
                device.temperature
            );

            return Ok(ReconcileOutcome::Updated(id));
        }

        let display_name = display_name_for(device);
        tracing::info!(
            "[Reconciler] Adding new accessory: {} ({}) from manager {}",
            display_name,
            id,
            manager_name
        );

        let handle = self.host.create_accessory(&id, &display_name);
        handle
            .set_characteristic(CharacteristicKind::Manufacturer, MANUFACTURER.into())
            .await;
        handle
            .set_characteristic(CharacteristicKind::Model, model_for(device).into())
            .await;
        handle
            .set_characteristic(CharacteristicKind::SerialNumber, device.uuid.clone().into())
            .await;
        handle
            .set_characteristic(CharacteristicKind::CurrentTemperature, reading.into())
            .await;

        self.host.register_new(handle.clone()).await?;
        handle.mark_reachable(true);

        let now = Utc::now();
        accessories.insert(
            id.clone(),
            Accessory {
                id: id.clone(),
                display_name,
                manager: Some(manager_name.to_string()),
                device: Some(device.clone()),
                reading,
                reachable: true,
                registered_at: now,
                last_seen: Some(now),
                handle,
            },
        );

        Ok(ReconcileOutcome::Registered(id))
    }

    /// Adopt an accessory the host restored from its own cache.
    ///
    /// Returns false if an accessory with that id is already cached.
    pub async fn restore(&self, handle: Arc<H::Accessory>) -> bool {
        let id = handle.id().clone();
        let mut accessories = self.accessories.lock().await;

        if accessories.contains_key(&id) {
            return false;
        }

        let reading = handle
            .characteristic(CharacteristicKind::CurrentTemperature)
            .await
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        tracing::info!(
            "[Reconciler] Loading cached accessory: {} ({})",
            handle.display_name(),
            id
        );

        accessories.insert(
            id.clone(),
            Accessory {
                id,
                display_name: handle.display_name().to_string(),
                manager: None,
                device: None,
                reading,
                reachable: false,
                registered_at: Utc::now(),
                last_seen: None,
                handle,
            },
        );

        true
    }

    pub async fn get(&self, id: &AccessoryId) -> Option<AccessorySnapshot> {
        let accessories = self.accessories.lock().await;
        accessories.get(id).map(|a| a.snapshot())
    }

    /// All cached accessories, sorted by display name then id
    pub async fn snapshot(&self) -> Vec<AccessorySnapshot> {
        let accessories = self.accessories.lock().await;
        let mut snapshots: Vec<AccessorySnapshot> =
            accessories.values().map(|a| a.snapshot()).collect();
        snapshots.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        snapshots
    }

    pub async fn len(&self) -> usize {
        self.accessories.lock().await.len()
    }
}
