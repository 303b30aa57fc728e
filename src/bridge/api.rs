//! Status API - read-only view of the accessory cache

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::accessory::{AccessoryId, Reconciler};
use crate::bridge::LocalBridge;
use crate::error::BridgeError;
use crate::wirelesstag::Poller;

#[derive(Clone)]
pub struct ApiState {
    pub reconciler: Arc<Reconciler<LocalBridge>>,
    pub poller: Arc<Poller<LocalBridge>>,
}

pub fn routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/accessories", get(list_accessories))
        .route("/api/accessories/:id", get(get_accessory))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/status - poller configuration and last cycle
async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let managers: Vec<&str> = state
        .poller
        .managers()
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    let accessory_count = state.reconciler.len().await;
    let registered_count = state.reconciler.host().len().await;
    let last_cycle = state.poller.last_cycle().await;

    Json(serde_json::json!({
        "tag_managers": managers,
        "interval_ms": state.poller.interval().as_millis() as u64,
        "accessory_count": accessory_count,
        "registered_count": registered_count,
        "last_cycle": last_cycle,
    }))
}

/// GET /api/accessories - List all cached accessories
async fn list_accessories(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.reconciler.snapshot().await)
}

/// GET /api/accessories/:id - One accessory with its characteristic values
async fn get_accessory(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, BridgeError> {
    let id = AccessoryId::new(id);
    let snapshot = state
        .reconciler
        .get(&id)
        .await
        .ok_or_else(|| BridgeError::NotFound(format!("Accessory {} not found", id)))?;

    let (characteristics, host_reachable) = match state.reconciler.host().get(&id).await {
        Some(accessory) => (accessory.characteristics().await, accessory.is_reachable()),
        None => (Default::default(), false),
    };

    Ok(Json(serde_json::json!({
        "accessory": snapshot,
        "characteristics": characteristics,
        "host_reachable": host_reachable,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessory::host::generate_accessory_id;
    use crate::models::{DeviceRecord, TagManager};
    use crate::wirelesstag::client::TagSource;

    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct EmptySource;

    #[async_trait]
    impl TagSource for EmptySource {
        async fn fetch_tag_list(&self, _mac: &str) -> Result<Vec<DeviceRecord>, BridgeError> {
            Ok(vec![])
        }
    }

    async fn setup() -> Router {
        let reconciler = Arc::new(Reconciler::new(Arc::new(LocalBridge::new())));
        reconciler
            .reconcile(
                &DeviceRecord {
                    uuid: "u1".to_string(),
                    name: "Fridge".to_string(),
                    mac: None,
                    temperature: Some(4.2),
                    device_type: None,
                },
                "kitchen",
            )
            .await
            .unwrap();

        let poller = Arc::new(Poller::new(
            Arc::new(EmptySource),
            reconciler.clone(),
            vec![TagManager {
                name: "kitchen".to_string(),
                mac: "AA:BB".to_string(),
            }],
            Duration::from_secs(20),
        ));

        routes(ApiState { reconciler, poller })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(setup().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_accessories() {
        let (status, body) = get_json(setup().await, "/api/accessories").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["display_name"], "Fridge");
        assert_eq!(body[0]["reading"], 4.2);
    }

    #[tokio::test]
    async fn test_get_accessory_with_characteristics() {
        let id = generate_accessory_id("u1");
        let (status, body) =
            get_json(setup().await, &format!("/api/accessories/{}", id)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accessory"]["manager"], "kitchen");
        assert_eq!(body["characteristics"]["current_temperature"], 4.2);
        assert_eq!(body["characteristics"]["serial_number"], "u1");
        assert_eq!(body["host_reachable"], true);
    }

    #[tokio::test]
    async fn test_get_unknown_accessory() {
        let (status, body) = get_json(setup().await, "/api/accessories/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_status() {
        let (status, body) = get_json(setup().await, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tag_managers"][0], "kitchen");
        assert_eq!(body["interval_ms"], 20000);
        assert_eq!(body["accessory_count"], 1);
        assert_eq!(body["registered_count"], 1);
        assert!(body["last_cycle"].is_null());
    }
}
