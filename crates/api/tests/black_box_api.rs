use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use railview_api::app::{build_app, AppState};
use railview_events::{topics, EventBus, EventEnvelope, InMemoryEventBus};
use railview_core::{CityId, Coordinate, VehiclePosition};
use railview_processor::{Processor, ProcessorConfig};
use railview_state::{ScopeFrameStore, ScopeStoreConfig};

struct TestServer {
    base_url: String,
    bus: Arc<InMemoryEventBus>,
    processor: Arc<Processor>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same wiring as prod, with the in-memory bus standing in for the
        // stream server and an ephemeral port.
        let store = Arc::new(ScopeFrameStore::new(ScopeStoreConfig::default()));
        let bus = Arc::new(InMemoryEventBus::new());
        let processor = Processor::new(ProcessorConfig::default(), store.clone());
        processor.start(&bus);

        let app = build_app(AppState {
            store,
            metrics: None,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            bus,
            processor,
            handle,
        }
    }

    fn publish(&self, envelope: &EventEnvelope) {
        self.bus.publish(topics::EVENTS_NORMALIZED, envelope).unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.processor.stop();
        self.handle.abort();
    }
}

fn nyc_viewport() -> serde_json::Value {
    json!({
        "cityId": "nyc",
        "bbox": { "south": 40.7, "west": -74.02, "north": 40.76, "east": -73.96, "zoom": 12 }
    })
}

const NYC_SCOPE_ID: &str = "v1|nyc|40.7000|-74.0200|40.7600|-73.9600";

fn upsert_v1() -> EventEnvelope {
    EventEnvelope::upsert(
        CityId::new("nyc").unwrap(),
        "test",
        "2024-01-01T00:00:00Z".parse().unwrap(),
        VehiclePosition {
            id: "V1".to_string(),
            coordinate: Coordinate { lat: 40.75, lng: -73.98 },
            updated_at: "2024-01-01T00:00:00Z".parse().unwrap(),
            trip_id: None,
            route_id: None,
            bearing: None,
            speed_mps: None,
            status: None,
        },
    )
}

#[tokio::test]
async fn provision_new_scope_returns_201_with_empty_frame() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&nyc_viewport())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["scopeId"], NYC_SCOPE_ID);
    assert_eq!(body["frame"]["scopeId"], NYC_SCOPE_ID);
    assert_eq!(body["frame"]["cityId"], "nyc");
    assert_eq!(body["frame"]["vehicles"], json!([]));
}

#[tokio::test]
async fn zoom_is_not_part_of_scope_identity() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&nyc_viewport())
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let mut zoomed_out = nyc_viewport();
    zoomed_out["bbox"]["zoom"] = json!(5);
    let second = client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&zoomed_out)
        .send()
        .await
        .unwrap();

    // The frame already exists, so the re-provision reports 200.
    assert_eq!(second.status(), StatusCode::OK);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["scopeId"], NYC_SCOPE_ID);
}

#[tokio::test]
async fn inverted_bbox_is_rejected_with_details() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&json!({
            "cityId": "nyc",
            "bbox": { "south": 1, "west": 0, "north": 0, "east": 1 }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Invalid viewport request");

    let details = body["details"].as_array().unwrap();
    let north = details
        .iter()
        .find(|d| d["path"] == "bbox.north")
        .expect("expected a bbox.north detail");
    assert!(north["message"]
        .as_str()
        .unwrap()
        .contains("north must be >= south"));
}

#[tokio::test]
async fn out_of_range_bbox_is_clamped_and_quantized() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&json!({
            "cityId": "nyc",
            "bbox": { "south": -100, "west": -181, "north": 100, "east": 181 }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let bbox = &body["frame"]["bbox"];

    assert!((bbox["south"].as_f64().unwrap() - (-85.0511)).abs() < 1e-9);
    assert!((bbox["north"].as_f64().unwrap() - 85.0511).abs() < 1e-9);
    assert_eq!(bbox["west"].as_f64().unwrap(), -180.0);
    assert_eq!(bbox["east"].as_f64().unwrap(), 180.0);
}

#[tokio::test]
async fn upsert_then_retrieve_shows_the_vehicle_exactly_once() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&nyc_viewport())
        .send()
        .await
        .unwrap();

    srv.publish(&upsert_v1());

    let res = client
        .get(format!("{}/api/v1/trains", srv.base_url))
        .query(&[("scope", NYC_SCOPE_ID)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let vehicles = body["frame"]["vehicles"].as_array().unwrap();
    let v1_count = vehicles.iter().filter(|v| v["id"] == "V1").count();
    assert_eq!(vehicles.len(), 1);
    assert_eq!(v1_count, 1);
}

#[tokio::test]
async fn remove_drops_the_vehicle_from_the_frame() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&nyc_viewport())
        .send()
        .await
        .unwrap();

    srv.publish(&upsert_v1());
    srv.publish(&EventEnvelope::remove(
        CityId::new("nyc").unwrap(),
        "test",
        "2024-01-01T00:01:00Z".parse().unwrap(),
        "V1",
    ));

    let res = client
        .get(format!("{}/api/v1/trains", srv.base_url))
        .query(&[("scope", NYC_SCOPE_ID)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["frame"]["vehicles"], json!([]));
}

#[tokio::test]
async fn missing_scope_parameter_is_a_400() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for url in [
        format!("{}/api/v1/trains", srv.base_url),
        format!("{}/api/v1/trains?scope=", srv.base_url),
    ] {
        let res = client.get(url).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Missing or invalid scope parameter");
    }
}

#[tokio::test]
async fn unknown_scope_is_a_404() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/api/v1/trains", srv.base_url))
        .query(&[("scope", "v1|nowhere|0.0000|0.0000|1.0000|1.0000")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Scope not found");
}

#[tokio::test]
async fn external_scope_key_is_used_verbatim() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let mut body = nyc_viewport();
    body["externalScopeKey"] = json!("ops:wallboard:7");

    let res = client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["scopeId"], "ops:wallboard:7");

    let res = client
        .get(format!("{}/api/v1/trains", srv.base_url))
        .query(&[("scope", "ops:wallboard:7")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn scope_listing_reports_active_definitions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&nyc_viewport())
        .send()
        .await
        .unwrap();

    let res = client
        .get(format!("{}/api/v1/trains/scopes", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["scopes"][0]["id"], NYC_SCOPE_ID);
    assert_eq!(body["scopes"][0]["cityId"], "nyc");
}

#[tokio::test]
async fn health_metrics_and_openapi_respond() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/healthz", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let health: serde_json::Value = res.json().await.unwrap();
    assert_eq!(health["ok"], true);
    assert_eq!(health["service"], "railview-api");
    assert!(health["time"].is_string());

    let res = client
        .get(format!("{}/metrics", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/openapi.json", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let doc: serde_json::Value = res.json().await.unwrap();
    assert_eq!(doc["openapi"], "3.0.3");
}

#[tokio::test]
async fn invalid_stream_entries_do_not_disturb_frames() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/v1/trains/scopes", srv.base_url))
        .json(&nyc_viewport())
        .send()
        .await
        .unwrap();

    srv.bus
        .publish_raw(
            topics::EVENTS_NORMALIZED,
            &json!({ "schemaVersion": "1", "data": { "kind": "vehicle.teleport" } }),
        )
        .unwrap();
    srv.publish(&upsert_v1());

    let res = client
        .get(format!("{}/api/v1/trains", srv.base_url))
        .query(&[("scope", NYC_SCOPE_ID)])
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["frame"]["vehicles"].as_array().unwrap().len(), 1);
    assert_eq!(srv.processor.stats().events_invalid, 1);
}
