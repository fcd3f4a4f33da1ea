//! HTTP-level tests driving the router directly

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use platform::{InMemoryPlatform, PlatformClient};
use serde_json::{json, Value};
use shared::{NullLogger, VmsConfig};
use tower::ServiceExt;
use vms_adapter::in_memory_store;
use vms_core::{ActorManifest, VmsCore};
use vms_server::build_router;

struct TestApp {
    router: axum::Router,
    platform: Arc<InMemoryPlatform>,
}

fn app() -> TestApp {
    let platform = Arc::new(InMemoryPlatform::new());
    let client: Arc<dyn PlatformClient> = platform.clone();
    let core = VmsCore::from_config(
        &VmsConfig::default(),
        in_memory_store(),
        Some(client),
        ActorManifest::builtin(),
        Arc::new(NullLogger),
    )
    .unwrap();
    TestApp {
        router: build_router(Arc::new(core)),
        platform,
    }
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, company: Option<&str>, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(format!("/api/v1{uri}"));
        if let Some(company) = company {
            request = request.header("x-company-id", company);
        }
        if let Some(user) = user {
            request = request.header("x-user-id", user);
        }
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({ "raw": String::from_utf8_lossy(&bytes) }));
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some("acme"), None, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some("acme"), Some("desk"), Some(body)).await
    }

    async fn employee(&self, name: &str) -> String {
        let (status, body) = self
            .post("/employees", json!({ "name": name, "email": format!("{}@acme.test", name.to_lowercase()) }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["record"]["id"].as_str().unwrap().to_string()
    }

    async fn visitor(&self, name: &str, visitor_type: &str) -> String {
        let (status, body) = self
            .post(
                "/visitors",
                json!({
                    "name": name,
                    "email": format!("{}@example.com", name.to_lowercase()),
                    "visitorType": visitor_type,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["visitor"]["id"].as_str().unwrap().to_string()
    }

    async fn visit(&self, visitor_id: &str, host_id: &str) -> Value {
        let start = Utc::now();
        let (status, body) = self
            .post(
                "/visits",
                json!({
                    "visitorId": visitor_id,
                    "hostEmployeeId": host_id,
                    "locationId": "lobby",
                    "scheduledStart": start,
                    "scheduledEnd": start + Duration::hours(2),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }
}

// ============== Envelope Tests ==============

#[tokio::test]
async fn test_health_needs_no_tenant() {
    let app = app();
    let (status, body) = app.call("GET", "/health", None, None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["platform"], true);
}

#[tokio::test]
async fn test_missing_company_header() {
    let app = app();
    let (status, body) = app.call("GET", "/visitors", None, None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("X-Company-Id"));
}

#[tokio::test]
async fn test_unknown_visitor_is_404() {
    let app = app();
    let (status, body) = app.get("/visitors/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_invalid_email_is_422() {
    let app = app();
    let (status, _) = app.post("/visitors", json!({ "name": "Alice", "email": "nope" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ============== Visitor Tests ==============

#[tokio::test]
async fn test_register_and_fetch_visitor() {
    let app = app();
    let id = app.visitor("Alice", "guest").await;

    let (status, body) = app.get(&format!("/visitors/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Alice");
    assert_eq!(body["data"]["syncState"], "local");
}

#[tokio::test]
async fn test_companies_are_isolated() {
    let app = app();
    let id = app.visitor("Alice", "guest").await;

    let (status, _) = app
        .call("GET", &format!("/visitors/{id}"), Some("globex"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_watchlisted_visitor_is_403() {
    let app = app();
    let (status, _) = app
        .post("/watchlist", json!({ "name": "Mallory", "reason": "trespass", "severity": "block" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post("/visitors", json!({ "name": "Mallory" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (_, audit) = app.get("/audit?limit=5").await;
    assert_eq!(audit["data"]["entries"][0]["eventType"], "watchlist_hit");
}

#[tokio::test]
async fn test_export_and_erase_visitor() {
    let app = app();
    let id = app.visitor("Alice", "guest").await;

    let (status, export) = app.get(&format!("/visitors/{id}/export")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["data"]["visitor"]["id"], id.as_str());

    let (status, erased) = app.post(&format!("/visitors/{id}/erase"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(erased["data"]["record"]["erasedAt"].is_string());

    let (status, _) = app.post(&format!("/visitors/{id}/erase"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

// ============== Visit Tests ==============

#[tokio::test]
async fn test_visit_lifecycle() {
    let app = app();
    let host = app.employee("Grace").await;
    let visitor = app.visitor("Alice", "guest").await;
    let visit = app.visit(&visitor, &host).await;
    let visit_id = visit["id"].as_str().unwrap();
    assert_eq!(visit["status"], "scheduled");

    let (status, body) = app.post(&format!("/visits/{visit_id}/check-in"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["badgeNumber"].as_str().unwrap().starts_with("B-"));

    let (_, on_site) = app.get("/visits/on-site?locationId=lobby").await;
    assert_eq!(on_site["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.post(&format!("/visits/{visit_id}/check-out"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "checked_out");

    let (status, _) = app.post(&format!("/visits/{visit_id}/cancel"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_contractor_approval_flow() {
    let app = app();
    let host = app.employee("Grace").await;
    let visitor = app.visitor("Bob", "contractor").await;
    let visit = app.visit(&visitor, &host).await;
    assert_eq!(visit["status"], "pending_approval");

    let (_, approvals) = app.get(&format!("/approvals?approver={host}")).await;
    let approval_id = approvals["data"][0]["id"].as_str().unwrap().to_string();

    let decision = json!({ "approve": true });
    let (status, _) = app
        .call("POST", &format!("/approvals/{approval_id}/decision"), Some("acme"), Some("intruder"), Some(decision.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("POST", &format!("/approvals/{approval_id}/decision"), Some("acme"), Some(host.as_str()), Some(decision))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");

    let (_, visit) = app.get(&format!("/visits/{}", visit["id"].as_str().unwrap())).await;
    assert_eq!(visit["data"]["status"], "approved");
}

#[tokio::test]
async fn test_walk_in_and_evacuation() {
    let app = app();
    let host = app.employee("Grace").await;
    let visitor = app.visitor("Alice", "guest").await;
    let start = Utc::now();
    let (status, _) = app
        .post(
            "/visits/walk-in",
            json!({
                "visitorId": visitor,
                "hostEmployeeId": host,
                "scheduledStart": start,
                "scheduledEnd": start + Duration::hours(1),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, evacuation) = app.post("/evacuations", json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    let evacuation_id = evacuation["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(evacuation["data"]["roll"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .post(&format!("/evacuations/{evacuation_id}/account"), json!({ "personId": visitor }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = app.post(&format!("/evacuations/{evacuation_id}/close"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["data"]["accounted"], 1);

    let (_, active) = app.get("/evacuations/active").await;
    assert!(active["data"].is_null());
}

#[tokio::test]
async fn test_visit_report() {
    let app = app();
    let host = app.employee("Grace").await;
    let visitor = app.visitor("Alice", "guest").await;
    app.visit(&visitor, &host).await;

    let from = (Utc::now() - Duration::hours(1)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let to = (Utc::now() + Duration::hours(3)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let (status, body) = app.get(&format!("/reports/visits?from={from}&to={to}")).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total"], 1);
}

// ============== Federation Tests ==============

#[tokio::test]
async fn test_residency_switch() {
    let app = app();
    let (status, body) = app
        .call("PUT", "/residency/visitors", Some("acme"), Some("admin"), Some(json!({ "mode": "platform" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["mode"], "platform");

    let (_, all) = app.get("/residency").await;
    assert_eq!(all["data"]["visitor"]["mode"], "platform");
    assert_eq!(all["data"]["visitor"]["source"], "installation");

    let (status, _) = app
        .call("PUT", "/residency/badges", Some("acme"), None, Some(json!({ "mode": "platform" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_platform_outage_queues_writes() {
    let app = app();
    app.call("PUT", "/residency/visitor", Some("acme"), None, Some(json!({ "mode": "platform" })))
        .await;
    app.platform.set_available(false);

    let (status, body) = app.post("/visitors", json!({ "name": "Alice" })).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["delivery"]["status"], "queued");

    let (_, stats) = app.get("/sync/stats").await;
    assert_eq!(stats["data"]["pending"], 1);

    let (_, ops) = app.get("/sync/operations?status=pending").await;
    assert_eq!(ops["data"][0]["kind"]["type"], "create_actor");
}
