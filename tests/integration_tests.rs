//! Integration tests for the translation gateway
//!
//! These tests run the HTTP server on an ephemeral port, backed by a real
//! SQLite cache and a DeepL backend mocked with wiremock.

use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use translation_gateway::populator::PopulatorSettings;
use translation_gateway::ratelimit::{RateLimitConfig, TierLimits};
use translation_gateway::retry::RetryConfig;
use translation_gateway::server::{create_router, serve, AppState, ADMIN_KEY_HEADER, API_KEY_HEADER};
use translation_gateway::{
    DeepLBackend, ServiceSettings, SqliteStore, SystemClock, TranslationService,
};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

const ADMIN_KEY: &str = "admin-secret";

// ==================== Test Helpers ====================

/// DeepL stand-in that answers `"[LANG] text"` for whatever it is sent.
struct EchoTranslator;

impl Respond for EchoTranslator {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        let field = |name: &str| {
            body.split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == name)
                .map(|(_, value)| decode_form_value(value))
                .unwrap_or_default()
        };

        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "translations": [{
                "detected_source_language": "EN",
                "text": format!("[{}] {}", field("target_lang"), field("text"))
            }]
        }))
    }
}

fn decode_form_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).unwrap()
}

fn test_settings() -> ServiceSettings {
    ServiceSettings {
        rate_limits: RateLimitConfig {
            demo: TierLimits {
                per_minute: 3,
                per_hour: 20,
                per_day: 100,
            },
            paid: TierLimits::PAID,
        },
        throughput_per_second: 100,
        backend_timeout: Duration::from_secs(2),
        sub_batch_size: 5,
        population: PopulatorSettings {
            workers: 2,
            pacing_delay: Duration::ZERO,
            backend_timeout: Duration::from_secs(2),
            readiness_threshold: 10,
            retry: RetryConfig::new(1, Duration::ZERO),
        },
    }
}

struct TestApp {
    base_url: String,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    async fn post(&self, route: &str, body: Value) -> (u16, Value) {
        self.send(self.client.post(self.url(route)).json(&body)).await
    }

    async fn get(&self, route: &str) -> (u16, Value) {
        self.send(self.client.get(self.url(route))).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> (u16, Value) {
        let response = request.send().await.expect("request failed");
        let status = response.status().as_u16();
        let body = response.json().await.expect("response was not JSON");
        (status, body)
    }

    async fn wait_for_population(&self, lang: &str) -> Value {
        for _ in 0..400 {
            let (_, status) = self.get(&format!("/cache-status?lang={}", lang)).await;
            if status["populate_status"] != "started" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("population for {} did not finish", lang);
    }
}

async fn spawn_app_with_store(deepl: &MockServer, store: Arc<SqliteStore>) -> TestApp {
    let backend = DeepLBackend::new(
        &format!("{}/v2/translate", deepl.uri()),
        "test-deepl-key",
        Duration::from_secs(2),
    )
    .expect("client should build");

    let service = Arc::new(TranslationService::new(
        store,
        Arc::new(backend),
        Arc::new(SystemClock),
        test_settings(),
    ));
    let state = AppState {
        service,
        admin_key: Some(Arc::from(ADMIN_KEY)),
        trust_proxy_headers: false,
    };

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(serve(listener, create_router(state)));

    TestApp {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
    }
}

async fn spawn_app(deepl: &MockServer) -> TestApp {
    let store = SqliteStore::in_memory(Arc::new(SystemClock), chrono::Duration::hours(24))
        .await
        .expect("Failed to create store");
    spawn_app_with_store(deepl, Arc::new(store)).await
}

async fn mount_echo(deepl: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .and(header("Authorization", "DeepL-Auth-Key test-deepl-key"))
        .respond_with(EchoTranslator)
        .mount(deepl)
        .await;
}

// ==================== Translation Tests ====================

#[tokio::test]
async fn test_health_check() {
    let deepl = MockServer::start().await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app.get("/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_translate_then_serve_from_cache() {
    let deepl = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(EchoTranslator)
        .expect(1)
        .mount(&deepl)
        .await;
    let app = spawn_app(&deepl).await;

    let body = serde_json::json!({ "text": "Where is the library?", "target": "es" });
    let (status, first) = app.post("/translate", body.clone()).await;
    assert_eq!(status, 200);
    assert_eq!(first["success"], true);
    assert_eq!(first["cached"], false);
    assert_eq!(first["translation"], "[ES] Where is the library?");

    let (status, second) = app.post("/translate", body).await;
    assert_eq!(status, 200);
    assert_eq!(second["cached"], true);
    assert_eq!(second["priority"], false);
    assert_eq!(second["translation"], first["translation"]);
}

#[tokio::test]
async fn test_missing_text_is_bad_request() {
    let deepl = MockServer::start().await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app
        .post("/demo-translate", serde_json::json!({ "target": "ES" }))
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "no_text_provided");
}

#[tokio::test]
async fn test_unsupported_language_is_bad_request() {
    let deepl = MockServer::start().await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app
        .post(
            "/demo-translate",
            serde_json::json!({ "text": "Hi", "target": "tlh" }),
        )
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "unsupported_language");
}

#[tokio::test]
async fn test_demo_rate_limit_returns_429_with_headroom() {
    let deepl = MockServer::start().await;
    mount_echo(&deepl).await;
    let app = spawn_app(&deepl).await;

    for i in 0..3 {
        let (status, _) = app
            .post(
                "/demo-translate",
                serde_json::json!({ "text": format!("sentence {}", i), "target": "FR" }),
            )
            .await;
        assert_eq!(status, 200);
    }

    let (status, body) = app
        .post(
            "/demo-translate",
            serde_json::json!({ "text": "one too many", "target": "FR" }),
        )
        .await;

    assert_eq!(status, 429);
    assert_eq!(body["error"]["code"], "rate_limit_exceeded");
    assert_eq!(body["error"]["rate_limit"]["remaining"]["minute"], 0);
    assert_eq!(body["error"]["rate_limit"]["limits"]["per_minute"], 3);

    // Cached texts are still served
    let (status, cached) = app
        .post(
            "/demo-translate",
            serde_json::json!({ "text": "sentence 0", "target": "FR" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(cached["cached"], true);
}

#[tokio::test]
async fn test_api_key_selects_paid_tier() {
    let deepl = MockServer::start().await;
    mount_echo(&deepl).await;
    let app = spawn_app(&deepl).await;

    for i in 0..5 {
        let (status, _) = app
            .send(
                app.client
                    .post(app.url("/translate"))
                    .header(API_KEY_HEADER, "customer-key")
                    .json(&serde_json::json!({ "text": format!("paid {}", i), "target": "DE" })),
            )
            .await;
        assert_eq!(status, 200);
    }

    let (_, status) = app.get("/rate-limit-status?type=paid").await;
    assert_eq!(
        status["status"]["remaining"]["minute"],
        TierLimits::PAID.per_minute - 5
    );
    assert_eq!(status["endpoint_type"], "paid");
}

#[tokio::test]
async fn test_backend_auth_failure_maps_to_403() {
    let deepl = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&deepl)
        .await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app
        .post("/translate", serde_json::json!({ "text": "Hi", "target": "ES" }))
        .await;

    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "backend_auth_error");
}

#[tokio::test]
async fn test_backend_quota_failure_maps_to_429() {
    let deepl = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(ResponseTemplate::new(456).set_body_string("Quota exceeded"))
        .mount(&deepl)
        .await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app
        .post("/translate", serde_json::json!({ "text": "Hi", "target": "ES" }))
        .await;

    assert_eq!(status, 429);
    assert_eq!(body["error"]["code"], "backend_quota_exceeded");
}

#[tokio::test]
async fn test_backend_timeout_maps_to_502() {
    let deepl = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "translations": [{ "text": "late" }] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&deepl)
        .await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app
        .post("/translate", serde_json::json!({ "text": "Hi", "target": "ES" }))
        .await;

    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "backend_transient_error");
}

// ==================== Batch & Priority Cache Tests ====================

#[tokio::test]
async fn test_oversized_batch_rejected() {
    let deepl = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(EchoTranslator)
        .expect(0)
        .mount(&deepl)
        .await;
    let app = spawn_app(&deepl).await;

    let texts: Vec<String> = (0..51).map(|i| format!("text {}", i)).collect();
    let (status, body) = app
        .post(
            "/translate-batch",
            serde_json::json!({ "texts": texts, "target": "ES" }),
        )
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "batch_too_large");
}

#[tokio::test]
async fn test_populated_catalog_batch_uses_no_quota() {
    let deepl = MockServer::start().await;
    mount_echo(&deepl).await;
    let app = spawn_app(&deepl).await;

    let (status, populate) = app
        .send(
            app.client
                .post(app.url("/cache-populate"))
                .header(ADMIN_KEY_HEADER, ADMIN_KEY)
                .json(&serde_json::json!({ "target_lang": "ES" })),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(populate["status"], "started");

    let cache = app.wait_for_population("ES").await;
    assert_eq!(cache["populate_status"], "completed");
    assert_eq!(cache["tier1_count"], 15);
    assert_eq!(cache["tier2_count"], 31);
    assert_eq!(cache["ready"], true);

    let (status, body) = app
        .post(
            "/translate-batch",
            serde_json::json!({ "texts": ["Hello", "Goodbye", "Thank you"], "target": "ES" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 3);
    for result in results {
        assert_eq!(result["cached"], true);
        assert_eq!(result["priority"], true);
    }
    assert_eq!(results[0]["translation"], "[ES] Hello");

    let (_, limits) = app.get("/rate-limit-status?type=demo").await;
    assert_eq!(limits["status"]["remaining"]["minute"], 3);
    assert_eq!(limits["status"]["allowed"], true);
}

#[tokio::test]
async fn test_second_populate_does_not_restart_completed_job() {
    let deepl = MockServer::start().await;
    mount_echo(&deepl).await;
    let app = spawn_app(&deepl).await;
    let populate = || {
        app.send(
            app.client
                .post(app.url("/cache-populate"))
                .header(ADMIN_KEY_HEADER, ADMIN_KEY)
                .json(&serde_json::json!({ "target_lang": "fr" })),
        )
    };

    populate().await;
    app.wait_for_population("FR").await;
    let (status, again) = populate().await;

    assert_eq!(status, 200);
    assert_eq!(again["status"], "completed");
}

// ==================== Admin & Status Tests ====================

#[tokio::test]
async fn test_admin_endpoints_require_key() {
    let deepl = MockServer::start().await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app.get("/performance-metrics").await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = app
        .send(
            app.client
                .get(app.url("/performance-metrics"))
                .header(ADMIN_KEY_HEADER, "wrong"),
        )
        .await;
    assert_eq!(status, 401);

    let (status, _) = app
        .post("/cache-populate", serde_json::json!({ "target_lang": "ES" }))
        .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_performance_metrics_report_paths() {
    let deepl = MockServer::start().await;
    mount_echo(&deepl).await;
    let app = spawn_app(&deepl).await;

    let body = serde_json::json!({ "text": "Measure me", "target": "ES" });
    app.post("/demo-translate", body.clone()).await;
    app.post("/demo-translate", body).await;

    let (status, metrics) = app
        .send(
            app.client
                .get(app.url("/performance-metrics"))
                .header(ADMIN_KEY_HEADER, ADMIN_KEY),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(metrics["latency"]["backend_call"]["count"], 1);
    assert_eq!(metrics["latency"]["content_cache_hit"]["count"], 1);
    assert!(metrics["latency"]["priority_cache_hit"].is_null());
}

#[tokio::test]
async fn test_cache_status_reports_degraded_store() {
    let deepl = MockServer::start().await;
    let store = Arc::new(
        SqliteStore::in_memory(Arc::new(SystemClock), chrono::Duration::hours(24))
            .await
            .expect("Failed to create store"),
    );
    let app = spawn_app_with_store(&deepl, Arc::clone(&store)).await;

    store.close().await;
    let (status, body) = app.get("/cache-status?lang=ES").await;

    assert_eq!(status, 200);
    assert_eq!(body["cache_degraded"], true);
    assert_eq!(body["total_cached"], 0);
    assert_eq!(body["ready"], false);
    assert_eq!(body["populate_status"], "not_started");
}

#[tokio::test]
async fn test_rate_limit_status_rejects_unknown_type() {
    let deepl = MockServer::start().await;
    let app = spawn_app(&deepl).await;

    let (status, body) = app.get("/rate-limit-status?type=gold").await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rate_limit_status_is_read_only() {
    let deepl = MockServer::start().await;
    let app = spawn_app(&deepl).await;

    for _ in 0..5 {
        app.get("/rate-limit-status").await;
    }
    let (status, body) = app.get("/rate-limit-status").await;

    assert_eq!(status, 200);
    assert_eq!(body["ip_address"], "127.0.0.1");
    assert_eq!(body["status"]["remaining"]["minute"], 3);
}

// ==================== Persistence Tests ====================

#[tokio::test]
async fn test_content_cache_survives_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", temp_dir.path().join("cache.db").display());

    let deepl = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/translate"))
        .respond_with(EchoTranslator)
        .expect(1)
        .mount(&deepl)
        .await;

    let body = serde_json::json!({ "text": "Persistent phrase", "target": "IT" });
    {
        let store = SqliteStore::connect(&url, Arc::new(SystemClock), chrono::Duration::hours(24))
            .await
            .expect("Failed to open store");
        let app = spawn_app_with_store(&deepl, Arc::new(store)).await;
        let (_, first) = app.post("/demo-translate", body.clone()).await;
        assert_eq!(first["cached"], false);
    }

    let store = SqliteStore::connect(&url, Arc::new(SystemClock), chrono::Duration::hours(24))
        .await
        .expect("Failed to reopen store");
    let app = spawn_app_with_store(&deepl, Arc::new(store)).await;
    let (_, second) = app.post("/demo-translate", body).await;

    assert_eq!(second["cached"], true);
    assert_eq!(second["translation"], "[IT] Persistent phrase");
}

#[test]
fn test_decode_form_value() {
    assert_eq!(decode_form_value("Where+is%3F"), "Where is?");
    assert_eq!(decode_form_value("plain"), "plain");
}
