//! Integration tests for cycle-autotag
//!
//! These tests run the real HTTP transport against a local stand-in for the
//! Cycle GraphQL endpoint and verify the full event flow end to end.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use cycle_autotag::config::AutotagConfig;
use cycle_autotag::integrations::{
    CycleClient, GraphQLTransport, HttpTransport, MissingTokenAuth, RetryConfig,
};
use cycle_autotag::processor::{
    CategoryRule, EventProcessor, InboundEvent, ProcessState, ReportStatus,
};
use cycle_autotag::AutotagError;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A request as seen by the fake endpoint
#[derive(Debug, Clone)]
struct Recorded {
    authorization: Option<String>,
    content_type: Option<String>,
    body: Value,
}

#[derive(Default)]
struct FakeCycle {
    responses: Mutex<VecDeque<(StatusCode, Value)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeCycle {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn queries(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.body["query"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

async fn graphql_handler(
    State(fake): State<Arc<FakeCycle>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.requests.lock().unwrap().push(Recorded {
        authorization: headers
            .get("authorization")
            .map(|v| v.to_str().unwrap().to_string()),
        content_type: headers
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_string()),
        body,
    });

    let (status, body) = fake
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "no response scripted" })));
    (status, Json(body))
}

/// Start the fake endpoint; returns its URL and shared state
async fn start_fake_cycle(responses: Vec<(StatusCode, Value)>) -> (String, Arc<FakeCycle>) {
    let fake = Arc::new(FakeCycle {
        responses: Mutex::new(responses.into_iter().collect()),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/graphql", post(graphql_handler))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/graphql", addr), fake)
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        delay: Duration::from_millis(50),
    }
}

fn feedback_doc(email: &str) -> Value {
    json!({ "data": { "node": {
        "id": "D1",
        "title": "Checkout fails",
        "doctype": { "id": "DT1", "name": "Feedback" },
        "assignee": { "id": "U1", "email": email, "firstName": "John", "lastName": "Doe" }
    } } })
}

mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_posts_query_and_variables_with_bearer_token() {
        let (url, fake) =
            start_fake_cycle(vec![(StatusCode::OK, json!({ "data": { "ok": true } }))]).await;
        let transport = HttpTransport::new(url, None).unwrap().with_token("secret");

        let body = transport
            .execute("query { ok }", json!({ "a": 1 }))
            .await
            .unwrap();
        assert_eq!(body, json!({ "data": { "ok": true } }));

        let requests = fake.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret"));
        assert!(requests[0]
            .content_type
            .as_deref()
            .unwrap()
            .starts_with("application/json"));
        assert_eq!(requests[0].body["query"], "query { ok }");
        assert_eq!(requests[0].body["variables"], json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn test_no_token_sends_empty_header_by_default() {
        let (url, fake) = start_fake_cycle(vec![(StatusCode::OK, json!({}))]).await;
        let transport = HttpTransport::new(url, None).unwrap();

        transport.execute("query { ok }", json!({})).await.unwrap();
        assert_eq!(fake.requests()[0].authorization.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_default_config_without_token_sends_empty_header() {
        let (url, fake) = start_fake_cycle(vec![(StatusCode::OK, json!({}))]).await;
        let mut config = AutotagConfig::new("W1", "ATTR", vec![]);
        config.endpoint = url;
        config.token_env = "CYCLE_AUTOTAG_INTEGRATION_TOKEN_UNSET".to_string();
        let transport = HttpTransport::from_config(&config).unwrap();

        transport.execute("query { ok }", json!({})).await.unwrap();
        assert_eq!(fake.requests()[0].authorization.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_no_token_can_omit_header() {
        let (url, fake) = start_fake_cycle(vec![(StatusCode::OK, json!({}))]).await;
        let transport = HttpTransport::new(url, None)
            .unwrap()
            .with_missing_token_auth(MissingTokenAuth::Omit);

        transport.execute("query { ok }", json!({})).await.unwrap();
        assert_eq!(fake.requests()[0].authorization, None);
    }

    #[tokio::test]
    async fn test_non_200_is_transport_error() {
        let (url, _fake) = start_fake_cycle(vec![(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": "busy" }),
        )])
        .await;
        let transport = HttpTransport::new(url, None).unwrap();

        let err = transport

            .execute("query { ok }", json!({}))

            .await

            .unwrap_err();
        assert_eq!(err.status, Some(503));
        assert!(err.cause.contains("busy"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(format!("http://{}/graphql", addr), None).unwrap();
        let err = transport
            .execute("query { ok }", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status, None);
    }
}

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_retries_then_succeeds_with_fixed_spacing() {
        let (url, fake) = start_fake_cycle(vec![
            (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            (StatusCode::BAD_GATEWAY, json!({})),
            (StatusCode::OK, json!({ "data": { "getProductBySlug": { "id": "W1" } } })),
        ])
        .await;
        let client = CycleClient::new(HttpTransport::new(url, None).unwrap())
            .with_retry_config(fast_retry());

        let start = Instant::now();
        let id = client.resolve_workspace_id("acme").await.unwrap();

        assert_eq!(id.as_deref(), Some("W1"));
        assert_eq!(fake.requests().len(), 3);
        // Two pauses of the configured delay
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_three_failures_exhaust_retries() {
        let (url, fake) = start_fake_cycle(vec![
            (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            (StatusCode::OK, json!({ "data": { "node": null } })),
        ])
        .await;
        let client = CycleClient::new(HttpTransport::new(url, None).unwrap())
            .with_retry_config(fast_retry());

        let err = client.fetch_document("D1").await.unwrap_err();
        assert!(matches!(err, AutotagError::RetryExhausted { attempts: 3, .. }));
        // No 4th attempt
        assert_eq!(fake.requests().len(), 3);
    }
}

mod processor_tests {
    use super::*;

    fn config(endpoint: &str) -> AutotagConfig {
        let mut config = AutotagConfig::new(
            "W1",
            "ATTR",
            vec![
                CategoryRule::new("R1", "Mobile", ["john@email.com", "jane@email.com"]),
                CategoryRule::new("R2", "Security", ["eric@email.com", "sara@email.com"]),
            ],
        );
        config.endpoint = endpoint.to_string();
        config.token_env = "CYCLE_AUTOTAG_INTEGRATION_TOKEN_UNSET".to_string();
        config.retry.delay_ms = 10;
        config
    }

    async fn processor(endpoint: &str) -> EventProcessor<HttpTransport> {
        let config = Arc::new(config(endpoint));
        let client = CycleClient::new(HttpTransport::from_config(&config).unwrap())
            .with_retry_config(config.retry_config());
        EventProcessor::from_config(config, client).await.unwrap()
    }

    #[tokio::test]
    async fn test_feedback_event_is_tagged() {
        let (url, fake) = start_fake_cycle(vec![
            (StatusCode::OK, feedback_doc("john@email.com")),
            (StatusCode::OK, json!({ "data": { "changeDocAttributeValue": {
                "__typename": "DocAttributeSingleSelect",
                "id": "A1",
                "value": { "id": "R1", "value": "Mobile" }
            } } })),
        ])
        .await;
        let processor = processor(&url).await;

        let report = processor.handle(&InboundEvent::doc_created("D1", "W1")).await;

        assert_eq!(report.status, ReportStatus::Updated);
        let queries = fake.queries();
        assert_eq!(queries.len(), 2);
        assert!(queries[0].contains("fetchDoc"));
        assert!(queries[1].contains("changeDocAttributeValue"));
        assert_eq!(
            fake.requests()[1].body["variables"],
            json!({
                "docId": "D1",
                "attributeDefinitionId": "ATTR",
                "value": { "select": "R1" }
            })
        );
    }

    #[tokio::test]
    async fn test_wrong_workspace_makes_no_request() {
        let (url, fake) = start_fake_cycle(vec![]).await;
        let processor = processor(&url).await;

        let report = processor.handle(&InboundEvent::doc_created("D1", "W2")).await;

        assert_eq!(report.status, ReportStatus::Skipped);
        assert_eq!(report.reason.as_deref(), Some("wrong workspace"));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_email_is_not_mutated() {
        let (url, fake) =
            start_fake_cycle(vec![(StatusCode::OK, feedback_doc("stranger@email.com"))]).await;
        let processor = processor(&url).await;

        let report = processor.handle(&InboundEvent::doc_created("D1", "W1")).await;

        assert_eq!(report.status, ReportStatus::Skipped);
        assert_eq!(fake.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_fail_the_event_without_raising() {
        let (url, fake) = start_fake_cycle(vec![
            (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
        ])
        .await;
        let processor = processor(&url).await;

        let report = processor.handle(&InboundEvent::doc_created("D1", "W1")).await;

        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.state, ProcessState::Validated);
        assert_eq!(report.error_kind, Some("retry_exhausted"));
        assert_eq!(fake.requests().len(), 3);
    }
}

mod config_tests {
    use super::*;
    use cycle_autotag::config::validate_config;

    #[test]
    fn test_sample_config_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        AutotagConfig::sample().save(&config_path).unwrap();
        let loaded = AutotagConfig::load(&config_path).unwrap();

        assert!(validate_config(&loaded).is_ok());
        assert_eq!(loaded.rules.len(), 4);
        assert_eq!(loaded.rules[0].label, "Mobile");
    }

    #[test]
    fn test_hand_written_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            r#"
workspace_slug: acme
attribute_definition_id: ATTR
send_empty_authorization: false
request_timeout_secs: 20
retry:
  max_attempts: 5
rules:
  - id: R1
    label: Mobile
    match_emails:
      - john@email.com
"#,
        )
        .unwrap();

        let config = AutotagConfig::load(&config_path).unwrap();
        assert!(validate_config(&config).is_ok());
        assert!(!config.send_empty_authorization);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(config.retry_config().max_attempts, 5);
        assert_eq!(config.retry_config().delay, Duration::from_millis(1000));
    }
}
