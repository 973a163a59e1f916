//! HTTP surface
//!
//! Two endpoints carry the product traffic:
//!
//! - `POST /send` accepts an envelope and parks it on the ingress queue
//!   (202; routing happens asynchronously).
//! - `GET /messages` drains the caller's stored backlog: respond first,
//!   delete asynchronously. The duplicate-exposure window this opens is
//!   accepted; clients de-dup on `messageId`.
//!
//! `/healthz` and `/metrics` serve the operational plane. Error bodies
//! are plain-text diagnostics.

use crate::envelope::SecureEnvelope;
use crate::ingest::IngestionProducer;
use crate::metrics;
use crate::store::MessageStore;
use crate::urn::{self, Urn};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

const USER_ID_HEADER: &str = "x-user-id";

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub producer: Arc<dyn IngestionProducer>,
    pub store: Arc<dyn MessageStore>,
}

/// Assemble the service router with CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)]);

    Router::new()
        .route("/send", post(send_envelope))
        .route("/messages", get(drain_messages))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /send`: accept an envelope for asynchronous routing
async fn send_envelope(State(state): State<AppState>, body: Bytes) -> Response {
    let envelope: SecureEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "failed to decode request body");
            return (StatusCode::BAD_REQUEST, "Bad Request: malformed JSON").into_response();
        }
    };

    if envelope.recipient_id.is_zero() {
        return (StatusCode::BAD_REQUEST, "Bad Request: missing recipient").into_response();
    }

    match state.producer.publish(&envelope).await {
        Ok(()) => {
            metrics::try_record_ingested(1);
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to publish envelope to message bus");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// `GET /messages`: return the stored backlog, then delete it
/// asynchronously
async fn drain_messages(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(raw_user) = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::BAD_REQUEST,
            "Bad Request: missing X-User-ID header",
        )
            .into_response();
    };

    let user = match Urn::parse(raw_user) {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "rejecting unparsable X-User-ID header");
            return (StatusCode::BAD_REQUEST, "Bad Request: malformed X-User-ID").into_response();
        }
    };
    if user.is_zero() || user.entity_type() != urn::ENTITY_USER {
        return (
            StatusCode::BAD_REQUEST,
            "Bad Request: X-User-ID is not a user URN",
        )
            .into_response();
    }

    let envelopes = match state.store.retrieve_messages(&user).await {
        Ok(envelopes) => envelopes,
        Err(e) => {
            error!(user = %user, error = %e, "failed to retrieve stored messages");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    if envelopes.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let ids: Vec<String> = envelopes.iter().map(|e| e.message_id.clone()).collect();
    metrics::try_record_drained(ids.len() as u64);

    // The client has the messages once this response goes out; deletion
    // must not hold it up. A failed delete means duplicates on the next
    // poll, which clients de-dup by messageId.
    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        if let Err(e) = store.delete_messages(&user, &ids).await {
            error!(
                user = %user,
                count = ids.len(),
                error = %e,
                "failed to delete drained messages, client may see duplicates"
            );
        }
    });

    (StatusCode::OK, Json(envelopes)).into_response()
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ContractError;
    use crate::store::MemoryMessageStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::time::Duration;

    /// Producer that records envelopes and fails on demand
    #[derive(Default)]
    struct RecordingProducer {
        published: Mutex<Vec<SecureEnvelope>>,
        fail: bool,
    }

    #[async_trait]
    impl IngestionProducer for RecordingProducer {
        async fn publish(&self, envelope: &SecureEnvelope) -> Result<(), ContractError> {
            if self.fail {
                return Err(ContractError::Publish("broker down".into()));
            }
            self.published.lock().push(envelope.clone());
            Ok(())
        }
    }

    struct TestServer {
        addr: SocketAddr,
        producer: Arc<RecordingProducer>,
        store: Arc<MemoryMessageStore>,
        client: reqwest::Client,
    }

    async fn start_server(fail_publish: bool) -> TestServer {
        let producer = Arc::new(RecordingProducer {
            fail: fail_publish,
            ..Default::default()
        });
        let store = Arc::new(MemoryMessageStore::new());
        let app = build_router(AppState {
            producer: Arc::clone(&producer) as Arc<dyn IngestionProducer>,
            store: Arc::clone(&store) as Arc<dyn MessageStore>,
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            addr,
            producer,
            store,
            client: reqwest::Client::new(),
        }
    }

    fn bob() -> Urn {
        Urn::user("user-bob").unwrap()
    }

    fn envelope(id: &str) -> SecureEnvelope {
        SecureEnvelope {
            message_id: id.into(),
            sender_id: Urn::user("user-alice").unwrap(),
            recipient_id: bob(),
            ..Default::default()
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[tokio::test]
    async fn test_send_accepts_valid_envelope() {
        let server = start_server(false).await;
        let response = server
            .client
            .post(format!("http://{}/send", server.addr))
            .json(&envelope("msg-1"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        assert_eq!(server.producer.published.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_send_accepts_legacy_ids() {
        let server = start_server(false).await;
        let response = server
            .client
            .post(format!("http://{}/send", server.addr))
            .body(r#"{"senderId":"user-alice","recipientId":"user-bob"}"#)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        let published = server.producer.published.lock();
        assert_eq!(published[0].recipient_id, bob());
    }

    #[tokio::test]
    async fn test_send_rejects_malformed_json() {
        let server = start_server(false).await;
        let response = server
            .client
            .post(format!("http://{}/send", server.addr))
            .body("{ not-json }")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(
            server.producer.published.lock().is_empty(),
            "producer must not be called for malformed input"
        );
    }

    #[tokio::test]
    async fn test_send_rejects_missing_recipient() {
        let server = start_server(false).await;
        let response = server
            .client
            .post(format!("http://{}/send", server.addr))
            .body(r#"{"senderId":"user-alice"}"#)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_maps_publish_failure_to_500() {
        let server = start_server(true).await;
        let response = server
            .client
            .post(format!("http://{}/send", server.addr))
            .json(&envelope("msg-1"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_drain_returns_messages_then_deletes() {
        let server = start_server(false).await;
        server
            .store
            .store_messages(&bob(), &[envelope("msg-1"), envelope("msg-2")])
            .await
            .unwrap();

        let response = server
            .client
            .get(format!("http://{}/messages", server.addr))
            .header("X-User-ID", "urn:sm:user:user-bob")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Vec<SecureEnvelope> = response.json().await.unwrap();
        let mut ids: Vec<&str> = body.iter().map(|e| e.message_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["msg-1", "msg-2"]);

        // The delete is asynchronous; the store empties shortly after.
        let store = Arc::clone(&server.store);
        wait_for(move || store.count_for(&bob()) == 0).await;
    }

    #[tokio::test]
    async fn test_drain_legacy_header_equivalent_to_urn() {
        let server = start_server(false).await;
        server
            .store
            .store_messages(&bob(), &[envelope("msg-1")])
            .await
            .unwrap();

        let response = server
            .client
            .get(format!("http://{}/messages", server.addr))
            .header("X-User-ID", "user-bob")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Vec<SecureEnvelope> = response.json().await.unwrap();
        assert_eq!(body[0].message_id, "msg-1");
    }

    #[tokio::test]
    async fn test_drain_empty_backlog_is_204() {
        let server = start_server(false).await;
        let response = server
            .client
            .get(format!("http://{}/messages", server.addr))
            .header("X-User-ID", "user-bob")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_drain_missing_header_is_400() {
        let server = start_server(false).await;
        let response = server
            .client
            .get(format!("http://{}/messages", server.addr))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_drain_rejects_non_user_urn() {
        let server = start_server(false).await;
        for header_value in ["urn:sm:device:tablet-1", "urn:sm:user"] {
            let response = server
                .client
                .get(format!("http://{}/messages", server.addr))
                .header("X-User-ID", header_value)
                .send()
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                reqwest::StatusCode::BAD_REQUEST,
                "expected 400 for header '{header_value}'"
            );
        }
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let server = start_server(false).await;
        let response = server
            .client
            .request(
                reqwest::Method::OPTIONS,
                format!("http://{}/send", server.addr),
            )
            .header("Origin", "http://localhost:4200")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type,x-user-id")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let allowed = response
            .headers()
            .get("access-control-allow-headers")
            .unwrap()
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed.contains("x-user-id"));
    }

    #[tokio::test]
    async fn test_healthz() {
        let server = start_server(false).await;
        let response = server
            .client
            .get(format!("http://{}/healthz", server.addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let _ = crate::metrics::Metrics::init();
        let server = start_server(false).await;
        let response = server
            .client
            .get(format!("http://{}/metrics", server.addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.text().await.unwrap().contains("reitti_"));
    }
}
