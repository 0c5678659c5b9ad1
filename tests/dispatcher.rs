mod common;

use astra_data_api::{
    operations, CancellationToken, Command, CommandOptions, DataApiError, DataAndStatus,
    HttpRequest, HttpResponse, ServiceTransport, TimeoutOptions, TransportError, UrlTarget,
    ValueConverter,
};
use common::test_helpers::{options, FakeTransport, ENDPOINT};
use http::{header, HeaderValue, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn find_collections() -> Command {
    Command::new(operations::FIND_COLLECTIONS, UrlTarget::data(ENDPOINT))
        .layer(Arc::new(options()))
}

#[tokio::test]
async fn status_response_round_trips() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"ok": 1}}));
    let status: Value = fake.dispatcher().status(find_collections()).await.unwrap();
    assert_eq!(status, json!({"ok": 1}));
}

#[tokio::test]
async fn named_envelope_url_and_headers() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"insertedIds": ["a"]}}));
    let command = Command::new(operations::INSERT_ONE, UrlTarget::data_path(ENDPOINT, ["users"]))
        .layer(Arc::new(options()))
        .payload(&json!({"document": {"_id": "a"}}))
        .unwrap();
    let _: Value = fake.dispatcher().status(command).await.unwrap();

    let request = &fake.requests()[0];
    assert_eq!(request.method, http::Method::POST);
    assert_eq!(request.url, format!("{ENDPOINT}/api/json/v1/app/users"));
    assert_eq!(request.headers.get("token").unwrap(), "AstraCS:test");
    assert_eq!(request.headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    assert!(request.headers.get(header::USER_AGENT).unwrap().to_str().unwrap().starts_with("astra-data-api-rust/"));
    assert_eq!(fake.bodies()[0], json!({"insertOne": {"document": {"_id": "a"}}}));
}

#[tokio::test]
async fn data_and_status_shape() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Docs {
        documents: Vec<Value>,
    }

    let fake = FakeTransport::new();
    fake.push_json(200, json!({"data": {"documents": [{"a": 1}]}, "status": {"sortVector": [0.5]}}));
    let found: DataAndStatus<Docs, Value> = fake
        .dispatcher()
        .data(Command::new(operations::FIND, UrlTarget::data_path(ENDPOINT, ["c"])).layer(Arc::new(options())))
        .await
        .unwrap();
    assert_eq!(found.data.documents, vec![json!({"a": 1})]);
    assert_eq!(found.status, Some(json!({"sortVector": [0.5]})));
}

#[tokio::test]
async fn structured_errors_become_service_errors() {
    let fake = FakeTransport::new();
    fake.push_json(
        200,
        json!({
            "errors": [
                {"message": "Collection already exists", "errorCode": "EXISTING_COLLECTION_DIFFERENT_SETTINGS"},
                {"message": "second"}
            ],
            "status": {"insertedIds": ["x"]}
        }),
    );
    let err = fake.dispatcher().status::<Value>(find_collections()).await.unwrap_err();
    match &err {
        DataApiError::Service { status, errors, partial, .. } => {
            assert_eq!(*status, 200);
            assert_eq!(errors.len(), 2);
            assert_eq!(partial.as_ref().unwrap()["status"]["insertedIds"], json!(["x"]));
        }
        other => panic!("expected service error, got {other:?}"),
    }
    assert_eq!(err.error_codes(), vec!["EXISTING_COLLECTION_DIFFERENT_SETTINGS"]);
    assert!(err.to_string().contains("second"));
}

#[tokio::test]
async fn non_success_without_json_keeps_body_text() {
    let fake = FakeTransport::new();
    fake.push(HttpResponse::new(StatusCode::BAD_GATEWAY, "upstream unavailable"));
    let err = fake.dispatcher().status::<Value>(find_collections()).await.unwrap_err();
    match err {
        DataApiError::Service { status, errors, .. } => {
            assert_eq!(status, 502);
            assert_eq!(errors[0].message, "upstream unavailable");
        }
        other => panic!("expected service error, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_error_response_synthesizes_detail() {
    let fake = FakeTransport::new();
    fake.push(HttpResponse::new(StatusCode::UNAUTHORIZED, ""));
    let err = fake.dispatcher().status::<Value>(find_collections()).await.unwrap_err();
    assert_eq!(err.service_errors().unwrap()[0].message, "Unauthorized");
}

#[tokio::test]
async fn malformed_json_is_decode_error() {
    let fake = FakeTransport::new();
    fake.push(HttpResponse::new(StatusCode::OK, "{not json"));
    let err = fake.dispatcher().status::<Value>(find_collections()).await.unwrap_err();
    assert!(err.is_decode());
}

#[tokio::test]
async fn shape_mismatch_is_decode_error() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"count": "many"}}));
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Count {
        count: u64,
    }
    let err = fake.dispatcher().status::<Count>(find_collections()).await.unwrap_err();
    assert!(err.is_decode());
}

#[tokio::test]
async fn transport_failures_propagate() {
    let fake = FakeTransport::new();
    fake.push_error(TransportError::new("connection reset"));
    let err = fake.dispatcher().status::<Value>(find_collections()).await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn inspector_sees_headers_before_decoding() {
    let fake = FakeTransport::new();
    fake.push(
        HttpResponse::new(StatusCode::CREATED, "")
            .with_header(header::LOCATION, HeaderValue::from_static("https://x/databases/abc")),
    );
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    let command = find_collections().inspect(move |meta| {
        *slot.lock().unwrap() = Some((meta.status, meta.location().map(str::to_string)));
    });
    let body = fake.dispatcher().execute(command).await.unwrap();
    assert_eq!(body, Value::Null);
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some((StatusCode::CREATED, Some("https://x/databases/abc".to_string())))
    );
}

#[derive(Debug)]
struct Shout;

impl ValueConverter for Shout {
    fn convert(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, self.convert(v))).collect()),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.convert(v)).collect()),
            other => other,
        }
    }
}

#[tokio::test]
async fn converters_apply_at_the_serialization_boundary() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"name": "lower"}}));
    let layer = CommandOptions::new().output_converter(Arc::new(Shout)).input_converter(Arc::new(Shout));
    let command = find_collections().layer(Arc::new(layer)).json(json!({"name": "quiet"}));
    let status: Value = fake.dispatcher().status(command).await.unwrap();
    assert_eq!(status, json!({"name": "LOWER"}));
    assert_eq!(fake.bodies()[0], json!({"findCollections": {"name": "QUIET"}}));
}

#[tokio::test]
async fn cancelled_token_stops_before_sending() {
    let fake = FakeTransport::new();
    let token = CancellationToken::new();
    token.cancel();
    let command = find_collections().layer(Arc::new(CommandOptions::new().cancellation(token)));
    let err = fake.dispatcher().status::<Value>(command).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fake.request_count(), 0);
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let fake = FakeTransport::with_handler(|_| Ok(HttpResponse::json(StatusCode::OK, &json!({"status": {}}))))
        .with_random_delay(5_000, 5_000);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let started = Instant::now();
    let command = find_collections().layer(Arc::new(CommandOptions::new().cancellation(token)));
    let err = fake.dispatcher().status::<Value>(command).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn request_timeout_is_a_transport_timeout() {
    let fake = FakeTransport::with_handler(|_| Ok(HttpResponse::json(StatusCode::OK, &json!({"status": {}}))))
        .with_random_delay(1_000, 1_000);
    let layer = CommandOptions::new().timeouts(TimeoutOptions::new().request(Duration::from_millis(20)));
    let err = fake
        .dispatcher()
        .status::<Value>(find_collections().layer(Arc::new(layer)))
        .await
        .unwrap_err();
    match err {
        DataApiError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout, got {other:?}"),
    }
}

#[test]
fn blocking_path_is_independent_of_any_runtime() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"ok": 1}}));
    fake.push_json(400, json!({"errors": [{"message": "bad filter"}]}));
    let dispatcher = fake.dispatcher();
    let status: Value = dispatcher.status_blocking(find_collections()).unwrap();
    assert_eq!(status, json!({"ok": 1}));
    let err = dispatcher.status_blocking::<Value>(find_collections()).unwrap_err();
    assert_eq!(err.service_errors().unwrap()[0].message, "bad filter");
}

#[test]
fn blocking_path_observes_cancellation_after_response() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let fake = FakeTransport::with_handler(move |_| {
        trigger.cancel();
        Ok(HttpResponse::json(StatusCode::OK, &json!({"status": {}})))
    });
    let command = find_collections().layer(Arc::new(CommandOptions::new().cancellation(token)));
    let err = fake.dispatcher().status_blocking::<Value>(command).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fake.request_count(), 1);
}

#[tokio::test]
async fn tower_services_plug_in_as_transports() {
    let svc = tower::service_fn(|req: HttpRequest| async move {
        let echoed: Value = serde_json::from_slice(req.body.as_deref().unwrap_or(&b"null"[..])).unwrap();
        Ok::<_, TransportError>(HttpResponse::json(StatusCode::OK, &json!({"status": echoed})))
    });
    let dispatcher = astra_data_api::CommandDispatcher::with_transports(
        Arc::new(ServiceTransport::new(svc)),
        Arc::new(FakeTransport::new()),
    );
    let status: Value = dispatcher.status(find_collections()).await.unwrap();
    assert_eq!(status, json!({"findCollections": {}}));
}

#[tokio::test]
async fn dispatch_works_with_tracing_subscriber_installed() {
    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).with_test_writer().finish();
    let _guard = tracing::subscriber::set_default(subscriber);
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"warnings": [{"message": "deprecated"}]}}));
    let status: Value = fake.dispatcher().status(find_collections()).await.unwrap();
    assert_eq!(status["warnings"][0]["message"], "deprecated");
}
