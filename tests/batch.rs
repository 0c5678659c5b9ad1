mod common;

use astra_data_api::{DataApiError, HttpResponse, InsertManyOptions};
use common::test_helpers::{options, FakeTransport, ENDPOINT};
use http::StatusCode;
use serde_json::{json, Value};

fn echo_ids(request: &astra_data_api::HttpRequest) -> Vec<Value> {
    let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
    body["insertMany"]["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["_id"].clone())
        .collect()
}

#[tokio::test]
async fn ordered_with_concurrency_is_rejected_before_any_request() {
    let fake = FakeTransport::new();
    let items = fake.client(options()).database(ENDPOINT).collection::<Value>("items");
    let docs: Vec<Value> = (0..4).map(|i| json!({"_id": i})).collect();
    let err = items
        .insert_many(docs, InsertManyOptions::new().ordered(true).concurrency(4), None)
        .await
        .unwrap_err();
    assert!(err.is_usage());
    assert_eq!(fake.request_count(), 0);
}

#[tokio::test]
async fn unordered_chunks_run_concurrently_and_results_keep_input_order() {
    let fake = FakeTransport::with_handler(|request| {
        Ok(HttpResponse::json(StatusCode::OK, &json!({"status": {"insertedIds": echo_ids(request)}})))
    })
    .with_random_delay(1, 25);
    let items = fake.client(options()).database(ENDPOINT).collection::<Value>("items");
    let docs: Vec<Value> = (0..10).map(|i| json!({"_id": format!("d{i}")})).collect();

    let result = items
        .insert_many(docs, InsertManyOptions::new().chunk_size(3).concurrency(2), None)
        .await
        .unwrap();

    let expected: Vec<Value> = (0..10).map(|i| json!(format!("d{i}"))).collect();
    assert_eq!(result.inserted_ids, expected);
    assert_eq!(fake.request_count(), 4);
    for body in fake.bodies() {
        assert_eq!(body["insertMany"]["options"]["ordered"], false);
    }
}

#[tokio::test]
async fn failed_chunk_reports_partial_batch_with_completed_ids() {
    let fake = FakeTransport::with_handler(|request| {
        let ids = echo_ids(request);
        if ids.contains(&json!(3)) {
            return Ok(HttpResponse::json(
                StatusCode::OK,
                &json!({"errors": [{"message": "duplicate", "errorCode": "DOCUMENT_ALREADY_EXISTS"}]}),
            ));
        }
        Ok(HttpResponse::json(StatusCode::OK, &json!({"status": {"insertedIds": ids}})))
    });
    let items = fake.client(options()).database(ENDPOINT).collection::<Value>("items");
    let docs: Vec<Value> = (0..6).map(|i| json!({"_id": i})).collect();

    let err = items
        .insert_many(docs, InsertManyOptions::new().chunk_size(2).concurrency(3), None)
        .await
        .unwrap_err();

    match err {
        DataApiError::PartialBatch { succeeded, failed, skipped, completed } => {
            assert_eq!(succeeded, vec![0, 2]);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].chunk, 1);
            assert_eq!(failed[0].error.error_codes(), vec!["DOCUMENT_ALREADY_EXISTS"]);
            assert!(skipped.is_empty());
            assert_eq!(completed, vec![json!(0), json!(1), json!(4), json!(5)]);
        }
        other => panic!("expected partial batch, got {other:?}"),
    }
}

#[tokio::test]
async fn ordered_insert_stops_after_first_failure() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"insertedIds": [0, 1]}}));
    fake.push_json(200, json!({"errors": [{"message": "boom"}]}));
    let items = fake.client(options()).database(ENDPOINT).collection::<Value>("items");
    let docs: Vec<Value> = (0..6).map(|i| json!({"_id": i})).collect();

    let err = items
        .insert_many(docs, InsertManyOptions::new().ordered(true).chunk_size(2), None)
        .await
        .unwrap_err();

    match err {
        DataApiError::PartialBatch { succeeded, failed, skipped, completed } => {
            assert_eq!(succeeded, vec![0]);
            assert_eq!(failed[0].chunk, 1);
            assert_eq!(skipped, vec![2]);
            assert_eq!(completed, vec![json!(0), json!(1)]);
        }
        other => panic!("expected partial batch, got {other:?}"),
    }
    assert_eq!(fake.request_count(), 2);
    assert_eq!(fake.bodies()[0]["insertMany"]["options"]["ordered"], true);
}

#[test]
fn blocking_insert_many_uses_worker_threads() {
    let fake = FakeTransport::with_handler(|request| {
        Ok(HttpResponse::json(StatusCode::OK, &json!({"status": {"insertedIds": echo_ids(request)}})))
    })
    .with_random_delay(1, 10);
    let items = fake.client(options()).database(ENDPOINT).collection::<Value>("items");
    let docs: Vec<Value> = (0..9).map(|i| json!({"_id": i})).collect();
    let result = items
        .insert_many_blocking(docs, InsertManyOptions::new().chunk_size(2).concurrency(3), None)
        .unwrap();
    assert_eq!(result.inserted_ids, (0..9).map(|i| json!(i)).collect::<Vec<_>>());
    assert_eq!(fake.request_count(), 5);
}
