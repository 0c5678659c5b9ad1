mod common;

use astra_data_api::{FindOptions, InsertManyOptions, TransportError, UpdateOptions};
use common::test_helpers::{options, FakeTransport, ENDPOINT};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    #[serde(rename = "_id")]
    id: String,
    name: String,
}

fn user(id: &str) -> Value {
    json!({"_id": id, "name": format!("user-{id}")})
}

#[tokio::test]
async fn find_pages_through_results_and_collects_sort_vectors() {
    let fake = FakeTransport::new();
    fake.push_json(
        200,
        json!({
            "data": {"documents": [user("1"), user("2")], "nextPageState": "p2"},
            "status": {"sortVector": [0.1, 0.2]}
        }),
    );
    fake.push_json(200, json!({"data": {"documents": [user("3")], "nextPageState": null}}));

    let users = fake.client(options()).database(ENDPOINT).collection::<User>("users");
    let find = FindOptions::new()
        .filter(json!({"active": true}))
        .vector_sort(&[0.1, 0.2])
        .include_sort_vector(true);
    let mut cursor = users.find(find, None);
    assert_eq!(fake.request_count(), 0);

    assert!(cursor.advance().await.unwrap());
    assert_eq!(cursor.current().unwrap().len(), 2);
    assert_eq!(cursor.sort_vector(), &[0.1, 0.2]);

    let rest: Vec<User> = Box::pin(cursor.into_stream()).map(Result::unwrap).collect().await;
    let ids: Vec<&str> = rest.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    let bodies = fake.bodies();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0]["find"]["options"].get("pageState").is_none());
    assert_eq!(bodies[1]["find"]["options"]["pageState"], "p2");
    assert_eq!(bodies[0]["find"]["sort"], json!({"$vector": [0.1f32, 0.2f32]}));
    assert_eq!(fake.urls()[0], format!("{ENDPOINT}/api/json/v1/app/users"));
}

#[tokio::test]
async fn advancing_after_a_transport_error_resends_the_page_state() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"data": {"documents": [user("1")], "nextPageState": "p1"}}));
    fake.push_error(TransportError::new("connection reset"));
    fake.push_json(200, json!({"data": {"documents": [user("2")], "nextPageState": null}}));

    let users = fake.client(options()).database(ENDPOINT).collection::<User>("users");
    let mut cursor = users.find(FindOptions::new(), None);
    assert!(cursor.advance().await.unwrap());
    assert!(cursor.advance().await.unwrap_err().is_transport());
    assert!(cursor.advance().await.unwrap());
    assert_eq!(cursor.current().unwrap()[0].id, "2");

    let bodies = fake.bodies();
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[1]["find"]["options"]["pageState"], "p1");
    assert_eq!(bodies[2]["find"]["options"]["pageState"], "p1");
}

#[tokio::test]
async fn empty_first_page_ends_the_scan() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"data": {"documents": []}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<User>("users");
    let all = users.find(FindOptions::new(), None).collect_all().await.unwrap();
    assert!(all.is_empty());
    assert_eq!(fake.request_count(), 1);
}

#[tokio::test]
async fn find_errors_surface_through_the_stream() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"data": {"documents": [user("1")], "nextPageState": "p2"}}));
    fake.push_json(200, json!({"errors": [{"message": "invalid page state", "errorCode": "INVALID_PAGE_STATE"}]}));
    let users = fake.client(options()).database(ENDPOINT).collection::<User>("users");
    let items: Vec<_> = Box::pin(users.find(FindOptions::new(), None).into_stream()).collect().await;
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert_eq!(items[1].as_ref().unwrap_err().error_codes(), vec!["INVALID_PAGE_STATE"]);
}

#[tokio::test]
async fn insert_one_returns_the_inserted_id() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"insertedIds": ["u-1"]}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<User>("users");
    let result = users.insert_one(&User { id: "u-1".into(), name: "ada".into() }, None).await.unwrap();
    assert_eq!(result.inserted_id, json!("u-1"));
    assert_eq!(fake.bodies()[0], json!({"insertOne": {"document": {"_id": "u-1", "name": "ada"}}}));
}

#[tokio::test]
async fn find_one_returns_none_when_nothing_matches() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"data": {"document": null}}));
    fake.push_json(200, json!({"data": {"document": user("7")}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<User>("users");
    assert!(users.find_one(FindOptions::new(), None).await.unwrap().is_none());
    let found = users.find_one(FindOptions::new().filter(json!({"_id": "7"})), None).await.unwrap();
    assert_eq!(found.unwrap().id, "7");
}

#[tokio::test]
async fn update_many_follows_page_state_and_sums_counts() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"matchedCount": 20, "modifiedCount": 18, "nextPageState": "more"}}));
    fake.push_json(200, json!({"status": {"matchedCount": 5, "modifiedCount": 5}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<Value>("users");
    let result = users
        .update_many(json!({}), json!({"$set": {"seen": true}}), UpdateOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(result.matched_count, 25);
    assert_eq!(result.modified_count, 23);

    let bodies = fake.bodies();
    assert!(bodies[0]["updateMany"]["options"].get("pageState").is_none());
    assert_eq!(bodies[1]["updateMany"]["options"]["pageState"], "more");
}

#[tokio::test]
async fn update_one_reports_upserted_id() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"matchedCount": 0, "modifiedCount": 0, "upsertedId": "new"}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<Value>("users");
    let result = users
        .update_one(json!({"_id": "new"}), json!({"$set": {"a": 1}}), UpdateOptions::default().upsert(true), None)
        .await
        .unwrap();
    assert_eq!(result.upserted_id, Some(json!("new")));
    assert_eq!(fake.bodies()[0]["updateOne"]["options"]["upsert"], true);
}

#[tokio::test]
async fn delete_many_repeats_while_more_data() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"deletedCount": 20, "moreData": true}}));
    fake.push_json(200, json!({"status": {"deletedCount": 20, "moreData": true}}));
    fake.push_json(200, json!({"status": {"deletedCount": 3}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<Value>("users");
    let result = users.delete_many(json!({"stale": true}), None).await.unwrap();
    assert_eq!(result.deleted_count, 43);
    assert_eq!(fake.request_count(), 3);
}

#[tokio::test]
async fn counts_and_drop() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"count": 1000, "moreData": true}}));
    fake.push_json(200, json!({"status": {"count": 52000}}));
    fake.push_json(200, json!({"status": {"ok": 1}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<Value>("users");

    let exact = users.count_documents(json!({}), None).await.unwrap();
    assert_eq!(exact.count, 1000);
    assert!(exact.more_data);
    assert_eq!(users.estimated_document_count(None).await.unwrap(), 52000);
    users.drop(None).await.unwrap();

    let urls = fake.urls();
    assert_eq!(urls[2], format!("{ENDPOINT}/api/json/v1/app"));
    assert_eq!(fake.bodies()[2], json!({"deleteCollection": {"name": "users"}}));
}

#[tokio::test]
async fn insert_many_sends_chunks_and_keeps_input_order() {
    let fake = FakeTransport::with_handler(|request| {
        let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        let ids: Vec<Value> = body["insertMany"]["documents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|doc| doc["_id"].clone())
            .collect();
        Ok(astra_data_api::HttpResponse::json(
            http::StatusCode::OK,
            &json!({"status": {"insertedIds": ids}}),
        ))
    })
    .with_random_delay(0, 10);
    let users = fake.client(options()).database(ENDPOINT).collection::<Value>("users");
    let docs: Vec<Value> = (0..7).map(|i| json!({"_id": i})).collect();
    let result = users
        .insert_many(docs, InsertManyOptions::new().chunk_size(2).concurrency(3), None)
        .await
        .unwrap();
    assert_eq!(result.inserted_ids, (0..7).map(|i| json!(i)).collect::<Vec<_>>());
    assert_eq!(fake.request_count(), 4);
}

#[test]
fn blocking_cursor_iterates_every_page() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"data": {"documents": [user("1")], "nextPageState": "b"}}));
    fake.push_json(200, json!({"data": {"documents": [user("2")], "nextPageState": "c"}}));
    fake.push_json(200, json!({"data": {"documents": [user("3")]}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<User>("users");
    let names: Vec<String> = users
        .find(FindOptions::new(), None)
        .into_iter_blocking()
        .map(|u| u.unwrap().name)
        .collect();
    assert_eq!(names, vec!["user-1", "user-2", "user-3"]);
}

#[test]
fn blocking_writes_mirror_async_ones() {
    let fake = FakeTransport::new();
    fake.push_json(200, json!({"status": {"insertedIds": ["a"]}}));
    fake.push_json(200, json!({"status": {"deletedCount": 1}}));
    let users = fake.client(options()).database(ENDPOINT).collection::<Value>("users");
    let inserted = users.insert_one_blocking(&json!({"_id": "a"}), None).unwrap();
    assert_eq!(inserted.inserted_id, json!("a"));
    let deleted = users.delete_one_blocking(json!({"_id": "a"}), None).unwrap();
    assert_eq!(deleted.deleted_count, 1);
}
