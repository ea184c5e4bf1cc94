//! Cross-cutting response properties.

use std::collections::BTreeSet;

use critic_api_test::fixtures::{self, USER_HEADER};
use critic_api_test::TestClient;
use http::StatusCode;
use proptest::prelude::*;
use serde_json::json;

const USER_FIELDS: [&str; 5] = ["id", "name", "fullname", "email", "status"];

fn selected(mask: u8) -> Vec<&'static str> {
    USER_FIELDS
        .iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, field)| *field)
        .collect()
}

async fn user_keys(client: &TestClient, fields: &[&str]) -> (BTreeSet<String>, bool) {
    let response = client
        .get(format!("/api/v1/users/42?fields={}", fields.join(",")))
        .send()
        .await;
    response.assert_status(StatusCode::OK);
    let body = response.json_value().unwrap();
    let object = body["users"].as_object().unwrap();
    let partial = object.get("is_partial") == Some(&json!(true));
    let keys = object
        .keys()
        .filter(|key| *key != "is_partial")
        .cloned()
        .collect();
    (keys, partial)
}

proptest! {
    #[test]
    fn field_selection_is_monotone(mask in 0u8..32, extra in 0usize..5) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let client = fixtures::client(Some(1));
            let fields = selected(mask);
            let (keys, partial) = user_keys(&client, &fields).await;

            if fields.is_empty() {
                assert_eq!(keys.len(), USER_FIELDS.len());
                assert!(!partial);
            } else {
                let expected: BTreeSet<String> = fields.iter().map(ToString::to_string).collect();
                assert_eq!(keys, expected);
                assert_eq!(partial, fields.len() < USER_FIELDS.len());
            }

            // Removing a selector never removes content.
            if fields.len() > 1 {
                let mut fewer = fields.clone();
                fewer.remove(extra % fields.len());
                let (fewer_keys, _) = user_keys(&client, &fewer).await;
                assert!(fewer_keys.is_subset(&keys));
            }
        });
    }
}

#[tokio::test]
async fn linked_lists_sorted_and_unique() {
    let client = fixtures::client(Some(1));
    let response = client
        .get("/api/v1/comments?include=users,reviews,repositories")
        .send()
        .await;
    response.assert_status(StatusCode::OK);
    let body = response.json_value().unwrap();

    for (resource_type, objects) in body["linked"].as_object().unwrap() {
        let ids: Vec<i64> = objects
            .as_array()
            .unwrap()
            .iter()
            .map(|object| object["id"].as_i64().unwrap())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted, "linked {resource_type} not sorted and unique");
    }
    assert_eq!(body["linked"]["users"].as_array().unwrap().len(), 3);
    assert_eq!(body["linked"]["reviews"].as_array().unwrap().len(), 2);
    assert_eq!(body["linked"]["repositories"], json!([
        {"id": 5, "name": "critic", "path": "/var/git/critic.git"}
    ]));
}

#[tokio::test]
async fn primary_objects_not_repeated_in_linked() {
    let client = fixtures::client(Some(1));
    let body = client
        .get("/api/v1/reviews/7/comments?include=comments,users")
        .send()
        .await
        .json_value()
        .unwrap();
    assert_eq!(body["comments"].as_array().unwrap().len(), 3);
    assert_eq!(body["linked"]["comments"], json!([]));
}

#[tokio::test]
async fn same_request_same_response() {
    let client = fixtures::client(Some(1));
    let first = client.get("/api/v1/reviews?include=users").send().await;
    let second = client.get("/api/v1/reviews?include=users").send().await;
    assert_eq!(first.json_value().unwrap(), second.json_value().unwrap());
    assert_ne!(first.request_id(), second.request_id());
}

#[tokio::test]
async fn paging_with_offset_and_count() {
    let client = fixtures::client(Some(1));
    let body = client
        .get("/api/v1/users?offset=1&count=2&fields=id")
        .send()
        .await
        .json_value()
        .unwrap();
    let ids: Vec<&serde_json::Value> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| &user["id"])
        .collect();
    assert_eq!(ids, [&json!(2), &json!(3)]);

    let body = client
        .get("/api/v1/users?count=2&fields=id")
        .send()
        .await
        .json_value()
        .unwrap();
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
    assert_eq!(body["users"][0]["id"], 1);

    client
        .get("/api/v1/users?count=0")
        .send()
        .await
        .assert_error(StatusCode::BAD_REQUEST, "Invalid API request");
    client
        .get("/api/v1/users?offset=18446744073709551615&count=2")
        .send()
        .await
        .assert_error(StatusCode::BAD_REQUEST, "Invalid API request");
}

#[tokio::test]
async fn static_output_format() {
    let client = fixtures::client(Some(1));
    let body = client
        .get("/api/v1/repositories/critic?output_format=static")
        .send()
        .await
        .json_value()
        .unwrap();
    assert_eq!(body["repositories"][0]["id"], 5);

    client
        .get("/api/v1/reviews/7?output_format=xml")
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nested_under_repository_by_name() {
    let client = fixtures::client(Some(1));
    let body = client
        .get("/api/v1/repositories/critic/reviews?fields=id")
        .send()
        .await
        .json_value()
        .unwrap();
    assert_eq!(
        body["reviews"],
        json!([{"id": 7, "is_partial": true}, {"id": 8, "is_partial": true}])
    );

    let body = client
        .get("/api/v1/reviews?repository=other")
        .send()
        .await
        .json_value()
        .unwrap();
    assert_eq!(body["reviews"], json!([]));
}

#[tokio::test]
async fn debug_payloads() {
    let client = fixtures::client(Some(1));
    let body = client
        .get("/api/v1/reviews/7?debug=dbqueries,tracing")
        .send()
        .await
        .json_value()
        .unwrap();
    assert!(body["debug"]["dbqueries"]["count"].as_u64().unwrap() > 0);
    assert!(body["debug"]["tracing"]["phases"].is_array());
}

#[tokio::test]
async fn unknown_user_header_is_rejected() {
    let client = fixtures::client(None);
    client
        .get("/api/v1/users")
        .header(USER_HEADER, "77")
        .send()
        .await
        .assert_error(StatusCode::FORBIDDEN, "Permission denied");
}
