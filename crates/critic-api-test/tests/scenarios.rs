//! End-to-end request scenarios against the sample domain.

use critic_api_test::fixtures;
use http::StatusCode;
use serde_json::json;

fn user(id: i64, name: &str, fullname: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "fullname": fullname,
        "email": format!("{}@e", &name[..1]),
        "status": status,
    })
}

#[tokio::test]
async fn single_get_with_field_selection() {
    let client = fixtures::client(Some(1));
    client
        .get("/api/v1/users/42?fields=name,email")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({
            "users": {"name": "alice", "email": "a@e", "is_partial": true}
        }));
}

#[tokio::test]
async fn multi_get_with_linked_users() {
    let client = fixtures::client(Some(1));
    let response = client
        .get("/api/v1/comments?review=7&include=users:limit=2")
        .send()
        .await;
    response.assert_status(StatusCode::OK);

    let body = response.json_value().unwrap();
    let comments = body["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 3);
    let authors: Vec<&serde_json::Value> = comments.iter().map(|c| &c["author"]).collect();
    assert_eq!(authors, [&json!(1), &json!(1), &json!(2)]);
    assert!(comments.iter().all(|c| c["review"] == json!(7)));

    assert_eq!(
        body["linked"],
        json!({"users": [
            user(1, "erin", "Erin", "current"),
            user(2, "frank", "Frank", "current"),
        ]})
    );
}

#[tokio::test]
async fn linked_limit_exceeded_through_transitive_references() {
    let client = fixtures::client(Some(1));
    let response = client
        .get("/api/v1/comments?review=7&include=users:limit=2,reviews")
        .send()
        .await;
    response.assert_status(StatusCode::OK);

    let body = response.json_value().unwrap();
    assert_eq!(body["linked"]["users"], json!("limited"));
    let reviews = body["linked"]["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["id"], 7);
    assert_eq!(reviews[0]["owners"], json!([3]));
}

#[tokio::test]
async fn post_creates_review() {
    let client = fixtures::client(Some(1));
    let response = client
        .post("/api/v1/reviews")
        .json(&json!({"repository": 5, "commits": [10, 11], "owners": [1]}))
        .send()
        .await;
    response.assert_status(StatusCode::OK).assert_json_eq(&json!({
        "reviews": {
            "id": 9,
            "state": "draft",
            "summary": "",
            "repository": 5,
            "owners": [1],
            "commits": [10, 11],
        }
    }));

    client
        .get("/api/v1/reviews/9?fields=state")
        .send()
        .await
        .assert_json_field("reviews.state", &json!("draft"));
}

#[tokio::test]
async fn invalid_id_is_path_error() {
    let client = fixtures::client(Some(1));
    let response = client.get("/api/v1/reviews/9999").send().await;
    response
        .assert_error(StatusCode::NOT_FOUND, "No such resource")
        .assert_json_field("invalid", &json!({"reviews": [9999]}));
}

#[tokio::test]
async fn redundant_context_is_usage_error() {
    let client = fixtures::client(Some(1));
    client
        .get("/api/v1/reviews/7/comments?review=8")
        .send()
        .await
        .assert_error(StatusCode::BAD_REQUEST, "Invalid API request")
        .assert_json_field("error.message", &json!("Conflicting reviews specified"));

    client
        .get("/api/v1/reviews/7/comments?review=7")
        .send()
        .await
        .assert_success();
}

#[tokio::test]
async fn incomplete_changeset_is_delayed() {
    let client = fixtures::client(Some(1));
    let response = client
        .get("/api/v1/changesets/55?only_if_complete=analysis,full")
        .send()
        .await;
    response.assert_error(StatusCode::ACCEPTED, "Resource temporarily unavailable");
    let message = response.json_value().unwrap()["error"]["message"].clone();
    assert!(message.as_str().unwrap().contains("full"));

    client
        .get("/api/v1/changesets/56?only_if_complete=analysis,full")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_json_field(
            "changesets.completion_level",
            &json!(["structure", "analysis", "full"]),
        );

    client
        .get("/api/v1/changesets/55?only_if_complete=everything")
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn version_documentation() {
    let client = fixtures::client(None);
    let response = client.get("/api/v1").send().await;
    response.assert_status(StatusCode::OK);
    let body = response.json_value().unwrap();
    assert_eq!(body["version"], "v1");
    assert_eq!(body["resources"]["changesets"]["methods"], json!(["GET"]));
    assert_eq!(
        body["resources"]["reviews"]["methods"],
        json!(["GET", "POST", "PUT", "DELETE"])
    );
}
