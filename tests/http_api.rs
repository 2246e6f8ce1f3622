//! Integration tests for the HTTP surface.
//!
//! Each test serves the real router on a random port over an in-memory store
//! and drives it with a cookie-keeping reqwest client per user.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use tagged_todos::config::AppConfig;
use tagged_todos::service::TodoService;
use tagged_todos::store::Store;
use tagged_todos::web::{self, AppState};

/// Start an Axum server on a random port, return its base URL.
async fn start_server() -> String {
    let store = Arc::new(Store::new_memory().await.unwrap());
    let app = web::app(AppState::new(TodoService::new(store)), &AppConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

fn client() -> Client {
    Client::builder().cookie_store(true).build().unwrap()
}

/// Sign up `username` and return a client holding its session cookie.
async fn signed_up(base: &str, username: &str) -> Client {
    let client = client();
    let response = client
        .post(format!("{base}/signup"))
        .json(&json!({ "username": username, "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    client
}

async fn create_todo(client: &Client, base: &str, body: Value) -> Value {
    let response = client
        .post(format!("{base}/todos"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn listing(client: &Client, base: &str, query: &str) -> Value {
    let response = client
        .get(format!("{base}/todos{query}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

fn names(listing: &Value) -> Vec<String> {
    listing["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn signup_login_and_conflicts() {
    let base = start_server().await;
    signed_up(&base, "ann").await;

    let dup = client()
        .post(format!("{base}/signup"))
        .json(&json!({ "username": "ann", "password": "other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), StatusCode::CONFLICT);

    let bad = client()
        .post(format!("{base}/login"))
        .json(&json!({ "username": "ann", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

    let fresh = client();
    let ok = fresh
        .post(format!("{base}/login"))
        .json(&json!({ "username": "ann", "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let account: Value = ok.json().await.unwrap();
    assert_eq!(account["username"], "ann");
    assert!(account.get("password_digest").is_none());

    listing(&fresh, &base, "").await;
}

#[tokio::test]
async fn create_with_free_text_tags() {
    let base = start_server().await;
    let ann = signed_up(&base, "ann").await;

    let todo = create_todo(
        &ann,
        &base,
        json!({ "name": "Report", "tags": "Work, work,  Work , Urgent" }),
    )
    .await;
    let tag_names: Vec<&str> = todo["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tag_names, vec!["Urgent", "Work"]);

    let tags: Value = ann
        .get(format!("{base}/tags"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tags.as_array().unwrap().len(), 2);
    assert_eq!(tags[0]["color"], "#6c757d");

    let blank = ann
        .post(format!("{base}/todos"))
        .json(&json!({ "name": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn filters_sorts_and_tag_scope_compose() {
    let base = start_server().await;
    let ann = signed_up(&base, "ann").await;

    let a = create_todo(&ann, &base, json!({ "name": "alpha", "tags": "Work" })).await;
    create_todo(&ann, &base, json!({ "name": "Beta", "tags": "Home" })).await;
    let c = create_todo(&ann, &base, json!({ "name": "gamma", "tags": "Work" })).await;
    let work = a["tags"][0]["id"].as_i64().unwrap();

    ann.post(format!("{base}/todos/{}/toggle", c["id"]))
        .send()
        .await
        .unwrap();

    let all = listing(&ann, &base, "?filter=all&sort=newest&tags=").await;
    assert_eq!(names(&all), vec!["gamma", "Beta", "alpha"]);

    let by_name = listing(&ann, &base, "?sort=name_asc").await;
    assert_eq!(names(&by_name), vec!["alpha", "Beta", "gamma"]);

    let status = listing(&ann, &base, "?sort=status").await;
    assert_eq!(names(&status)[0], "gamma");

    let work_open = listing(
        &ann,
        &base,
        &format!("?filter=incomplete&sort=oldest&tags={work}"),
    )
    .await;
    assert_eq!(names(&work_open), vec!["alpha"]);

    let bogus = listing(&ann, &base, "?filter=bogus&sort=whatever&tags=").await;
    assert_eq!(bogus["params"]["filter"], "all");
    assert_eq!(bogus["params"]["sort"], "newest");
    assert_eq!(names(&bogus).len(), 3);
}

#[tokio::test]
async fn view_params_fall_back_to_session_until_logout() {
    let base = start_server().await;
    let ann = signed_up(&base, "ann").await;
    let a = create_todo(&ann, &base, json!({ "name": "alpha", "tags": "Work" })).await;
    create_todo(&ann, &base, json!({ "name": "beta" })).await;
    let work = a["tags"][0]["id"].as_i64().unwrap();

    listing(&ann, &base, &format!("?filter=incomplete&sort=oldest&tags={work}")).await;

    // No parameters: the remembered ones apply.
    let remembered = listing(&ann, &base, "").await;
    assert_eq!(remembered["params"]["filter"], "incomplete");
    assert_eq!(remembered["params"]["sort"], "oldest");
    assert_eq!(remembered["params"]["tag_ids"], json!([work]));
    assert_eq!(names(&remembered), vec!["alpha"]);

    // An explicitly empty selection clears the tag scope.
    let cleared = listing(&ann, &base, "?tags=").await;
    assert_eq!(cleared["params"]["tag_ids"], json!([]));
    assert_eq!(cleared["params"]["sort"], "oldest");
    assert_eq!(names(&cleared), vec!["alpha", "beta"]);

    let logout = ann.post(format!("{base}/logout")).send().await.unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    let after = ann.get(format!("{base}/todos")).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);

    ann.post(format!("{base}/login"))
        .json(&json!({ "username": "ann", "password": "secret" }))
        .send()
        .await
        .unwrap();
    let defaults = listing(&ann, &base, "").await;
    assert_eq!(defaults["params"]["filter"], "all");
    assert_eq!(defaults["params"]["sort"], "newest");
}

#[tokio::test]
async fn owners_are_isolated() {
    let base = start_server().await;
    let ann = signed_up(&base, "ann").await;
    let bob = signed_up(&base, "bob").await;

    let todo = create_todo(&ann, &base, json!({ "name": "Private", "tags": "Secret" })).await;
    let id = todo["id"].as_i64().unwrap();
    let tag_id = todo["tags"][0]["id"].as_i64().unwrap();

    assert!(names(&listing(&bob, &base, "").await).is_empty());

    let peek = bob.get(format!("{base}/todos/{id}")).send().await.unwrap();
    assert_eq!(peek.status(), StatusCode::NOT_FOUND);

    let edit = bob
        .put(format!("{base}/todos/{id}"))
        .json(&json!({ "name": "Hacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(edit.status(), StatusCode::NOT_FOUND);

    let rename = bob
        .put(format!("{base}/tags/{tag_id}"))
        .json(&json!({ "name": "Mine" }))
        .send()
        .await
        .unwrap();
    assert_eq!(rename.status(), StatusCode::NOT_FOUND);

    // Ann's tag id on Bob's todo links nothing, and scoping by it shows nothing.
    let bobs = create_todo(&bob, &base, json!({ "name": "Mine", "tag_ids": [tag_id] })).await;
    assert!(bobs["tags"].as_array().unwrap().is_empty());
    let scoped = listing(&bob, &base, &format!("?tags={tag_id}")).await;
    assert!(names(&scoped).is_empty());

    let still: Value = ann
        .get(format!("{base}/todos/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(still["name"], "Private");
}

#[tokio::test]
async fn tag_lifecycle_over_http() {
    let base = start_server().await;
    let ann = signed_up(&base, "ann").await;

    let created = ann
        .post(format!("{base}/tags"))
        .json(&json!({ "name": "Work", "color": "#FF0000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let tag: Value = created.json().await.unwrap();
    assert_eq!(tag["color"], "#ff0000");
    let tag_id = tag["id"].as_i64().unwrap();

    let again = ann
        .post(format!("{base}/tags"))
        .json(&json!({ "name": "work" }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::OK);

    let bad_color = ann
        .put(format!("{base}/tags/{tag_id}"))
        .json(&json!({ "name": "Work", "color": "red" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_color.status(), StatusCode::BAD_REQUEST);

    let todo = create_todo(&ann, &base, json!({ "name": "Report", "tag_ids": [tag_id] })).await;
    assert_eq!(todo["tags"][0]["id"], tag_id);

    let deleted = ann
        .delete(format!("{base}/tags/{tag_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let after: Value = ann
        .get(format!("{base}/todos/{}", todo["id"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(after["tags"].as_array().unwrap().is_empty());

    let gone = ann
        .delete(format!("{base}/todos/{}", todo["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NO_CONTENT);
}
