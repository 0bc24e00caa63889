mod common;

use axum::http::StatusCode;
use common::{TestApp, TestOptions};
use serde_json::{Value, json};
use snaplink::domain::entities::Tier;

async fn create(app: &TestApp, token: Option<&str>, url: &str, is_public: bool) -> String {
    let mut request = app
        .server
        .post("/api/urls")
        .json(&json!({ "url": url, "is_public": is_public }));
    if let Some(token) = token {
        request = request.add_header("Authorization", TestApp::bearer(token));
    }

    let response = request.await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_list_requires_token() {
    let app = TestApp::new();

    let response = app.server.get("/api/urls").await;

    response.assert_status_unauthorized();
    assert_eq!(response.header("www-authenticate"), "Bearer");
}

#[tokio::test]
async fn test_list_rejects_revoked_token() {
    let app = TestApp::new();
    let token = app.tokens.issue("dave-token", "dave", Tier::Authenticated);
    app.tokens.revoke_all();

    app.server
        .get("/api/urls")
        .add_header("Authorization", TestApp::bearer(&token))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_list_returns_own_links_newest_first() {
    let app = TestApp::new();
    let alice = app.tokens.issue("alice-token", "alice", Tier::Authenticated);
    let bob = app.tokens.issue("bob-token", "bob", Tier::Authenticated);

    let first = create(&app, Some(&alice), "https://example.com/1", true).await;
    let second = create(&app, Some(&alice), "https://example.com/2", false).await;
    let third = create(&app, Some(&alice), "https://example.com/3", true).await;
    create(&app, Some(&bob), "https://example.com/bob", true).await;
    create(&app, None, "https://example.com/anon", true).await;

    let response = app
        .server
        .get("/api/urls")
        .add_header("Authorization", TestApp::bearer(&alice))
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["total"], 3);
    assert_eq!(json["page"], 1);
    assert_eq!(json["page_size"], 20);

    let codes: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec![third.as_str(), second.as_str(), first.as_str()]);
}

#[tokio::test]
async fn test_list_pagination() {
    let app = TestApp::new();
    let alice = app.tokens.issue("alice-token", "alice", Tier::Authenticated);

    for i in 0..5 {
        create(&app, Some(&alice), &format!("https://example.com/{i}"), true).await;
    }

    let json = app
        .server
        .get("/api/urls?page=2&page_size=2")
        .add_header("Authorization", TestApp::bearer(&alice))
        .await
        .json::<Value>();

    assert_eq!(json["total"], 5);
    assert_eq!(json["items"].as_array().unwrap().len(), 2);

    app.server
        .get("/api/urls?page=0")
        .add_header("Authorization", TestApp::bearer(&alice))
        .await
        .assert_status_bad_request();

    app.server
        .get("/api/urls?page_size=500")
        .add_header("Authorization", TestApp::bearer(&alice))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_lookup_public_link() {
    let app = TestApp::new();
    let code = create(&app, None, "https://example.com/public", true).await;

    let response = app.server.get(&format!("/api/urls/{code}")).await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["code"], code);
    assert_eq!(json["destination"], "https://example.com/public");
    assert!(response.headers().contains_key("x-ratelimit-limit"));
}

#[tokio::test]
async fn test_lookup_private_link_only_for_owner() {
    let app = TestApp::new();
    let alice = app.tokens.issue("alice-token", "alice", Tier::Authenticated);
    let bob = app.tokens.issue("bob-token", "bob", Tier::Authenticated);
    let code = create(&app, Some(&alice), "https://example.com/secret", false).await;
    let path = format!("/api/urls/{code}");

    app.server.get(&path).await.assert_status_not_found();

    app.server
        .get(&path)
        .add_header("Authorization", TestApp::bearer(&bob))
        .await
        .assert_status_not_found();

    let response = app
        .server
        .get(&path)
        .add_header("Authorization", TestApp::bearer(&alice))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["owner"], "alice");
}

#[tokio::test]
async fn test_lookup_limit() {
    let app = TestApp::build(TestOptions {
        lookup_limit: 2,
        ..TestOptions::default()
    });
    let code = create(&app, None, "https://example.com/popular", true).await;
    let path = format!("/api/urls/{code}");

    app.server.get(&path).await.assert_status_ok();
    app.server.get("/api/urls/zzzzzzzz").await.assert_status_not_found();

    let response = app.server.get(&path).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header("x-ratelimit-limit"), "2");
    assert!(response.headers().contains_key("retry-after"));

    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "rate_limited");
    assert_eq!(json["error"]["details"]["limit"], 2);

    // Other callers keep their own budget.
    app.server
        .get(&path)
        .add_header("X-Forwarded-For", "203.0.113.50")
        .await
        .assert_status_ok();
}
