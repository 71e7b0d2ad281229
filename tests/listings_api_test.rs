mod common;

use axum::http::StatusCode;
use common::{assert_status, response_json, TestApp};
use kidsmarket_api::entities::listing::ListingStatus;
use rust_decimal::Decimal;
use serde_json::json;

fn new_listing_payload() -> serde_json::Value {
    json!({
        "title": "Balance bike",
        "price": "45.00",
        "category": "outdoor",
        "condition": "like-new",
        "age_range": "2-4",
        "location": "Hamburg",
        "description": "Red balance bike, barely ridden"
    })
}

#[tokio::test]
async fn create_requires_authentication() {
    let app = TestApp::spawn().await;
    let response = app
        .post_json("/api/v1/listings", None, new_listing_payload())
        .await;
    assert_status(&response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_then_fetch_listing() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("seller-1", "seller-1");

    let response = app
        .post_json("/api/v1/listings", Some(&token), new_listing_payload())
        .await;
    assert_status(&response, StatusCode::CREATED);
    let created = response_json(response).await;
    assert_eq!(created["title"], "Balance bike");
    assert_eq!(created["status"], "available");
    assert_eq!(created["seller_id"], "seller-1");
    // Price serializes as a decimal string.
    let price: Decimal = created["price"].as_str().unwrap().parse().unwrap();
    assert_eq!(price, Decimal::new(4500, 2));

    let id = created["id"].as_str().unwrap();
    let response = app.get(&format!("/api/v1/listings/{}", id), None).await;
    assert_status(&response, StatusCode::OK);
    let fetched = response_json(response).await;
    assert_eq!(fetched["id"], created["id"]);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("seller-1", "seller-1");

    let mut payload = new_listing_payload();
    payload["title"] = json!("");
    let response = app.post_json("/api/v1/listings", Some(&token), payload).await;
    assert_status(&response, StatusCode::BAD_REQUEST);

    let mut payload = new_listing_payload();
    payload["price"] = json!("0");
    let response = app.post_json("/api/v1/listings", Some(&token), payload).await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_image_gets_default_placeholder() {
    let app = TestApp::spawn().await;
    let token = app.issue_token("seller-1", "seller-1");
    let response = app
        .post_json("/api/v1/listings", Some(&token), new_listing_payload())
        .await;
    let created = response_json(response).await;
    assert!(created["image_url"].as_str().unwrap().starts_with("https://"));
}

#[tokio::test]
async fn list_filters_by_category_and_search() {
    let app = TestApp::spawn().await;
    app.seed_listing("seller-1", "25.99").await;
    let token = app.issue_token("seller-2", "seller-2");
    app.post_json("/api/v1/listings", Some(&token), new_listing_payload())
        .await;

    let response = app.get("/api/v1/listings?category=outdoor", None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["category"], "outdoor");

    let response = app.get("/api/v1/listings?category=all", None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 2);

    // Search matches title or category, case-insensitively.
    let response = app.get("/api/v1/listings?search=TRAIN", None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Wooden train set");

    let response = app.get("/api/v1/listings?search=OUTdoor", None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Balance bike");

    // Description text is not searched.
    let response = app.get("/api/v1/listings?search=ridden", None).await;
    let body = response_json(response).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn unknown_listing_returns_not_found() {
    let app = TestApp::spawn().await;
    let response = app
        .get(
            "/api/v1/listings/00000000-0000-0000-0000-000000000001",
            None,
        )
        .await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_owner_can_update() {
    let app = TestApp::spawn().await;
    let listing = app.seed_listing("seller-1", "25.99").await;
    let intruder = app.issue_token("seller-2", "seller-2");

    let response = app
        .put_json(
            &format!("/api/v1/listings/{}", listing.id),
            Some(&intruder),
            json!({ "title": "Hijacked" }),
        )
        .await;
    assert_status(&response, StatusCode::FORBIDDEN);

    let owner = app.issue_token("seller-1", "seller-1");
    let response = app
        .put_json(
            &format!("/api/v1/listings/{}", listing.id),
            Some(&owner),
            json!({ "title": "Wooden train set (reduced)", "price": "19.99" }),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let updated = response_json(response).await;
    assert_eq!(updated["title"], "Wooden train set (reduced)");
    let price: Decimal = updated["price"].as_str().unwrap().parse().unwrap();
    assert_eq!(price, Decimal::new(1999, 2));
}

#[tokio::test]
async fn sold_listing_cannot_be_updated_or_deleted() {
    let app = TestApp::spawn().await;
    let listing = app
        .seed_listing_with_status("seller-1", "25.99", ListingStatus::Sold, Some("cs_1".into()))
        .await;
    let owner = app.issue_token("seller-1", "seller-1");

    let response = app
        .put_json(
            &format!("/api/v1/listings/{}", listing.id),
            Some(&owner),
            json!({ "title": "Changed" }),
        )
        .await;
    assert_status(&response, StatusCode::CONFLICT);

    let response = app
        .delete(&format!("/api/v1/listings/{}", listing.id), Some(&owner))
        .await;
    assert_status(&response, StatusCode::CONFLICT);
}

#[tokio::test]
async fn owner_can_delete_available_listing() {
    let app = TestApp::spawn().await;
    let listing = app.seed_listing("seller-1", "25.99").await;
    let owner = app.issue_token("seller-1", "seller-1");

    let response = app
        .delete(&format!("/api/v1/listings/{}", listing.id), Some(&owner))
        .await;
    assert_status(&response, StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/api/v1/listings/{}", listing.id), None)
        .await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_status_endpoints_respond() {
    let app = TestApp::spawn().await;

    let response = app.get("/health", None).await;
    assert_status(&response, StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");

    let response = app.get("/status", None).await;
    assert_status(&response, StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["name"], "kidsmarket-api");
    assert_eq!(body["environment"], "test");
}
