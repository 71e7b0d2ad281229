#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use kidsmarket_api::auth::{AuthConfig, AuthService};
use kidsmarket_api::config::AppConfig;
use kidsmarket_api::db;
use kidsmarket_api::entities::listing::{self, ListingStatus};
use kidsmarket_api::events::EventSender;
use kidsmarket_api::handlers::AppServices;
use kidsmarket_api::services::{CheckoutService, FulfillmentService, ListingService};
use kidsmarket_api::stripe::{webhook, StripeClient};
use kidsmarket_api::{build_router, AppState};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-jwt-secret-test-jwt-secret-0001";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// A full application wired against a throwaway SQLite database, exercised
/// in-process through `tower::ServiceExt::oneshot`.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub auth: Arc<AuthService>,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_stripe_base("https://stripe.invalid".to_string()).await
    }

    /// `stripe_api_base` points checkout at a stub server when a test needs
    /// the payment provider to answer.
    pub async fn spawn_with_stripe_base(stripe_api_base: String) -> Self {
        let db_path = std::env::temp_dir().join(format!("kidsmarket-test-{}.db", Uuid::new_v4()));
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let mut config = AppConfig::new(
            database_url,
            JWT_SECRET.to_string(),
            "sk_test_dummy".to_string(),
            WEBHOOK_SECRET.to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        config.stripe_api_base = stripe_api_base;

        let db_pool = Arc::new(
            db::establish_connection(&config.database_url)
                .await
                .expect("failed to open test database"),
        );
        db::run_migrations(&db_pool)
            .await
            .expect("failed to run migrations");

        let (event_tx, mut event_rx) = mpsc::channel(64);
        // Drain events so senders never block.
        tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        let event_sender = Arc::new(EventSender::new(event_tx));

        let auth = Arc::new(AuthService::new(AuthConfig::new(
            config.jwt_secret.clone(),
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
            Duration::from_secs(3600),
        )));

        let stripe_client = Arc::new(
            StripeClient::new(
                config.stripe_secret_key.clone(),
                config.stripe_api_base.clone(),
            )
            .expect("failed to build stripe client"),
        );

        let services = Arc::new(AppServices {
            listings: ListingService::new(db_pool.clone(), event_sender.clone()),
            checkout: CheckoutService::new(
                db_pool.clone(),
                stripe_client,
                event_sender.clone(),
                config.public_origin.clone(),
                config.checkout_currency.clone(),
            ),
            fulfillment: FulfillmentService::new(db_pool.clone(), event_sender.clone()),
        });

        let config = Arc::new(config);
        let state = AppState {
            db: db_pool,
            config,
            services,
            event_sender,
        };

        let router = build_router(state.clone(), auth.clone());

        Self {
            router,
            state,
            auth,
            db_path,
        }
    }

    pub fn issue_token(&self, user_id: &str, email: &str) -> String {
        self.auth
            .issue_token(user_id, Some(email), Some("Test User"))
            .expect("failed to issue token")
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Response {
        let mut builder = Request::builder()
            .method("PUT")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().method("DELETE").uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// Posts a webhook delivery signed with `secret`.
    pub async fn post_webhook_signed(
        &self,
        payload: &serde_json::Value,
        secret: &str,
    ) -> Response {
        let body = payload.to_string();
        let signature = webhook::sign_payload(body.as_bytes(), secret, Utc::now().timestamp());
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json")
            .header("stripe-signature", signature)
            .body(Body::from(body))
            .unwrap();
        self.request(request).await
    }

    /// Inserts a listing directly, bypassing the API.
    pub async fn seed_listing(&self, seller_id: &str, price: &str) -> listing::Model {
        self.seed_listing_with_status(seller_id, price, ListingStatus::Available, None)
            .await
    }

    pub async fn seed_listing_with_status(
        &self,
        seller_id: &str,
        price: &str,
        status: ListingStatus,
        stripe_session_id: Option<String>,
    ) -> listing::Model {
        let sold = status == ListingStatus::Sold;
        let model = listing::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set("Wooden train set".to_string()),
            price: Set(price.parse::<Decimal>().expect("invalid price literal")),
            category: Set("toys".to_string()),
            condition: Set("good".to_string()),
            age_range: Set(Some("3-5".to_string())),
            location: Set(Some("Berlin".to_string())),
            description: Set(Some("Barely used".to_string())),
            image_url: Set(Some("https://example.com/train.jpg".to_string())),
            seller_id: Set(seller_id.to_string()),
            seller_email: Set(format!("{}@example.com", seller_id)),
            status: Set(status),
            buyer_id: Set(sold.then(|| "previous-buyer".to_string())),
            buyer_email: Set(sold.then(|| "previous-buyer@example.com".to_string())),
            sold_at: Set(sold.then(Utc::now)),
            stripe_session_id: Set(stripe_session_id),
            stripe_payment_intent_id: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        model
            .insert(&*self.state.db)
            .await
            .expect("failed to seed listing")
    }
}

pub async fn response_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("response was not JSON")
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "unexpected status for response"
    );
}

/// A canonical `checkout.session.completed` delivery for a listing.
pub fn completed_checkout_event(
    session_id: &str,
    listing_id: &str,
    buyer_id: &str,
    amount_total: i64,
) -> serde_json::Value {
    serde_json::json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_intent": format!("pi_{}", session_id),
                "amount_total": amount_total,
                "currency": "eur",
                "metadata": {
                    "listingId": listing_id,
                    "buyerId": buyer_id,
                    "buyerEmail": format!("{}@example.com", buyer_id),
                },
                "shipping_details": {
                    "name": "Test Buyer",
                    "address": {"city": "Berlin", "country": "DE"}
                },
                "shipping_cost": {"amount_total": 499}
            }
        }
    })
}
