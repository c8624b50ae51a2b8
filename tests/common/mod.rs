// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use pixigen_api::config::Config;
use pixigen_api::db::{DocumentStore, MemoryStore};
use pixigen_api::error::AppError;
use pixigen_api::routes::create_router;
use pixigen_api::services::IdentityProvider;
use pixigen_api::AppState;
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Identity provider that records metadata writes instead of calling Clerk.
#[derive(Default)]
pub struct RecordingIdentityProvider {
    pub calls: Mutex<Vec<(String, serde_json::Value)>>,
    pub fail: bool,
}

impl RecordingIdentityProvider {
    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentityProvider {
    async fn set_public_metadata(
        &self,
        provider_user_id: &str,
        metadata: serde_json::Value,
    ) -> Result<(), AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((provider_user_id.to_string(), metadata));
        if self.fail {
            return Err(AppError::IdentityProvider("HTTP 503: unavailable".to_string()));
        }
        Ok(())
    }
}

/// Everything a test needs to drive and inspect the app.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<RecordingIdentityProvider>,
}

/// Create a test app backed by the in-memory store.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(RecordingIdentityProvider::default())
}

#[allow(dead_code)]
pub fn create_test_app_with(identity: RecordingIdentityProvider) -> TestApp {
    let config = Config::test_default();
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(identity);

    let state = Arc::new(
        AppState::new(
            config,
            store.clone() as Arc<dyn DocumentStore>,
            identity.clone() as Arc<dyn IdentityProvider>,
        )
        .expect("test secrets are valid"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        identity,
    }
}

/// Build a Clerk webhook request signed with the test secret.
#[allow(dead_code)]
pub fn signed_clerk_request(state: &AppState, msg_id: &str, body: &serde_json::Value) -> Request<Body> {
    let payload = body.to_string();
    let now = chrono::Utc::now().timestamp();
    let signature = state
        .clerk_verifier
        .sign(msg_id, now, payload.as_bytes())
        .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhooks/clerk")
        .header("content-type", "application/json")
        .header("svix-id", msg_id)
        .header("svix-timestamp", now.to_string())
        .header("svix-signature", signature)
        .body(Body::from(payload))
        .unwrap()
}

/// Build a Stripe webhook request signed with the test secret.
#[allow(dead_code)]
pub fn signed_stripe_request(state: &AppState, body: &serde_json::Value) -> Request<Body> {
    let payload = body.to_string();
    let signature = state
        .stripe_verifier
        .sign(chrono::Utc::now().timestamp(), payload.as_bytes())
        .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("content-type", "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(payload))
        .unwrap()
}

/// A `user.created` event body.
#[allow(dead_code)]
pub fn user_created_event(clerk_id: &str, email: &str, username: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "user.created",
        "object": "event",
        "data": {
            "id": clerk_id,
            "email_addresses": [{"id": "idn_1", "email_address": email}],
            "primary_email_address_id": "idn_1",
            "image_url": "https://img.clerk.com/photo.png",
            "first_name": "Alice",
            "last_name": "Liddell",
            "username": username
        }
    })
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Bearer header value for a Clerk user.
#[allow(dead_code)]
pub fn bearer(state: &AppState, clerk_id: &str) -> String {
    let token =
        pixigen_api::middleware::auth::create_jwt(clerk_id, &state.config.jwt_signing_key)
            .unwrap();
    format!("Bearer {}", token)
}
