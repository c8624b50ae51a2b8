// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe checkout webhook tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pixigen_api::db::DocumentStore;
use pixigen_api::models::NewUser;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, signed_stripe_request};

fn checkout_completed(session_id: &str, buyer_id: &str, credits: &str) -> serde_json::Value {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "amount_total": 4000,
                "metadata": {
                    "plan": "Pro Package",
                    "credits": credits,
                    "buyerId": buyer_id
                }
            }
        }
    })
}

async fn seed_buyer(app: &common::TestApp) -> String {
    app.state
        .users
        .create(NewUser {
            clerk_id: "user_buyer".to_string(),
            email: "buyer@example.com".to_string(),
            username: "buyer".to_string(),
            photo: String::new(),
            first_name: None,
            last_name: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_checkout_records_transaction_and_credits_buyer() {
    let app = create_test_app();
    let buyer_id = seed_buyer(&app).await;

    let response = app
        .router
        .oneshot(signed_stripe_request(
            &app.state,
            &checkout_completed("cs_test_1", &buyer_id, "120"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["transaction"]["stripe_id"], "cs_test_1");
    assert_eq!(json["transaction"]["amount"], 40.0);
    assert_eq!(json["transaction"]["credits"], 120);

    let buyer = app.store.find_user(&buyer_id).await.unwrap().unwrap();
    assert_eq!(buyer.credit_balance, 130);
}

#[tokio::test]
async fn test_redelivered_checkout_credits_once() {
    let app = create_test_app();
    let buyer_id = seed_buyer(&app).await;
    let event = checkout_completed("cs_test_1", &buyer_id, "50");

    for _ in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(signed_stripe_request(&app.state, &event))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let buyer = app.store.find_user(&buyer_id).await.unwrap().unwrap();
    assert_eq!(buyer.credit_balance, 60);
    assert_eq!(app.store.list_transactions(&buyer_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_other_stripe_events_are_ignored() {
    let app = create_test_app();
    let event = json!({
        "id": "evt_2",
        "type": "payment_intent.created",
        "data": {"object": {"id": "pi_1"}}
    });

    let response = app
        .router
        .oneshot(signed_stripe_request(&app.state, &event))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["transaction"].is_null());
}

#[tokio::test]
async fn test_unsigned_stripe_event_is_rejected() {
    let app = create_test_app();
    let event = checkout_completed("cs_test_1", "u1", "50");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let now = chrono::Utc::now().timestamp();
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header("stripe-signature", format!("t={},v1=deadbeef", now))
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.list_transactions("u1").await.unwrap().is_empty());
}
