// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe payment webhook: credits purchased through checkout.

use crate::error::AppError;
use crate::models::Transaction;
use crate::services::signature::STRIPE_SIGNATURE_HEADER;
use crate::services::transactions::CompletedCheckout;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/stripe", post(handle_event))
}

#[derive(Deserialize, Debug)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Deserialize, Debug)]
struct StripeEventData {
    object: serde_json::Value,
}

/// Fields we read from a Checkout Session.
#[derive(Deserialize, Debug)]
struct CheckoutSession {
    id: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    metadata: CheckoutMetadata,
}

/// Metadata attached when the checkout was created. Stripe stores all
/// metadata values as strings.
#[derive(Deserialize, Debug, Default)]
struct CheckoutMetadata {
    plan: Option<String>,
    credits: Option<String>,
    #[serde(rename = "buyerId")]
    buyer_id: Option<String>,
}

impl CheckoutSession {
    fn into_checkout(self) -> Result<CompletedCheckout, AppError> {
        let buyer_id = self
            .metadata
            .buyer_id
            .filter(|b| !b.is_empty())
            .ok_or_else(|| AppError::BadRequest("Checkout session has no buyerId".into()))?;

        let credits = self
            .metadata
            .credits
            .map(|c| {
                c.trim()
                    .parse::<i64>()
                    .map_err(|_| AppError::BadRequest(format!("Invalid credits value: {}", c)))
            })
            .transpose()?;

        Ok(CompletedCheckout {
            stripe_id: self.id,
            amount_minor: self.amount_total.unwrap_or(0),
            plan: self.metadata.plan,
            credits,
            buyer_id,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct PaymentResponse {
    pub message: String,
    /// Set when this delivery recorded a new purchase.
    pub transaction: Option<Transaction>,
}

/// Handle a Stripe webhook delivery (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentResponse>, AppError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    state
        .stripe_verifier
        .verify(signature, &body, chrono::Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!(error = %e, "Security Alert: Stripe signature verification failed");
            e
        })?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid Stripe event: {}", e)))?;

    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "Ignoring Stripe event");
        return Ok(Json(PaymentResponse {
            message: "OK".to_string(),
            transaction: None,
        }));
    }

    let session: CheckoutSession = serde_json::from_value(event.data.object)
        .map_err(|e| AppError::BadRequest(format!("Invalid checkout session: {}", e)))?;

    let (transaction, outcome) = state
        .transactions
        .record_checkout(session.into_checkout()?)
        .await?;

    let transaction = match outcome {
        crate::models::RecordOutcome::Recorded { .. } => Some(transaction),
        crate::models::RecordOutcome::Duplicate => None,
    };

    Ok(Json(PaymentResponse {
        message: "OK".to_string(),
        transaction,
    }))
}
