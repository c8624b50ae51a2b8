// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit purchases recorded from completed Stripe checkouts.

use crate::db::DocumentStore;
use crate::error::AppError;
use crate::models::{RecordOutcome, Transaction};
use std::sync::Arc;

/// A completed checkout, as extracted from the payment webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCheckout {
    pub stripe_id: String,
    /// Amount paid in minor units (cents)
    pub amount_minor: i64,
    pub plan: Option<String>,
    pub credits: Option<i64>,
    pub buyer_id: String,
}

#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn DocumentStore>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record a purchase and credit the buyer. Redelivered checkouts are
    /// reported as duplicates and credit nothing.
    pub async fn record_checkout(
        &self,
        checkout: CompletedCheckout,
    ) -> Result<(Transaction, RecordOutcome), AppError> {
        if checkout.credits.is_some_and(|c| c < 0) {
            return Err(AppError::BadRequest(
                "Purchased credits cannot be negative".to_string(),
            ));
        }

        let transaction = Transaction {
            stripe_id: checkout.stripe_id,
            amount: checkout.amount_minor as f64 / 100.0,
            plan: checkout.plan,
            credits: checkout.credits,
            buyer_id: checkout.buyer_id,
            created_at: crate::time_utils::now_rfc3339(),
        };

        let outcome = self.store.record_transaction(&transaction).await?;
        match &outcome {
            RecordOutcome::Recorded { balance: Some(balance) } => tracing::info!(
                stripe_id = %transaction.stripe_id,
                buyer_id = %transaction.buyer_id,
                credits = transaction.credits.unwrap_or(0),
                balance,
                "Purchase recorded"
            ),
            RecordOutcome::Recorded { balance: None } => tracing::warn!(
                stripe_id = %transaction.stripe_id,
                buyer_id = %transaction.buyer_id,
                "Purchase recorded for unknown buyer; no credits applied"
            ),
            RecordOutcome::Duplicate => tracing::info!(
                stripe_id = %transaction.stripe_id,
                "Duplicate checkout ignored"
            ),
        }

        Ok((transaction, outcome))
    }

    /// Purchase history for one user, newest first.
    pub async fn history(&self, buyer_id: &str) -> Result<Vec<Transaction>, AppError> {
        self.store.list_transactions(buyer_id).await
    }
}
