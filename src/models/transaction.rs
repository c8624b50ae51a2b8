// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit purchase records.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A completed Stripe checkout, stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Transaction {
    /// Stripe checkout session ID (unique, also used as document ID)
    pub stripe_id: String,
    /// Amount paid, in major currency units
    pub amount: f64,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub credits: Option<i64>,
    /// Internal ID of the paying user (weak reference)
    pub buyer_id: String,
    /// When the purchase was recorded (RFC 3339, UTC)
    pub created_at: String,
}

/// Result of recording a purchase.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Newly stored; the buyer's balance after crediting, if the buyer exists.
    Recorded { balance: Option<i64> },
    /// A transaction with this Stripe ID already exists; nothing changed.
    Duplicate,
}
