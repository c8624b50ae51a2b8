// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage operations shared by every backend.
//!
//! Lookups return `Ok(None)` when the document does not exist; services
//! turn that into [`AppError::NotFound`](crate::error::AppError::NotFound).
//! `Err` is reserved for transport failures and uniqueness conflicts.

use crate::error::AppError;
use crate::models::{Image, RecordOutcome, Transaction, User, UserUpdate};
use async_trait::async_trait;

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    // ─── Users ───────────────────────────────────────────────────

    /// Insert a new user, reserving its clerk id, email and username.
    ///
    /// Fails with `Conflict` if any of them is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_clerk_id(&self, clerk_id: &str) -> Result<Option<User>, AppError>;

    /// Fetch several users; missing IDs are skipped.
    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>, AppError>;

    /// Apply profile changes to the user with `clerk_id`.
    ///
    /// Only profile fields are written, so concurrent credit increments are
    /// never overwritten. Returns the updated user.
    async fn update_user_profile(
        &self,
        clerk_id: &str,
        update: &UserUpdate,
    ) -> Result<Option<User>, AppError>;

    /// Delete a user document and release its unique keys.
    async fn delete_user(&self, user: &User) -> Result<(), AppError>;

    /// Atomically add `delta` to a user's credit balance.
    async fn increment_credits(&self, id: &str, delta: i64) -> Result<Option<User>, AppError>;

    /// Atomically take `amount` credits from a user.
    ///
    /// The balance check and the write happen as one step, so concurrent
    /// spends can never drive the balance below zero. Fails with
    /// `BadRequest` when the balance is too low.
    async fn spend_credits(&self, id: &str, amount: i64) -> Result<Option<User>, AppError>;

    // ─── Images ──────────────────────────────────────────────────

    async fn insert_image(&self, image: &Image) -> Result<(), AppError>;

    async fn find_image(&self, id: &str) -> Result<Option<Image>, AppError>;

    async fn replace_image(&self, image: &Image) -> Result<(), AppError>;

    /// Returns `false` if there was nothing to delete.
    async fn delete_image(&self, id: &str) -> Result<bool, AppError>;

    /// Newest images first, optionally restricted to one author.
    async fn list_images(
        &self,
        author_id: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Image>, AppError>;

    /// Delete every image owned by `author_id`, returning how many went.
    async fn delete_images_by_author(&self, author_id: &str) -> Result<usize, AppError>;

    // ─── Transactions ────────────────────────────────────────────

    /// Store a purchase and credit the buyer in one atomic step.
    ///
    /// A repeated Stripe ID is reported as [`RecordOutcome::Duplicate`]
    /// and changes nothing.
    async fn record_transaction(&self, transaction: &Transaction)
        -> Result<RecordOutcome, AppError>;

    /// Purchases by one buyer, newest first.
    async fn list_transactions(&self, buyer_id: &str) -> Result<Vec<Transaction>, AppError>;
}
