// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local store for development and tests.
//!
//! Mirrors the Firestore layout (documents plus unique-key reservations)
//! behind a single lock, so every operation is atomic.

use crate::db::store::DocumentStore;
use crate::error::AppError;
use crate::models::user::UserKeyKind;
use crate::models::{Image, RecordOutcome, Transaction, User, UserUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    /// Key reservation doc ID -> user ID
    user_keys: HashMap<String, String>,
    images: HashMap<String, Image>,
    transactions: HashMap<String, Transaction>,
}

fn insufficient_credits() -> AppError {
    AppError::BadRequest("Insufficient credits".to_string())
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.data.read().await.users.len()
    }

    /// Number of stored images.
    pub async fn image_count(&self) -> usize {
        self.data.read().await.images.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let mut data = self.data.write().await;

        let taken = user
            .keys()
            .iter()
            .any(|(kind, value)| data.user_keys.contains_key(&kind.doc_id(value)));
        if taken || data.users.contains_key(&user.id) {
            return Err(AppError::Conflict(
                "A user with this clerk id, email or username already exists".to_string(),
            ));
        }

        for (kind, value) in user.keys() {
            data.user_keys.insert(kind.doc_id(value), user.id.clone());
        }
        data.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.data.read().await.users.get(id).cloned())
    }

    async fn find_user_by_clerk_id(&self, clerk_id: &str) -> Result<Option<User>, AppError> {
        let data = self.data.read().await;
        Ok(data
            .user_keys
            .get(&UserKeyKind::ClerkId.doc_id(clerk_id))
            .and_then(|id| data.users.get(id))
            .cloned())
    }

    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        let data = self.data.read().await;
        Ok(ids.iter().filter_map(|id| data.users.get(id).cloned()).collect())
    }

    async fn update_user_profile(
        &self,
        clerk_id: &str,
        update: &UserUpdate,
    ) -> Result<Option<User>, AppError> {
        let mut data = self.data.write().await;

        let Some(id) = data
            .user_keys
            .get(&UserKeyKind::ClerkId.doc_id(clerk_id))
            .cloned()
        else {
            return Ok(None);
        };
        let Some(current) = data.users.get(&id).cloned() else {
            return Ok(None);
        };

        let mut updated = current.clone();
        update.apply(&mut updated);

        let old_key = UserKeyKind::Username.doc_id(&current.username);
        let new_key = UserKeyKind::Username.doc_id(&updated.username);
        if old_key != new_key {
            if data.user_keys.contains_key(&new_key) {
                return Err(AppError::Conflict("Username is already taken".to_string()));
            }
            data.user_keys.remove(&old_key);
            data.user_keys.insert(new_key, id.clone());
        }

        data.users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_user(&self, user: &User) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        for (kind, value) in user.keys() {
            data.user_keys.remove(&kind.doc_id(value));
        }
        data.users.remove(&user.id);
        Ok(())
    }

    async fn increment_credits(&self, id: &str, delta: i64) -> Result<Option<User>, AppError> {
        let mut data = self.data.write().await;
        Ok(data.users.get_mut(id).map(|user| {
            user.credit_balance += delta;
            user.clone()
        }))
    }

    async fn spend_credits(&self, id: &str, amount: i64) -> Result<Option<User>, AppError> {
        let mut data = self.data.write().await;
        let Some(user) = data.users.get_mut(id) else {
            return Ok(None);
        };
        match user.credit_balance.checked_sub(amount) {
            Some(balance) if balance >= 0 => {
                user.credit_balance = balance;
                Ok(Some(user.clone()))
            }
            _ => Err(insufficient_credits()),
        }
    }

    async fn insert_image(&self, image: &Image) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        if data.images.contains_key(&image.id) {
            return Err(AppError::Conflict("Image already exists".to_string()));
        }
        data.images.insert(image.id.clone(), image.clone());
        Ok(())
    }

    async fn find_image(&self, id: &str) -> Result<Option<Image>, AppError> {
        Ok(self.data.read().await.images.get(id).cloned())
    }

    async fn replace_image(&self, image: &Image) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        match data.images.get_mut(&image.id) {
            Some(stored) => {
                *stored = image.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Image {} not found", image.id))),
        }
    }

    async fn delete_image(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.data.write().await.images.remove(id).is_some())
    }

    async fn list_images(
        &self,
        author_id: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Image>, AppError> {
        let data = self.data.read().await;
        let mut images: Vec<Image> = data
            .images
            .values()
            .filter(|image| author_id.map_or(true, |a| image.author_id == a))
            .cloned()
            .collect();

        images.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(images
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete_images_by_author(&self, author_id: &str) -> Result<usize, AppError> {
        let mut data = self.data.write().await;
        let before = data.images.len();
        data.images.retain(|_, image| image.author_id != author_id);
        Ok(before - data.images.len())
    }

    async fn record_transaction(
        &self,
        record: &Transaction,
    ) -> Result<RecordOutcome, AppError> {
        let mut data = self.data.write().await;
        if data.transactions.contains_key(&record.stripe_id) {
            return Ok(RecordOutcome::Duplicate);
        }

        data.transactions
            .insert(record.stripe_id.clone(), record.clone());

        let credits = record.credits.unwrap_or(0);
        let balance = data.users.get_mut(&record.buyer_id).map(|buyer| {
            buyer.credit_balance += credits;
            buyer.credit_balance
        });

        Ok(RecordOutcome::Recorded { balance })
    }

    async fn list_transactions(&self, buyer_id: &str) -> Result<Vec<Transaction>, AppError> {
        let data = self.data.read().await;
        let mut records: Vec<Transaction> = data
            .transactions
            .values()
            .filter(|t| t.buyer_id == buyer_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
