// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User lifecycle: sign-up, profile sync, deletion and credits.
//!
//! Each operation acquires the store connection and performs its document
//! operation. Missing users are reported as [`AppError::NotFound`] rather
//! than an empty result.

use crate::db::DocumentStore;
use crate::error::AppError;
use crate::models::{NewUser, User, UserUpdate};
use crate::services::page_cache::{PageCache, ROOT_PATH};
use std::sync::Arc;

/// User operations shared by the webhook and API handlers.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    page_cache: Arc<PageCache>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, page_cache: Arc<PageCache>) -> Self {
        Self { store, page_cache }
    }

    /// Insert a new user with sign-up defaults (plan 1, 10 credits).
    pub async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let user = new_user.into_user();
        self.store.insert_user(&user).await?;

        tracing::info!(
            user_id = %user.id,
            clerk_id = %user.clerk_id,
            "User created"
        );
        Ok(user)
    }

    /// Look up a user by Clerk user ID.
    pub async fn get_by_clerk_id(&self, clerk_id: &str) -> Result<User, AppError> {
        self.store
            .find_user_by_clerk_id(clerk_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", clerk_id)))
    }

    /// Look up a user by internal ID.
    pub async fn get_by_id(&self, id: &str) -> Result<User, AppError> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Apply profile changes; returns the user as stored afterwards.
    pub async fn update(&self, clerk_id: &str, update: UserUpdate) -> Result<User, AppError> {
        let user = self
            .store
            .update_user_profile(clerk_id, &update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", clerk_id)))?;

        tracing::info!(user_id = %user.id, clerk_id, "User updated");
        Ok(user)
    }

    /// Delete the user with `clerk_id` together with their images.
    ///
    /// Transactions are kept as financial records; their `buyer_id` is left
    /// pointing at the deleted user. The root page is revalidated since it
    /// lists the removed images.
    pub async fn delete(&self, clerk_id: &str) -> Result<User, AppError> {
        let user = self.get_by_clerk_id(clerk_id).await?;

        let images = self.store.delete_images_by_author(&user.id).await?;
        self.store.delete_user(&user).await?;
        self.page_cache.revalidate_path(ROOT_PATH);

        tracing::info!(
            user_id = %user.id,
            clerk_id,
            images_deleted = images,
            "User deleted"
        );
        Ok(user)
    }

    /// Atomically add a signed `delta` to the user's credit balance.
    pub async fn adjust_credits(&self, user_id: &str, delta: i64) -> Result<User, AppError> {
        let user = self
            .store
            .increment_credits(user_id, delta)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        tracing::debug!(
            user_id,
            delta,
            balance = user.credit_balance,
            "Credits adjusted"
        );
        Ok(user)
    }

    /// Take `amount` credits from the user, refusing to overdraw.
    pub async fn spend_credits(&self, user_id: &str, amount: i64) -> Result<User, AppError> {
        if amount <= 0 {
            return Err(AppError::BadRequest(
                "Spend amount must be positive".to_string(),
            ));
        }

        let user = self
            .store
            .spend_credits(user_id, amount)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        tracing::debug!(
            user_id,
            amount,
            balance = user.credit_balance,
            "Credits spent"
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::time::Duration;

    fn service() -> UserService {
        UserService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(PageCache::new(Duration::from_secs(60))),
        )
    }

    fn alice() -> NewUser {
        NewUser {
            clerk_id: "user_alice".to_string(),
            email: "a@example.com".to_string(),
            username: "alice".to_string(),
            photo: "https://img.clerk.com/a.png".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: Some("Liddell".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_user_is_distinguishable() {
        let users = service();

        assert!(users.get_by_clerk_id("nobody").await.unwrap_err().is_not_found());
        assert!(users
            .update("nobody", UserUpdate::default())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(users.delete("nobody").await.unwrap_err().is_not_found());
        assert!(users.adjust_credits("nobody", 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let users = service();
        let created = users.create(alice()).await.unwrap();
        assert_eq!(created.credit_balance, 10);
        assert_eq!(created.plan_id, 1);

        let fetched = users.get_by_clerk_id("user_alice").await.unwrap();
        assert_eq!(fetched, created);

        let updated = users
            .update(
                "user_alice",
                UserUpdate {
                    first_name: Some("Al".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Al"));
        assert_eq!(updated.id, created.id);

        let after = users.adjust_credits(&created.id, -3).await.unwrap();
        assert_eq!(after.credit_balance, 7);

        let deleted = users.delete("user_alice").await.unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(users.get_by_id(&created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts() {
        let users = service();
        users.create(alice()).await.unwrap();
        assert!(matches!(
            users.create(alice()).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_credit_adjustments_do_not_lose_updates() {
        let users = service();
        let user = users.create(alice()).await.unwrap();

        let mut handles = vec![];
        for delta in [5_i64, -2, 7, -1, 3, -4, 2, 1] {
            let users = users.clone();
            let id = user.id.clone();
            handles.push(tokio::spawn(async move {
                users.adjust_credits(&id, delta).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let after = users.get_by_id(&user.id).await.unwrap();
        assert_eq!(after.credit_balance, 10 + 5 - 2 + 7 - 1 + 3 - 4 + 2 + 1);
    }

    #[tokio::test]
    async fn test_concurrent_spends_never_overdraw() {
        let users = service();
        let user = users.create(alice()).await.unwrap();

        let mut handles = vec![];
        for _ in 0..16 {
            let users = users.clone();
            let id = user.id.clone();
            handles.push(tokio::spawn(async move { users.spend_credits(&id, 3).await }));
        }

        let mut spent = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => spent += 1,
                Err(e) => assert!(matches!(e, AppError::BadRequest(_))),
            }
        }

        let after = users.get_by_id(&user.id).await.unwrap();
        assert_eq!(spent, 3);
        assert_eq!(after.credit_balance, 1);
    }

    #[tokio::test]
    async fn test_spend_rejects_non_positive_amounts() {
        let users = service();
        let user = users.create(alice()).await.unwrap();

        for amount in [0, -5] {
            assert!(matches!(
                users.spend_credits(&user.id, amount).await,
                Err(AppError::BadRequest(_))
            ));
        }
        assert_eq!(users.get_by_id(&user.id).await.unwrap().credit_balance, 10);
    }
}
