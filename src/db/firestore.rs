// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed store.
//!
//! Provides high-level operations for:
//! - Users (profiles, unique-key reservations, credit balance)
//! - Images (transformed images, keyed by generated ID)
//! - Transactions (credit purchases, keyed by Stripe session ID)
//!
//! Every operation goes through the shared [`ConnectionCache`], so the
//! client is created on first use and reused afterwards.

use crate::db::collections;
use crate::db::connection::ConnectionCache;
use crate::db::store::DocumentStore;
use crate::error::AppError;
use crate::models::user::{UserKey, UserKeyKind};
use crate::models::{Image, RecordOutcome, Transaction, User, UserUpdate};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use futures_util::{stream, FutureExt, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// User fields written by profile updates. `credit_balance` and `plan_id`
/// are deliberately absent.
const PROFILE_FIELDS: [&str; 4] = ["first_name", "last_name", "username", "photo"];

/// Map a Firestore error onto the application error kinds.
fn classify(context: &str, e: FirestoreError) -> AppError {
    match e {
        FirestoreError::DataConflictError(_) => AppError::Conflict(context.to_string()),
        FirestoreError::DataNotFoundError(_) => AppError::NotFound(context.to_string()),
        other => AppError::Database(format!("{}: {}", context, other)),
    }
}

fn db_err(e: FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

/// Firestore document store.
pub struct FirestoreStore {
    conn: ConnectionCache<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create the store. No connection is made until the first operation.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub fn new(project_id: &str, database_id: &str) -> Self {
        let project_id = project_id.to_string();
        let database_id = database_id.to_string();

        Self {
            conn: ConnectionCache::new(move || {
                let project_id = project_id.clone();
                let database_id = database_id.clone();
                async move { connect(&project_id, &database_id).await }
            }),
        }
    }

    /// Helper to get the (possibly freshly established) client.
    async fn client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.conn.connect().await
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.client().await?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Open a Firestore client, unauthenticated when talking to the emulator.
async fn connect(project_id: &str, database_id: &str) -> Result<firestore::FirestoreDb, AppError> {
    let options = firestore::FirestoreDbOptions::new(project_id.to_string())
        .with_database_id(database_id.to_string());

    // If the emulator environment variable is set, use unauthenticated connection
    // to avoid local credential warnings and leakage.
    if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            database = database_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );
        return Ok(client);
    }

    let client = firestore::FirestoreDb::with_options(options)
        .await
        .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

    tracing::info!(
        project = project_id,
        database = database_id,
        "Connected to Firestore"
    );
    Ok(client)
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    // ─── User Operations ─────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.client().await?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let key = UserKey {
            user_id: user.id.clone(),
        };
        for (kind, value) in user.keys() {
            client
                .fluent()
                .update()
                .in_col(collections::USER_KEYS)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(kind.doc_id(value))
                .object(&key)
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        transaction.commit().await.map_err(|e| {
            classify("A user with this clerk id, email or username already exists", e)
        })?;

        tracing::debug!(user_id = %user.id, clerk_id = %user.clerk_id, "User inserted");
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.client()
            .await?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(id)
            .await
            .map_err(db_err)
    }

    async fn find_user_by_clerk_id(&self, clerk_id: &str) -> Result<Option<User>, AppError> {
        let clerk_id = clerk_id.to_string();
        let users: Vec<User> = self
            .client()
            .await?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("clerk_id").eq(clerk_id.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        Ok(users.into_iter().next())
    }

    async fn find_users(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        let found = stream::iter(ids.to_vec())
            .map(|id| async move { self.find_user(&id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<User>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Option<User>>, AppError>>()?;

        Ok(found.into_iter().flatten().collect())
    }

    async fn update_user_profile(
        &self,
        clerk_id: &str,
        update: &UserUpdate,
    ) -> Result<Option<User>, AppError> {
        let Some(mut user) = self.find_user_by_clerk_id(clerk_id).await? else {
            return Ok(None);
        };
        let previous_username = user.username.clone();
        update.apply(&mut user);

        let client = self.client().await?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Move the username reservation if it changed
        let old_key = UserKeyKind::Username.doc_id(&previous_username);
        let new_key = UserKeyKind::Username.doc_id(&user.username);
        if old_key != new_key {
            client
                .fluent()
                .delete()
                .from(collections::USER_KEYS)
                .document_id(&old_key)
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;

            client
                .fluent()
                .update()
                .in_col(collections::USER_KEYS)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(&new_key)
                .object(&UserKey {
                    user_id: user.id.clone(),
                })
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        client
            .fluent()
            .update()
            .fields(PROFILE_FIELDS)
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&user.id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        match transaction.commit().await {
            Ok(_) => {}
            // Deleted between the lookup and the write
            Err(FirestoreError::DataNotFoundError(_)) => return Ok(None),
            Err(e) => return Err(classify("Username is already taken", e)),
        }

        self.find_user(&user.id).await
    }

    async fn delete_user(&self, user: &User) -> Result<(), AppError> {
        let client = self.client().await?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for (kind, value) in user.keys() {
            client
                .fluent()
                .delete()
                .from(collections::USER_KEYS)
                .document_id(kind.doc_id(value))
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        client
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(&user.id)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete user: {}", e)))?;

        tracing::debug!(user_id = %user.id, "Deleted user profile and keys");
        Ok(())
    }

    async fn increment_credits(&self, id: &str, delta: i64) -> Result<Option<User>, AppError> {
        let client = self.client().await?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Server-side increment: concurrent deltas all apply.
        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(id)
            .transforms(|t| t.fields([t.field("credit_balance").increment(delta)]))
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        match transaction.commit().await {
            Ok(_) => {}
            Err(FirestoreError::DataNotFoundError(_)) => return Ok(None),
            Err(e) => return Err(AppError::Database(format!("Credit update failed: {}", e))),
        }

        self.find_user(id).await
    }

    async fn spend_credits(&self, id: &str, amount: i64) -> Result<Option<User>, AppError> {
        let client = self.client().await?;

        // Reads inside run_transaction lock the user document, so a
        // concurrent spend retries against the new balance.
        let outcome = client
            .run_transaction(|db, transaction| {
                let id = id.to_string();
                async move {
                    let user: Option<User> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj()
                        .one(&id)
                        .await?;
                    let Some(mut user) = user else {
                        return Ok(None);
                    };
                    let Some(balance) = user
                        .credit_balance
                        .checked_sub(amount)
                        .filter(|b| *b >= 0)
                    else {
                        return Ok(Some(Err(user.credit_balance)));
                    };

                    user.credit_balance = balance;
                    db.fluent()
                        .update()
                        .fields(["credit_balance"])
                        .in_col(collections::USERS)
                        .precondition(FirestoreWritePrecondition::Exists(true))
                        .document_id(&id)
                        .object(&user)
                        .add_to_transaction(transaction)?;
                    Ok(Some(Ok(user)))
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Credit spend failed: {}", e)))?;

        match outcome {
            None => Ok(None),
            Some(Ok(user)) => Ok(Some(user)),
            Some(Err(balance)) => {
                tracing::debug!(user_id = id, amount, balance, "Spend refused");
                Err(AppError::BadRequest("Insufficient credits".to_string()))
            }
        }
    }

    // ─── Image Operations ────────────────────────────────────────

    async fn insert_image(&self, image: &Image) -> Result<(), AppError> {
        let _: () = self
            .client()
            .await?
            .fluent()
            .update()
            .in_col(collections::IMAGES)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&image.id)
            .object(image)
            .execute()
            .await
            .map_err(|e| classify("Image already exists", e))?;
        Ok(())
    }

    async fn find_image(&self, id: &str) -> Result<Option<Image>, AppError> {
        self.client()
            .await?
            .fluent()
            .select()
            .by_id_in(collections::IMAGES)
            .obj()
            .one(id)
            .await
            .map_err(db_err)
    }

    async fn replace_image(&self, image: &Image) -> Result<(), AppError> {
        let _: () = self
            .client()
            .await?
            .fluent()
            .update()
            .in_col(collections::IMAGES)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(&image.id)
            .object(image)
            .execute()
            .await
            .map_err(|e| classify(&format!("Image {} not found", image.id), e))?;
        Ok(())
    }

    async fn delete_image(&self, id: &str) -> Result<bool, AppError> {
        if self.find_image(id).await?.is_none() {
            return Ok(false);
        }

        self.client()
            .await?
            .fluent()
            .delete()
            .from(collections::IMAGES)
            .document_id(id)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(true)
    }

    async fn list_images(
        &self,
        author_id: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Image>, AppError> {
        let query = self
            .client()
            .await?
            .fluent()
            .select()
            .from(collections::IMAGES);

        let query = if let Some(author_id) = author_id {
            let author_id = author_id.to_string();
            query.filter(move |q| q.for_all([q.field("author_id").eq(author_id.clone())]))
        } else {
            query
        };

        query
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    async fn delete_images_by_author(&self, author_id: &str) -> Result<usize, AppError> {
        let author = author_id.to_string();
        let images: Vec<Image> = self
            .client()
            .await?
            .fluent()
            .select()
            .from(collections::IMAGES)
            .filter(move |q| q.for_all([q.field("author_id").eq(author.clone())]))
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        let count = images.len();
        self.batch_delete(&images, collections::IMAGES, |image: &Image| {
            image.id.clone()
        })
        .await?;

        tracing::debug!(author_id, count, "Deleted images");
        Ok(count)
    }

    // ─── Transaction Operations ──────────────────────────────────

    async fn record_transaction(
        &self,
        record: &Transaction,
    ) -> Result<RecordOutcome, AppError> {
        let client = self.client().await?;

        let existing: Option<Transaction> = client
            .fluent()
            .select()
            .by_id_in(collections::TRANSACTIONS)
            .obj()
            .one(&record.stripe_id)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Ok(RecordOutcome::Duplicate);
        }

        let buyer_exists = self.find_user(&record.buyer_id).await?.is_some();
        let credits = record.credits.unwrap_or(0);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::TRANSACTIONS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&record.stripe_id)
            .object(record)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        if buyer_exists && credits != 0 {
            client
                .fluent()
                .update()
                .in_col(collections::USERS)
                .precondition(FirestoreWritePrecondition::Exists(true))
                .document_id(&record.buyer_id)
                .transforms(|t| t.fields([t.field("credit_balance").increment(credits)]))
                .only_transform()
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        match transaction.commit().await {
            Ok(_) => {}
            // Lost a race with a redelivery of the same session
            Err(FirestoreError::DataConflictError(_)) => return Ok(RecordOutcome::Duplicate),
            Err(e) => {
                return Err(AppError::Database(format!(
                    "Failed to record transaction: {}",
                    e
                )))
            }
        }

        let balance = if buyer_exists {
            self.find_user(&record.buyer_id)
                .await?
                .map(|u| u.credit_balance)
        } else {
            None
        };

        Ok(RecordOutcome::Recorded { balance })
    }

    async fn list_transactions(&self, buyer_id: &str) -> Result<Vec<Transaction>, AppError> {
        let buyer_id = buyer_id.to_string();
        self.client()
            .await?
            .fluent()
            .select()
            .from(collections::TRANSACTIONS)
            .filter(move |q| q.for_all([q.field("buyer_id").eq(buyer_id.clone())]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }
}
