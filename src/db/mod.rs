// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: the store trait, its Firestore and in-memory backends,
//! and the lazily established connection they share.

pub mod connection;
pub mod firestore;
pub mod memory;
pub mod store;

pub use connection::ConnectionCache;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;
pub use store::DocumentStore;

use crate::config::StoreConfig;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Unique-key reservations (clerk id, email, username) for users
    pub const USER_KEYS: &str = "user_keys";
    pub const IMAGES: &str = "images";
    /// Credit purchases (keyed by Stripe session ID)
    pub const TRANSACTIONS: &str = "transactions";
}

/// Build the configured store. Firestore connects lazily on first use.
pub fn create_store(config: &StoreConfig) -> Arc<dyn DocumentStore> {
    match config {
        StoreConfig::Firestore {
            project_id,
            database_id,
        } => {
            tracing::info!(project = %project_id, database = %database_id, "Using Firestore store");
            Arc::new(FirestoreStore::new(project_id, database_id))
        }
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    }
}
