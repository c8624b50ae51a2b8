// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pixigen: backend for an AI image-editing app
//!
//! This crate keeps local user records in sync with the identity provider
//! (Clerk), tracks credit balances and purchases, and stores transformed
//! images in a document database.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::{
    IdentityProvider, ImageService, PageCache, SignatureError, StripeVerifier, SvixVerifier,
    TransactionService, UserService,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: UserService,
    pub images: ImageService,
    pub transactions: TransactionService,
    pub identity: Arc<dyn IdentityProvider>,
    pub page_cache: Arc<PageCache>,
    pub clerk_verifier: SvixVerifier,
    pub stripe_verifier: StripeVerifier,
}

impl AppState {
    /// Wire services around a store and identity provider.
    ///
    /// Fails if either webhook secret is unusable.
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, SignatureError> {
        let page_cache = Arc::new(PageCache::new(Duration::from_secs(
            config.page_cache_ttl_secs,
        )));

        Ok(Self {
            clerk_verifier: SvixVerifier::new(&config.webhook_secret)?,
            stripe_verifier: StripeVerifier::new(&config.stripe_webhook_secret)?,
            users: UserService::new(store.clone(), page_cache.clone()),
            images: ImageService::new(store.clone(), page_cache.clone()),
            transactions: TransactionService::new(store),
            identity,
            page_cache,
            config,
        })
    }
}
