// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod clerk;
pub mod images;
pub mod page_cache;
pub mod signature;
pub mod transactions;
pub mod users;

pub use clerk::{ClerkClient, IdentityProvider};
pub use images::ImageService;
pub use page_cache::PageCache;
pub use signature::{SignatureError, StripeVerifier, SvixVerifier};
pub use transactions::TransactionService;
pub use users::UserService;
