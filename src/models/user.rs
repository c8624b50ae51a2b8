// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Plan every new user starts on.
pub const DEFAULT_PLAN_ID: u32 = 1;

/// Credits granted on sign-up.
pub const DEFAULT_CREDIT_BALANCE: i64 = 10;

/// User profile stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    /// Internal ID (also used as document ID)
    pub id: String,
    /// Clerk user ID (unique)
    pub clerk_id: String,
    /// Email address (unique)
    pub email: String,
    /// Username (unique)
    pub username: String,
    /// Profile photo URL
    pub photo: String,
    /// First name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Subscription plan
    pub plan_id: u32,
    /// Remaining credits; only ever changed by atomic increments
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub credit_balance: i64,
}

/// Fields supplied when a user first signs up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewUser {
    pub clerk_id: String,
    pub email: String,
    pub username: String,
    pub photo: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NewUser {
    /// Build the stored record with a fresh internal ID and sign-up defaults.
    pub fn into_user(self) -> User {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            clerk_id: self.clerk_id,
            email: self.email,
            username: self.username,
            photo: self.photo,
            first_name: self.first_name,
            last_name: self.last_name,
            plan_id: DEFAULT_PLAN_ID,
            credit_balance: DEFAULT_CREDIT_BALANCE,
        }
    }
}

/// Profile fields the identity provider may change.
///
/// `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub photo: Option<String>,
}

impl UserUpdate {
    /// Apply the update in place. Credits and plan are never touched here.
    pub fn apply(&self, user: &mut User) {
        if let Some(first_name) = &self.first_name {
            user.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = Some(last_name.clone());
        }
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(photo) = &self.photo {
            user.photo = photo.clone();
        }
    }
}

/// Unique-key reservation pointing back at a user document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKey {
    pub user_id: String,
}

/// Kinds of unique user keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserKeyKind {
    ClerkId,
    Email,
    Username,
}

impl UserKeyKind {
    /// Document ID of the key reservation for `value`.
    ///
    /// Emails and usernames compare case-insensitively. Clerk ids are
    /// opaque and keep their case.
    pub fn doc_id(self, value: &str) -> String {
        let (prefix, value) = match self {
            UserKeyKind::ClerkId => ("clerk_id", value.to_string()),
            UserKeyKind::Email => ("email", value.to_lowercase()),
            UserKeyKind::Username => ("username", value.to_lowercase()),
        };
        format!("{}:{}", prefix, urlencoding::encode(&value))
    }
}

impl User {
    /// All unique keys this user occupies.
    pub fn keys(&self) -> [(UserKeyKind, &str); 3] {
        [
            (UserKeyKind::ClerkId, self.clerk_id.as_str()),
            (UserKeyKind::Email, self.email.as_str()),
            (UserKeyKind::Username, self.username.as_str()),
        ]
    }
}
