// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. A missing secret or a missing
//! database project is fatal: `main` refuses to start.

use std::env;

/// Default Firestore database holding the pixigen collections.
pub const DEFAULT_DATABASE_ID: &str = "pixigen";

/// Default Clerk backend API base URL.
pub const DEFAULT_CLERK_API_URL: &str = "https://api.clerk.com/v1";

/// Which document store backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Cloud Firestore (production).
    Firestore {
        project_id: String,
        database_id: String,
    },
    /// Process-local store for development and tests.
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Document store selection and its connection details
    pub store: StoreConfig,
    /// Frontend URL (allowed CORS origin)
    pub frontend_url: String,
    /// Clerk backend API base URL
    pub clerk_api_url: String,
    /// How long cached page responses stay fresh
    pub page_cache_ttl_secs: u64,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Svix signing secret for Clerk webhooks (`whsec_...`)
    pub webhook_secret: String,
    /// Stripe webhook endpoint secret (`whsec_...`)
    pub stripe_webhook_secret: String,
    /// Clerk backend API secret key
    pub clerk_secret_key: String,
    /// HS256 key for API bearer tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_lowercase()
            .as_str()
        {
            "firestore" => StoreConfig::Firestore {
                project_id: required("GCP_PROJECT_ID")?,
                database_id: env::var("FIRESTORE_DATABASE_ID")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_ID.to_string()),
            },
            "memory" => StoreConfig::Memory,
            other => return Err(ConfigError::Invalid("STORE_BACKEND", other.to_string())),
        };

        Ok(Self {
            store,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            clerk_api_url: env::var("CLERK_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_CLERK_API_URL.to_string()),
            page_cache_ttl_secs: env::var("PAGE_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            webhook_secret: required("WEBHOOK_SECRET")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            clerk_secret_key: required("CLERK_SECRET_KEY")?,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
        })
    }

    /// Deterministic config for tests (memory store, fixed secrets).
    pub fn test_default() -> Self {
        Self {
            store: StoreConfig::Memory,
            frontend_url: "http://localhost:3000".to_string(),
            clerk_api_url: "http://127.0.0.1:9/v1".to_string(),
            page_cache_ttl_secs: 60,
            port: 8080,
            // base64("test_webhook_secret_32_bytes_ok!")
            webhook_secret: "whsec_dGVzdF93ZWJob29rX3NlY3JldF8zMl9ieXRlc19vayE=".to_string(),
            stripe_webhook_secret: "whsec_test_stripe_secret".to_string(),
            clerk_secret_key: "sk_test_clerk".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

/// Read a required, non-empty variable.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
