// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clerk backend API client.
//!
//! The only call we make is the public-metadata write-back that links a
//! Clerk user to its local record.

use crate::error::AppError;
use async_trait::async_trait;

/// Identity provider operations the service depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Merge `metadata` into the provider user's public metadata.
    async fn set_public_metadata(
        &self,
        provider_user_id: &str,
        metadata: serde_json::Value,
    ) -> Result<(), AppError>;
}

/// Clerk API client.
#[derive(Clone)]
pub struct ClerkClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl ClerkClient {
    /// Create a client for `base_url` (e.g. `https://api.clerk.com/v1`).
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            secret_key,
        }
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 404 {
            return Err(AppError::NotFound("Clerk user not found".to_string()));
        }

        if status.as_u16() == 429 {
            tracing::warn!("Clerk rate limit hit (429)");
        }

        Err(AppError::IdentityProvider(format!(
            "HTTP {}: {}",
            status, body
        )))
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    /// PATCH {base}/users/{id}/metadata
    async fn set_public_metadata(
        &self,
        provider_user_id: &str,
        metadata: serde_json::Value,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/users/{}/metadata",
            self.base_url,
            urlencoding::encode(provider_user_id)
        );

        let body = serde_json::json!({
            "public_metadata": metadata
        });

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

        self.check_response(response).await?;
        tracing::debug!(clerk_id = provider_user_id, "Clerk public metadata updated");
        Ok(())
    }
}
