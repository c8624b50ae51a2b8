// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clerk user-lifecycle webhook.
//!
//! Clerk delivers events through Svix. The raw body is verified before it
//! is parsed, then dispatched on the event type:
//!
//! - `user.created`: insert the local user and write its ID back into the
//!   Clerk user's public metadata
//! - `user.updated`: sync profile fields
//! - `user.deleted`: remove the user and their images
//!
//! Anything else is acknowledged without side effects.

use crate::error::AppError;
use crate::models::{NewUser, User, UserUpdate};
use crate::services::signature::SvixHeaders;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/clerk", post(handle_event))
}

/// Email address entry on a Clerk user.
#[derive(Deserialize, Debug, Clone)]
pub struct ClerkEmailAddress {
    pub id: String,
    pub email_address: String,
}

/// The `data` object of `user.created` / `user.updated`.
#[derive(Deserialize, Debug, Clone)]
pub struct ClerkUserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<ClerkEmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl ClerkUserData {
    /// The primary address, falling back to the first one listed.
    fn primary_email(&self) -> Option<&str> {
        self.primary_email_address_id
            .as_deref()
            .and_then(|primary| self.email_addresses.iter().find(|e| e.id == primary))
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.as_str())
    }

    fn into_new_user(self) -> Result<NewUser, AppError> {
        let email = self
            .primary_email()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("user.created has no email address".into()))?;
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::BadRequest("user.created has no username".into()))?;

        Ok(NewUser {
            clerk_id: self.id,
            email,
            username,
            photo: self.image_url.unwrap_or_default(),
            first_name: Some(self.first_name.unwrap_or_default()),
            last_name: Some(self.last_name.unwrap_or_default()),
        })
    }

    fn to_update(&self) -> UserUpdate {
        UserUpdate {
            first_name: Some(self.first_name.clone().unwrap_or_default()),
            last_name: Some(self.last_name.clone().unwrap_or_default()),
            username: self.username.clone().filter(|u| !u.is_empty()),
            photo: self.image_url.clone(),
        }
    }
}

/// Only the ID is sent for deleted users.
#[derive(Deserialize, Debug)]
struct DeletedData {
    id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A verified webhook event.
#[derive(Debug)]
pub enum WebhookEvent {
    UserCreated(ClerkUserData),
    UserUpdated(ClerkUserData),
    UserDeleted { id: String },
    Other { event_type: String },
}

impl WebhookEvent {
    /// Parse the event envelope from a verified body.
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

        let data_error =
            |e: serde_json::Error| AppError::BadRequest(format!("Invalid event data: {}", e));

        Ok(match envelope.event_type.as_str() {
            "user.created" => {
                WebhookEvent::UserCreated(serde_json::from_value(envelope.data).map_err(data_error)?)
            }
            "user.updated" => {
                WebhookEvent::UserUpdated(serde_json::from_value(envelope.data).map_err(data_error)?)
            }
            "user.deleted" => {
                let data: DeletedData =
                    serde_json::from_value(envelope.data).map_err(data_error)?;
                let id = data
                    .id
                    .ok_or_else(|| AppError::BadRequest("user.deleted has no user id".into()))?;
                WebhookEvent::UserDeleted { id }
            }
            _ => WebhookEvent::Other {
                event_type: envelope.event_type,
            },
        })
    }
}

/// Response for handled user events.
#[derive(Serialize, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResponse {
    pub message: String,
    pub user: Option<User>,
}

impl SyncResponse {
    fn ok(user: Option<User>) -> Json<Self> {
        Json(Self {
            message: "OK".to_string(),
            user,
        })
    }
}

/// Handle a Clerk webhook delivery (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let svix = SvixHeaders::from_headers(&headers).map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected: missing svix headers");
        e
    })?;

    state
        .clerk_verifier
        .verify(&svix, &body, chrono::Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!(
                error = %e,
                msg_id = svix.id,
                "Security Alert: webhook signature verification failed"
            );
            e
        })?;

    let event = WebhookEvent::parse(&body)?;
    tracing::info!(msg_id = svix.id, event = event_kind(&event), "Webhook event verified");

    match event {
        WebhookEvent::UserCreated(data) => user_created(&state, data).await,
        WebhookEvent::UserUpdated(data) => user_updated(&state, data).await,
        WebhookEvent::UserDeleted { id } => user_deleted(&state, &id).await,
        WebhookEvent::Other { event_type } => {
            tracing::debug!(event_type = %event_type, "Ignoring webhook event");
            Ok(StatusCode::OK.into_response())
        }
    }
}

fn event_kind(event: &WebhookEvent) -> &str {
    match event {
        WebhookEvent::UserCreated(_) => "user.created",
        WebhookEvent::UserUpdated(_) => "user.updated",
        WebhookEvent::UserDeleted { .. } => "user.deleted",
        WebhookEvent::Other { event_type } => event_type,
    }
}

async fn user_created(state: &AppState, data: ClerkUserData) -> Result<Response, AppError> {
    let clerk_id = data.id.clone();
    let user = match state.users.create(data.into_new_user()?).await {
        Ok(user) => user,
        Err(AppError::Conflict(reason)) => match state.users.get_by_clerk_id(&clerk_id).await {
            // Redelivery of an event we already applied
            Ok(existing) => {
                tracing::info!(clerk_id = %clerk_id, user_id = %existing.id, "Replayed user.created");
                existing
            }
            Err(e) if e.is_not_found() => return Err(AppError::Conflict(reason)),
            Err(e) => return Err(e),
        },
        Err(e) => return Err(e),
    };

    if let Err(e) = state
        .identity
        .set_public_metadata(&clerk_id, json!({ "userId": user.id }))
        .await
    {
        tracing::error!(
            error = %e,
            clerk_id = %clerk_id,
            user_id = %user.id,
            "Failed to write user id back to Clerk metadata"
        );
    }

    Ok(SyncResponse::ok(Some(user)).into_response())
}

async fn user_updated(state: &AppState, data: ClerkUserData) -> Result<Response, AppError> {
    match state.users.update(&data.id, data.to_update()).await {
        Ok(user) => Ok(SyncResponse::ok(Some(user)).into_response()),
        Err(e) if e.is_not_found() => {
            tracing::warn!(clerk_id = %data.id, "user.updated for unknown user");
            Ok(SyncResponse::ok(None).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn user_deleted(state: &AppState, clerk_id: &str) -> Result<Response, AppError> {
    match state.users.delete(clerk_id).await {
        Ok(user) => Ok(SyncResponse::ok(Some(user)).into_response()),
        Err(e) if e.is_not_found() => {
            tracing::warn!(clerk_id, "user.deleted for unknown user");
            Ok(SyncResponse::ok(None).into_response())
        }
        Err(e) => Err(e),
    }
}
