// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Image, ImageUpdate, ImageWithAuthor, NewImage, Transaction, User};
use crate::services::images::ImagePage;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/credits", post(spend_credits))
        .route("/api/me/images", get(my_images))
        .route("/api/me/transactions", get(my_transactions))
        .route("/api/images", get(image_feed).post(create_image))
        .route(
            "/api/images/{id}",
            get(get_image).put(update_image).delete(delete_image),
        )
}

/// Local record for the authenticated Clerk user.
///
/// 404 until the `user.created` webhook has been processed.
async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    state.users.get_by_clerk_id(&auth.clerk_id).await
}

// ─── User Profile ────────────────────────────────────────────

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>> {
    Ok(Json(current_user(&state, &auth).await?))
}

#[derive(Deserialize)]
struct CreditsRequest {
    delta: i64,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreditsResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub credit_balance: i64,
}

/// Consume credits for a transformation.
///
/// Clients may only spend; purchases arrive through the payment webhook.
async fn spend_credits(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreditsRequest>,
) -> Result<Json<CreditsResponse>> {
    if request.delta >= 0 {
        return Err(AppError::BadRequest(
            "Credit delta must be negative".to_string(),
        ));
    }

    let amount = request
        .delta
        .checked_neg()
        .ok_or_else(|| AppError::BadRequest("Credit delta out of range".to_string()))?;

    let user = current_user(&state, &auth).await?;
    let user = state.users.spend_credits(&user.id, amount).await?;
    Ok(Json(CreditsResponse {
        credit_balance: user.credit_balance,
    }))
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: u32,
}

fn default_page() -> u32 {
    1
}

async fn my_images(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ImagePage>> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(state.images.by_author(&user.id, query.page).await?))
}

async fn my_transactions(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Transaction>>> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(state.transactions.history(&user.id).await?))
}

// ─── Images ──────────────────────────────────────────────────

async fn create_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(new_image): Json<NewImage>,
) -> Result<(StatusCode, Json<Image>)> {
    let user = current_user(&state, &auth).await?;
    let image = state.images.add(&user, new_image).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn image_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ImagePage>> {
    Ok(Json(state.images.feed(query.page).await?))
}

async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ImageWithAuthor>> {
    Ok(Json(state.images.get(&id).await?))
}

async fn update_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<ImageUpdate>,
) -> Result<Json<Image>> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(state.images.update(&user, &id, update).await?))
}

async fn delete_image(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = current_user(&state, &auth).await?;
    state.images.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
