// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image records: saving transformations, the public feed, and per-user
//! collections.

use crate::db::DocumentStore;
use crate::error::AppError;
use crate::models::{AuthorSummary, Image, ImageUpdate, ImageWithAuthor, NewImage, User};
use crate::services::page_cache::{PageCache, ROOT_PATH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Images per page (matches the 3x3 frontend grid).
pub const PAGE_SIZE: u32 = 9;

/// One page of images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ImagePage {
    pub data: Vec<ImageWithAuthor>,
    pub page: u32,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct ImageService {
    store: Arc<dyn DocumentStore>,
    page_cache: Arc<PageCache>,
}

impl ImageService {
    pub fn new(store: Arc<dyn DocumentStore>, page_cache: Arc<PageCache>) -> Self {
        Self { store, page_cache }
    }

    /// Save a new image owned by `author`.
    pub async fn add(&self, author: &User, new_image: NewImage) -> Result<Image, AppError> {
        new_image.validate()?;
        let image = new_image.into_image(&author.id);
        self.store.insert_image(&image).await?;
        self.page_cache.revalidate_path(ROOT_PATH);

        tracing::info!(
            image_id = %image.id,
            author_id = %author.id,
            transformation = %image.transformation_type,
            "Image saved"
        );
        Ok(image)
    }

    /// Fetch an image with its author.
    pub async fn get(&self, id: &str) -> Result<ImageWithAuthor, AppError> {
        let image = self.find(id).await?;
        let author = self
            .store
            .find_user(&image.author_id)
            .await?
            .as_ref()
            .map(AuthorSummary::from);
        Ok(ImageWithAuthor { image, author })
    }

    /// Update an image. Only its author may change it.
    pub async fn update(
        &self,
        actor: &User,
        id: &str,
        update: ImageUpdate,
    ) -> Result<Image, AppError> {
        update.validate()?;
        let mut image = self.find(id).await?;
        ensure_author(actor, &image)?;

        update.apply(&mut image);
        self.store.replace_image(&image).await?;
        self.page_cache.revalidate_path(ROOT_PATH);

        tracing::info!(image_id = id, "Image updated");
        Ok(image)
    }

    /// Delete an image. Only its author may delete it.
    pub async fn delete(&self, actor: &User, id: &str) -> Result<(), AppError> {
        let image = self.find(id).await?;
        ensure_author(actor, &image)?;

        if !self.store.delete_image(id).await? {
            return Err(AppError::NotFound(format!("Image {} not found", id)));
        }
        self.page_cache.revalidate_path(ROOT_PATH);

        tracing::info!(image_id = id, "Image deleted");
        Ok(())
    }

    /// Public feed, newest first. Served from the page cache when fresh.
    pub async fn feed(&self, page: u32) -> Result<ImagePage, AppError> {
        let page = page.max(1);
        page_offset(page)?;
        let key = PageCache::key(ROOT_PATH, Some(&format!("page={}", page)));

        if let Some(cached) = self.page_cache.get(&key) {
            match serde_json::from_value(cached) {
                Ok(result) => return Ok(result),
                Err(e) => tracing::warn!(error = %e, "Discarding unreadable cached page"),
            }
        }

        let result = self.page(None, page).await?;
        let body = serde_json::to_value(&result)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to cache page: {}", e)))?;
        self.page_cache.put(key, body);
        Ok(result)
    }

    /// One user's images, newest first.
    pub async fn by_author(&self, author_id: &str, page: u32) -> Result<ImagePage, AppError> {
        self.page(Some(author_id), page.max(1)).await
    }

    async fn find(&self, id: &str) -> Result<Image, AppError> {
        self.store
            .find_image(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Image {} not found", id)))
    }

    /// Fetch one page plus a lookahead item to know whether another page exists.
    async fn page(&self, author_id: Option<&str>, page: u32) -> Result<ImagePage, AppError> {
        let offset = page_offset(page)?;
        let mut images = self
            .store
            .list_images(author_id, PAGE_SIZE + 1, offset)
            .await?;

        let has_more = images.len() > PAGE_SIZE as usize;
        images.truncate(PAGE_SIZE as usize);

        Ok(ImagePage {
            data: self.with_authors(images).await?,
            page,
            has_more,
        })
    }

    async fn with_authors(&self, images: Vec<Image>) -> Result<Vec<ImageWithAuthor>, AppError> {
        let mut author_ids: Vec<String> = images.iter().map(|i| i.author_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let authors: HashMap<String, AuthorSummary> = self
            .store
            .find_users(&author_ids)
            .await?
            .iter()
            .map(|user| (user.id.clone(), AuthorSummary::from(user)))
            .collect();

        Ok(images
            .into_iter()
            .map(|image| {
                let author = authors.get(&image.author_id).cloned();
                ImageWithAuthor { image, author }
            })
            .collect())
    }
}

fn ensure_author(actor: &User, image: &Image) -> Result<(), AppError> {
    if image.author_id != actor.id {
        tracing::warn!(
            image_id = %image.id,
            actor_id = %actor.id,
            "Rejected change to another user's image"
        );
        return Err(AppError::Forbidden(
            "Only the author can change this image".to_string(),
        ));
    }
    Ok(())
}

/// Store offset of the first item on a 1-based `page`.
fn page_offset(page: u32) -> Result<u32, AppError> {
    page.saturating_sub(1)
        .checked_mul(PAGE_SIZE)
        .and_then(|offset| offset.checked_add(PAGE_SIZE + 1).map(|_| offset))
        .ok_or_else(|| AppError::BadRequest(format!("Page {} is out of range", page)))
}
