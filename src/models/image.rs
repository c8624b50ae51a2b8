// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transformed image model for storage and API.

use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Stored image record in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Image {
    /// Image ID (also used as document ID)
    pub id: String,
    pub title: String,
    /// Transformation applied (restore, removeBackground, fill, remove, recolor)
    pub transformation_type: String,
    /// Media storage public identifier
    pub public_id: String,
    pub secure_url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Transformation parameters as sent to the media provider
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub transformation_url: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Internal ID of the owning user (weak reference)
    pub author_id: String,
    /// Creation time (RFC 3339, UTC)
    pub created_at: String,
    /// Last update time (RFC 3339, UTC)
    pub updated_at: String,
}

/// Author fields shown alongside an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthorSummary {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<&crate::models::User> for AuthorSummary {
    fn from(user: &crate::models::User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Image joined with its author; `author` is `None` when the user is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ImageWithAuthor {
    #[serde(flatten)]
    pub image: Image,
    pub author: Option<AuthorSummary>,
}

/// Transformation types the frontend offers.
pub const TRANSFORMATION_TYPES: [&str; 5] =
    ["restore", "removeBackground", "fill", "remove", "recolor"];

fn validate_transformation_type(value: &str) -> Result<(), validator::ValidationError> {
    if TRANSFORMATION_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unknown_transformation_type"))
    }
}

/// Fields supplied when saving a transformed image.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewImage {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(custom(function = "validate_transformation_type"))]
    pub transformation_type: String,
    #[validate(length(min = 1))]
    pub public_id: String,
    #[validate(url)]
    pub secure_url: String,
    #[validate(range(min = 1, max = 20000))]
    pub width: Option<u32>,
    #[validate(range(min = 1, max = 20000))]
    pub height: Option<u32>,
    pub config: Option<serde_json::Value>,
    #[validate(url)]
    pub transformation_url: Option<String>,
    pub aspect_ratio: Option<String>,
    pub color: Option<String>,
    #[validate(length(max = 1000))]
    pub prompt: Option<String>,
}

impl NewImage {
    /// Build the stored record owned by `author_id`.
    pub fn into_image(self, author_id: &str) -> Image {
        let now = crate::time_utils::now_rfc3339();
        Image {
            id: uuid::Uuid::new_v4().to_string(),
            title: self.title,
            transformation_type: self.transformation_type,
            public_id: self.public_id,
            secure_url: self.secure_url,
            width: self.width,
            height: self.height,
            config: self.config,
            transformation_url: self.transformation_url,
            aspect_ratio: self.aspect_ratio,
            color: self.color,
            prompt: self.prompt,
            author_id: author_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Changes to an existing image. `None` leaves the field alone.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ImageUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_transformation_type"))]
    pub transformation_type: Option<String>,
    #[validate(length(min = 1))]
    pub public_id: Option<String>,
    #[validate(url)]
    pub secure_url: Option<String>,
    #[validate(range(min = 1, max = 20000))]
    pub width: Option<u32>,
    #[validate(range(min = 1, max = 20000))]
    pub height: Option<u32>,
    pub config: Option<serde_json::Value>,
    #[validate(url)]
    pub transformation_url: Option<String>,
    pub aspect_ratio: Option<String>,
    pub color: Option<String>,
    #[validate(length(max = 1000))]
    pub prompt: Option<String>,
}

impl ImageUpdate {
    /// Apply the changes and bump `updated_at`.
    pub fn apply(self, image: &mut Image) {
        if let Some(v) = self.title {
            image.title = v;
        }
        if let Some(v) = self.transformation_type {
            image.transformation_type = v;
        }
        if let Some(v) = self.public_id {
            image.public_id = v;
        }
        if let Some(v) = self.secure_url {
            image.secure_url = v;
        }
        if self.width.is_some() {
            image.width = self.width;
        }
        if self.height.is_some() {
            image.height = self.height;
        }
        if self.config.is_some() {
            image.config = self.config;
        }
        if self.transformation_url.is_some() {
            image.transformation_url = self.transformation_url;
        }
        if self.aspect_ratio.is_some() {
            image.aspect_ratio = self.aspect_ratio;
        }
        if self.color.is_some() {
            image.color = self.color;
        }
        if self.prompt.is_some() {
            image.prompt = self.prompt;
        }
        image.updated_at = crate::time_utils::now_rfc3339();
    }
}
