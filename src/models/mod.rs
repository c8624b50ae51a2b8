// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod image;
pub mod transaction;
pub mod user;

pub use image::{AuthorSummary, Image, ImageUpdate, ImageWithAuthor, NewImage};
pub use transaction::{RecordOutcome, Transaction};
pub use user::{NewUser, User, UserUpdate};
