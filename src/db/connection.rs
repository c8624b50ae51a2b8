// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lazily established, shared database connection.
//!
//! The first caller of [`ConnectionCache::connect`] runs the connector;
//! concurrent callers wait on that same attempt instead of opening their
//! own. Once a connection exists it is handed out for the life of the
//! cache. A failed attempt is not remembered, so the next call retries.

use crate::error::AppError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use tokio::sync::OnceCell;

type Connector<C> = Box<dyn Fn() -> BoxFuture<'static, Result<C, AppError>> + Send + Sync>;

/// Owns at most one live connection of type `C`.
pub struct ConnectionCache<C> {
    cell: OnceCell<C>,
    connector: Connector<C>,
}

impl<C> ConnectionCache<C>
where
    C: Send + Sync + 'static,
{
    /// Create an empty cache. `connector` runs only when a connection is needed.
    pub fn new<F, Fut>(connector: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, AppError>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            connector: Box::new(move || connector().boxed()),
        }
    }

    /// Get the live connection, establishing it if needed.
    pub async fn connect(&self) -> Result<&C, AppError> {
        if let Some(conn) = self.cell.get() {
            return Ok(conn);
        }

        let result = self.cell.get_or_try_init(|| (self.connector)()).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Database connection attempt failed");
        }
        result
    }

    /// Whether a connection has been established.
    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}
