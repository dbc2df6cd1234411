//! Persistence primitives for user rows.
//!
//! The gateway in `users::repo` is the only caller; it owns projection to
//! read shapes and the mapping of [`StoreError`] to caller-facing errors.

use async_trait::async_trait;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, UserChanges, UserRecord};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgUserStore;

#[derive(Debug, Clone, Copy)]
pub enum UserLookup<'a> {
    Id(Uuid),
    Email(&'a str),
    Username(&'a str),
}

/// Which rows a read may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Rows without `deleted_at`.
    Live,
    WithDeleted,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A live row already holds `field`.
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: &'static str },
    #[error("row not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a row; must reject duplicates of live `email`/`username` atomically.
    async fn insert(&self, id: Uuid, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn find_one(
        &self,
        lookup: UserLookup<'_>,
        scope: Scope,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Newest first. Returns the page and the total row count for `scope`.
    async fn find_page(
        &self,
        scope: Scope,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<UserRecord>, i64), StoreError>;

    /// Applies `changes` to a live row and bumps `updated_at`.
    async fn update_one(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord, StoreError>;

    /// Sets `deleted_at` on a live row.
    async fn soft_delete_one(&self, id: Uuid) -> Result<(), StoreError>;
}
