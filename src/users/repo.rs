use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    store::{Scope, StoreError, UserLookup, UserStore},
    users::repo_types::{AuthUser, NewUser, PublicUser, UserChanges},
};

/// One page of users plus the paging that produced it.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<PublicUser>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Identity store gateway: turns user operations into store calls and
/// decides which read shape leaves this module.
#[derive(Clone)]
pub struct UserGateway {
    store: Arc<dyn UserStore>,
    max_limit: i64,
}

fn map_store_error(err: StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation { field } => AppError::already_exists(field),
        StoreError::NotFound => AppError::user_not_found(),
        StoreError::Backend(e) => AppError::Internal(e),
    }
}

impl UserGateway {
    pub fn new(store: Arc<dyn UserStore>, max_limit: u32) -> Self {
        Self {
            store,
            max_limit: i64::from(max_limit.max(1)),
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<PublicUser> {
        self.store
            .find_one(UserLookup::Id(id), Scope::Live)
            .await
            .map_err(map_store_error)?
            .map(PublicUser::from)
            .ok_or_else(AppError::user_not_found)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<PublicUser>> {
        let row = self
            .store
            .find_one(UserLookup::Email(email), Scope::Live)
            .await
            .map_err(map_store_error)?;
        Ok(row.map(PublicUser::from))
    }

    /// The only read that returns the password hash.
    pub async fn find_by_email_with_secret(&self, email: &str) -> AppResult<Option<AuthUser>> {
        let row = self
            .store
            .find_one(UserLookup::Email(email), Scope::Live)
            .await
            .map_err(map_store_error)?;
        Ok(row.map(AuthUser::from))
    }

    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<PublicUser>> {
        let row = self
            .store
            .find_one(UserLookup::Username(username), Scope::Live)
            .await
            .map_err(map_store_error)?;
        Ok(row.map(PublicUser::from))
    }

    /// Inserts with a fresh id. A duplicate that slipped past any pre-check
    /// surfaces here as the same `Conflict`.
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create(&self, user: NewUser) -> AppResult<PublicUser> {
        let id = Uuid::new_v4();
        let row = self.store.insert(id, user).await.map_err(map_store_error)?;
        debug!(user_id = %row.id, "user row inserted");
        Ok(row.into())
    }

    #[instrument(skip(self))]
    pub async fn list_page(&self, page: i64, limit: i64) -> AppResult<Page> {
        if page < 1 {
            return Err(AppError::validation("page must be a positive integer"));
        }
        if limit < 1 {
            return Err(AppError::validation("limit must be a positive integer"));
        }
        let limit = limit.min(self.max_limit);
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::validation("page is out of range"))?;

        let (rows, total) = self
            .store
            .find_page(Scope::Live, offset, limit)
            .await
            .map_err(map_store_error)?;

        Ok(Page {
            items: rows.into_iter().map(PublicUser::from).collect(),
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<PublicUser> {
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }
        let row = self
            .store
            .update_one(id, changes)
            .await
            .map_err(map_store_error)?;
        Ok(row.into())
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid) -> AppResult<()> {
        self.store.soft_delete_one(id).await.map_err(map_store_error)
    }
}
