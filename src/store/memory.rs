use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Scope, StoreError, UserLookup, UserStore};
use crate::users::repo_types::{NewUser, UserChanges, UserRecord};

/// In-process store for tests. Every mutation holds the write lock for its
/// whole check-and-write, which gives the same live-row uniqueness guarantee
/// as the partial unique indexes in Postgres.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<Vec<UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn visible(row: &UserRecord, scope: Scope) -> bool {
    scope == Scope::WithDeleted || row.deleted_at.is_none()
}

fn is_match(row: &UserRecord, lookup: &UserLookup<'_>) -> bool {
    match lookup {
        UserLookup::Id(id) => row.id == *id,
        UserLookup::Email(email) => row.email == *email,
        UserLookup::Username(username) => row.username == *username,
    }
}

fn check_unique(
    rows: &[UserRecord],
    skip: Option<Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), StoreError> {
    for row in rows.iter().filter(|r| r.deleted_at.is_none() && Some(r.id) != skip) {
        if email.is_some_and(|e| row.email == e) {
            return Err(StoreError::UniqueViolation { field: "email" });
        }
        if username.is_some_and(|u| row.username == u) {
            return Err(StoreError::UniqueViolation { field: "username" });
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, id: Uuid, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut rows = self.rows.write().await;
        check_unique(&rows, None, Some(&user.username), Some(&user.email))?;
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn find_one(
        &self,
        lookup: UserLookup<'_>,
        scope: Scope,
    ) -> Result<Option<UserRecord>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|r| visible(r, scope) && is_match(r, &lookup))
            .cloned())
    }

    async fn find_page(
        &self,
        scope: Scope,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<UserRecord>, i64), StoreError> {
        let rows = self.rows.read().await;
        // reversed insertion order keeps newest-first among equal timestamps
        let mut live: Vec<&UserRecord> = rows.iter().rev().filter(|r| visible(r, scope)).collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = live.len() as i64;
        let page = live
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update_one(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord, StoreError> {
        let mut rows = self.rows.write().await;
        let idx = rows
            .iter()
            .position(|r| r.id == id && r.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        check_unique(
            &rows,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
        )?;
        let row = &mut rows[idx];
        if let Some(username) = changes.username {
            row.username = username;
        }
        if let Some(email) = changes.email {
            row.email = email;
        }
        if let Some(hash) = changes.password_hash {
            row.password_hash = hash;
        }
        if let Some(role) = changes.role {
            row.role = role;
        }
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone())
    }

    async fn soft_delete_one(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id && r.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        let now = OffsetDateTime::now_utc();
        row.deleted_at = Some(now);
        row.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Role;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn insert_rejects_live_duplicates_only() {
        let store = MemoryUserStore::new();
        let first = store
            .insert(Uuid::new_v4(), new_user("alice", "alice@x.com"))
            .await
            .expect("insert");

        let err = store
            .insert(Uuid::new_v4(), new_user("alice2", "alice@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { field: "email" }));

        let err = store
            .insert(Uuid::new_v4(), new_user("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { field: "username" }));

        store.soft_delete_one(first.id).await.expect("delete");
        store
            .insert(Uuid::new_v4(), new_user("alice", "alice@x.com"))
            .await
            .expect("email is free again after soft delete");
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_hidden_from_live_scope() {
        let store = MemoryUserStore::new();
        let row = store
            .insert(Uuid::new_v4(), new_user("bob", "bob@x.com"))
            .await
            .expect("insert");
        store.soft_delete_one(row.id).await.expect("delete");

        let live = store.find_one(UserLookup::Id(row.id), Scope::Live).await.unwrap();
        assert!(live.is_none());
        let any = store
            .find_one(UserLookup::Id(row.id), Scope::WithDeleted)
            .await
            .unwrap()
            .expect("row kept");
        assert!(any.deleted_at.is_some());

        let err = store.soft_delete_one(row.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        let (_, total) = store.find_page(Scope::Live, 0, 10).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn update_checks_uniqueness_against_other_rows() {
        let store = MemoryUserStore::new();
        let a = store.insert(Uuid::new_v4(), new_user("a_user", "a@x.com")).await.unwrap();
        store.insert(Uuid::new_v4(), new_user("b_user", "b@x.com")).await.unwrap();

        // keeping its own email is fine
        let same = UserChanges {
            email: Some("a@x.com".into()),
            ..Default::default()
        };
        store.update_one(a.id, same).await.expect("self is not a conflict");

        let clash = UserChanges {
            email: Some("b@x.com".into()),
            ..Default::default()
        };
        let err = store.update_one(a.id, clash).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { field: "email" }));

        let err = store
            .update_one(Uuid::new_v4(), UserChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
