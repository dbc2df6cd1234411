use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Scope, StoreError, UserLookup, UserStore};
use crate::users::repo_types::{NewUser, UserChanges, UserRecord};

/// `UserStore` over the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn scope_filter(scope: Scope) -> &'static str {
    match scope {
        Scope::Live => "deleted_at IS NULL",
        Scope::WithDeleted => "TRUE",
    }
}

fn lookup_column(lookup: &UserLookup<'_>) -> &'static str {
    match lookup {
        UserLookup::Id(_) => "id",
        UserLookup::Email(_) => "email",
        UserLookup::Username(_) => "username",
    }
}

const PAGE_SNAPSHOT: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY";

/// Count and page statements over the same filter.
fn page_queries(scope: Scope) -> (String, String) {
    let filter = scope_filter(scope);
    let count = format!("SELECT COUNT(*) FROM users WHERE {filter}");
    let page = format!(
        r#"
        SELECT id, username, email, password_hash, role, created_at, updated_at, deleted_at
        FROM users
        WHERE {filter}
        ORDER BY created_at DESC, id DESC
        LIMIT $1 OFFSET $2
        "#
    );
    (count, page)
}

/// Maps a unique index name from the migrations to the column it guards.
fn constraint_field(constraint: Option<&str>) -> Option<&'static str> {
    match constraint? {
        c if c.contains("username") => Some("username"),
        c if c.contains("email") => Some("email"),
        _ => None,
    }
}

fn map_sqlx_error(err: sqlx::Error, action: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if let Some(field) = constraint_field(db_err.constraint()) {
                return StoreError::UniqueViolation { field };
            }
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(action))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, id: Uuid, user: NewUser) -> Result<UserRecord, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, role, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_sqlx_error(e, "insert user"))
    }

    async fn find_one(
        &self,
        lookup: UserLookup<'_>,
        scope: Scope,
    ) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT id, username, email, password_hash, role, created_at, updated_at, deleted_at
            FROM users
            WHERE {} = $1 AND {}
            "#,
            lookup_column(&lookup),
            scope_filter(scope),
        );
        let query = sqlx::query_as::<_, UserRecord>(&sql);
        let query = match lookup {
            UserLookup::Id(id) => query.bind(id),
            UserLookup::Email(email) => query.bind(email),
            UserLookup::Username(username) => query.bind(username),
        };
        query
            .fetch_optional(&self.db)
            .await
            .map_err(|e| map_sqlx_error(e, "find user"))
    }

    async fn find_page(
        &self,
        scope: Scope,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<UserRecord>, i64), StoreError> {
        let (count_sql, page_sql) = page_queries(scope);

        // count and page must come from the same snapshot
        let mut tx = self
            .db
            .begin()
            .await
            .map_err(|e| map_sqlx_error(e, "begin page read"))?;
        sqlx::query(PAGE_SNAPSHOT)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "set page snapshot"))?;

        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "count users"))?;
        let rows = sqlx::query_as::<_, UserRecord>(&page_sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, "list users"))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error(e, "end page read"))?;
        Ok((rows, total))
    }

    async fn update_one(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
               SET username      = COALESCE($2, username),
                   email         = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash),
                   role          = COALESCE($5, role),
                   updated_at    = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, username, email, password_hash, role, created_at, updated_at, deleted_at
            "#,
        )
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_sqlx_error(e, "update user"))?
        .ok_or(StoreError::NotFound)
    }

    async fn soft_delete_one(&self, id: Uuid) -> Result<(), StoreError> {
        let done = sqlx::query(
            r#"
            UPDATE users
               SET deleted_at = now(), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .context("soft delete user")?;

        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_map_to_fields() {
        assert_eq!(constraint_field(Some("users_email_live_key")), Some("email"));
        assert_eq!(constraint_field(Some("users_username_live_key")), Some("username"));
        assert_eq!(constraint_field(Some("users_pkey")), None);
        assert_eq!(constraint_field(None), None);
    }

    #[test]
    fn scope_filters() {
        assert_eq!(scope_filter(Scope::Live), "deleted_at IS NULL");
        assert_eq!(scope_filter(Scope::WithDeleted), "TRUE");
        assert_eq!(lookup_column(&UserLookup::Email("a@b.co")), "email");
        assert_eq!(lookup_column(&UserLookup::Id(Uuid::nil())), "id");
    }

    #[test]
    fn page_count_and_rows_share_filter_and_snapshot() {
        let (count, page) = page_queries(Scope::Live);
        assert!(count.ends_with("WHERE deleted_at IS NULL"));
        assert!(page.contains("WHERE deleted_at IS NULL"));
        assert!(page.contains("ORDER BY created_at DESC, id DESC"));
        assert!(PAGE_SNAPSHOT.contains("REPEATABLE READ"));
    }

    #[test]
    fn non_database_errors_are_backend() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound, "find user");
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(err.to_string().contains("find user"));
    }
}
