use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{dto::AuthResponse, jwt::JwtKeys, password::Passwords},
    error::{AppError, AppResult},
    users::{
        dto::UpdateUser,
        repo::{Page, UserGateway},
        repo_types::{NewUser, PublicUser, Role, UserChanges},
        validation::{normalize_email, validate_email, validate_password, validate_username},
    },
};

/// Registration, login and token verification on top of the gateway.
///
/// Holds no per-call state; clones share the gateway, keys and hasher.
#[derive(Clone)]
pub struct AuthService {
    users: UserGateway,
    passwords: Passwords,
    keys: JwtKeys,
    /// Verified against when the email is unknown so both failure paths
    /// cost one Argon2 run.
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(users: UserGateway, passwords: Passwords, keys: JwtKeys) -> anyhow::Result<Self> {
        let dummy_hash = passwords.hash_password_blocking("timing-equalizer")?;
        Ok(Self {
            users,
            passwords,
            keys,
            dummy_hash: dummy_hash.into(),
        })
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Option<Role>,
    ) -> AppResult<PublicUser> {
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        validate_password(password)?;

        // Fast path only; the store's unique indexes decide races.
        if self.users.find_by_email(&email).await?.is_some() {
            warn!("email already registered");
            return Err(AppError::already_exists("email"));
        }
        if self.users.find_by_username(&username).await?.is_some() {
            warn!(%username, "username already taken");
            return Err(AppError::already_exists("username"));
        }

        let password_hash = self.passwords.hash_password(password.to_owned()).await?;
        let role = role.unwrap_or_default();
        let user = self
            .users
            .create(NewUser {
                username,
                email,
                password_hash,
                role,
            })
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::Conflict(_)) {
                    warn!(error = %e, "concurrent registration lost the race");
                }
            })?;

        info!(user_id = %user.id, role = role.as_str(), "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let email = normalize_email(email);

        let Some(account) = self.users.find_by_email_with_secret(&email).await? else {
            let _ = self
                .passwords
                .verify_password(password.to_owned(), self.dummy_hash.to_string())
                .await;
            warn!(%email, "login unknown email");
            return Err(AppError::invalid_credentials());
        };

        let ok = self
            .passwords
            .verify_password(password.to_owned(), account.password_hash)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %account.user.id, "stored hash unreadable");
                AppError::Internal(e)
            })?;
        if !ok {
            warn!(user_id = %account.user.id, "login invalid password");
            return Err(AppError::invalid_credentials());
        }

        let user = account.user;
        let token = self.keys.sign(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(AuthResponse { token, user })
    }

    /// Resolves a bearer token to the user as it is now, not as it was
    /// when the token was issued.
    #[instrument(skip(self, token))]
    pub async fn verify_token(&self, token: &str) -> AppResult<PublicUser> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::invalid_token()
        })?;
        self.users.find_by_id(claims.sub).await
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<PublicUser> {
        self.users.find_by_id(id).await
    }

    pub async fn list_users(&self, page: i64, limit: i64) -> AppResult<Page> {
        self.users.list_page(page, limit).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> AppResult<PublicUser> {
        let mut changes = UserChanges {
            role: input.role,
            ..Default::default()
        };
        if let Some(username) = input.username {
            changes.username = Some(validate_username(&username)?);
        }
        if let Some(email) = input.email {
            changes.email = Some(validate_email(&email)?);
        }
        if let Some(password) = input.password {
            validate_password(&password)?;
            changes.password_hash = Some(self.passwords.hash_password(password).await?);
        }

        let rehashed = changes.password_hash.is_some();
        let user = self.users.update(id, changes).await?;
        info!(user_id = %user.id, rehashed, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> AppResult<()> {
        self.users.soft_delete(id).await?;
        info!(user_id = %id, "user soft-deleted");
        Ok(())
    }
}
