use std::{fmt, sync::Arc};

use anyhow::Context;
use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{Pin, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_pin, verify_pin},
};
use crate::{
    error::AuthError,
    state::AppState,
    users::{
        repo::UserStore,
        repo_types::{NewUser, User},
    },
};

pub const ADMIN_ROLE: &str = "admin";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Signed session token handed out on login.
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub ttl_seconds: u64,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// Registration, login and profile lookups over a [`UserStore`].
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone(), state.keys.clone())
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    /// Creates a user and returns its id. The store's unique email key decides
    /// whether the email is already taken.
    pub async fn register(&self, req: RegisterRequest) -> Result<Uuid, AuthError> {
        let email = normalize_email(&req.email);
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".into()));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::Validation("Invalid email".into()));
        }
        if req.name.trim().is_empty() {
            return Err(AuthError::Validation("Name is required".into()));
        }
        if req.role.trim().is_empty() {
            return Err(AuthError::Validation("Role is required".into()));
        }
        if req.pin.as_str().is_empty() {
            return Err(AuthError::Validation("Pin is required".into()));
        }

        let pin_hash = hash_blocking(req.pin).await?;
        let user = self
            .store
            .insert(NewUser {
                name: req.name.trim().to_string(),
                email,
                mobile: req.mobile,
                pin_hash,
                role: req.role.trim().to_string(),
                status: req.status,
                image: req.image.filter(|s| !s.trim().is_empty()),
            })
            .await
            .map_err(|e| {
                let err = AuthError::from(e);
                if matches!(err, AuthError::Conflict) {
                    warn!("email already registered");
                }
                err
            })?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.id)
    }

    /// Verifies `pin` for the user whose email or mobile equals `identifier`.
    pub async fn authenticate(
        &self,
        identifier: &str,
        pin: Pin,
    ) -> Result<(Session, User), AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(AuthError::Validation("Email or mobile is required".into()));
        }
        let email = normalize_email(identifier);
        let mobile = identifier.parse::<i64>().ok();

        let user = self
            .store
            .find_by_identifier(&email, mobile)
            .await?
            .ok_or_else(|| {
                warn!("login unknown identifier");
                AuthError::NotFound
            })?;

        let hash = user.pin_hash.clone();
        let ok = tokio::task::spawn_blocking(move || verify_pin(pin.as_str(), &hash))
            .await
            .context("pin verification task")??;
        if !ok {
            warn!(user_id = %user.id, "login invalid pin");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.keys.sign(user.id).context("sign session token")?;
        info!(user_id = %user.id, "user logged in");
        Ok((
            Session {
                token,
                ttl_seconds: self.keys.ttl_seconds(),
            },
            user,
        ))
    }

    /// Record for an already verified session.
    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store.find_by_id(user_id).await?.ok_or_else(|| {
            warn!(user_id = %user_id, "session user not found");
            AuthError::NotFound
        })
    }

    /// All records; the caller must hold the admin role.
    pub async fn list_users(&self, caller: Uuid) -> Result<Vec<User>, AuthError> {
        let caller = self.profile(caller).await.map_err(|e| match e {
            AuthError::NotFound => AuthError::InvalidToken,
            other => other,
        })?;
        if caller.role != ADMIN_ROLE {
            warn!(user_id = %caller.id, role = %caller.role, "user listing denied");
            return Err(AuthError::Forbidden);
        }
        Ok(self.store.list().await?)
    }
}

async fn hash_blocking(pin: Pin) -> Result<String, AuthError> {
    let hash = tokio::task::spawn_blocking(move || hash_pin(pin.as_str()))
        .await
        .context("pin hashing task")??;
    Ok(hash)
}
