//! Authentication service
//!
//! Login issues an opaque session token (UUID v4) stored in `sessions`.
//! Every authenticated request resolves the token back to a [`Principal`]
//! carrying the user's roles and effective permissions.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Principal, Session, User};
use crate::services::password::{
    hash_password, password_policy_violation, verify_password,
};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::{ServiceError, ServiceResult};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Principal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    rate_limiter: Arc<LoginRateLimiter>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
        session_ttl_hours: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            rate_limiter,
            session_ttl: Duration::hours(session_ttl_hours.max(1)),
        }
    }

    pub async fn login(&self, input: LoginInput, ip: Option<IpAddr>) -> ServiceResult<LoginResponse> {
        if let Some(ip) = ip {
            if self.rate_limiter.is_ip_limited(ip).await {
                return Err(ServiceError::RateLimited(
                    "Too many login requests, try again in a minute".into(),
                ));
            }
            self.rate_limiter.record_ip_request(ip).await;
        }

        let email = input.email.trim();
        if email.is_empty() || input.password.is_empty() {
            return Err(ServiceError::validation("Email and password are required"));
        }
        if self.rate_limiter.is_email_limited(email).await {
            return Err(ServiceError::RateLimited(
                "Too many failed attempts, try again later".into(),
            ));
        }

        let user = match self.user_repo.get_by_email(email).await? {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failed_attempt(email).await;
                return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
            }
        };

        if !verify_password(&input.password, &user.password_hash)? {
            self.rate_limiter.record_failed_attempt(email).await;
            tracing::info!(user_id = user.id, "Failed login");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        if !user.can_login() {
            return Err(ServiceError::Forbidden(format!(
                "Account is {}",
                user.status.as_str().to_lowercase()
            )));
        }

        self.rate_limiter.clear_email_attempts(email).await;

        let now = Utc::now();
        self.user_repo.update_last_login(user.id, now).await?;
        let session = self
            .session_repo
            .create(&Session::new(user.id, self.session_ttl))
            .await?;

        let mut principal = load_principal(self.user_repo.as_ref(), user).await?;
        principal.user.last_login_at = Some(now);
        tracing::info!(user_id = principal.user.id, "User logged in");

        Ok(LoginResponse {
            token: session.id,
            expires_at: session.expires_at,
            user: principal,
        })
    }

    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        self.session_repo.delete(token).await?;
        Ok(())
    }

    /// Resolve a bearer token to its principal
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Principal> {
        let session = self
            .session_repo
            .get_by_id(token)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid session".into()))?;

        if session.is_expired() {
            self.session_repo.delete(token).await?;
            return Err(ServiceError::Unauthorized("Session expired".into()));
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid session".into()))?;

        if !user.can_login() {
            return Err(ServiceError::Unauthorized("Account is disabled".into()));
        }

        load_principal(self.user_repo.as_ref(), user).await
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        input: ChangePasswordInput,
    ) -> ServiceResult<()> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User"))?;

        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(ServiceError::validation("Current password is incorrect"));
        }
        if let Some(reason) = password_policy_violation(&input.new_password) {
            return Err(ServiceError::Validation(reason));
        }
        if input.new_password == input.current_password {
            return Err(ServiceError::validation(
                "New password must differ from the current one",
            ));
        }

        user.password_hash = hash_password(&input.new_password)?;
        user.must_change_password = false;
        self.user_repo.update(&user).await?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Purge expired sessions and stale rate-limit entries
    pub async fn cleanup(&self) -> ServiceResult<u64> {
        let removed = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to purge sessions")?;
        self.rate_limiter.cleanup().await;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }
}

/// Attach role names and the union of their permissions to a user
pub(crate) async fn load_principal(
    user_repo: &dyn UserRepository,
    user: User,
) -> ServiceResult<Principal> {
    let roles = user_repo.get_role_names(user.id).await?;
    let permissions = user_repo
        .get_permission_names(user.id)
        .await?
        .into_iter()
        .collect();
    Ok(Principal {
        user,
        roles,
        permissions,
    })
}
