use anyhow::Context;
use axum::http::StatusCode;
use sqlx::PgPool;
use tracing::{info, warn};

use super::dto::{AuthResponse, RegisterRequest, UpdateProfileRequest};
use super::jwt::JwtKeys;
use super::password::{
    hash_password, is_valid_email, normalize_email, verify_password, MIN_PASSWORD_LEN,
};
use super::repo_types::{offset_from_minutes, User};
use crate::alerts::repo as alerts_repo;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password too short")]
    PasswordTooShort,
    #[error("Display name must not be empty")]
    EmptyDisplayName,
    #[error("UTC offset {0} minutes is out of range")]
    InvalidOffset(i32),
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found")]
    UnknownUser,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidEmail
            | AuthError::PasswordTooShort
            | AuthError::EmptyDisplayName
            | AuthError::InvalidOffset(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::UnknownUser => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for (StatusCode, String) {
    fn from(e: AuthError) -> Self {
        if let AuthError::Internal(inner) = &e {
            tracing::error!(error = %inner, "auth failure");
        }
        (e.status(), e.to_string())
    }
}

fn check_display_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::EmptyDisplayName);
    }
    Ok(name.to_string())
}

fn check_offset(minutes: i32) -> Result<i32, AuthError> {
    offset_from_minutes(minutes)
        .map(|_| minutes)
        .ok_or(AuthError::InvalidOffset(minutes))
}

pub fn issue_tokens(keys: &JwtKeys, user: User) -> Result<AuthResponse, AuthError> {
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: user.into(),
    })
}

/// Creates the account and its default alert settings in one transaction.
pub async fn register(db: &PgPool, req: RegisterRequest) -> Result<User, AuthError> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::InvalidEmail);
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    let display_name = check_display_name(&req.display_name)?;
    let offset = check_offset(req.utc_offset_minutes)?;

    if User::find_by_email(db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(&req.password)?;
    let mut tx = db.begin().await.context("begin tx")?;
    let user = User::create_tx(&mut tx, &email, &hash, &display_name, offset).await?;
    alerts_repo::insert_default_settings_tx(&mut tx, user.id).await?;
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(db: &PgPool, email: &str, password: &str) -> Result<User, AuthError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AuthError::InvalidEmail);
    }
    let Some(user) = User::find_by_email(db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }
    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

pub async fn update_profile(
    db: &PgPool,
    user: User,
    req: UpdateProfileRequest,
) -> Result<User, AuthError> {
    let display_name = match req.display_name {
        Some(name) => check_display_name(&name)?,
        None => user.display_name,
    };
    let offset = match req.utc_offset_minutes {
        Some(minutes) => check_offset(minutes)?,
        None => user.utc_offset_minutes,
    };
    User::update_profile(db, user.id, &display_name, offset)
        .await?
        .ok_or(AuthError::UnknownUser)
}
