use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest},
        jwt::JwtKeys,
        password::{check_credentials, hash_password},
        repo::UserRepo,
        repo_types::{NewUser, StoreError},
    },
    error::{AppError, FieldError},
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

/// One entry per blank credential field.
fn missing_credentials(email: &str, password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    }
    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    errors
}

fn validate_signup(req: &SignupRequest) -> Result<(), AppError> {
    let missing = missing_credentials(&req.email, &req.password);
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }
    let mut errors = Vec::new();
    if !is_valid_email(&req.email) {
        errors.push(FieldError::new("email", "Invalid email format"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters long",
        ));
    }
    if req.name.chars().count() < MIN_NAME_LEN {
        errors.push(FieldError::new(
            "name",
            "Name must be at least 2 characters long",
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Registers a user and mints their first token.
pub async fn signup(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    mut req: SignupRequest,
) -> Result<AuthResponse, AppError> {
    req.email = normalize_email(&req.email);
    req.name = req.name.trim().to_owned();
    validate_signup(&req)?;

    // Advisory only; the unique index decides under concurrent signups.
    if users.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::Conflict("User already exists with this email".into()));
    }

    let hash = hash_password(&req.password)?;
    let user = users
        .create(NewUser {
            email: &req.email,
            password_hash: &hash,
            name: &req.name,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => {
                warn!(email = %req.email, "email registered concurrently");
                AppError::Conflict("User already exists with this email".into())
            }
            StoreError::Other(e) => AppError::Internal(e),
        })?;

    let token = keys.sign(user.id, &user.email)?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

/// Exchanges credentials for a token. Unknown email and wrong password
/// fail identically.
pub async fn login(
    users: &dyn UserRepo,
    keys: &JwtKeys,
    mut req: LoginRequest,
) -> Result<AuthResponse, AppError> {
    req.email = normalize_email(&req.email);
    let missing = missing_credentials(&req.email, &req.password);
    if !missing.is_empty() {
        return Err(AppError::Validation(missing));
    }
    if !is_valid_email(&req.email) {
        return Err(AppError::validation("email", "Invalid email format"));
    }

    let found = users.find_by_email(&req.email).await?;
    let matched = check_credentials(&req.password, found.as_ref().map(|u| u.password_hash.as_str()))?;
    let user = match found {
        Some(user) if matched => user,
        Some(user) => {
            warn!(user_id = user.id, "login invalid password");
            return Err(invalid_credentials());
        }
        None => {
            warn!(email = %req.email, "login unknown email");
            return Err(invalid_credentials());
        }
    };

    let token = keys.sign(user.id, &user.email)?;
    info!(user_id = user.id, "user logged in");
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

/// Resolves a token to the current public view of its user.
pub async fn verify(users: &dyn UserRepo, keys: &JwtKeys, token: &str) -> Result<PublicUser, AppError> {
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AppError::InvalidToken("Invalid or expired token".into())
    })?;
    current_user(users, claims.sub).await
}

pub async fn current_user(users: &dyn UserRepo, user_id: i64) -> Result<PublicUser, AppError> {
    users
        .find_by_id(user_id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| {
            warn!(user_id, "token subject no longer exists");
            AppError::NotFound("User not found".into())
        })
}
