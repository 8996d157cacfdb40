//! Authentication service.
//!
//! Password accounts with argon2id hashes and stateless HS256 access tokens.

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, IssuedToken, TokenError, TokenSigner};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::instrument;

use lumiere_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::{ProfileChanges, UserRepository};
use crate::models::{CurrentUser, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Registration input as received from the client.
#[derive(Debug, Clone, Default)]
pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub phone: Option<&'a str>,
}

/// Profile update input. Blank optional fields are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub current_password: Option<&'a str>,
    pub new_password: Option<&'a str>,
}

/// A user with a freshly issued access token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: IssuedToken,
}

/// Authentication service.
///
/// Handles registration, login and profile maintenance.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: &'a TokenSigner,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenSigner) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens,
        }
    }

    /// Register a new user and issue a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` if the name is blank.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: &Registration<'_>) -> Result<Session, AuthError> {
        let name = required(input.name, "name")?;
        let email = Email::parse(required(input.email, "email")?)?;
        validate_password(input.password)?;

        if self.users.email_exists(&email).await? {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(input.password)?;
        let phone = input.phone.map(str::trim).filter(|p| !p.is_empty());

        // A concurrent registration can still win the race; the unique index decides
        let user = self
            .users
            .create(name, &email, &password_hash, phone)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        self.session_for(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` if email or password is blank.
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = required(email, "email")?;
        if password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }

        // Unknown and malformed emails look the same as a wrong password
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let credentials = self
            .users
            .get_credentials_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        self.session_for(credentials.user)
    }

    /// Load the current user's account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn profile(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update name, phone, address and optionally the password.
    ///
    /// A new password is only accepted together with the correct current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingField` if a new password is given without the current one.
    /// Returns `AuthError::WrongCurrentPassword` if the current password does not match.
    /// Returns `AuthError::WeakPassword` if the new password is too short.
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    #[instrument(skip(self, update), fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate<'_>,
    ) -> Result<User, AuthError> {
        let mut changes = ProfileChanges {
            name: non_blank(update.name),
            phone: non_blank(update.phone),
            address: non_blank(update.address),
            password_hash: None,
        };

        if let Some(new_password) = update.new_password.filter(|p| !p.is_empty()) {
            let current = update
                .current_password
                .filter(|p| !p.is_empty())
                .ok_or(AuthError::MissingField("current_password"))?;

            let stored = self
                .users
                .get_password_hash(user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?;
            verify_password(current, &stored).map_err(|_| AuthError::WrongCurrentPassword)?;

            validate_password(new_password)?;
            changes.password_hash = Some(hash_password(new_password)?);
        }

        self.users
            .update_profile(user_id, &changes)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    fn session_for(&self, user: User) -> Result<Session, AuthError> {
        let token = self.tokens.issue(&CurrentUser::from(&user))?;
        Ok(Session { user, token })
    }
}

fn required<'s>(value: &'s str, field: &'static str) -> Result<&'s str, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(trimmed)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("rosewater").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("rosewater", &hash).is_ok());
        assert!(matches!(
            verify_password("Rosewater", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same-pass").unwrap(), hash_password("same-pass").unwrap());
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        // Counted in characters, not bytes
        assert!(validate_password("пароль").is_ok());
        assert!(validate_password("ключ").is_err());
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Anna ", "name").unwrap(), "Anna");
        assert!(matches!(
            required("   ", "name"),
            Err(AuthError::MissingField("name"))
        ));
    }
}
