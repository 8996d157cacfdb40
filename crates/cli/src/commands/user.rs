//! Account maintenance.
//!
//! Registration always creates plain users; the admin role is granted here.

use lumiere_core::{Email, EmailError, Role};
use lumiere_storefront::db::{self, RepositoryError, UserRepository};
use tracing::info;

use super::{MissingDatabaseUrl, database_url};

#[derive(Debug, thiserror::Error)]
pub enum UserCommandError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    #[error("No account with email {0}")]
    UnknownUser(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// Set the role of the account registered under `email`.
///
/// # Errors
///
/// Returns an error if the email is malformed, the account does not exist,
/// or the database is unreachable.
pub async fn set_role(email: &str, role: Role) -> Result<(), UserCommandError> {
    let email = Email::parse(email)?;
    let pool = db::create_pool(&database_url()?).await?;

    let user = UserRepository::new(&pool)
        .set_role(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => UserCommandError::UnknownUser(email.to_string()),
            other => UserCommandError::Repository(other),
        })?;

    info!(user_id = %user.id, email = %email, role = %role, "Role updated");
    Ok(())
}
