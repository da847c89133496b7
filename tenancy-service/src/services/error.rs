use service_core::error::AppError;
use thiserror::Error;

/// Failures of the domain services. Precondition violations carry a message
/// fit for showing to the user; infrastructure failures do not.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    InvalidEmail(String),

    #[error("Account with email '{0}' already exists.")]
    EmailAlreadyRegistered(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Account is already registered")]
    AccountAlreadyRegistered,

    #[error("Password has already been set")]
    PasswordAlreadySet,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Group not found")]
    GroupNotFound,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("This email is already a member of this organization or is the owner.")]
    AlreadyMember,

    #[error("Account is already a member of this group")]
    AlreadyInGroup,

    #[error("Account is not a member of this organization")]
    NotAMember,

    #[error("Organization has no default group for new members")]
    MissingDefaultGroup,

    #[error("Account cannot create or manage organizations while being a member of another organization")]
    CannotCreateOrganization,

    #[error("Access denied")]
    AccessDenied,
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::EmailError(e) => AppError::EmailError(e),
            ServiceError::ValidationError(_)
            | ServiceError::InvalidEmail(_)
            | ServiceError::PasswordMismatch
            | ServiceError::InvalidToken
            | ServiceError::TokenExpired => AppError::BadRequest(anyhow::anyhow!(message)),
            ServiceError::EmailAlreadyRegistered(_)
            | ServiceError::AccountAlreadyRegistered
            | ServiceError::PasswordAlreadySet
            | ServiceError::AlreadyMember
            | ServiceError::AlreadyInGroup
            | ServiceError::CannotCreateOrganization => AppError::Conflict(anyhow::anyhow!(message)),
            ServiceError::InvalidCredentials => AppError::AuthError(anyhow::anyhow!(message)),
            ServiceError::AccountNotFound
            | ServiceError::OrganizationNotFound
            | ServiceError::GroupNotFound
            | ServiceError::InvitationNotFound => AppError::NotFound(anyhow::anyhow!(message)),
            ServiceError::NotAMember | ServiceError::AccessDenied => {
                AppError::Forbidden(anyhow::anyhow!(message))
            }
            ServiceError::MissingDefaultGroup => AppError::InternalError(anyhow::anyhow!(message)),
        }
    }
}

/// Maps a unique-constraint violation to `conflict`, anything else to a
/// database error.
pub(crate) fn unique_violation_or(err: sqlx::Error, conflict: ServiceError) -> ServiceError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => conflict,
        _ => ServiceError::Database(err),
    }
}
