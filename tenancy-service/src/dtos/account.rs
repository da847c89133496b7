use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{AccountResponse, GroupResponse, InvitationResponse, OrganizationResponse};
use crate::services::{CapabilitySet, TokenResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

/// Account plus a fresh session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub account: AccountResponse,
    pub session: TokenResponse,
    #[schema(example = "Welcome!")]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProfileNameRequest {
    /// Omit or leave blank to fall back to the email.
    #[validate(length(max = 256, message = "Display name must be at most 256 characters"))]
    #[schema(example = "Jane Doe")]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ClaimAccountRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    /// Omit to receive a random password that must be replaced later.
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountMessageResponse {
    pub account: AccountResponse,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirm {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct VerifyEmailQuery {
    #[validate(length(min = 1, message = "Token is required"))]
    #[param(example = "abc123token")]
    pub token: String,
}

/// Member row of the dashboard's active organization.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardMember {
    pub account_id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub is_owner: bool,
    pub is_current_user: bool,
    pub joined_utc: DateTime<Utc>,
    pub group_ids: Vec<Uuid>,
}

/// Everything the signed-in account sees on its landing page.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub account: AccountResponse,
    pub capabilities: CapabilitySet,
    pub organizations: Vec<OrganizationResponse>,
    pub active_organization: Option<OrganizationResponse>,
    /// Empty unless the account may see groups and members.
    pub members: Vec<DashboardMember>,
    pub groups: Vec<GroupResponse>,
    /// Only listed for the owner of the active organization.
    pub pending_invitations: Vec<InvitationResponse>,
}
