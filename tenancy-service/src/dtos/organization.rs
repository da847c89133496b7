use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{AccountResponse, InvitationResponse, OrganizationResponse};
use crate::services::TokenResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OrganizationNameRequest {
    /// Blank or missing resets to the default name.
    #[validate(length(max = 256, message = "Name must be at most 256 characters"))]
    #[schema(example = "Acme Inc.")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationMessageResponse {
    pub organization: OrganizationResponse,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "colleague@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationMessageResponse {
    pub invitation: InvitationResponse,
    pub message: String,
}

/// What the invitee sees before accepting.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationDetailsResponse {
    pub invitation_id: Uuid,
    pub email: String,
    pub organization_name: String,
    #[schema(example = "owner@example.com")]
    pub owner_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptInvitationResponse {
    pub account: AccountResponse,
    pub organization: OrganizationResponse,
    /// Issued when accepting created the account.
    pub session: Option<TokenResponse>,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupMemberRequest {
    pub account_id: Uuid,
}
