//! Invitation model - a pending offer for an email to join an organization.
//!
//! Invitations have no state column: a row exists while the invitation is
//! pending and is deleted when it is accepted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Invitation entity.
#[derive(Debug, Clone, FromRow)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    /// Normalized email.
    pub email: String,
    pub created_utc: DateTime<Utc>,
}

impl Invitation {
    pub fn new(organization_id: Uuid, email: String) -> Self {
        Self {
            invitation_id: Uuid::new_v4(),
            organization_id,
            email,
            created_utc: Utc::now(),
        }
    }
}

/// Pending invitation as listed on the organization dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvitationResponse {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(i: Invitation) -> Self {
        Self {
            invitation_id: i.invitation_id,
            organization_id: i.organization_id,
            email: i.email,
            created_utc: i.created_utc,
        }
    }
}
