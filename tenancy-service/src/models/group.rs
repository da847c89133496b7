//! Group model - a named set of organization members sharing access rights.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::AccessRight;

pub const ADMINISTRATORS_GROUP_NAME: &str = "Administrators";
pub const TEAM_MEMBERS_GROUP_NAME: &str = "Team Members";

/// Group entity.
#[derive(Debug, Clone, FromRow)]
pub struct Group {
    pub group_id: Uuid,
    pub organization_id: Uuid,
    pub group_name: String,
    /// Ordered access right codes.
    pub access_right_codes: Vec<String>,
    pub is_default_for_new_members: bool,
    pub created_utc: DateTime<Utc>,
}

impl Group {
    pub fn new(
        organization_id: Uuid,
        group_name: &str,
        access_rights: &[AccessRight],
        is_default_for_new_members: bool,
    ) -> Self {
        Self {
            group_id: Uuid::new_v4(),
            organization_id,
            group_name: group_name.to_string(),
            access_right_codes: access_rights.iter().map(|r| r.as_str().to_string()).collect(),
            is_default_for_new_members,
            created_utc: Utc::now(),
        }
    }

    /// Full access, not the default for joiners.
    pub fn administrators(organization_id: Uuid) -> Self {
        Self::new(
            organization_id,
            ADMINISTRATORS_GROUP_NAME,
            &[AccessRight::FullAccess],
            false,
        )
    }

    /// Read access to groups and members; where new joiners land.
    pub fn team_members(organization_id: Uuid) -> Self {
        Self::new(
            organization_id,
            TEAM_MEMBERS_GROUP_NAME,
            &[AccessRight::SeeOrganizationGroupsAndMembers],
            true,
        )
    }

    /// Known rights in stored order; unknown codes are skipped.
    pub fn access_rights(&self) -> Vec<AccessRight> {
        self.access_right_codes
            .iter()
            .filter_map(|code| code.parse().ok())
            .collect()
    }

    pub fn grants(&self, right: AccessRight) -> bool {
        self.access_rights()
            .iter()
            .any(|r| *r == AccessRight::FullAccess || *r == right)
    }

    pub fn is_administrators_group(&self) -> bool {
        self.group_name == ADMINISTRATORS_GROUP_NAME
    }

    pub fn is_team_members_group(&self) -> bool {
        self.group_name == TEAM_MEMBERS_GROUP_NAME
    }
}

/// Group with its members, as listed on the organization dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GroupResponse {
    pub group_id: Uuid,
    pub name: String,
    pub access_rights: Vec<AccessRight>,
    pub is_default_for_new_members: bool,
    pub member_account_ids: Vec<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl GroupResponse {
    pub fn new(group: Group, member_account_ids: Vec<Uuid>) -> Self {
        Self {
            access_rights: group.access_rights(),
            group_id: group.group_id,
            name: group.group_name,
            is_default_for_new_members: group.is_default_for_new_members,
            member_account_ids,
            created_utc: group.created_utc,
        }
    }
}
