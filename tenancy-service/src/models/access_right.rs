//! Permission tags carried by organization groups.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessRight {
    /// Implies every other right.
    FullAccess,
    EditOrganizationName,
    InviteOrganizationMembers,
    SeeOrganizationGroupsAndMembers,
    MoveOrganizationMembersIntoGroups,
    EditCustomLogoSettings,
    EditCustomDomainSettings,
}

impl AccessRight {
    pub const ALL: [AccessRight; 7] = [
        AccessRight::FullAccess,
        AccessRight::EditOrganizationName,
        AccessRight::InviteOrganizationMembers,
        AccessRight::SeeOrganizationGroupsAndMembers,
        AccessRight::MoveOrganizationMembersIntoGroups,
        AccessRight::EditCustomLogoSettings,
        AccessRight::EditCustomDomainSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRight::FullAccess => "full_access",
            AccessRight::EditOrganizationName => "edit_organization_name",
            AccessRight::InviteOrganizationMembers => "invite_organization_members",
            AccessRight::SeeOrganizationGroupsAndMembers => "see_organization_groups_and_members",
            AccessRight::MoveOrganizationMembersIntoGroups => {
                "move_organization_members_into_groups"
            }
            AccessRight::EditCustomLogoSettings => "edit_custom_logo_settings",
            AccessRight::EditCustomDomainSettings => "edit_custom_domain_settings",
        }
    }
}

impl std::fmt::Display for AccessRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessRight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessRight::ALL
            .into_iter()
            .find(|right| right.as_str() == s)
            .ok_or_else(|| format!("Unknown access right: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_parse_back() {
        for right in AccessRight::ALL {
            assert_eq!(right.as_str().parse::<AccessRight>(), Ok(right));
        }
        assert!("delete_everything".parse::<AccessRight>().is_err());
    }
}
