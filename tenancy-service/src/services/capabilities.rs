//! What the current visitor may see and do. Anonymous visitors are `None`.

use serde::Serialize;
use utoipa::ToSchema;

use super::organization::OrganizationDomainService;
use super::ServiceError;
use crate::models::{AccessRight, Account, Capability};

#[derive(Clone)]
pub struct CapabilitiesService {
    organizations: OrganizationDomainService,
}

/// All capabilities of one visitor, for clients that render navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CapabilitySet {
    pub can_subscribe_to_membership_plans: bool,
    pub can_purchase_packages: bool,
    pub can_see_left_navigation: bool,
    pub can_see_top_navigation_on_large_screen_width: bool,
    pub can_see_user_info_in_navigation: bool,
    pub can_see_profile_dropdown_in_side_navigation: bool,
    pub can_see_own_profile_name: bool,
    pub can_see_footer_on_full_page: bool,
    pub must_be_forced_to_claim_unregistered_account: bool,
    pub can_present_landingpage_on_custom_domain: bool,
    pub can_present_own_logo_on_landingpage: bool,
    pub can_present_ad_free_landingpage: bool,
    pub can_edit_organization_name: bool,
    pub can_edit_custom_domain_setting: bool,
    pub can_edit_custom_logo_setting: bool,
    pub can_invite_organization_members: bool,
    pub can_see_organization_groups_and_members: bool,
    pub can_move_organization_members_into_groups: bool,
    pub can_switch_organizations: bool,
}

impl CapabilitiesService {
    pub fn new(organizations: OrganizationDomainService) -> Self {
        Self { organizations }
    }

    // Presentation

    pub fn can_see_left_navigation(account: Option<&Account>) -> bool {
        account.is_some()
    }

    pub fn can_see_top_navigation_on_large_screen_width(account: Option<&Account>) -> bool {
        account.is_some()
    }

    pub fn can_see_user_info_in_navigation(account: Option<&Account>) -> bool {
        account.is_some_and(Account::is_registered)
    }

    pub fn can_see_profile_dropdown_in_side_navigation(account: Option<&Account>) -> bool {
        account.is_some_and(Account::is_registered)
    }

    pub fn can_see_own_profile_name(account: Option<&Account>) -> bool {
        account.is_some_and(|a| a.display_name.is_some())
    }

    pub fn can_see_footer_on_full_page(account: Option<&Account>) -> bool {
        account.is_none()
    }

    pub fn must_be_forced_to_claim_unregistered_account(account: Option<&Account>) -> bool {
        account.is_some_and(|a| !a.is_registered())
    }

    // Ownership

    pub async fn can_subscribe_to_membership_plans(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        match account {
            Some(account) => {
                self.organizations
                    .currently_active_organization_is_own_organization(account.account_id)
                    .await
            }
            None => Ok(false),
        }
    }

    pub async fn can_purchase_packages(&self, account: Option<&Account>) -> Result<bool, ServiceError> {
        self.can_subscribe_to_membership_plans(account).await
    }

    pub async fn can_switch_organizations(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        match account {
            Some(account) => {
                self.organizations
                    .account_can_switch_organizations(account.account_id)
                    .await
            }
            None => Ok(false),
        }
    }

    // Membership plan of the active organization

    async fn has_capability(
        &self,
        account: Option<&Account>,
        capability: Capability,
    ) -> Result<bool, ServiceError> {
        let Some(account) = account else {
            return Ok(false);
        };
        Ok(self
            .organizations
            .membership_plan_of_currently_active_organization(account.account_id)
            .await?
            .is_some_and(|plan| plan.has_capability(capability)))
    }

    pub async fn can_present_landingpage_on_custom_domain(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_capability(account, Capability::CustomDomain).await
    }

    pub async fn can_present_own_logo_on_landingpage(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_capability(account, Capability::CustomLogoOnLandingpage)
            .await
    }

    pub async fn can_present_ad_free_landingpage(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_capability(account, Capability::AdFreeLandingpages)
            .await
    }

    // Access rights in the active organization

    async fn has_access_right(
        &self,
        account: Option<&Account>,
        right: AccessRight,
    ) -> Result<bool, ServiceError> {
        match account {
            Some(account) => {
                self.organizations
                    .account_has_access_right(account.account_id, right)
                    .await
            }
            None => Ok(false),
        }
    }

    pub async fn can_edit_organization_name(&self, account: Option<&Account>) -> Result<bool, ServiceError> {
        self.has_access_right(account, AccessRight::EditOrganizationName)
            .await
    }

    pub async fn can_edit_custom_domain_setting(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_access_right(account, AccessRight::EditCustomDomainSettings)
            .await
    }

    pub async fn can_edit_custom_logo_setting(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_access_right(account, AccessRight::EditCustomLogoSettings)
            .await
    }

    pub async fn can_invite_organization_members(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_access_right(account, AccessRight::InviteOrganizationMembers)
            .await
    }

    pub async fn can_see_organization_groups_and_members(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_access_right(account, AccessRight::SeeOrganizationGroupsAndMembers)
            .await
    }

    pub async fn can_move_organization_members_into_groups(
        &self,
        account: Option<&Account>,
    ) -> Result<bool, ServiceError> {
        self.has_access_right(account, AccessRight::MoveOrganizationMembersIntoGroups)
            .await
    }

    pub async fn snapshot(&self, account: Option<&Account>) -> Result<CapabilitySet, ServiceError> {
        Ok(CapabilitySet {
            can_subscribe_to_membership_plans: self.can_subscribe_to_membership_plans(account).await?,
            can_purchase_packages: self.can_purchase_packages(account).await?,
            can_see_left_navigation: Self::can_see_left_navigation(account),
            can_see_top_navigation_on_large_screen_width:
                Self::can_see_top_navigation_on_large_screen_width(account),
            can_see_user_info_in_navigation: Self::can_see_user_info_in_navigation(account),
            can_see_profile_dropdown_in_side_navigation:
                Self::can_see_profile_dropdown_in_side_navigation(account),
            can_see_own_profile_name: Self::can_see_own_profile_name(account),
            can_see_footer_on_full_page: Self::can_see_footer_on_full_page(account),
            must_be_forced_to_claim_unregistered_account:
                Self::must_be_forced_to_claim_unregistered_account(account),
            can_present_landingpage_on_custom_domain: self
                .can_present_landingpage_on_custom_domain(account)
                .await?,
            can_present_own_logo_on_landingpage: self
                .can_present_own_logo_on_landingpage(account)
                .await?,
            can_present_ad_free_landingpage: self.can_present_ad_free_landingpage(account).await?,
            can_edit_organization_name: self.can_edit_organization_name(account).await?,
            can_edit_custom_domain_setting: self.can_edit_custom_domain_setting(account).await?,
            can_edit_custom_logo_setting: self.can_edit_custom_logo_setting(account).await?,
            can_invite_organization_members: self.can_invite_organization_members(account).await?,
            can_see_organization_groups_and_members: self
                .can_see_organization_groups_and_members(account)
                .await?,
            can_move_organization_members_into_groups: self
                .can_move_organization_members_into_groups(account)
                .await?,
            can_switch_organizations: self.can_switch_organizations(account).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_visitors_see_the_footer_only() {
        assert!(CapabilitiesService::can_see_footer_on_full_page(None));
        assert!(!CapabilitiesService::can_see_left_navigation(None));
        assert!(!CapabilitiesService::can_see_user_info_in_navigation(None));
        assert!(!CapabilitiesService::must_be_forced_to_claim_unregistered_account(None));
    }

    #[test]
    fn guests_must_claim_their_account() {
        let guest = Account::new_unregistered("hash".to_string());
        assert!(CapabilitiesService::can_see_left_navigation(Some(&guest)));
        assert!(!CapabilitiesService::can_see_profile_dropdown_in_side_navigation(Some(&guest)));
        assert!(CapabilitiesService::must_be_forced_to_claim_unregistered_account(Some(&guest)));
    }

    #[test]
    fn profile_name_needs_a_display_name() {
        let mut account =
            Account::new_registered("a@example.com".to_string(), "hash".to_string(), false);
        assert!(!CapabilitiesService::can_see_own_profile_name(Some(&account)));
        account.set_display_name(Some("Jane"));
        assert!(CapabilitiesService::can_see_own_profile_name(Some(&account)));
    }
}
