//! Organization vertical: organizations, groups, invitations and access rights.
//!
//! Accounts are referenced by id only; account state goes through
//! [`AccountDomainService`].

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::account::AccountDomainService;
use super::email::{EmailProvider, InvitationEmail};
use super::metrics::{self, INVITATIONS_ACCEPTED_TOTAL, INVITATIONS_SENT_TOTAL, ORGANIZATIONS_CREATED_TOTAL};
use super::repository::OrganizationStore;
use super::ServiceError;
use crate::events::{DomainEvent, EventDispatcher};
use crate::models::{
    AccessRight, Account, EmailAddress, Group, Invitation, Iso639_1Code,
    MembershipPlan, Organization,
};

/// Outcome of accepting an invitation.
#[derive(Debug, Clone)]
pub struct AcceptedInvitation {
    /// The account as it is after joining.
    pub account: Account,
    pub organization: Organization,
    /// `true` when the acceptance registered a new account.
    pub is_new_account: bool,
}

#[derive(Clone)]
pub struct OrganizationDomainService {
    store: Arc<dyn OrganizationStore>,
    accounts: AccountDomainService,
    dispatcher: EventDispatcher,
    email: Arc<dyn EmailProvider>,
    base_url: String,
}

impl OrganizationDomainService {
    pub fn new(
        store: Arc<dyn OrganizationStore>,
        accounts: AccountDomainService,
        dispatcher: EventDispatcher,
        email: Arc<dyn EmailProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            accounts,
            dispatcher,
            email,
            base_url: base_url.into(),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.store.health_check().await
    }

    // ==================== Organizations ====================

    /// Creates an additional organization owned by `owner_account_id`.
    /// Accounts that joined another organization cannot own more.
    #[tracing::instrument(skip(self, name))]
    pub async fn create_organization(
        &self,
        owner_account_id: Uuid,
        name: Option<&str>,
    ) -> Result<Organization, ServiceError> {
        self.accounts.require(owner_account_id).await?;
        if !self
            .account_can_create_or_manage_organization(owner_account_id)
            .await?
        {
            return Err(ServiceError::CannotCreateOrganization);
        }
        provision_organization(self.store.as_ref(), owner_account_id, name).await
    }

    pub async fn get_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, ServiceError> {
        self.store.find_organization_by_id(organization_id).await
    }

    async fn require_organization(&self, organization_id: Uuid) -> Result<Organization, ServiceError> {
        self.get_organization_by_id(organization_id)
            .await?
            .ok_or(ServiceError::OrganizationNotFound)
    }

    /// Blank names reset to the localized default.
    #[tracing::instrument(skip(self, name))]
    pub async fn rename_organization(
        &self,
        organization_id: Uuid,
        name: Option<&str>,
    ) -> Result<Organization, ServiceError> {
        let mut organization = self.require_organization(organization_id).await?;
        organization.rename(name);
        self.store.update_organization(&organization).await?;
        tracing::info!("Organization renamed");
        Ok(organization)
    }

    pub fn organization_name(
        &self,
        organization: &Organization,
        locale: Option<Iso639_1Code>,
    ) -> String {
        organization.display_name(locale.unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_membership_plan(
        &self,
        organization_id: Uuid,
        plan: MembershipPlan,
    ) -> Result<Organization, ServiceError> {
        let mut organization = self.require_organization(organization_id).await?;
        organization.membership_plan_code = plan.as_str().to_string();
        self.store.update_organization(&organization).await?;
        tracing::info!("Membership plan changed");
        Ok(organization)
    }

    /// Owned organizations first, then joined ones.
    pub async fn all_organizations_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError> {
        let mut organizations = self.store.find_organizations_owned_by(account_id).await?;
        organizations.extend(self.store.find_organizations_joined_by(account_id).await?);
        Ok(organizations)
    }

    pub async fn account_joined_organizations(&self, account_id: Uuid) -> Result<bool, ServiceError> {
        Ok(!self
            .store
            .find_organizations_joined_by(account_id)
            .await?
            .is_empty())
    }

    pub async fn account_joined_organization(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .store
            .find_members_of_organization(organization_id)
            .await?
            .iter()
            .any(|(member_id, _)| *member_id == account_id))
    }

    pub async fn account_can_create_or_manage_organization(
        &self,
        account_id: Uuid,
    ) -> Result<bool, ServiceError> {
        Ok(!self.account_joined_organizations(account_id).await?)
    }

    /// Owner or joined member.
    pub async fn account_belongs_to_organization(
        &self,
        account_id: Uuid,
        organization: &Organization,
    ) -> Result<bool, ServiceError> {
        if organization.is_owned_by(account_id) {
            return Ok(true);
        }
        self.account_joined_organization(account_id, organization.organization_id)
            .await
    }

    pub async fn currently_active_organization_of_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<Organization>, ServiceError> {
        let account = self.accounts.require(account_id).await?;
        match account.currently_active_organization_id {
            Some(organization_id) => self.get_organization_by_id(organization_id).await,
            None => Ok(None),
        }
    }

    pub async fn currently_active_organization_is_own_organization(
        &self,
        account_id: Uuid,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .currently_active_organization_of_account(account_id)
            .await?
            .is_some_and(|organization| organization.is_owned_by(account_id)))
    }

    pub async fn membership_plan_of_currently_active_organization(
        &self,
        account_id: Uuid,
    ) -> Result<Option<MembershipPlan>, ServiceError> {
        Ok(self
            .currently_active_organization_of_account(account_id)
            .await?
            .map(|organization| organization.membership_plan()))
    }

    /// Owner first, then joined members in join order.
    pub async fn all_account_ids_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self
            .members_of_organization(organization_id)
            .await?
            .into_iter()
            .map(|(account_id, _)| account_id)
            .collect())
    }

    /// Same order as [`Self::all_account_ids_of_organization`], paired with the
    /// time each account joined. The owner joined when the organization was
    /// created.
    pub async fn members_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<(Uuid, DateTime<Utc>)>, ServiceError> {
        let organization = self.require_organization(organization_id).await?;
        let mut members = vec![(organization.owning_account_id, organization.created_utc)];
        members.extend(
            self.store
                .find_members_of_organization(organization_id)
                .await?
                .into_iter()
                .filter(|(id, _)| *id != organization.owning_account_id),
        );
        Ok(members)
    }

    // ==================== Switching ====================

    pub async fn account_can_switch_organizations(
        &self,
        account_id: Uuid,
    ) -> Result<bool, ServiceError> {
        Ok(self.all_organizations_for_account(account_id).await?.len() > 1)
    }

    /// Joined organizations first, then owned ones.
    pub async fn organizations_account_can_switch_to(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError> {
        let mut organizations = self.store.find_organizations_joined_by(account_id).await?;
        organizations.extend(self.store.find_organizations_owned_by(account_id).await?);
        Ok(organizations)
    }

    #[tracing::instrument(skip(self))]
    pub async fn switch_organization(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Organization, ServiceError> {
        let organization = self.require_organization(organization_id).await?;
        if !self
            .account_belongs_to_organization(account_id, &organization)
            .await?
        {
            return Err(ServiceError::NotAMember);
        }

        self.dispatcher
            .dispatch(DomainEvent::CurrentlyActiveOrganizationChanged {
                organization_id,
                affected_account_id: account_id,
            })
            .await?;
        Ok(organization)
    }

    // ==================== Invitations ====================

    /// False when an account with `email` owns or joined the organization.
    pub async fn email_can_be_invited_to_organization(
        &self,
        email: &str,
        organization: &Organization,
    ) -> Result<bool, ServiceError> {
        match self.accounts.find_by_email(email).await? {
            Some(account) => Ok(!self
                .account_belongs_to_organization(account.account_id, organization)
                .await?),
            None => Ok(true),
        }
    }

    /// Invites `email` and mails the invitation. A pending invitation of the
    /// same email to the same organization is reused and mailed again.
    #[tracing::instrument(skip(self, email))]
    pub async fn invite_email_to_organization(
        &self,
        email: &str,
        organization_id: Uuid,
    ) -> Result<Invitation, ServiceError> {
        let email = EmailAddress::parse(email).map_err(ServiceError::InvalidEmail)?;
        let organization = self.require_organization(organization_id).await?;

        if !self
            .email_can_be_invited_to_organization(email.as_str(), &organization)
            .await?
        {
            return Err(ServiceError::AlreadyMember);
        }

        let invitation = match self
            .store
            .find_invitation_by_organization_and_email(organization_id, email.as_str())
            .await?
        {
            Some(existing) => existing,
            None => {
                let invitation = Invitation::new(organization_id, email.into_string());
                self.store.insert_invitation(&invitation).await?;
                tracing::info!(invitation_id = %invitation.invitation_id, "Invitation created");
                invitation
            }
        };

        self.send_invitation_mail(&invitation, &organization).await?;
        Ok(invitation)
    }

    #[tracing::instrument(skip(self))]
    pub async fn resend_invitation(&self, invitation_id: Uuid) -> Result<Invitation, ServiceError> {
        let invitation = self
            .get_invitation_by_id(invitation_id)
            .await?
            .ok_or(ServiceError::InvitationNotFound)?;
        let organization = self.require_organization(invitation.organization_id).await?;
        self.send_invitation_mail(&invitation, &organization).await?;
        Ok(invitation)
    }

    pub fn invitation_accept_url(&self, invitation_id: Uuid) -> String {
        format!("{}/organization/invitation/{}", self.base_url, invitation_id)
    }

    /// Name of the organization owner as shown to invitees.
    pub async fn inviter_name(&self, organization: &Organization) -> Result<String, ServiceError> {
        Ok(self
            .accounts
            .find_by_id(organization.owning_account_id)
            .await?
            .map(|owner| owner.name_for_display())
            .unwrap_or_else(|| "Someone".to_string()))
    }

    async fn send_invitation_mail(
        &self,
        invitation: &Invitation,
        organization: &Organization,
    ) -> Result<(), ServiceError> {
        let mail = InvitationEmail {
            organization_name: self.organization_name(organization, None),
            inviter_name: self.inviter_name(organization).await?,
            accept_url: self.invitation_accept_url(invitation.invitation_id),
        };

        self.email
            .send_invitation_email(&invitation.email, &mail)
            .await
            .map_err(|e| ServiceError::EmailError(e.to_string()))?;

        metrics::inc(&INVITATIONS_SENT_TOTAL);
        tracing::info!(
            invitation_id = %invitation.invitation_id,
            organization_id = %organization.organization_id,
            "Invitation mail sent"
        );
        Ok(())
    }

    /// Newest first.
    pub async fn pending_invitations(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, ServiceError> {
        self.store.find_invitations_of_organization(organization_id).await
    }

    pub async fn has_pending_invitations(&self, organization_id: Uuid) -> Result<bool, ServiceError> {
        Ok(!self.pending_invitations(organization_id).await?.is_empty())
    }

    pub async fn get_invitation_by_id(
        &self,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, ServiceError> {
        self.store.find_invitation_by_id(invitation_id).await
    }

    /// Accepts an invitation on behalf of the signed-in account, or of a new
    /// account registered for the invited email.
    ///
    /// Accounts that already belong to the organization only consume the
    /// invitation. Signed-in guests claim the invited email. Anonymous
    /// acceptance for an email that already has an account is refused; that
    /// account has to sign in first.
    ///
    /// Registering or claiming commits before the membership does. The
    /// invitation is looked up again right before that step, but a concurrent
    /// acceptance landing in between still leaves the account without a
    /// membership; the caller then sees `InvitationNotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn accept_invitation(
        &self,
        invitation_id: Uuid,
        signed_in_account_id: Option<Uuid>,
    ) -> Result<AcceptedInvitation, ServiceError> {
        let invitation = self.pending_invitation(invitation_id).await?;
        let organization = self.require_organization(invitation.organization_id).await?;
        let default_group = self
            .default_group_for_new_members(organization.organization_id)
            .await?;

        let (account, is_new_account) = match signed_in_account_id {
            Some(account_id) => {
                let account = self.accounts.require(account_id).await?;
                if self
                    .account_belongs_to_organization(account_id, &organization)
                    .await?
                {
                    self.store.accept_invitation(&invitation, account_id, None).await?;
                    tracing::info!(account_id = %account_id, "Invitation consumed by existing member");
                    return Ok(AcceptedInvitation {
                        account,
                        organization,
                        is_new_account: false,
                    });
                }

                if !account.is_registered() {
                    self.pending_invitation(invitation_id).await?;
                    self.accounts
                        .claim_unregistered_account(account_id, &invitation.email, None)
                        .await?;
                    (self.accounts.mark_verified(account_id).await?, false)
                } else {
                    (account, false)
                }
            }
            None => {
                if self.accounts.find_by_email(&invitation.email).await?.is_some() {
                    return Err(ServiceError::EmailAlreadyRegistered(invitation.email.clone()));
                }
                self.pending_invitation(invitation_id).await?;
                let account = self.accounts.register(&invitation.email, None, true).await?;
                (self.accounts.mark_verified(account.account_id).await?, true)
            }
        };

        self.store
            .accept_invitation(&invitation, account.account_id, Some(default_group.group_id))
            .await?;
        self.accounts
            .set_currently_active_organization(account.account_id, organization.organization_id)
            .await?;

        metrics::inc(&INVITATIONS_ACCEPTED_TOTAL);
        tracing::info!(
            account_id = %account.account_id,
            organization_id = %organization.organization_id,
            is_new_account,
            "Invitation accepted"
        );

        Ok(AcceptedInvitation {
            account: self.accounts.require(account.account_id).await?,
            organization,
            is_new_account,
        })
    }

    async fn pending_invitation(&self, invitation_id: Uuid) -> Result<Invitation, ServiceError> {
        self.get_invitation_by_id(invitation_id)
            .await?
            .ok_or(ServiceError::InvitationNotFound)
    }

    // ==================== Groups ====================

    /// Newest first.
    pub async fn groups(&self, organization_id: Uuid) -> Result<Vec<Group>, ServiceError> {
        self.store.find_groups_of_organization(organization_id).await
    }

    pub async fn get_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>, ServiceError> {
        self.store.find_group_by_id(group_id).await
    }

    pub async fn default_group_for_new_members(
        &self,
        organization_id: Uuid,
    ) -> Result<Group, ServiceError> {
        self.groups(organization_id)
            .await?
            .into_iter()
            .find(|group| group.is_default_for_new_members)
            .ok_or(ServiceError::MissingDefaultGroup)
    }

    pub async fn group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        self.store.find_group_member_ids(group_id).await
    }

    pub async fn groups_of_account_for_currently_active_organization(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Group>, ServiceError> {
        let account = self.accounts.require(account_id).await?;
        match account.currently_active_organization_id {
            Some(organization_id) => {
                self.store
                    .find_groups_of_account_in_organization(account_id, organization_id)
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn require_group(&self, group_id: Uuid) -> Result<Group, ServiceError> {
        self.get_group_by_id(group_id)
            .await?
            .ok_or(ServiceError::GroupNotFound)
    }

    async fn require_belongs(&self, account_id: Uuid, organization_id: Uuid) -> Result<(), ServiceError> {
        let organization = self.require_organization(organization_id).await?;
        if self
            .account_belongs_to_organization(account_id, &organization)
            .await?
        {
            Ok(())
        } else {
            Err(ServiceError::NotAMember)
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_account_to_group(&self, account_id: Uuid, group_id: Uuid) -> Result<(), ServiceError> {
        let group = self.require_group(group_id).await?;
        self.require_belongs(account_id, group.organization_id).await?;
        self.store.add_group_member(group_id, account_id).await?;
        tracing::info!("Account added to group");
        Ok(())
    }

    /// Removing an account that is not in the group does nothing.
    #[tracing::instrument(skip(self))]
    pub async fn remove_account_from_group(
        &self,
        account_id: Uuid,
        group_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.require_group(group_id).await?;
        if self.store.remove_group_member(group_id, account_id).await? {
            tracing::info!("Account removed from group");
        }
        Ok(())
    }

    pub async fn move_account_to_administrators_group(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.move_account_to_group(account_id, organization_id, Group::is_administrators_group)
            .await
    }

    pub async fn move_account_to_team_members_group(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.move_account_to_group(account_id, organization_id, Group::is_team_members_group)
            .await
    }

    /// Leaves the account in exactly one group of the organization.
    async fn move_account_to_group(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
        is_target: fn(&Group) -> bool,
    ) -> Result<(), ServiceError> {
        self.require_belongs(account_id, organization_id).await?;
        let groups = self.groups(organization_id).await?;
        let target = groups
            .iter()
            .find(|group| is_target(group))
            .ok_or(ServiceError::GroupNotFound)?;

        let current = self
            .store
            .find_groups_of_account_in_organization(account_id, organization_id)
            .await?;

        for group in &current {
            if group.group_id != target.group_id {
                self.store.remove_group_member(group.group_id, account_id).await?;
            }
        }
        if !current.iter().any(|group| group.group_id == target.group_id) {
            self.store.add_group_member(target.group_id, account_id).await?;
        }

        tracing::info!(
            account_id = %account_id,
            group_id = %target.group_id,
            "Account moved to group"
        );
        Ok(())
    }

    // ==================== Access ====================

    /// Owners of the active organization hold every right; everyone else
    /// needs a group in it granting `right` or `full_access`.
    pub async fn account_has_access_right(
        &self,
        account_id: Uuid,
        right: AccessRight,
    ) -> Result<bool, ServiceError> {
        let Some(organization) = self
            .currently_active_organization_of_account(account_id)
            .await?
        else {
            return Ok(false);
        };

        if organization.is_owned_by(account_id) {
            return Ok(true);
        }

        Ok(self
            .store
            .find_groups_of_account_in_organization(account_id, organization.organization_id)
            .await?
            .iter()
            .any(|group| group.grants(right)))
    }

    /// Fails with `AccessDenied` unless `account_has_access_right`.
    pub async fn require_access_right(
        &self,
        account_id: Uuid,
        right: AccessRight,
    ) -> Result<(), ServiceError> {
        if self.account_has_access_right(account_id, right).await? {
            Ok(())
        } else {
            tracing::warn!(account_id = %account_id, right = right.as_str(), "Access right missing");
            Err(ServiceError::AccessDenied)
        }
    }
}

/// Persists an organization with its `Administrators` and default
/// `Team Members` groups.
pub(crate) async fn provision_organization(
    store: &dyn OrganizationStore,
    owner_account_id: Uuid,
    name: Option<&str>,
) -> Result<Organization, ServiceError> {
    let organization = Organization::new(owner_account_id, name);
    let groups = [
        Group::administrators(organization.organization_id),
        Group::team_members(organization.organization_id),
    ];
    store
        .insert_organization_with_groups(&organization, &groups)
        .await?;

    metrics::inc(&ORGANIZATIONS_CREATED_TOTAL);
    tracing::info!(
        organization_id = %organization.organization_id,
        owner_account_id = %owner_account_id,
        "Organization created"
    );
    Ok(organization)
}
