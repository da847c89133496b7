mod common;

use common::TestContext;
use std::sync::Arc;
use tenancy_service::models::{
    AccessRight, Group, Invitation, MembershipPlan, Organization, ADMINISTRATORS_GROUP_NAME,
    TEAM_MEMBERS_GROUP_NAME,
};
use tenancy_service::services::{InMemoryDatabase, OrganizationStore, ServiceError};
use tenancy_service::startup::Stores;
use uuid::Uuid;

/// Owner with an organization, and an invitee who accepted without an account.
async fn owner_and_member(ctx: &TestContext) -> (Uuid, Uuid, Uuid) {
    let owner_id = ctx.register("owner@example.com").await;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    let invitation = ctx
        .state
        .organizations
        .invite_email_to_organization("member@example.com", organization_id)
        .await
        .unwrap();
    let accepted = ctx
        .state
        .organizations
        .accept_invitation(invitation.invitation_id, None)
        .await
        .unwrap();

    (owner_id, organization_id, accepted.account.account_id)
}

#[tokio::test]
async fn registration_provisions_an_owned_active_organization_with_default_groups() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let organizations = &ctx.state.organizations;

    let organization = organizations
        .currently_active_organization_of_account(owner_id)
        .await
        .unwrap()
        .expect("active organization");
    assert!(organization.is_owned_by(owner_id));
    assert_eq!(organization.membership_plan(), MembershipPlan::Basic);
    assert_eq!(organizations.organization_name(&organization, None), "My Organization");
    assert!(organizations
        .currently_active_organization_is_own_organization(owner_id)
        .await
        .unwrap());

    let groups = organizations.groups(organization.organization_id).await.unwrap();
    assert_eq!(groups.len(), 2);

    let admins = groups
        .iter()
        .find(|g| g.group_name == ADMINISTRATORS_GROUP_NAME)
        .unwrap();
    assert_eq!(admins.access_rights(), vec![AccessRight::FullAccess]);
    assert!(!admins.is_default_for_new_members);

    let team = organizations
        .default_group_for_new_members(organization.organization_id)
        .await
        .unwrap();
    assert_eq!(team.group_name, TEAM_MEMBERS_GROUP_NAME);
    assert_eq!(
        team.access_rights(),
        vec![AccessRight::SeeOrganizationGroupsAndMembers]
    );

    assert!(!organizations.account_joined_organizations(owner_id).await.unwrap());
    assert!(organizations
        .account_can_create_or_manage_organization(owner_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn renaming_and_localized_default_name() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let organizations = &ctx.state.organizations;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    let renamed = organizations
        .rename_organization(organization_id, Some("  Acme  "))
        .await
        .unwrap();
    assert_eq!(organizations.organization_name(&renamed, None), "Acme");

    let reset = organizations
        .rename_organization(organization_id, Some(" "))
        .await
        .unwrap();
    assert_eq!(
        ctx.state
            .organization_facade
            .organization_name_by_id(reset.organization_id, Some("de-DE"))
            .await
            .unwrap()
            .as_deref(),
        Some("Meine Organisation")
    );
    assert_eq!(
        ctx.state
            .organization_facade
            .organization_name_by_id(Uuid::new_v4(), None)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn invitation_is_mailed_and_reused_for_the_same_email() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let organizations = &ctx.state.organizations;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    let first = organizations
        .invite_email_to_organization("Invitee@Example.com", organization_id)
        .await
        .unwrap();
    assert_eq!(first.email, "invitee@example.com");

    let mail = ctx.email.last_sent_to("invitee@example.com").unwrap();
    assert_eq!(
        mail.link,
        format!("http://tenancy.test/organization/invitation/{}", first.invitation_id)
    );
    assert!(mail.subject.contains("owner@example.com"));

    let second = organizations
        .invite_email_to_organization("invitee@example.com", organization_id)
        .await
        .unwrap();
    assert_eq!(second.invitation_id, first.invitation_id);
    assert_eq!(ctx.email.sent().iter().filter(|m| m.to == "invitee@example.com").count(), 2);

    let pending = organizations.pending_invitations(organization_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(organizations.has_pending_invitations(organization_id).await.unwrap());

    organizations
        .resend_invitation(first.invitation_id)
        .await
        .unwrap();
    assert_eq!(ctx.email.sent().iter().filter(|m| m.to == "invitee@example.com").count(), 3);
}

#[tokio::test]
async fn owners_and_members_cannot_be_invited() {
    let ctx = TestContext::new();
    let (_, organization_id, _) = owner_and_member(&ctx).await;
    let organizations = &ctx.state.organizations;

    for email in ["owner@example.com", "MEMBER@example.com"] {
        let err = organizations
            .invite_email_to_organization(email, organization_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyMember), "{email}");
    }

    let err = organizations
        .invite_email_to_organization("nope", organization_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidEmail(_)));
}

#[tokio::test]
async fn anonymous_acceptance_registers_joins_default_group_and_consumes_invitation() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let organizations = &ctx.state.organizations;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    let invitation = organizations
        .invite_email_to_organization("new@example.com", organization_id)
        .await
        .unwrap();
    let accepted = organizations
        .accept_invitation(invitation.invitation_id, None)
        .await
        .unwrap();

    assert!(accepted.is_new_account);
    let account = &accepted.account;
    assert_eq!(account.email.as_deref(), Some("new@example.com"));
    assert!(account.must_set_password);
    assert!(account.is_verified);
    assert_eq!(account.currently_active_organization_id, Some(organization_id));

    assert!(organizations
        .account_joined_organization(account.account_id, organization_id)
        .await
        .unwrap());
    let default_group = organizations
        .default_group_for_new_members(organization_id)
        .await
        .unwrap();
    assert!(organizations
        .group_member_ids(default_group.group_id)
        .await
        .unwrap()
        .contains(&account.account_id));

    assert!(organizations
        .get_invitation_by_id(invitation.invitation_id)
        .await
        .unwrap()
        .is_none());
    let err = organizations
        .accept_invitation(invitation.invitation_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvitationNotFound));

    assert_eq!(
        organizations
            .all_account_ids_of_organization(organization_id)
            .await
            .unwrap(),
        vec![owner_id, account.account_id]
    );
}

#[tokio::test]
async fn anonymous_acceptance_for_registered_email_requires_sign_in() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let existing_id = ctx.register("existing@example.com").await;
    let organizations = &ctx.state.organizations;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    let invitation = organizations
        .invite_email_to_organization("existing@example.com", organization_id)
        .await
        .unwrap();

    let err = organizations
        .accept_invitation(invitation.invitation_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EmailAlreadyRegistered(_)));

    let accepted = organizations
        .accept_invitation(invitation.invitation_id, Some(existing_id))
        .await
        .unwrap();
    assert!(!accepted.is_new_account);
    assert_eq!(accepted.account.account_id, existing_id);
    assert_eq!(accepted.account.currently_active_organization_id, Some(organization_id));
    assert!(organizations
        .account_can_switch_organizations(existing_id)
        .await
        .unwrap());

    let switchable: Vec<Uuid> = organizations
        .organizations_account_can_switch_to(existing_id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.organization_id)
        .collect();
    assert_eq!(switchable.first(), Some(&organization_id));
    assert_eq!(switchable.len(), 2);
}

#[tokio::test]
async fn guest_acceptance_claims_the_invited_email() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let guest = ctx.state.accounts.create_unregistered_account().await.unwrap();
    let organizations = &ctx.state.organizations;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    let invitation = organizations
        .invite_email_to_organization("guest@example.com", organization_id)
        .await
        .unwrap();
    let accepted = organizations
        .accept_invitation(invitation.invitation_id, Some(guest.account_id))
        .await
        .unwrap();

    assert_eq!(accepted.account.account_id, guest.account_id);
    assert_eq!(accepted.account.email.as_deref(), Some("guest@example.com"));
    assert!(accepted.account.is_verified);
    assert!(accepted.account.must_set_password);
}

#[tokio::test]
async fn guest_cannot_claim_through_a_consumed_invitation() {
    let ctx = TestContext::new();
    let (_, organization_id, _) = owner_and_member(&ctx).await;
    let organizations = &ctx.state.organizations;
    let guest = ctx.state.accounts.create_unregistered_account().await.unwrap();

    let invitation = organizations
        .invite_email_to_organization("late@example.com", organization_id)
        .await
        .unwrap();
    organizations
        .accept_invitation(invitation.invitation_id, None)
        .await
        .unwrap();

    let err = organizations
        .accept_invitation(invitation.invitation_id, Some(guest.account_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvitationNotFound));
    let guest = ctx.state.accounts.require(guest.account_id).await.unwrap();
    assert!(guest.email.is_none());
    assert!(!organizations
        .account_joined_organization(guest.account_id, organization_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn acceptance_needs_a_default_group() {
    let store = Arc::new(InMemoryDatabase::new());
    let ctx = TestContext::with_stores(Stores::from_shared(store.clone()));
    let owner_id = ctx.register("owner@example.com").await;

    let organization = Organization::new(owner_id, Some("Admins only"));
    store
        .insert_organization_with_groups(
            &organization,
            &[Group::administrators(organization.organization_id)],
        )
        .await
        .unwrap();
    let invitation = Invitation::new(organization.organization_id, "new@example.com".to_string());
    store.insert_invitation(&invitation).await.unwrap();

    let err = ctx
        .state
        .organizations
        .accept_invitation(invitation.invitation_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MissingDefaultGroup));
    assert!(ctx
        .state
        .accounts
        .find_by_email("new@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn acceptance_by_existing_member_only_consumes_invitation() {
    let ctx = TestContext::new();
    let (owner_id, organization_id, _) = owner_and_member(&ctx).await;
    let organizations = &ctx.state.organizations;

    let invitation = organizations
        .invite_email_to_organization("someone@example.com", organization_id)
        .await
        .unwrap();
    let accepted = organizations
        .accept_invitation(invitation.invitation_id, Some(owner_id))
        .await
        .unwrap();

    assert_eq!(accepted.account.account_id, owner_id);
    assert!(organizations
        .get_invitation_by_id(invitation.invitation_id)
        .await
        .unwrap()
        .is_none());
    assert!(!organizations.account_joined_organizations(owner_id).await.unwrap());
}

#[tokio::test]
async fn owners_hold_every_access_right_members_only_their_groups() {
    let ctx = TestContext::new();
    let (owner_id, organization_id, member_id) = owner_and_member(&ctx).await;
    let organizations = &ctx.state.organizations;

    for right in AccessRight::ALL {
        assert!(organizations.account_has_access_right(owner_id, right).await.unwrap());
    }

    assert!(organizations
        .account_has_access_right(member_id, AccessRight::SeeOrganizationGroupsAndMembers)
        .await
        .unwrap());
    assert!(!organizations
        .account_has_access_right(member_id, AccessRight::EditOrganizationName)
        .await
        .unwrap());
    let err = organizations
        .require_access_right(member_id, AccessRight::InviteOrganizationMembers)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AccessDenied));

    organizations
        .move_account_to_administrators_group(member_id, organization_id)
        .await
        .unwrap();
    assert!(organizations
        .account_has_access_right(member_id, AccessRight::EditOrganizationName)
        .await
        .unwrap());

    let groups = organizations
        .groups_of_account_for_currently_active_organization(member_id)
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].is_administrators_group());

    organizations
        .move_account_to_team_members_group(member_id, organization_id)
        .await
        .unwrap();
    let groups = organizations
        .groups_of_account_for_currently_active_organization(member_id)
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].is_team_members_group());
}

#[tokio::test]
async fn group_membership_requires_organization_membership() {
    let ctx = TestContext::new();
    let (_, organization_id, member_id) = owner_and_member(&ctx).await;
    let outsider_id = ctx.register("outsider@example.com").await;
    let organizations = &ctx.state.organizations;

    let admins = organizations
        .groups(organization_id)
        .await
        .unwrap()
        .into_iter()
        .find(|g| g.is_administrators_group())
        .unwrap();

    let err = organizations
        .add_account_to_group(outsider_id, admins.group_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotAMember));

    organizations
        .add_account_to_group(member_id, admins.group_id)
        .await
        .unwrap();
    let err = organizations
        .add_account_to_group(member_id, admins.group_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyInGroup));

    organizations
        .remove_account_from_group(member_id, admins.group_id)
        .await
        .unwrap();
    // Removing again is a no-op.
    organizations
        .remove_account_from_group(member_id, admins.group_id)
        .await
        .unwrap();
    assert!(!organizations
        .group_member_ids(admins.group_id)
        .await
        .unwrap()
        .contains(&member_id));

    let err = organizations
        .add_account_to_group(member_id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GroupNotFound));
}

#[tokio::test]
async fn switching_requires_membership() {
    let ctx = TestContext::new();
    let (owner_id, organization_id, member_id) = owner_and_member(&ctx).await;
    let stranger_id = ctx.register("stranger@example.com").await;
    let organizations = &ctx.state.organizations;

    let err = organizations
        .switch_organization(stranger_id, organization_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotAMember));

    let own = organizations.all_organizations_for_account(member_id).await.unwrap();
    assert_eq!(own.len(), 2);
    assert!(own[0].is_owned_by(member_id));

    let switched = organizations
        .switch_organization(member_id, own[0].organization_id)
        .await
        .unwrap();
    assert_eq!(
        ctx.state
            .account_facade
            .currently_active_organization_id(member_id)
            .await
            .unwrap(),
        Some(switched.organization_id)
    );
    assert!(!organizations.account_can_switch_organizations(owner_id).await.unwrap());
}

#[tokio::test]
async fn only_accounts_without_joined_organizations_create_more() {
    let ctx = TestContext::new();
    let (owner_id, _, member_id) = owner_and_member(&ctx).await;
    let organizations = &ctx.state.organizations;

    let err = organizations
        .create_organization(member_id, Some("Side project"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CannotCreateOrganization));

    let second = organizations
        .create_organization(owner_id, Some("Second"))
        .await
        .unwrap();
    assert!(second.is_owned_by(owner_id));
    assert_eq!(organizations.groups(second.organization_id).await.unwrap().len(), 2);
    assert!(organizations.account_can_switch_organizations(owner_id).await.unwrap());
}

#[tokio::test]
async fn membership_plan_drives_capabilities_of_the_active_organization() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let organizations = &ctx.state.organizations;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    organizations
        .change_membership_plan(organization_id, MembershipPlan::Professional)
        .await
        .unwrap();
    assert_eq!(
        organizations
            .membership_plan_of_currently_active_organization(owner_id)
            .await
            .unwrap(),
        Some(MembershipPlan::Professional)
    );
}
