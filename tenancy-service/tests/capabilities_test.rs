mod common;

use common::TestContext;
use tenancy_service::models::{Account, MembershipPlan};
use uuid::Uuid;

async fn account(ctx: &TestContext, account_id: Uuid) -> Account {
    ctx.state
        .accounts
        .find_by_id(account_id)
        .await
        .unwrap()
        .expect("account exists")
}

#[tokio::test]
async fn anonymous_visitors_have_no_organization_capabilities() {
    let ctx = TestContext::new();
    let set = ctx.state.capabilities.snapshot(None).await.unwrap();

    assert!(set.can_see_footer_on_full_page);
    assert!(!set.can_see_left_navigation);
    assert!(!set.can_subscribe_to_membership_plans);
    assert!(!set.can_edit_organization_name);
    assert!(!set.can_switch_organizations);
}

#[tokio::test]
async fn owners_of_a_basic_organization() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let owner = account(&ctx, owner_id).await;
    let set = ctx.state.capabilities.snapshot(Some(&owner)).await.unwrap();

    assert!(set.can_see_user_info_in_navigation);
    assert!(set.can_subscribe_to_membership_plans);
    assert!(set.can_purchase_packages);
    assert!(set.can_edit_organization_name);
    assert!(set.can_invite_organization_members);
    assert!(set.can_move_organization_members_into_groups);
    assert!(!set.can_present_landingpage_on_custom_domain);
    assert!(!set.can_present_ad_free_landingpage);
    assert!(!set.can_switch_organizations);
    assert!(!set.must_be_forced_to_claim_unregistered_account);
}

#[tokio::test]
async fn plan_capabilities_follow_the_active_organization() {
    let ctx = TestContext::new();
    let owner_id = ctx.register("owner@example.com").await;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();
    let capabilities = &ctx.state.capabilities;

    ctx.state
        .organizations
        .change_membership_plan(organization_id, MembershipPlan::Independent)
        .await
        .unwrap();
    let owner = account(&ctx, owner_id).await;
    assert!(capabilities.can_present_ad_free_landingpage(Some(&owner)).await.unwrap());
    assert!(capabilities.can_present_own_logo_on_landingpage(Some(&owner)).await.unwrap());
    assert!(!capabilities
        .can_present_landingpage_on_custom_domain(Some(&owner))
        .await
        .unwrap());

    ctx.state
        .organizations
        .change_membership_plan(organization_id, MembershipPlan::Professional)
        .await
        .unwrap();
    assert!(capabilities
        .can_present_landingpage_on_custom_domain(Some(&owner))
        .await
        .unwrap());
}

#[tokio::test]
async fn team_members_see_members_but_cannot_manage() {
    let ctx = TestContext::new();
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

    let member = accepted.account;
    let set = ctx.state.capabilities.snapshot(Some(&member)).await.unwrap();

    assert!(set.can_see_organization_groups_and_members);
    assert!(set.can_switch_organizations);
    assert!(!set.can_edit_organization_name);
    assert!(!set.can_invite_organization_members);
    assert!(!set.can_move_organization_members_into_groups);
    assert!(!set.can_subscribe_to_membership_plans);
}

#[tokio::test]
async fn guests_must_claim_before_seeing_profile() {
    let ctx = TestContext::new();
    let guest = ctx.state.accounts.create_unregistered_account().await.unwrap();
    let set = ctx.state.capabilities.snapshot(Some(&guest)).await.unwrap();

    assert!(set.must_be_forced_to_claim_unregistered_account);
    assert!(set.can_see_left_navigation);
    assert!(!set.can_see_profile_dropdown_in_side_navigation);
    // Guests own their provisioned organization.
    assert!(set.can_subscribe_to_membership_plans);
}
