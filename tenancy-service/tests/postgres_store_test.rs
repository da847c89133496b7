//! The same domain flows over PostgreSQL.
//!
//! Emails are unique per test run so the tests can share one database.

mod common;

use common::{create_test_pool, TestContext};
use std::sync::Arc;
use tenancy_service::models::AccessRight;
use tenancy_service::services::{Database, ServiceError};
use tenancy_service::startup::Stores;
use uuid::Uuid;

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

async fn postgres_context() -> TestContext {
    let pool = create_test_pool()
        .await
        .expect("Failed to connect to test database");
    TestContext::with_stores(Stores::from_shared(Arc::new(Database::new(pool))))
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn registration_provisions_organization_in_postgres() {
    let ctx = postgres_context().await;
    assert_eq!(ctx.state.accounts.backend(), "postgresql");

    let email = unique_email("owner");
    let owner_id = ctx.register(&email).await;

    let organization = ctx
        .state
        .organizations
        .currently_active_organization_of_account(owner_id)
        .await
        .unwrap()
        .expect("active organization");
    assert!(organization.is_owned_by(owner_id));
    assert_eq!(
        ctx.state
            .organizations
            .groups(organization.organization_id)
            .await
            .unwrap()
            .len(),
        2
    );

    let err = ctx
        .state
        .accounts
        .register(&email.to_uppercase(), None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::EmailAlreadyRegistered(_)));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn invitation_acceptance_in_postgres() {
    let ctx = postgres_context().await;
    let owner_id = ctx.register(&unique_email("owner")).await;
    let organizations = &ctx.state.organizations;
    let organization_id = ctx
        .state
        .account_facade
        .currently_active_organization_id(owner_id)
        .await
        .unwrap()
        .unwrap();

    let invitee = unique_email("invitee");
    let first = organizations
        .invite_email_to_organization(&invitee, organization_id)
        .await
        .unwrap();
    let again = organizations
        .invite_email_to_organization(&invitee, organization_id)
        .await
        .unwrap();
    assert_eq!(first.invitation_id, again.invitation_id);

    let accepted = organizations
        .accept_invitation(first.invitation_id, None)
        .await
        .unwrap();
    let member_id = accepted.account.account_id;

    assert_eq!(
        organizations
            .all_account_ids_of_organization(organization_id)
            .await
            .unwrap(),
        vec![owner_id, member_id]
    );
    assert!(organizations
        .account_has_access_right(member_id, AccessRight::SeeOrganizationGroupsAndMembers)
        .await
        .unwrap());
    assert!(!organizations
        .account_has_access_right(member_id, AccessRight::InviteOrganizationMembers)
        .await
        .unwrap());

    organizations
        .move_account_to_administrators_group(member_id, organization_id)
        .await
        .unwrap();
    assert!(organizations
        .account_has_access_right(member_id, AccessRight::InviteOrganizationMembers)
        .await
        .unwrap());
    assert!(organizations
        .get_invitation_by_id(first.invitation_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn password_reset_tokens_are_single_use_in_postgres() {
    let ctx = postgres_context().await;
    let email = unique_email("reset");
    ctx.register(&email).await;

    ctx.state
        .accounts
        .request_password_reset(&email, common::BASE_URL)
        .await
        .unwrap();
    let token = ctx.token_sent_to(&email);
    let password = tenancy_service::utils::Password::new("replacement-password".to_string());

    ctx.state
        .accounts
        .confirm_password_reset(&token, &password)
        .await
        .unwrap();
    let err = ctx
        .state
        .accounts
        .confirm_password_reset(&token, &password)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidToken));
}
