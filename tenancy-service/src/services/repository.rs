//! Storage seams of the two verticals.
//!
//! Accounts and organizations live in separate stores that only share ids,
//! so neither side holds foreign keys into the other. [`Database`] implements
//! both traits on PostgreSQL, [`InMemoryDatabase`] implements both in process.
//!
//! [`Database`]: super::Database
//! [`InMemoryDatabase`]: super::InMemoryDatabase

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ServiceError;
use crate::models::{Account, AccountToken, Group, Invitation, Organization};

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Short backend label reported by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), ServiceError>;

    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError>;

    /// `email` must already be normalized.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError>;

    async fn find_accounts_by_ids(&self, account_ids: &[Uuid])
        -> Result<Vec<Account>, ServiceError>;

    /// Fails with `EmailAlreadyRegistered` when the email is taken.
    async fn insert_account(&self, account: &Account) -> Result<(), ServiceError>;

    /// Overwrites every mutable column. Fails with `EmailAlreadyRegistered`
    /// when a claimed email is taken, `AccountNotFound` when the row is gone.
    async fn update_account(&self, account: &Account) -> Result<(), ServiceError>;

    async fn insert_account_token(&self, token: &AccountToken) -> Result<(), ServiceError>;

    async fn find_account_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccountToken>, ServiceError>;

    async fn delete_account_token(&self, token_id: Uuid) -> Result<(), ServiceError>;

    async fn delete_account_tokens(
        &self,
        account_id: Uuid,
        purpose_code: &str,
    ) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), ServiceError>;

    // ==================== Organizations ====================

    async fn find_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, ServiceError>;

    /// Persists the organization together with its groups, all or nothing.
    async fn insert_organization_with_groups(
        &self,
        organization: &Organization,
        groups: &[Group],
    ) -> Result<(), ServiceError>;

    async fn update_organization(&self, organization: &Organization) -> Result<(), ServiceError>;

    /// Oldest first.
    async fn find_organizations_owned_by(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError>;

    /// Organizations the account joined (not owned), in join order.
    async fn find_organizations_joined_by(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError>;

    /// Joined members (owner excluded) with their join time, in join order.
    async fn find_members_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<(Uuid, DateTime<Utc>)>, ServiceError>;

    // ==================== Groups ====================

    async fn find_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>, ServiceError>;

    /// Newest first.
    async fn find_groups_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Group>, ServiceError>;

    async fn find_groups_of_account_in_organization(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<Group>, ServiceError>;

    async fn find_group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>, ServiceError>;

    /// Fails with `AlreadyInGroup` when the account is a member already.
    async fn add_group_member(&self, group_id: Uuid, account_id: Uuid)
        -> Result<(), ServiceError>;

    /// Returns whether a membership was removed.
    async fn remove_group_member(
        &self,
        group_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, ServiceError>;

    // ==================== Invitations ====================

    async fn find_invitation_by_id(
        &self,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, ServiceError>;

    async fn find_invitation_by_organization_and_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, ServiceError>;

    /// Newest first.
    async fn find_invitations_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, ServiceError>;

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), ServiceError>;

    /// Consumes the invitation and, unless `default_group_id` is `None`, joins
    /// the account to the organization and that group. One transaction.
    /// Memberships that already exist are kept as they are.
    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        account_id: Uuid,
        default_group_id: Option<Uuid>,
    ) -> Result<(), ServiceError>;
}
