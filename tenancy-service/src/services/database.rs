//! PostgreSQL storage for both verticals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::error::unique_violation_or;
use super::repository::{AccountStore, OrganizationStore};
use super::ServiceError;
use crate::models::{Account, AccountToken, Group, Invitation, Organization};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for Database {
    fn backend(&self) -> &'static str {
        "postgresql"
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.ping().await
    }

    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_accounts_by_ids(
        &self,
        account_ids: &[Uuid],
    ) -> Result<Vec<Account>, ServiceError> {
        Ok(sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE account_id = ANY($1) ORDER BY created_utc",
        )
        .bind(account_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, email, display_name, password_hash, roles, is_verified,
                                  must_set_password, currently_active_organization_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(account.account_id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(&account.roles)
        .bind(account.is_verified)
        .bind(account.must_set_password)
        .bind(account.currently_active_organization_id)
        .bind(account.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            unique_violation_or(
                e,
                ServiceError::EmailAlreadyRegistered(account.email.clone().unwrap_or_default()),
            )
        })?;
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET email = $2, display_name = $3, password_hash = $4, roles = $5, is_verified = $6,
                must_set_password = $7, currently_active_organization_id = $8
            WHERE account_id = $1
            "#,
        )
        .bind(account.account_id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(&account.roles)
        .bind(account.is_verified)
        .bind(account.must_set_password)
        .bind(account.currently_active_organization_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            unique_violation_or(
                e,
                ServiceError::EmailAlreadyRegistered(account.email.clone().unwrap_or_default()),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::AccountNotFound);
        }
        Ok(())
    }

    async fn insert_account_token(&self, token: &AccountToken) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO account_tokens (token_id, account_id, purpose_code, token_hash, expiry_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.token_id)
        .bind(token.account_id)
        .bind(&token.purpose_code)
        .bind(&token.token_hash)
        .bind(token.expiry_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_account_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccountToken>, ServiceError> {
        Ok(sqlx::query_as::<_, AccountToken>(
            "SELECT * FROM account_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_account_token(&self, token_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM account_tokens WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_account_tokens(
        &self,
        account_id: Uuid,
        purpose_code: &str,
    ) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM account_tokens WHERE account_id = $1 AND purpose_code = $2")
            .bind(account_id)
            .bind(purpose_code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrganizationStore for Database {
    fn backend(&self) -> &'static str {
        "postgresql"
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.ping().await
    }

    // ==================== Organizations ====================

    async fn find_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, ServiceError> {
        Ok(sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_organization_with_groups(
        &self,
        organization: &Organization,
        groups: &[Group],
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO organizations (organization_id, owning_account_id, organization_name,
                                       membership_plan_code, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(organization.organization_id)
        .bind(organization.owning_account_id)
        .bind(&organization.organization_name)
        .bind(&organization.membership_plan_code)
        .bind(organization.created_utc)
        .execute(&mut *tx)
        .await?;

        for group in groups {
            sqlx::query(
                r#"
                INSERT INTO organization_groups (group_id, organization_id, group_name, access_right_codes,
                                                 is_default_for_new_members, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(group.group_id)
            .bind(group.organization_id)
            .bind(&group.group_name)
            .bind(&group.access_right_codes)
            .bind(group.is_default_for_new_members)
            .bind(group.created_utc)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_organization(&self, organization: &Organization) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET organization_name = $2, membership_plan_code = $3
            WHERE organization_id = $1
            "#,
        )
        .bind(organization.organization_id)
        .bind(&organization.organization_name)
        .bind(&organization.membership_plan_code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::OrganizationNotFound);
        }
        Ok(())
    }

    async fn find_organizations_owned_by(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError> {
        Ok(sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE owning_account_id = $1 ORDER BY created_utc",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_organizations_joined_by(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError> {
        Ok(sqlx::query_as::<_, Organization>(
            r#"
            SELECT o.* FROM organizations o
            JOIN organization_members m ON m.organization_id = o.organization_id
            WHERE m.account_id = $1
            ORDER BY m.joined_utc
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_members_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<(Uuid, DateTime<Utc>)>, ServiceError> {
        Ok(sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
            "SELECT account_id, joined_utc FROM organization_members WHERE organization_id = $1 ORDER BY joined_utc",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    // ==================== Groups ====================

    async fn find_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Group>("SELECT * FROM organization_groups WHERE group_id = $1")
                .bind(group_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_groups_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Group>, ServiceError> {
        Ok(sqlx::query_as::<_, Group>(
            "SELECT * FROM organization_groups WHERE organization_id = $1 ORDER BY created_utc DESC",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_groups_of_account_in_organization(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<Group>, ServiceError> {
        Ok(sqlx::query_as::<_, Group>(
            r#"
            SELECT g.* FROM organization_groups g
            JOIN organization_group_members gm ON gm.group_id = g.group_id
            WHERE gm.account_id = $1 AND g.organization_id = $2
            ORDER BY g.created_utc DESC
            "#,
        )
        .bind(account_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT account_id FROM organization_group_members WHERE group_id = $1 ORDER BY added_utc",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn add_group_member(
        &self,
        group_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), ServiceError> {
        sqlx::query("INSERT INTO organization_group_members (group_id, account_id) VALUES ($1, $2)")
            .bind(group_id)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(|e| unique_violation_or(e, ServiceError::AlreadyInGroup))?;
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            "DELETE FROM organization_group_members WHERE group_id = $1 AND account_id = $2",
        )
        .bind(group_id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Invitations ====================

    async fn find_invitation_by_id(
        &self,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, ServiceError> {
        Ok(sqlx::query_as::<_, Invitation>(
            "SELECT * FROM organization_invitations WHERE invitation_id = $1",
        )
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_invitation_by_organization_and_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, ServiceError> {
        Ok(sqlx::query_as::<_, Invitation>(
            "SELECT * FROM organization_invitations WHERE organization_id = $1 AND email = $2",
        )
        .bind(organization_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_invitations_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, ServiceError> {
        Ok(sqlx::query_as::<_, Invitation>(
            "SELECT * FROM organization_invitations WHERE organization_id = $1 ORDER BY created_utc DESC",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO organization_invitations (invitation_id, organization_id, email, created_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(invitation.organization_id)
        .bind(&invitation.email)
        .bind(invitation.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            unique_violation_or(
                e,
                ServiceError::ValidationError(format!(
                    "An invitation for '{}' is already pending",
                    invitation.email
                )),
            )
        })?;
        Ok(())
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        account_id: Uuid,
        default_group_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        if let Some(group_id) = default_group_id {
            sqlx::query(
                r#"
                INSERT INTO organization_members (organization_id, account_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(invitation.organization_id)
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO organization_group_members (group_id, account_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(group_id)
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        }

        let deleted = sqlx::query("DELETE FROM organization_invitations WHERE invitation_id = $1")
            .bind(invitation.invitation_id)
            .execute(&mut *tx)
            .await?;

        // A concurrent acceptance already consumed it.
        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(ServiceError::InvitationNotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
