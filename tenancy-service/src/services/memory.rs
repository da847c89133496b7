//! In-process storage for development and tests.
//!
//! All tables sit behind one lock, so every trait method is atomic the same
//! way a single PostgreSQL transaction is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::repository::{AccountStore, OrganizationStore};
use super::ServiceError;
use crate::models::{Account, AccountToken, Group, Invitation, Organization};

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    account_tokens: Vec<AccountToken>,
    organizations: Vec<Organization>,
    /// (organization_id, account_id, joined_utc)
    organization_members: Vec<(Uuid, Uuid, DateTime<Utc>)>,
    groups: Vec<Group>,
    /// (group_id, account_id)
    group_members: Vec<(Uuid, Uuid)>,
    invitations: Vec<Invitation>,
}

/// In-memory store shared by clones.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, ServiceError> {
        self.tables
            .read()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("In-memory store poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, ServiceError> {
        self.tables
            .write()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("In-memory store poisoned: {}", e)))
    }
}

/// Newest first; later insertions win ties.
fn newest_first<T: Clone>(items: impl DoubleEndedIterator<Item = T>, created: fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut items: Vec<T> = items.rev().collect();
    items.sort_by_key(|item| std::cmp::Reverse(created(item)));
    items
}

#[async_trait]
impl AccountStore for InMemoryDatabase {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.read().map(|_| ())
    }

    async fn find_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .find(|a| a.account_id == account_id)
            .cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .find(|a| a.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_accounts_by_ids(
        &self,
        account_ids: &[Uuid],
    ) -> Result<Vec<Account>, ServiceError> {
        Ok(self
            .read()?
            .accounts
            .iter()
            .filter(|a| account_ids.contains(&a.account_id))
            .cloned()
            .collect())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), ServiceError> {
        let mut tables = self.write()?;
        if let Some(email) = &account.email {
            if tables.accounts.iter().any(|a| a.email.as_ref() == Some(email)) {
                return Err(ServiceError::EmailAlreadyRegistered(email.clone()));
            }
        }
        tables.accounts.push(account.clone());
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> Result<(), ServiceError> {
        let mut tables = self.write()?;
        if let Some(email) = &account.email {
            let taken = tables
                .accounts
                .iter()
                .any(|a| a.account_id != account.account_id && a.email.as_ref() == Some(email));
            if taken {
                return Err(ServiceError::EmailAlreadyRegistered(email.clone()));
            }
        }
        let stored = tables
            .accounts
            .iter_mut()
            .find(|a| a.account_id == account.account_id)
            .ok_or(ServiceError::AccountNotFound)?;
        // created_utc is immutable, as in the SQL UPDATE.
        let created_utc = stored.created_utc;
        *stored = Account {
            created_utc,
            ..account.clone()
        };
        Ok(())
    }

    async fn insert_account_token(&self, token: &AccountToken) -> Result<(), ServiceError> {
        self.write()?.account_tokens.push(token.clone());
        Ok(())
    }

    async fn find_account_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccountToken>, ServiceError> {
        Ok(self
            .read()?
            .account_tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn delete_account_token(&self, token_id: Uuid) -> Result<(), ServiceError> {
        self.write()?.account_tokens.retain(|t| t.token_id != token_id);
        Ok(())
    }

    async fn delete_account_tokens(
        &self,
        account_id: Uuid,
        purpose_code: &str,
    ) -> Result<(), ServiceError> {
        self.write()?
            .account_tokens
            .retain(|t| !(t.account_id == account_id && t.purpose_code == purpose_code));
        Ok(())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryDatabase {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.read().map(|_| ())
    }

    async fn find_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, ServiceError> {
        Ok(self
            .read()?
            .organizations
            .iter()
            .find(|o| o.organization_id == organization_id)
            .cloned())
    }

    async fn insert_organization_with_groups(
        &self,
        organization: &Organization,
        groups: &[Group],
    ) -> Result<(), ServiceError> {
        let mut tables = self.write()?;
        if tables
            .organizations
            .iter()
            .any(|o| o.organization_id == organization.organization_id)
        {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Organization {} already exists",
                organization.organization_id
            )));
        }
        tables.organizations.push(organization.clone());
        tables.groups.extend(groups.iter().cloned());
        Ok(())
    }

    async fn update_organization(&self, organization: &Organization) -> Result<(), ServiceError> {
        let mut tables = self.write()?;
        let stored = tables
            .organizations
            .iter_mut()
            .find(|o| o.organization_id == organization.organization_id)
            .ok_or(ServiceError::OrganizationNotFound)?;
        stored.organization_name = organization.organization_name.clone();
        stored.membership_plan_code = organization.membership_plan_code.clone();
        Ok(())
    }

    async fn find_organizations_owned_by(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError> {
        let mut owned: Vec<Organization> = self
            .read()?
            .organizations
            .iter()
            .filter(|o| o.owning_account_id == account_id)
            .cloned()
            .collect();
        owned.sort_by_key(|o| o.created_utc);
        Ok(owned)
    }

    async fn find_organizations_joined_by(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<Organization>, ServiceError> {
        let tables = self.read()?;
        let mut memberships: Vec<&(Uuid, Uuid, DateTime<Utc>)> = tables
            .organization_members
            .iter()
            .filter(|(_, member, _)| *member == account_id)
            .collect();
        memberships.sort_by_key(|(_, _, joined)| *joined);
        Ok(memberships
            .into_iter()
            .filter_map(|(org_id, _, _)| {
                tables
                    .organizations
                    .iter()
                    .find(|o| o.organization_id == *org_id)
                    .cloned()
            })
            .collect())
    }

    async fn find_members_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<(Uuid, DateTime<Utc>)>, ServiceError> {
        let tables = self.read()?;
        let mut memberships: Vec<&(Uuid, Uuid, DateTime<Utc>)> = tables
            .organization_members
            .iter()
            .filter(|(org_id, _, _)| *org_id == organization_id)
            .collect();
        memberships.sort_by_key(|(_, _, joined)| *joined);
        Ok(memberships
            .into_iter()
            .map(|(_, member, joined)| (*member, *joined))
            .collect())
    }

    async fn find_group_by_id(&self, group_id: Uuid) -> Result<Option<Group>, ServiceError> {
        Ok(self
            .read()?
            .groups
            .iter()
            .find(|g| g.group_id == group_id)
            .cloned())
    }

    async fn find_groups_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Group>, ServiceError> {
        let tables = self.read()?;
        Ok(newest_first(
            tables
                .groups
                .iter()
                .filter(|g| g.organization_id == organization_id)
                .cloned(),
            |g| g.created_utc,
        ))
    }

    async fn find_groups_of_account_in_organization(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<Group>, ServiceError> {
        let tables = self.read()?;
        Ok(newest_first(
            tables
                .groups
                .iter()
                .filter(|g| g.organization_id == organization_id)
                .filter(|g| {
                    tables
                        .group_members
                        .iter()
                        .any(|(group_id, member)| *group_id == g.group_id && *member == account_id)
                })
                .cloned(),
            |g| g.created_utc,
        ))
    }

    async fn find_group_member_ids(&self, group_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self
            .read()?
            .group_members
            .iter()
            .filter(|(g, _)| *g == group_id)
            .map(|(_, member)| *member)
            .collect())
    }

    async fn add_group_member(
        &self,
        group_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut tables = self.write()?;
        if tables.group_members.contains(&(group_id, account_id)) {
            return Err(ServiceError::AlreadyInGroup);
        }
        tables.group_members.push((group_id, account_id));
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.write()?;
        let before = tables.group_members.len();
        tables
            .group_members
            .retain(|membership| *membership != (group_id, account_id));
        Ok(tables.group_members.len() < before)
    }

    async fn find_invitation_by_id(
        &self,
        invitation_id: Uuid,
    ) -> Result<Option<Invitation>, ServiceError> {
        Ok(self
            .read()?
            .invitations
            .iter()
            .find(|i| i.invitation_id == invitation_id)
            .cloned())
    }

    async fn find_invitation_by_organization_and_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>, ServiceError> {
        Ok(self
            .read()?
            .invitations
            .iter()
            .find(|i| i.organization_id == organization_id && i.email == email)
            .cloned())
    }

    async fn find_invitations_of_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, ServiceError> {
        let tables = self.read()?;
        Ok(newest_first(
            tables
                .invitations
                .iter()
                .filter(|i| i.organization_id == organization_id)
                .cloned(),
            |i| i.created_utc,
        ))
    }

    async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), ServiceError> {
        let mut tables = self.write()?;
        if tables.invitations.iter().any(|i| {
            i.organization_id == invitation.organization_id && i.email == invitation.email
        }) {
            return Err(ServiceError::ValidationError(format!(
                "An invitation for '{}' is already pending",
                invitation.email
            )));
        }
        tables.invitations.push(invitation.clone());
        Ok(())
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        account_id: Uuid,
        default_group_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut tables = self.write()?;
        let position = tables
            .invitations
            .iter()
            .position(|i| i.invitation_id == invitation.invitation_id)
            .ok_or(ServiceError::InvitationNotFound)?;

        if let Some(group_id) = default_group_id {
            let organization_id = invitation.organization_id;
            if !tables
                .organization_members
                .iter()
                .any(|(org_id, member, _)| *org_id == organization_id && *member == account_id)
            {
                tables
                    .organization_members
                    .push((organization_id, account_id, Utc::now()));
            }
            if !tables.group_members.contains(&(group_id, account_id)) {
                tables.group_members.push((group_id, account_id));
            }
        }

        tables.invitations.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_emails_are_rejected() {
        let db = InMemoryDatabase::new();
        let first = Account::new_registered("a@example.com".to_string(), "h".to_string(), false);
        let second = Account::new_registered("a@example.com".to_string(), "h".to_string(), false);

        db.insert_account(&first).await.unwrap();
        let err = db.insert_account(&second).await.unwrap_err();
        assert!(matches!(err, ServiceError::EmailAlreadyRegistered(e) if e == "a@example.com"));
    }

    #[tokio::test]
    async fn unregistered_accounts_do_not_collide() {
        let db = InMemoryDatabase::new();
        db.insert_account(&Account::new_unregistered("h".to_string()))
            .await
            .unwrap();
        db.insert_account(&Account::new_unregistered("h".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn groups_are_listed_newest_first() {
        let db = InMemoryDatabase::new();
        let org = Organization::new(Uuid::new_v4(), None);
        let admins = Group::administrators(org.organization_id);
        let team = Group::team_members(org.organization_id);
        db.insert_organization_with_groups(&org, &[admins.clone(), team.clone()])
            .await
            .unwrap();

        let groups = db.find_groups_of_organization(org.organization_id).await.unwrap();
        let ids: Vec<Uuid> = groups.iter().map(|g| g.group_id).collect();
        assert_eq!(ids, vec![team.group_id, admins.group_id]);
    }

    #[tokio::test]
    async fn accepting_twice_fails_the_second_time() {
        let db = InMemoryDatabase::new();
        let org = Organization::new(Uuid::new_v4(), None);
        let team = Group::team_members(org.organization_id);
        db.insert_organization_with_groups(&org, &[team.clone()])
            .await
            .unwrap();
        let invitation = Invitation::new(org.organization_id, "b@example.com".to_string());
        db.insert_invitation(&invitation).await.unwrap();

        let member = Uuid::new_v4();
        db.accept_invitation(&invitation, member, Some(team.group_id))
            .await
            .unwrap();
        assert_eq!(
            db.find_members_of_organization(org.organization_id)
                .await
                .unwrap()
                .into_iter()
                .map(|(id, _)| id)
                .collect::<Vec<_>>(),
            vec![member]
        );
        assert!(matches!(
            db.accept_invitation(&invitation, member, Some(team.group_id))
                .await,
            Err(ServiceError::InvitationNotFound)
        ));
    }
}
