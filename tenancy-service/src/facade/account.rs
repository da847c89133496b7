use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Account;
use crate::services::{AccountDomainService, ServiceError};
use crate::utils::Password;

pub struct AccountRegistrationDto {
    pub email: String,
    /// `None` generates a random password.
    pub password: Option<Password>,
    pub must_set_password: bool,
}

/// Outcome of [`AccountFacade::register`]; failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RegistrationResult {
    pub is_success: bool,
    pub error_message: Option<String>,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AccountInfoDto {
    pub account_id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub roles: Vec<String>,
    pub created_utc: DateTime<Utc>,
    pub currently_active_organization_id: Option<Uuid>,
}

impl From<&Account> for AccountInfoDto {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id,
            email: account.email.clone(),
            display_name: account.name_for_display(),
            roles: account.roles(),
            created_utc: account.created_utc,
            currently_active_organization_id: account.currently_active_organization_id,
        }
    }
}

#[derive(Clone)]
pub struct AccountFacade {
    accounts: AccountDomainService,
}

impl AccountFacade {
    pub fn new(accounts: AccountDomainService) -> Self {
        Self { accounts }
    }

    pub async fn register(&self, dto: AccountRegistrationDto) -> RegistrationResult {
        match self
            .accounts
            .register(&dto.email, dto.password.as_ref(), dto.must_set_password)
            .await
        {
            Ok(account) => RegistrationResult {
                is_success: true,
                error_message: None,
                account_id: Some(account.account_id),
            },
            Err(e) => RegistrationResult {
                is_success: false,
                error_message: Some(e.to_string()),
                account_id: None,
            },
        }
    }

    pub async fn account_id_by_email(&self, email: &str) -> Result<Option<Uuid>, ServiceError> {
        Ok(self
            .accounts
            .find_by_email(email)
            .await?
            .map(|account| account.account_id))
    }

    pub async fn account_with_id_exists(&self, account_id: Uuid) -> Result<bool, ServiceError> {
        Ok(self.accounts.find_by_id(account_id).await?.is_some())
    }

    pub async fn currently_active_organization_id(
        &self,
        account_id: Uuid,
    ) -> Result<Option<Uuid>, ServiceError> {
        Ok(self
            .accounts
            .find_by_id(account_id)
            .await?
            .and_then(|account| account.currently_active_organization_id))
    }

    pub async fn account_email_by_id(&self, account_id: Uuid) -> Result<Option<String>, ServiceError> {
        Ok(self
            .accounts
            .find_by_id(account_id)
            .await?
            .and_then(|account| account.email))
    }

    /// `false` for unknown emails.
    pub async fn must_set_password(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self
            .accounts
            .find_by_email(email)
            .await?
            .is_some_and(|account| account.must_set_password))
    }

    /// Unknown ids are skipped.
    pub async fn account_info_by_ids(
        &self,
        account_ids: &[Uuid],
    ) -> Result<Vec<AccountInfoDto>, ServiceError> {
        Ok(self
            .accounts
            .find_by_ids(account_ids)
            .await?
            .iter()
            .map(AccountInfoDto::from)
            .collect())
    }

    pub async fn account_info(&self, account_id: Uuid) -> Result<Option<AccountInfoDto>, ServiceError> {
        Ok(self
            .accounts
            .find_by_id(account_id)
            .await?
            .as_ref()
            .map(AccountInfoDto::from))
    }
}
