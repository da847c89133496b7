//! Account vertical: registration, credentials and the active organization.

use std::sync::Arc;
use uuid::Uuid;

use super::email::EmailProvider;
use super::metrics::{self, ACCOUNTS_REGISTERED_TOTAL};
use super::repository::AccountStore;
use super::ServiceError;
use crate::events::{DomainEvent, EventDispatcher};
use crate::models::{normalize_email, Account, AccountToken, EmailAddress, TokenPurpose};
use crate::utils::token::hash_token;
use crate::utils::password::MIN_PASSWORD_LENGTH;
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

#[derive(Clone)]
pub struct AccountDomainService {
    store: Arc<dyn AccountStore>,
    dispatcher: EventDispatcher,
    email: Arc<dyn EmailProvider>,
}

impl AccountDomainService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        dispatcher: EventDispatcher,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            email,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.store.health_check().await
    }

    /// Registers `email`. Without a password a random one is generated; such
    /// accounts usually also get `must_set_password`.
    ///
    /// Subscribers of `AccountCreated` run before this returns, so the
    /// returned account already carries its active organization.
    #[tracing::instrument(skip(self, email, password))]
    pub async fn register(
        &self,
        email: &str,
        password: Option<&Password>,
        must_set_password: bool,
    ) -> Result<Account, ServiceError> {
        let email = EmailAddress::parse(email).map_err(ServiceError::InvalidEmail)?;

        if self.store.find_account_by_email(email.as_str()).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered(email.into_string()));
        }

        let password_hash = hash_new_password(password)?;
        let account = Account::new_registered(
            email.into_string(),
            password_hash.into_string(),
            must_set_password,
        );
        self.store.insert_account(&account).await?;

        tracing::info!(account_id = %account.account_id, "Account registered");
        self.announce(&account).await?;
        self.require(account.account_id).await
    }

    /// Creates a guest account without email.
    #[tracing::instrument(skip(self))]
    pub async fn create_unregistered_account(&self) -> Result<Account, ServiceError> {
        let password_hash = hash_password(&Password::random())?;
        let account = Account::new_unregistered(password_hash.into_string());
        self.store.insert_account(&account).await?;

        tracing::info!(account_id = %account.account_id, "Unregistered account created");
        self.announce(&account).await?;
        self.require(account.account_id).await
    }

    async fn announce(&self, account: &Account) -> Result<(), ServiceError> {
        metrics::inc(&ACCOUNTS_REGISTERED_TOTAL);
        self.dispatcher
            .dispatch(DomainEvent::AccountCreated {
                account_id: account.account_id,
            })
            .await
    }

    /// Attaches `email` (and a password, random when `None`) to a guest account.
    #[tracing::instrument(skip(self, email, password))]
    pub async fn claim_unregistered_account(
        &self,
        account_id: Uuid,
        email: &str,
        password: Option<&Password>,
    ) -> Result<Account, ServiceError> {
        let mut account = self.require(account_id).await?;
        if account.is_registered() {
            return Err(ServiceError::AccountAlreadyRegistered);
        }

        let email = EmailAddress::parse(email).map_err(ServiceError::InvalidEmail)?;
        if self.store.find_account_by_email(email.as_str()).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered(email.into_string()));
        }

        account.password_hash = hash_new_password(password)?.into_string();
        account.email = Some(email.into_string());
        account.must_set_password = password.is_none();
        self.store.update_account(&account).await?;

        tracing::info!("Unregistered account claimed");
        Ok(account)
    }

    pub async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>, ServiceError> {
        self.store.find_account_by_id(account_id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, ServiceError> {
        self.store.find_account_by_email(&normalize_email(email)).await
    }

    pub async fn find_by_ids(&self, account_ids: &[Uuid]) -> Result<Vec<Account>, ServiceError> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.find_accounts_by_ids(account_ids).await
    }

    /// Loads an account that must exist.
    pub async fn require(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        self.find_by_id(account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)
    }

    pub fn verify_password(&self, account: &Account, password: &Password) -> bool {
        verify_password(
            password,
            &PasswordHashString::new(account.password_hash.clone()),
        )
        .is_ok()
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn update_password(
        &self,
        account_id: Uuid,
        password: &Password,
    ) -> Result<Account, ServiceError> {
        let mut account = self.require(account_id).await?;
        account.password_hash = hash_new_password(Some(password))?.into_string();
        account.must_set_password = false;
        self.store.update_account(&account).await?;
        tracing::info!("Password updated");
        Ok(account)
    }

    /// Unknown emails, guests and wrong passwords are indistinguishable.
    #[tracing::instrument(skip(self, email, password))]
    pub async fn sign_in(&self, email: &str, password: &Password) -> Result<Account, ServiceError> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !account.is_registered() || !self.verify_password(&account, password) {
            tracing::warn!(account_id = %account.account_id, "Sign-in rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        tracing::info!(account_id = %account.account_id, "Signed in");
        Ok(account)
    }

    /// First password of an account registered through an invitation.
    #[tracing::instrument(skip(self, password, confirmation))]
    pub async fn set_initial_password(
        &self,
        account_id: Uuid,
        password: &Password,
        confirmation: &Password,
    ) -> Result<Account, ServiceError> {
        let account = self.require(account_id).await?;
        if !account.must_set_password {
            return Err(ServiceError::PasswordAlreadySet);
        }
        if password.as_str() != confirmation.as_str() {
            return Err(ServiceError::PasswordMismatch);
        }
        self.update_password(account_id, password).await
    }

    /// Trimmed; blank or `None` clears the name.
    #[tracing::instrument(skip(self))]
    pub async fn set_display_name(
        &self,
        account_id: Uuid,
        display_name: Option<&str>,
    ) -> Result<Account, ServiceError> {
        let mut account = self.require(account_id).await?;
        account.set_display_name(display_name);
        self.store.update_account(&account).await?;
        Ok(account)
    }

    pub async fn mark_verified(&self, account_id: Uuid) -> Result<Account, ServiceError> {
        let mut account = self.require(account_id).await?;
        if !account.is_verified {
            account.is_verified = true;
            self.store.update_account(&account).await?;
            tracing::info!(account_id = %account_id, "Account verified");
        }
        Ok(account)
    }

    pub async fn set_currently_active_organization(
        &self,
        account_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), ServiceError> {
        store_active_organization(self.store.as_ref(), account_id, organization_id).await
    }

    /// Mails a reset link. Unknown or unregistered emails are ignored silently.
    #[tracing::instrument(skip(self, email, base_url))]
    pub async fn request_password_reset(
        &self,
        email: &str,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        let Some(account) = self.find_by_email(email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };
        let Some(to_email) = account.email.as_deref() else {
            return Ok(());
        };

        let purpose = TokenPurpose::PasswordReset;
        self.store
            .delete_account_tokens(account.account_id, purpose.as_str())
            .await?;
        let (token, raw) = AccountToken::issue(account.account_id, purpose);
        self.store.insert_account_token(&token).await?;

        self.email
            .send_password_reset_email(to_email, &raw, base_url)
            .await
            .map_err(|e| ServiceError::EmailError(e.to_string()))?;

        tracing::info!(account_id = %account.account_id, "Password reset mail sent");
        Ok(())
    }

    /// Sets a new password from a reset link. Proves control of the mailbox,
    /// so the account is verified too.
    #[tracing::instrument(skip_all)]
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        password: &Password,
    ) -> Result<Account, ServiceError> {
        let token = self.consume_token(token, TokenPurpose::PasswordReset).await?;
        self.update_password(token.account_id, password).await?;
        self.mark_verified(token.account_id).await
    }

    #[tracing::instrument(skip(self, base_url))]
    pub async fn send_email_verification(
        &self,
        account_id: Uuid,
        base_url: &str,
    ) -> Result<(), ServiceError> {
        let account = self.require(account_id).await?;
        let to_email = account.email.as_deref().ok_or_else(|| {
            ServiceError::ValidationError("Account has no email address to verify".to_string())
        })?;
        if account.is_verified {
            return Ok(());
        }

        let purpose = TokenPurpose::EmailVerification;
        self.store
            .delete_account_tokens(account_id, purpose.as_str())
            .await?;
        let (token, raw) = AccountToken::issue(account_id, purpose);
        self.store.insert_account_token(&token).await?;

        self.email
            .send_verification_email(to_email, &raw, base_url)
            .await
            .map_err(|e| ServiceError::EmailError(e.to_string()))
    }

    #[tracing::instrument(skip_all)]
    pub async fn verify_email(&self, token: &str) -> Result<Account, ServiceError> {
        let token = self
            .consume_token(token, TokenPurpose::EmailVerification)
            .await?;
        self.mark_verified(token.account_id).await
    }

    /// Looks up a one-time token and deletes it. Expired tokens are deleted
    /// and rejected.
    async fn consume_token(
        &self,
        raw: &str,
        purpose: TokenPurpose,
    ) -> Result<AccountToken, ServiceError> {
        let token = self
            .store
            .find_account_token_by_hash(&hash_token(raw))
            .await?
            .filter(|t| t.is_for(purpose))
            .ok_or(ServiceError::InvalidToken)?;

        self.store.delete_account_token(token.token_id).await?;

        if token.is_expired() {
            return Err(ServiceError::TokenExpired);
        }
        Ok(token)
    }

    // ==================== Sign-in eligibility ====================

    pub fn account_can_sign_in(account: Option<&Account>) -> bool {
        account.is_none()
    }

    pub fn account_can_sign_up(account: Option<&Account>) -> bool {
        Self::account_can_sign_in(account)
    }

    pub fn account_can_sign_out(account: Option<&Account>) -> bool {
        account.is_some()
    }

    pub fn account_is_signed_in(account: Option<&Account>) -> bool {
        Self::account_can_sign_out(account)
    }
}

fn hash_new_password(password: Option<&Password>) -> Result<PasswordHashString, ServiceError> {
    match password {
        Some(password) if !password.is_long_enough() => Err(ServiceError::ValidationError(
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        )),
        Some(password) => Ok(hash_password(password)?),
        None => Ok(hash_password(&Password::random())?),
    }
}

/// Points the account at `organization_id`. A missing account is an error.
pub(crate) async fn store_active_organization(
    store: &dyn AccountStore,
    account_id: Uuid,
    organization_id: Uuid,
) -> Result<(), ServiceError> {
    let mut account = store
        .find_account_by_id(account_id)
        .await?
        .ok_or(ServiceError::AccountNotFound)?;

    if account.currently_active_organization_id != Some(organization_id) {
        account.currently_active_organization_id = Some(organization_id);
        store.update_account(&account).await?;
        tracing::info!(
            account_id = %account_id,
            organization_id = %organization_id,
            "Active organization changed"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_eligibility() {
        let account = Account::new_unregistered("hash".to_string());

        assert!(AccountDomainService::account_can_sign_in(None));
        assert!(AccountDomainService::account_can_sign_up(None));
        assert!(!AccountDomainService::account_can_sign_out(None));
        assert!(!AccountDomainService::account_is_signed_in(None));

        assert!(!AccountDomainService::account_can_sign_in(Some(&account)));
        assert!(AccountDomainService::account_can_sign_out(Some(&account)));
        assert!(AccountDomainService::account_is_signed_in(Some(&account)));
    }

    #[test]
    fn short_passwords_are_rejected() {
        let result = hash_new_password(Some(&Password::new("short".to_string())));
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }
}
