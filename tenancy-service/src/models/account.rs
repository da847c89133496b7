//! Account model - the sign-in identity of a person.
//!
//! An account starts either registered (with an email) or unregistered (a
//! guest without email). Unregistered accounts can later be claimed, which
//! attaches an email and password. Transitions never go backwards.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Role;

/// Account entity.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    /// Normalized email; `None` while the account is unregistered.
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub is_verified: bool,
    pub must_set_password: bool,
    pub currently_active_organization_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    /// Create a registered account.
    pub fn new_registered(email: String, password_hash: String, must_set_password: bool) -> Self {
        Self {
            email: Some(email),
            must_set_password,
            ..Self::new_unregistered(password_hash)
        }
    }

    /// Create an account without email.
    pub fn new_unregistered(password_hash: String) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            email: None,
            display_name: None,
            password_hash,
            roles: vec![Role::User.as_str().to_string()],
            is_verified: false,
            must_set_password: false,
            currently_active_organization_id: None,
            created_utc: Utc::now(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.email.is_some()
    }

    /// Stored roles plus `ROLE_USER`, deduplicated, first occurrence wins.
    pub fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = Vec::with_capacity(self.roles.len() + 1);
        for role in self
            .roles
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(Role::User.as_str()))
        {
            if !roles.iter().any(|r| r == role) {
                roles.push(role.to_string());
            }
        }
        roles
    }

    /// Adds an upper-cased role tag unless already present.
    pub fn add_role(&mut self, role: &str) {
        let role = role.trim().to_uppercase();
        if !role.is_empty() && !self.roles.contains(&role) {
            self.roles.push(role);
        }
    }

    pub fn remove_role(&mut self, role: &str) {
        let role = role.trim().to_uppercase();
        self.roles.retain(|r| *r != role);
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles().iter().any(|r| r == role.as_str())
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn set_display_name(&mut self, display_name: Option<&str>) {
        self.display_name = display_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    /// Human label: display name, else email, else the id.
    pub fn name_for_display(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.account_id.to_string())
    }
}

/// Account as exposed over HTTP (no credentials).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub is_registered: bool,
    pub is_verified: bool,
    pub must_set_password: bool,
    pub currently_active_organization_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            roles: account.roles(),
            is_registered: account.is_registered(),
            account_id: account.account_id,
            email: account.email,
            display_name: account.display_name,
            is_verified: account.is_verified,
            must_set_password: account.must_set_password,
            currently_active_organization_id: account.currently_active_organization_id,
            created_utc: account.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new_registered("a@example.com".to_string(), "hash".to_string(), false)
    }

    #[test]
    fn roles_always_include_user_role() {
        let mut account = account();
        account.roles.clear();
        assert_eq!(account.roles(), vec!["ROLE_USER".to_string()]);
    }

    #[test]
    fn roles_are_deduplicated_in_order() {
        let mut account = account();
        account.roles = vec![
            "ROLE_ADMIN".to_string(),
            "ROLE_USER".to_string(),
            "ROLE_ADMIN".to_string(),
        ];
        assert_eq!(
            account.roles(),
            vec!["ROLE_ADMIN".to_string(), "ROLE_USER".to_string()]
        );
    }

    #[test]
    fn add_role_uppercases_and_skips_duplicates() {
        let mut account = account();
        account.add_role("role_admin");
        account.add_role("ROLE_ADMIN");
        assert!(account.is_admin());
        assert_eq!(account.roles.iter().filter(|r| *r == "ROLE_ADMIN").count(), 1);

        account.remove_role("role_admin");
        assert!(!account.is_admin());
    }

    #[test]
    fn unregistered_account_has_no_email() {
        let account = Account::new_unregistered("hash".to_string());
        assert!(!account.is_registered());
        assert_eq!(account.name_for_display(), account.account_id.to_string());
    }

    #[test]
    fn display_name_is_trimmed_and_blank_clears_it() {
        let mut account = account();
        account.set_display_name(Some("  Jane  "));
        assert_eq!(account.name_for_display(), "Jane");

        account.set_display_name(Some("   "));
        assert_eq!(account.name_for_display(), "a@example.com");
    }
}
