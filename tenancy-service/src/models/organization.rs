//! Organization model - a tenant workspace with exactly one owner.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Iso639_1Code, MembershipPlan};

pub const MAX_ORGANIZATION_NAME_CHARS: usize = 256;

/// Organization entity.
#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub organization_id: Uuid,
    pub owning_account_id: Uuid,
    pub organization_name: Option<String>,
    pub membership_plan_code: String,
    pub created_utc: DateTime<Utc>,
}

impl Organization {
    pub fn new(owning_account_id: Uuid, name: Option<&str>) -> Self {
        Self {
            organization_id: Uuid::new_v4(),
            owning_account_id,
            organization_name: normalize_organization_name(name),
            membership_plan_code: MembershipPlan::Basic.as_str().to_string(),
            created_utc: Utc::now(),
        }
    }

    pub fn rename(&mut self, name: Option<&str>) {
        self.organization_name = normalize_organization_name(name);
    }

    pub fn is_owned_by(&self, account_id: Uuid) -> bool {
        self.owning_account_id == account_id
    }

    /// Unknown plan codes read as the basic plan.
    pub fn membership_plan(&self) -> MembershipPlan {
        self.membership_plan_code.parse().unwrap_or_default()
    }

    pub fn display_name(&self, locale: Iso639_1Code) -> String {
        self.organization_name
            .clone()
            .unwrap_or_else(|| locale.default_organization_name().to_string())
    }
}

/// Trims, drops blanks and caps the length at 256 characters.
pub fn normalize_organization_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_ORGANIZATION_NAME_CHARS).collect())
}

/// Organization entry of the dashboard and switcher.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrganizationResponse {
    pub organization_id: Uuid,
    pub name: String,
    pub owning_account_id: Uuid,
    pub membership_plan: MembershipPlan,
    pub is_owned: bool,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

impl OrganizationResponse {
    pub fn for_viewer(
        organization: &Organization,
        viewer_account_id: Uuid,
        active_organization_id: Option<Uuid>,
        locale: Iso639_1Code,
    ) -> Self {
        Self {
            organization_id: organization.organization_id,
            name: organization.display_name(locale),
            owning_account_id: organization.owning_account_id,
            membership_plan: organization.membership_plan(),
            is_owned: organization.is_owned_by(viewer_account_id),
            is_active: active_organization_id == Some(organization.organization_id),
            created_utc: organization.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_truncated() {
        let long = format!("  {}  ", "x".repeat(300));
        let org = Organization::new(Uuid::new_v4(), Some(&long));
        assert_eq!(
            org.organization_name.as_deref().map(|n| n.chars().count()),
            Some(MAX_ORGANIZATION_NAME_CHARS)
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let name = "ä".repeat(300);
        let normalized = normalize_organization_name(Some(&name)).unwrap();
        assert_eq!(normalized.chars().count(), MAX_ORGANIZATION_NAME_CHARS);
    }

    #[test]
    fn blank_name_falls_back_to_localized_default() {
        let mut org = Organization::new(Uuid::new_v4(), Some("Acme"));
        org.rename(Some("   "));
        assert_eq!(org.organization_name, None);
        assert_eq!(org.display_name(Iso639_1Code::De), "Meine Organisation");
    }

    #[test]
    fn new_organizations_are_on_the_basic_plan() {
        let org = Organization::new(Uuid::new_v4(), None);
        assert_eq!(org.membership_plan(), MembershipPlan::Basic);
    }
}
