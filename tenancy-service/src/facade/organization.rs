use uuid::Uuid;

use crate::models::Iso639_1Code;
use crate::services::{OrganizationDomainService, ServiceError};

#[derive(Clone)]
pub struct OrganizationFacade {
    organizations: OrganizationDomainService,
}

impl OrganizationFacade {
    pub fn new(organizations: OrganizationDomainService) -> Self {
        Self { organizations }
    }

    /// Localized display name; unknown locale codes fall back to English.
    pub async fn organization_name_by_id(
        &self,
        organization_id: Uuid,
        locale_code: Option<&str>,
    ) -> Result<Option<String>, ServiceError> {
        let locale = locale_code.and_then(|code| code.parse::<Iso639_1Code>().ok());
        Ok(self
            .organizations
            .get_organization_by_id(organization_id)
            .await?
            .map(|organization| self.organizations.organization_name(&organization, locale)))
    }
}
