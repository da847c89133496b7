use async_trait::async_trait;
use std::sync::Arc;

use super::{DomainEvent, EventDispatcher, EventSubscriber};
use crate::services::account::store_active_organization;
use crate::services::organization::provision_organization;
use crate::services::repository::{AccountStore, OrganizationStore};
use crate::services::ServiceError;

/// Organization vertical: every new account gets an organization of its own,
/// which becomes its active one.
pub struct OrganizationProvisioningSubscriber {
    store: Arc<dyn OrganizationStore>,
}

impl OrganizationProvisioningSubscriber {
    pub fn new(store: Arc<dyn OrganizationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventSubscriber for OrganizationProvisioningSubscriber {
    fn name(&self) -> &'static str {
        "organization_provisioning"
    }

    async fn handle(
        &self,
        event: &DomainEvent,
        dispatcher: &EventDispatcher,
    ) -> Result<(), ServiceError> {
        let DomainEvent::AccountCreated { account_id } = event else {
            return Ok(());
        };

        let organization = provision_organization(self.store.as_ref(), *account_id, None).await?;

        dispatcher
            .dispatch(DomainEvent::CurrentlyActiveOrganizationChanged {
                organization_id: organization.organization_id,
                affected_account_id: *account_id,
            })
            .await
    }
}

/// Account vertical: stores the active organization of the affected account.
pub struct ActiveOrganizationSubscriber {
    store: Arc<dyn AccountStore>,
}

impl ActiveOrganizationSubscriber {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventSubscriber for ActiveOrganizationSubscriber {
    fn name(&self) -> &'static str {
        "active_organization"
    }

    async fn handle(
        &self,
        event: &DomainEvent,
        _dispatcher: &EventDispatcher,
    ) -> Result<(), ServiceError> {
        let DomainEvent::CurrentlyActiveOrganizationChanged {
            organization_id,
            affected_account_id,
        } = event
        else {
            return Ok(());
        };

        store_active_organization(self.store.as_ref(), *affected_account_id, *organization_id)
            .await
    }
}

/// Wires both verticals into `dispatcher`.
pub fn register_subscribers(
    dispatcher: &EventDispatcher,
    accounts: Arc<dyn AccountStore>,
    organizations: Arc<dyn OrganizationStore>,
) -> Result<(), ServiceError> {
    dispatcher.subscribe(Arc::new(OrganizationProvisioningSubscriber::new(
        organizations,
    )))?;
    dispatcher.subscribe(Arc::new(ActiveOrganizationSubscriber::new(accounts)))?;
    Ok(())
}
