//! In-process domain events.
//!
//! Dispatch is synchronous: `dispatch` returns once every subscriber has
//! handled the event, including events they dispatched themselves. The first
//! subscriber error aborts the chain and is returned to the caller.

mod subscribers;

use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::services::ServiceError;

pub use subscribers::{
    register_subscribers, ActiveOrganizationSubscriber, OrganizationProvisioningSubscriber,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    AccountCreated {
        account_id: Uuid,
    },
    CurrentlyActiveOrganizationChanged {
        organization_id: Uuid,
        affected_account_id: Uuid,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::AccountCreated { .. } => "account_created",
            DomainEvent::CurrentlyActiveOrganizationChanged { .. } => {
                "currently_active_organization_changed"
            }
        }
    }
}

#[async_trait]
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ignores events it is not interested in.
    async fn handle(
        &self,
        event: &DomainEvent,
        dispatcher: &EventDispatcher,
    ) -> Result<(), ServiceError>;
}

/// Fan-out of domain events to subscribers, in subscription order.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    subscribers: Arc<RwLock<Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> Result<(), ServiceError> {
        self.subscribers
            .write()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Subscriber list poisoned: {}", e)))?
            .push(subscriber);
        Ok(())
    }

    pub async fn dispatch(&self, event: DomainEvent) -> Result<(), ServiceError> {
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self
            .subscribers
            .read()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Subscriber list poisoned: {}", e)))?
            .clone();

        tracing::debug!(event = event.name(), ?event, "Dispatching domain event");

        for subscriber in subscribers {
            if let Err(e) = subscriber.handle(&event, self).await {
                tracing::error!(
                    event = event.name(),
                    subscriber = subscriber.name(),
                    error = %e,
                    "Event subscriber failed"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
