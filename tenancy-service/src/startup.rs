//! Wiring of stores, services and infrastructure clients into [`AppState`].

use service_core::error::AppError;
use service_core::middleware::rate_limit::IpRateLimit;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::TenancyConfig;
use crate::db;
use crate::events::{register_subscribers, EventDispatcher};
use crate::facade::{AccountFacade, OrganizationFacade};
use crate::services::{
    AccountDomainService, AccountStore, CapabilitiesService, Database, EmailProvider,
    EmailService, InMemoryDatabase, JwtService, MockBlacklist, MockEmailService,
    OrganizationDomainService, OrganizationStore, RedisService, TokenBlacklist,
};
use crate::AppState;

/// Storage backends of both verticals.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub organizations: Arc<dyn OrganizationStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self::from_shared(Arc::new(InMemoryDatabase::new()))
    }

    /// Both verticals backed by one store.
    pub fn from_shared<T>(store: Arc<T>) -> Self
    where
        T: AccountStore + OrganizationStore + 'static,
    {
        Self {
            accounts: store.clone(),
            organizations: store,
        }
    }
}

/// PostgreSQL when configured, else the in-memory store.
pub async fn connect_stores(config: &TenancyConfig) -> Result<Stores, AppError> {
    let Some(database) = &config.database else {
        tracing::warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Stores::in_memory());
    };

    let pool = db::create_pool(database).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to PostgreSQL");
        AppError::DatabaseError(anyhow::Error::new(e))
    })?;
    db::run_migrations(&pool).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to run migrations");
        AppError::DatabaseError(anyhow::Error::new(e))
    })?;

    Ok(Stores::from_shared(Arc::new(Database::new(pool))))
}

/// Redis when configured, else an in-process list.
pub async fn connect_blacklist(config: &TenancyConfig) -> Result<Arc<dyn TokenBlacklist>, AppError> {
    match &config.redis {
        Some(redis) => {
            let service = RedisService::new(redis).await.map_err(AppError::InternalError)?;
            Ok(Arc::new(service))
        }
        None => {
            tracing::warn!("REDIS_URL not set, session revocations are kept in process");
            Ok(Arc::new(MockBlacklist::new()))
        }
    }
}

/// SMTP when configured, else a mailer that only records and logs.
pub fn email_provider(config: &TenancyConfig) -> Result<Arc<dyn EmailProvider>, AppError> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(EmailService::new(smtp)?)),
        None => {
            tracing::warn!("SMTP_HOST not set, outbound mail is only logged");
            Ok(Arc::new(MockEmailService::new()))
        }
    }
}

/// Builds services over the given backends and registers the event
/// subscribers that connect the two verticals.
pub fn build_state(
    config: TenancyConfig,
    stores: Stores,
    email: Arc<dyn EmailProvider>,
    blacklist: Arc<dyn TokenBlacklist>,
) -> Result<AppState, AppError> {
    let dispatcher = EventDispatcher::new();
    register_subscribers(
        &dispatcher,
        stores.accounts.clone(),
        stores.organizations.clone(),
    )?;

    let accounts = AccountDomainService::new(stores.accounts, dispatcher.clone(), email.clone());
    let organizations = OrganizationDomainService::new(
        stores.organizations,
        accounts.clone(),
        dispatcher,
        email,
        config.public_base_url.clone(),
    );

    let sign_in_rate_limiter = IpRateLimit::new(
        config.rate_limit.sign_in_attempts,
        config.rate_limit.sign_in_window_seconds,
        config.rate_limit.trust_forwarded_for,
    );
    let ip_rate_limiter = IpRateLimit::new(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
        config.rate_limit.trust_forwarded_for,
    );

    Ok(AppState {
        jwt: JwtService::new(&config.jwt),
        capabilities: CapabilitiesService::new(organizations.clone()),
        account_facade: AccountFacade::new(accounts.clone()),
        organization_facade: OrganizationFacade::new(organizations.clone()),
        config,
        accounts,
        organizations,
        blacklist,
        sign_in_rate_limiter,
        ip_rate_limiter,
    })
}

/// Periodically forgets clients whose rate-limit allowance has replenished,
/// so the per-IP maps stay bounded by recent traffic.
pub fn spawn_rate_limit_cleanup(state: &AppState, every: Duration) -> JoinHandle<()> {
    let limits = [state.sign_in_rate_limiter.clone(), state.ip_rate_limiter.clone()];
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            for limit in &limits {
                limit.retain_recent();
            }
        }
    })
}
