//! Services layer for tenancy-service.
//!
//! Domain services for the account and organization verticals, their
//! storage backends, and the infrastructure clients (mail, sessions, metrics).

pub mod account;
pub mod capabilities;
mod database;
pub mod email;
pub mod error;
pub mod jwt;
mod memory;
pub mod metrics;
pub mod organization;
pub mod redis;
pub mod repository;

pub use account::AccountDomainService;
pub use capabilities::{CapabilitiesService, CapabilitySet};
pub use database::Database;
pub use email::{EmailProvider, EmailService, InvitationEmail, MockEmailService, SentEmail};
pub use error::ServiceError;
pub use jwt::{AccessTokenClaims, JwtService, TokenResponse};
pub use memory::InMemoryDatabase;
pub use organization::{AcceptedInvitation, OrganizationDomainService};
pub use redis::{MockBlacklist, RedisService, TokenBlacklist};
pub use repository::{AccountStore, OrganizationStore};
