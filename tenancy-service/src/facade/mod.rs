//! Read-side entry points one vertical offers the other, in DTO form.

mod account;
mod organization;

pub use account::{AccountFacade, AccountInfoDto, AccountRegistrationDto, RegistrationResult};
pub use organization::OrganizationFacade;
