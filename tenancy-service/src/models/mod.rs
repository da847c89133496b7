pub mod access_right;
pub mod account;
pub mod account_token;
pub mod email_address;
pub mod group;
pub mod invitation;
pub mod locale;
pub mod membership_plan;
pub mod organization;
pub mod role;

pub use access_right::AccessRight;
pub use account::{Account, AccountResponse};
pub use account_token::{AccountToken, TokenPurpose};
pub use email_address::{normalize_email, EmailAddress};
pub use group::{Group, GroupResponse, ADMINISTRATORS_GROUP_NAME, TEAM_MEMBERS_GROUP_NAME};
pub use invitation::{Invitation, InvitationResponse};
pub use locale::Iso639_1Code;
pub use membership_plan::{Capability, MembershipPlan};
pub use organization::{Organization, OrganizationResponse};
pub use role::Role;
