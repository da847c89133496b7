//! Subscription tiers and the landing-page capabilities they unlock.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CustomDomain,
    CustomLogoOnLandingpage,
    AdFreeLandingpages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MembershipPlan {
    #[default]
    Basic,
    Independent,
    Professional,
}

impl MembershipPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipPlan::Basic => "basic",
            MembershipPlan::Independent => "independent",
            MembershipPlan::Professional => "professional",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            MembershipPlan::Basic => &[],
            MembershipPlan::Independent => &[
                Capability::CustomLogoOnLandingpage,
                Capability::AdFreeLandingpages,
            ],
            MembershipPlan::Professional => &[
                Capability::CustomDomain,
                Capability::CustomLogoOnLandingpage,
                Capability::AdFreeLandingpages,
            ],
        }
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::str::FromStr for MembershipPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(MembershipPlan::Basic),
            "independent" => Ok(MembershipPlan::Independent),
            "professional" => Ok(MembershipPlan::Professional),
            _ => Err(format!("Unknown membership plan: {}", s)),
        }
    }
}
