//! Subscription plan contracts shared by the API and shell consumers.
//!
//! The fetch path may fail (network, missing store); consumers must degrade
//! to [`Subscription::default_free`] instead of propagating the error, so a
//! plan value is always available for rendering.

use serde::{Deserialize, Serialize};

use crate::SCHEMA_VERSION_V1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Free,
    StudentPremium,
    StudentParentPremiumPro,
    EducationalInstitutionsPremium,
}

impl PlanType {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Free => "Free Plan",
            Self::StudentPremium => "Students Premium Plan",
            Self::StudentParentPremiumPro => "Student + Parent Premium Pro Plan",
            Self::EducationalInstitutionsPremium => "Educational Institutions Premium Plan",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanFeatures {
    pub full_access: bool,
    pub games_per_pillar: u32,
    pub wise_club_access: bool,
    pub parent_dashboard: bool,
}

impl PlanFeatures {
    pub fn free() -> Self {
        Self {
            full_access: false,
            games_per_pillar: 5,
            wise_club_access: false,
            parent_dashboard: false,
        }
    }

    pub fn for_plan(plan_type: PlanType) -> Self {
        match plan_type {
            PlanType::Free => Self::free(),
            PlanType::StudentPremium => Self {
                full_access: true,
                games_per_pillar: u32::MAX,
                wise_club_access: true,
                parent_dashboard: false,
            },
            PlanType::StudentParentPremiumPro | PlanType::EducationalInstitutionsPremium => Self {
                full_access: true,
                games_per_pillar: u32::MAX,
                wise_club_access: true,
                parent_dashboard: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub schema_version: String,
    pub plan_type: PlanType,
    pub plan_name: String,
    pub status: SubscriptionStatus,
    pub features: PlanFeatures,
}

impl Subscription {
    pub fn new(plan_type: PlanType, status: SubscriptionStatus) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            plan_type,
            plan_name: plan_type.display_name().to_string(),
            status,
            features: PlanFeatures::for_plan(plan_type),
        }
    }

    /// The safe default every fetch failure falls back to.
    pub fn default_free() -> Self {
        Self::new(PlanType::Free, SubscriptionStatus::Active)
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_free_plan_matches_fallback_contract() {
        let plan = Subscription::default_free();
        assert_eq!(plan.plan_type, PlanType::Free);
        assert_eq!(plan.status, SubscriptionStatus::Active);
        assert!(!plan.features.full_access);
        assert_eq!(plan.features.games_per_pillar, 5);
    }

    #[test]
    fn premium_plans_unlock_full_access() {
        for plan_type in [
            PlanType::StudentPremium,
            PlanType::StudentParentPremiumPro,
            PlanType::EducationalInstitutionsPremium,
        ] {
            let plan = Subscription::new(plan_type, SubscriptionStatus::Active);
            assert!(plan.features.full_access);
        }
    }
}
