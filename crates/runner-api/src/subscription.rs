//! Plan-aware gating for session creation.
//!
//! Plan lookups can fail (missing store, corrupt row). The context never
//! propagates those failures; it degrades to the free plan and flags the
//! degradation so callers can surface a warning.

use std::path::PathBuf;

use contracts::Subscription;

use crate::persistence::{PersistenceError, SqliteSessionStore};

pub trait PlanSource {
    fn fetch_current(&self, user_id: &str) -> Result<Option<Subscription>, PersistenceError>;
}

/// Reads the subscription row from the same sqlite file the session store
/// writes to. Opens per lookup so the source can live outside the store's
/// mutable borrow.
#[derive(Debug, Clone)]
pub struct SqlitePlanSource {
    path: PathBuf,
}

impl SqlitePlanSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlanSource for SqlitePlanSource {
    fn fetch_current(&self, user_id: &str) -> Result<Option<Subscription>, PersistenceError> {
        let store = SqliteSessionStore::open(&self.path)?;
        store.load_subscription(user_id)
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionContext {
    pub subscription: Subscription,
    /// True when the plan lookup failed and the free plan was substituted.
    pub degraded: bool,
}

impl SubscriptionContext {
    pub fn load(source: &dyn PlanSource, user_id: &str) -> Self {
        match source.fetch_current(user_id) {
            Ok(Some(subscription)) => Self {
                subscription,
                degraded: false,
            },
            Ok(None) => Self {
                subscription: Subscription::default_free(),
                degraded: false,
            },
            Err(err) => {
                log::warn!("subscription lookup for {user_id} failed, using free plan: {err}");
                Self {
                    subscription: Subscription::default_free(),
                    degraded: true,
                }
            }
        }
    }

    pub fn full_access(&self) -> bool {
        self.subscription.is_active() && self.subscription.features.full_access
    }

    pub fn games_per_pillar(&self) -> u32 {
        if self.subscription.is_active() {
            self.subscription.features.games_per_pillar
        } else {
            Subscription::default_free().features.games_per_pillar
        }
    }

    /// A game inside the free quota for its pillar is always playable; the
    /// index is the game's position within its pillar catalog.
    pub fn can_play_game(&self, pillar_index: u32) -> bool {
        self.full_access() || pillar_index < self.games_per_pillar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PlanType, SubscriptionStatus};

    struct FailingPlanSource;

    impl PlanSource for FailingPlanSource {
        fn fetch_current(
            &self,
            _user_id: &str,
        ) -> Result<Option<Subscription>, PersistenceError> {
            Err(PersistenceError::NotAttached)
        }
    }

    struct FixedPlanSource(Option<Subscription>);

    impl PlanSource for FixedPlanSource {
        fn fetch_current(
            &self,
            _user_id: &str,
        ) -> Result<Option<Subscription>, PersistenceError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn fetch_failure_degrades_to_active_free_plan() {
        let context = SubscriptionContext::load(&FailingPlanSource, "student_1");
        assert!(context.degraded);
        assert_eq!(context.subscription.plan_type, PlanType::Free);
        assert!(context.subscription.is_active());
        assert!(!context.full_access());
    }

    #[test]
    fn missing_row_is_free_plan_without_degradation() {
        let context = SubscriptionContext::load(&FixedPlanSource(None), "student_1");
        assert!(!context.degraded);
        assert_eq!(context.subscription.plan_type, PlanType::Free);
    }

    #[test]
    fn expired_premium_falls_back_to_free_quota() {
        let expired =
            Subscription::new(PlanType::StudentPremium, SubscriptionStatus::Expired);
        let context = SubscriptionContext::load(&FixedPlanSource(Some(expired)), "student_1");
        assert!(!context.full_access());
        assert_eq!(context.games_per_pillar(), 5);
        assert!(context.can_play_game(4));
        assert!(!context.can_play_game(5));
    }

    #[test]
    fn active_premium_unlocks_everything() {
        let premium =
            Subscription::new(PlanType::StudentPremium, SubscriptionStatus::Active);
        let context = SubscriptionContext::load(&FixedPlanSource(Some(premium)), "student_1");
        assert!(context.full_access());
        assert!(context.can_play_game(999));
    }
}
