use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use ward_registry::audit::TracingAuditWriter;
use ward_registry::notify::TracingFanout;
use ward_registry::registry::{InMemoryRegistry, MembershipService};
use ward_registry::rewards::{
    AchievementRosterImporter, AchievementTier, InMemoryRewardStore, RewardRule, RewardsState,
    TierRewardTable,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Membership = MembershipService<InMemoryRegistry, TracingAuditWriter, TracingFanout>;
pub(crate) type WardRewards =
    RewardsState<InMemoryRegistry, InMemoryRewardStore, TracingAuditWriter, TracingFanout>;
pub(crate) type RosterImporter = AchievementRosterImporter<InMemoryRegistry, InMemoryRewardStore>;

/// Every service the HTTP surface and the demo need, built over one shared
/// in-memory registry and reward store.
pub(crate) struct WardServices {
    pub(crate) membership: Arc<Membership>,
    pub(crate) rewards: WardRewards,
    pub(crate) importer: Arc<RosterImporter>,
}

impl WardServices {
    pub(crate) fn build() -> Self {
        let registry = Arc::new(InMemoryRegistry::default());
        let rewards = Arc::new(InMemoryRewardStore::default());
        let audit = Arc::new(TracingAuditWriter);
        let fanout = Arc::new(TracingFanout);
        Self {
            membership: Arc::new(MembershipService::new(
                registry.clone(),
                audit.clone(),
                fanout.clone(),
            )),
            rewards: RewardsState::new(registry.clone(), rewards.clone(), audit, fanout),
            importer: Arc::new(AchievementRosterImporter::new(registry, rewards)),
        }
    }
}

/// Notebook counts and unit values customarily used for the school reward
/// season. Callers can always post their own table instead.
pub(crate) fn default_tier_rewards() -> TierRewardTable {
    TierRewardTable::new()
        .with_rule(
            AchievementTier::Outstanding,
            RewardRule {
                quantity: 10,
                unit_value: 5_000,
            },
        )
        .with_rule(
            AchievementTier::Excellent,
            RewardRule {
                quantity: 8,
                unit_value: 5_000,
            },
        )
        .with_rule(
            AchievementTier::Good,
            RewardRule {
                quantity: 5,
                unit_value: 5_000,
            },
        )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
