//! Bulk ledger generation from school achievements and age bands.
//!
//! Generation is an administrative action: rows land as Registered and are
//! handed over later through the ledger. Reward tables are explicit
//! arguments; this module has no built-in amounts.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audit::{AuditAction, AuditEntry, AuditWriter};
use crate::registry::domain::{CitizenId, LifeStatus};
use crate::registry::repository::RegistryRepository;

use super::domain::{AchievementTier, EventId, RewardDistribution, RewardEvent, RewardRule};
use super::eligibility::rules::age_on;
use super::ledger::RewardsError;
use super::repository::{DistributionRecord, RewardRepository};

/// Quantity/value configuration per achievement tier. Tiers absent from the
/// table are skipped during generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierRewardTable {
    rules: BTreeMap<AchievementTier, RewardRule>,
}

impl TierRewardTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, tier: AchievementTier, rule: RewardRule) -> Self {
        self.rules.insert(tier, rule);
        self
    }

    pub fn rule(&self, tier: AchievementTier) -> Option<RewardRule> {
        self.rules.get(&tier).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// What one generator run did. `skipped` counts citizens already holding an
/// active row (without overwrite), repeat achievements, and tiers missing
/// from the table; `missing_household` counts candidates that could not be
/// attached to a household.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub created: usize,
    pub skipped: usize,
    pub missing_household: usize,
}

pub struct RewardGenerator<R, W, A> {
    registry: Arc<R>,
    rewards: Arc<W>,
    audit: Arc<A>,
}

impl<R, W, A> RewardGenerator<R, W, A>
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
{
    pub fn new(registry: Arc<R>, rewards: Arc<W>, audit: Arc<A>) -> Self {
        Self {
            registry,
            rewards,
            audit,
        }
    }

    /// One row per rewarded student of the school year. The achievement's
    /// own notebook count wins over the tier quantity when positive. A
    /// citizen with several results in the year is rewarded once.
    pub fn from_achievements(
        &self,
        event: &EventId,
        school_year: &str,
        table: &TierRewardTable,
        overwrite: bool,
    ) -> Result<GenerationOutcome, RewardsError> {
        let event = self.require_event(event)?;
        let registered_at = Utc::now().naive_utc();
        let mut outcome = GenerationOutcome::default();
        let mut claimed: HashSet<CitizenId> = HashSet::new();
        let mut replace: Vec<CitizenId> = Vec::new();
        let mut records: Vec<DistributionRecord> = Vec::new();

        for achievement in self.rewards.achievements_for_year(school_year)? {
            let rule = match table.rule(achievement.tier) {
                Some(rule) => rule,
                None => {
                    outcome.skipped += 1;
                    continue;
                }
            };
            if !claimed.insert(achievement.citizen.clone()) {
                outcome.skipped += 1;
                continue;
            }
            let citizen = match self.registry.citizen(&achievement.citizen)? {
                Some(citizen) => citizen,
                None => {
                    outcome.missing_household += 1;
                    continue;
                }
            };
            let household = match &citizen.household {
                Some(household) => household.clone(),
                None => {
                    outcome.missing_household += 1;
                    continue;
                }
            };
            if self
                .rewards
                .active_registration(&event.id, &citizen.id)?
                .is_some()
            {
                if overwrite {
                    replace.push(citizen.id.clone());
                } else {
                    outcome.skipped += 1;
                    continue;
                }
            }
            let quantity = if achievement.notebooks_rewarded > 0 {
                achievement.notebooks_rewarded
            } else {
                rule.quantity
            };
            records.push(DistributionRecord {
                event: event.id.clone(),
                household,
                citizen: Some(citizen.id),
                quantity,
                unit_value: rule.unit_value,
                total_value: RewardDistribution::derived_total(quantity, rule.unit_value),
                registered_at,
                note: Some(format!(
                    "School reward {} ({})",
                    school_year,
                    achievement.tier.label()
                )),
            });
        }

        self.apply(&event, &replace, records, &mut outcome)?;
        self.record(
            AuditEntry::new(AuditAction::Generate, "reward_event", event.id.0.clone()).detail(
                format!(
                    "{} rows from {} achievements ({} skipped, {} without household)",
                    outcome.created, school_year, outcome.skipped, outcome.missing_household
                ),
            ),
        );
        Ok(outcome)
    }

    /// One row per living citizen whose age on the reference date falls in
    /// `[min_age, max_age]`, at a flat quantity and unit value.
    pub fn from_age_range(
        &self,
        event: &EventId,
        min_age: u32,
        max_age: u32,
        reward: RewardRule,
        overwrite: bool,
        today: NaiveDate,
    ) -> Result<GenerationOutcome, RewardsError> {
        if min_age > max_age {
            return Err(RewardsError::InvalidAgeRange {
                min: min_age,
                max: max_age,
            });
        }
        let event = self.require_event(event)?;
        let reference = event.reference_date(today);
        let registered_at = Utc::now().naive_utc();
        let mut outcome = GenerationOutcome::default();
        let mut replace: Vec<CitizenId> = Vec::new();
        let mut records: Vec<DistributionRecord> = Vec::new();

        for citizen in self.registry.citizens()? {
            if citizen.life_status != LifeStatus::Alive {
                continue;
            }
            let age = match age_on(citizen.date_of_birth, reference) {
                Some(age) => age,
                None => continue,
            };
            if age < min_age || age > max_age {
                continue;
            }
            let household = match &citizen.household {
                Some(household) => household.clone(),
                None => {
                    outcome.missing_household += 1;
                    continue;
                }
            };
            if self
                .rewards
                .active_registration(&event.id, &citizen.id)?
                .is_some()
            {
                if overwrite {
                    replace.push(citizen.id.clone());
                } else {
                    outcome.skipped += 1;
                    continue;
                }
            }
            records.push(DistributionRecord {
                event: event.id.clone(),
                household,
                citizen: Some(citizen.id),
                quantity: reward.quantity,
                unit_value: reward.unit_value,
                total_value: RewardDistribution::derived_total(reward.quantity, reward.unit_value),
                registered_at,
                note: Some(format!("Age band {min_age}-{max_age}")),
            });
        }

        self.apply(&event, &replace, records, &mut outcome)?;
        self.record(
            AuditEntry::new(AuditAction::Generate, "reward_event", event.id.0.clone()).detail(
                format!(
                    "{} rows for ages {}-{} ({} skipped, {} without household)",
                    outcome.created, min_age, max_age, outcome.skipped, outcome.missing_household
                ),
            ),
        );
        Ok(outcome)
    }

    /// Shared tail: clear overwritten rows, then insert the batch.
    fn apply(
        &self,
        event: &RewardEvent,
        replace: &[CitizenId],
        records: Vec<DistributionRecord>,
        outcome: &mut GenerationOutcome,
    ) -> Result<(), RewardsError> {
        if !replace.is_empty() {
            self.rewards.remove_active_for_citizens(&event.id, replace)?;
        }
        let rows = self.rewards.insert_distributions(records)?;
        outcome.created = rows.len();
        Ok(())
    }

    fn require_event(&self, id: &EventId) -> Result<RewardEvent, RewardsError> {
        self.rewards
            .event(id)?
            .ok_or_else(|| RewardsError::EventNotFound(id.clone()))
    }

    fn record(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.record(entry) {
            warn!(error = %err, "audit write failed");
        }
    }
}
