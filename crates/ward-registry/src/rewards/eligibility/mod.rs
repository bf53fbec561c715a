//! Decides which citizens an event's rule covers.
//!
//! The rule is the one pinned to the event at creation; names are never
//! consulted. All reads go through the repositories, so the resolver sees
//! whatever the registry currently holds.

pub(crate) mod rules;

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::registry::domain::{Citizen, CitizenId, Gender, LifeStatus, ResidencyStatus};
use crate::registry::repository::RegistryRepository;
use crate::store::{Page, PageRequest};

use super::domain::{DistributionStatus, EventId, RewardEvent, RuleKind};
use super::ledger::RewardsError;
use super::repository::RewardRepository;

use rules::within_years;

/// Eligibility and take-up figures for one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilitySummary {
    pub eligible_count: usize,
    pub registered_count: usize,
    pub distributed_count: usize,
    /// `distributed / eligible * 100`, rounded to one decimal. Zero when
    /// nobody is eligible.
    pub distributed_ratio_pct: f64,
}

pub struct EligibilityResolver<R, W> {
    registry: Arc<R>,
    rewards: Arc<W>,
}

impl<R, W> EligibilityResolver<R, W>
where
    R: RegistryRepository,
    W: RewardRepository,
{
    pub fn new(registry: Arc<R>, rewards: Arc<W>) -> Self {
        Self { registry, rewards }
    }

    /// Every citizen the event's rule covers, households grouped together.
    pub fn eligible_citizens(
        &self,
        event: &EventId,
        today: NaiveDate,
    ) -> Result<Vec<Citizen>, RewardsError> {
        let event = self.require_event(event)?;
        let reference = event.reference_date(today);
        let mut eligible = Vec::new();
        for citizen in self.registry.citizens()? {
            if self.satisfies(&event, &citizen, reference)? {
                eligible.push(citizen);
            }
        }
        eligible.sort_by(household_first);
        Ok(eligible)
    }

    /// Single-citizen form of the same predicate.
    pub fn is_eligible(
        &self,
        event: &EventId,
        citizen: &CitizenId,
        today: NaiveDate,
    ) -> Result<bool, RewardsError> {
        let event = self.require_event(event)?;
        let citizen = self
            .registry
            .citizen(citizen)?
            .ok_or_else(|| RewardsError::CitizenNotFound(citizen.clone()))?;
        let reference = event.reference_date(today);
        self.satisfies(&event, &citizen, reference)
    }

    pub fn count(&self, event: &EventId, today: NaiveDate) -> Result<usize, RewardsError> {
        Ok(self.eligible_citizens(event, today)?.len())
    }

    pub fn list(
        &self,
        event: &EventId,
        today: NaiveDate,
        request: PageRequest,
    ) -> Result<Page<Citizen>, RewardsError> {
        Ok(Page::paginate(self.eligible_citizens(event, today)?, request))
    }

    pub fn summary(
        &self,
        event: &EventId,
        today: NaiveDate,
    ) -> Result<EligibilitySummary, RewardsError> {
        let eligible_count = self.count(event, today)?;
        let rows = self.rewards.distributions_for_event(event)?;
        let registered_count = rows.iter().filter(|row| row.status.is_active()).count();
        let distributed_count = rows
            .iter()
            .filter(|row| row.status == DistributionStatus::Distributed)
            .count();
        let distributed_ratio_pct = if eligible_count == 0 {
            0.0
        } else {
            let ratio = distributed_count as f64 / eligible_count as f64 * 100.0;
            (ratio * 10.0).round() / 10.0
        };
        Ok(EligibilitySummary {
            eligible_count,
            registered_count,
            distributed_count,
            distributed_ratio_pct,
        })
    }

    fn require_event(&self, id: &EventId) -> Result<RewardEvent, RewardsError> {
        self.rewards
            .event(id)?
            .ok_or_else(|| RewardsError::EventNotFound(id.clone()))
    }

    fn satisfies(
        &self,
        event: &RewardEvent,
        citizen: &Citizen,
        reference: NaiveDate,
    ) -> Result<bool, RewardsError> {
        let rule = match event.rule {
            Some(rule) => rule,
            // Legacy events without a rule cover nobody.
            None => return Ok(false),
        };
        let verdict = match rule {
            RuleKind::MidAutumn => {
                citizen.residency == ResidencyStatus::Permanent
                    && within_years(citizen.date_of_birth, reference, 18)
            }
            RuleKind::ChildrensDay => {
                citizen.residency == ResidencyStatus::Permanent
                    && within_years(citizen.date_of_birth, reference, 14)
            }
            RuleKind::WomensDay => citizen.gender == Gender::Female,
            RuleKind::AnnualGeneral => true,
            RuleKind::SchoolAchievement => {
                !self.rewards.achievements_for_citizen(&citizen.id)?.is_empty()
            }
            RuleKind::OpenSpecial => {
                citizen.life_status == LifeStatus::Alive
                    && citizen.residency == ResidencyStatus::Permanent
            }
        };
        Ok(verdict)
    }
}

fn household_first(a: &Citizen, b: &Citizen) -> Ordering {
    match (&a.household, &b.household) {
        (Some(left), Some(right)) => left.cmp(right).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    }
}
