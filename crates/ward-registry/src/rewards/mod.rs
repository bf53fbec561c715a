//! Reward events and the distribution ledger.
//!
//! An event carries an eligibility rule; the resolver turns that rule into
//! a citizen set, the ledger records who gets what exactly once, and the
//! generator mass-produces ledger rows from school results or age bands.

pub mod domain;
pub mod eligibility;
pub mod generator;
pub mod ledger;
pub mod memory;
pub mod repository;
pub mod roster;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{
    AchievementId, AchievementTier, DistributionDraft, DistributionId, DistributionStatus,
    EventId, EventStatus, NewRewardEvent, NewStudentAchievement, RewardDistribution, RewardEvent,
    RewardRule, RuleKind, StudentAchievement,
};
pub use eligibility::{EligibilityResolver, EligibilitySummary};
pub use generator::{GenerationOutcome, RewardGenerator, TierRewardTable};
pub use ledger::{
    DistributionLedger, EventLedgerSummary, HouseholdLedgerEntry, RegistrationRequest,
    RewardsError,
};
pub use memory::InMemoryRewardStore;
pub use repository::{DistributionRecord, RewardRepository};
pub use roster::{AchievementRosterImporter, RosterImportError, RosterOutcome};
pub use router::{rewards_router, RewardsState};
