use chrono::NaiveDateTime;

use crate::registry::domain::{CitizenId, HouseholdId, UserId};
use crate::rewards::domain::{
    DistributionId, EventId, EventStatus, NewRewardEvent, NewStudentAchievement, RewardDistribution,
    RewardEvent, StudentAchievement,
};
use crate::store::RepositoryError;

/// Insert payload for a ledger row. The store assigns the id and sets the
/// status to Registered; `distributed_at`/`distributed_by` start empty.
#[derive(Debug, Clone)]
pub struct DistributionRecord {
    pub event: EventId,
    pub household: HouseholdId,
    pub citizen: Option<CitizenId>,
    pub quantity: u32,
    pub unit_value: u32,
    pub total_value: u64,
    pub registered_at: NaiveDateTime,
    pub note: Option<String>,
}

/// Storage abstraction for reward events, the distribution ledger and
/// student achievements.
///
/// The ledger carries one hard constraint the store must own: at most one
/// non-cancelled row per (event, citizen) pair when the citizen is set.
/// `insert_distribution` and `insert_distributions` fail with
/// [`RepositoryError::Conflict`] when the constraint would break, which
/// makes the store the arbiter between two concurrent registrations.
pub trait RewardRepository: Send + Sync {
    fn insert_event(&self, event: NewRewardEvent) -> Result<RewardEvent, RepositoryError>;

    fn event(&self, id: &EventId) -> Result<Option<RewardEvent>, RepositoryError>;

    fn update_event_status(
        &self,
        id: &EventId,
        status: EventStatus,
    ) -> Result<RewardEvent, RepositoryError>;

    fn insert_distribution(
        &self,
        record: DistributionRecord,
    ) -> Result<RewardDistribution, RepositoryError>;

    /// All-or-nothing batch insert. A duplicate (event, citizen) pair inside
    /// the batch or against the store fails the whole batch.
    fn insert_distributions(
        &self,
        records: Vec<DistributionRecord>,
    ) -> Result<Vec<RewardDistribution>, RepositoryError>;

    fn distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<RewardDistribution>, RepositoryError>;

    fn distributions_for_event(
        &self,
        event: &EventId,
    ) -> Result<Vec<RewardDistribution>, RepositoryError>;

    /// Count of non-cancelled rows for the event; this is what capacity
    /// checks compare against `max_slots`.
    fn active_count(&self, event: &EventId) -> Result<usize, RepositoryError>;

    /// The non-cancelled row holding the (event, citizen) key, if any.
    fn active_registration(
        &self,
        event: &EventId,
        citizen: &CitizenId,
    ) -> Result<Option<RewardDistribution>, RepositoryError>;

    /// Conditional transition Registered -> Distributed. Returns the updated
    /// row, or `None` when no row currently satisfies the precondition
    /// (unknown id, already distributed, or cancelled).
    fn mark_distributed(
        &self,
        id: &DistributionId,
        at: NaiveDateTime,
        by: Option<UserId>,
        note: Option<String>,
    ) -> Result<Option<RewardDistribution>, RepositoryError>;

    /// Conditional transition Registered -> Cancelled. Frees the
    /// (event, citizen) key and the capacity slot. Same `None` contract as
    /// [`RewardRepository::mark_distributed`].
    fn mark_cancelled(
        &self,
        id: &DistributionId,
        note: Option<String>,
    ) -> Result<Option<RewardDistribution>, RepositoryError>;

    /// Deletes the non-cancelled rows the listed citizens hold for the
    /// event. Cancelled rows stay behind as audit trail. Returns how many
    /// rows were removed.
    fn remove_active_for_citizens(
        &self,
        event: &EventId,
        citizens: &[CitizenId],
    ) -> Result<usize, RepositoryError>;

    fn insert_achievement(
        &self,
        achievement: NewStudentAchievement,
    ) -> Result<StudentAchievement, RepositoryError>;

    fn achievements_for_year(
        &self,
        school_year: &str,
    ) -> Result<Vec<StudentAchievement>, RepositoryError>;

    fn achievements_for_citizen(
        &self,
        citizen: &CitizenId,
    ) -> Result<Vec<StudentAchievement>, RepositoryError>;
}
