//! Distribution ledger: registration, hand-over, cancellation, summaries.
//!
//! Rows move Registered -> Distributed, or Registered -> Cancelled; nothing
//! ever leaves a terminal state. The (event, citizen) uniqueness constraint
//! in the store is the final arbiter against double registration; the checks
//! here exist to return precise errors before a write is attempted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audit::{AuditAction, AuditEntry, AuditWriter};
use crate::error::FaultKind;
use crate::notify::{
    Notification, NotificationFanout, NotificationKind, NotificationPriority,
};
use crate::registry::domain::{Citizen, CitizenId, Household, HouseholdId, UserId};
use crate::registry::repository::RegistryRepository;
use crate::store::RepositoryError;

use super::domain::{
    DistributionDraft, DistributionId, DistributionStatus, EventId, EventStatus, NewRewardEvent,
    RewardDistribution, RewardEvent, RuleKind,
};
use super::repository::{DistributionRecord, RewardRepository};

#[derive(Debug, thiserror::Error)]
pub enum RewardsError {
    #[error("reward event {0} not found")]
    EventNotFound(EventId),
    #[error("distribution {0} not found")]
    DistributionNotFound(DistributionId),
    #[error("citizen {0} not found")]
    CitizenNotFound(CitizenId),
    #[error("household {0} not found")]
    HouseholdNotFound(HouseholdId),
    #[error("event {event} is not open for registration (status {})", .status.label())]
    EventNotOpen { event: EventId, status: EventStatus },
    #[error("registration for event {0} is outside its window")]
    OutsideWindow(EventId),
    #[error("event {event} is full ({max_slots} slots)")]
    CapacityExhausted { event: EventId, max_slots: u32 },
    #[error("citizen {citizen} already holds an active registration for event {event}")]
    AlreadyRegistered { event: EventId, citizen: CitizenId },
    #[error("quantity must be at least one")]
    ZeroQuantity,
    #[error("citizen {citizen} is not a member of household {household}")]
    NotAHouseholdMember {
        citizen: CitizenId,
        household: HouseholdId,
    },
    #[error("event {event} cannot move from {} to {}", .from.label(), .to.label())]
    EventTransition {
        event: EventId,
        from: EventStatus,
        to: EventStatus,
    },
    #[error("distribution {0} is not in a cancellable state")]
    NotCancellable(DistributionId),
    #[error("age range {min}..{max} is inverted")]
    InvalidAgeRange { min: u32, max: u32 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RewardsError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::EventNotFound(_)
            | Self::DistributionNotFound(_)
            | Self::CitizenNotFound(_)
            | Self::HouseholdNotFound(_) => FaultKind::NotFound,
            Self::EventNotOpen { .. }
            | Self::OutsideWindow(_)
            | Self::CapacityExhausted { .. }
            | Self::AlreadyRegistered { .. }
            | Self::EventTransition { .. }
            | Self::NotCancellable(_) => FaultKind::Conflict,
            Self::ZeroQuantity
            | Self::NotAHouseholdMember { .. }
            | Self::InvalidAgeRange { .. } => FaultKind::Validation,
            Self::Repository(RepositoryError::NotFound) => FaultKind::NotFound,
            Self::Repository(RepositoryError::Conflict) => FaultKind::Conflict,
            Self::Repository(RepositoryError::Unavailable(_)) => FaultKind::Unavailable,
        }
    }
}

/// Payload for a single registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub event: EventId,
    pub household: HouseholdId,
    pub citizen: CitizenId,
    pub quantity: u32,
    #[serde(default)]
    pub unit_value: Option<u32>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Roll-up of one event's ledger. `distribution_count` covers every row
/// including cancelled ones; the quantity and value totals, and the
/// distinct-household count, cover non-cancelled rows only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLedgerSummary {
    pub event: EventId,
    pub distribution_count: usize,
    pub household_count: usize,
    pub total_quantity: u64,
    pub total_value: u64,
    pub registered: usize,
    pub distributed: usize,
    pub cancelled: usize,
}

/// Per-household slice of an event's non-cancelled rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdLedgerEntry {
    pub household: HouseholdId,
    pub distribution_count: usize,
    pub total_quantity: u64,
    pub total_value: u64,
}

/// Owns every ledger write. `total_value` is computed in exactly one place
/// (row construction here); values supplied by callers are discarded.
pub struct DistributionLedger<R, W, A, N> {
    registry: Arc<R>,
    rewards: Arc<W>,
    audit: Arc<A>,
    fanout: Arc<N>,
}

impl<R, W, A, N> DistributionLedger<R, W, A, N>
where
    R: RegistryRepository + 'static,
    W: RewardRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    pub fn new(registry: Arc<R>, rewards: Arc<W>, audit: Arc<A>, fanout: Arc<N>) -> Self {
        Self {
            registry,
            rewards,
            audit,
            fanout,
        }
    }

    /// Creates an event. When the payload names no rule, the legacy keyword
    /// vocabulary is consulted once; whatever lands here is final.
    pub fn create_event(&self, request: NewRewardEvent) -> Result<RewardEvent, RewardsError> {
        let rule = request.rule.or_else(|| RuleKind::suggest(&request.name));
        let event = self.rewards.insert_event(NewRewardEvent { rule, ..request })?;
        self.record(
            AuditEntry::new(AuditAction::Create, "reward_event", event.id.0.clone())
                .detail(format!("created {}", event.name)),
        );
        Ok(event)
    }

    /// Forward-only lifecycle step. Skipping stages is allowed, going back
    /// is not.
    pub fn transition_event(
        &self,
        id: &EventId,
        next: EventStatus,
        actor: Option<&UserId>,
    ) -> Result<RewardEvent, RewardsError> {
        let current = self.require_event(id)?;
        if !current.status.can_transition_to(next) {
            return Err(RewardsError::EventTransition {
                event: id.clone(),
                from: current.status,
                to: next,
            });
        }
        let updated = self.rewards.update_event_status(id, next)?;
        let mut entry = AuditEntry::new(AuditAction::Update, "reward_event", id.0.clone())
            .detail(format!(
                "status {} -> {}",
                current.status.label(),
                next.label()
            ));
        if let Some(actor) = actor {
            entry = entry.by(actor);
        }
        self.record(entry);
        self.publish(Notification {
            recipients: Vec::new(),
            title: format!("Event {} {}", updated.name, next.label().to_lowercase()),
            message: format!("{} moved to {}", updated.name, next.label()),
            kind: NotificationKind::EventLifecycle,
            entity_kind: "reward_event",
            entity_id: id.0.clone(),
            priority: NotificationPriority::Normal,
        });
        Ok(updated)
    }

    /// Registers one citizen for one event. Checks run in a fixed order so
    /// every failure mode is individually distinguishable; the store's
    /// uniqueness constraint backs the duplicate check.
    pub fn register(
        &self,
        request: RegistrationRequest,
        today: NaiveDate,
    ) -> Result<RewardDistribution, RewardsError> {
        let event = self.require_event(&request.event)?;
        if event.status != EventStatus::Open {
            return Err(RewardsError::EventNotOpen {
                event: event.id,
                status: event.status,
            });
        }
        if !event.accepts_registration_on(today) {
            return Err(RewardsError::OutsideWindow(event.id));
        }
        let household = self.require_household(&request.household)?;
        let citizen = self.require_citizen(&request.citizen)?;
        if !household.has_member(&citizen.id) {
            return Err(RewardsError::NotAHouseholdMember {
                citizen: citizen.id,
                household: household.id,
            });
        }
        if request.quantity == 0 {
            return Err(RewardsError::ZeroQuantity);
        }
        if event.max_slots > 0 {
            let taken = self.rewards.active_count(&event.id)?;
            if taken >= event.max_slots as usize {
                return Err(RewardsError::CapacityExhausted {
                    event: event.id,
                    max_slots: event.max_slots,
                });
            }
        }
        if self
            .rewards
            .active_registration(&event.id, &citizen.id)?
            .is_some()
        {
            return Err(RewardsError::AlreadyRegistered {
                event: event.id,
                citizen: citizen.id,
            });
        }

        let unit_value = request.unit_value.or(event.budget_per_gift).unwrap_or(0);
        let row = self
            .rewards
            .insert_distribution(DistributionRecord {
                event: event.id.clone(),
                household: household.id.clone(),
                citizen: Some(citizen.id.clone()),
                quantity: request.quantity,
                unit_value,
                total_value: RewardDistribution::derived_total(request.quantity, unit_value),
                registered_at: Utc::now().naive_utc(),
                note: request.note,
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => RewardsError::AlreadyRegistered {
                    event: event.id.clone(),
                    citizen: citizen.id.clone(),
                },
                other => RewardsError::Repository(other),
            })?;

        self.record(
            AuditEntry::new(AuditAction::Register, "distribution", row.id.0.clone()).detail(
                format!(
                    "event {}, citizen {}, {} x {}",
                    event.id, citizen.id, row.quantity, row.unit_value
                ),
            ),
        );
        self.notify_citizen(
            &citizen,
            NotificationKind::Registration,
            "Reward registered",
            format!("You are registered for {}.", event.name),
            &row.id,
            NotificationPriority::Normal,
        );
        Ok(row)
    }

    /// Inserts many Registered rows in one storage operation. Caller totals
    /// in the drafts are discarded; a duplicate (event, citizen) pair inside
    /// the batch or against the store fails the whole batch.
    pub fn bulk_create(&self, drafts: Vec<DistributionDraft>) -> Result<usize, RewardsError> {
        let registered_at = Utc::now().naive_utc();
        let mut events: HashMap<EventId, RewardEvent> = HashMap::new();
        let mut batch_keys: HashSet<(EventId, CitizenId)> = HashSet::new();
        let mut records = Vec::with_capacity(drafts.len());
        let mut citizens = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let event = match events.get(&draft.event) {
                Some(event) => event.clone(),
                None => {
                    let event = self.require_event(&draft.event)?;
                    events.insert(event.id.clone(), event.clone());
                    event
                }
            };
            if draft.quantity == 0 {
                return Err(RewardsError::ZeroQuantity);
            }
            let household = self.require_household(&draft.household)?;
            let mut row_citizen = None;
            if let Some(citizen_id) = &draft.citizen {
                let citizen = self.require_citizen(citizen_id)?;
                if !household.has_member(&citizen.id) {
                    return Err(RewardsError::NotAHouseholdMember {
                        citizen: citizen.id,
                        household: household.id,
                    });
                }
                let key = (event.id.clone(), citizen.id.clone());
                if !batch_keys.insert(key)
                    || self
                        .rewards
                        .active_registration(&event.id, &citizen.id)?
                        .is_some()
                {
                    return Err(RewardsError::AlreadyRegistered {
                        event: event.id,
                        citizen: citizen.id,
                    });
                }
                row_citizen = Some(citizen);
            }
            let unit_value = draft.unit_value.or(event.budget_per_gift).unwrap_or(0);
            records.push(DistributionRecord {
                event: event.id,
                household: household.id,
                citizen: draft.citizen,
                quantity: draft.quantity,
                unit_value,
                total_value: RewardDistribution::derived_total(draft.quantity, unit_value),
                registered_at,
                note: draft.note,
            });
            citizens.push(row_citizen);
        }

        let rows = self.rewards.insert_distributions(records)?;
        for (row, citizen) in rows.iter().zip(&citizens) {
            self.record(
                AuditEntry::new(AuditAction::Register, "distribution", row.id.0.clone())
                    .detail(format!("event {}, {} x {}", row.event, row.quantity, row.unit_value)),
            );
            if let Some(citizen) = citizen {
                self.notify_citizen(
                    citizen,
                    NotificationKind::Registration,
                    "Reward registered",
                    "A reward registration was recorded for you.".to_string(),
                    &row.id,
                    NotificationPriority::Normal,
                );
            }
        }
        Ok(rows.len())
    }

    /// Marks the listed rows distributed. Idempotent: rows that are not
    /// currently Registered, and unknown ids, are skipped. Returns how many
    /// rows actually transitioned.
    pub fn distribute(
        &self,
        ids: &[DistributionId],
        actor: Option<&UserId>,
        note: Option<&str>,
    ) -> Result<usize, RewardsError> {
        let now = Utc::now().naive_utc();
        let mut transitioned = 0;
        for id in ids {
            let updated = self.rewards.mark_distributed(
                id,
                now,
                actor.cloned(),
                note.map(str::to_string),
            )?;
            let row = match updated {
                Some(row) => row,
                None => continue,
            };
            transitioned += 1;
            let mut entry = AuditEntry::new(AuditAction::Distribute, "distribution", row.id.0.clone())
                .detail(format!("event {}", row.event));
            if let Some(actor) = actor {
                entry = entry.by(actor);
            }
            self.record(entry);
            if let Some(citizen) = self.lookup_citizen(row.citizen.as_ref()) {
                self.notify_citizen(
                    &citizen,
                    NotificationKind::Distribution,
                    "Reward distributed",
                    "Your reward has been handed over.".to_string(),
                    &row.id,
                    NotificationPriority::Normal,
                );
            }
        }
        Ok(transitioned)
    }

    /// Administrative escape hatch: Registered -> Cancelled. Frees the
    /// citizen's idempotency key and the capacity slot.
    pub fn cancel(
        &self,
        id: &DistributionId,
        actor: Option<&UserId>,
        reason: Option<String>,
    ) -> Result<RewardDistribution, RewardsError> {
        let row = self
            .rewards
            .distribution(id)?
            .ok_or_else(|| RewardsError::DistributionNotFound(id.clone()))?;
        if row.status != DistributionStatus::Registered {
            return Err(RewardsError::NotCancellable(id.clone()));
        }
        let updated = self
            .rewards
            .mark_cancelled(id, reason.clone())?
            .ok_or_else(|| RewardsError::NotCancellable(id.clone()))?;
        let mut entry = AuditEntry::new(AuditAction::Cancel, "distribution", id.0.clone())
            .detail(reason.unwrap_or_else(|| "cancelled".to_string()));
        if let Some(actor) = actor {
            entry = entry.by(actor);
        }
        self.record(entry);
        if let Some(citizen) = self.lookup_citizen(updated.citizen.as_ref()) {
            self.notify_citizen(
                &citizen,
                NotificationKind::Distribution,
                "Reward registration cancelled",
                "Your reward registration was cancelled.".to_string(),
                id,
                NotificationPriority::Normal,
            );
        }
        Ok(updated)
    }

    pub fn summarize_event(&self, event: &EventId) -> Result<EventLedgerSummary, RewardsError> {
        let event = self.require_event(event)?;
        let rows = self.rewards.distributions_for_event(&event.id)?;
        let mut summary = EventLedgerSummary {
            event: event.id,
            distribution_count: rows.len(),
            household_count: 0,
            total_quantity: 0,
            total_value: 0,
            registered: 0,
            distributed: 0,
            cancelled: 0,
        };
        let mut households = HashSet::new();
        for row in &rows {
            match row.status {
                DistributionStatus::Registered => summary.registered += 1,
                DistributionStatus::Distributed => summary.distributed += 1,
                DistributionStatus::Cancelled => {
                    summary.cancelled += 1;
                    continue;
                }
            }
            households.insert(row.household.clone());
            summary.total_quantity += u64::from(row.quantity);
            summary.total_value += row.total_value;
        }
        summary.household_count = households.len();
        Ok(summary)
    }

    /// Non-cancelled totals grouped by household, ordered by household id.
    pub fn household_breakdown(
        &self,
        event: &EventId,
    ) -> Result<Vec<HouseholdLedgerEntry>, RewardsError> {
        let event = self.require_event(event)?;
        let rows = self.rewards.distributions_for_event(&event.id)?;
        let mut by_household: BTreeMap<HouseholdId, HouseholdLedgerEntry> = BTreeMap::new();
        for row in rows.into_iter().filter(|row| row.status.is_active()) {
            let entry = by_household
                .entry(row.household.clone())
                .or_insert_with(|| HouseholdLedgerEntry {
                    household: row.household.clone(),
                    distribution_count: 0,
                    total_quantity: 0,
                    total_value: 0,
                });
            entry.distribution_count += 1;
            entry.total_quantity += u64::from(row.quantity);
            entry.total_value += row.total_value;
        }
        Ok(by_household.into_values().collect())
    }

    fn require_event(&self, id: &EventId) -> Result<RewardEvent, RewardsError> {
        self.rewards
            .event(id)?
            .ok_or_else(|| RewardsError::EventNotFound(id.clone()))
    }

    fn require_household(&self, id: &HouseholdId) -> Result<Household, RewardsError> {
        self.registry
            .household(id)?
            .ok_or_else(|| RewardsError::HouseholdNotFound(id.clone()))
    }

    fn require_citizen(&self, id: &CitizenId) -> Result<Citizen, RewardsError> {
        self.registry
            .citizen(id)?
            .ok_or_else(|| RewardsError::CitizenNotFound(id.clone()))
    }

    /// Best-effort read used only to address notifications.
    fn lookup_citizen(&self, id: Option<&CitizenId>) -> Option<Citizen> {
        let id = id?;
        match self.registry.citizen(id) {
            Ok(citizen) => citizen,
            Err(err) => {
                warn!(citizen = %id, error = %err, "recipient lookup failed");
                None
            }
        }
    }

    fn notify_citizen(
        &self,
        citizen: &Citizen,
        kind: NotificationKind,
        title: &str,
        message: String,
        row: &DistributionId,
        priority: NotificationPriority,
    ) {
        let account = match &citizen.user_account {
            Some(account) => account.clone(),
            None => return,
        };
        self.publish(Notification {
            recipients: vec![account],
            title: title.to_string(),
            message,
            kind,
            entity_kind: "distribution",
            entity_id: row.0.clone(),
            priority,
        });
    }

    fn record(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.record(entry) {
            warn!(error = %err, "audit write failed");
        }
    }

    fn publish(&self, notification: Notification) {
        if let Err(err) = self.fanout.notify(notification) {
            warn!(error = %err, "notification fan-out failed");
        }
    }
}
