//! In-memory reward store. Owns the (event, citizen) uniqueness constraint.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;

use crate::registry::domain::{CitizenId, UserId};
use crate::store::RepositoryError;

use super::domain::{
    AchievementId, DistributionId, DistributionStatus, EventId, EventStatus, NewRewardEvent,
    NewStudentAchievement, RewardDistribution, RewardEvent, StudentAchievement,
};
use super::repository::{DistributionRecord, RewardRepository};

#[derive(Default)]
struct RewardState {
    events: HashMap<EventId, RewardEvent>,
    distributions: HashMap<DistributionId, RewardDistribution>,
    /// Keys of the non-cancelled citizen-bearing rows. Kept under the same
    /// lock as the row map so two concurrent registrations cannot both pass
    /// the uniqueness check.
    active_keys: HashSet<(EventId, CitizenId)>,
    achievements: HashMap<AchievementId, StudentAchievement>,
}

#[derive(Default, Clone)]
pub struct InMemoryRewardStore {
    state: Arc<Mutex<RewardState>>,
    event_seq: Arc<AtomicU64>,
    distribution_seq: Arc<AtomicU64>,
    achievement_seq: Arc<AtomicU64>,
}

impl InMemoryRewardStore {
    fn next_event_id(&self) -> EventId {
        let seq = self.event_seq.fetch_add(1, Ordering::SeqCst) + 1;
        EventId(format!("evt-{seq:06}"))
    }

    fn next_distribution_id(&self) -> DistributionId {
        let seq = self.distribution_seq.fetch_add(1, Ordering::SeqCst) + 1;
        DistributionId(format!("dst-{seq:06}"))
    }

    fn next_achievement_id(&self) -> AchievementId {
        let seq = self.achievement_seq.fetch_add(1, Ordering::SeqCst) + 1;
        AchievementId(format!("ach-{seq:06}"))
    }
}

fn build_row(id: DistributionId, record: DistributionRecord) -> RewardDistribution {
    RewardDistribution {
        id,
        event: record.event,
        household: record.household,
        citizen: record.citizen,
        quantity: record.quantity,
        unit_value: record.unit_value,
        total_value: record.total_value,
        status: DistributionStatus::Registered,
        registered_at: record.registered_at,
        distributed_at: None,
        distributed_by: None,
        note: record.note,
    }
}

fn key_of(record: &DistributionRecord) -> Option<(EventId, CitizenId)> {
    record
        .citizen
        .as_ref()
        .map(|citizen| (record.event.clone(), citizen.clone()))
}

impl RewardRepository for InMemoryRewardStore {
    fn insert_event(&self, event: NewRewardEvent) -> Result<RewardEvent, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let id = self.next_event_id();
        let record = RewardEvent {
            id: id.clone(),
            name: event.name,
            rule: event.rule,
            event_date: event.event_date,
            registration_start: event.registration_start,
            registration_end: event.registration_end,
            budget_per_gift: event.budget_per_gift,
            max_slots: event.max_slots,
            status: event.status,
        };
        state.events.insert(id, record.clone());
        Ok(record)
    }

    fn event(&self, id: &EventId) -> Result<Option<RewardEvent>, RepositoryError> {
        let state = self.state.lock().expect("reward mutex poisoned");
        Ok(state.events.get(id).cloned())
    }

    fn update_event_status(
        &self,
        id: &EventId,
        status: EventStatus,
    ) -> Result<RewardEvent, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let record = state.events.get_mut(id).ok_or(RepositoryError::NotFound)?;
        record.status = status;
        Ok(record.clone())
    }

    fn insert_distribution(
        &self,
        record: DistributionRecord,
    ) -> Result<RewardDistribution, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let key = key_of(&record);
        if let Some(key) = &key {
            if state.active_keys.contains(key) {
                return Err(RepositoryError::Conflict);
            }
        }
        let id = self.next_distribution_id();
        let row = build_row(id.clone(), record);
        if let Some(key) = key {
            state.active_keys.insert(key);
        }
        state.distributions.insert(id, row.clone());
        Ok(row)
    }

    fn insert_distributions(
        &self,
        records: Vec<DistributionRecord>,
    ) -> Result<Vec<RewardDistribution>, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let mut batch_keys = HashSet::new();
        for record in &records {
            if let Some(key) = key_of(record) {
                if state.active_keys.contains(&key) || !batch_keys.insert(key) {
                    return Err(RepositoryError::Conflict);
                }
            }
        }
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let key = key_of(&record);
            let id = self.next_distribution_id();
            let row = build_row(id.clone(), record);
            if let Some(key) = key {
                state.active_keys.insert(key);
            }
            state.distributions.insert(id, row.clone());
            rows.push(row);
        }
        Ok(rows)
    }

    fn distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<RewardDistribution>, RepositoryError> {
        let state = self.state.lock().expect("reward mutex poisoned");
        Ok(state.distributions.get(id).cloned())
    }

    fn distributions_for_event(
        &self,
        event: &EventId,
    ) -> Result<Vec<RewardDistribution>, RepositoryError> {
        let state = self.state.lock().expect("reward mutex poisoned");
        let mut rows: Vec<RewardDistribution> = state
            .distributions
            .values()
            .filter(|row| row.event == *event)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    fn active_count(&self, event: &EventId) -> Result<usize, RepositoryError> {
        let state = self.state.lock().expect("reward mutex poisoned");
        Ok(state
            .distributions
            .values()
            .filter(|row| row.event == *event && row.status.is_active())
            .count())
    }

    fn active_registration(
        &self,
        event: &EventId,
        citizen: &CitizenId,
    ) -> Result<Option<RewardDistribution>, RepositoryError> {
        let state = self.state.lock().expect("reward mutex poisoned");
        Ok(state
            .distributions
            .values()
            .find(|row| {
                row.event == *event
                    && row.status.is_active()
                    && row.citizen.as_ref() == Some(citizen)
            })
            .cloned())
    }

    fn mark_distributed(
        &self,
        id: &DistributionId,
        at: NaiveDateTime,
        by: Option<UserId>,
        note: Option<String>,
    ) -> Result<Option<RewardDistribution>, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let row = match state.distributions.get_mut(id) {
            Some(row) => row,
            None => return Ok(None),
        };
        if row.status != DistributionStatus::Registered {
            return Ok(None);
        }
        row.status = DistributionStatus::Distributed;
        row.distributed_at = Some(at);
        row.distributed_by = by;
        if note.is_some() {
            row.note = note;
        }
        Ok(Some(row.clone()))
    }

    fn mark_cancelled(
        &self,
        id: &DistributionId,
        note: Option<String>,
    ) -> Result<Option<RewardDistribution>, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let row = match state.distributions.get_mut(id) {
            Some(row) => row,
            None => return Ok(None),
        };
        if row.status != DistributionStatus::Registered {
            return Ok(None);
        }
        row.status = DistributionStatus::Cancelled;
        if note.is_some() {
            row.note = note;
        }
        let key = row
            .citizen
            .as_ref()
            .map(|citizen| (row.event.clone(), citizen.clone()));
        let updated = row.clone();
        if let Some(key) = key {
            state.active_keys.remove(&key);
        }
        Ok(Some(updated))
    }

    fn remove_active_for_citizens(
        &self,
        event: &EventId,
        citizens: &[CitizenId],
    ) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let doomed: Vec<DistributionId> = state
            .distributions
            .values()
            .filter(|row| {
                row.event == *event
                    && row.status.is_active()
                    && row
                        .citizen
                        .as_ref()
                        .is_some_and(|citizen| citizens.contains(citizen))
            })
            .map(|row| row.id.clone())
            .collect();
        for id in &doomed {
            if let Some(row) = state.distributions.remove(id) {
                if let Some(citizen) = &row.citizen {
                    state.active_keys.remove(&(row.event.clone(), citizen.clone()));
                }
            }
        }
        Ok(doomed.len())
    }

    fn insert_achievement(
        &self,
        achievement: NewStudentAchievement,
    ) -> Result<StudentAchievement, RepositoryError> {
        let mut state = self.state.lock().expect("reward mutex poisoned");
        let id = self.next_achievement_id();
        let record = StudentAchievement {
            id: id.clone(),
            citizen: achievement.citizen,
            school_year: achievement.school_year,
            school: achievement.school,
            class_name: achievement.class_name,
            tier: achievement.tier,
            notebooks_rewarded: achievement.notebooks_rewarded,
        };
        state.achievements.insert(id, record.clone());
        Ok(record)
    }

    fn achievements_for_year(
        &self,
        school_year: &str,
    ) -> Result<Vec<StudentAchievement>, RepositoryError> {
        let state = self.state.lock().expect("reward mutex poisoned");
        let mut rows: Vec<StudentAchievement> = state
            .achievements
            .values()
            .filter(|row| row.school_year == school_year)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    fn achievements_for_citizen(
        &self,
        citizen: &CitizenId,
    ) -> Result<Vec<StudentAchievement>, RepositoryError> {
        let state = self.state.lock().expect("reward mutex poisoned");
        let mut rows: Vec<StudentAchievement> = state
            .achievements
            .values()
            .filter(|row| row.citizen == *citizen)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }
}
