//! In-memory registry store backing the service and its tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::store::RepositoryError;

use super::domain::{Citizen, CitizenId, Household, HouseholdId, NewCitizen};
use super::repository::{HouseholdUpdate, MembershipAssignment, NewHousehold, RegistryRepository};

#[derive(Default)]
struct RegistryState {
    citizens: HashMap<CitizenId, Citizen>,
    households: HashMap<HouseholdId, Household>,
}

/// Hash-map store with per-call locking. A single lock covers both record
/// types, so each repository call observes a coherent snapshot; nothing
/// spans two calls, matching the documented per-record atomicity.
#[derive(Default, Clone)]
pub struct InMemoryRegistry {
    state: Arc<Mutex<RegistryState>>,
    citizen_seq: Arc<AtomicU64>,
    household_seq: Arc<AtomicU64>,
}

impl InMemoryRegistry {
    fn next_citizen_id(&self) -> (CitizenId, String) {
        let seq = self.citizen_seq.fetch_add(1, Ordering::SeqCst) + 1;
        (CitizenId(format!("c-{seq:06}")), format!("NK{seq}"))
    }

    fn next_household_id(&self) -> HouseholdId {
        let seq = self.household_seq.fetch_add(1, Ordering::SeqCst) + 1;
        HouseholdId(format!("h-{seq:06}"))
    }
}

impl RegistryRepository for InMemoryRegistry {
    fn insert_citizen(&self, citizen: NewCitizen) -> Result<Citizen, RepositoryError> {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        if let Some(national_id) = &citizen.national_id {
            let taken = state
                .citizens
                .values()
                .any(|existing| existing.national_id.as_deref() == Some(national_id));
            if taken {
                return Err(RepositoryError::Conflict);
            }
        }
        let (id, code) = self.next_citizen_id();
        let record = Citizen {
            id: id.clone(),
            code,
            national_id: citizen.national_id,
            full_name: citizen.full_name,
            date_of_birth: citizen.date_of_birth,
            gender: citizen.gender,
            residency: citizen.residency,
            life_status: citizen.life_status,
            phone: citizen.phone,
            user_account: citizen.user_account,
            household: None,
            is_head: false,
            relationship_to_head: None,
        };
        state.citizens.insert(id, record.clone());
        Ok(record)
    }

    fn citizen(&self, id: &CitizenId) -> Result<Option<Citizen>, RepositoryError> {
        let state = self.state.lock().expect("registry mutex poisoned");
        Ok(state.citizens.get(id).cloned())
    }

    fn citizen_by_code(&self, code: &str) -> Result<Option<Citizen>, RepositoryError> {
        let state = self.state.lock().expect("registry mutex poisoned");
        Ok(state
            .citizens
            .values()
            .find(|citizen| citizen.code == code)
            .cloned())
    }

    fn citizens(&self) -> Result<Vec<Citizen>, RepositoryError> {
        let state = self.state.lock().expect("registry mutex poisoned");
        let mut citizens: Vec<Citizen> = state.citizens.values().cloned().collect();
        citizens.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(citizens)
    }

    fn citizens_in_household(
        &self,
        household: &HouseholdId,
    ) -> Result<Vec<Citizen>, RepositoryError> {
        let state = self.state.lock().expect("registry mutex poisoned");
        let mut citizens: Vec<Citizen> = state
            .citizens
            .values()
            .filter(|citizen| citizen.household.as_ref() == Some(household))
            .cloned()
            .collect();
        citizens.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(citizens)
    }

    fn assign_membership(
        &self,
        citizen: &CitizenId,
        assignment: Option<MembershipAssignment>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        let record = state
            .citizens
            .get_mut(citizen)
            .ok_or(RepositoryError::NotFound)?;
        match assignment {
            Some(assignment) => {
                record.household = Some(assignment.household);
                record.is_head = assignment.is_head;
                record.relationship_to_head = Some(assignment.relationship_to_head);
            }
            None => {
                record.household = None;
                record.is_head = false;
                record.relationship_to_head = None;
            }
        }
        Ok(())
    }

    fn insert_household(&self, household: NewHousehold) -> Result<Household, RepositoryError> {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        let taken = state
            .households
            .values()
            .any(|existing| existing.code == household.code);
        if taken {
            return Err(RepositoryError::Conflict);
        }
        let id = self.next_household_id();
        let record = Household {
            id: id.clone(),
            code: household.code,
            address: household.address,
            head: household.head,
            members: household.members,
            phone: household.phone,
            status: household.status,
        };
        state.households.insert(id, record.clone());
        Ok(record)
    }

    fn household(&self, id: &HouseholdId) -> Result<Option<Household>, RepositoryError> {
        let state = self.state.lock().expect("registry mutex poisoned");
        Ok(state.households.get(id).cloned())
    }

    fn household_by_code(&self, code: &str) -> Result<Option<Household>, RepositoryError> {
        let state = self.state.lock().expect("registry mutex poisoned");
        Ok(state
            .households
            .values()
            .find(|household| household.code == code)
            .cloned())
    }

    fn households(&self) -> Result<Vec<Household>, RepositoryError> {
        let state = self.state.lock().expect("registry mutex poisoned");
        let mut households: Vec<Household> = state.households.values().cloned().collect();
        households.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(households)
    }

    fn add_member(
        &self,
        household: &HouseholdId,
        citizen: &CitizenId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        let record = state
            .households
            .get_mut(household)
            .ok_or(RepositoryError::NotFound)?;
        if !record.members.contains(citizen) {
            record.members.push(citizen.clone());
        }
        Ok(())
    }

    fn remove_member(
        &self,
        household: &HouseholdId,
        citizen: &CitizenId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        let record = state
            .households
            .get_mut(household)
            .ok_or(RepositoryError::NotFound)?;
        record.members.retain(|member| member != citizen);
        Ok(())
    }

    fn update_household(
        &self,
        id: &HouseholdId,
        update: HouseholdUpdate,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        let record = state
            .households
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(head) = update.head {
            record.head = head;
        }
        if let Some(members) = update.members {
            record.members = members;
        }
        if let Some(phone) = update.phone {
            record.phone = phone;
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        Ok(())
    }

    fn delete_household(&self, id: &HouseholdId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("registry mutex poisoned");
        state
            .households
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}
