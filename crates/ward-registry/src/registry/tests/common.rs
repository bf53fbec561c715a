use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::audit::{AuditEntry, AuditError, AuditWriter};
use crate::notify::{Notification, NotificationFanout, NotifyError};
use crate::registry::domain::{
    Citizen, CitizenId, Gender, Household, HouseholdId, LifeStatus, NewCitizen, ResidencyStatus,
    UserId,
};
use crate::registry::memory::InMemoryRegistry;
use crate::registry::repository::{
    HouseholdUpdate, MembershipAssignment, NewHousehold, RegistryRepository,
};
use crate::registry::router::registry_router;
use crate::registry::service::{CreateHouseholdRequest, MembershipService, MoveRequest};
use crate::store::RepositoryError;

pub(super) fn new_citizen(name: &str) -> NewCitizen {
    NewCitizen {
        national_id: None,
        full_name: name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 20).expect("valid date"),
        gender: Gender::Male,
        residency: ResidencyStatus::Permanent,
        life_status: LifeStatus::Alive,
        phone: None,
        user_account: None,
    }
}

pub(super) fn citizen_with_account(name: &str, account: &str) -> NewCitizen {
    let mut citizen = new_citizen(name);
    citizen.user_account = Some(UserId(account.to_string()));
    citizen
}

pub(super) type TestService = MembershipService<InMemoryRegistry, RecordingAudit, RecordingFanout>;

pub(super) fn build_service() -> (
    TestService,
    InMemoryRegistry,
    Arc<RecordingAudit>,
    Arc<RecordingFanout>,
) {
    let store = InMemoryRegistry::default();
    let audit = Arc::new(RecordingAudit::default());
    let fanout = Arc::new(RecordingFanout::default());
    let service = MembershipService::new(Arc::new(store.clone()), audit.clone(), fanout.clone());
    (service, store, audit, fanout)
}

/// Registers a head plus members and wires them into one household.
pub(super) fn seeded_household(
    service: &TestService,
    code: &str,
    head_name: &str,
    member_names: &[&str],
) -> (Household, Vec<Citizen>) {
    let head = service
        .register_citizen(new_citizen(head_name))
        .expect("register head");
    let household = service
        .create_household(CreateHouseholdRequest {
            code: code.to_string(),
            address: "12 Ward Road".to_string(),
            head: head.id.clone(),
            phone: None,
        })
        .expect("create household");

    let mut citizens = vec![head];
    for name in member_names {
        let member = service
            .register_citizen(new_citizen(name))
            .expect("register member");
        let moved = service
            .move_citizen(
                &member.id,
                MoveRequest {
                    household: household.id.clone(),
                    relationship: None,
                },
            )
            .expect("move member in");
        citizens.push(moved);
    }

    let household = service
        .household_view(&household.id)
        .map(|view| Household {
            id: view.id,
            code: view.code,
            address: view.address,
            head: view.head,
            members: view.members.iter().map(|member| member.id.clone()).collect(),
            phone: view.phone,
            status: view.status,
        })
        .expect("reload household");
    (household, citizens)
}

/// Checks the bidirectional membership invariant over the whole store.
pub(super) fn assert_bidirectional(store: &InMemoryRegistry) {
    let households = store.households().expect("list households");
    let citizens = store.citizens().expect("list citizens");

    for household in &households {
        let member_set: BTreeSet<CitizenId> = household.members.iter().cloned().collect();
        assert!(
            member_set.contains(&household.head),
            "head {} missing from member array of {}",
            household.head,
            household.id
        );
        let pointing: BTreeSet<CitizenId> = citizens
            .iter()
            .filter(|citizen| citizen.household.as_ref() == Some(&household.id))
            .map(|citizen| citizen.id.clone())
            .collect();
        assert_eq!(
            member_set, pointing,
            "household {} member array diverges from citizen records",
            household.id
        );
    }

    for citizen in &citizens {
        match &citizen.household {
            Some(id) => {
                let household = households
                    .iter()
                    .find(|household| &household.id == id)
                    .unwrap_or_else(|| {
                        panic!("citizen {} points at missing household {}", citizen.id, id)
                    });
                assert_eq!(
                    citizen.is_head,
                    household.head == citizen.id,
                    "is_head flag wrong for {}",
                    citizen.id
                );
            }
            None => {
                assert!(!citizen.is_head, "{} is head of nothing", citizen.id);
                assert!(citizen.relationship_to_head.is_none());
            }
        }
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditWriter for RecordingAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingFanout {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingFanout {
    pub(super) fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .expect("fanout mutex poisoned")
            .clone()
    }
}

impl NotificationFanout for RecordingFanout {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.notifications
            .lock()
            .expect("fanout mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Wraps the in-memory store and fails selected member-array writes, to
/// drive the integrity-fault paths.
pub(super) struct SabotagedRegistry {
    pub(super) inner: InMemoryRegistry,
    pub(super) fail_add_member: AtomicBool,
    pub(super) fail_remove_member: AtomicBool,
}

impl SabotagedRegistry {
    pub(super) fn new(inner: InMemoryRegistry) -> Self {
        Self {
            inner,
            fail_add_member: AtomicBool::new(false),
            fail_remove_member: AtomicBool::new(false),
        }
    }
}

impl RegistryRepository for SabotagedRegistry {
    fn insert_citizen(&self, citizen: NewCitizen) -> Result<Citizen, RepositoryError> {
        self.inner.insert_citizen(citizen)
    }

    fn citizen(&self, id: &CitizenId) -> Result<Option<Citizen>, RepositoryError> {
        self.inner.citizen(id)
    }

    fn citizen_by_code(&self, code: &str) -> Result<Option<Citizen>, RepositoryError> {
        self.inner.citizen_by_code(code)
    }

    fn citizens(&self) -> Result<Vec<Citizen>, RepositoryError> {
        self.inner.citizens()
    }

    fn citizens_in_household(
        &self,
        household: &HouseholdId,
    ) -> Result<Vec<Citizen>, RepositoryError> {
        self.inner.citizens_in_household(household)
    }

    fn assign_membership(
        &self,
        citizen: &CitizenId,
        assignment: Option<MembershipAssignment>,
    ) -> Result<(), RepositoryError> {
        self.inner.assign_membership(citizen, assignment)
    }

    fn insert_household(&self, household: NewHousehold) -> Result<Household, RepositoryError> {
        self.inner.insert_household(household)
    }

    fn household(&self, id: &HouseholdId) -> Result<Option<Household>, RepositoryError> {
        self.inner.household(id)
    }

    fn household_by_code(&self, code: &str) -> Result<Option<Household>, RepositoryError> {
        self.inner.household_by_code(code)
    }

    fn households(&self) -> Result<Vec<Household>, RepositoryError> {
        self.inner.households()
    }

    fn add_member(
        &self,
        household: &HouseholdId,
        citizen: &CitizenId,
    ) -> Result<(), RepositoryError> {
        if self.fail_add_member.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "injected add_member failure".to_string(),
            ));
        }
        self.inner.add_member(household, citizen)
    }

    fn remove_member(
        &self,
        household: &HouseholdId,
        citizen: &CitizenId,
    ) -> Result<(), RepositoryError> {
        if self.fail_remove_member.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "injected remove_member failure".to_string(),
            ));
        }
        self.inner.remove_member(household, citizen)
    }

    fn update_household(
        &self,
        id: &HouseholdId,
        update: HouseholdUpdate,
    ) -> Result<(), RepositoryError> {
        self.inner.update_household(id, update)
    }

    fn delete_household(&self, id: &HouseholdId) -> Result<(), RepositoryError> {
        self.inner.delete_household(id)
    }
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    registry_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
