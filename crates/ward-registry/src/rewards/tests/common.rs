use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::audit::{AuditEntry, AuditError, AuditWriter};
use crate::notify::{Notification, NotificationFanout, NotifyError};
use crate::registry::domain::{
    Citizen, CitizenId, Gender, Household, HouseholdId, HouseholdStatus, LifeStatus, NewCitizen,
    ResidencyStatus, UserId, DEFAULT_RELATIONSHIP, HEAD_RELATIONSHIP,
};
use crate::registry::memory::InMemoryRegistry;
use crate::registry::repository::{MembershipAssignment, NewHousehold, RegistryRepository};
use crate::rewards::domain::{EventId, EventStatus, NewRewardEvent, RuleKind};
use crate::rewards::eligibility::EligibilityResolver;
use crate::rewards::generator::RewardGenerator;
use crate::rewards::ledger::{DistributionLedger, RegistrationRequest};
use crate::rewards::memory::InMemoryRewardStore;

pub(super) type TestLedger =
    DistributionLedger<InMemoryRegistry, InMemoryRewardStore, RecordingAudit, RecordingFanout>;
pub(super) type TestGenerator =
    RewardGenerator<InMemoryRegistry, InMemoryRewardStore, RecordingAudit>;
pub(super) type TestResolver = EligibilityResolver<InMemoryRegistry, InMemoryRewardStore>;

/// Everything a ledger/generator/resolver test needs, built over one shared
/// registry and one shared reward store.
pub(super) struct Bench {
    pub(super) ledger: TestLedger,
    pub(super) generator: TestGenerator,
    pub(super) resolver: TestResolver,
    pub(super) registry: InMemoryRegistry,
    pub(super) rewards: InMemoryRewardStore,
    pub(super) audit: Arc<RecordingAudit>,
    pub(super) fanout: Arc<RecordingFanout>,
}

pub(super) fn bench() -> Bench {
    let registry = InMemoryRegistry::default();
    let rewards = InMemoryRewardStore::default();
    let audit = Arc::new(RecordingAudit::default());
    let fanout = Arc::new(RecordingFanout::default());
    let ledger = DistributionLedger::new(
        Arc::new(registry.clone()),
        Arc::new(rewards.clone()),
        audit.clone(),
        fanout.clone(),
    );
    let generator = RewardGenerator::new(
        Arc::new(registry.clone()),
        Arc::new(rewards.clone()),
        audit.clone(),
    );
    let resolver = EligibilityResolver::new(Arc::new(registry.clone()), Arc::new(rewards.clone()));
    Bench {
        ledger,
        generator,
        resolver,
        registry,
        rewards,
        audit,
        fanout,
    }
}

pub(super) fn citizen(name: &str, birth: (i32, u32, u32)) -> NewCitizen {
    NewCitizen {
        national_id: None,
        full_name: name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(birth.0, birth.1, birth.2).expect("valid date"),
        gender: Gender::Male,
        residency: ResidencyStatus::Permanent,
        life_status: LifeStatus::Alive,
        phone: None,
        user_account: None,
    }
}

pub(super) fn female(mut citizen: NewCitizen) -> NewCitizen {
    citizen.gender = Gender::Female;
    citizen
}

pub(super) fn with_account(mut citizen: NewCitizen, account: &str) -> NewCitizen {
    citizen.user_account = Some(UserId(account.to_string()));
    citizen
}

/// Inserts the citizens and wires them into one household; the first one
/// becomes the head. Uses the repository directly so seeding stays
/// independent of the membership service.
pub(super) fn place_household(
    registry: &InMemoryRegistry,
    code: &str,
    members: Vec<NewCitizen>,
) -> (Household, Vec<Citizen>) {
    assert!(!members.is_empty(), "a household needs at least a head");
    let mut inserted = Vec::new();
    for member in members {
        inserted.push(registry.insert_citizen(member).expect("insert citizen"));
    }
    let head_id = inserted[0].id.clone();
    let household = registry
        .insert_household(NewHousehold {
            code: code.to_string(),
            address: "3 Banyan Lane".to_string(),
            head: head_id.clone(),
            members: inserted.iter().map(|citizen| citizen.id.clone()).collect(),
            phone: None,
            status: HouseholdStatus::Active,
        })
        .expect("insert household");
    for record in &inserted {
        let is_head = record.id == head_id;
        registry
            .assign_membership(
                &record.id,
                Some(MembershipAssignment {
                    household: household.id.clone(),
                    is_head,
                    relationship_to_head: if is_head {
                        HEAD_RELATIONSHIP
                    } else {
                        DEFAULT_RELATIONSHIP
                    }
                    .to_string(),
                }),
            )
            .expect("assign membership");
    }
    let refreshed = inserted
        .iter()
        .map(|record| {
            registry
                .citizen(&record.id)
                .expect("fetch citizen")
                .expect("citizen present")
        })
        .collect();
    (household, refreshed)
}

/// Open event dated 2024-09-17 with a 50k default gift and no capacity cap.
pub(super) fn open_event(name: &str, rule: Option<RuleKind>) -> NewRewardEvent {
    NewRewardEvent {
        name: name.to_string(),
        rule,
        event_date: NaiveDate::from_ymd_opt(2024, 9, 17),
        registration_start: None,
        registration_end: None,
        budget_per_gift: Some(50_000),
        max_slots: 0,
        status: EventStatus::Open,
    }
}

/// Fixed registration day inside every test window.
pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 1).expect("valid date")
}

pub(super) fn registration(
    event: &EventId,
    household: &HouseholdId,
    citizen: &CitizenId,
    quantity: u32,
) -> RegistrationRequest {
    RegistrationRequest {
        event: event.clone(),
        household: household.clone(),
        citizen: citizen.clone(),
        quantity,
        unit_value: None,
        note: None,
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

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
