use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::common::{
    assert_bidirectional, build_service, citizen_with_account, new_citizen, seeded_household,
    RecordingAudit, RecordingFanout, SabotagedRegistry,
};
use crate::audit::AuditAction;
use crate::error::FaultKind;
use crate::notify::NotificationKind;
use crate::registry::domain::{CitizenId, HouseholdId, HouseholdStatus};
use crate::registry::memory::InMemoryRegistry;
use crate::registry::repository::RegistryRepository;
use crate::registry::service::{
    CreateHouseholdRequest, MembershipError, MembershipService, MoveRequest,
};

#[test]
fn register_citizen_assigns_sequential_code() {
    let (service, _, _, _) = build_service();
    let first = service.register_citizen(new_citizen("Tran Van Hung")).expect("register");
    let second = service.register_citizen(new_citizen("Le Thi Hoa")).expect("register");
    assert_eq!(first.code, "NK1");
    assert_eq!(second.code, "NK2");
    assert!(first.household.is_none());
    assert!(!first.is_head);
}

#[test]
fn duplicate_national_id_is_a_conflict() {
    let (service, _, _, _) = build_service();
    let mut request = new_citizen("Tran Van Hung");
    request.national_id = Some("079068001234".to_string());
    service.register_citizen(request.clone()).expect("first registration");
    request.full_name = "Someone Else".to_string();
    let error = service.register_citizen(request).expect_err("duplicate id");
    assert!(matches!(error, MembershipError::NationalIdInUse));
    assert_eq!(error.kind(), FaultKind::Conflict);
}

#[test]
fn create_household_links_head_on_both_sides() {
    let (service, store, _, _) = build_service();
    let head = service.register_citizen(new_citizen("Tran Van Hung")).expect("register");
    let household = service
        .create_household(CreateHouseholdRequest {
            code: "HK-01".to_string(),
            address: "12 Ward Road".to_string(),
            head: head.id.clone(),
            phone: None,
        })
        .expect("create household");

    assert_eq!(household.head, head.id);
    assert_eq!(household.members, vec![head.id.clone()]);
    assert_eq!(household.status, HouseholdStatus::Active);

    let head = store.citizen(&head.id).expect("fetch").expect("exists");
    assert_eq!(head.household.as_ref(), Some(&household.id));
    assert!(head.is_head);
    assert_eq!(head.relationship_to_head.as_deref(), Some("head"));
    assert_bidirectional(&store);
}

#[test]
fn household_phone_defaults_from_head() {
    let (service, _, _, _) = build_service();
    let mut request = new_citizen("Tran Van Hung");
    request.phone = Some("0912 345 678".to_string());
    let head = service.register_citizen(request).expect("register");
    let household = service
        .create_household(CreateHouseholdRequest {
            code: "HK-01".to_string(),
            address: "12 Ward Road".to_string(),
            head: head.id.clone(),
            phone: None,
        })
        .expect("create household");
    assert_eq!(household.phone.as_deref(), Some("0912 345 678"));
}

#[test]
fn explicit_household_phone_wins() {
    let (service, _, _, _) = build_service();
    let mut request = new_citizen("Tran Van Hung");
    request.phone = Some("0912 345 678".to_string());
    let head = service.register_citizen(request).expect("register");
    let household = service
        .create_household(CreateHouseholdRequest {
            code: "HK-01".to_string(),
            address: "12 Ward Road".to_string(),
            head: head.id.clone(),
            phone: Some("0987 654 321".to_string()),
        })
        .expect("create household");
    assert_eq!(household.phone.as_deref(), Some("0987 654 321"));
}

#[test]
fn create_household_rejects_missing_head() {
    let (service, _, _, _) = build_service();
    let error = service
        .create_household(CreateHouseholdRequest {
            code: "HK-01".to_string(),
            address: "12 Ward Road".to_string(),
            head: CitizenId("c-999999".to_string()),
            phone: None,
        })
        .expect_err("head does not exist");
    assert_eq!(error.kind(), FaultKind::NotFound);
}

#[test]
fn create_household_rejects_duplicate_code() {
    let (service, _, _, _) = build_service();
    seeded_household(&service, "HK-01", "Tran Van Hung", &[]);
    let other = service.register_citizen(new_citizen("Le Thi Hoa")).expect("register");
    let error = service
        .create_household(CreateHouseholdRequest {
            code: "HK-01".to_string(),
            address: "9 Ward Road".to_string(),
            head: other.id,
            phone: None,
        })
        .expect_err("code taken");
    assert!(matches!(error, MembershipError::CodeInUse(_)));
    assert_eq!(error.kind(), FaultKind::Conflict);
}

#[test]
fn sitting_head_cannot_head_a_second_household() {
    let (service, _, _, _) = build_service();
    let (household, citizens) = seeded_household(&service, "HK-01", "Tran Van Hung", &[]);
    assert_eq!(household.head, citizens[0].id);
    let error = service
        .create_household(CreateHouseholdRequest {
            code: "HK-02".to_string(),
            address: "9 Ward Road".to_string(),
            head: citizens[0].id.clone(),
            phone: None,
        })
        .expect_err("already a head");
    assert!(matches!(error, MembershipError::AlreadyHead(_)));
    assert_eq!(error.kind(), FaultKind::Validation);
}

#[test]
fn move_citizen_updates_both_sides() {
    let (service, store, _, _) = build_service();
    let (first, citizens) = seeded_household(&service, "HK-01", "Tran Van Hung", &["Tran Van Binh"]);
    let (second, _) = seeded_household(&service, "HK-02", "Le Thi Hoa", &[]);
    let mover = &citizens[1];

    let moved = service
        .move_citizen(
            &mover.id,
            MoveRequest {
                household: second.id.clone(),
                relationship: Some("nephew".to_string()),
            },
        )
        .expect("move");

    assert_eq!(moved.household.as_ref(), Some(&second.id));
    assert_eq!(moved.relationship_to_head.as_deref(), Some("nephew"));
    assert!(!moved.is_head);

    let first = store.household(&first.id).expect("fetch").expect("exists");
    assert!(!first.members.contains(&mover.id));
    let second = store.household(&second.id).expect("fetch").expect("exists");
    assert!(second.members.contains(&mover.id));
    assert_bidirectional(&store);
}

#[test]
fn move_into_current_household_is_a_noop() {
    let (service, store, audit, _) = build_service();
    let (household, citizens) = seeded_household(&service, "HK-01", "Tran Van Hung", &["Tran Van Binh"]);
    let recorded_before = audit.entries().len();

    let unchanged = service
        .move_citizen(
            &citizens[1].id,
            MoveRequest {
                household: household.id.clone(),
                relationship: None,
            },
        )
        .expect("noop move");

    assert_eq!(unchanged.household.as_ref(), Some(&household.id));
    assert_eq!(audit.entries().len(), recorded_before, "no-op must not audit");
    assert_bidirectional(&store);
}

#[test]
fn head_cannot_move_out_directly() {
    let (service, _, _, _) = build_service();
    let (_, citizens) = seeded_household(&service, "HK-01", "Tran Van Hung", &[]);
    let (second, _) = seeded_household(&service, "HK-02", "Le Thi Hoa", &[]);

    let error = service
        .move_citizen(
            &citizens[0].id,
            MoveRequest {
                household: second.id,
                relationship: None,
            },
        )
        .expect_err("heads only leave via split or delete");
    assert!(matches!(error, MembershipError::HeadImmovable(_)));
    assert_eq!(error.kind(), FaultKind::Validation);
}

#[test]
fn move_rejects_missing_target() {
    let (service, _, _, _) = build_service();
    let (_, citizens) = seeded_household(&service, "HK-01", "Tran Van Hung", &["Tran Van Binh"]);
    let error = service
        .move_citizen(
            &citizens[1].id,
            MoveRequest {
                household: HouseholdId("h-999999".to_string()),
                relationship: None,
            },
        )
        .expect_err("target missing");
    assert_eq!(error.kind(), FaultKind::NotFound);
}

#[test]
fn delete_household_releases_every_member() {
    let (service, store, _, _) = build_service();
    let (household, citizens) =
        seeded_household(&service, "HK-01", "Tran Van Hung", &["Tran Van Binh", "Tran Thi Lan"]);

    service.delete_household(&household.id).expect("delete");

    assert!(store.household(&household.id).expect("fetch").is_none());
    for citizen in &citizens {
        let record = store.citizen(&citizen.id).expect("fetch").expect("exists");
        assert!(record.household.is_none());
        assert!(!record.is_head);
        assert!(record.relationship_to_head.is_none());
    }
    assert_bidirectional(&store);
}

#[test]
fn delete_notifies_linked_accounts() {
    let (service, _, _, fanout) = build_service();
    let head = service
        .register_citizen(citizen_with_account("Tran Van Hung", "user-hung"))
        .expect("register");
    let household = service
        .create_household(CreateHouseholdRequest {
            code: "HK-01".to_string(),
            address: "12 Ward Road".to_string(),
            head: head.id,
            phone: None,
        })
        .expect("create");

    service.delete_household(&household.id).expect("delete");

    let notifications = fanout.notifications();
    let removal = notifications
        .iter()
        .find(|n| n.title == "Household removed")
        .expect("removal notification");
    assert_eq!(removal.kind, NotificationKind::HouseholdLifecycle);
    assert_eq!(removal.recipients.len(), 1);
    assert_eq!(removal.recipients[0].0, "user-hung");
}

#[test]
fn mutations_are_audited() {
    let (service, _, audit, _) = build_service();
    let (household, citizens) = seeded_household(&service, "HK-01", "Tran Van Hung", &["Tran Van Binh"]);
    service.delete_household(&household.id).expect("delete");
    drop(citizens);

    let actions: Vec<AuditAction> = audit.entries().iter().map(|entry| entry.action).collect();
    // two registrations, one household creation, one move, one deletion
    assert_eq!(
        actions,
        vec![
            AuditAction::Create,
            AuditAction::Create,
            AuditAction::Create,
            AuditAction::Update,
            AuditAction::Delete,
        ]
    );
}

#[test]
fn failed_remove_side_surfaces_an_integrity_fault() {
    let store = InMemoryRegistry::default();
    let sabotaged = Arc::new(SabotagedRegistry::new(store.clone()));
    let service = MembershipService::new(
        sabotaged.clone(),
        Arc::new(RecordingAudit::default()),
        Arc::new(RecordingFanout::default()),
    );

    // seed through a healthy service sharing the same store
    let healthy = MembershipService::new(
        Arc::new(store.clone()),
        Arc::new(RecordingAudit::default()),
        Arc::new(RecordingFanout::default()),
    );
    let (_, citizens) = seeded_household(&healthy, "HK-01", "Tran Van Hung", &["Tran Van Binh"]);
    let (target, _) = seeded_household(&healthy, "HK-02", "Le Thi Hoa", &[]);

    sabotaged.fail_remove_member.store(true, Ordering::SeqCst);
    let error = service
        .move_citizen(
            &citizens[1].id,
            MoveRequest {
                household: target.id.clone(),
                relationship: None,
            },
        )
        .expect_err("remove side fails");

    assert!(matches!(error, MembershipError::Integrity(_)));
    assert_eq!(error.kind(), FaultKind::Integrity);
    // the add side already happened: the citizen record points at the target
    let record = store.citizen(&citizens[1].id).expect("fetch").expect("exists");
    assert_eq!(record.household.as_ref(), Some(&target.id));
}

#[test]
fn failed_add_side_is_an_integrity_fault_too() {
    let store = InMemoryRegistry::default();
    let sabotaged = Arc::new(SabotagedRegistry::new(store.clone()));
    let service = MembershipService::new(
        sabotaged.clone(),
        Arc::new(RecordingAudit::default()),
        Arc::new(RecordingFanout::default()),
    );
    let healthy = MembershipService::new(
        Arc::new(store.clone()),
        Arc::new(RecordingAudit::default()),
        Arc::new(RecordingFanout::default()),
    );
    let (_, citizens) = seeded_household(&healthy, "HK-01", "Tran Van Hung", &["Tran Van Binh"]);
    let (target, _) = seeded_household(&healthy, "HK-02", "Le Thi Hoa", &[]);

    sabotaged.fail_add_member.store(true, Ordering::SeqCst);
    let error = service
        .move_citizen(
            &citizens[1].id,
            MoveRequest {
                household: target.id,
                relationship: None,
            },
        )
        .expect_err("add side fails");
    // citizen record was already rewritten, so this is an integrity fault too
    assert_eq!(error.kind(), FaultKind::Integrity);
}
