use std::sync::Arc;

use chrono::NaiveDate;
use ward_registry::audit::TracingAuditWriter;
use ward_registry::notify::TracingFanout;
use ward_registry::registry::domain::HEAD_RELATIONSHIP;
use ward_registry::registry::{
    Citizen, CreateHouseholdRequest, Gender, HouseholdId, InMemoryRegistry, LifeStatus,
    MembershipError, MembershipService, MoveRequest, NewCitizen, RegistryRepository,
    ResidencyStatus, SplitDefinition, SplitRequest, SplitViolation,
};

type Service = MembershipService<InMemoryRegistry, TracingAuditWriter, TracingFanout>;

fn service() -> (Service, InMemoryRegistry) {
    let repository = InMemoryRegistry::default();
    let service = MembershipService::new(
        Arc::new(repository.clone()),
        Arc::new(TracingAuditWriter),
        Arc::new(TracingFanout),
    );
    (service, repository)
}

fn new_citizen(name: &str) -> NewCitizen {
    NewCitizen {
        national_id: None,
        full_name: name.to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1985, 4, 12).expect("valid date of birth"),
        gender: Gender::Male,
        residency: ResidencyStatus::Permanent,
        life_status: LifeStatus::Alive,
        phone: None,
        user_account: None,
    }
}

fn household_of(service: &Service, head: &str, members: &[&str]) -> (HouseholdId, Vec<Citizen>) {
    let head = service
        .register_citizen(new_citizen(head))
        .expect("register head");
    let household = service
        .create_household(CreateHouseholdRequest {
            code: format!("HK-{}", head.code),
            address: "12 Ward Road".to_string(),
            head: head.id.clone(),
            phone: None,
        })
        .expect("create household");
    let mut records = vec![head];
    for name in members {
        let citizen = service
            .register_citizen(new_citizen(name))
            .expect("register member");
        let moved = service
            .move_citizen(
                &citizen.id,
                MoveRequest {
                    household: household.id.clone(),
                    relationship: Some("con".to_string()),
                },
            )
            .expect("move member in");
        records.push(moved);
    }
    (household.id, records)
}

/// Every member id in the household array must point back at the household,
/// and every citizen pointing at it must appear in the array.
fn assert_link_consistent(repository: &InMemoryRegistry, id: &HouseholdId) {
    let household = repository
        .household(id)
        .expect("fetch household")
        .expect("household present");
    for member in &household.members {
        let citizen = repository
            .citizen(member)
            .expect("fetch citizen")
            .expect("member record present");
        assert_eq!(
            citizen.household.as_ref(),
            Some(id),
            "member {} does not point back at {}",
            member,
            id
        );
    }
    for citizen in repository.citizens().expect("list citizens") {
        if citizen.household.as_ref() == Some(id) {
            assert!(
                household.members.contains(&citizen.id),
                "citizen {} points at {} but is missing from its member array",
                citizen.id,
                id
            );
        }
    }
}

#[test]
fn creating_a_household_links_both_sides() {
    let (service, repository) = service();
    let (household, records) = household_of(&service, "Tran Van Hung", &["Tran Van Binh"]);

    let head = &records[0];
    let stored_head = repository
        .citizen(&head.id)
        .expect("fetch head")
        .expect("head present");
    assert!(stored_head.is_head);
    assert_eq!(
        stored_head.relationship_to_head.as_deref(),
        Some(HEAD_RELATIONSHIP)
    );
    assert_eq!(records[1].relationship_to_head.as_deref(), Some("con"));
    assert_link_consistent(&repository, &household);
}

#[test]
fn moving_updates_both_member_arrays() {
    let (service, repository) = service();
    let (source, records) = household_of(&service, "Tran Van Hung", &["Tran Van Binh"]);
    let (target, _) = household_of(&service, "Le Thi Mai", &[]);

    let mover = &records[1];
    let moved = service
        .move_citizen(
            &mover.id,
            MoveRequest {
                household: target.clone(),
                relationship: None,
            },
        )
        .expect("move citizen");

    assert_eq!(moved.household.as_ref(), Some(&target));
    let old = repository
        .household(&source)
        .expect("fetch source")
        .expect("source present");
    assert!(!old.members.contains(&mover.id));
    assert_link_consistent(&repository, &source);
    assert_link_consistent(&repository, &target);
}

#[test]
fn heads_cannot_be_moved_out_directly() {
    let (service, _) = service();
    let (_, records) = household_of(&service, "Tran Van Hung", &[]);
    let (target, _) = household_of(&service, "Le Thi Mai", &[]);

    let error = service
        .move_citizen(
            &records[0].id,
            MoveRequest {
                household: target,
                relationship: None,
            },
        )
        .expect_err("heads only leave via split or delete");
    assert!(matches!(error, MembershipError::HeadImmovable(_)));
}

#[test]
fn deleting_a_household_releases_every_member() {
    let (service, repository) = service();
    let (household, records) =
        household_of(&service, "Tran Van Hung", &["Tran Van Binh", "Tran Thi Cuc"]);

    service.delete_household(&household).expect("delete household");

    assert!(repository
        .household(&household)
        .expect("fetch household")
        .is_none());
    for record in &records {
        let citizen = repository
            .citizen(&record.id)
            .expect("fetch citizen")
            .expect("citizen still registered");
        assert_eq!(citizen.household, None);
        assert!(!citizen.is_head);
        assert_eq!(citizen.relationship_to_head, None);
    }
}

#[test]
fn split_carves_out_a_branch_and_keeps_the_link_exact() {
    let (service, repository) = service();
    let (source, records) = household_of(
        &service,
        "Tran Van Hung",
        &["Tran Van Binh", "Tran Thi Cuc", "Tran Van Dai"],
    );
    let binh = &records[1];
    let cuc = &records[2];

    let outcome = service
        .split_household(
            &source,
            SplitRequest {
                splits: vec![SplitDefinition {
                    code: "HK-NEW".to_string(),
                    address: None,
                    head: binh.id.clone(),
                    members: vec![cuc.id.clone()],
                }],
                new_head_for_original: None,
            },
        )
        .expect("split household");

    assert_eq!(outcome.created.len(), 1);
    let carved = &outcome.created[0];
    assert_eq!(carved.code, "HK-NEW");
    // The split reuses the source address when none is given.
    assert_eq!(carved.address, "12 Ward Road");
    assert_eq!(carved.members.len(), 2);
    assert_eq!(outcome.household.members.len(), 2);

    let new_head = repository
        .citizen(&binh.id)
        .expect("fetch new head")
        .expect("new head present");
    assert!(new_head.is_head);
    assert_eq!(
        new_head.relationship_to_head.as_deref(),
        Some(HEAD_RELATIONSHIP)
    );
    assert_link_consistent(&repository, &source);
    assert_link_consistent(&repository, &carved.id);
}

#[test]
fn split_rejections_leave_the_registry_untouched() {
    let (service, repository) = service();
    let (source, records) = household_of(&service, "Tran Van Hung", &["Tran Van Binh"]);
    let binh = &records[1];

    // Assigning the same citizen twice is not a partition.
    let overlapping = service
        .split_household(
            &source,
            SplitRequest {
                splits: vec![
                    SplitDefinition {
                        code: "HK-A".to_string(),
                        address: None,
                        head: binh.id.clone(),
                        members: vec![],
                    },
                    SplitDefinition {
                        code: "HK-B".to_string(),
                        address: None,
                        head: binh.id.clone(),
                        members: vec![],
                    },
                ],
                new_head_for_original: None,
            },
        )
        .expect_err("overlapping assignment");
    assert!(matches!(
        overlapping,
        MembershipError::Split(SplitViolation::OverlappingAssignment(_))
    ));

    // Moving everyone out would leave the source empty.
    let emptied = service
        .split_household(
            &source,
            SplitRequest {
                splits: vec![SplitDefinition {
                    code: "HK-A".to_string(),
                    address: None,
                    head: binh.id.clone(),
                    members: records.iter().map(|record| record.id.clone()).collect(),
                }],
                new_head_for_original: None,
            },
        )
        .expect_err("empty remainder");
    assert!(matches!(
        emptied,
        MembershipError::Split(SplitViolation::EmptyRemainder)
    ));

    let untouched = repository
        .household(&source)
        .expect("fetch household")
        .expect("household present");
    assert_eq!(untouched.members.len(), 2);
    assert!(repository
        .household_by_code("HK-A")
        .expect("lookup by code")
        .is_none());
    assert_link_consistent(&repository, &source);
}
