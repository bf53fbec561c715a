use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use ward_registry::audit::TracingAuditWriter;
use ward_registry::error::AppError;
use ward_registry::notify::TracingFanout;
use ward_registry::registry::{
    CreateHouseholdRequest, Gender, InMemoryRegistry, LifeStatus, MembershipService, MoveRequest,
    NewCitizen, ResidencyStatus, SplitDefinition, SplitRequest,
};
use ward_registry::rewards::{
    AchievementRosterImporter, DistributionLedger, EligibilityResolver, EventStatus,
    InMemoryRewardStore, NewRewardEvent, RegistrationRequest, RewardGenerator, RewardRepository,
    RewardRule, RewardsError, RuleKind,
};

use crate::infra::default_tier_rewards;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference date for ages and windows (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Achievement roster CSV to import instead of the built-in sample.
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Include the full eligible-citizen listing in the output.
    #[arg(long)]
    pub(crate) list_eligible: bool,
}

/// Seeds a small ward and walks it through one reward season on the
/// console: household bookkeeping, a book split, event setup, eligibility,
/// registration, the school roster, generated drafts, hand-over and the
/// closing figures.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        roster,
        list_eligible,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let year = today.year();
    let school_year = format!("{}-{}", year - 1, year);

    println!("Ward registry walkthrough (reference date {today})");

    let registry = Arc::new(InMemoryRegistry::default());
    let store = Arc::new(InMemoryRewardStore::default());
    let audit = Arc::new(TracingAuditWriter);
    let fanout = Arc::new(TracingFanout);
    let membership = MembershipService::new(registry.clone(), audit.clone(), fanout.clone());
    let ledger = DistributionLedger::new(registry.clone(), store.clone(), audit.clone(), fanout);
    let generator = RewardGenerator::new(registry.clone(), store.clone(), audit);
    let resolver = EligibilityResolver::new(registry.clone(), store.clone());
    let importer = AchievementRosterImporter::new(registry, store.clone());

    println!("\nHousehold membership");
    let hung = membership.register_citizen(resident(
        "Tran Van Hung",
        born(today, 52, 3, 12),
        Gender::Male,
    ))?;
    let mai = membership.register_citizen(resident(
        "Le Thi Mai",
        born(today, 49, 7, 2),
        Gender::Female,
    ))?;
    let duc = membership.register_citizen(resident(
        "Tran Minh Duc",
        born(today, 12, 9, 5),
        Gender::Male,
    ))?;
    let ha = membership.register_citizen(resident(
        "Tran Thu Ha",
        born(today, 9, 4, 20),
        Gender::Female,
    ))?;
    let cu = membership.register_citizen(resident(
        "Tran Van Cu",
        born(today, 74, 1, 15),
        Gender::Male,
    ))?;
    let tam = membership.register_citizen(resident(
        "Nguyen Van Tam",
        born(today, 41, 11, 8),
        Gender::Male,
    ))?;
    let bao = membership.register_citizen(resident(
        "Nguyen Gia Bao",
        born(today, 10, 6, 1),
        Gender::Male,
    ))?;

    let home_a = membership.create_household(CreateHouseholdRequest {
        code: format!("HK-{year}-01"),
        address: "12 Duong Cay Da".to_string(),
        head: hung.id.clone(),
        phone: Some("0903 555 120".to_string()),
    })?;
    for (member, relationship) in [(&mai, "vo"), (&duc, "con"), (&ha, "con"), (&cu, "bo")] {
        membership.move_citizen(
            &member.id,
            MoveRequest {
                household: home_a.id.clone(),
                relationship: Some(relationship.to_string()),
            },
        )?;
    }

    let home_b = membership.create_household(CreateHouseholdRequest {
        code: format!("HK-{year}-02"),
        address: "5 Hem Cho Chieu".to_string(),
        head: tam.id.clone(),
        phone: None,
    })?;
    membership.move_citizen(
        &bao.id,
        MoveRequest {
            household: home_b.id.clone(),
            relationship: Some("con".to_string()),
        },
    )?;

    for id in [&home_a.id, &home_b.id] {
        let view = membership.household_view(id)?;
        println!("- {} at {}: {} member(s)", view.code, view.address, view.members.len());
        for member in &view.members {
            let role = member.relationship_to_head.as_deref().unwrap_or("member");
            println!("  - {} {} ({})", member.code, member.full_name, role);
        }
    }

    let outcome = membership.split_household(
        &home_a.id,
        SplitRequest {
            splits: vec![SplitDefinition {
                code: format!("HK-{year}-03"),
                address: None,
                head: cu.id.clone(),
                members: vec![cu.id.clone()],
            }],
            new_head_for_original: None,
        },
    )?;
    let branch_codes: Vec<&str> = outcome
        .created
        .iter()
        .map(|household| household.code.as_str())
        .collect();
    let remainder = membership.household_view(&home_a.id)?;
    println!(
        "- split {}: {} member(s) stay, new book(s): {}",
        remainder.code,
        remainder.members.len(),
        branch_codes.join(", ")
    );

    println!("\nReward events");
    let festival = ledger.create_event(NewRewardEvent {
        name: format!("Tet Trung Thu {year}"),
        rule: None,
        event_date: NaiveDate::from_ymd_opt(year, 9, 17),
        registration_start: None,
        registration_end: None,
        budget_per_gift: Some(50_000),
        max_slots: 200,
        status: EventStatus::Planned,
    })?;
    let suggested = festival.rule.map(RuleKind::label).unwrap_or("none");
    println!("- {} created: {} (suggested rule: {})", festival.id, festival.name, suggested);
    let festival = ledger.transition_event(&festival.id, EventStatus::Open, None)?;
    println!("- {} is now {}", festival.name, festival.status.label());

    let school = ledger.create_event(NewRewardEvent {
        name: format!("Khuyen hoc {school_year}"),
        rule: Some(RuleKind::SchoolAchievement),
        event_date: None,
        registration_start: None,
        registration_end: None,
        budget_per_gift: None,
        max_slots: 0,
        status: EventStatus::Open,
    })?;
    let longevity = ledger.create_event(NewRewardEvent {
        name: format!("Mung tho {year}"),
        rule: Some(RuleKind::OpenSpecial),
        event_date: None,
        registration_start: None,
        registration_end: None,
        budget_per_gift: Some(100_000),
        max_slots: 0,
        status: EventStatus::Open,
    })?;
    println!("- {} and {} opened for drafting", school.name, longevity.name);

    let rule_label = festival.rule.map(RuleKind::label).unwrap_or("no rule");
    let eligible = resolver.eligible_citizens(&festival.id, today)?;
    println!("\nEligibility for {} ({rule_label})", festival.name);
    println!("- {} citizen(s) across the ward", eligible.len());
    if list_eligible {
        for citizen in &eligible {
            println!(
                "  - {} {} (born {})",
                citizen.code, citizen.full_name, citizen.date_of_birth
            );
        }
    }

    println!("\nFestival registrations");
    let mut registered = Vec::new();
    for (citizen, household) in [(&duc, &home_a), (&ha, &home_a), (&bao, &home_b)] {
        let row = ledger.register(
            RegistrationRequest {
                event: festival.id.clone(),
                household: household.id.clone(),
                citizen: citizen.id.clone(),
                quantity: 1,
                unit_value: None,
                note: None,
            },
            today,
        )?;
        println!(
            "- {} registered through {}: {} gift(s) worth {} dong",
            citizen.full_name, household.code, row.quantity, row.total_value
        );
        registered.push(row.id);
    }
    let retry = RegistrationRequest {
        event: festival.id.clone(),
        household: home_a.id.clone(),
        citizen: duc.id.clone(),
        quantity: 1,
        unit_value: None,
        note: None,
    };
    match ledger.register(retry, today) {
        Ok(_) => println!("- duplicate registration slipped through"),
        Err(err) => println!("- duplicate for {} rejected: {err}", duc.full_name),
    }

    println!("\nSchool achievement roster");
    let imported = match roster {
        Some(path) => importer.from_path(path)?,
        None => {
            let roster_csv = format!(
                "Citizen Code,School Year,School,Class,Tier,Notebooks\n\
                 {duc},{school_year},Truong TH Phuong 5,6A1,Xuat sac,12\n\
                 {bao},{school_year},Truong TH Phuong 5,4B,Gioi,\n\
                 NK999,{school_year},Truong TH Phuong 5,4B,Kha,\n",
                duc = duc.code,
                bao = bao.code,
            );
            importer.from_reader(Cursor::new(roster_csv.into_bytes()))?
        }
    };
    println!("- {} row(s) imported", imported.imported);
    if !imported.unknown_codes.is_empty() {
        println!("- unknown citizen codes: {}", imported.unknown_codes.join(", "));
    }
    if !imported.invalid_tiers.is_empty() {
        println!("- unrecognised tiers: {}", imported.invalid_tiers.join(", "));
    }

    let table = default_tier_rewards();
    let drafted = generator.from_achievements(&school.id, &school_year, &table, false)?;
    println!(
        "- {} school reward draft(s) ({} skipped, {} without household)",
        drafted.created, drafted.skipped, drafted.missing_household
    );
    let rerun = generator.from_achievements(&school.id, &school_year, &table, false)?;
    println!("- rerun drafts {} new row(s); earlier rows are kept", rerun.created);

    let elders = generator.from_age_range(
        &longevity.id,
        60,
        80,
        RewardRule {
            quantity: 1,
            unit_value: 200_000,
        },
        false,
        today,
    )?;
    println!("- {} elder(s) aged 60 to 80 drafted for {}", elders.created, longevity.name);

    println!("\nHand-over");
    let handed = ledger.distribute(&registered, None, Some("handed over at the ward culture house"))?;
    println!("- handed over {} of {} registration(s)", handed, registered.len());
    let repeat = ledger.distribute(&registered, None, None)?;
    println!("- repeat pass settles {} row(s)", repeat);

    let school_rows = store
        .distributions_for_event(&school.id)
        .map_err(RewardsError::from)?;
    match school_rows
        .iter()
        .find(|row| row.citizen.as_ref() == Some(&bao.id))
    {
        Some(row) => {
            ledger.cancel(&row.id, None, Some("family moved out of the ward".to_string()))?;
            println!("- cancelled {} for {} (family moved out of the ward)", row.id, bao.full_name);
        }
        None => println!("- no school reward row found for {}", bao.full_name),
    }

    println!("\nSeason summary");
    for event in [&festival, &school, &longevity] {
        let summary = ledger.summarize_event(&event.id)?;
        println!(
            "- {}: {} row(s) | {} registered / {} distributed / {} cancelled | {} gift(s) worth {} dong",
            event.name,
            summary.distribution_count,
            summary.registered,
            summary.distributed,
            summary.cancelled,
            summary.total_quantity,
            summary.total_value
        );
    }

    let breakdown = ledger.household_breakdown(&festival.id)?;
    println!("\nHousehold breakdown for {}", festival.name);
    for entry in &breakdown {
        println!(
            "- {}: {} row(s), {} dong",
            entry.household, entry.distribution_count, entry.total_value
        );
    }

    let takeup = resolver.summary(&festival.id, today)?;
    match serde_json::to_string_pretty(&takeup) {
        Ok(json) => println!("\nTake-up figures for {}:\n{json}", festival.name),
        Err(err) => println!("\nTake-up figures unavailable: {err}"),
    }

    Ok(())
}

fn resident(name: &str, date_of_birth: NaiveDate, gender: Gender) -> NewCitizen {
    NewCitizen {
        national_id: None,
        full_name: name.to_string(),
        date_of_birth,
        gender,
        residency: ResidencyStatus::Permanent,
        life_status: LifeStatus::Alive,
        phone: None,
        user_account: None,
    }
}

fn born(today: NaiveDate, years_ago: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(today.year() - years_ago, month, day).unwrap_or(today)
}
