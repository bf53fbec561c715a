use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::registry::domain::{CitizenId, HouseholdId, UserId};

/// Identifier assigned to a reward event by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned to a ledger row by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DistributionId(pub String);

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned to a student achievement record by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AchievementId(pub String);

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Planned,
    Open,
    Closed,
    Completed,
}

impl EventStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Completed => "Completed",
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Planned => 0,
            Self::Open => 1,
            Self::Closed => 2,
            Self::Completed => 3,
        }
    }

    /// The lifecycle only ever moves forward.
    pub const fn can_transition_to(self, next: EventStatus) -> bool {
        next.rank() > self.rank()
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::Planned
    }
}

/// Eligibility rule attached to an event at creation time.
///
/// The rule is an explicit enum; resolution never re-derives it from the
/// event name. [`RuleKind::suggest`] keeps the legacy name vocabulary
/// around purely as a convenience when a creation payload omits the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    MidAutumn,
    ChildrensDay,
    WomensDay,
    AnnualGeneral,
    SchoolAchievement,
    OpenSpecial,
}

impl RuleKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::MidAutumn => "Mid-Autumn festival (under 18)",
            Self::ChildrensDay => "Children's Day (under 14)",
            Self::WomensDay => "Women's Day",
            Self::AnnualGeneral => "Annual general",
            Self::SchoolAchievement => "School achievement",
            Self::OpenSpecial => "Open special program",
        }
    }

    /// Guesses a rule from an event name using the legacy keyword
    /// vocabulary. Only consulted when a creation payload carries no rule.
    pub fn suggest(name: &str) -> Option<RuleKind> {
        let lowered = name.to_lowercase();
        let matches_any =
            |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

        if matches_any(&["mid-autumn", "mid autumn", "trung thu"]) {
            Some(Self::MidAutumn)
        } else if matches_any(&["children", "thieu nhi", "1-6", "1/6"]) {
            Some(Self::ChildrensDay)
        } else if matches_any(&["women", "phu nu", "8-3", "8/3"]) {
            Some(Self::WomensDay)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub id: EventId,
    pub name: String,
    pub rule: Option<RuleKind>,
    pub event_date: Option<NaiveDate>,
    pub registration_start: Option<NaiveDate>,
    pub registration_end: Option<NaiveDate>,
    /// Default unit value for registrations that do not name one.
    pub budget_per_gift: Option<u32>,
    /// Registration capacity; 0 means unbounded.
    pub max_slots: u32,
    pub status: EventStatus,
}

impl RewardEvent {
    /// The date eligibility windows are anchored to: the event date when
    /// set, otherwise the caller's "today".
    pub fn reference_date(&self, today: NaiveDate) -> NaiveDate {
        self.event_date.unwrap_or(today)
    }

    /// Registration window check. Bounds are inclusive; a missing bound is
    /// open on that side.
    pub fn accepts_registration_on(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.registration_start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.registration_end {
            if date > end {
                return false;
            }
        }
        true
    }
}

/// Creation payload for a reward event; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRewardEvent {
    pub name: String,
    #[serde(default)]
    pub rule: Option<RuleKind>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub registration_start: Option<NaiveDate>,
    #[serde(default)]
    pub registration_end: Option<NaiveDate>,
    #[serde(default)]
    pub budget_per_gift: Option<u32>,
    #[serde(default)]
    pub max_slots: u32,
    #[serde(default)]
    pub status: EventStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    Registered,
    Distributed,
    Cancelled,
}

impl DistributionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::Distributed => "Distributed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Active rows hold the idempotency key and occupy a capacity slot.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// One row of the distribution ledger.
///
/// `total_value` is always derived from `quantity * unit_value` by the
/// single construction path in the ledger; callers never set it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardDistribution {
    pub id: DistributionId,
    pub event: EventId,
    pub household: HouseholdId,
    pub citizen: Option<CitizenId>,
    pub quantity: u32,
    pub unit_value: u32,
    pub total_value: u64,
    pub status: DistributionStatus,
    pub registered_at: NaiveDateTime,
    pub distributed_at: Option<NaiveDateTime>,
    pub distributed_by: Option<UserId>,
    pub note: Option<String>,
}

impl RewardDistribution {
    pub const fn derived_total(quantity: u32, unit_value: u32) -> u64 {
        quantity as u64 * unit_value as u64
    }
}

/// Caller-facing draft for bulk creation. A supplied `total_value` is
/// ignored and recomputed server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionDraft {
    pub event: EventId,
    pub household: HouseholdId,
    #[serde(default)]
    pub citizen: Option<CitizenId>,
    pub quantity: u32,
    #[serde(default)]
    pub unit_value: Option<u32>,
    #[serde(default)]
    pub total_value: Option<u64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementTier {
    Outstanding,
    Excellent,
    Good,
    Average,
}

impl AchievementTier {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Outstanding => "Outstanding",
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Average => "Average",
        }
    }

    /// Tolerant parser for roster cells; accepts the English tier names and
    /// the Vietnamese school terms, with or without diacritics.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "outstanding" | "xuat sac" | "xuất sắc" => Some(Self::Outstanding),
            "excellent" | "gioi" | "giỏi" => Some(Self::Excellent),
            "good" | "kha" | "khá" => Some(Self::Good),
            "average" | "trung binh" | "trung bình" => Some(Self::Average),
            _ => None,
        }
    }
}

/// School result feeding the achievement generator. Read-only input; rows
/// arrive through the roster importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAchievement {
    pub id: AchievementId,
    pub citizen: CitizenId,
    pub school_year: String,
    pub school: String,
    pub class_name: String,
    pub tier: AchievementTier,
    /// Notebook count granted by the school; overrides the tier quantity
    /// when positive.
    pub notebooks_rewarded: u32,
}

/// Achievement payload at insert time; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudentAchievement {
    pub citizen: CitizenId,
    pub school_year: String,
    pub school: String,
    pub class_name: String,
    pub tier: AchievementTier,
    #[serde(default)]
    pub notebooks_rewarded: u32,
}

/// Quantity and unit value pair used by both the tier table and the flat
/// age-range configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRule {
    pub quantity: u32,
    pub unit_value: u32,
}
