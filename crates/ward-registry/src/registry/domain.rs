use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a citizen record by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CitizenId(pub String);

impl fmt::Display for CitizenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned to a household record by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HouseholdId(pub String);

impl fmt::Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a login account in the surrounding platform. Citizens may
/// or may not have one; notifications only reach those who do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

/// Registration status with the ward. Only permanent residents qualify for
/// most age-window reward rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidencyStatus {
    Permanent,
    TemporaryResident,
    TemporaryAbsent,
}

impl ResidencyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Permanent => "Permanent",
            Self::TemporaryResident => "Temporary resident",
            Self::TemporaryAbsent => "Temporarily absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    Alive,
    Deceased,
    MovedOut,
}

impl LifeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Alive => "Alive",
            Self::Deceased => "Deceased",
            Self::MovedOut => "Moved out",
        }
    }
}

impl Default for LifeStatus {
    fn default() -> Self {
        Self::Alive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdStatus {
    Active,
    Moved,
    Split,
    Merged,
    Inactive,
}

impl HouseholdStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Moved => "Moved",
            Self::Split => "Split",
            Self::Merged => "Merged",
            Self::Inactive => "Inactive",
        }
    }
}

/// Relationship label written onto the head's own record.
pub const HEAD_RELATIONSHIP: &str = "head";

/// Relationship label used when the caller does not supply one.
pub const DEFAULT_RELATIONSHIP: &str = "member";

/// A resident of the ward.
///
/// The `household`, `is_head`, and `relationship_to_head` fields form the
/// citizen-side half of the membership link and are only ever written
/// together, through the membership service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citizen {
    pub id: CitizenId,
    /// Human-facing registry code, e.g. `NK12`.
    pub code: String,
    pub national_id: Option<String>,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub residency: ResidencyStatus,
    pub life_status: LifeStatus,
    pub phone: Option<String>,
    pub user_account: Option<UserId>,
    pub household: Option<HouseholdId>,
    pub is_head: bool,
    pub relationship_to_head: Option<String>,
}

/// Payload for registering a citizen. The store assigns the id and the
/// registry code; membership starts empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCitizen {
    #[serde(default)]
    pub national_id: Option<String>,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub residency: ResidencyStatus,
    #[serde(default)]
    pub life_status: LifeStatus,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_account: Option<UserId>,
}

/// A registered household.
///
/// `members` is the household-side half of the membership link. The head is
/// always listed in it; [`Household::full_membership`] makes that explicit
/// for callers that must not care about the storage layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub id: HouseholdId,
    /// Human-facing household book code, unique across the ward.
    pub code: String,
    pub address: String,
    pub head: CitizenId,
    pub members: Vec<CitizenId>,
    pub phone: Option<String>,
    pub status: HouseholdStatus,
}

impl Household {
    /// The declared member list plus the head, deduplicated, in declaration
    /// order with the head appended if it was missing.
    pub fn full_membership(&self) -> Vec<CitizenId> {
        let mut membership: Vec<CitizenId> = Vec::with_capacity(self.members.len() + 1);
        for member in &self.members {
            if !membership.contains(member) {
                membership.push(member.clone());
            }
        }
        if !membership.contains(&self.head) {
            membership.push(self.head.clone());
        }
        membership
    }

    pub fn has_member(&self, citizen: &CitizenId) -> bool {
        self.head == *citizen || self.members.contains(citizen)
    }
}

/// Member line in a hydrated household view.
#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub id: CitizenId,
    pub code: String,
    pub full_name: String,
    pub is_head: bool,
    pub relationship_to_head: Option<String>,
}

impl MemberView {
    pub(crate) fn from_citizen(citizen: &Citizen) -> Self {
        Self {
            id: citizen.id.clone(),
            code: citizen.code.clone(),
            full_name: citizen.full_name.clone(),
            is_head: citizen.is_head,
            relationship_to_head: citizen.relationship_to_head.clone(),
        }
    }
}

/// Household detail with hydrated member records, for read endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HouseholdView {
    pub id: HouseholdId,
    pub code: String,
    pub address: String,
    pub status: HouseholdStatus,
    pub status_label: &'static str,
    pub phone: Option<String>,
    pub head: CitizenId,
    pub members: Vec<MemberView>,
}
