//! Fail-fast validation for household splits.
//!
//! A split request is checked in full against the source household before a
//! single record is written. The planner output partitions the membership
//! exactly: every citizen lands in one new household or the remainder, and
//! the remainder keeps at least one member.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{CitizenId, Household};

/// One requested carve-out from the source household. The head is treated
/// as a member of its own split whether or not it is listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitDefinition {
    pub code: String,
    /// Address of the new household; the source address is reused when
    /// omitted.
    #[serde(default)]
    pub address: Option<String>,
    pub head: CitizenId,
    #[serde(default)]
    pub members: Vec<CitizenId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRequest {
    pub splits: Vec<SplitDefinition>,
    /// Required exactly when the current head moves into one of the splits.
    #[serde(default)]
    pub new_head_for_original: Option<CitizenId>,
}

/// Partition rule violations. All of them are detected before any write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitViolation {
    #[error("no splits requested")]
    Empty,
    #[error("split code {0} is requested more than once")]
    DuplicateSplitCode(String),
    #[error("citizen {0} is not a member of the source household")]
    NotAMember(CitizenId),
    #[error("citizen {0} is assigned to more than one split")]
    OverlappingAssignment(CitizenId),
    #[error("split would leave the source household without members")]
    EmptyRemainder,
    #[error("the head moved into a split; a replacement head is required")]
    MissingReplacementHead,
    #[error("replacement head {0} is not among the remaining members")]
    ReplacementHeadNotRemaining(CitizenId),
}

/// One new household to create, with its full member list (head included).
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPartition {
    pub code: String,
    pub address: String,
    pub head: CitizenId,
    pub members: Vec<CitizenId>,
}

/// Validated execution plan for a split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub partitions: Vec<SplitPartition>,
    /// Citizens staying in the source household.
    pub remainder: Vec<CitizenId>,
    pub remainder_head: CitizenId,
    pub head_moved: bool,
}

pub fn plan_split(source: &Household, request: &SplitRequest) -> Result<SplitPlan, SplitViolation> {
    if request.splits.is_empty() {
        return Err(SplitViolation::Empty);
    }

    let membership = source.full_membership();
    let membership_set: BTreeSet<&CitizenId> = membership.iter().collect();
    let mut claimed: BTreeSet<CitizenId> = BTreeSet::new();
    let mut codes: BTreeSet<&str> = BTreeSet::new();
    let mut partitions = Vec::with_capacity(request.splits.len());

    for split in &request.splits {
        if !codes.insert(split.code.as_str()) {
            return Err(SplitViolation::DuplicateSplitCode(split.code.clone()));
        }

        let mut members: Vec<CitizenId> = Vec::with_capacity(split.members.len() + 1);
        for citizen in split.members.iter().chain(std::iter::once(&split.head)) {
            if !members.contains(citizen) {
                members.push(citizen.clone());
            }
        }

        for citizen in &members {
            if !membership_set.contains(citizen) {
                return Err(SplitViolation::NotAMember(citizen.clone()));
            }
            if !claimed.insert(citizen.clone()) {
                return Err(SplitViolation::OverlappingAssignment(citizen.clone()));
            }
        }

        partitions.push(SplitPartition {
            code: split.code.clone(),
            address: split
                .address
                .clone()
                .unwrap_or_else(|| source.address.clone()),
            head: split.head.clone(),
            members,
        });
    }

    let remainder: Vec<CitizenId> = membership
        .iter()
        .filter(|citizen| !claimed.contains(*citizen))
        .cloned()
        .collect();
    if remainder.is_empty() {
        return Err(SplitViolation::EmptyRemainder);
    }

    let head_moved = claimed.contains(&source.head);
    let remainder_head = if head_moved {
        match &request.new_head_for_original {
            None => return Err(SplitViolation::MissingReplacementHead),
            Some(candidate) if !remainder.contains(candidate) => {
                return Err(SplitViolation::ReplacementHeadNotRemaining(
                    candidate.clone(),
                ))
            }
            Some(candidate) => candidate.clone(),
        }
    } else {
        // A replacement head is meaningless while the head stays; ignore it.
        source.head.clone()
    };

    Ok(SplitPlan {
        partitions,
        remainder,
        remainder_head,
        head_moved,
    })
}
