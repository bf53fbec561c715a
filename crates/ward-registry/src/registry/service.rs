use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::audit::{AuditAction, AuditEntry, AuditWriter};
use crate::error::FaultKind;
use crate::notify::{
    Notification, NotificationFanout, NotificationKind, NotificationPriority,
};
use crate::store::RepositoryError;

use super::domain::{
    Citizen, CitizenId, Household, HouseholdId, HouseholdStatus, HouseholdView, MemberView,
    NewCitizen, UserId, DEFAULT_RELATIONSHIP, HEAD_RELATIONSHIP,
};
use super::repository::{
    HouseholdUpdate, MembershipAssignment, NewHousehold, RegistryRepository,
};
use super::split::{plan_split, SplitRequest, SplitViolation};

/// One side of a dual-sided membership update succeeded and the other did
/// not. The link is left inconsistent on purpose: repair happens out of
/// band, never by a blind retry here.
#[derive(Debug, thiserror::Error)]
#[error("membership link for citizen {citizen} is inconsistent after {stage}: {source}")]
pub struct IntegrityFault {
    pub citizen: CitizenId,
    pub stage: &'static str,
    #[source]
    pub source: RepositoryError,
}

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("citizen {0} not found")]
    CitizenNotFound(CitizenId),
    #[error("household {0} not found")]
    HouseholdNotFound(HouseholdId),
    #[error("household code {0} is already in use")]
    CodeInUse(String),
    #[error("another citizen already holds this national id")]
    NationalIdInUse,
    #[error("citizen {0} already heads a household")]
    AlreadyHead(CitizenId),
    #[error("citizen {0} heads their household; heads move only via split or delete")]
    HeadImmovable(CitizenId),
    #[error(transparent)]
    Split(#[from] SplitViolation),
    #[error(transparent)]
    Integrity(#[from] IntegrityFault),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MembershipError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::CitizenNotFound(_) | Self::HouseholdNotFound(_) => FaultKind::NotFound,
            Self::CodeInUse(_) | Self::NationalIdInUse => FaultKind::Conflict,
            Self::AlreadyHead(_) | Self::HeadImmovable(_) | Self::Split(_) => {
                FaultKind::Validation
            }
            Self::Integrity(_) => FaultKind::Integrity,
            Self::Repository(RepositoryError::NotFound) => FaultKind::NotFound,
            Self::Repository(RepositoryError::Conflict) => FaultKind::Conflict,
            Self::Repository(RepositoryError::Unavailable(_)) => FaultKind::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateHouseholdRequest {
    pub code: String,
    pub address: String,
    pub head: CitizenId,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    pub household: HouseholdId,
    #[serde(default)]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitOutcome {
    pub household: Household,
    pub created: Vec<Household>,
}

/// Owns every write that touches the household ↔ citizen link.
///
/// Dual-sided updates follow a fixed order: validate fully, write the add
/// sides, then write the remove sides. The repository only guarantees
/// per-record atomicity, so a failure between sides surfaces as
/// [`IntegrityFault`] instead of being papered over.
pub struct MembershipService<R, A, N> {
    repository: Arc<R>,
    audit: Arc<A>,
    fanout: Arc<N>,
}

impl<R, A, N> MembershipService<R, A, N>
where
    R: RegistryRepository + 'static,
    A: AuditWriter + 'static,
    N: NotificationFanout + 'static,
{
    pub fn new(repository: Arc<R>, audit: Arc<A>, fanout: Arc<N>) -> Self {
        Self {
            repository,
            audit,
            fanout,
        }
    }

    pub fn register_citizen(&self, request: NewCitizen) -> Result<Citizen, MembershipError> {
        let citizen = self
            .repository
            .insert_citizen(request)
            .map_err(|err| match err {
                RepositoryError::Conflict => MembershipError::NationalIdInUse,
                other => MembershipError::Repository(other),
            })?;
        self.record(
            AuditEntry::new(AuditAction::Create, "citizen", citizen.id.0.clone())
                .detail(format!("registered {}", citizen.code)),
        );
        Ok(citizen)
    }

    pub fn create_household(
        &self,
        request: CreateHouseholdRequest,
    ) -> Result<Household, MembershipError> {
        let head = self.require_citizen(&request.head)?;
        if head.is_head {
            return Err(MembershipError::AlreadyHead(head.id));
        }

        let code = request.code.clone();
        let phone = request.phone.or_else(|| head.phone.clone());
        let household = self
            .repository
            .insert_household(NewHousehold {
                code: request.code,
                address: request.address,
                head: head.id.clone(),
                members: vec![head.id.clone()],
                phone,
                status: HouseholdStatus::Active,
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => MembershipError::CodeInUse(code),
                other => MembershipError::Repository(other),
            })?;

        self.relink(&head, &household, true, HEAD_RELATIONSHIP.to_string())?;

        self.record(
            AuditEntry::new(AuditAction::Create, "household", household.id.0.clone())
                .detail(format!("code {} headed by {}", household.code, head.id)),
        );
        self.publish(Notification {
            recipients: head.user_account.iter().cloned().collect(),
            title: "Household registered".to_string(),
            message: format!("Household {} was registered with you as head.", household.code),
            kind: NotificationKind::HouseholdLifecycle,
            entity_kind: "household",
            entity_id: household.id.0.clone(),
            priority: NotificationPriority::Normal,
        });
        Ok(household)
    }

    pub fn household_view(&self, id: &HouseholdId) -> Result<HouseholdView, MembershipError> {
        let household = self.require_household(id)?;
        let members = self
            .repository
            .citizens_in_household(id)?
            .iter()
            .map(MemberView::from_citizen)
            .collect();
        Ok(HouseholdView {
            id: household.id,
            code: household.code,
            address: household.address,
            status: household.status,
            status_label: household.status.label(),
            phone: household.phone,
            head: household.head,
            members,
        })
    }

    /// Moves a citizen into another household, updating both sides of the
    /// link. Moving into the current household is a no-op.
    pub fn move_citizen(
        &self,
        citizen_id: &CitizenId,
        request: MoveRequest,
    ) -> Result<Citizen, MembershipError> {
        let citizen = self.require_citizen(citizen_id)?;
        let target = self.require_household(&request.household)?;

        if citizen.household.as_ref() == Some(&target.id) {
            return Ok(citizen);
        }
        if citizen.is_head {
            return Err(MembershipError::HeadImmovable(citizen.id));
        }

        let relationship = request
            .relationship
            .unwrap_or_else(|| DEFAULT_RELATIONSHIP.to_string());
        self.relink(&citizen, &target, false, relationship)?;

        self.record(
            AuditEntry::new(AuditAction::Update, "citizen", citizen.id.0.clone())
                .detail(format!("moved into household {}", target.code)),
        );
        self.publish(Notification {
            recipients: citizen.user_account.iter().cloned().collect(),
            title: "Household membership updated".to_string(),
            message: format!("You are now registered under household {}.", target.code),
            kind: NotificationKind::HouseholdLifecycle,
            entity_kind: "citizen",
            entity_id: citizen.id.0.clone(),
            priority: NotificationPriority::Normal,
        });

        self.require_citizen(citizen_id)
    }

    /// Removes a household after clearing the membership triple of every
    /// citizen still pointing at it. The record itself is only deleted once
    /// the sweep finished, so no citizen is ever left referencing a missing
    /// household.
    pub fn delete_household(&self, id: &HouseholdId) -> Result<(), MembershipError> {
        let household = self.require_household(id)?;
        let members = self.repository.citizens_in_household(id)?;
        for citizen in &members {
            self.repository.assign_membership(&citizen.id, None)?;
        }
        self.repository.delete_household(id)?;

        self.record(
            AuditEntry::new(AuditAction::Delete, "household", household.id.0.clone())
                .detail(format!("released {} members", members.len())),
        );
        self.publish(Notification {
            recipients: members
                .iter()
                .filter_map(|citizen| citizen.user_account.clone())
                .collect(),
            title: "Household removed".to_string(),
            message: format!("Household {} was removed from the registry.", household.code),
            kind: NotificationKind::HouseholdLifecycle,
            entity_kind: "household",
            entity_id: household.id.0.clone(),
            priority: NotificationPriority::High,
        });
        Ok(())
    }

    /// Splits a household into one or more new ones. Validation is
    /// all-or-nothing: every partition rule is checked before the first
    /// write, and a rejected request leaves the registry untouched.
    pub fn split_household(
        &self,
        id: &HouseholdId,
        request: SplitRequest,
    ) -> Result<SplitOutcome, MembershipError> {
        let source = self.require_household(id)?;
        let plan = plan_split(&source, &request)?;

        for partition in &plan.partitions {
            if self.repository.household_by_code(&partition.code)?.is_some() {
                return Err(MembershipError::CodeInUse(partition.code.clone()));
            }
        }

        // Resolve every affected citizen record before the first write so a
        // dangling id cannot interrupt execution halfway through.
        let mut records: HashMap<CitizenId, Citizen> = HashMap::new();
        for citizen in self.repository.citizens_in_household(id)? {
            records.insert(citizen.id.clone(), citizen);
        }
        for partition in &plan.partitions {
            for member in &partition.members {
                if !records.contains_key(member) {
                    return Err(MembershipError::CitizenNotFound(member.clone()));
                }
            }
        }
        if !records.contains_key(&plan.remainder_head) {
            return Err(MembershipError::CitizenNotFound(plan.remainder_head.clone()));
        }

        let mut created = Vec::with_capacity(plan.partitions.len());
        for partition in &plan.partitions {
            let head_phone = records
                .get(&partition.head)
                .and_then(|record| record.phone.clone());
            let household = self
                .repository
                .insert_household(NewHousehold {
                    code: partition.code.clone(),
                    address: partition.address.clone(),
                    head: partition.head.clone(),
                    members: partition.members.clone(),
                    phone: head_phone,
                    status: HouseholdStatus::Active,
                })
                .map_err(|err| match err {
                    RepositoryError::Conflict => {
                        MembershipError::CodeInUse(partition.code.clone())
                    }
                    other => MembershipError::Repository(other),
                })?;

            for member in &partition.members {
                let is_head = *member == partition.head;
                let relationship = if is_head {
                    HEAD_RELATIONSHIP.to_string()
                } else {
                    records
                        .get(member)
                        .and_then(|record| record.relationship_to_head.clone())
                        .unwrap_or_else(|| DEFAULT_RELATIONSHIP.to_string())
                };
                let assignment = MembershipAssignment {
                    household: household.id.clone(),
                    is_head,
                    relationship_to_head: relationship,
                };
                if let Err(source) = self.repository.assign_membership(member, Some(assignment))
                {
                    return Err(self.integrity_fault(
                        member.clone(),
                        "relinking a split member",
                        source,
                    ));
                }
            }
            created.push(household);
        }

        let remainder_phone = records
            .get(&plan.remainder_head)
            .and_then(|record| record.phone.clone());
        if let Err(source) = self.repository.update_household(
            id,
            HouseholdUpdate {
                head: Some(plan.remainder_head.clone()),
                members: Some(plan.remainder.clone()),
                phone: Some(remainder_phone),
                status: Some(HouseholdStatus::Split),
            },
        ) {
            return Err(self.integrity_fault(
                plan.remainder_head.clone(),
                "updating the source household",
                source,
            ));
        }

        if plan.head_moved {
            let assignment = MembershipAssignment {
                household: source.id.clone(),
                is_head: true,
                relationship_to_head: HEAD_RELATIONSHIP.to_string(),
            };
            if let Err(source) = self
                .repository
                .assign_membership(&plan.remainder_head, Some(assignment))
            {
                return Err(self.integrity_fault(
                    plan.remainder_head.clone(),
                    "promoting the replacement head",
                    source,
                ));
            }
        }

        let household = self.require_household(id)?;

        self.record(
            AuditEntry::new(AuditAction::Split, "household", household.id.0.clone()).detail(
                format!(
                    "{} new households, {} members remain",
                    created.len(),
                    plan.remainder.len()
                ),
            ),
        );
        let mut recipients: Vec<UserId> = Vec::new();
        for head in created
            .iter()
            .map(|household| &household.head)
            .chain(std::iter::once(&household.head))
        {
            if let Some(user) = records.get(head).and_then(|record| record.user_account.clone())
            {
                recipients.push(user);
            }
        }
        self.publish(Notification {
            recipients,
            title: "Household split".to_string(),
            message: format!(
                "Household {} was split into {} new households.",
                household.code,
                created.len()
            ),
            kind: NotificationKind::HouseholdLifecycle,
            entity_kind: "household",
            entity_id: household.id.0.clone(),
            priority: NotificationPriority::High,
        });

        Ok(SplitOutcome { household, created })
    }

    fn require_citizen(&self, id: &CitizenId) -> Result<Citizen, MembershipError> {
        self.repository
            .citizen(id)?
            .ok_or_else(|| MembershipError::CitizenNotFound(id.clone()))
    }

    fn require_household(&self, id: &HouseholdId) -> Result<Household, MembershipError> {
        self.repository
            .household(id)?
            .ok_or_else(|| MembershipError::HouseholdNotFound(id.clone()))
    }

    /// Single write path for the household ↔ citizen link: citizen record
    /// first, then the target member array, then the previous member array.
    fn relink(
        &self,
        citizen: &Citizen,
        target: &Household,
        is_head: bool,
        relationship: String,
    ) -> Result<(), MembershipError> {
        self.repository.assign_membership(
            &citizen.id,
            Some(MembershipAssignment {
                household: target.id.clone(),
                is_head,
                relationship_to_head: relationship,
            }),
        )?;

        if let Err(source) = self.repository.add_member(&target.id, &citizen.id) {
            return Err(self.integrity_fault(
                citizen.id.clone(),
                "adding the citizen to the target household",
                source,
            ));
        }

        if let Some(previous) = &citizen.household {
            if previous != &target.id {
                if let Err(source) = self.repository.remove_member(previous, &citizen.id) {
                    return Err(self.integrity_fault(
                        citizen.id.clone(),
                        "removing the citizen from the previous household",
                        source,
                    ));
                }
            }
        }
        Ok(())
    }

    fn integrity_fault(
        &self,
        citizen: CitizenId,
        stage: &'static str,
        source: RepositoryError,
    ) -> MembershipError {
        error!(citizen = %citizen, stage, error = %source, "membership link left inconsistent");
        MembershipError::Integrity(IntegrityFault {
            citizen,
            stage,
            source,
        })
    }

    fn record(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.record(entry) {
            warn!(error = %err, "audit write failed");
        }
    }

    fn publish(&self, notification: Notification) {
        if let Err(err) = self.fanout.notify(notification) {
            warn!(error = %err, "notification fan-out failed");
        }
    }
}
