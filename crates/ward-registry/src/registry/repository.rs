use crate::store::RepositoryError;

use super::domain::{Citizen, CitizenId, Household, HouseholdId, HouseholdStatus, NewCitizen};

/// Membership triple written onto a citizen record in one update.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipAssignment {
    pub household: HouseholdId,
    pub is_head: bool,
    pub relationship_to_head: String,
}

/// Household payload at insert time; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewHousehold {
    pub code: String,
    pub address: String,
    pub head: CitizenId,
    pub members: Vec<CitizenId>,
    pub phone: Option<String>,
    pub status: HouseholdStatus,
}

/// Field updates applied to a household record in one write. `None` leaves
/// a field untouched; `phone` uses a nested option so it can be cleared.
#[derive(Debug, Clone, Default)]
pub struct HouseholdUpdate {
    pub head: Option<CitizenId>,
    pub members: Option<Vec<CitizenId>>,
    pub phone: Option<Option<String>>,
    pub status: Option<HouseholdStatus>,
}

/// Storage abstraction for citizen and household records.
///
/// Each method is atomic for the single record it touches. Cross-record
/// consistency between the citizen side and the household side of the
/// membership link is the membership service's job, not the store's.
pub trait RegistryRepository: Send + Sync {
    fn insert_citizen(&self, citizen: NewCitizen) -> Result<Citizen, RepositoryError>;
    fn citizen(&self, id: &CitizenId) -> Result<Option<Citizen>, RepositoryError>;
    fn citizen_by_code(&self, code: &str) -> Result<Option<Citizen>, RepositoryError>;
    fn citizens(&self) -> Result<Vec<Citizen>, RepositoryError>;
    /// Citizens whose record currently points at the given household.
    fn citizens_in_household(
        &self,
        household: &HouseholdId,
    ) -> Result<Vec<Citizen>, RepositoryError>;
    /// Writes the whole membership triple, or clears it with `None`.
    fn assign_membership(
        &self,
        citizen: &CitizenId,
        assignment: Option<MembershipAssignment>,
    ) -> Result<(), RepositoryError>;

    fn insert_household(&self, household: NewHousehold) -> Result<Household, RepositoryError>;
    fn household(&self, id: &HouseholdId) -> Result<Option<Household>, RepositoryError>;
    fn household_by_code(&self, code: &str) -> Result<Option<Household>, RepositoryError>;
    fn households(&self) -> Result<Vec<Household>, RepositoryError>;
    fn add_member(
        &self,
        household: &HouseholdId,
        citizen: &CitizenId,
    ) -> Result<(), RepositoryError>;
    fn remove_member(
        &self,
        household: &HouseholdId,
        citizen: &CitizenId,
    ) -> Result<(), RepositoryError>;
    fn update_household(
        &self,
        id: &HouseholdId,
        update: HouseholdUpdate,
    ) -> Result<(), RepositoryError>;
    fn delete_household(&self, id: &HouseholdId) -> Result<(), RepositoryError>;
}
