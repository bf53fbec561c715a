//! Household membership: citizens, households, and the dual-sided link
//! between them.
//!
//! Consistency is the point of this module. A citizen points at one
//! household; that household's member array points back. Every write that
//! could break the pair goes through [`service::MembershipService`].

pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod split;

#[cfg(test)]
mod tests;

pub use domain::{
    Citizen, CitizenId, Gender, Household, HouseholdId, HouseholdStatus, HouseholdView,
    LifeStatus, MemberView, NewCitizen, ResidencyStatus, UserId,
};
pub use memory::InMemoryRegistry;
pub use repository::{HouseholdUpdate, MembershipAssignment, NewHousehold, RegistryRepository};
pub use router::registry_router;
pub use service::{
    CreateHouseholdRequest, IntegrityFault, MembershipError, MembershipService, MoveRequest,
    SplitOutcome,
};
pub use split::{SplitDefinition, SplitRequest, SplitViolation};
