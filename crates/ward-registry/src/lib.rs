//! Household registry and reward-distribution engine for residential wards.
//!
//! The crate is organized around two features. [`registry`] owns citizens,
//! households, and the dual-sided link between them. [`rewards`] owns reward
//! events, eligibility resolution, and the distribution ledger that records
//! who received what. Shared plumbing (configuration, telemetry, audit and
//! notification contracts, storage primitives) lives at the crate root.

pub mod audit;
pub mod config;
pub mod error;
pub mod notify;
pub mod registry;
pub mod rewards;
pub mod store;
pub mod telemetry;
