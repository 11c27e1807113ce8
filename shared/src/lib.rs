//! Shared types and stock logic for the Stock Ledger Platform
//!
//! This crate contains the domain enums and the pure ledger, allocation,
//! verification, costing and settlement rules shared between the backend and the
//! browser-side calculators (via WASM). Nothing in here touches a database.

pub mod allocation;
pub mod costing;
pub mod ledger;
pub mod models;
pub mod settlement;
pub mod types;
pub mod validation;
pub mod verification;

pub use allocation::*;
pub use costing::*;
pub use ledger::*;
pub use models::*;
pub use settlement::*;
pub use types::*;
pub use validation::*;
pub use verification::*;
