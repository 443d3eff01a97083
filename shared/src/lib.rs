//! Shared types and models for the Pharmacy Management Platform
//!
//! This crate holds the pure domain layer: catalog, stock and sale models,
//! FEFO allocation planning, decimal totals and input validation. It performs
//! no I/O, so everything here can be tested without a database.

pub mod allocation;
pub mod models;
pub mod totals;
pub mod types;
pub mod validation;

pub use allocation::*;
pub use models::*;
pub use totals::*;
pub use types::*;
pub use validation::*;
