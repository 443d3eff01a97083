//! Domain models for the Pharmacy Management Platform

mod catalog;
mod report;
mod sale;
mod stock;
mod user;

pub use catalog::*;
pub use report::*;
pub use sale::*;
pub use stock::*;
pub use user::*;
