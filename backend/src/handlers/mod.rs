//! HTTP request handlers

pub mod catalog;
pub mod health;
pub mod reports;
pub mod sales;
pub mod stock;

pub use catalog::*;
pub use health::*;
pub use reports::*;
pub use sales::*;
pub use stock::*;
