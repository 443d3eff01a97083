//! Business logic services for the Pharmacy Management Platform

pub mod allocation;
pub mod catalog;
pub mod sale;
pub mod stock;

pub use catalog::CatalogService;
pub use sale::SaleService;
pub use stock::StockService;
