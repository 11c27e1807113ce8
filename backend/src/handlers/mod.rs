//! HTTP handlers for the Stock Ledger Platform

pub mod bom;
pub mod bundle;
pub mod customer;
pub mod grn;
pub mod health;
pub mod items;
pub mod ledger;
pub mod opening_stock;
pub mod price_list;
pub mod production;
pub mod quotation;
pub mod repacking;
pub mod sales;
pub mod supplier;
pub mod trolley;

pub use bom::*;
pub use bundle::*;
pub use customer::*;
pub use grn::*;
pub use health::*;
pub use items::*;
pub use ledger::*;
pub use opening_stock::*;
pub use price_list::*;
pub use production::*;
pub use quotation::*;
pub use repacking::*;
pub use sales::*;
pub use supplier::*;
pub use trolley::*;
