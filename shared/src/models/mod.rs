//! Domain models for the Stock Ledger Platform

mod bom;
mod item;
mod ledger;
mod production;
mod quotation;
mod repacking;
mod sales;
mod trolley;

pub use bom::*;
pub use item::*;
pub use ledger::*;
pub use production::*;
pub use quotation::*;
pub use repacking::*;
pub use sales::*;
pub use trolley::*;
