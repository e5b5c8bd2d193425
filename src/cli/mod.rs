//! Terminal front end for the valuation pipeline.

pub mod alloc;
pub mod currency;
pub mod holdings;
pub mod search;
pub mod setup;
pub mod total;
pub mod ui;
