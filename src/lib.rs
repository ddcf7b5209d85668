//! combo-batch groups weighted, uniquely-identified items into shipment-sized
//! combos whose total weight meets a target while minimizing overshoot.
//!
//! The core is the eligibility filter ([`filter`]) plus the deterministic
//! best-fit grouping engine ([`grouper`]); everything else is the service
//! shell around them.

pub mod api;
pub mod config;
pub mod filter;
pub mod grouper;
pub mod model;
pub mod report;
pub mod update;
