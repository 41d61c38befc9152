//! Vigie Immo: property risk analysis for addresses in Québec.
//!
//! An address is geocoded, nine independent public sources are queried
//! concurrently around the resulting coordinate, and their answers are folded
//! into one 0 to 100 risk score.

pub mod analysis;
pub mod config;
pub mod error;
pub mod geo;
pub mod location;
pub mod risk;
pub mod sources;
pub mod telemetry;
