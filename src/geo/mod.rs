//! Geographic primitives shared by the resolver and every source connector.
//!
//! Great-circle distances, distance bands, and the administrative region
//! classifier for the province of Québec.

pub mod distance;
pub mod region;

pub use distance::{DistanceCategory, GeoPoint};
pub use region::{region_label, region_of, Region, RegionUndetermined};
