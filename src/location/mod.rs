//! Address resolution subsystem.
//!
//! Turns free text into a coordinate, a formatted address, a municipality
//! and a region, trying the provincial geocoder before Nominatim.

pub mod providers;
pub mod resolver;
pub mod types;

pub use crate::error::ResolutionFailure;
pub use resolver::AddressResolver;
pub use types::{AddressResolution, GeocoderSource, ResolvedAddress};
