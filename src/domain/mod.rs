//! Data structures shared across the crate.
//!
//! These mirror the snap backend's wire types; the queue and player treat
//! them as opaque payloads apart from a few helper accessors.

pub mod snap;

pub use snap::{AudioRef, GpsFix, Guide, GuideFact, Landmark, LandmarkReport, SnapResult};
