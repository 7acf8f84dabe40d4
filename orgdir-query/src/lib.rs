//! Orgdir Query - Resolution Engine
//!
//! Turns directory queries into fully assembled result sets:
//! - `HierarchyIndex`: bounded-depth closure over the activity taxonomy
//! - `GeoFilter`: rectangle and great-circle radius membership
//! - `QueryPlanner`: validation, filter composition and cache-aside resolution
//! - `DirectoryEngine`: the explicitly wired context owning all of the above

pub mod context;
pub mod geo;
pub mod hierarchy;
pub mod planner;
pub mod query;

pub use context::DirectoryEngine;
pub use geo::{location, GeoFilter, EARTH_RADIUS_KM};
pub use hierarchy::{Closure, HierarchyIndex};
pub use planner::{PlannerConfig, QueryPlanner, DEFAULT_MAX_RADIUS_KM};
pub use query::DirectoryQuery;
