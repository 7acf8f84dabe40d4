//! Orgdir Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! directory entities, geo value types, pagination and the error taxonomy.
//! This crate performs no I/O.

pub mod entities;
pub mod error;
pub mod geo;
pub mod pagination;

pub use entities::{
    Activity, ActivityNode, Building, DirectoryEntity, Organization, OrganizationRecord, Phone,
};
pub use error::{
    CacheError, ConfigError, OrgdirError, OrgdirResult, StorageError, ValidationError,
};
pub use geo::{validate_radius_km, BoundingBox, GeoPoint};
pub use pagination::{Page, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Building identifier.
pub type BuildingId = i64;

/// Activity identifier.
pub type ActivityId = i64;

/// Organization identifier.
pub type OrganizationId = i64;

/// Phone identifier.
pub type PhoneId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Maximum number of hierarchy levels expanded below a query root.
pub const MAX_HIERARCHY_DEPTH: u32 = 3;

/// Entity type discriminator for polymorphic lookups and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Building,
    Activity,
    Organization,
    Phone,
}

impl EntityKind {
    /// Stable lowercase name, used in cache keys and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Building => "building",
            EntityKind::Activity => "activity",
            EntityKind::Organization => "organization",
            EntityKind::Phone => "phone",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "building" | "buildings" => Ok(EntityKind::Building),
            "activity" | "activities" => Ok(EntityKind::Activity),
            "organization" | "organizations" => Ok(EntityKind::Organization),
            "phone" | "phones" => Ok(EntityKind::Phone),
            other => Err(ValidationError::InvalidValue {
                field: "kind".to_string(),
                reason: format!("unknown entity kind '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_roundtrip_through_str() {
        for kind in [
            EntityKind::Building,
            EntityKind::Activity,
            EntityKind::Organization,
            EntityKind::Phone,
        ] {
            let parsed: EntityKind = kind.as_str().parse().expect("kind should parse");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_entity_kind_accepts_plural_and_case() {
        assert_eq!("Organizations".parse::<EntityKind>().ok(), Some(EntityKind::Organization));
        assert!("tenant".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_entity_kind_serde_snake_case() {
        let json = serde_json::to_string(&EntityKind::Organization).expect("serialize");
        assert_eq!(json, "\"organization\"");
    }
}
