//! Directory entities
//!
//! Buildings, activities, organizations and phones as the query engine sees
//! them. `Organization` is always the fully-populated aggregate: building,
//! phones and activities are attached before it leaves a gateway.

use serde::{Deserialize, Serialize};

use crate::{
    ActivityId, BuildingId, EntityKind, OrganizationId, PhoneId, Timestamp,
};

/// A building with its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Building {
    pub id: BuildingId,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A node of the activity taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    pub category: Option<String>,
    pub parent_id: Option<ActivityId>,
    /// 1-based depth in the taxonomy.
    pub level: i32,
}

impl Activity {
    /// Returns true if this activity has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// An activity with its (depth-bounded) subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ActivityNode {
    #[serde(flatten)]
    pub activity: Activity,
    #[cfg_attr(feature = "openapi", schema(no_recursion))]
    pub children: Vec<ActivityNode>,
}

impl ActivityNode {
    /// Create a leaf node.
    pub fn leaf(activity: Activity) -> Self {
        Self {
            activity,
            children: Vec::new(),
        }
    }

    /// Ids of this node and every node below it, depth first.
    pub fn ids(&self) -> Vec<ActivityId> {
        let mut out = vec![self.activity.id];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }

    /// Number of levels in this subtree, counting the node itself.
    pub fn height(&self) -> usize {
        1 + self.children.iter().map(ActivityNode::height).max().unwrap_or(0)
    }
}

/// A phone number owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Phone {
    pub id: PhoneId,
    pub number: String,
    pub organization_id: OrganizationId,
}

/// Raw organization row, before related entities are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    pub id: OrganizationId,
    pub name: String,
    pub building_id: BuildingId,
    /// Null when the backing table does not track timestamps.
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// Fully-populated organization aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub building: Building,
    pub phones: Vec<Phone>,
    pub activities: Vec<Activity>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub created_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub updated_at: Option<Timestamp>,
}

impl Organization {
    /// Assemble an aggregate from its row and eagerly loaded relations.
    ///
    /// Phones and activities are sorted by id so equal aggregates serialize
    /// identically regardless of the order storage returned them in.
    pub fn assemble(
        record: OrganizationRecord,
        building: Building,
        mut phones: Vec<Phone>,
        mut activities: Vec<Activity>,
    ) -> Self {
        phones.sort_by_key(|p| p.id);
        activities.sort_by_key(|a| a.id);
        Self {
            id: record.id,
            name: record.name,
            building,
            phones,
            activities,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// The building this organization occupies.
    pub fn building_id(&self) -> BuildingId {
        self.building.id
    }

    /// Returns true if the organization is tagged with the given activity.
    pub fn has_activity(&self, activity_id: ActivityId) -> bool {
        self.activities.iter().any(|a| a.id == activity_id)
    }
}

/// Any single entity returned by a by-id lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum DirectoryEntity {
    Building(Building),
    Activity(Activity),
    Organization(Organization),
}

impl DirectoryEntity {
    /// The kind of the wrapped entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            DirectoryEntity::Building(_) => EntityKind::Building,
            DirectoryEntity::Activity(_) => EntityKind::Activity,
            DirectoryEntity::Organization(_) => EntityKind::Organization,
        }
    }

    /// The id of the wrapped entity.
    pub fn id(&self) -> i64 {
        match self {
            DirectoryEntity::Building(b) => b.id,
            DirectoryEntity::Activity(a) => a.id,
            DirectoryEntity::Organization(o) => o.id,
        }
    }
}
