//! Async storage gateway trait.
//!
//! Every method is read-only and set-based: callers hand over whole id sets
//! so an implementation can answer each call with a single round trip.
//! Organization lookups always return fully-populated aggregates.

use async_trait::async_trait;
use orgdir_core::{
    Activity, ActivityId, Building, BuildingId, BoundingBox, Organization, OrganizationId,
    OrgdirResult, Page,
};

/// Read access to the relational store.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    // ========================================================================
    // SINGLE-ENTITY LOOKUPS
    // ========================================================================

    /// Get a building by id.
    async fn building_get(&self, id: BuildingId) -> OrgdirResult<Option<Building>>;

    /// Get an activity by id.
    async fn activity_get(&self, id: ActivityId) -> OrgdirResult<Option<Activity>>;

    /// Get an organization aggregate by id.
    async fn organization_get(&self, id: OrganizationId) -> OrgdirResult<Option<Organization>>;

    // ========================================================================
    // ACTIVITY TAXONOMY
    // ========================================================================

    /// Direct children of every given parent, in one call.
    async fn activity_children(&self, parent_ids: &[ActivityId]) -> OrgdirResult<Vec<Activity>>;

    /// Activities whose name contains `text`, case-insensitively.
    async fn activities_by_name(&self, text: &str) -> OrgdirResult<Vec<Activity>>;

    /// One page of all activities ordered by id.
    async fn activities_list(&self, page: Page) -> OrgdirResult<Vec<Activity>>;

    // ========================================================================
    // ORGANIZATIONS
    // ========================================================================

    /// Organizations located in a building.
    async fn organizations_by_building(
        &self,
        building_id: BuildingId,
    ) -> OrgdirResult<Vec<Organization>>;

    /// Organizations located in any of the given buildings.
    async fn organizations_by_buildings(
        &self,
        building_ids: &[BuildingId],
    ) -> OrgdirResult<Vec<Organization>>;

    /// Organizations tagged with any of the given activities.
    ///
    /// An organization tagged with several of the ids may be returned once
    /// per matching tag; callers deduplicate.
    async fn organizations_by_activities(
        &self,
        activity_ids: &[ActivityId],
    ) -> OrgdirResult<Vec<Organization>>;

    /// Organizations whose name contains `text`, case-insensitively.
    async fn organizations_by_name(&self, text: &str) -> OrgdirResult<Vec<Organization>>;

    // ========================================================================
    // BUILDINGS
    // ========================================================================

    /// Every building.
    async fn buildings_all(&self) -> OrgdirResult<Vec<Building>>;

    /// Buildings inside an inclusive rectangle.
    async fn buildings_in_range(&self, bbox: &BoundingBox) -> OrgdirResult<Vec<Building>>;

    /// One page of all buildings ordered by id.
    async fn buildings_list(&self, page: Page) -> OrgdirResult<Vec<Building>>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Readiness probe.
    async fn ping(&self) -> OrgdirResult<()>;
}
