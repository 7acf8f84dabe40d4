//! Query planning and resolution.
//!
//! Every public operation validates its arguments first, then goes through
//! the result cache. On a miss the planner resolves the query against the
//! gateway, applying hierarchy expansion and geo filters as needed, and
//! returns fully assembled organizations sorted by id.

use std::future::Future;
use std::sync::Arc;

use orgdir_core::{
    validate_radius_km, Activity, ActivityId, ActivityNode, BoundingBox, Building, BuildingId,
    DirectoryEntity, EntityKind, GeoPoint, Organization, OrganizationId, OrgdirError,
    OrgdirResult, Page, ValidationError, MAX_HIERARCHY_DEPTH,
};
use orgdir_storage::{CacheNamespace, CacheStats, ResultCache, StorageGateway};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::geo::GeoFilter;
use crate::hierarchy::HierarchyIndex;
use crate::query::DirectoryQuery;

/// Default radius ceiling for radius queries, in kilometres.
pub const DEFAULT_MAX_RADIUS_KM: f64 = 100.0;

/// Limits applied while validating planner arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Closure depth used for activity-based lookups.
    pub max_depth: u32,
    pub max_radius_km: f64,
    /// Accepted length, in characters, of an organization name search.
    pub name_len: (usize, usize),
    /// Accepted length, in characters, of an activity name search.
    pub activity_name_len: (usize, usize),
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_HIERARCHY_DEPTH,
            max_radius_km: DEFAULT_MAX_RADIUS_KM,
            name_len: (1, 255),
            activity_name_len: (2, 100),
        }
    }
}

impl PlannerConfig {
    pub fn with_max_radius_km(mut self, max_radius_km: f64) -> Self {
        self.max_radius_km = max_radius_km;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth.min(MAX_HIERARCHY_DEPTH);
        self
    }
}

/// Resolves directory queries through the result cache.
#[derive(Clone)]
pub struct QueryPlanner {
    gateway: Arc<dyn StorageGateway>,
    hierarchy: HierarchyIndex,
    cache: ResultCache,
    config: PlannerConfig,
}

impl std::fmt::Debug for QueryPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPlanner")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QueryPlanner {
    pub fn new(gateway: Arc<dyn StorageGateway>, cache: ResultCache, config: PlannerConfig) -> Self {
        Self {
            hierarchy: HierarchyIndex::new(gateway.clone()),
            gateway,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached result in `namespace`.
    pub async fn invalidate(&self, namespace: CacheNamespace) -> OrgdirResult<u64> {
        self.cache.invalidate(namespace).await
    }

    /// Drop every cached result.
    pub async fn invalidate_all(&self) -> OrgdirResult<u64> {
        self.cache.invalidate_all().await
    }

    // ------------------------------------------------------------------
    // Single entities
    // ------------------------------------------------------------------

    /// Look up any addressable entity. Phones are not addressable.
    pub async fn by_id(&self, kind: EntityKind, id: i64) -> OrgdirResult<DirectoryEntity> {
        validate_id("id", id)?;
        if DirectoryQuery::by_id(kind, id).is_none() {
            return Err(ValidationError::InvalidValue {
                field: "kind".to_string(),
                reason: format!("{} is not addressable by id", kind),
            }
            .into());
        }
        match kind {
            EntityKind::Organization => self.organization(id).await.map(DirectoryEntity::Organization),
            EntityKind::Building => self.building(id).await.map(DirectoryEntity::Building),
            EntityKind::Activity => self.activity(id).await.map(DirectoryEntity::Activity),
            EntityKind::Phone => Err(OrgdirError::internal("phone lookup passed validation")),
        }
    }

    pub async fn organization(&self, id: OrganizationId) -> OrgdirResult<Organization> {
        validate_id("org_id", id)?;
        self.cached(DirectoryQuery::Organization { id }, move |planner| async move {
            planner
                .gateway
                .organization_get(id)
                .await?
                .ok_or_else(|| OrgdirError::not_found(EntityKind::Organization, id))
        })
        .await
    }

    pub async fn building(&self, id: BuildingId) -> OrgdirResult<Building> {
        validate_id("building_id", id)?;
        self.cached(DirectoryQuery::Building { id }, move |planner| async move {
            planner
                .gateway
                .building_get(id)
                .await?
                .ok_or_else(|| OrgdirError::not_found(EntityKind::Building, id))
        })
        .await
    }

    pub async fn activity(&self, id: ActivityId) -> OrgdirResult<Activity> {
        validate_id("activity_id", id)?;
        self.cached(DirectoryQuery::Activity { id }, move |planner| async move {
            planner
                .gateway
                .activity_get(id)
                .await?
                .ok_or_else(|| OrgdirError::not_found(EntityKind::Activity, id))
        })
        .await
    }

    // ------------------------------------------------------------------
    // Organization lists
    // ------------------------------------------------------------------

    /// Organizations located in a building. An unknown building yields an
    /// empty list.
    pub async fn organizations_by_building(
        &self,
        building_id: BuildingId,
        page: Page,
    ) -> OrgdirResult<Vec<Organization>> {
        validate_id("building_id", building_id)?;
        let query = DirectoryQuery::OrganizationsByBuilding { building_id, page };
        self.cached(query, move |planner| async move {
            let orgs = planner.gateway.organizations_by_building(building_id).await?;
            Ok(finalize(orgs, &page))
        })
        .await
    }

    /// Organizations tagged with the activity or any descendant within the
    /// configured depth.
    pub async fn organizations_by_activity(
        &self,
        activity_id: ActivityId,
        page: Page,
    ) -> OrgdirResult<Vec<Organization>> {
        validate_id("activity_id", activity_id)?;
        let query = DirectoryQuery::OrganizationsByActivity { activity_id, page };
        self.cached(query, move |planner| async move {
            let root = planner
                .gateway
                .activity_get(activity_id)
                .await?
                .ok_or_else(|| OrgdirError::not_found(EntityKind::Activity, activity_id))?;
            planner.organizations_under(&root, &page).await
        })
        .await
    }

    /// Organizations whose building lies inside the rectangle spanned by two
    /// corners, in any order.
    pub async fn organizations_in_rect(
        &self,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
        page: Page,
    ) -> OrgdirResult<Vec<Organization>> {
        let bbox = BoundingBox::from_coords(lat1, lon1, lat2, lon2)?;
        let query = DirectoryQuery::OrganizationsInRect { bbox, page };
        self.cached(query, move |planner| async move {
            let candidates = planner.gateway.buildings_in_range(&bbox).await?;
            let buildings = GeoFilter::filter_rect(candidates, &bbox);
            planner.organizations_in(buildings, &page).await
        })
        .await
    }

    /// Organizations whose building lies within `radius_km` of a point.
    pub async fn organizations_in_radius(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        page: Page,
    ) -> OrgdirResult<Vec<Organization>> {
        let center = GeoPoint::new(lat, lon)?;
        let radius_km = validate_radius_km(radius_km, self.config.max_radius_km)?;
        let query = DirectoryQuery::OrganizationsInRadius {
            center,
            radius_km,
            page,
        };
        self.cached(query, move |planner| async move {
            let candidates = planner.gateway.buildings_all().await?;
            let buildings = GeoFilter::filter_radius(candidates, &center, radius_km);
            planner.organizations_in(buildings, &page).await
        })
        .await
    }

    /// Case-insensitive substring search on organization names.
    pub async fn search_by_name(&self, text: &str, page: Page) -> OrgdirResult<Vec<Organization>> {
        let text = normalize_text("org_name", text, self.config.name_len)?;
        let query = DirectoryQuery::SearchByName {
            text: text.clone(),
            page,
        };
        self.cached(query, move |planner| async move {
            let orgs = planner.gateway.organizations_by_name(&text).await?;
            Ok(finalize(orgs, &page))
        })
        .await
    }

    /// Organizations under the activity that best matches `text`. No
    /// matching activity yields an empty list.
    pub async fn search_by_activity_name(
        &self,
        text: &str,
        page: Page,
    ) -> OrgdirResult<Vec<Organization>> {
        let text = normalize_text("activity_name", text, self.config.activity_name_len)?;
        let query = DirectoryQuery::SearchByActivityName {
            text: text.clone(),
            page,
        };
        self.cached(query, move |planner| async move {
            let candidates = planner.gateway.activities_by_name(&text).await?;
            match best_match(candidates, &text) {
                Some(root) => {
                    debug!(activity_id = root.id, text = %text, "resolved activity name");
                    planner.organizations_under(&root, &page).await
                }
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    pub async fn list_buildings(&self, page: Page) -> OrgdirResult<Vec<Building>> {
        self.cached(DirectoryQuery::ListBuildings { page }, move |planner| async move {
            let mut buildings = planner.gateway.buildings_list(page).await?;
            buildings.sort_by_key(|b| b.id);
            Ok(buildings)
        })
        .await
    }

    pub async fn list_activities(&self, page: Page) -> OrgdirResult<Vec<Activity>> {
        self.cached(DirectoryQuery::ListActivities { page }, move |planner| async move {
            let mut activities = planner.gateway.activities_list(page).await?;
            activities.sort_by_key(|a| a.id);
            Ok(activities)
        })
        .await
    }

    /// Nested subtree of an activity, `depth` levels deep (default and
    /// maximum 3).
    pub async fn activity_tree(
        &self,
        root_id: ActivityId,
        depth: Option<u32>,
    ) -> OrgdirResult<ActivityNode> {
        validate_id("activity_id", root_id)?;
        let depth = depth.unwrap_or(MAX_HIERARCHY_DEPTH);
        if !(1..=MAX_HIERARCHY_DEPTH).contains(&depth) {
            return Err(ValidationError::out_of_range("depth", depth, 1, MAX_HIERARCHY_DEPTH).into());
        }
        let query = DirectoryQuery::ActivityTree { root_id, depth };
        self.cached(query, move |planner| async move {
            planner
                .hierarchy
                .tree(root_id, depth)
                .await?
                .ok_or_else(|| OrgdirError::not_found(EntityKind::Activity, root_id))
        })
        .await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn cached<T, F, Fut>(&self, query: DirectoryQuery, resolve: F) -> OrgdirResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(QueryPlanner) -> Fut + Send + 'static,
        Fut: Future<Output = OrgdirResult<T>> + Send + 'static,
    {
        let fingerprint = query.fingerprint();
        let planner = self.clone();
        let read = self
            .cache
            .fetch(&fingerprint, move || resolve(planner))
            .await?;
        debug!(
            namespace = %fingerprint.namespace(),
            operation = fingerprint.operation(),
            origin = ?read.origin(),
            "query resolved"
        );
        Ok(read.into_value())
    }

    async fn organizations_under(
        &self,
        root: &Activity,
        page: &Page,
    ) -> OrgdirResult<Vec<Organization>> {
        let closure = self.hierarchy.closure_of(root, self.config.max_depth).await?;
        let mut ids: Vec<ActivityId> = closure.into_iter().collect();
        ids.sort_unstable();
        let orgs = self.gateway.organizations_by_activities(&ids).await?;
        Ok(finalize(orgs, page))
    }

    async fn organizations_in(
        &self,
        buildings: Vec<Building>,
        page: &Page,
    ) -> OrgdirResult<Vec<Organization>> {
        if buildings.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<BuildingId> = buildings.into_iter().map(|b| b.id).collect();
        ids.sort_unstable();
        ids.dedup();
        let orgs = self.gateway.organizations_by_buildings(&ids).await?;
        Ok(finalize(orgs, page))
    }
}

/// Sort by id, drop duplicates, then cut the page.
fn finalize(mut orgs: Vec<Organization>, page: &Page) -> Vec<Organization> {
    orgs.sort_by_key(|o| o.id);
    orgs.dedup_by_key(|o| o.id);
    page.apply(orgs)
}

fn validate_id(field: &str, id: i64) -> Result<i64, ValidationError> {
    if id < 1 {
        return Err(ValidationError::out_of_range(field, id, 1, i64::MAX));
    }
    Ok(id)
}

/// Trim and lowercase a search string, enforcing its length in characters.
fn normalize_text(field: &str, text: &str, (min, max): (usize, usize)) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    let len = text.chars().count();
    if len < min || len > max {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("length must be between {} and {} characters", min, max),
        });
    }
    Ok(text.to_lowercase())
}

/// Exact name first, then the shallowest level, then the shortest name,
/// then the lowest id.
fn best_match(candidates: Vec<Activity>, text: &str) -> Option<Activity> {
    candidates.into_iter().min_by_key(|a| {
        (
            a.name.to_lowercase() != text,
            a.level,
            a.name.chars().count(),
            a.id,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgdir_storage::InMemoryGateway;
    use orgdir_test_utils::fixtures;

    fn planner(gateway: Arc<InMemoryGateway>) -> QueryPlanner {
        let cache = ResultCache::with_defaults(Arc::new(orgdir_storage::InMemoryCacheBackend::new()));
        QueryPlanner::new(gateway, cache, PlannerConfig::default())
    }

    #[test]
    fn test_best_match_prefers_exact_name() {
        let candidates = vec![
            fixtures::activity(18, "Engine repair", Some(11), 3),
            fixtures::activity(16, "Engines", Some(10), 3),
            fixtures::activity(30, "Repair", Some(3), 2),
        ];
        assert_eq!(best_match(candidates, "repair").map(|a| a.id), Some(30));
    }

    #[test]
    fn test_best_match_prefers_shallow_then_short() {
        let candidates = vec![
            fixtures::activity(13, "Beef", Some(5), 3),
            fixtures::activity(5, "Meat products", Some(1), 2),
            fixtures::activity(40, "Meat", Some(1), 2),
        ];
        assert_eq!(best_match(candidates, "me").map(|a| a.id), Some(40));
        assert!(best_match(Vec::new(), "me").is_none());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("q", "  Meat Yard ", (1, 255)).expect("valid"), "meat yard");
        assert!(matches!(
            normalize_text("q", "   ", (1, 255)),
            Err(ValidationError::RequiredFieldMissing { .. })
        ));
        assert!(matches!(
            normalize_text("q", "x", (2, 100)),
            Err(ValidationError::InvalidValue { .. })
        ));
        // length counts characters, not bytes
        assert!(normalize_text("q", "Мясо", (2, 4)).is_ok());
    }

    #[test]
    fn test_finalize_sorts_dedups_and_pages() {
        let building = fixtures::reference_buildings().remove(0);
        let org = |id| Organization::assemble(
            fixtures::organization_record(id, "org", building.id),
            building.clone(),
            Vec::new(),
            Vec::new(),
        );
        let orgs = vec![org(3), org(1), org(3), org(2)];
        let page = Page::new(1, 5).expect("page");
        let ids: Vec<_> = finalize(orgs, &page).into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_phone_kind_is_rejected() {
        let gateway = Arc::new(fixtures::reference_gateway());
        let result = planner(gateway.clone()).by_id(EntityKind::Phone, 1).await;
        assert!(matches!(
            result,
            Err(OrgdirError::Validation(ValidationError::InvalidValue { .. }))
        ));
        assert_eq!(gateway.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_tree_depth_out_of_range() {
        let gateway = Arc::new(fixtures::reference_gateway());
        let result = planner(gateway.clone()).activity_tree(1, Some(4)).await;
        assert!(matches!(
            result,
            Err(OrgdirError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(gateway.total_calls(), 0);
    }
}
