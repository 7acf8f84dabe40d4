//! In-memory storage gateway.
//!
//! Tables are plain `HashMap`s behind `RwLock`s. Every gateway call is
//! counted per operation so tests can assert on round trips, and the
//! gateway can be switched into an "unavailable" state to exercise outage
//! handling.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use orgdir_core::{
    Activity, ActivityId, Building, BuildingId, BoundingBox, EntityKind, Organization,
    OrganizationId, OrganizationRecord, OrgdirError, OrgdirResult, Page, Phone, PhoneId,
    StorageError, ValidationError,
};

use crate::gateway::StorageGateway;

fn read<T>(lock: &RwLock<T>) -> OrgdirResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| OrgdirError::Storage(StorageError::LockPoisoned))
}

fn write<T>(lock: &RwLock<T>) -> OrgdirResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| OrgdirError::Storage(StorageError::LockPoisoned))
}

fn duplicate(kind: EntityKind, id: i64) -> OrgdirError {
    OrgdirError::Validation(ValidationError::InvalidValue {
        field: "id".to_string(),
        reason: format!("{} {} already exists", kind, id),
    })
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// In-memory gateway for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    buildings: Arc<RwLock<HashMap<BuildingId, Building>>>,
    activities: Arc<RwLock<HashMap<ActivityId, Activity>>>,
    organizations: Arc<RwLock<HashMap<OrganizationId, OrganizationRecord>>>,
    phones: Arc<RwLock<HashMap<PhoneId, Phone>>>,
    organization_activities: Arc<RwLock<BTreeSet<(OrganizationId, ActivityId)>>>,
    calls: Arc<Mutex<HashMap<&'static str, u64>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    // === Seeding ===

    pub fn insert_building(&self, building: Building) -> OrgdirResult<()> {
        let mut buildings = write(&self.buildings)?;
        if buildings.contains_key(&building.id) {
            return Err(duplicate(EntityKind::Building, building.id));
        }
        buildings.insert(building.id, building);
        Ok(())
    }

    pub fn insert_activity(&self, activity: Activity) -> OrgdirResult<()> {
        let mut activities = write(&self.activities)?;
        if activities.contains_key(&activity.id) {
            return Err(duplicate(EntityKind::Activity, activity.id));
        }
        activities.insert(activity.id, activity);
        Ok(())
    }

    /// Insert an organization row. The referenced building must exist.
    pub fn insert_organization(&self, record: OrganizationRecord) -> OrgdirResult<()> {
        if !read(&self.buildings)?.contains_key(&record.building_id) {
            return Err(OrgdirError::not_found(EntityKind::Building, record.building_id));
        }
        let mut organizations = write(&self.organizations)?;
        if organizations.contains_key(&record.id) {
            return Err(duplicate(EntityKind::Organization, record.id));
        }
        organizations.insert(record.id, record);
        Ok(())
    }

    /// Insert a phone. The owning organization must exist.
    pub fn insert_phone(&self, phone: Phone) -> OrgdirResult<()> {
        if !read(&self.organizations)?.contains_key(&phone.organization_id) {
            return Err(OrgdirError::not_found(
                EntityKind::Organization,
                phone.organization_id,
            ));
        }
        let mut phones = write(&self.phones)?;
        if phones.contains_key(&phone.id) {
            return Err(duplicate(EntityKind::Phone, phone.id));
        }
        phones.insert(phone.id, phone);
        Ok(())
    }

    /// Tag an organization with an activity.
    pub fn link_activity(
        &self,
        organization_id: OrganizationId,
        activity_id: ActivityId,
    ) -> OrgdirResult<()> {
        if !read(&self.organizations)?.contains_key(&organization_id) {
            return Err(OrgdirError::not_found(EntityKind::Organization, organization_id));
        }
        if !read(&self.activities)?.contains_key(&activity_id) {
            return Err(OrgdirError::not_found(EntityKind::Activity, activity_id));
        }
        write(&self.organization_activities)?.insert((organization_id, activity_id));
        Ok(())
    }

    // === Test controls ===

    /// Simulate a storage outage: every gateway call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of calls made to one gateway operation.
    pub fn calls(&self, operation: &str) -> u64 {
        self.calls
            .lock()
            .map(|calls| calls.get(operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of gateway calls across all operations.
    pub fn total_calls(&self) -> u64 {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }

    /// Forget all recorded calls.
    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn organization_count(&self) -> usize {
        self.organizations.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn activity_count(&self) -> usize {
        self.activities.read().map(|a| a.len()).unwrap_or(0)
    }

    // === Internals ===

    fn enter(&self, operation: &'static str) -> OrgdirResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(operation).or_insert(0) += 1;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OrgdirError::Storage(StorageError::Unavailable {
                reason: "in-memory gateway switched off".to_string(),
            }));
        }
        Ok(())
    }

    /// Attach building, phones and activities to organization rows.
    fn assemble<I>(&self, records: I) -> OrgdirResult<Vec<Organization>>
    where
        I: IntoIterator<Item = OrganizationRecord>,
    {
        let buildings = read(&self.buildings)?;
        let activities = read(&self.activities)?;
        let phones = read(&self.phones)?;
        let links = read(&self.organization_activities)?;

        let mut out = Vec::new();
        for record in records {
            let building = buildings.get(&record.building_id).cloned().ok_or_else(|| {
                OrgdirError::Storage(StorageError::QueryFailed {
                    reason: format!(
                        "organization {} references missing building {}",
                        record.id, record.building_id
                    ),
                })
            })?;
            let org_phones: Vec<Phone> = phones
                .values()
                .filter(|p| p.organization_id == record.id)
                .cloned()
                .collect();
            let org_activities: Vec<Activity> = links
                .range((record.id, ActivityId::MIN)..=(record.id, ActivityId::MAX))
                .filter_map(|(_, activity_id)| activities.get(activity_id).cloned())
                .collect();
            out.push(Organization::assemble(
                record,
                building,
                org_phones,
                org_activities,
            ));
        }
        out.sort_by_key(|o| o.id);
        Ok(out)
    }

    fn records_where<F>(&self, predicate: F) -> OrgdirResult<Vec<OrganizationRecord>>
    where
        F: Fn(&OrganizationRecord) -> bool,
    {
        Ok(read(&self.organizations)?
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect())
    }

    fn sorted_buildings<F>(&self, predicate: F) -> OrgdirResult<Vec<Building>>
    where
        F: Fn(&Building) -> bool,
    {
        let mut out: Vec<Building> = read(&self.buildings)?
            .values()
            .filter(|b| predicate(b))
            .cloned()
            .collect();
        out.sort_by_key(|b| b.id);
        Ok(out)
    }

    fn sorted_activities<F>(&self, predicate: F) -> OrgdirResult<Vec<Activity>>
    where
        F: Fn(&Activity) -> bool,
    {
        let mut out: Vec<Activity> = read(&self.activities)?
            .values()
            .filter(|a| predicate(a))
            .cloned()
            .collect();
        out.sort_by_key(|a| a.id);
        Ok(out)
    }
}

#[async_trait]
impl StorageGateway for InMemoryGateway {
    async fn building_get(&self, id: BuildingId) -> OrgdirResult<Option<Building>> {
        self.enter("building_get")?;
        Ok(read(&self.buildings)?.get(&id).cloned())
    }

    async fn activity_get(&self, id: ActivityId) -> OrgdirResult<Option<Activity>> {
        self.enter("activity_get")?;
        Ok(read(&self.activities)?.get(&id).cloned())
    }

    async fn organization_get(&self, id: OrganizationId) -> OrgdirResult<Option<Organization>> {
        self.enter("organization_get")?;
        let record = read(&self.organizations)?.get(&id).cloned();
        match record {
            Some(record) => Ok(self.assemble([record])?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn activity_children(&self, parent_ids: &[ActivityId]) -> OrgdirResult<Vec<Activity>> {
        self.enter("activity_children")?;
        let parents: HashSet<ActivityId> = parent_ids.iter().copied().collect();
        self.sorted_activities(|a| a.parent_id.map_or(false, |p| parents.contains(&p)))
    }

    async fn activities_by_name(&self, text: &str) -> OrgdirResult<Vec<Activity>> {
        self.enter("activities_by_name")?;
        let needle = text.to_lowercase();
        self.sorted_activities(|a| contains_ci(&a.name, &needle))
    }

    async fn activities_list(&self, page: Page) -> OrgdirResult<Vec<Activity>> {
        self.enter("activities_list")?;
        Ok(page.apply(self.sorted_activities(|_| true)?))
    }

    async fn organizations_by_building(
        &self,
        building_id: BuildingId,
    ) -> OrgdirResult<Vec<Organization>> {
        self.enter("organizations_by_building")?;
        let records = self.records_where(|r| r.building_id == building_id)?;
        self.assemble(records)
    }

    async fn organizations_by_buildings(
        &self,
        building_ids: &[BuildingId],
    ) -> OrgdirResult<Vec<Organization>> {
        self.enter("organizations_by_buildings")?;
        let wanted: HashSet<BuildingId> = building_ids.iter().copied().collect();
        let records = self.records_where(|r| wanted.contains(&r.building_id))?;
        self.assemble(records)
    }

    async fn organizations_by_activities(
        &self,
        activity_ids: &[ActivityId],
    ) -> OrgdirResult<Vec<Organization>> {
        self.enter("organizations_by_activities")?;
        let wanted: HashSet<ActivityId> = activity_ids.iter().copied().collect();
        let matching: HashSet<OrganizationId> = read(&self.organization_activities)?
            .iter()
            .filter(|(_, activity_id)| wanted.contains(activity_id))
            .map(|(organization_id, _)| *organization_id)
            .collect();
        let records = self.records_where(|r| matching.contains(&r.id))?;
        self.assemble(records)
    }

    async fn organizations_by_name(&self, text: &str) -> OrgdirResult<Vec<Organization>> {
        self.enter("organizations_by_name")?;
        let needle = text.to_lowercase();
        let records = self.records_where(|r| contains_ci(&r.name, &needle))?;
        self.assemble(records)
    }

    async fn buildings_all(&self) -> OrgdirResult<Vec<Building>> {
        self.enter("buildings_all")?;
        self.sorted_buildings(|_| true)
    }

    async fn buildings_in_range(&self, bbox: &BoundingBox) -> OrgdirResult<Vec<Building>> {
        self.enter("buildings_in_range")?;
        self.sorted_buildings(|b| bbox.contains(b.latitude, b.longitude))
    }

    async fn buildings_list(&self, page: Page) -> OrgdirResult<Vec<Building>> {
        self.enter("buildings_list")?;
        Ok(page.apply(self.sorted_buildings(|_| true)?))
    }

    async fn ping(&self) -> OrgdirResult<()> {
        self.enter("ping")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn building(id: BuildingId, latitude: f64, longitude: f64) -> Building {
        Building {
            id,
            address: format!("Street {}", id),
            latitude,
            longitude,
        }
    }

    fn activity(id: ActivityId, name: &str, parent_id: Option<ActivityId>) -> Activity {
        Activity {
            id,
            name: name.to_string(),
            category: None,
            parent_id,
            level: if parent_id.is_some() { 2 } else { 1 },
        }
    }

    fn record(id: OrganizationId, name: &str, building_id: BuildingId) -> OrganizationRecord {
        let now = Utc::now();
        OrganizationRecord {
            id,
            name: name.to_string(),
            building_id,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    fn seeded() -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        gateway.insert_building(building(1, 55.75, 37.61)).expect("building");
        gateway.insert_building(building(2, 59.93, 30.33)).expect("building");
        gateway.insert_activity(activity(1, "Food", None)).expect("activity");
        gateway.insert_activity(activity(2, "Meat", Some(1))).expect("activity");
        gateway.insert_activity(activity(3, "Dairy", Some(1))).expect("activity");
        gateway.insert_organization(record(1, "Meat Yard", 1)).expect("org");
        gateway.insert_organization(record(2, "Milk Rivers", 2)).expect("org");
        gateway
            .insert_phone(Phone { id: 1, number: "8-800".to_string(), organization_id: 1 })
            .expect("phone");
        gateway.link_activity(1, 2).expect("link");
        gateway.link_activity(2, 3).expect("link");
        gateway
    }

    #[tokio::test]
    async fn test_organization_get_is_fully_populated() {
        let gateway = seeded();
        let org = gateway
            .organization_get(1)
            .await
            .expect("get should succeed")
            .expect("org exists");
        assert_eq!(org.building.id, 1);
        assert_eq!(org.phones.len(), 1);
        assert_eq!(org.activities.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_activity_children_batches_parents() {
        let gateway = seeded();
        let children = gateway
            .activity_children(&[1, 2])
            .await
            .expect("children should succeed");
        assert_eq!(children.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(gateway.calls("activity_children"), 1);
    }

    #[tokio::test]
    async fn test_name_search_is_case_insensitive() {
        let gateway = seeded();
        let orgs = gateway.organizations_by_name("mILK").await.expect("search");
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].id, 2);

        let activities = gateway.activities_by_name("EAT").await.expect("search");
        assert_eq!(activities.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_buildings_in_range() {
        let gateway = seeded();
        let bbox = BoundingBox::from_coords(55.0, 37.0, 56.0, 38.0).expect("bbox");
        let buildings = gateway.buildings_in_range(&bbox).await.expect("range");
        assert_eq!(buildings.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let gateway = seeded();
        gateway.set_unavailable(true);
        let err = gateway.ping().await.expect_err("ping should fail");
        assert!(matches!(err, OrgdirError::Storage(StorageError::Unavailable { .. })));

        gateway.set_unavailable(false);
        assert!(gateway.ping().await.is_ok());
        assert_eq!(gateway.calls("ping"), 2);
    }

    #[test]
    fn test_insert_rejects_dangling_references() {
        let gateway = seeded();
        assert!(gateway.insert_organization(record(9, "Ghost", 99)).is_err());
        assert!(gateway.link_activity(1, 99).is_err());
        assert!(gateway.insert_building(building(1, 0.0, 0.0)).is_err());
    }
}
