//! Validated query shapes and their cache fingerprints.
//!
//! A `DirectoryQuery` is only built from already validated and normalized
//! arguments, so two values that denote the same logical query compare and
//! fingerprint equal.

use orgdir_core::{
    ActivityId, BoundingBox, BuildingId, EntityKind, GeoPoint, OrganizationId, Page,
};
use orgdir_storage::{CacheNamespace, QueryFingerprint};

/// One resolvable directory query.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryQuery {
    Organization {
        id: OrganizationId,
    },
    Building {
        id: BuildingId,
    },
    Activity {
        id: ActivityId,
    },
    OrganizationsByBuilding {
        building_id: BuildingId,
        page: Page,
    },
    OrganizationsByActivity {
        activity_id: ActivityId,
        page: Page,
    },
    OrganizationsInRect {
        bbox: BoundingBox,
        page: Page,
    },
    OrganizationsInRadius {
        center: GeoPoint,
        radius_km: f64,
        page: Page,
    },
    /// `text` is trimmed and lowercased.
    SearchByName {
        text: String,
        page: Page,
    },
    /// `text` is trimmed and lowercased.
    SearchByActivityName {
        text: String,
        page: Page,
    },
    ListBuildings {
        page: Page,
    },
    ListActivities {
        page: Page,
    },
    ActivityTree {
        root_id: ActivityId,
        depth: u32,
    },
}

impl DirectoryQuery {
    /// Single-entity lookup for a kind, if that kind is addressable.
    pub fn by_id(kind: EntityKind, id: i64) -> Option<Self> {
        match kind {
            EntityKind::Organization => Some(DirectoryQuery::Organization { id }),
            EntityKind::Building => Some(DirectoryQuery::Building { id }),
            EntityKind::Activity => Some(DirectoryQuery::Activity { id }),
            EntityKind::Phone => None,
        }
    }

    /// Cache namespace the result belongs to.
    pub fn namespace(&self) -> CacheNamespace {
        match self {
            DirectoryQuery::Organization { .. } => CacheNamespace::Organization,
            DirectoryQuery::Building { .. } => CacheNamespace::Building,
            DirectoryQuery::Activity { .. } => CacheNamespace::Activity,
            DirectoryQuery::OrganizationsByBuilding { .. }
            | DirectoryQuery::OrganizationsByActivity { .. }
            | DirectoryQuery::OrganizationsInRect { .. }
            | DirectoryQuery::OrganizationsInRadius { .. }
            | DirectoryQuery::SearchByName { .. }
            | DirectoryQuery::SearchByActivityName { .. } => CacheNamespace::Organizations,
            DirectoryQuery::ListBuildings { .. } => CacheNamespace::Buildings,
            DirectoryQuery::ListActivities { .. } | DirectoryQuery::ActivityTree { .. } => {
                CacheNamespace::Activities
            }
        }
    }

    /// Stable operation name, used in cache keys and logs.
    pub fn operation(&self) -> &'static str {
        match self {
            DirectoryQuery::Organization { .. }
            | DirectoryQuery::Building { .. }
            | DirectoryQuery::Activity { .. } => "get",
            DirectoryQuery::OrganizationsByBuilding { .. } => "by_building",
            DirectoryQuery::OrganizationsByActivity { .. } => "by_activity",
            DirectoryQuery::OrganizationsInRect { .. } => "in_rect",
            DirectoryQuery::OrganizationsInRadius { .. } => "in_radius",
            DirectoryQuery::SearchByName { .. } => "by_name",
            DirectoryQuery::SearchByActivityName { .. } => "by_activity_name",
            DirectoryQuery::ListBuildings { .. } | DirectoryQuery::ListActivities { .. } => "list",
            DirectoryQuery::ActivityTree { .. } => "tree",
        }
    }

    /// Canonical fingerprint of this query.
    pub fn fingerprint(&self) -> QueryFingerprint {
        let fp = QueryFingerprint::new(self.namespace(), self.operation());
        match self {
            DirectoryQuery::Organization { id }
            | DirectoryQuery::Building { id }
            | DirectoryQuery::Activity { id } => fp.int("id", *id),
            DirectoryQuery::OrganizationsByBuilding { building_id, page } => {
                with_page(fp.int("building_id", *building_id), page)
            }
            DirectoryQuery::OrganizationsByActivity { activity_id, page } => {
                with_page(fp.int("activity_id", *activity_id), page)
            }
            DirectoryQuery::OrganizationsInRect { bbox, page } => with_page(
                fp.float("min_lat", bbox.min_lat)
                    .float("max_lat", bbox.max_lat)
                    .float("min_lon", bbox.min_lon)
                    .float("max_lon", bbox.max_lon),
                page,
            ),
            DirectoryQuery::OrganizationsInRadius {
                center,
                radius_km,
                page,
            } => with_page(
                fp.float("lat", center.latitude)
                    .float("lon", center.longitude)
                    .float("radius_km", *radius_km),
                page,
            ),
            DirectoryQuery::SearchByName { text, page }
            | DirectoryQuery::SearchByActivityName { text, page } => {
                with_page(fp.text("text", text), page)
            }
            DirectoryQuery::ListBuildings { page } | DirectoryQuery::ListActivities { page } => {
                with_page(fp, page)
            }
            DirectoryQuery::ActivityTree { root_id, depth } => {
                fp.int("root_id", *root_id).int("depth", i64::from(*depth))
            }
        }
    }
}

fn with_page(fp: QueryFingerprint, page: &Page) -> QueryFingerprint {
    fp.int("skip", page.skip()).int("limit", page.limit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapped_rect_corners_share_fingerprint() {
        let a = BoundingBox::from_coords(55.9, 37.9, 55.5, 37.3).expect("bbox");
        let b = BoundingBox::from_coords(55.5, 37.3, 55.9, 37.9).expect("bbox");
        let qa = DirectoryQuery::OrganizationsInRect { bbox: a, page: Page::default() };
        let qb = DirectoryQuery::OrganizationsInRect { bbox: b, page: Page::default() };
        assert_eq!(qa.fingerprint().key("p"), qb.fingerprint().key("p"));
    }

    #[test]
    fn test_page_is_part_of_fingerprint() {
        let first = DirectoryQuery::ListBuildings { page: Page::new(0, 10).expect("page") };
        let second = DirectoryQuery::ListBuildings { page: Page::new(10, 10).expect("page") };
        assert_ne!(first.fingerprint().key("p"), second.fingerprint().key("p"));
    }

    #[test]
    fn test_same_id_different_kind_differs() {
        let org = DirectoryQuery::Organization { id: 1 };
        let building = DirectoryQuery::Building { id: 1 };
        assert_ne!(org.fingerprint().key("p"), building.fingerprint().key("p"));
        assert_eq!(org.namespace(), CacheNamespace::Organization);
    }

    #[test]
    fn test_name_searches_do_not_collide() {
        let by_name = DirectoryQuery::SearchByName { text: "meat".into(), page: Page::default() };
        let by_activity = DirectoryQuery::SearchByActivityName {
            text: "meat".into(),
            page: Page::default(),
        };
        assert_ne!(by_name.fingerprint().key("p"), by_activity.fingerprint().key("p"));
    }

    #[test]
    fn test_phones_are_not_addressable() {
        assert!(DirectoryQuery::by_id(EntityKind::Phone, 1).is_none());
        assert_eq!(
            DirectoryQuery::by_id(EntityKind::Activity, 3),
            Some(DirectoryQuery::Activity { id: 3 })
        );
    }
}
