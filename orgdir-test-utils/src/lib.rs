//! Orgdir Test Utilities
//!
//! Centralized test infrastructure for the orgdir workspace:
//! - Proptest generators for coordinates, buildings and activity forests
//! - Fixtures, including the reference directory dataset
//! - Custom assertions for directory-specific errors

// Re-export the in-memory gateway from its source crate
pub use orgdir_storage::InMemoryGateway;

// Re-export core types for convenience
pub use orgdir_core::{
    Activity, ActivityId, Building, BuildingId, BoundingBox, EntityKind, GeoPoint, Organization,
    OrganizationId, OrganizationRecord, OrgdirError, OrgdirResult, Page, Phone, StorageError,
    Timestamp, ValidationError,
};

use chrono::Utc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for directory types.

    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    /// Generate a valid latitude.
    pub fn arb_latitude() -> impl Strategy<Value = f64> {
        -90.0f64..=90.0
    }

    /// Generate a valid longitude.
    pub fn arb_longitude() -> impl Strategy<Value = f64> {
        -180.0f64..=180.0
    }

    /// Generate a validated point.
    pub fn arb_geo_point() -> impl Strategy<Value = GeoPoint> {
        (arb_latitude(), arb_longitude()).prop_map(|(latitude, longitude)| GeoPoint {
            latitude,
            longitude,
        })
    }

    /// Generate a point near Moscow, where the reference buildings are.
    pub fn arb_moscow_point() -> impl Strategy<Value = GeoPoint> {
        (55.0f64..=56.5, 36.5f64..=38.5).prop_map(|(latitude, longitude)| GeoPoint {
            latitude,
            longitude,
        })
    }

    /// Generate `count` buildings with ids `1..=count`.
    pub fn arb_buildings(count: usize) -> impl Strategy<Value = Vec<Building>> {
        prop::collection::vec(arb_moscow_point(), count).prop_map(|points| {
            points
                .into_iter()
                .enumerate()
                .map(|(i, p)| fixtures::building(i as BuildingId + 1, p.latitude, p.longitude))
                .collect()
        })
    }

    /// Generate an activity forest of up to `max_nodes` nodes.
    ///
    /// Node `i` (id `i + 1`) is either a root or a child of an earlier node,
    /// so the parent relation is acyclic and levels are consistent.
    pub fn arb_activity_forest(max_nodes: usize) -> impl Strategy<Value = Vec<Activity>> {
        prop::collection::vec(prop::option::weighted(0.8, any::<Index>()), 1..=max_nodes)
            .prop_map(|choices| {
                let mut forest: Vec<Activity> = Vec::with_capacity(choices.len());
                for (i, choice) in choices.into_iter().enumerate() {
                    let parent = match choice {
                        Some(index) if i > 0 => Some(&forest[index.index(i)]),
                        _ => None,
                    };
                    let id = i as ActivityId + 1;
                    let (parent_id, level) = match parent {
                        Some(p) => (Some(p.id), p.level + 1),
                        None => (None, 1),
                    };
                    forest.push(fixtures::activity(id, &format!("activity {}", id), parent_id, level));
                }
                forest
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures, including the reference directory dataset.

    use super::*;

    /// Center of Moscow, the location of building 1.
    pub const MOSCOW_CENTER: (f64, f64) = (55.7558, 37.6173);

    pub fn building(id: BuildingId, latitude: f64, longitude: f64) -> Building {
        Building {
            id,
            address: format!("Building {}", id),
            latitude,
            longitude,
        }
    }

    pub fn activity(
        id: ActivityId,
        name: &str,
        parent_id: Option<ActivityId>,
        level: i32,
    ) -> Activity {
        Activity {
            id,
            name: name.to_string(),
            category: None,
            parent_id,
            level,
        }
    }

    pub fn organization_record(
        id: OrganizationId,
        name: &str,
        building_id: BuildingId,
    ) -> OrganizationRecord {
        let now = Utc::now();
        OrganizationRecord {
            id,
            name: name.to_string(),
            building_id,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Reference buildings.
    pub fn reference_buildings() -> Vec<Building> {
        vec![
            Building {
                id: 1,
                address: "Moscow, Lenina st. 1, office 3".to_string(),
                latitude: 55.7558,
                longitude: 37.6173,
            },
            Building {
                id: 2,
                address: "Moscow, Blyukhera st. 32/1".to_string(),
                latitude: 55.7625,
                longitude: 37.6163,
            },
            Building {
                id: 3,
                address: "Saint Petersburg, Nevsky pr. 28".to_string(),
                latitude: 59.9343,
                longitude: 30.3351,
            },
            Building {
                id: 4,
                address: "Kazan, Baumana st. 15".to_string(),
                latitude: 55.7964,
                longitude: 49.1088,
            },
            Building {
                id: 5,
                address: "Sochi, Navaginskaya st. 9".to_string(),
                latitude: 43.5855,
                longitude: 39.7231,
            },
        ]
    }

    /// Reference three-level activity taxonomy.
    pub fn reference_activities() -> Vec<Activity> {
        let rows: [(ActivityId, &str, &str, Option<ActivityId>, i32); 19] = [
            (1, "Food", "food", None, 1),
            (2, "Automobiles", "auto", None, 1),
            (3, "Services", "services", None, 1),
            (4, "Construction", "construction", None, 1),
            (5, "Meat products", "meat", Some(1), 2),
            (6, "Dairy products", "dairy", Some(1), 2),
            (7, "Fruit and vegetables", "vegetables", Some(1), 2),
            (8, "Trucks", "trucks", Some(2), 2),
            (9, "Passenger cars", "cars", Some(2), 2),
            (10, "Spare parts", "parts", Some(2), 2),
            (11, "Repair", "repair", Some(3), 2),
            (12, "Maintenance", "maintenance", Some(3), 2),
            (13, "Beef", "beef", Some(5), 3),
            (14, "Pork", "pork", Some(5), 3),
            (15, "Poultry", "poultry", Some(5), 3),
            (16, "Engines", "engine", Some(10), 3),
            (17, "Brakes", "brakes", Some(10), 3),
            (18, "Engine repair", "engine_repair", Some(11), 3),
            (19, "Body repair", "body_repair", Some(11), 3),
        ];
        rows.into_iter()
            .map(|(id, name, category, parent_id, level)| Activity {
                id,
                name: name.to_string(),
                category: Some(category.to_string()),
                parent_id,
                level,
            })
            .collect()
    }

    /// Reference organizations as `(id, name, building_id)`.
    pub const REFERENCE_ORGANIZATIONS: [(OrganizationId, &str, BuildingId); 8] = [
        (1, "Horns and Hooves LLC", 2),
        (2, "Meat Yard", 1),
        (3, "Milk Rivers", 1),
        (4, "AutoCargo", 3),
        (5, "EasyAuto", 3),
        (6, "Farm Vegetables", 4),
        (7, "EngineService", 5),
        (8, "Body Center", 5),
    ];

    /// Reference phones as `(id, number, organization_id)`.
    pub const REFERENCE_PHONES: [(i64, &str, OrganizationId); 10] = [
        (1, "2-222-222", 1),
        (2, "3-333-333", 1),
        (3, "8-923-666-13-13", 1),
        (4, "8-495-111-22-33", 2),
        (5, "8-495-444-55-66", 3),
        (6, "8-812-777-88-99", 4),
        (7, "8-812-123-45-67", 5),
        (8, "8-843-555-11-22", 6),
        (9, "8-862-333-44-55", 7),
        (10, "8-862-987-65-43", 8),
    ];

    /// Reference organization/activity tags.
    pub const REFERENCE_TAGS: [(OrganizationId, ActivityId); 13] = [
        (1, 2),
        (1, 10),
        (1, 16),
        (2, 5),
        (2, 13),
        (2, 14),
        (3, 6),
        (4, 8),
        (5, 9),
        (5, 17),
        (6, 7),
        (7, 18),
        (8, 19),
    ];

    /// Gateway loaded with the reference directory dataset.
    pub fn reference_gateway() -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        for b in reference_buildings() {
            gateway.insert_building(b).expect("seed building");
        }
        for a in reference_activities() {
            gateway.insert_activity(a).expect("seed activity");
        }
        for (id, name, building_id) in REFERENCE_ORGANIZATIONS {
            gateway
                .insert_organization(organization_record(id, name, building_id))
                .expect("seed organization");
        }
        for (id, number, organization_id) in REFERENCE_PHONES {
            gateway
                .insert_phone(Phone {
                    id,
                    number: number.to_string(),
                    organization_id,
                })
                .expect("seed phone");
        }
        for (organization_id, activity_id) in REFERENCE_TAGS {
            gateway
                .link_activity(organization_id, activity_id)
                .expect("seed tag");
        }
        gateway
    }

    /// Gateway holding a single chain `1 -> 2 -> ... -> len` of activities.
    pub fn chain_gateway(len: i64) -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        for id in 1..=len {
            let parent = if id == 1 { None } else { Some(id - 1) };
            gateway
                .insert_activity(activity(id, &format!("level {}", id), parent, id as i32))
                .expect("seed chain");
        }
        gateway
    }

    /// Gateway holding an arbitrary set of activities.
    pub fn forest_gateway(activities: &[Activity]) -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        for a in activities {
            gateway.insert_activity(a.clone()).expect("seed forest");
        }
        gateway
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for directory results.

    use super::*;

    /// Ids of a list of organizations, in order.
    pub fn org_ids(orgs: &[Organization]) -> Vec<OrganizationId> {
        orgs.iter().map(|o| o.id).collect()
    }

    /// Assert that a result is a NotFound storage error for `kind`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &OrgdirResult<T>, kind: EntityKind) {
        match result {
            Err(OrgdirError::Storage(StorageError::NotFound { kind: k, .. })) => {
                assert_eq!(*k, kind, "Wrong entity kind in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", kind, other),
        }
    }

    /// Assert that a result is a validation error on `field`.
    #[track_caller]
    pub fn assert_invalid_argument<T: std::fmt::Debug>(result: &OrgdirResult<T>, field: &str) {
        match result {
            Err(OrgdirError::Validation(err)) => {
                assert_eq!(err.field(), field, "Wrong field in validation error");
            }
            other => panic!("Expected validation error on {}, got: {:?}", field, other),
        }
    }

    /// Assert that a result is a storage outage.
    #[track_caller]
    pub fn assert_storage_unavailable<T: std::fmt::Debug>(result: &OrgdirResult<T>) {
        match result {
            Err(OrgdirError::Storage(StorageError::Unavailable { .. })) => {}
            other => panic!("Expected StorageUnavailable, got: {:?}", other),
        }
    }
}
