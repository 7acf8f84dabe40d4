//! PostgreSQL Storage Gateway
//!
//! `PgGateway` implements `StorageGateway` over a deadpool-postgres pool.
//! Every organization lookup assembles the full aggregate eagerly: one query
//! for the organization rows, then one batched `= ANY($1)` query each for
//! buildings, phones and activity tags.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use orgdir_core::{
    Activity, ActivityId, BoundingBox, Building, BuildingId, ConfigError, Organization,
    OrganizationId, OrganizationRecord, OrgdirError, OrgdirResult, Page, Phone, StorageError,
};
use orgdir_storage::StorageGateway;
use tokio::sync::OnceCell;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

use crate::config::env_or;
use crate::telemetry::METRICS;

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database configuration for the connection pool.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout when acquiring a connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "orgdir".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a database configuration from environment variables.
    ///
    /// `ORGDIR_DATABASE_URL`, or `ORGDIR_DB_HOST`, `ORGDIR_DB_PORT`,
    /// `ORGDIR_DB_NAME`, `ORGDIR_DB_USER`, `ORGDIR_DB_PASSWORD`; plus
    /// `ORGDIR_DB_POOL_SIZE` and `ORGDIR_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            url: std::env::var("ORGDIR_DATABASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            host: env_or("ORGDIR_DB_HOST", defaults.host)?,
            port: env_or("ORGDIR_DB_PORT", defaults.port)?,
            dbname: env_or("ORGDIR_DB_NAME", defaults.dbname)?,
            user: env_or("ORGDIR_DB_USER", defaults.user)?,
            password: std::env::var("ORGDIR_DB_PASSWORD").unwrap_or_default(),
            max_size: env_or("ORGDIR_DB_POOL_SIZE", defaults.max_size)?,
            timeout: Duration::from_secs(env_or("ORGDIR_DB_TIMEOUT", defaults.timeout.as_secs())?),
        })
    }

    /// Create a connection pool from this configuration.
    ///
    /// Connections are opened lazily, so this succeeds without a reachable
    /// database.
    pub fn create_pool(&self) -> Result<Pool, ConfigError> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ConfigError::InvalidValue {
                field: "database".to_string(),
                value: self.url.clone().unwrap_or_else(|| format!("{}:{}", self.host, self.port)),
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pool_error(err: deadpool_postgres::PoolError) -> OrgdirError {
    tracing::error!(error = ?err, "Connection pool error");
    StorageError::Unavailable {
        reason: err.to_string(),
    }
    .into()
}

fn query_error(err: tokio_postgres::Error) -> OrgdirError {
    tracing::error!(error = ?err, "Database error");
    // Anything without a server-side error is a transport or connection failure
    if err.as_db_error().is_none() {
        StorageError::Unavailable {
            reason: err.to_string(),
        }
        .into()
    } else {
        StorageError::QueryFailed {
            reason: err.to_string(),
        }
        .into()
    }
}

fn column<'a, T>(row: &'a Row, idx: usize) -> OrgdirResult<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(idx).map_err(|e| {
        StorageError::QueryFailed {
            reason: format!("column {}: {}", idx, e),
        }
        .into()
    })
}

/// Escape `LIKE` wildcards so user text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const BUILDING_COLUMNS: &str =
    "b.id::bigint, b.address, b.latitude::float8, b.longitude::float8";
const ACTIVITY_COLUMNS: &str =
    "a.id::bigint, a.name, a.category, a.parent_id::bigint, a.level::int4";
const ORGANIZATION_KEY_COLUMNS: &str = "o.id::bigint, o.name, o.building_id::bigint";
const TIMESTAMP_COLUMNS: [&str; 2] = ["created_at", "updated_at"];

/// Organization select list for a table carrying `present` of the timestamp
/// columns. Missing timestamps are read as NULL.
fn organization_columns(present: &[String]) -> String {
    let mut columns = ORGANIZATION_KEY_COLUMNS.to_string();
    for name in TIMESTAMP_COLUMNS {
        if present.iter().any(|p| p == name) {
            columns.push_str(&format!(", o.{}::timestamptz", name));
        } else {
            columns.push_str(", NULL::timestamptz");
        }
    }
    columns
}

fn building_from_row(row: &Row) -> OrgdirResult<Building> {
    Ok(Building {
        id: column(row, 0)?,
        address: column(row, 1)?,
        latitude: column(row, 2)?,
        longitude: column(row, 3)?,
    })
}

fn activity_from_row(row: &Row, offset: usize) -> OrgdirResult<Activity> {
    Ok(Activity {
        id: column(row, offset)?,
        name: column(row, offset + 1)?,
        category: column(row, offset + 2)?,
        parent_id: column(row, offset + 3)?,
        level: column(row, offset + 4)?,
    })
}

fn record_from_row(row: &Row) -> OrgdirResult<OrganizationRecord> {
    Ok(OrganizationRecord {
        id: column(row, 0)?,
        name: column(row, 1)?,
        building_id: column(row, 2)?,
        created_at: column(row, 3)?,
        updated_at: column(row, 4)?,
    })
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Storage gateway backed by PostgreSQL.
#[derive(Clone)]
pub struct PgGateway {
    pool: Pool,
    /// Resolved on first use from `information_schema`.
    organization_columns: Arc<OnceCell<String>>,
}

impl std::fmt::Debug for PgGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgGateway")
            .field("pool_size", &self.pool.status().size)
            .finish()
    }
}

impl PgGateway {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            organization_columns: Arc::new(OnceCell::new()),
        }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Run one query, recording its latency under `operation`.
    async fn query(
        &self,
        operation: &'static str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrgdirResult<Vec<Row>> {
        let start = Instant::now();
        let result = async {
            let conn = self.pool.get().await.map_err(pool_error)?;
            conn.query(sql, params).await.map_err(query_error)
        }
        .await;
        if let Ok(metrics) = METRICS.as_ref() {
            metrics.record_db_operation(operation, result.is_ok(), start.elapsed().as_secs_f64());
        }
        result
    }

    async fn buildings_where(
        &self,
        operation: &'static str,
        clause: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrgdirResult<Vec<Building>> {
        let sql = format!(
            "SELECT {} FROM buildings b {}",
            BUILDING_COLUMNS, clause
        );
        self.query(operation, &sql, params)
            .await?
            .iter()
            .map(building_from_row)
            .collect()
    }

    async fn activities_where(
        &self,
        operation: &'static str,
        clause: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrgdirResult<Vec<Activity>> {
        let sql = format!(
            "SELECT {} FROM activities a {}",
            ACTIVITY_COLUMNS, clause
        );
        self.query(operation, &sql, params)
            .await?
            .iter()
            .map(|row| activity_from_row(row, 0))
            .collect()
    }

    /// Select list for `organizations`, adapted to the timestamp columns the
    /// table actually has.
    async fn organization_select(&self) -> OrgdirResult<&str> {
        let columns = self
            .organization_columns
            .get_or_try_init(move || async move {
                let wanted: Vec<&str> = TIMESTAMP_COLUMNS.to_vec();
                let rows = self
                    .query(
                        "organization_schema",
                        "SELECT column_name::text FROM information_schema.columns \
                         WHERE table_schema = current_schema() \
                         AND table_name = 'organizations' \
                         AND column_name = ANY($1::text[])",
                        &[&wanted],
                    )
                    .await?;
                let present = rows
                    .iter()
                    .map(|row| column::<String>(row, 0))
                    .collect::<OrgdirResult<Vec<_>>>()?;
                if present.len() < TIMESTAMP_COLUMNS.len() {
                    tracing::warn!(
                        present = ?present,
                        "organizations table lacks timestamp columns, reading them as null"
                    );
                }
                Ok::<_, OrgdirError>(organization_columns(&present))
            })
            .await?;
        Ok(columns.as_str())
    }

    async fn organizations_where(
        &self,
        operation: &'static str,
        clause: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrgdirResult<Vec<Organization>> {
        let sql = format!(
            "SELECT {} FROM organizations o {} ORDER BY o.id",
            self.organization_select().await?,
            clause
        );
        let records = self
            .query(operation, &sql, params)
            .await?
            .iter()
            .map(record_from_row)
            .collect::<OrgdirResult<Vec<_>>>()?;
        self.assemble(records).await
    }

    /// Attach building, phones and activities to organization rows.
    async fn assemble(&self, records: Vec<OrganizationRecord>) -> OrgdirResult<Vec<Organization>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let org_ids: Vec<OrganizationId> = records.iter().map(|r| r.id).collect();
        let mut building_ids: Vec<BuildingId> = records.iter().map(|r| r.building_id).collect();
        building_ids.sort_unstable();
        building_ids.dedup();

        let buildings: HashMap<BuildingId, Building> = self
            .buildings_where("assemble_buildings", "WHERE b.id = ANY($1::bigint[]) ORDER BY b.id", &[&building_ids])
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        let mut phones: HashMap<OrganizationId, Vec<Phone>> = HashMap::new();
        let phone_rows = self
            .query(
                "assemble_phones",
                "SELECT p.id::bigint, p.number, p.organization_id::bigint FROM phones p \
                 WHERE p.organization_id = ANY($1::bigint[]) ORDER BY p.id",
                &[&org_ids],
            )
            .await?;
        for row in &phone_rows {
            let phone = Phone {
                id: column(row, 0)?,
                number: column(row, 1)?,
                organization_id: column(row, 2)?,
            };
            phones.entry(phone.organization_id).or_default().push(phone);
        }

        let mut activities: HashMap<OrganizationId, Vec<Activity>> = HashMap::new();
        let tag_sql = format!(
            "SELECT oa.organization_id::bigint, {} FROM organization_activity oa \
             JOIN activities a ON a.id = oa.activity_id \
             WHERE oa.organization_id = ANY($1::bigint[]) ORDER BY a.id",
            ACTIVITY_COLUMNS
        );
        for row in &self.query("assemble_activities", &tag_sql, &[&org_ids]).await? {
            let organization_id: OrganizationId = column(row, 0)?;
            activities
                .entry(organization_id)
                .or_default()
                .push(activity_from_row(row, 1)?);
        }

        records
            .into_iter()
            .map(|record| {
                let building = buildings.get(&record.building_id).cloned().ok_or_else(|| {
                    OrgdirError::from(StorageError::QueryFailed {
                        reason: format!(
                            "organization {} references missing building {}",
                            record.id, record.building_id
                        ),
                    })
                })?;
                let org_phones = phones.remove(&record.id).unwrap_or_default();
                let org_activities = activities.remove(&record.id).unwrap_or_default();
                Ok(Organization::assemble(record, building, org_phones, org_activities))
            })
            .collect()
    }
}

#[async_trait]
impl StorageGateway for PgGateway {
    async fn building_get(&self, id: BuildingId) -> OrgdirResult<Option<Building>> {
        Ok(self
            .buildings_where("building_get", "WHERE b.id = $1::bigint ORDER BY b.id", &[&id])
            .await?
            .into_iter()
            .next())
    }

    async fn activity_get(&self, id: ActivityId) -> OrgdirResult<Option<Activity>> {
        Ok(self
            .activities_where("activity_get", "WHERE a.id = $1::bigint ORDER BY a.id", &[&id])
            .await?
            .into_iter()
            .next())
    }

    async fn organization_get(&self, id: OrganizationId) -> OrgdirResult<Option<Organization>> {
        Ok(self
            .organizations_where("organization_get", "WHERE o.id = $1::bigint", &[&id])
            .await?
            .into_iter()
            .next())
    }

    async fn activity_children(&self, parent_ids: &[ActivityId]) -> OrgdirResult<Vec<Activity>> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.activities_where(
            "activity_children",
            "WHERE a.parent_id = ANY($1::bigint[]) ORDER BY a.id",
            &[&parent_ids],
        )
        .await
    }

    async fn activities_by_name(&self, text: &str) -> OrgdirResult<Vec<Activity>> {
        let pattern = escape_like(text);
        self.activities_where(
            "activities_by_name",
            "WHERE a.name ILIKE '%' || $1::text || '%' ESCAPE '\\' ORDER BY a.id",
            &[&pattern],
        )
        .await
    }

    async fn activities_list(&self, page: Page) -> OrgdirResult<Vec<Activity>> {
        let (skip, limit) = (page.skip(), page.limit());
        self.activities_where(
            "activities_list",
            "ORDER BY a.id OFFSET $1::bigint LIMIT $2::bigint",
            &[&skip, &limit],
        )
        .await
    }

    async fn organizations_by_building(
        &self,
        building_id: BuildingId,
    ) -> OrgdirResult<Vec<Organization>> {
        self.organizations_where(
            "organizations_by_building",
            "WHERE o.building_id = $1::bigint",
            &[&building_id],
        )
        .await
    }

    async fn organizations_by_buildings(
        &self,
        building_ids: &[BuildingId],
    ) -> OrgdirResult<Vec<Organization>> {
        if building_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.organizations_where(
            "organizations_by_buildings",
            "WHERE o.building_id = ANY($1::bigint[])",
            &[&building_ids],
        )
        .await
    }

    async fn organizations_by_activities(
        &self,
        activity_ids: &[ActivityId],
    ) -> OrgdirResult<Vec<Organization>> {
        if activity_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.organizations_where(
            "organizations_by_activities",
            "WHERE o.id IN (SELECT oa.organization_id FROM organization_activity oa \
             WHERE oa.activity_id = ANY($1::bigint[]))",
            &[&activity_ids],
        )
        .await
    }

    async fn organizations_by_name(&self, text: &str) -> OrgdirResult<Vec<Organization>> {
        let pattern = escape_like(text);
        self.organizations_where(
            "organizations_by_name",
            "WHERE o.name ILIKE '%' || $1::text || '%' ESCAPE '\\'",
            &[&pattern],
        )
        .await
    }

    async fn buildings_all(&self) -> OrgdirResult<Vec<Building>> {
        self.buildings_where("buildings_all", "ORDER BY b.id", &[]).await
    }

    async fn buildings_in_range(&self, bbox: &BoundingBox) -> OrgdirResult<Vec<Building>> {
        self.buildings_where(
            "buildings_in_range",
            "WHERE b.latitude BETWEEN $1::float8 AND $2::float8 \
             AND b.longitude BETWEEN $3::float8 AND $4::float8 ORDER BY b.id",
            &[&bbox.min_lat, &bbox.max_lat, &bbox.min_lon, &bbox.max_lon],
        )
        .await
    }

    async fn buildings_list(&self, page: Page) -> OrgdirResult<Vec<Building>> {
        let (skip, limit) = (page.skip(), page.limit());
        self.buildings_where(
            "buildings_list",
            "ORDER BY b.id OFFSET $1::bigint LIMIT $2::bigint",
            &[&skip, &limit],
        )
        .await
    }

    async fn ping(&self) -> OrgdirResult<()> {
        self.query("ping", "SELECT 1", &[]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("meat"), "meat");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.max_size, 16);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.url.is_none());
    }

    #[tokio::test]
    async fn test_pool_creation_is_lazy() {
        let config = DbConfig {
            port: 1,
            timeout: Duration::from_millis(200),
            ..DbConfig::default()
        };
        let gateway = PgGateway::from_config(&config).expect("pool builds without a server");
        assert_eq!(gateway.pool_size(), 0);
    }

    #[test]
    fn test_organization_columns_follow_table_shape() {
        let full = organization_columns(&["created_at".to_string(), "updated_at".to_string()]);
        assert!(full.ends_with("o.created_at::timestamptz, o.updated_at::timestamptz"));

        let bare = organization_columns(&[]);
        assert_eq!(
            bare,
            "o.id::bigint, o.name, o.building_id::bigint, NULL::timestamptz, NULL::timestamptz"
        );

        let partial = organization_columns(&["updated_at".to_string()]);
        assert!(partial.ends_with("NULL::timestamptz, o.updated_at::timestamptz"));
    }

    proptest! {
        #[test]
        fn escaped_text_has_no_bare_wildcards(text in ".{0,40}") {
            let escaped = escape_like(&text);
            let mut chars = escaped.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    prop_assert!(matches!(chars.next(), Some('\\' | '%' | '_')));
                } else {
                    prop_assert!(c != '%' && c != '_');
                }
            }
        }
    }
}
