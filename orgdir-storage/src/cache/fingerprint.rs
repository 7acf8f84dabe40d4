//! Canonical query fingerprints.
//!
//! A fingerprint is the namespace, the operation name and an ordered list of
//! typed parameters. The canonical encoding is length-prefixed and tagged by
//! type, so two fingerprints encode identically only when every component is
//! identical. The backend key is
//! `<prefix>:<namespace>:<operation>:<sha256 of the canonical encoding>`.
//!
//! Callers normalize parameters that denote the same logical query (rectangle
//! corners, search text) before adding them.

use std::fmt::Write as _;

use orgdir_core::ValidationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Logical group of cache entries that are invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheNamespace {
    /// Single organization lookups.
    Organization,
    /// Organization lists (by building, activity, area, name).
    Organizations,
    Building,
    Buildings,
    Activity,
    /// Activity lists and trees.
    Activities,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 6] = [
        CacheNamespace::Organization,
        CacheNamespace::Organizations,
        CacheNamespace::Building,
        CacheNamespace::Buildings,
        CacheNamespace::Activity,
        CacheNamespace::Activities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Organization => "organization",
            CacheNamespace::Organizations => "organizations",
            CacheNamespace::Building => "building",
            CacheNamespace::Buildings => "buildings",
            CacheNamespace::Activity => "activity",
            CacheNamespace::Activities => "activities",
        }
    }

    /// Key prefix covering every entry of this namespace.
    pub fn key_prefix(&self, prefix: &str) -> String {
        format!("{}:{}:", prefix, self.as_str())
    }
}

impl std::fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CacheNamespace {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheNamespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "namespace".to_string(),
                reason: format!("unknown cache namespace '{}'", s),
            })
    }
}

/// Canonical, hashable description of one logical query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFingerprint {
    namespace: CacheNamespace,
    operation: &'static str,
    canonical: String,
}

impl QueryFingerprint {
    /// Start a fingerprint for an operation within a namespace.
    pub fn new(namespace: CacheNamespace, operation: &'static str) -> Self {
        let mut canonical = String::new();
        push_text(&mut canonical, namespace.as_str());
        push_text(&mut canonical, operation);
        Self {
            namespace,
            operation,
            canonical,
        }
    }

    /// Append an integer parameter.
    pub fn int(mut self, name: &str, value: i64) -> Self {
        push_text(&mut self.canonical, name);
        let _ = write!(self.canonical, "i{};", value);
        self
    }

    /// Append a float parameter, encoded by bit pattern with `-0.0` folded
    /// into `0.0`.
    pub fn float(mut self, name: &str, value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        push_text(&mut self.canonical, name);
        let _ = write!(self.canonical, "f{:016x};", value.to_bits());
        self
    }

    /// Append a text parameter verbatim.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        push_text(&mut self.canonical, name);
        self.canonical.push('s');
        push_text(&mut self.canonical, value);
        self
    }

    /// Append an optional integer parameter.
    pub fn opt_int(mut self, name: &str, value: Option<i64>) -> Self {
        match value {
            Some(v) => self.int(name, v),
            None => {
                push_text(&mut self.canonical, name);
                self.canonical.push_str("n;");
                self
            }
        }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// The canonical encoding before hashing.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Hex SHA-256 of the canonical encoding.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.canonical.as_bytes()))
    }

    /// Backend key under the given prefix.
    pub fn key(&self, prefix: &str) -> String {
        format!(
            "{}{}:{}",
            self.namespace.key_prefix(prefix),
            self.operation,
            self.digest()
        )
    }
}

/// Length-prefixed text so no value can masquerade as a separator.
fn push_text(out: &mut String, text: &str) {
    let _ = write!(out, "{}:{};", text.len(), text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_layout() {
        let fp = QueryFingerprint::new(CacheNamespace::Organization, "get").int("id", 7);
        let key = fp.key("orgdir");
        assert!(key.starts_with("orgdir:organization:get:"));
        assert_eq!(key.len(), "orgdir:organization:get:".len() + 64);
        assert!(key.starts_with(&CacheNamespace::Organization.key_prefix("orgdir")));
    }

    #[test]
    fn test_negative_zero_folds() {
        let a = QueryFingerprint::new(CacheNamespace::Organizations, "in_radius").float("lat", 0.0);
        let b = QueryFingerprint::new(CacheNamespace::Organizations, "in_radius").float("lat", -0.0);
        assert_eq!(a.key("p"), b.key("p"));
    }

    #[test]
    fn test_text_cannot_collide_with_parameter_boundaries() {
        let a = QueryFingerprint::new(CacheNamespace::Organizations, "by_name")
            .text("a", "x;1:b;s1:y");
        let b = QueryFingerprint::new(CacheNamespace::Organizations, "by_name")
            .text("a", "x")
            .text("b", "y");
        assert_ne!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_namespaces_do_not_share_prefixes() {
        // "organization:" must not be a prefix of "organizations:" keys
        let single = CacheNamespace::Organization.key_prefix("orgdir");
        let list = QueryFingerprint::new(CacheNamespace::Organizations, "by_building")
            .int("building_id", 1)
            .key("orgdir");
        assert!(!list.starts_with(&single));
    }

    #[test]
    fn test_namespace_from_str() {
        for ns in CacheNamespace::ALL {
            assert_eq!(ns.as_str().parse::<CacheNamespace>().ok(), Some(ns));
        }
        assert!("tenants".parse::<CacheNamespace>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Identical parameters always yield the same key.
        #[test]
        fn prop_fingerprint_is_deterministic(id in any::<i64>(), lat in -90.0f64..90.0, name in ".{0,20}") {
            let build = || QueryFingerprint::new(CacheNamespace::Organizations, "op")
                .int("id", id)
                .float("lat", lat)
                .text("name", &name);
            prop_assert_eq!(build().key("p"), build().key("p"));
        }

        /// Different parameter values never share a canonical encoding.
        #[test]
        fn prop_distinct_ints_distinct_keys(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let fa = QueryFingerprint::new(CacheNamespace::Building, "get").int("id", a);
            let fb = QueryFingerprint::new(CacheNamespace::Building, "get").int("id", b);
            prop_assert_ne!(fa.key("p"), fb.key("p"));
        }

        #[test]
        fn prop_distinct_floats_distinct_keys(a in -180.0f64..180.0, b in -180.0f64..180.0) {
            prop_assume!(a != b);
            let fa = QueryFingerprint::new(CacheNamespace::Organizations, "in_rect").float("lon", a);
            let fb = QueryFingerprint::new(CacheNamespace::Organizations, "in_rect").float("lon", b);
            prop_assert_ne!(fa.canonical(), fb.canonical());
        }

        #[test]
        fn prop_distinct_text_distinct_keys(a in ".{0,12}", b in ".{0,12}") {
            prop_assume!(a != b);
            let fa = QueryFingerprint::new(CacheNamespace::Organizations, "by_name").text("q", &a);
            let fb = QueryFingerprint::new(CacheNamespace::Organizations, "by_name").text("q", &b);
            prop_assert_ne!(fa.canonical(), fb.canonical());
        }
    }
}
