//! Core domain types for the kubepath attack graph.
//!
//! Assets are the nodes of the graph, attack edges the directed
//! relationships between them. Both are shared by the builder, the graph
//! stores, and the path search engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KubepathError;
use crate::scoring;

/// Open, kind-specific facts about an asset (kubelet version, host path, image...).
///
/// Keys never shadow the reserved stored fields; see
/// [`RESERVED_FIELDS`](crate::types::RESERVED_FIELDS).
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Field names a stored asset owns outright. Attributes are flattened under
/// [`ATTRIBUTE_PREFIX`] so they can never overwrite one of these.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "name",
    "namespace",
    "kind",
    "criticality",
    "labels",
    "lastObserved",
    "cluster",
];

/// Prefix applied to every attribute key when an asset is stored.
pub const ATTRIBUTE_PREFIX: &str = "attr_";

// ── Asset Kinds ───────────────────────────────────────────────────

/// The closed set of cluster entities tracked in the attack graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Master,
    Node,
    ServiceAccount,
    Secret,
    Credential,
    Pod,
    Volume,
    Container,
}

impl AssetKind {
    pub const ALL: [AssetKind; 8] = [
        AssetKind::Master,
        AssetKind::Node,
        AssetKind::ServiceAccount,
        AssetKind::Secret,
        AssetKind::Credential,
        AssetKind::Pod,
        AssetKind::Volume,
        AssetKind::Container,
    ];

    /// Display and storage name (`ServiceAccount`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "Master",
            Self::Node => "Node",
            Self::ServiceAccount => "ServiceAccount",
            Self::Secret => "Secret",
            Self::Credential => "Credential",
            Self::Pod => "Pod",
            Self::Volume => "Volume",
            Self::Container => "Container",
        }
    }

    /// Lowercase token used inside asset ids (`serviceaccount`).
    pub fn id_token(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Node => "node",
            Self::ServiceAccount => "serviceaccount",
            Self::Secret => "secret",
            Self::Credential => "credential",
            Self::Pod => "pod",
            Self::Volume => "volume",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = KubepathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s) || k.id_token() == s)
            .copied()
            .ok_or_else(|| KubepathError::InvalidInput(format!("unknown asset kind: {s}")))
    }
}

// ── Criticality ───────────────────────────────────────────────────

/// Policy-assigned value of an asset to an attacker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Criticality {
    High,
    Medium,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
        }
    }

    /// Weight contributed by an edge that ends on an asset of this criticality.
    pub fn weight(&self) -> f64 {
        scoring::criticality_weight(Some(self.as_str()))
    }

    /// Parse a stored value. Anything unrecognized reads back as `Medium`.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("HIGH") => Self::High,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Techniques ────────────────────────────────────────────────────

/// The fixed vocabulary of exploitation techniques an edge can assert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    Membership,
    MountDiscovery,
    NodeRootAccess,
    LateralMovement,
    PrivilegeDiscovery,
    RbacAbuse,
    ClusterCredentialAccess,
    TaintLateralMovement,
}

impl Technique {
    pub const ALL: [Technique; 8] = [
        Technique::Membership,
        Technique::MountDiscovery,
        Technique::NodeRootAccess,
        Technique::LateralMovement,
        Technique::PrivilegeDiscovery,
        Technique::RbacAbuse,
        Technique::ClusterCredentialAccess,
        Technique::TaintLateralMovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Membership => "membership",
            Self::MountDiscovery => "mount-discovery",
            Self::NodeRootAccess => "node-root-access",
            Self::LateralMovement => "lateral-movement",
            Self::PrivilegeDiscovery => "privilege-discovery",
            Self::RbacAbuse => "rbac-abuse",
            Self::ClusterCredentialAccess => "cluster-credential-access",
            Self::TaintLateralMovement => "taint-lateral-movement",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technique {
    type Err = KubepathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| KubepathError::InvalidInput(format!("unknown technique: {s}")))
    }
}

// ── Ingestion Mode ────────────────────────────────────────────────

/// How a snapshot is merged into the stored graph.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionMode {
    /// Delete everything tagged with the cluster, then write the snapshot.
    #[default]
    Full,
    /// Upsert the snapshot over whatever is already stored.
    Incremental,
}

impl FromStr for IngestionMode {
    type Err = KubepathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            _ => Err(KubepathError::InvalidInput(format!(
                "invalid ingestion mode: {s}. Choose: full, incremental"
            ))),
        }
    }
}

// ── Graph Elements ────────────────────────────────────────────────

/// A cluster entity relevant to attack analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetNode {
    pub id: String,
    pub kind: AssetKind,
    pub name: String,
    pub namespace: Option<String>,
    pub criticality: Criticality,
    #[serde(default)]
    pub labels: Vec<String>,
    pub last_observed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A directed assertion: control of `source` helps reach `target` via `technique`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttackEdge {
    pub source: String,
    pub target: String,
    pub technique: Technique,
    pub evidence: Option<String>,
    /// Static weight of the inference rule, in `[0, 1]`.
    pub confidence: Option<f64>,
    /// Manual ordering hint; not used for scoring.
    pub sequence: Option<i64>,
}

impl AttackEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        technique: Technique,
        evidence: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            technique,
            evidence: Some(evidence.into()),
            confidence: Some(confidence),
            sequence: None,
        }
    }
}

// ── Attack Path Types ─────────────────────────────────────────────

/// One depth level of an attack path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackStep {
    pub depth: usize,
    pub nodes: Vec<AssetNode>,
    /// Empty at depth 0; the edge that reached this depth otherwise.
    pub edges: Vec<AttackEdge>,
}

/// A ranked attack path returned by a search. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackPath {
    pub id: Uuid,
    pub score: f64,
    pub steps: Vec<AttackStep>,
    pub summary: String,
}

impl AttackPath {
    /// Number of edges traversed.
    pub fn hop_count(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }
}
