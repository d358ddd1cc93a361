//! Read operations and Cypher query builders for the attack graph.

use chrono::{DateTime, Utc};
use neo4rs::query;
use serde::Deserialize;

use kubepath_core::types::ATTRIBUTE_PREFIX;
use kubepath_core::{AssetKind, AssetNode, AttackEdge, Attributes, Criticality, Technique};

use crate::client::{GraphClient, GraphError};
use crate::store::{AssetDetail, AssetFilter, AssetPage, KindCount, PathQuery, StoredPath};

/// Relationship projection returned alongside each path.
#[derive(Debug, Deserialize)]
struct RelRow {
    source: String,
    target: String,
    technique: String,
    evidence: Option<String>,
    confidence: Option<f64>,
    sequence: Option<i64>,
}

impl GraphClient {
    // ── Path Queries ─────────────────────────────────────────────

    /// Enumerate, score, and rank attack paths inside Neo4j.
    pub async fn search_paths(&self, pq: &PathQuery) -> Result<Vec<StoredPath>, GraphError> {
        let cypher = build_path_cypher(pq);
        tracing::debug!(cypher = %cypher, "Running path search");

        let mut q = query(&cypher).param("limit", pq.limit as i64);
        if let Some(id) = &pq.start_node_id {
            q = q.param("startNodeId", id.clone());
        }
        if let Some(kind) = pq.start_kind {
            q = q.param("startKind", kind.as_str());
        }
        if let Some(kind) = pq.target_kind {
            q = q.param("targetKind", kind.as_str());
        }
        if let Some(ns) = &pq.namespace {
            q = q.param("namespace", ns.clone());
        }

        let rows = self.query_rows(q).await?;
        let mut paths = Vec::with_capacity(rows.len());
        for row in rows {
            let nodes: Vec<neo4rs::Node> = row.get("nodes").map_err(|e| {
                GraphError::Serialization(format!("Failed to deserialize path nodes: {e}"))
            })?;
            let rels: Vec<RelRow> = row.get("rels").map_err(|e| {
                GraphError::Serialization(format!("Failed to deserialize path relationships: {e}"))
            })?;
            let score: f64 = row.get("score").unwrap_or(0.0);

            let nodes = nodes
                .iter()
                .map(node_to_asset)
                .collect::<Result<Vec<_>, _>>()?;
            let edges = rels
                .into_iter()
                .map(rel_row_to_edge)
                .collect::<Result<Vec<_>, _>>()?;
            paths.push(StoredPath {
                nodes,
                edges,
                score,
            });
        }
        Ok(paths)
    }

    // ── Asset Queries ────────────────────────────────────────────

    /// All assets tagged with a cluster.
    pub async fn cluster_assets(&self, cluster: &str) -> Result<Vec<AssetNode>, GraphError> {
        let q = query(
            "MATCH (n:Asset {cluster: $cluster})
             RETURN n
             ORDER BY n.id",
        )
        .param("cluster", cluster.to_string());

        let rows = self.query_rows(q).await?;
        rows.iter().map(|row| row_node(row, "n")).collect()
    }

    /// Filtered, paginated asset listing, most recently observed first.
    pub async fn asset_page(&self, filter: &AssetFilter) -> Result<AssetPage, GraphError> {
        let where_clause = build_asset_where(filter);
        let page_size = filter.page_size.clamp(1, AssetFilter::MAX_PAGE_SIZE);

        let list_cypher = format!(
            "MATCH (n:Asset)
             {where_clause}
             RETURN n
             ORDER BY n.lastObserved DESC
             SKIP $skip
             LIMIT $limit"
        );
        let count_cypher = format!(
            "MATCH (n:Asset)
             {where_clause}
             RETURN count(n) AS total"
        );

        let mut list_q = query(&list_cypher)
            .param("skip", filter.offset() as i64)
            .param("limit", i64::from(page_size));
        let mut count_q = query(&count_cypher);
        if let Some(kind) = filter.kind {
            list_q = list_q.param("kind", kind.as_str());
            count_q = count_q.param("kind", kind.as_str());
        }
        if let Some(ns) = &filter.namespace {
            list_q = list_q.param("namespace", ns.clone());
            count_q = count_q.param("namespace", ns.clone());
        }
        if let Some(search) = &filter.search {
            list_q = list_q.param("search", search.clone());
            count_q = count_q.param("search", search.clone());
        }

        let rows = self.query_rows(list_q).await?;
        let items = rows
            .iter()
            .map(|row| row_node(row, "n"))
            .collect::<Result<Vec<_>, _>>()?;
        let total = self.query_count(count_q, "total").await?;

        Ok(AssetPage {
            items,
            total,
            page: filter.page.max(1),
            page_size,
        })
    }

    /// One asset with its inbound and outbound edges.
    pub async fn get_asset_detail(&self, id: &str) -> Result<Option<AssetDetail>, GraphError> {
        let q = query("MATCH (n:Asset {id: $id}) RETURN n").param("id", id.to_string());
        let node = match self.query_one(q).await? {
            Some(row) => row_node(&row, "n")?,
            None => return Ok(None),
        };

        let inbound_q = query(
            "MATCH (:Asset)-[r:ATTACK_REL]->(:Asset {id: $id})
             RETURN r",
        )
        .param("id", id.to_string());
        let outbound_q = query(
            "MATCH (:Asset {id: $id})-[r:ATTACK_REL]->(:Asset)
             RETURN r",
        )
        .param("id", id.to_string());

        let inbound_edges = self
            .query_rows(inbound_q)
            .await?
            .iter()
            .map(row_relation)
            .collect::<Result<Vec<_>, _>>()?;
        let outbound_edges = self
            .query_rows(outbound_q)
            .await?
            .iter()
            .map(row_relation)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(AssetDetail {
            node,
            inbound_edges,
            outbound_edges,
        }))
    }

    /// Count assets per kind. Kinds this build does not know are skipped.
    pub async fn count_by_kind(&self) -> Result<Vec<KindCount>, GraphError> {
        let q = query(
            "MATCH (n:Asset)
             RETURN n.kind AS kind, count(n) AS total",
        );

        let rows = self.query_rows(q).await?;
        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let Ok(raw) = row.get::<String>("kind") else {
                continue;
            };
            let total = row.get::<i64>("total").unwrap_or(0).max(0) as u64;
            match raw.parse::<AssetKind>() {
                Ok(kind) => stats.push(KindCount { kind, total }),
                Err(_) => tracing::warn!(kind = %raw, "Unknown asset kind in stats"),
            }
        }
        stats.sort_by_key(|s| s.kind);
        Ok(stats)
    }
}

// ── Cypher Builders ──────────────────────────────────────────────

/// Build the variable-length traversal. The hop bound cannot be a Cypher
/// parameter, so the validated `max_depth` is interpolated.
pub(crate) fn build_path_cypher(pq: &PathQuery) -> String {
    let mut start_filters = Vec::new();
    if pq.start_node_id.is_some() {
        start_filters.push("start.id = $startNodeId");
    }
    if pq.start_kind.is_some() {
        start_filters.push("start.kind = $startKind");
    }
    if pq.namespace.is_some() {
        start_filters.push("coalesce(start.namespace, '') = $namespace");
    }

    let mut target_filters = Vec::new();
    if pq.target_kind.is_some() {
        target_filters.push("target.kind = $targetKind");
    }
    if pq.namespace.is_some() {
        target_filters.push("coalesce(target.namespace, '') = $namespace");
    }

    let start_where = where_clause(&start_filters);
    let target_where = where_clause(&target_filters);
    let max_depth = pq.max_depth;

    format!(
        "MATCH (start:Asset)
         {start_where}
         MATCH path = (start)-[:ATTACK_REL*1..{max_depth}]->(target:Asset)
         {target_where}
         WITH path,
              reduce(score = 0.0, rel IN relationships(path) |
                  score + coalesce(rel.confidence, 0.2) +
                  CASE endNode(rel).criticality
                      WHEN 'HIGH' THEN 2.0
                      WHEN 'MEDIUM' THEN 1.0
                      ELSE 0.5
                  END
              ) AS score
         RETURN nodes(path) AS nodes,
                [rel IN relationships(path) | {{
                    source: startNode(rel).id,
                    target: endNode(rel).id,
                    technique: rel.technique,
                    evidence: rel.evidence,
                    confidence: rel.confidence,
                    sequence: rel.sequence
                }}] AS rels,
                score
         ORDER BY score DESC
         LIMIT $limit"
    )
}

fn build_asset_where(filter: &AssetFilter) -> String {
    let mut clauses = Vec::new();
    if filter.kind.is_some() {
        clauses.push("n.kind = $kind");
    }
    if filter.namespace.is_some() {
        clauses.push("coalesce(n.namespace, '') CONTAINS $namespace");
    }
    if filter.search.is_some() {
        clauses.push("(toLower(n.name) CONTAINS toLower($search) OR n.id = $search)");
    }
    where_clause(&clauses)
}

fn where_clause(filters: &[&str]) -> String {
    if filters.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", filters.join(" AND "))
    }
}

// ── Conversions ──────────────────────────────────────────────────

fn row_node(row: &neo4rs::Row, column: &str) -> Result<AssetNode, GraphError> {
    let node: neo4rs::Node = row
        .get(column)
        .map_err(|e| GraphError::Serialization(format!("Failed to deserialize node: {e}")))?;
    node_to_asset(&node)
}

fn row_relation(row: &neo4rs::Row) -> Result<AttackEdge, GraphError> {
    let rel: neo4rs::Relation = row
        .get("r")
        .map_err(|e| GraphError::Serialization(format!("Failed to get relation: {e}")))?;
    let technique: String = rel
        .get("technique")
        .map_err(|e| GraphError::Serialization(format!("Relation without technique: {e}")))?;

    rel_row_to_edge(RelRow {
        source: rel.get("sourceId").unwrap_or_default(),
        target: rel.get("targetId").unwrap_or_default(),
        technique,
        evidence: rel.get("evidence").ok(),
        confidence: rel.get("confidence").ok(),
        sequence: rel.get("sequence").ok(),
    })
}

fn rel_row_to_edge(row: RelRow) -> Result<AttackEdge, GraphError> {
    let technique = row
        .technique
        .parse::<Technique>()
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    Ok(AttackEdge {
        source: row.source,
        target: row.target,
        technique,
        evidence: row.evidence,
        confidence: row.confidence,
        sequence: row.sequence,
    })
}

/// Convert a stored `:Asset` node back into an [`AssetNode`], collecting
/// `attr_*` properties into the attribute map.
fn node_to_asset(node: &neo4rs::Node) -> Result<AssetNode, GraphError> {
    let id: String = node
        .get("id")
        .map_err(|e| GraphError::Serialization(format!("Asset without id: {e}")))?;
    let raw_kind: String = node
        .get("kind")
        .map_err(|e| GraphError::Serialization(format!("Asset {id} without kind: {e}")))?;
    let kind = raw_kind
        .parse::<AssetKind>()
        .map_err(|e| GraphError::Serialization(e.to_string()))?;

    let last_observed = node
        .get::<String>("lastObserved")
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|ts| ts.with_timezone(&Utc));

    let mut attributes = Attributes::new();
    for key in node.keys() {
        if let Some(attr) = key.strip_prefix(ATTRIBUTE_PREFIX) {
            if let Ok(value) = node.get::<serde_json::Value>(key) {
                attributes.insert(attr.to_string(), value);
            }
        }
    }

    Ok(AssetNode {
        name: node.get("name").unwrap_or_default(),
        namespace: node.get::<String>("namespace").ok(),
        criticality: Criticality::from_stored(node.get::<String>("criticality").ok().as_deref()),
        labels: node.get("labels").unwrap_or_default(),
        last_observed,
        attributes,
        id,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_cypher_interpolates_depth_and_filters() {
        let pq = PathQuery {
            start_kind: Some(AssetKind::Pod),
            target_kind: Some(AssetKind::Master),
            namespace: Some("ns1".to_string()),
            max_depth: 4,
            limit: 5,
            ..Default::default()
        };
        let cypher = build_path_cypher(&pq);
        assert!(cypher.contains("[:ATTACK_REL*1..4]"));
        assert!(cypher.contains("start.kind = $startKind"));
        assert!(cypher.contains("target.kind = $targetKind"));
        assert!(cypher.contains("coalesce(start.namespace, '') = $namespace"));
        assert!(cypher.contains("coalesce(target.namespace, '') = $namespace"));
        assert!(!cypher.contains("$startNodeId"));
    }

    #[test]
    fn path_cypher_without_target_filter_has_no_target_where() {
        let pq = PathQuery {
            start_node_id: Some("c:pod:ns1:web".to_string()),
            max_depth: 2,
            limit: 1,
            ..Default::default()
        };
        let cypher = build_path_cypher(&pq);
        assert!(cypher.contains("WHERE start.id = $startNodeId"));
        assert!(!cypher.contains("target.kind"));
    }

    #[test]
    fn asset_where_combines_filters() {
        let filter = AssetFilter {
            kind: Some(AssetKind::Secret),
            search: Some("tok".to_string()),
            ..Default::default()
        };
        let clause = build_asset_where(&filter);
        assert!(clause.starts_with("WHERE n.kind = $kind AND "));
        assert!(clause.contains("toLower($search)"));
        assert_eq!(build_asset_where(&AssetFilter::default()), "");
    }
}
