//! Raw graph-query results as plain nodes and relationships, the shape the
//! natural-language layer and map rendering consume.

use std::collections::{BTreeMap, HashMap};

use neo4rs::{query, Node, Relation};
use serde::Serialize;

use bizgraph_common::Properties;

use crate::store::StoreError;
use crate::GraphClient;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultNode {
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRelationship {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: Properties,
    pub start_node_labels: Vec<String>,
    pub end_node_labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphQueryResult {
    pub nodes: Vec<ResultNode>,
    pub relationships: Vec<ResultRelationship>,
}

struct PendingRelationship {
    rel_type: String,
    properties: Properties,
    start: i64,
    end: i64,
}

/// Accumulates nodes and relationships across rows, deduplicated by store id.
#[derive(Default)]
pub struct GraphQueryResultBuilder {
    nodes: BTreeMap<i64, ResultNode>,
    relationships: BTreeMap<i64, PendingRelationship>,
}

impl GraphQueryResultBuilder {
    pub fn add_node(&mut self, id: i64, labels: Vec<String>, properties: Properties) {
        self.nodes
            .entry(id)
            .or_insert(ResultNode { labels, properties });
    }

    pub fn add_relationship(
        &mut self,
        id: i64,
        rel_type: String,
        properties: Properties,
        start: i64,
        end: i64,
    ) {
        self.relationships.entry(id).or_insert(PendingRelationship {
            rel_type,
            properties,
            start,
            end,
        });
    }

    /// Endpoint ids whose labels are not yet known.
    pub fn unresolved_endpoints(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .relationships
            .values()
            .flat_map(|r| [r.start, r.end])
            .filter(|id| !self.nodes.contains_key(id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// `endpoint_labels` supplies labels for endpoints that were not returned
    /// as nodes themselves.
    pub fn finish(self, endpoint_labels: &HashMap<i64, Vec<String>>) -> GraphQueryResult {
        let labels_of = |id: i64| -> Vec<String> {
            self.nodes
                .get(&id)
                .map(|n| n.labels.clone())
                .or_else(|| endpoint_labels.get(&id).cloned())
                .unwrap_or_default()
        };
        let relationships = self
            .relationships
            .values()
            .map(|r| ResultRelationship {
                rel_type: r.rel_type.clone(),
                properties: r.properties.clone(),
                start_node_labels: labels_of(r.start),
                end_node_labels: labels_of(r.end),
            })
            .collect();
        GraphQueryResult {
            nodes: self.nodes.into_values().collect(),
            relationships,
        }
    }
}

/// Run a read query and collect every node and relationship found in `columns`.
/// Columns holding other values are ignored.
pub async fn run_graph_query(
    client: &GraphClient,
    cypher: &str,
    columns: &[String],
) -> Result<GraphQueryResult, StoreError> {
    let mut builder = GraphQueryResultBuilder::default();
    let mut stream = client.graph.execute(query(cypher)).await?;
    while let Some(row) = stream.next().await? {
        for column in columns {
            if let Ok(node) = row.get::<Node>(column) {
                let labels = node.labels().into_iter().map(String::from).collect();
                builder.add_node(node.id(), labels, node.to::<Properties>()?);
            } else if let Ok(rel) = row.get::<Relation>(column) {
                builder.add_relationship(
                    rel.id(),
                    rel.typ().to_string(),
                    rel.to::<Properties>()?,
                    rel.start_node_id(),
                    rel.end_node_id(),
                );
            }
        }
    }

    let missing = builder.unresolved_endpoints();
    let mut endpoint_labels = HashMap::new();
    if !missing.is_empty() {
        let q = query("MATCH (n) WHERE id(n) IN $ids RETURN id(n) AS id, labels(n) AS labels")
            .param("ids", missing);
        let mut stream = client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            endpoint_labels.insert(row.get::<i64>("id")?, row.get::<Vec<String>>("labels")?);
        }
    }
    Ok(builder.finish(&endpoint_labels))
}
