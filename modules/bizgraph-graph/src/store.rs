use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use bizgraph_common::{Properties, PropertyValue};

use crate::geometry::GeometryError;
use crate::schema::LayerClass;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Failed to decode result row: {0}")]
    Decode(String),

    #[error("no node matches {0}")]
    MissingEndpoint(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    #[error("{0} is not declared in the schema")]
    Undeclared(String),

    #[error("key property {property} missing from {label} upsert")]
    MissingKey { label: String, property: String },

    #[error("constraint {name} violated: {label}.{property} = {value}")]
    ConstraintViolation {
        name: String,
        label: String,
        property: String,
        value: String,
    },

    #[error("unknown spatial layer {0}")]
    UnknownLayer(String),

    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

impl From<neo4rs::DeError> for StoreError {
    fn from(e: neo4rs::DeError) -> Self {
        StoreError::Decode(e.to_string())
    }
}

/// Store-assigned identity of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub String);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locates exactly one node by label and natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSelector {
    pub label: String,
    pub key: Properties,
}

impl NodeSelector {
    pub fn new(label: &str, property: &str, value: impl Into<PropertyValue>) -> Self {
        let mut key = Properties::new();
        key.insert(property.to_string(), value.into());
        Self {
            label: label.to_string(),
            key,
        }
    }
}

impl std::fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}", self.label)?;
        for (k, v) in &self.key {
            write!(f, " {k}={v}")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl NodeRecord {
    pub fn get(&self, property: &str) -> Option<&PropertyValue> {
        self.properties.get(property)
    }

    pub fn get_str(&self, property: &str) -> Option<&str> {
        self.get(property).and_then(PropertyValue::as_str)
    }

    pub fn get_f64(&self, property: &str) -> Option<f64> {
        self.get(property).and_then(PropertyValue::as_f64)
    }
}

/// A neighbour reached over one relationship, with that relationship's properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Related {
    pub node: NodeRecord,
    pub relationship: Properties,
}

/// Idempotent writes and simple reads over labelled nodes and typed relationships.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Locate-or-create one node by label and the `key` properties, then
    /// overwrite the remaining properties.
    async fn upsert_node(
        &self,
        label: &str,
        properties: &Properties,
        key: &[&str],
    ) -> Result<NodeId, StoreError>;

    /// At most one relationship of `rel_type` per endpoint pair. The property
    /// set is replaced on every call. Fails with `MissingEndpoint` when either
    /// selector matches nothing.
    async fn upsert_relationship(
        &self,
        rel_type: &str,
        start: &NodeSelector,
        end: &NodeSelector,
        properties: &Properties,
    ) -> Result<(), StoreError>;

    /// Detach-delete every node with `label`. Returns the number removed.
    async fn delete_by_label(&self, label: &str) -> Result<u64, StoreError>;

    async fn delete_relationships_by_type(&self, rel_type: &str) -> Result<u64, StoreError>;

    async fn create_uniqueness_constraint(
        &self,
        name: &str,
        label: &str,
        property: &str,
    ) -> Result<(), StoreError>;

    async fn drop_constraint(&self, name: &str) -> Result<(), StoreError>;

    /// Single-property or composite index, created if missing.
    async fn ensure_index(&self, label: &str, properties: &[&str]) -> Result<(), StoreError>;

    /// Nodes with `label` whose properties include every entry of `filter`.
    async fn find_nodes(&self, label: &str, filter: &Properties)
        -> Result<Vec<NodeRecord>, StoreError>;

    /// Outgoing `rel_type` neighbours of `start` carrying `end_label`.
    async fn find_related(
        &self,
        start: &NodeSelector,
        rel_type: &str,
        end_label: &str,
    ) -> Result<Vec<Related>, StoreError>;
}

/// Named spatial layers and the predicates evaluated against them.
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Create the layer unless it already exists.
    async fn ensure_layer(&self, layer: &str, class: LayerClass) -> Result<(), StoreError>;

    /// Add a node to a layer. Re-registering a member replaces its index
    /// entry with the node's current geometry.
    async fn register(&self, layer: &str, node: &NodeId) -> Result<(), StoreError>;

    /// Drop the layer and its index. Missing layers are ignored.
    async fn remove_layer(&self, layer: &str) -> Result<(), StoreError>;

    /// Members whose geometry intersects the WKT geometry. Candidates only;
    /// exact overlap is computed by the caller.
    async fn intersects(&self, layer: &str, wkt: &str) -> Result<Vec<NodeRecord>, StoreError>;

    /// Members within `distance_km` of the point, nearest first.
    async fn within_distance(
        &self,
        layer: &str,
        latitude: f64,
        longitude: f64,
        distance_km: f64,
    ) -> Result<Vec<(NodeRecord, f64)>, StoreError>;
}

/// Everything the builders need from a backing graph.
pub trait GraphBackend: GraphStore + SpatialIndex {}

impl<T: GraphStore + SpatialIndex + ?Sized> GraphBackend for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_display_names_label_and_key() {
        let sel = NodeSelector::new("Zipcode", "zipcode_number", "92101");
        assert_eq!(sel.to_string(), "(Zipcode zipcode_number=92101)");
    }
}
