use thiserror::Error;

use bizgraph_common::Properties;
use bizgraph_graph::{GraphBackend, NodeId, NodeSelector, SchemaCatalog, SchemaViolation, StoreError};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("schema violation: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
}

/// Validates every write against the catalog before it reaches the store.
#[derive(Clone, Copy)]
pub struct GraphWriter<'a> {
    pub graph: &'a dyn GraphBackend,
    pub catalog: &'a SchemaCatalog,
}

impl<'a> GraphWriter<'a> {
    pub fn new(graph: &'a dyn GraphBackend, catalog: &'a SchemaCatalog) -> Self {
        Self { graph, catalog }
    }

    pub async fn node(
        &self,
        label: &str,
        properties: &Properties,
        key: &[&str],
    ) -> Result<NodeId, WriteError> {
        self.catalog.validate_node(label, properties)?;
        Ok(self.graph.upsert_node(label, properties, key).await?)
    }

    /// Upsert a node and add it to a spatial layer.
    pub async fn spatial_node(
        &self,
        label: &str,
        properties: &Properties,
        key: &[&str],
        layer: &str,
    ) -> Result<NodeId, WriteError> {
        let id = self.node(label, properties, key).await?;
        self.graph.register(layer, &id).await?;
        Ok(id)
    }

    pub async fn relationship(
        &self,
        rel_type: &str,
        start: &NodeSelector,
        end: &NodeSelector,
        properties: &Properties,
    ) -> Result<(), WriteError> {
        self.catalog
            .validate_relationship(rel_type, &start.label, &end.label, properties)?;
        Ok(self
            .graph
            .upsert_relationship(rel_type, start, end, properties)
            .await?)
    }

    /// Create every spatial layer the catalog declares for these labels.
    pub async fn ensure_layers(&self, layers: &[&str]) -> Result<(), StoreError> {
        for layer in layers {
            let spec = self
                .catalog
                .layer(layer)
                .ok_or_else(|| StoreError::UnknownLayer(layer.to_string()))?;
            self.graph.ensure_layer(layer, spec.layer_class).await?;
        }
        Ok(())
    }
}
