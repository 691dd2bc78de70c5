pub mod client;
pub mod cypher;
pub mod geometry;
pub mod memory;
pub mod neo4j;
pub mod result;
pub mod schema;
pub mod store;
pub mod validate;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use memory::MemoryGraph;
pub use neo4j::Neo4jGraph;
pub use neo4rs::query;
pub use result::{run_graph_query, GraphQueryResult};
pub use schema::{LayerClass, SchemaCatalog};
pub use store::{
    GraphBackend, GraphStore, NodeId, NodeRecord, NodeSelector, Related, SpatialIndex, StoreError,
};
pub use validate::SchemaViolation;
