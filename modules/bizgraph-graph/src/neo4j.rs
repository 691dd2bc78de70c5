use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{query, Query, Row};
use tracing::{debug, info};

use bizgraph_common::Properties;

use crate::cypher::{map_pattern, properties_to_bolt, to_bolt, Ident};
use crate::schema::{LayerClass, SchemaCatalog};
use crate::store::{
    GraphStore, NodeId, NodeRecord, NodeSelector, Related, SpatialIndex, StoreError,
};
use crate::GraphClient;

const NODE_COLUMNS: &str = "elementId(n) AS id, labels(n) AS labels, properties(n) AS props";
const DEFAULT_GEOMETRY_PROPERTY: &str = "wkt";

/// [`GraphStore`] and [`SpatialIndex`] over Neo4j with the Spatial plugin.
///
/// Labels, relationship types and layers must be declared in the catalog.
#[derive(Clone)]
pub struct Neo4jGraph {
    client: GraphClient,
    catalog: Arc<SchemaCatalog>,
}

impl Neo4jGraph {
    pub fn new(client: GraphClient, catalog: Arc<SchemaCatalog>) -> Self {
        Self { client, catalog }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    fn label(&self, label: &str) -> Result<Ident, StoreError> {
        let ident = Ident::new(label)?;
        if self.catalog.node(label).is_none() {
            return Err(StoreError::Undeclared(label.to_string()));
        }
        Ok(ident)
    }

    fn rel_type(&self, rel_type: &str) -> Result<Ident, StoreError> {
        let ident = Ident::new(rel_type)?;
        if self.catalog.relationship(rel_type).is_none() {
            return Err(StoreError::Undeclared(rel_type.to_string()));
        }
        Ok(ident)
    }

    fn layer_geometry_property(&self, layer: &str) -> Result<String, StoreError> {
        let spec = self
            .catalog
            .layer(layer)
            .ok_or_else(|| StoreError::UnknownLayer(layer.to_string()))?;
        Ok(spec
            .geometry_property
            .clone()
            .unwrap_or_else(|| DEFAULT_GEOMETRY_PROPERTY.to_string()))
    }

    async fn layer_exists(&self, layer: &str) -> Result<bool, StoreError> {
        let q = query("MATCH (l:SpatialLayer {layer: $layer}) RETURN count(l) AS n")
            .param("layer", layer);
        let mut stream = self.client.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(row.get::<i64>("n")? > 0),
            None => Ok(false),
        }
    }

    async fn fetch_nodes(&self, q: Query) -> Result<Vec<NodeRecord>, StoreError> {
        let mut stream = self.client.graph.execute(q).await?;
        let mut nodes = Vec::new();
        while let Some(row) = stream.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }

    async fn single_count(&self, q: Query, column: &str) -> Result<u64, StoreError> {
        let mut stream = self.client.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(row.get::<i64>(column)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

fn node_from_row(row: &Row) -> Result<NodeRecord, StoreError> {
    Ok(NodeRecord {
        id: NodeId(row.get::<String>("id")?),
        labels: row.get::<Vec<String>>("labels")?,
        properties: row.get::<Properties>("props")?,
    })
}

fn bind(mut q: Query, prefix: &str, props: &Properties) -> Query {
    for (k, v) in props {
        q = q.param(&format!("{prefix}{k}"), to_bolt(v));
    }
    q
}

#[async_trait]
impl GraphStore for Neo4jGraph {
    async fn upsert_node(
        &self,
        label: &str,
        properties: &Properties,
        key: &[&str],
    ) -> Result<NodeId, StoreError> {
        let ident = self.label(label)?;
        if key.is_empty() {
            return Err(StoreError::MissingKey {
                label: label.to_string(),
                property: "<none>".to_string(),
            });
        }
        let mut key_props = Properties::new();
        for k in key {
            let value = properties.get(*k).ok_or_else(|| StoreError::MissingKey {
                label: label.to_string(),
                property: k.to_string(),
            })?;
            key_props.insert(k.to_string(), value.clone());
        }
        let remaining: Properties = properties
            .iter()
            .filter(|(k, _)| !key_props.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let pattern = map_pattern(key_props.keys().map(String::as_str), "k_")?;
        let cypher =
            format!("MERGE (n:{ident} {pattern}) SET n += $props RETURN elementId(n) AS id");
        let q = bind(query(&cypher), "k_", &key_props).param("props", properties_to_bolt(&remaining));

        let mut stream = self.client.graph.execute(q).await?;
        match stream.next().await? {
            Some(row) => Ok(NodeId(row.get::<String>("id")?)),
            None => Err(StoreError::Decode(format!("MERGE on {label} returned no row"))),
        }
    }

    async fn upsert_relationship(
        &self,
        rel_type: &str,
        start: &NodeSelector,
        end: &NodeSelector,
        properties: &Properties,
    ) -> Result<(), StoreError> {
        let rel = self.rel_type(rel_type)?;
        let start_label = self.label(&start.label)?;
        let end_label = self.label(&end.label)?;
        let start_pattern = map_pattern(start.key.keys().map(String::as_str), "s_")?;
        let end_pattern = map_pattern(end.key.keys().map(String::as_str), "e_")?;

        let cypher = format!(
            "MATCH (a:{start_label} {start_pattern})
             MATCH (b:{end_label} {end_pattern})
             MERGE (a)-[r:{rel}]->(b)
             SET r = $props
             RETURN count(r) AS linked"
        );
        let q = bind(bind(query(&cypher), "s_", &start.key), "e_", &end.key)
            .param("props", properties_to_bolt(properties));

        if self.single_count(q, "linked").await? == 0 {
            return Err(StoreError::MissingEndpoint(format!("{start} or {end}")));
        }
        Ok(())
    }

    async fn delete_by_label(&self, label: &str) -> Result<u64, StoreError> {
        let ident = self.label(label)?;
        let q = query(&format!(
            "MATCH (n:{ident}) DETACH DELETE n RETURN count(n) AS deleted"
        ));
        let deleted = self.single_count(q, "deleted").await?;
        info!(label, deleted, "Deleted nodes");
        Ok(deleted)
    }

    async fn delete_relationships_by_type(&self, rel_type: &str) -> Result<u64, StoreError> {
        let ident = self.rel_type(rel_type)?;
        let q = query(&format!(
            "MATCH ()-[r:{ident}]->() DELETE r RETURN count(r) AS deleted"
        ));
        let deleted = self.single_count(q, "deleted").await?;
        info!(rel_type, deleted, "Deleted relationships");
        Ok(deleted)
    }

    async fn create_uniqueness_constraint(
        &self,
        name: &str,
        label: &str,
        property: &str,
    ) -> Result<(), StoreError> {
        let name_ident = Ident::new(name)?;
        let label_ident = self.label(label)?;
        let prop = Ident::new(property)?;
        let cypher = format!(
            "CREATE CONSTRAINT {name_ident} IF NOT EXISTS FOR (n:{label_ident}) REQUIRE n.{prop} IS UNIQUE"
        );
        self.client.graph.run(query(&cypher)).await?;
        debug!(name, label, property, "Uniqueness constraint ensured");
        Ok(())
    }

    async fn drop_constraint(&self, name: &str) -> Result<(), StoreError> {
        let ident = Ident::new(name)?;
        self.client
            .graph
            .run(query(&format!("DROP CONSTRAINT {ident} IF EXISTS")))
            .await?;
        debug!(name, "Constraint dropped");
        Ok(())
    }

    async fn ensure_index(&self, label: &str, properties: &[&str]) -> Result<(), StoreError> {
        let label_ident = self.label(label)?;
        let props = properties
            .iter()
            .map(|p| Ident::new(p).map(|i| format!("n.{i}")))
            .collect::<Result<Vec<_>, _>>()?;
        let name = match properties {
            [single] => format!("{}_{single}", label.to_lowercase()),
            _ => format!("{}_composite", label.to_lowercase()),
        };
        let name = Ident::new(&name)?;
        let cypher = format!(
            "CREATE INDEX {name} IF NOT EXISTS FOR (n:{label_ident}) ON ({})",
            props.join(", ")
        );
        self.client.graph.run(query(&cypher)).await?;
        debug!(label, properties = ?properties, "Index ensured");
        Ok(())
    }

    async fn find_nodes(
        &self,
        label: &str,
        filter: &Properties,
    ) -> Result<Vec<NodeRecord>, StoreError> {
        let ident = self.label(label)?;
        let pattern = map_pattern(filter.keys().map(String::as_str), "f_")?;
        let cypher = format!("MATCH (n:{ident} {pattern}) RETURN {NODE_COLUMNS}");
        self.fetch_nodes(bind(query(&cypher), "f_", filter)).await
    }

    async fn find_related(
        &self,
        start: &NodeSelector,
        rel_type: &str,
        end_label: &str,
    ) -> Result<Vec<Related>, StoreError> {
        let start_label = self.label(&start.label)?;
        let rel = self.rel_type(rel_type)?;
        let end_ident = self.label(end_label)?;
        let pattern = map_pattern(start.key.keys().map(String::as_str), "s_")?;
        let cypher = format!(
            "MATCH (a:{start_label} {pattern})-[r:{rel}]->(n:{end_ident})
             RETURN {NODE_COLUMNS}, properties(r) AS rel"
        );

        let mut stream = self
            .client
            .graph
            .execute(bind(query(&cypher), "s_", &start.key))
            .await?;
        let mut related = Vec::new();
        while let Some(row) = stream.next().await? {
            related.push(Related {
                node: node_from_row(&row)?,
                relationship: row.get::<Properties>("rel")?,
            });
        }
        Ok(related)
    }
}

#[async_trait]
impl SpatialIndex for Neo4jGraph {
    async fn ensure_layer(&self, layer: &str, class: LayerClass) -> Result<(), StoreError> {
        let geometry_property = self.layer_geometry_property(layer)?;
        if self.layer_exists(layer).await? {
            debug!(layer, "Using existing spatial layer");
            return Ok(());
        }

        let q = match class {
            LayerClass::Wkt => query("CALL spatial.addWKTLayer($layer, $property) YIELD node RETURN node")
                .param("layer", layer)
                .param("property", geometry_property),
            LayerClass::Point => query("CALL spatial.addPointLayer($layer) YIELD node RETURN node")
                .param("layer", layer),
        };
        self.client.graph.run(q).await?;
        info!(layer, class = class.as_str(), "Created spatial layer");
        Ok(())
    }

    async fn register(&self, layer: &str, node: &NodeId) -> Result<(), StoreError> {
        self.layer_geometry_property(layer)?;
        let indexed = query(
            "MATCH (n) WHERE elementId(n) = $id
             RETURN count { (n)<-[:RTREE_REFERENCE]-() } AS indexed",
        )
        .param("id", node.0.as_str());
        if self.single_count(indexed, "indexed").await? > 0 {
            // Re-add so the index follows the node's current geometry.
            let remove = query(
                "MATCH (n) WHERE elementId(n) = $id
                 CALL spatial.removeNode($layer, n) YIELD nodeId
                 RETURN count(nodeId) AS removed",
            )
            .param("id", node.0.as_str())
            .param("layer", layer);
            let removed = self.single_count(remove, "removed").await?;
            debug!(layer, node = %node, removed, "Refreshing spatial index entry");
        }

        let add = query(
            "MATCH (n) WHERE elementId(n) = $id
             CALL spatial.addNode($layer, n) YIELD node
             RETURN count(node) AS added",
        )
        .param("id", node.0.as_str())
        .param("layer", layer);
        if self.single_count(add, "added").await? == 0 {
            return Err(StoreError::MissingEndpoint(node.to_string()));
        }
        Ok(())
    }

    async fn remove_layer(&self, layer: &str) -> Result<(), StoreError> {
        if !self.layer_exists(layer).await? {
            return Ok(());
        }
        self.client
            .graph
            .run(query("CALL spatial.removeLayer($layer)").param("layer", layer))
            .await?;
        info!(layer, "Removed spatial layer");
        Ok(())
    }

    async fn intersects(&self, layer: &str, wkt: &str) -> Result<Vec<NodeRecord>, StoreError> {
        self.layer_geometry_property(layer)?;
        let q = query(&format!(
            "CALL spatial.intersects($layer, $wkt) YIELD node AS n RETURN {NODE_COLUMNS}"
        ))
        .param("layer", layer)
        .param("wkt", wkt);
        self.fetch_nodes(q).await
    }

    async fn within_distance(
        &self,
        layer: &str,
        latitude: f64,
        longitude: f64,
        distance_km: f64,
    ) -> Result<Vec<(NodeRecord, f64)>, StoreError> {
        self.layer_geometry_property(layer)?;
        let q = query(&format!(
            "CALL spatial.withinDistance($layer, {{latitude: $lat, longitude: $lon}}, $distance)
             YIELD node AS n, distance
             RETURN {NODE_COLUMNS}, distance
             ORDER BY distance"
        ))
        .param("layer", layer)
        .param("lat", latitude)
        .param("lon", longitude)
        .param("distance", distance_km);

        let mut stream = self.client.graph.execute(q).await?;
        let mut hits = Vec::new();
        while let Some(row) = stream.next().await? {
            let distance = row.get::<f64>("distance")?;
            hits.push((node_from_row(&row)?, distance));
        }
        Ok(hits)
    }
}
