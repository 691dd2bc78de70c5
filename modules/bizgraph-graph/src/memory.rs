//! In-process graph with the same write semantics as [`crate::Neo4jGraph`].
//!
//! Backs `--dry-run` and the pipeline tests. Spatial predicates are evaluated
//! exactly with `geo` instead of through an R-tree.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use geo::Point;

use bizgraph_common::{Properties, PropertyValue};

use crate::geometry::{parse_shape, Shape};
use crate::schema::LayerClass;
use crate::store::{
    GraphStore, NodeId, NodeRecord, NodeSelector, Related, SpatialIndex, StoreError,
};

const GEOMETRY_PROPERTY: &str = "wkt";

struct StoredNode {
    labels: Vec<String>,
    properties: Properties,
}

struct Layer {
    class: LayerClass,
    members: BTreeMap<u64, Shape>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    nodes: BTreeMap<u64, StoredNode>,
    /// (type, start, end) → properties
    relationships: BTreeMap<(String, u64, u64), Properties>,
    /// name → (label, property)
    constraints: BTreeMap<String, (String, String)>,
    indexes: BTreeSet<(String, Vec<String>)>,
    layers: BTreeMap<String, Layer>,
}

fn node_id(n: u64) -> NodeId {
    NodeId(format!("mem:{n}"))
}

fn parse_id(id: &NodeId) -> Option<u64> {
    id.0.strip_prefix("mem:")?.parse().ok()
}

fn matches(node: &StoredNode, label: &str, filter: &Properties) -> bool {
    node.labels.iter().any(|l| l == label)
        && filter.iter().all(|(k, v)| node.properties.get(k) == Some(v))
}

impl State {
    fn record(&self, n: u64) -> Option<NodeRecord> {
        self.nodes.get(&n).map(|node| NodeRecord {
            id: node_id(n),
            labels: node.labels.clone(),
            properties: node.properties.clone(),
        })
    }

    fn select(&self, label: &str, filter: &Properties) -> Vec<u64> {
        self.nodes
            .iter()
            .filter(|(_, node)| matches(node, label, filter))
            .map(|(n, _)| *n)
            .collect()
    }

    fn check_unique(&self, label: &str, id: Option<u64>, props: &Properties) -> Result<(), StoreError> {
        for (name, (c_label, property)) in &self.constraints {
            if c_label != label {
                continue;
            }
            let Some(value) = props.get(property) else {
                continue;
            };
            let clash = self.nodes.iter().any(|(n, node)| {
                Some(*n) != id
                    && node.labels.iter().any(|l| l == label)
                    && node.properties.get(property) == Some(value)
            });
            if clash {
                return Err(StoreError::ConstraintViolation {
                    name: name.clone(),
                    label: label.to_string(),
                    property: property.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn node_shape(node: &StoredNode, class: LayerClass) -> Result<Shape, StoreError> {
    match class {
        LayerClass::Wkt => {
            let raw = node
                .properties
                .get(GEOMETRY_PROPERTY)
                .and_then(PropertyValue::as_str)
                .ok_or_else(|| StoreError::Decode(format!("node has no {GEOMETRY_PROPERTY}")))?;
            Ok(parse_shape(raw)?)
        }
        LayerClass::Point => {
            let coord = |k: &str| node.properties.get(k).and_then(PropertyValue::as_f64);
            match (coord("latitude"), coord("longitude")) {
                (Some(lat), Some(lon)) => Ok(Shape::Point(Point::new(lon, lat))),
                _ => Err(StoreError::Decode("node has no latitude/longitude".into())),
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn node_count(&self, label: &str) -> usize {
        self.lock().select(label, &Properties::new()).len()
    }

    /// All relationships of a type as (start, end, properties).
    pub fn relationships(&self, rel_type: &str) -> Vec<(NodeRecord, NodeRecord, Properties)> {
        let state = self.lock();
        state
            .relationships
            .iter()
            .filter(|((t, _, _), _)| t == rel_type)
            .filter_map(|((_, s, e), props)| Some((state.record(*s)?, state.record(*e)?, props.clone())))
            .collect()
    }

    pub fn constraint_names(&self) -> Vec<String> {
        self.lock().constraints.keys().cloned().collect()
    }

    pub fn has_index(&self, label: &str, properties: &[&str]) -> bool {
        let key = (
            label.to_string(),
            properties.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        );
        self.lock().indexes.contains(&key)
    }

    pub fn has_layer(&self, layer: &str) -> bool {
        self.lock().layers.contains_key(layer)
    }

    pub fn layer_members(&self, layer: &str) -> Vec<NodeRecord> {
        let state = self.lock();
        state
            .layers
            .get(layer)
            .map(|l| l.members.keys().filter_map(|n| state.record(*n)).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_node(
        &self,
        label: &str,
        properties: &Properties,
        key: &[&str],
    ) -> Result<NodeId, StoreError> {
        let mut key_props = Properties::new();
        for k in key {
            let value = properties.get(*k).ok_or_else(|| StoreError::MissingKey {
                label: label.to_string(),
                property: k.to_string(),
            })?;
            key_props.insert(k.to_string(), value.clone());
        }
        if key_props.is_empty() {
            return Err(StoreError::MissingKey {
                label: label.to_string(),
                property: "<none>".to_string(),
            });
        }

        let mut state = self.lock();
        let existing = state.select(label, &key_props).first().copied();
        state.check_unique(label, existing, properties)?;

        let n = match existing {
            Some(n) => n,
            None => {
                state.next_id += 1;
                let n = state.next_id;
                state.nodes.insert(
                    n,
                    StoredNode {
                        labels: vec![label.to_string()],
                        properties: Properties::new(),
                    },
                );
                n
            }
        };
        if let Some(node) = state.nodes.get_mut(&n) {
            node.properties
                .extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(node_id(n))
    }

    async fn upsert_relationship(
        &self,
        rel_type: &str,
        start: &NodeSelector,
        end: &NodeSelector,
        properties: &Properties,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        let starts = state.select(&start.label, &start.key);
        if starts.is_empty() {
            return Err(StoreError::MissingEndpoint(start.to_string()));
        }
        let ends = state.select(&end.label, &end.key);
        if ends.is_empty() {
            return Err(StoreError::MissingEndpoint(end.to_string()));
        }
        for s in &starts {
            for e in &ends {
                state
                    .relationships
                    .insert((rel_type.to_string(), *s, *e), properties.clone());
            }
        }
        Ok(())
    }

    async fn delete_by_label(&self, label: &str) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let doomed: BTreeSet<u64> = state.select(label, &Properties::new()).into_iter().collect();
        state.nodes.retain(|n, _| !doomed.contains(n));
        state
            .relationships
            .retain(|(_, s, e), _| !doomed.contains(s) && !doomed.contains(e));
        for layer in state.layers.values_mut() {
            layer.members.retain(|n, _| !doomed.contains(n));
        }
        Ok(doomed.len() as u64)
    }

    async fn delete_relationships_by_type(&self, rel_type: &str) -> Result<u64, StoreError> {
        let mut state = self.lock();
        let before = state.relationships.len();
        state.relationships.retain(|(t, _, _), _| t != rel_type);
        Ok((before - state.relationships.len()) as u64)
    }

    async fn create_uniqueness_constraint(
        &self,
        name: &str,
        label: &str,
        property: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.constraints.contains_key(name) {
            return Ok(());
        }
        let mut seen = BTreeSet::new();
        for n in state.select(label, &Properties::new()) {
            if let Some(value) = state.nodes.get(&n).and_then(|node| node.properties.get(property)) {
                let rendered = value.to_string();
                if !seen.insert(rendered.clone()) {
                    return Err(StoreError::ConstraintViolation {
                        name: name.to_string(),
                        label: label.to_string(),
                        property: property.to_string(),
                        value: rendered,
                    });
                }
            }
        }
        state
            .constraints
            .insert(name.to_string(), (label.to_string(), property.to_string()));
        Ok(())
    }

    async fn drop_constraint(&self, name: &str) -> Result<(), StoreError> {
        self.lock().constraints.remove(name);
        Ok(())
    }

    async fn ensure_index(&self, label: &str, properties: &[&str]) -> Result<(), StoreError> {
        self.lock().indexes.insert((
            label.to_string(),
            properties.iter().map(|p| p.to_string()).collect(),
        ));
        Ok(())
    }

    async fn find_nodes(
        &self,
        label: &str,
        filter: &Properties,
    ) -> Result<Vec<NodeRecord>, StoreError> {
        let state = self.lock();
        Ok(state
            .select(label, filter)
            .into_iter()
            .filter_map(|n| state.record(n))
            .collect())
    }

    async fn find_related(
        &self,
        start: &NodeSelector,
        rel_type: &str,
        end_label: &str,
    ) -> Result<Vec<Related>, StoreError> {
        let state = self.lock();
        let starts: BTreeSet<u64> = state.select(&start.label, &start.key).into_iter().collect();
        Ok(state
            .relationships
            .iter()
            .filter(|((t, s, _), _)| t == rel_type && starts.contains(s))
            .filter_map(|((_, _, e), props)| {
                let node = state.record(*e)?;
                node.labels.iter().any(|l| l == end_label).then(|| Related {
                    node,
                    relationship: props.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl SpatialIndex for MemoryGraph {
    async fn ensure_layer(&self, layer: &str, class: LayerClass) -> Result<(), StoreError> {
        self.lock().layers.entry(layer.to_string()).or_insert(Layer {
            class,
            members: BTreeMap::new(),
        });
        Ok(())
    }

    async fn register(&self, layer: &str, node: &NodeId) -> Result<(), StoreError> {
        let mut state = self.lock();
        let n = parse_id(node)
            .filter(|n| state.nodes.contains_key(n))
            .ok_or_else(|| StoreError::MissingEndpoint(node.to_string()))?;
        let class = state
            .layers
            .get(layer)
            .map(|l| l.class)
            .ok_or_else(|| StoreError::UnknownLayer(layer.to_string()))?;
        let shape = match state.nodes.get(&n) {
            Some(stored) => node_shape(stored, class)?,
            None => return Err(StoreError::MissingEndpoint(node.to_string())),
        };
        if let Some(l) = state.layers.get_mut(layer) {
            l.members.insert(n, shape);
        }
        Ok(())
    }

    async fn remove_layer(&self, layer: &str) -> Result<(), StoreError> {
        self.lock().layers.remove(layer);
        Ok(())
    }

    async fn intersects(&self, layer: &str, wkt: &str) -> Result<Vec<NodeRecord>, StoreError> {
        let probe = parse_shape(wkt)?;
        let state = self.lock();
        let l = state
            .layers
            .get(layer)
            .ok_or_else(|| StoreError::UnknownLayer(layer.to_string()))?;
        Ok(l.members
            .iter()
            .filter(|(_, shape)| shape.intersects(&probe))
            .filter_map(|(n, _)| state.record(*n))
            .collect())
    }

    async fn within_distance(
        &self,
        layer: &str,
        latitude: f64,
        longitude: f64,
        distance_km: f64,
    ) -> Result<Vec<(NodeRecord, f64)>, StoreError> {
        let origin = Point::new(longitude, latitude);
        let state = self.lock();
        let l = state
            .layers
            .get(layer)
            .ok_or_else(|| StoreError::UnknownLayer(layer.to_string()))?;
        let mut hits: Vec<(NodeRecord, f64)> = l
            .members
            .iter()
            .map(|(n, shape)| (*n, shape.distance_km(&origin)))
            .filter(|(_, d)| *d <= distance_km)
            .filter_map(|(n, d)| Some((state.record(n)?, d)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(hits)
    }
}
