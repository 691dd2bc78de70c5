use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};

use bizgraph_common::BizGraphError;

use crate::cypher::Ident;

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropertyType {
    String,
    Integer,
    Float,
    Boolean,
    Point,
    List,
    Map,
    Enum,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "STRING",
            PropertyType::Integer => "INTEGER",
            PropertyType::Float => "FLOAT",
            PropertyType::Boolean => "BOOLEAN",
            PropertyType::Point => "POINT",
            PropertyType::List => "LIST",
            PropertyType::Map => "MAP",
            PropertyType::Enum => "ENUM",
        }
    }
}

/// Inclusive numeric bounds. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Range {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueSpec {
    pub constraint_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub exists: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<UniqueSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
    /// Start label → allowed end labels.
    #[serde(default)]
    pub mappings: BTreeMap<String, Vec<String>>,
}

impl RelationshipSpec {
    pub fn allows(&self, start: &str, end: &str) -> bool {
        self.mappings
            .get(start)
            .is_some_and(|ends| ends.iter().any(|e| e == end))
    }
}

/// Geometry kind held by a spatial layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerClass {
    #[serde(rename = "WKT")]
    Wkt,
    #[serde(rename = "Point")]
    Point,
}

impl LayerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerClass::Wkt => "WKT",
            LayerClass::Point => "Point",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialLayerSpec {
    pub nodes: Vec<String>,
    pub layer_class: LayerClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_property: Option<String>,
}

/// A uniqueness constraint declared on a node property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniquenessConstraint {
    pub name: String,
    pub label: String,
    pub property: String,
}

/// The declarative schema document: node labels, relationship types and
/// spatial layers with their property rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub nodes: BTreeMap<String, NodeSpec>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipSpec>,
    #[serde(default)]
    pub spatial_layers: BTreeMap<String, SpatialLayerSpec>,
}

impl SchemaCatalog {
    pub fn load(path: &Path) -> Result<Self, BizGraphError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BizGraphError::Schema(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, BizGraphError> {
        let catalog: Self = serde_json::from_str(raw)
            .map_err(|e| BizGraphError::Schema(format!("invalid schema document: {e}")))?;
        catalog.check()?;
        Ok(catalog)
    }

    /// Reject documents the builders and store could not honour.
    fn check(&self) -> Result<(), BizGraphError> {
        let fail = |msg: String| Err(BizGraphError::Schema(msg));

        let all_props = self
            .nodes
            .iter()
            .map(|(owner, spec)| (owner, &spec.properties))
            .chain(self.relationships.iter().map(|(owner, spec)| (owner, &spec.properties)));
        for (owner, props) in all_props {
            if Ident::new(owner).is_err() {
                return fail(format!("{owner:?} is not a valid label or relationship type"));
            }
            for (name, spec) in props {
                if Ident::new(name).is_err() {
                    return fail(format!("{owner}.{name} is not a valid property name"));
                }
                if spec.kind == PropertyType::Enum
                    && spec.allowed.as_ref().map_or(true, |v| v.is_empty())
                {
                    return fail(format!("{owner}.{name} is ENUM but declares no values"));
                }
            }
        }

        for (rel_type, spec) in &self.relationships {
            for (start, ends) in &spec.mappings {
                for label in std::iter::once(start).chain(ends) {
                    if !self.nodes.contains_key(label) {
                        return fail(format!("{rel_type} maps undeclared label {label}"));
                    }
                }
            }
        }

        for (layer, spec) in &self.spatial_layers {
            for label in &spec.nodes {
                if !self.nodes.contains_key(label) {
                    return fail(format!("layer {layer} lists undeclared label {label}"));
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, label: &str) -> Option<&NodeSpec> {
        self.nodes.get(label)
    }

    pub fn relationship(&self, rel_type: &str) -> Option<&RelationshipSpec> {
        self.relationships.get(rel_type)
    }

    pub fn layer(&self, name: &str) -> Option<&SpatialLayerSpec> {
        self.spatial_layers.get(name)
    }

    /// Allowed values of an ENUM property, in declaration order.
    pub fn enum_values(&self, label: &str, property: &str) -> Option<&[String]> {
        self.node(label)?
            .properties
            .get(property)?
            .allowed
            .as_deref()
    }

    pub fn uniqueness_constraints(&self) -> Vec<UniquenessConstraint> {
        self.nodes
            .iter()
            .flat_map(|(label, spec)| {
                spec.properties.iter().filter_map(move |(property, p)| {
                    p.unique.as_ref().map(|u| UniquenessConstraint {
                        name: u.constraint_name.clone(),
                        label: label.clone(),
                        property: property.clone(),
                    })
                })
            })
            .collect()
    }

    /// Human-readable rendering of the schema, used to ground downstream
    /// query generation.
    pub fn describe(&self) -> String {
        let mut out = String::from("Node Labels and Properties:\n");
        for (label, spec) in &self.nodes {
            let _ = write!(out, "\n{label}:\n");
            for (name, p) in &spec.properties {
                let _ = write!(out, "  - {name} ({})", p.kind.as_str());
                if let Some(values) = &p.allowed {
                    let _ = write!(out, ": {}", values.join(", "));
                }
                out.push('\n');
            }
        }

        out.push_str("\nRelationship Types and Directions:\n");
        for (rel_type, spec) in &self.relationships {
            let _ = write!(out, "\n{rel_type}:\n");
            if !spec.properties.is_empty() {
                out.push_str("  Properties:\n");
                for (name, p) in &spec.properties {
                    let _ = writeln!(out, "    - {name} ({})", p.kind.as_str());
                }
            }
            out.push_str("  Valid Directions:\n");
            for (start, ends) in &spec.mappings {
                for end in ends {
                    let _ = writeln!(out, "    - ({start})-[:{rel_type}]->({end})");
                }
            }
        }

        if !self.spatial_layers.is_empty() {
            out.push_str("\nSpatial Layers:\n");
            for (layer, spec) in &self.spatial_layers {
                let _ = write!(out, "\n{layer}:\n");
                let _ = writeln!(out, "  Nodes: {}", spec.nodes.join(", "));
                let _ = writeln!(out, "  Type: {}", spec.layer_class.as_str());
            }
        }
        out.trim_end().to_string()
    }
}
