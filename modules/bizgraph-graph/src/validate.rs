use std::collections::BTreeMap;

use thiserror::Error;

use bizgraph_common::{Properties, PropertyValue};

use crate::schema::{PropertySpec, PropertyType, SchemaCatalog};

/// A candidate node or relationship does not conform to the schema document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("unknown label {0}")]
    UnknownLabel(String),

    #[error("unknown relationship type {0}")]
    UnknownRelationship(String),

    #[error("({start})-[:{rel_type}]->({end}) is not a declared direction")]
    InvalidDirection {
        rel_type: String,
        start: String,
        end: String,
    },

    #[error("{owner}.{property} is not declared")]
    Undeclared { owner: String, property: String },

    #[error("{owner}.{property} is required")]
    MissingRequired { owner: String, property: String },

    #[error("{owner}.{property} expects {expected}, got {found}")]
    TypeMismatch {
        owner: String,
        property: String,
        expected: &'static str,
        found: String,
    },

    #[error("{owner}.{property} value {value:?} is not one of {allowed:?}")]
    NotInEnum {
        owner: String,
        property: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("{owner}.{property} value {value} is outside [{min}, {max}]")]
    OutOfRange {
        owner: String,
        property: String,
        value: f64,
        min: String,
        max: String,
    },
}

impl SchemaCatalog {
    /// Check a node's full property set against its label.
    pub fn validate_node(&self, label: &str, properties: &Properties) -> Result<(), SchemaViolation> {
        let spec = self
            .node(label)
            .ok_or_else(|| SchemaViolation::UnknownLabel(label.to_string()))?;
        check_properties(label, &spec.properties, properties)
    }

    /// Check a relationship's type, direction and property set.
    pub fn validate_relationship(
        &self,
        rel_type: &str,
        start_label: &str,
        end_label: &str,
        properties: &Properties,
    ) -> Result<(), SchemaViolation> {
        let spec = self
            .relationship(rel_type)
            .ok_or_else(|| SchemaViolation::UnknownRelationship(rel_type.to_string()))?;
        if !spec.allows(start_label, end_label) {
            return Err(SchemaViolation::InvalidDirection {
                rel_type: rel_type.to_string(),
                start: start_label.to_string(),
                end: end_label.to_string(),
            });
        }
        check_properties(rel_type, &spec.properties, properties)
    }
}

fn check_properties(
    owner: &str,
    declared: &BTreeMap<String, PropertySpec>,
    properties: &Properties,
) -> Result<(), SchemaViolation> {
    if let Some(extra) = properties.keys().find(|k| !declared.contains_key(*k)) {
        return Err(SchemaViolation::Undeclared {
            owner: owner.to_string(),
            property: extra.clone(),
        });
    }

    for (name, spec) in declared {
        match properties.get(name) {
            Some(value) => check_value(owner, name, spec, value)?,
            None if spec.exists => {
                return Err(SchemaViolation::MissingRequired {
                    owner: owner.to_string(),
                    property: name.clone(),
                })
            }
            None => {}
        }
    }
    Ok(())
}

fn is_finite_number(value: Option<&PropertyValue>) -> bool {
    value.and_then(PropertyValue::as_f64).is_some_and(f64::is_finite)
}

fn type_matches(kind: PropertyType, value: &PropertyValue) -> bool {
    match (kind, value) {
        (PropertyType::String | PropertyType::Enum, PropertyValue::String(_)) => true,
        (PropertyType::Integer, PropertyValue::Integer(_)) => true,
        (PropertyType::Float, PropertyValue::Integer(_)) => true,
        (PropertyType::Float, PropertyValue::Float(f)) => f.is_finite(),
        (PropertyType::Boolean, PropertyValue::Boolean(_)) => true,
        (PropertyType::Point, PropertyValue::Map(m)) => {
            is_finite_number(m.get("latitude")) && is_finite_number(m.get("longitude"))
        }
        (PropertyType::List, PropertyValue::List(_)) => true,
        (PropertyType::Map, PropertyValue::Map(_)) => true,
        _ => false,
    }
}

fn check_value(
    owner: &str,
    name: &str,
    spec: &PropertySpec,
    value: &PropertyValue,
) -> Result<(), SchemaViolation> {
    if !type_matches(spec.kind, value) {
        return Err(SchemaViolation::TypeMismatch {
            owner: owner.to_string(),
            property: name.to_string(),
            expected: spec.kind.as_str(),
            found: match value {
                PropertyValue::Float(f) if !f.is_finite() => format!("non-finite float {f}"),
                other => other.kind().to_string(),
            },
        });
    }

    if let (Some(allowed), PropertyValue::String(s)) = (&spec.allowed, value) {
        if !allowed.iter().any(|a| a == s) {
            return Err(SchemaViolation::NotInEnum {
                owner: owner.to_string(),
                property: name.to_string(),
                value: s.clone(),
                allowed: allowed.clone(),
            });
        }
    }

    if let (Some(range), Some(number)) = (&spec.range, value.as_f64()) {
        if !range.contains(number) {
            let bound = |b: Option<f64>| b.map_or("-".to_string(), |v| v.to_string());
            return Err(SchemaViolation::OutOfRange {
                owner: owner.to_string(),
                property: name.to_string(),
                value: number,
                min: bound(range.min),
                max: bound(range.max),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "nodes": {
            "Business": {
                "properties": {
                    "business_id": {"type": "STRING", "exists": true},
                    "business_type": {"type": "ENUM", "exists": true, "enum": ["bakery", "grocery_store"]},
                    "rating": {"type": "FLOAT", "range": {"min": 0.0, "max": 5.0}},
                    "visits": {"type": "INTEGER"},
                    "open": {"type": "BOOLEAN"},
                    "location": {"type": "POINT"},
                    "tags": {"type": "LIST"}
                }
            },
            "BlockGroup": {"properties": {"ct_block_group": {"type": "STRING", "exists": true}}},
            "Zipcode": {"properties": {"zipcode_number": {"type": "STRING", "exists": true}}}
        },
        "relationships": {
            "IS_WITHIN": {
                "properties": {
                    "containment_type": {"type": "ENUM", "exists": true, "enum": ["Full", "Partial"]},
                    "overlap_ratio": {"type": "FLOAT", "range": {"min": 0.0, "max": 1.0}}
                },
                "mappings": {"BlockGroup": ["Zipcode"]}
            }
        }
    }"#;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::from_json(SCHEMA).unwrap()
    }

    fn business() -> Properties {
        let mut p = Properties::new();
        p.insert("business_id".into(), "b1".into());
        p.insert("business_type".into(), "bakery".into());
        p
    }

    fn with(mut p: Properties, key: &str, value: impl Into<PropertyValue>) -> Properties {
        p.insert(key.to_string(), value.into());
        p
    }

    #[test]
    fn minimal_business_is_valid() {
        assert_eq!(catalog().validate_node("Business", &business()), Ok(()));
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert_eq!(
            catalog().validate_node("Restaurant", &business()),
            Err(SchemaViolation::UnknownLabel("Restaurant".into()))
        );
    }

    #[test]
    fn undeclared_property_is_rejected() {
        let err = catalog()
            .validate_node("Business", &with(business(), "color", "red"))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::Undeclared { property, .. } if property == "color"));
    }

    #[test]
    fn required_property_absent_is_rejected() {
        let mut p = business();
        p.remove("business_id");
        let err = catalog().validate_node("Business", &p).unwrap_err();
        assert!(matches!(err, SchemaViolation::MissingRequired { property, .. } if property == "business_id"));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let c = catalog();
        assert!(c.validate_node("Business", &with(business(), "rating", 0.0)).is_ok());
        assert!(c.validate_node("Business", &with(business(), "rating", 5.0)).is_ok());
        assert!(matches!(
            c.validate_node("Business", &with(business(), "rating", 5.01)),
            Err(SchemaViolation::OutOfRange { .. })
        ));
        assert!(matches!(
            c.validate_node("Business", &with(business(), "rating", -0.01)),
            Err(SchemaViolation::OutOfRange { .. })
        ));
    }

    #[test]
    fn float_accepts_integers_but_not_nan() {
        let c = catalog();
        assert!(c.validate_node("Business", &with(business(), "rating", 4_i64)).is_ok());
        assert!(matches!(
            c.validate_node("Business", &with(business(), "rating", f64::NAN)),
            Err(SchemaViolation::TypeMismatch { .. })
        ));
    }

    #[test]
    fn type_mismatches_are_rejected() {
        let c = catalog();
        for (key, value) in [
            ("visits", PropertyValue::Float(1.5)),
            ("open", PropertyValue::from("yes")),
            ("tags", PropertyValue::from("a,b")),
            ("business_id", PropertyValue::Integer(7)),
        ] {
            assert!(
                matches!(
                    c.validate_node("Business", &with(business(), key, value)),
                    Err(SchemaViolation::TypeMismatch { .. })
                ),
                "{key} should mismatch"
            );
        }
    }

    #[test]
    fn point_requires_numeric_coordinates() {
        let c = catalog();
        assert!(c
            .validate_node("Business", &with(business(), "location", PropertyValue::point(32.7, -117.1)))
            .is_ok());

        let mut half = BTreeMap::new();
        half.insert("latitude".to_string(), PropertyValue::Float(32.7));
        half.insert("longitude".to_string(), PropertyValue::from("west"));
        assert!(matches!(
            c.validate_node("Business", &with(business(), "location", PropertyValue::Map(half))),
            Err(SchemaViolation::TypeMismatch { .. })
        ));
    }

    #[test]
    fn enum_outside_allow_list_is_rejected() {
        let err = catalog()
            .validate_node("Business", &with(business(), "business_type", "florist"))
            .unwrap_err();
        assert!(matches!(err, SchemaViolation::NotInEnum { value, .. } if value == "florist"));
    }

    #[test]
    fn relationship_direction_is_checked() {
        let c = catalog();
        let mut props = Properties::new();
        props.insert("containment_type".into(), "Full".into());
        props.insert("overlap_ratio".into(), 0.97.into());
        assert!(c
            .validate_relationship("IS_WITHIN", "BlockGroup", "Zipcode", &props)
            .is_ok());
        assert!(matches!(
            c.validate_relationship("IS_WITHIN", "Zipcode", "BlockGroup", &props),
            Err(SchemaViolation::InvalidDirection { .. })
        ));
        assert!(matches!(
            c.validate_relationship("CONTAINS", "BlockGroup", "Zipcode", &props),
            Err(SchemaViolation::UnknownRelationship(_))
        ));
    }
}
