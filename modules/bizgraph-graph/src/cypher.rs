//! Query-building helpers. Values always travel as parameters; the only text
//! spliced into Cypher is labels, relationship types and property names, and
//! those must pass [`Ident::new`].

use std::fmt;
use std::sync::LazyLock;

use neo4rs::BoltType;
use regex::Regex;

use bizgraph_common::{Properties, PropertyValue};

use crate::store::StoreError;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// A label, relationship type or property name safe to splice into Cypher.
/// Renders backtick-quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(String);

impl Ident {
    pub fn new(raw: &str) -> Result<Self, StoreError> {
        if IDENTIFIER.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}

/// `{`a`: $p_a, `b`: $p_b}` for the given keys, binding each to a parameter
/// named `{prefix}{key}`. Empty when there are no keys.
pub fn map_pattern<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    prefix: &str,
) -> Result<String, StoreError> {
    let parts = keys
        .into_iter()
        .map(|k| Ident::new(k).map(|ident| format!("{ident}: ${prefix}{k}")))
        .collect::<Result<Vec<_>, _>>()?;
    if parts.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("{{{}}}", parts.join(", ")))
}

pub fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Boolean(b) => BoltType::from(*b),
        PropertyValue::Integer(i) => BoltType::from(*i),
        PropertyValue::Float(f) => BoltType::from(*f),
        PropertyValue::String(s) => BoltType::from(s.as_str()),
        PropertyValue::List(items) => BoltType::from(items.iter().map(to_bolt).collect::<Vec<_>>()),
        PropertyValue::Map(map) => properties_to_bolt(map),
    }
}

pub fn properties_to_bolt(properties: &Properties) -> BoltType {
    BoltType::Map(neo4rs::BoltMap::from_iter(
        properties
            .iter()
            .map(|(k, v)| (neo4rs::BoltString::from(k.as_str()), to_bolt(v))),
    ))
}
