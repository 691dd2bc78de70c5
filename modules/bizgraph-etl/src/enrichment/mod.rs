//! Geoenrichment: category nodes for every enrichment label and the
//! HAS_ENRICHMENT edges that classify each block group.

pub mod classify;
pub mod metrics;

use bizgraph_common::names::{keys, labels, rels};
use bizgraph_common::{Properties, PropertyValue};
use bizgraph_graph::NodeSelector;
use bizgraph_sources::MetricsRow;

use crate::report::BatchReport;
use crate::topology::{write_edges, Edge};
use crate::writer::GraphWriter;

use classify::{
    AgeBand, AgeRepresentation, CrimeCategory, EducationRepresentation, GrowthRate,
    PopulationLevel, SpendingCategory, WealthCategory,
};
use metrics::DerivedMetrics;

/// One category a block group falls into, with the value that put it there.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub label: &'static str,
    pub category: Vec<(&'static str, &'static str)>,
    pub source_value: f64,
}

impl Assignment {
    fn single(label: &'static str, property: &'static str, value: &'static str, source_value: f64) -> Self {
        Self {
            label,
            category: vec![(property, value)],
            source_value,
        }
    }

    pub fn selector(&self) -> NodeSelector {
        NodeSelector {
            label: self.label.to_string(),
            key: self
                .category
                .iter()
                .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
                .collect(),
        }
    }
}

/// Every category a block group belongs to. Without population the age and
/// education shares fall to their lowest bucket at 0 and there is no
/// average age.
pub fn assignments(m: &DerivedMetrics) -> Vec<Assignment> {
    let mut out = vec![
        Assignment::single(
            labels::TOTAL_POPULATION,
            "level",
            PopulationLevel::classify(m.total_population).as_str(),
            m.total_population,
        ),
        Assignment::single(
            labels::POPULATION_GROWTH,
            "growth_rate",
            GrowthRate::classify(m.population_growth).as_str(),
            m.population_growth,
        ),
    ];
    if let Some(age) = m.average_age {
        out.push(Assignment::single(
            labels::AGE_AVERAGE,
            "group",
            AgeBand::classify(age).as_str(),
            age,
        ));
    }

    let populated = m.total_population > 0.0;
    for (band, count) in &m.age_bands {
        let share = if populated { count / m.total_population } else { 0.0 };
        let representation = if populated {
            AgeRepresentation::classify(share)
        } else {
            AgeRepresentation::VeryLow
        };
        out.push(Assignment {
            label: labels::AGE_GROUP,
            category: vec![("group", band.as_str()), ("representation", representation.as_str())],
            source_value: share,
        });
    }

    out.push(Assignment::single(
        labels::WEALTH_INDEX,
        "category",
        WealthCategory::classify(m.normalized_wealth).as_str(),
        m.normalized_wealth,
    ));

    for (tier, count) in &m.education {
        let share = if populated { count / m.total_population } else { 0.0 };
        let representation = if populated {
            EducationRepresentation::classify(share)
        } else {
            EducationRepresentation::VeryLow
        };
        out.push(Assignment {
            label: labels::EDUCATION_LEVEL,
            category: vec![("level", tier.as_str()), ("representation", representation.as_str())],
            source_value: share,
        });
    }

    out.push(Assignment::single(
        labels::CRIME_INDEX,
        "category",
        CrimeCategory::classify(m.crime_index).as_str(),
        m.crime_index,
    ));
    out.push(Assignment::single(
        labels::FAST_FOOD_SPENDING_INDEX,
        "category",
        SpendingCategory::classify(m.normalized_spend).as_str(),
        m.normalized_spend,
    ));
    out
}

/// Cartesian product of each property's allowed values.
fn combinations(properties: &[(String, Vec<String>)]) -> Vec<Properties> {
    properties
        .iter()
        .fold(vec![Properties::new()], |acc, (name, values)| {
            acc.iter()
                .flat_map(|partial| {
                    values.iter().map(move |v| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), PropertyValue::from(v));
                        next
                    })
                })
                .collect()
        })
}

/// Upsert every enrichment category node (the full product of each label's
/// enum values) and index the discriminators. Independent of block-group data.
pub async fn build_enrichment_nodes(writer: GraphWriter<'_>) -> BatchReport {
    let mut report = BatchReport::new("enrichment_nodes");
    for label in labels::ENRICHMENT {
        let Some(spec) = writer.catalog.node(label) else {
            report.fail(label, "label is not declared");
            continue;
        };
        let discriminators: Vec<(String, Vec<String>)> = spec
            .properties
            .iter()
            .filter_map(|(name, p)| p.allowed.clone().map(|values| (name.clone(), values)))
            .collect();
        let names: Vec<&str> = discriminators.iter().map(|(n, _)| n.as_str()).collect();

        for properties in combinations(&discriminators) {
            let key = NodeSelector {
                label: label.to_string(),
                key: properties.clone(),
            }
            .to_string();
            report.record(key, writer.node(label, &properties, &names).await);
        }

        for name in &names {
            if let Err(e) = writer.graph.ensure_index(label, &[*name]).await {
                report.fail(format!("index {label}.{name}"), e);
            }
        }
        if names.len() > 1 {
            if let Err(e) = writer.graph.ensure_index(label, &names).await {
                report.fail(format!("index {label} composite"), e);
            }
        }
    }
    report
}

pub fn enrichment_edges(m: &DerivedMetrics) -> Vec<Edge> {
    let block_group = NodeSelector::new(labels::BLOCK_GROUP, keys::CT_BLOCK_GROUP, m.ct_block_group.as_str());
    assignments(m)
        .into_iter()
        .map(|a| {
            let mut edge = Edge::new(rels::HAS_ENRICHMENT, block_group.clone(), a.selector());
            edge.properties
                .insert("source_value".to_string(), PropertyValue::Float(a.source_value));
            edge
        })
        .collect()
}

/// Classify every metrics row and link its block group to the categories.
pub async fn build_enrichment_relationships(writer: GraphWriter<'_>, rows: &[MetricsRow]) -> BatchReport {
    let mut unkeyed = BatchReport::new("enrichment_rows");
    let mut edges = Vec::new();
    for (key, derived) in metrics::derive(rows) {
        match derived {
            Ok(m) => edges.extend(enrichment_edges(&m)),
            Err(e) => unkeyed.fail(key, e),
        }
    }
    let mut report = write_edges(writer, "enrichment_relationships", edges).await;
    report.failures.extend(unkeyed.failures);
    report
}
