//! Shared fixture: two block groups at the equator, three bounded zipcodes
//! and a small administrative topology around them.
//!
//! Geometry (lon x, lat y):
//!   - BlockGroup 1001: x 0..1, y 0..1
//!   - BlockGroup 2001: x 3..4, y 0..1 (overlaps no zipcode)
//!   - Zipcode 92101:   x 0.03..2 → 97% of 1001, Full
//!   - Zipcode 92102:   x -1..0.5 → 50% of 1001, Partial
//!   - Zipcode 92104:   x 10..11, far from everything

#![allow(dead_code)]

use std::sync::Arc;

use bizgraph_graph::{MemoryGraph, SchemaCatalog};
use bizgraph_sources::testing::{
    MockPlaceSearch, StaticAdministrative, StaticBlockGroups, StaticMetrics, StaticZipcodes,
};
use bizgraph_sources::{BlockGroupRow, CityRow, MetricsRow, NeighborhoodRow, ZipcodeRow};
use bizgraph_etl::Sources;

pub fn catalog() -> SchemaCatalog {
    SchemaCatalog::from_json(include_str!("../../../../config/constraints_schema.json"))
        .expect("schema document parses")
}

pub fn rect(x0: f64, x1: f64, y0: f64, y1: f64) -> String {
    format!("POLYGON(({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))")
}

pub fn block_group(id: &str, wkt: Option<String>) -> BlockGroupRow {
    BlockGroupRow {
        ctblockgroup: id.to_string(),
        tract: id[..id.len() - 1].to_string(),
        blockgroup: id[id.len() - 1..].to_string(),
        objectid: None,
        wkt,
    }
}

pub fn block_groups() -> Vec<BlockGroupRow> {
    vec![
        block_group("1001", Some(rect(0.0, 1.0, 0.0, 1.0))),
        block_group("2001", Some(rect(3.0, 4.0, 0.0, 1.0))),
    ]
}

pub fn zipcode_rows() -> Vec<ZipcodeRow> {
    vec![
        ZipcodeRow {
            zip: "92101".into(),
            geometry: Some(rect(0.03, 2.0, 0.0, 1.0)),
        },
        ZipcodeRow {
            zip: "92102".into(),
            geometry: Some(rect(-1.0, 0.5, 0.0, 1.0)),
        },
        ZipcodeRow {
            zip: "92104".into(),
            geometry: Some(rect(10.0, 11.0, 0.0, 1.0)),
        },
    ]
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn administrative() -> StaticAdministrative {
    StaticAdministrative {
        cities: vec![
            CityRow {
                id: "1".into(),
                city: "San Diego".into(),
                state_name: "California".into(),
                county: Some("San Diego County".into()),
                zipcodes: list(&["92101"]),
                neighboring_cities: list(&["La Mesa"]),
                neighborhoods: list(&["Little Italy"]),
                ..Default::default()
            },
            CityRow {
                id: "2".into(),
                city: "La Mesa".into(),
                state_name: "California".into(),
                zipcodes: list(&["92103"]),
                ..Default::default()
            },
        ],
        neighborhoods: vec![NeighborhoodRow {
            id: "7".into(),
            community: "Little Italy".into(),
            zipcodes: list(&["92101", "92102"]),
            nearby_cities: list(&["San Diego"]),
            ..Default::default()
        }],
    }
}

pub fn metrics_row(tract: &str, group: &str, population: f64, wealth: f64) -> MetricsRow {
    let mut row = MetricsRow {
        tractce: tract.into(),
        blkgrpce: group.into(),
        total_population: population,
        population_growth: 1.2,
        wealth_index: wealth,
        crime_index: 90.0,
        ..Default::default()
    };
    if population > 0.0 {
        row.male[6] = population / 2.0;
        row.female[7] = population / 2.0;
        row.high_school_graduate = population / 2.0;
        row.bachelor_degree = population / 2.0;
        row.fast_food = [100.0, 50.0, 25.0];
    }
    row
}

pub fn metrics() -> Vec<MetricsRow> {
    vec![
        metrics_row("000100", "1", 1500.0, 120.0),
        metrics_row("000200", "1", 0.0, 80.0),
    ]
}

pub fn sources(places: MockPlaceSearch) -> Sources {
    Sources::builder()
        .administrative(Arc::new(administrative()))
        .block_groups(Arc::new(StaticBlockGroups(block_groups())))
        .zipcodes(Arc::new(StaticZipcodes(zipcode_rows())))
        .metrics(Arc::new(StaticMetrics(metrics())))
        .places(Arc::new(places))
        .build()
}

/// Counts per relationship type, for before/after comparisons.
pub fn relationship_counts(graph: &MemoryGraph) -> Vec<(&'static str, usize)> {
    ["IS_WITHIN", "HAS_NEIGHBOR", "HAS_NEARBY", "HAS_NEIGHBORHOOD", "LOCATED_IN", "HAS_ENRICHMENT"]
        .into_iter()
        .map(|rel| (rel, graph.relationships(rel).len()))
        .collect()
}

pub fn node_counts(graph: &MemoryGraph) -> Vec<(&'static str, usize)> {
    ["Zipcode", "City", "Neighborhood", "BlockGroup", "Business"]
        .into_iter()
        .chain(bizgraph_common::names::labels::ENRICHMENT)
        .map(|label| (label, graph.node_count(label)))
        .collect()
}
