//! Administrative edges taken directly from the upstream lists: zipcode
//! containment, neighborhoods of a city, and neighbor/nearby adjacency.

use bizgraph_common::names::{keys, labels, rels};
use bizgraph_common::Properties;
use bizgraph_graph::geometry::Containment;
use bizgraph_graph::NodeSelector;
use bizgraph_sources::{CityRow, NeighborhoodRow};

use crate::report::BatchReport;
use crate::writer::GraphWriter;

/// One relationship to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub rel_type: &'static str,
    pub start: NodeSelector,
    pub end: NodeSelector,
    pub properties: Properties,
}

impl Edge {
    pub fn new(rel_type: &'static str, start: NodeSelector, end: NodeSelector) -> Self {
        Self {
            rel_type,
            start,
            end,
            properties: Properties::new(),
        }
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn key(&self) -> String {
        format!("{}-[:{}]->{}", self.start, self.rel_type, self.end)
    }
}

fn names(list: &[String]) -> impl Iterator<Item = &str> {
    list.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn zipcode(zip: &str) -> NodeSelector {
    NodeSelector::new(labels::ZIPCODE, keys::ZIPCODE_NUMBER, zip)
}

fn city_named(name: &str) -> NodeSelector {
    NodeSelector::new(labels::CITY, keys::CITY_NAME, name)
}

fn neighborhood_named(name: &str) -> NodeSelector {
    NodeSelector::new(labels::NEIGHBORHOOD, keys::NEIGHBORHOOD_NAME, name)
}

fn within_zipcodes(start: &NodeSelector, zipcodes: &[String]) -> Vec<Edge> {
    let listed: Vec<&str> = names(zipcodes).collect();
    let containment = Containment::from_listed_zipcodes(listed.len());
    listed
        .into_iter()
        .map(|zip| {
            Edge::new(rels::IS_WITHIN, start.clone(), zipcode(zip))
                .with("containment_type", containment.as_str())
        })
        .collect()
}

pub fn city_edges(row: &CityRow) -> Vec<Edge> {
    let start = NodeSelector::new(labels::CITY, keys::CITY_ID, row.id.trim());
    let mut edges = within_zipcodes(&start, &row.zipcodes);

    edges.extend(
        names(&row.neighborhoods)
            .map(|n| Edge::new(rels::HAS_NEIGHBORHOOD, start.clone(), neighborhood_named(n))),
    );
    edges.extend(
        names(&row.neighboring_cities)
            .chain(names(&row.neighboring_unincorporated_places))
            .map(|c| {
                Edge::new(rels::HAS_NEIGHBOR, start.clone(), city_named(c))
                    .with("neighbor_type", labels::CITY)
            }),
    );
    edges.extend(
        names(&row.nearby_cities)
            .chain(names(&row.nearby_unincorporated_places))
            .map(|c| {
                Edge::new(rels::HAS_NEARBY, start.clone(), city_named(c))
                    .with("nearby_type", labels::CITY)
            }),
    );
    edges
}

pub fn neighborhood_edges(row: &NeighborhoodRow) -> Vec<Edge> {
    let start = NodeSelector::new(labels::NEIGHBORHOOD, keys::NEIGHBORHOOD_ID, row.id.trim());
    let mut edges = within_zipcodes(&start, &row.zipcodes);

    edges.extend(names(&row.neighboring_communities).map(|n| {
        Edge::new(rels::HAS_NEIGHBOR, start.clone(), neighborhood_named(n))
            .with("neighbor_type", labels::NEIGHBORHOOD)
    }));
    edges.extend(
        names(&row.neighboring_cities)
            .chain(names(&row.neighboring_unincorporated_places))
            .map(|c| {
                Edge::new(rels::HAS_NEIGHBOR, start.clone(), city_named(c))
                    .with("neighbor_type", labels::CITY)
            }),
    );
    edges.extend(names(&row.nearby_communities).map(|n| {
        Edge::new(rels::HAS_NEARBY, start.clone(), neighborhood_named(n))
            .with("nearby_type", labels::NEIGHBORHOOD)
    }));
    edges.extend(
        names(&row.nearby_cities)
            .chain(names(&row.nearby_unincorporated_places))
            .map(|c| {
                Edge::new(rels::HAS_NEARBY, start.clone(), city_named(c))
                    .with("nearby_type", labels::CITY)
            }),
    );
    edges
}

/// Write edges one at a time, recording each outcome.
pub async fn write_edges(
    writer: GraphWriter<'_>,
    name: &str,
    edges: impl IntoIterator<Item = Edge>,
) -> BatchReport {
    let mut report = BatchReport::new(name);
    for edge in edges {
        let result = writer
            .relationship(edge.rel_type, &edge.start, &edge.end, &edge.properties)
            .await;
        report.record(edge.key(), result);
    }
    report
}

pub async fn build_city_relationships(writer: GraphWriter<'_>, rows: &[CityRow]) -> BatchReport {
    write_edges(writer, "city_relationships", rows.iter().flat_map(city_edges)).await
}

pub async fn build_neighborhood_relationships(
    writer: GraphWriter<'_>,
    rows: &[NeighborhoodRow],
) -> BatchReport {
    write_edges(
        writer,
        "neighborhood_relationships",
        rows.iter().flat_map(neighborhood_edges),
    )
    .await
}
