//! BlockGroup → Zipcode containment from polygon overlap.
//!
//! Candidates come from the zipcode layer's intersects predicate, fetched
//! concurrently; the overlap itself is computed here and the edges are
//! written serially afterwards.

use futures::stream::{self, StreamExt};
use geo::MultiPolygon;
use tracing::{debug, info};

use bizgraph_common::names::{keys, labels, layers, rels};
use bizgraph_common::{Properties, PropertyValue};
use bizgraph_graph::geometry::{overlap_ratio, parse_area, Containment, GeometryError};
use bizgraph_graph::{NodeRecord, NodeSelector, StoreError};

use crate::report::BatchReport;
use crate::topology::Edge;
use crate::writer::GraphWriter;

/// IS_WITHIN edge for one block group and one intersecting zipcode. Pairs
/// that only share a boundary still get an edge, Partial at ratio 0.
pub fn containment_edge(
    block_group: &str,
    block_group_area: &MultiPolygon<f64>,
    zipcode: &str,
    zipcode_wkt: &str,
) -> Result<Edge, GeometryError> {
    let zipcode_area = parse_area(zipcode_wkt)?;
    let ratio = overlap_ratio(block_group_area, &zipcode_area)?;
    let mut edge = Edge::new(
        rels::IS_WITHIN,
        NodeSelector::new(labels::BLOCK_GROUP, keys::CT_BLOCK_GROUP, block_group),
        NodeSelector::new(labels::ZIPCODE, keys::ZIPCODE_NUMBER, zipcode),
    );
    edge.properties = Properties::from([
        (
            "containment_type".to_string(),
            PropertyValue::from(Containment::from_ratio(ratio).as_str()),
        ),
        ("overlap_ratio".to_string(), PropertyValue::Float(ratio)),
    ]);
    Ok(edge)
}

struct Candidates {
    block_group: String,
    wkt: Option<String>,
    zipcodes: Result<Vec<NodeRecord>, StoreError>,
}

pub async fn build_block_group_containment(
    writer: GraphWriter<'_>,
    read_concurrency: usize,
) -> Result<BatchReport, StoreError> {
    let mut report = BatchReport::new("block_group_containment");
    let block_groups = writer
        .graph
        .find_nodes(labels::BLOCK_GROUP, &Properties::new())
        .await?;
    info!(count = block_groups.len(), "Computing block group containment");

    let candidates: Vec<Candidates> = stream::iter(block_groups.into_iter().map(|bg| async move {
        let block_group = bg.get_str(keys::CT_BLOCK_GROUP).unwrap_or_default().to_string();
        let wkt = bg.get_str(keys::WKT).map(str::to_string);
        let zipcodes = match &wkt {
            Some(wkt) => writer.graph.intersects(layers::ZIPCODE, wkt).await,
            None => Ok(Vec::new()),
        };
        Candidates {
            block_group,
            wkt,
            zipcodes,
        }
    }))
    .buffer_unordered(read_concurrency.max(1))
    .collect()
    .await;

    let mut edges = Vec::new();
    for candidate in candidates {
        let key = candidate.block_group.clone();
        let Some(wkt) = candidate.wkt else {
            report.fail(key, "block group has no geometry");
            continue;
        };
        let zipcodes = match candidate.zipcodes {
            Ok(z) => z,
            Err(e) => {
                report.fail(key, e);
                continue;
            }
        };
        debug!(block_group = key.as_str(), candidates = zipcodes.len(), "Zipcode candidates");
        let area = match parse_area(&wkt) {
            Ok(area) => area,
            Err(e) => {
                report.fail(key, e);
                continue;
            }
        };
        for zip in zipcodes.iter().filter(|z| z.labels.iter().any(|l| l == labels::ZIPCODE)) {
            let (Some(number), Some(zip_wkt)) = (zip.get_str(keys::ZIPCODE_NUMBER), zip.get_str(keys::WKT))
            else {
                continue;
            };
            match containment_edge(&key, &area, number, zip_wkt) {
                Ok(edge) => edges.push(edge),
                Err(e) => report.fail(format!("{key}->{number}"), e),
            }
        }
    }

    for edge in edges {
        let result = writer
            .relationship(edge.rel_type, &edge.start, &edge.end, &edge.properties)
            .await;
        report.record(edge.key(), result);
    }
    Ok(report)
}
