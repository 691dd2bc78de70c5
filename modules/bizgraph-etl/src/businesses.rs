//! Business discovery and placement.
//!
//! Each block group is covered by one search circle; every business category
//! is searched per circle. Places outside the block group polygon are
//! dropped, the rest are upserted and linked to the block group and to the
//! zipcode whose polygon holds the point. A place returned more than once is
//! placed once, under its first request in block group then category order.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use geo::MultiPolygon;
use tracing::{info, warn};

use bizgraph_common::names::{keys, labels, layers, rels};
use bizgraph_common::{Properties, PropertyValue};
use bizgraph_graph::geometry::{contains_point, enclosing_circle, parse_area, SearchCircle};
use bizgraph_graph::{NodeSelector, Related, StoreError};
use bizgraph_sources::{Place, PlaceSearch, SourceError};

use crate::report::BatchReport;
use crate::writer::{GraphWriter, WriteError};

const BUSINESS_TYPE: &str = "business_type";

pub fn business_properties(place: &Place, category: &str) -> Properties {
    let mut p = Properties::from([
        (keys::BUSINESS_ID.to_string(), PropertyValue::from(place.id.as_str())),
        ("business_name".to_string(), place.display_name.as_str().into()),
        (BUSINESS_TYPE.to_string(), category.into()),
        ("latitude".to_string(), place.latitude.into()),
        ("longitude".to_string(), place.longitude.into()),
    ]);
    if let Some(address) = &place.address {
        p.insert("address".to_string(), address.into());
    }
    if let Some(rating) = place.rating {
        p.insert("rating".to_string(), rating.into());
    }
    if let Some(price_level) = &place.price_level {
        p.insert("price_level".to_string(), price_level.into());
    }
    p
}

fn zipcode_rank(related: &Related) -> (bool, f64) {
    let full = related.relationship.get("containment_type").and_then(PropertyValue::as_str) == Some("Full");
    let ratio = related
        .relationship
        .get("overlap_ratio")
        .and_then(PropertyValue::as_f64)
        .unwrap_or(0.0);
    (full, ratio)
}

fn zipcode_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Zipcode among the block group's IS_WITHIN targets whose polygon contains
/// the point. Ties prefer full containment, then the larger overlap ratio,
/// then the lowest zipcode number.
pub fn choose_zipcode(candidates: &[Related], latitude: f64, longitude: f64) -> Option<String> {
    let mut holding: Vec<(&str, (bool, f64))> = candidates
        .iter()
        .filter_map(|r| {
            let number = r.node.get_str(keys::ZIPCODE_NUMBER)?;
            let area = parse_area(r.node.get_str(keys::WKT)?).ok()?;
            contains_point(&area, latitude, longitude).then(|| (number, zipcode_rank(r)))
        })
        .collect();

    holding.sort_by(|(za, (fa, ra)), (zb, (fb, rb))| {
        fb.cmp(fa)
            .then_with(|| rb.partial_cmp(ra).unwrap_or(Ordering::Equal))
            .then_with(|| zipcode_order(za, zb))
    });
    holding.first().map(|(z, _)| z.to_string())
}

/// A block group prepared for search.
struct Cell {
    block_group: String,
    area: MultiPolygon<f64>,
    circle: SearchCircle,
}

struct Found {
    block_group: String,
    category: String,
    place: Place,
}

async fn place_business(
    writer: GraphWriter<'_>,
    found: &Found,
) -> Result<Option<String>, WriteError> {
    let place = &found.place;
    let properties = business_properties(place, &found.category);
    writer
        .spatial_node(labels::BUSINESS, &properties, &[keys::BUSINESS_ID], layers::BUSINESS)
        .await?;

    let business = NodeSelector::new(labels::BUSINESS, keys::BUSINESS_ID, place.id.as_str());
    let block_group = NodeSelector::new(
        labels::BLOCK_GROUP,
        keys::CT_BLOCK_GROUP,
        found.block_group.as_str(),
    );
    writer
        .relationship(rels::LOCATED_IN, &business, &block_group, &Properties::new())
        .await?;

    let candidates = writer
        .graph
        .find_related(&block_group, rels::IS_WITHIN, labels::ZIPCODE)
        .await?;
    let Some(zipcode) = choose_zipcode(&candidates, place.latitude, place.longitude) else {
        warn!(
            business_id = place.id.as_str(),
            block_group = found.block_group.as_str(),
            "No zipcode polygon contains business"
        );
        return Ok(None);
    };
    let zip = NodeSelector::new(labels::ZIPCODE, keys::ZIPCODE_NUMBER, zipcode.as_str());
    writer
        .relationship(rels::LOCATED_IN, &business, &zip, &Properties::new())
        .await?;
    Ok(Some(zipcode))
}

/// Search, filter and place businesses for every block group in the graph.
/// Returns the search batch and the placement batch.
pub async fn build_businesses(
    writer: GraphWriter<'_>,
    search: &dyn PlaceSearch,
    read_concurrency: usize,
) -> Result<(BatchReport, BatchReport), StoreError> {
    let categories: Vec<String> = writer
        .catalog
        .enum_values(labels::BUSINESS, BUSINESS_TYPE)
        .map(<[String]>::to_vec)
        .unwrap_or_default();

    let mut searches = BatchReport::new("business_search");
    let mut cells = Vec::new();
    for bg in writer
        .graph
        .find_nodes(labels::BLOCK_GROUP, &Properties::new())
        .await?
    {
        let block_group = bg.get_str(keys::CT_BLOCK_GROUP).unwrap_or_default().to_string();
        let area = match bg.get_str(keys::WKT).map(parse_area) {
            Some(Ok(area)) => area,
            Some(Err(e)) => {
                searches.fail(block_group, e);
                continue;
            }
            None => {
                searches.fail(block_group, "block group has no geometry");
                continue;
            }
        };
        match enclosing_circle(&area) {
            Some(circle) => cells.push(Cell {
                block_group,
                area,
                circle,
            }),
            None => searches.fail(block_group, "block group has no centroid"),
        }
    }
    cells.sort_by(|a, b| a.block_group.cmp(&b.block_group));
    info!(cells = cells.len(), categories = categories.len(), "Searching for businesses");

    let requests = cells
        .iter()
        .flat_map(|cell| categories.iter().map(move |category| (cell, category)));
    let responses: Vec<(&Cell, &String, Result<Vec<Place>, SourceError>)> =
        stream::iter(requests.map(|(cell, category)| async move {
            let c = &cell.circle;
            let result = search
                .search_nearby(c.latitude, c.longitude, c.radius_m, category)
                .await;
            (cell, category, result)
        }))
        // Request order: a place found twice keeps the lowest block group and
        // the earliest category in the catalog enum.
        .buffered(read_concurrency.max(1))
        .collect()
        .await;

    let mut seen = BTreeSet::new();
    let mut found = Vec::new();
    for (cell, category, result) in responses {
        let key = format!("{}/{}/{}", cell.block_group, cell.circle.cell, category);
        let Some(places) = searches.record(key, result) else {
            continue;
        };
        for place in places {
            if !contains_point(&cell.area, place.latitude, place.longitude) {
                continue;
            }
            if seen.insert(place.id.clone()) {
                found.push(Found {
                    block_group: cell.block_group.clone(),
                    category: category.clone(),
                    place,
                });
            }
        }
    }
    // Writes go in id order.
    found.sort_by(|a, b| a.place.id.cmp(&b.place.id));

    let mut placements = BatchReport::new("businesses");
    for f in &found {
        placements.record(f.place.id.as_str(), place_business(writer, f).await);
    }
    Ok((searches, placements))
}
