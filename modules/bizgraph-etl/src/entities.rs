//! Row → node builders for the administrative geography and block groups.

use std::collections::BTreeMap;

use bizgraph_common::names::{keys, labels, layers};
use bizgraph_common::{Properties, PropertyValue};
use bizgraph_sources::{BlockGroupRow, CityRow, NeighborhoodRow, ZipcodeRow};

use crate::report::BatchReport;
use crate::writer::GraphWriter;

fn props<const N: usize>(entries: [(&str, PropertyValue); N]) -> Properties {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Every zipcode named by any source, with its boundary when the boundary
/// file has one.
pub fn collect_zipcodes(
    cities: &[CityRow],
    neighborhoods: &[NeighborhoodRow],
    boundaries: &[ZipcodeRow],
) -> BTreeMap<String, Option<String>> {
    let mut zipcodes: BTreeMap<String, Option<String>> = BTreeMap::new();
    let listed = cities
        .iter()
        .flat_map(|c| c.zipcodes.iter())
        .chain(neighborhoods.iter().flat_map(|n| n.zipcodes.iter()));
    for zip in listed {
        let zip = zip.trim();
        if !zip.is_empty() {
            zipcodes.entry(zip.to_string()).or_default();
        }
    }
    for row in boundaries {
        let zip = row.zip.trim();
        if zip.is_empty() {
            continue;
        }
        let slot = zipcodes.entry(zip.to_string()).or_default();
        if slot.is_none() {
            *slot = row.geometry.clone();
        }
    }
    zipcodes
}

pub fn zipcode_properties(zipcode: &str, wkt: Option<&str>) -> Properties {
    let mut p = props([(keys::ZIPCODE_NUMBER, zipcode.into())]);
    if let Some(wkt) = wkt {
        p.insert(keys::WKT.to_string(), wkt.into());
    }
    p
}

pub fn city_properties(row: &CityRow) -> Properties {
    let mut p = props([
        (keys::CITY_ID, row.id.trim().into()),
        (keys::CITY_NAME, row.city.as_str().into()),
        ("state_name", row.state_name.as_str().into()),
        ("is_unincorporated", row.is_unincorporated_place.into()),
    ]);
    if let Some(county) = &row.county {
        p.insert("county".to_string(), county.into());
    }
    p
}

pub fn neighborhood_properties(row: &NeighborhoodRow) -> Properties {
    props([
        (keys::NEIGHBORHOOD_ID, row.id.trim().into()),
        (keys::NEIGHBORHOOD_NAME, row.community.as_str().into()),
    ])
}

pub fn block_group_properties(row: &BlockGroupRow) -> Properties {
    let mut p = props([
        (keys::CT_BLOCK_GROUP, row.ctblockgroup.trim().into()),
        ("census_tract", row.tract.trim().into()),
        ("block_group", row.blockgroup.trim().into()),
    ]);
    if let Some(object_id) = &row.objectid {
        p.insert("object_id".to_string(), object_id.trim().into());
    }
    if let Some(wkt) = &row.wkt {
        p.insert(keys::WKT.to_string(), wkt.into());
    }
    p
}

pub async fn build_zipcodes(
    writer: GraphWriter<'_>,
    zipcodes: &BTreeMap<String, Option<String>>,
) -> BatchReport {
    let mut report = BatchReport::new("zipcodes");
    for (zipcode, wkt) in zipcodes {
        let properties = zipcode_properties(zipcode, wkt.as_deref());
        let key = [keys::ZIPCODE_NUMBER];
        let result = match wkt {
            Some(_) => {
                writer
                    .spatial_node(labels::ZIPCODE, &properties, &key, layers::ZIPCODE)
                    .await
            }
            None => writer.node(labels::ZIPCODE, &properties, &key).await,
        };
        report.record(zipcode.as_str(), result);
    }
    report
}

pub async fn build_cities(writer: GraphWriter<'_>, rows: &[CityRow]) -> BatchReport {
    let mut report = BatchReport::new("cities");
    for row in rows {
        let result = writer
            .node(labels::CITY, &city_properties(row), &[keys::CITY_ID])
            .await;
        report.record(row.id.trim(), result);
    }
    report
}

pub async fn build_neighborhoods(writer: GraphWriter<'_>, rows: &[NeighborhoodRow]) -> BatchReport {
    let mut report = BatchReport::new("neighborhoods");
    for row in rows {
        let result = writer
            .node(
                labels::NEIGHBORHOOD,
                &neighborhood_properties(row),
                &[keys::NEIGHBORHOOD_ID],
            )
            .await;
        report.record(row.id.trim(), result);
    }
    report
}

pub async fn build_block_groups(writer: GraphWriter<'_>, rows: &[BlockGroupRow]) -> BatchReport {
    let mut report = BatchReport::new("block_groups");
    for row in rows {
        let result = writer
            .spatial_node(
                labels::BLOCK_GROUP,
                &block_group_properties(row),
                &[keys::CT_BLOCK_GROUP],
                layers::BLOCK_GROUP,
            )
            .await;
        report.record(row.ctblockgroup.trim(), result);
    }
    report
}
