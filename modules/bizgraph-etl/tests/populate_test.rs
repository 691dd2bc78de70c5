//! Full population runs against the in-memory graph.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bizgraph_etl::{Component, PopulateOptions, Populator, Selection, Sources};
use bizgraph_graph::MemoryGraph;
use bizgraph_sources::{Place, PlaceSearch, SourceError};
use bizgraph_sources::testing::{
    place, FailingSource, MockPlaceSearch, StaticBlockGroups, StaticMetrics, StaticZipcodes,
};

use common::{catalog, node_counts, relationship_counts, sources};

fn places() -> MockPlaceSearch {
    MockPlaceSearch::new()
        .on_category("grocery_store", vec![place("p-in", 0.5, 0.8), place("p-out", 5.0, 5.0)])
        .failing("bakery")
}

fn edges_from(
    graph: &MemoryGraph,
    rel: &str,
    start_key: &str,
    start_value: &str,
) -> Vec<(String, bizgraph_common::Properties)> {
    graph
        .relationships(rel)
        .into_iter()
        .filter(|(s, _, _)| s.get_str(start_key) == Some(start_value))
        .map(|(_, e, p)| (e.labels.join(":"), p))
        .collect()
}

#[tokio::test]
async fn full_run_builds_every_layer_of_the_graph() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let populator = Populator::new(&graph, &catalog, sources(places()));

    let report = populator.run(&PopulateOptions::builder().build()).await;

    assert!(report.aborted().is_empty(), "aborted: {:?}", report.components);
    assert_eq!(report.components.len(), 4);
    assert!(report.constraints.as_ref().unwrap().is_clean());
    assert!(graph.constraint_names().contains(&"ct_block_group_unique".to_string()));

    assert_eq!(graph.node_count("BlockGroup"), 2);
    assert_eq!(graph.node_count("Zipcode"), 4);
    assert_eq!(graph.node_count("City"), 2);
    assert_eq!(graph.node_count("Neighborhood"), 1);
    assert_eq!(graph.node_count("Business"), 1);

    assert_eq!(graph.relationships("HAS_NEIGHBOR").len(), 1);
    assert_eq!(graph.relationships("HAS_NEARBY").len(), 1);
    assert_eq!(graph.relationships("HAS_NEIGHBORHOOD").len(), 1);
    assert_eq!(graph.relationships("IS_WITHIN").len(), 6);
}

#[tokio::test]
async fn block_group_containment_follows_overlap() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    Populator::new(&graph, &catalog, sources(MockPlaceSearch::new()))
        .run(&PopulateOptions::builder().build())
        .await;

    let mut within: Vec<(String, f64)> = graph
        .relationships("IS_WITHIN")
        .into_iter()
        .filter(|(s, _, _)| s.get_str("ct_block_group") == Some("1001"))
        .map(|(_, zip, p)| {
            (
                format!(
                    "{}:{}",
                    zip.get_str("zipcode_number").unwrap(),
                    p["containment_type"].as_str().unwrap()
                ),
                p["overlap_ratio"].as_f64().unwrap(),
            )
        })
        .collect();
    within.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(within.len(), 2);
    assert_eq!(within[0].0, "92101:Full");
    assert!((within[0].1 - 0.97).abs() < 1e-9);
    assert_eq!(within[1].0, "92102:Partial");
    assert!((within[1].1 - 0.5).abs() < 1e-9);

    assert!(edges_from(&graph, "IS_WITHIN", "ct_block_group", "2001").is_empty());
}

#[tokio::test]
async fn zipcodes_merge_listed_and_bounded_sources() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    Populator::new(&graph, &catalog, sources(MockPlaceSearch::new()))
        .run(&PopulateOptions::builder().build())
        .await;

    let bounded: Vec<String> = graph
        .layer_members("zipcode_layer")
        .iter()
        .filter_map(|z| z.get_str("zipcode_number").map(str::to_string))
        .collect();
    assert_eq!(bounded.len(), 3);
    // Listed by La Mesa only, with no boundary in the file.
    assert!(!bounded.contains(&"92103".to_string()));
    assert_eq!(graph.node_count("Zipcode"), 4);

    let mut neighborhood_zips: Vec<String> =
        edges_from(&graph, "IS_WITHIN", "neighborhood_id", "7")
            .into_iter()
            .map(|(_, p)| p["containment_type"].as_str().unwrap().to_string())
            .collect();
    neighborhood_zips.sort();
    assert_eq!(neighborhood_zips, vec!["Partial", "Partial"]);
    let city = edges_from(&graph, "IS_WITHIN", "city_id", "1");
    assert_eq!(city[0].1["containment_type"].as_str(), Some("Full"));
}

#[tokio::test]
async fn businesses_link_to_block_group_and_holding_zipcode() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let search = Arc::new(places());
    let mut sources = sources(MockPlaceSearch::new());
    sources.places = Some(search.clone());

    let report = Populator::new(&graph, &catalog, sources)
        .run(&PopulateOptions::builder().build())
        .await;

    let businesses = report.component(Component::Businesses).unwrap();
    assert!(businesses.error.is_none());
    let searches = businesses.batch("business_search").unwrap();
    // One failing category per block group.
    assert_eq!(searches.failed(), 2);
    assert!(searches.failures.iter().all(|f| f.key.ends_with("/bakery")));
    assert_eq!(businesses.batch("businesses").unwrap().succeeded, 1);
    assert_eq!(search.calls().len(), 2 * 3);

    let located = edges_from(&graph, "LOCATED_IN", "business_id", "p-in");
    let mut targets: Vec<String> = located.into_iter().map(|(label, _)| label).collect();
    targets.sort();
    assert_eq!(targets, vec!["BlockGroup", "Zipcode"]);

    let zipcode: Vec<String> = graph
        .relationships("LOCATED_IN")
        .into_iter()
        .filter_map(|(_, end, _)| end.get_str("zipcode_number").map(str::to_string))
        .collect();
    assert_eq!(zipcode, vec!["92101"]);
    assert_eq!(graph.layer_members("business_layer").len(), 1);
}

#[tokio::test]
async fn enrichment_classifies_each_block_group() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let mut sources = sources(MockPlaceSearch::new());
    let mut rows = common::metrics();
    // Tract 3 has no block group node.
    rows.push(common::metrics_row("000300", "1", 10.0, 100.0));
    sources.metrics = Some(Arc::new(StaticMetrics(rows)));

    let report = Populator::new(&graph, &catalog, sources)
        .run(&PopulateOptions::builder().build())
        .await;

    let enrichment = report.component(Component::Geoenrichments).unwrap();
    let categories: usize = bizgraph_common::names::labels::ENRICHMENT
        .iter()
        .map(|label| graph.node_count(label))
        .sum();
    assert_eq!(categories, 74);
    assert!(enrichment.batch("enrichment_nodes").unwrap().is_clean());
    assert!(graph.has_index("AgeGroup", &["group", "representation"]));

    let populated = edges_from(&graph, "HAS_ENRICHMENT", "ct_block_group", "1001");
    assert_eq!(populated.len(), 15);
    let empty = edges_from(&graph, "HAS_ENRICHMENT", "ct_block_group", "2001");
    assert_eq!(empty.len(), 14);
    assert!(empty.iter().all(|(label, _)| label != "AgeAverage"));

    let relationships = enrichment.batch("enrichment_relationships").unwrap();
    assert_eq!(relationships.succeeded, 29);
    assert!(relationships.failed() > 0);
    assert!(relationships.failures.iter().all(|f| f.key.starts_with("(BlockGroup ct_block_group=3001)")));

    let wealth: Vec<(String, f64)> = graph
        .relationships("HAS_ENRICHMENT")
        .into_iter()
        .filter(|(_, end, _)| end.labels.contains(&"WealthIndex".to_string()))
        .map(|(start, end, p)| {
            (
                format!(
                    "{}:{}",
                    start.get_str("ct_block_group").unwrap(),
                    end.get_str("category").unwrap()
                ),
                p["source_value"].as_f64().unwrap(),
            )
        })
        .collect();
    assert!(wealth.contains(&("2001:LOW".to_string(), 0.0)));
}

#[tokio::test]
async fn rerunning_is_idempotent() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let populator = Populator::new(&graph, &catalog, sources(places()));
    let options = PopulateOptions::builder().build();

    populator.run(&options).await;
    let nodes = node_counts(&graph);
    let relationships = relationship_counts(&graph);

    let second = populator.run(&options).await;
    assert!(second.constraints.as_ref().unwrap().is_clean());
    assert_eq!(node_counts(&graph), nodes);
    assert_eq!(relationship_counts(&graph), relationships);
}

#[tokio::test]
async fn failures_stay_inside_their_batch_or_component() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let mut rows = common::block_groups();
    rows.push(common::block_group("3002", None));
    let sources = Sources::builder()
        .administrative(Arc::new(common::administrative()))
        .block_groups(Arc::new(StaticBlockGroups(rows)))
        .zipcodes(Arc::new(StaticZipcodes(common::zipcode_rows())))
        .metrics(Arc::new(FailingSource("metrics.csv")))
        .build();

    let report = Populator::new(&graph, &catalog, sources)
        .run(&PopulateOptions::builder().build())
        .await;

    let block_groups = report.component(Component::BlockGroups).unwrap();
    let batch = block_groups.batch("block_groups").unwrap();
    assert_eq!(batch.succeeded, 2);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].key, "3002");

    assert_eq!(
        report.aborted(),
        vec![Component::Businesses, Component::Geoenrichments]
    );
    let businesses = report.component(Component::Businesses).unwrap();
    assert!(businesses.error.as_deref().unwrap().contains("GOOGLE_PLACES_API_KEY"));
    let enrichment = report.component(Component::Geoenrichments).unwrap();
    assert!(enrichment.error.as_deref().unwrap().contains("metrics.csv"));

    // Topology still ran after the block group failure.
    assert_eq!(graph.relationships("IS_WITHIN").len(), 6);
}

#[tokio::test]
async fn selection_limits_components() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let options = PopulateOptions::builder()
        .selection(Selection::Include(vec![Component::BlockGroups]))
        .build();

    let report = Populator::new(&graph, &catalog, sources(places()))
        .run(&options)
        .await;

    assert_eq!(report.components.len(), 1);
    assert_eq!(graph.node_count("BlockGroup"), 2);
    assert_eq!(graph.node_count("Zipcode"), 0);
    assert!(graph.relationships("IS_WITHIN").is_empty());
}

#[tokio::test]
async fn cleanup_removes_only_the_selected_component() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let populator = Populator::new(&graph, &catalog, sources(places()));
    populator.run(&PopulateOptions::builder().build()).await;
    assert_eq!(graph.node_count("Business"), 1);

    let cleanup = populator.cleanup(&[Component::Businesses]).await;

    assert!(cleanup.is_clean());
    assert_eq!(graph.node_count("Business"), 0);
    assert!(graph.relationships("LOCATED_IN").is_empty());
    assert!(!graph.has_layer("business_layer"));
    assert!(!graph.constraint_names().contains(&"business_id_unique".to_string()));

    assert!(graph.has_layer("block_group_layer"));
    assert_eq!(graph.node_count("BlockGroup"), 2);
    assert_eq!(graph.relationships("IS_WITHIN").len(), 6);
    assert!(graph.constraint_names().contains(&"ct_block_group_unique".to_string()));
}

#[tokio::test]
async fn cleanup_then_rebuild_restores_the_component() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let populator = Populator::new(&graph, &catalog, sources(places()));
    populator.run(&PopulateOptions::builder().build()).await;
    let nodes = node_counts(&graph);

    let options = PopulateOptions::builder()
        .selection(Selection::Include(vec![Component::Businesses]))
        .cleanup(true)
        .build();
    let report = populator.run(&options).await;

    assert!(report.cleanup.as_ref().unwrap().is_clean());
    assert_eq!(node_counts(&graph), nodes);
    assert_eq!(graph.relationships("LOCATED_IN").len(), 2);
}

#[tokio::test]
async fn report_serializes_for_the_cli() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let options = PopulateOptions::builder()
        .selection(Selection::Include(vec![Component::BlockGroups]))
        .build();
    let report = Populator::new(&graph, &catalog, sources(places()))
        .run(&options)
        .await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["components"][0]["component"], "block_groups");
    assert_eq!(json["components"][0]["batches"][0]["succeeded"], 2);
    assert!(json["cleanup"].is_null());
}

#[tokio::test]
async fn boundary_contact_is_recorded_as_partial() {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let mut rows = common::block_groups();
    // Shares only its x = -1 edge with 92102.
    rows.push(common::block_group("5001", Some(common::rect(-2.0, -1.0, 0.0, 1.0))));
    let mut sources = sources(MockPlaceSearch::new());
    sources.block_groups = Some(Arc::new(StaticBlockGroups(rows)));

    Populator::new(&graph, &catalog, sources)
        .run(&PopulateOptions::builder().build())
        .await;

    let touching = edges_from(&graph, "IS_WITHIN", "ct_block_group", "5001");
    assert_eq!(touching.len(), 1);
    let (label, properties) = &touching[0];
    assert_eq!(label, "Zipcode");
    assert_eq!(properties["containment_type"].as_str(), Some("Partial"));
    assert_eq!(properties["overlap_ratio"].as_f64(), Some(0.0));
}

/// Returns the same place for every category, answering `slow` last.
struct SlowCategory {
    slow: &'static str,
}

#[async_trait]
impl PlaceSearch for SlowCategory {
    async fn search_nearby(
        &self,
        _latitude: f64,
        _longitude: f64,
        _radius_m: f64,
        category: &str,
    ) -> Result<Vec<Place>, SourceError> {
        if category == self.slow {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(vec![place("dup", 0.5, 0.5)])
    }
}

async fn business_type_with_slow(slow: &'static str) -> String {
    let graph = MemoryGraph::new();
    let catalog = catalog();
    let mut sources = sources(MockPlaceSearch::new());
    sources.places = Some(Arc::new(SlowCategory { slow }));
    let options = PopulateOptions::builder()
        .selection(Selection::Include(vec![Component::BlockGroups, Component::Businesses]))
        .build();

    Populator::new(&graph, &catalog, sources).run(&options).await;

    let businesses = graph.layer_members("business_layer");
    assert_eq!(businesses.len(), 1);
    businesses[0].get_str("business_type").unwrap().to_string()
}

#[tokio::test]
async fn duplicate_places_keep_the_first_category_whatever_answers_first() {
    let slow_grocery = business_type_with_slow("grocery_store").await;
    let slow_bakery = business_type_with_slow("bakery").await;

    assert_eq!(slow_grocery, "grocery_store");
    assert_eq!(slow_bakery, "grocery_store");
}
