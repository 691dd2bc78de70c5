//! Smoke test against a live database configured through the environment.
//! Run with: cargo test -p bizgraph-graph --test cloud_connect -- --ignored

use std::sync::Arc;

use bizgraph_common::{Config, Properties};
use bizgraph_graph::{GraphClient, GraphStore, Neo4jGraph, SchemaCatalog};

#[tokio::test]
#[ignore] // requires live Neo4j credentials
async fn live_graph_answers_reads() {
    let config = Config::from_env().expect("NEO4J_* variables required");
    let client = GraphClient::from_config(&config)
        .await
        .expect("Failed to connect");
    let catalog = SchemaCatalog::load(&config.schema_path).expect("schema document");
    let graph = Neo4jGraph::new(client, Arc::new(catalog));

    let zipcodes = graph
        .find_nodes("Zipcode", &Properties::new())
        .await
        .expect("read Zipcode nodes");
    for z in &zipcodes {
        assert!(z.get_str("zipcode_number").is_some());
    }
}
