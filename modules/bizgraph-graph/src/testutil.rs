//! Disposable Neo4j for integration tests.
//!
//! The stock image ships without the Spatial plugin, so containers here only
//! exercise the [`crate::GraphStore`] half of [`crate::Neo4jGraph`].

use std::sync::Arc;

use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use crate::{GraphClient, Neo4jGraph, SchemaCatalog};

const IMAGE: (&str, &str) = ("neo4j", "5.25.1");
const BOLT: u16 = 7687;
const PASSWORD: &str = "bizgraph-test";

/// Start a container and connect to it. Dropping the handle stops the
/// container, so keep it alive for the whole test.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, GraphClient) {
    let container = GenericImage::new(IMAGE.0, IMAGE.1)
        .with_exposed_port(ContainerPort::Tcp(BOLT))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", format!("neo4j/{PASSWORD}"))
        .start()
        .await
        .expect("neo4j container starts");

    let port = container
        .get_host_port_ipv4(BOLT)
        .await
        .expect("bolt port is mapped");
    let client = GraphClient::connect(&format!("bolt://127.0.0.1:{port}"), "neo4j", PASSWORD)
        .await
        .expect("client connects to container");

    (container, client)
}

/// [`Neo4jGraph`] over a fresh container with the shipped schema document.
pub async fn neo4j_graph() -> (ContainerAsync<GenericImage>, Neo4jGraph) {
    let (container, client) = neo4j_container().await;
    let catalog = SchemaCatalog::from_json(include_str!("../../../config/constraints_schema.json"))
        .expect("shipped schema parses");
    (container, Neo4jGraph::new(client, Arc::new(catalog)))
}
