use neo4rs::{query, ConfigBuilder, Graph};
use tracing::info;

use bizgraph_common::{BizGraphError, Config};

/// Thin wrapper around neo4rs::Graph providing connection setup.
#[derive(Clone)]
pub struct GraphClient {
    pub(crate) graph: Graph,
}

fn connection_error(e: neo4rs::Error) -> BizGraphError {
    BizGraphError::Connection(e.to_string())
}

impl GraphClient {
    /// Connect to Neo4j and verify the session with `RETURN 1`.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, BizGraphError> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(10)
            .build()
            .map_err(connection_error)?;
        let graph = Graph::connect(config).await.map_err(connection_error)?;

        let client = Self { graph };
        client.ping().await?;
        info!(uri, "Connected to Neo4j");
        Ok(client)
    }

    pub async fn from_config(config: &Config) -> Result<Self, BizGraphError> {
        Self::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password).await
    }

    async fn ping(&self) -> Result<(), BizGraphError> {
        let mut stream = self
            .graph
            .execute(query("RETURN 1 AS ping"))
            .await
            .map_err(connection_error)?;
        match stream.next().await.map_err(connection_error)? {
            Some(_) => Ok(()),
            None => Err(BizGraphError::Connection("no reply to RETURN 1".into())),
        }
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}
