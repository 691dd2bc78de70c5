use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bizgraph_common::Config;
use bizgraph_etl::{Component, PopulateOptions, Populator, Selection, Sources};
use bizgraph_graph::{
    run_graph_query, GraphBackend, GraphClient, MemoryGraph, Neo4jGraph, SchemaCatalog, SpatialIndex,
};
use bizgraph_sources::{MetricsCsv, PlacesClient, PostgresSource, ZipcodeCsv};

#[derive(Parser)]
#[command(name = "bizgraph-populate", about = "Build and query the business location graph")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "BIZGRAPH_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the population pipeline
    Populate(PopulateArgs),

    /// Remove the nodes, constraints and layers owned by components
    Cleanup(ComponentArgs),

    /// Print the schema catalog as text
    Schema,

    /// Run a read query and print the nodes and relationships it returns
    Query {
        #[arg(long)]
        cypher: String,

        /// Result columns holding nodes or relationships
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,
    },

    /// List nodes of a point layer within a radius
    Nearby {
        #[arg(long, default_value = "business_layer")]
        layer: String,

        #[arg(long, allow_hyphen_values = true)]
        latitude: f64,

        #[arg(long, allow_hyphen_values = true)]
        longitude: f64,

        #[arg(long, default_value_t = 1.0)]
        distance_km: f64,
    },
}

#[derive(Args)]
struct ComponentArgs {
    /// Only these components (comma separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "exclude")]
    include: Option<Vec<Component>>,

    /// Every component except these (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<Component>>,
}

impl ComponentArgs {
    fn selection(self) -> Result<Selection> {
        Selection::from_lists(self.include, self.exclude)
    }
}

#[derive(Args)]
struct PopulateArgs {
    #[command(flatten)]
    components: ComponentArgs,

    /// Clean up the selected components before building them
    #[arg(long)]
    cleanup: bool,

    /// Build into an in-memory graph instead of Neo4j
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Upstream readers available under this configuration. Missing ones leave
/// their components to fail on their own. Dry runs never get a place search.
async fn sources(config: &Config, dry_run: bool) -> Result<Sources> {
    let mut sources = Sources::builder()
        .zipcodes(Arc::new(ZipcodeCsv::new(config.zipcodes_csv())))
        .metrics(Arc::new(MetricsCsv::new(config.metrics_csv())))
        .build();

    match &config.database_url {
        Some(url) => {
            let postgres = Arc::new(PostgresSource::connect(url).await.context("connecting to Postgres")?);
            sources.administrative = Some(postgres.clone());
            sources.block_groups = Some(postgres);
        }
        None => warn!("DATABASE_URL not set; block groups and administrative topology will be skipped"),
    }
    match &config.places_api_key {
        Some(_) if dry_run => {}
        Some(key) => sources.places = Some(Arc::new(PlacesClient::new(key.clone()))),
        None => warn!("GOOGLE_PLACES_API_KEY not set; businesses will be skipped"),
    }
    Ok(sources)
}

/// Dry runs skip business search so they never spend Places quota.
fn dry_run_selection(selection: Selection) -> Selection {
    let components: Vec<Component> = selection
        .components()
        .into_iter()
        .filter(|c| *c != Component::Businesses)
        .collect();
    Selection::Include(components)
}

async fn neo4j(config: &Config, catalog: Arc<SchemaCatalog>) -> Result<Neo4jGraph> {
    let client = GraphClient::from_config(config)
        .await
        .context("connecting to Neo4j")?;
    Ok(Neo4jGraph::new(client, catalog))
}

async fn populate(config: &Config, catalog: Arc<SchemaCatalog>, args: PopulateArgs) -> Result<bool> {
    let mut selection = args.components.selection()?;
    if args.dry_run {
        info!("Dry run: place search disabled, businesses skipped");
        selection = dry_run_selection(selection);
    }
    let options = PopulateOptions::builder()
        .selection(selection)
        .cleanup(args.cleanup)
        .read_concurrency(config.read_concurrency)
        .build();
    let sources = sources(config, args.dry_run).await?;

    let memory;
    let remote;
    let graph: &dyn GraphBackend = if args.dry_run {
        info!("Dry run: writing to an in-memory graph");
        memory = MemoryGraph::new();
        &memory
    } else {
        remote = neo4j(config, catalog.clone()).await?;
        &remote
    };

    let report = Populator::new(graph, &catalog, sources).run(&options).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.aborted().is_empty())
}

async fn run(cli: Cli) -> Result<bool> {
    let config = Config::from_env()?;
    let catalog = Arc::new(
        SchemaCatalog::load(&config.schema_path)
            .with_context(|| format!("loading schema from {}", config.schema_path.display()))?,
    );

    match cli.command {
        Commands::Populate(args) => populate(&config, catalog, args).await,
        Commands::Cleanup(args) => {
            let components = args.selection()?.components();
            let graph = neo4j(&config, catalog.clone()).await?;
            let report = Populator::new(&graph, &catalog, Sources::default())
                .cleanup(&components)
                .await;
            report.log();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.is_clean())
        }
        Commands::Schema => {
            print!("{}", catalog.describe());
            Ok(true)
        }
        Commands::Query { cypher, columns } => {
            let graph = neo4j(&config, catalog).await?;
            let result = run_graph_query(graph.client(), &cypher, &columns).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(true)
        }
        Commands::Nearby {
            layer,
            latitude,
            longitude,
            distance_km,
        } => {
            let graph = neo4j(&config, catalog).await?;
            let hits = graph
                .within_distance(&layer, latitude, longitude, distance_km)
                .await?;
            let rows: Vec<serde_json::Value> = hits
                .into_iter()
                .map(|(node, km)| serde_json::json!({ "node": node, "distance_km": km }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_and_exclude_are_exclusive() {
        let parsed = Cli::try_parse_from([
            "bizgraph-populate",
            "populate",
            "--include",
            "businesses",
            "--exclude",
            "block_groups",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn component_lists_split_on_commas() {
        let cli = Cli::try_parse_from([
            "bizgraph-populate",
            "populate",
            "--include",
            "geoenrichments,block-groups",
            "--dry-run",
        ])
        .unwrap();
        let Commands::Populate(args) = cli.command else {
            panic!("expected populate");
        };
        assert!(args.dry_run);
        assert_eq!(
            args.components.selection().unwrap().components(),
            vec![Component::BlockGroups, Component::Geoenrichments]
        );
    }

    #[test]
    fn dry_run_never_searches_places() {
        let selection = dry_run_selection(Selection::All);
        assert_eq!(
            selection.components(),
            vec![
                Component::BlockGroups,
                Component::AdministrativeTopology,
                Component::Geoenrichments
            ]
        );
        let only_businesses = dry_run_selection(Selection::Include(vec![Component::Businesses]));
        assert!(only_businesses.components().is_empty());
    }

    #[tokio::test]
    async fn dry_run_sources_leave_place_search_unset() {
        let config = Config::from_lookup(|key| match key {
            "NEO4J_URI" => Some("bolt://localhost:7687".into()),
            "NEO4J_USER" => Some("neo4j".into()),
            "NEO4J_PASSWORD" => Some("secret".into()),
            "GOOGLE_PLACES_API_KEY" => Some("key-123".into()),
            _ => None,
        })
        .unwrap();

        assert!(sources(&config, true).await.unwrap().places.is_none());
        assert!(sources(&config, false).await.unwrap().places.is_some());
    }

    #[test]
    fn unknown_components_are_rejected() {
        let parsed = Cli::try_parse_from(["bizgraph-populate", "cleanup", "--exclude", "roads"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn nearby_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "bizgraph-populate",
            "nearby",
            "--latitude",
            "32.71",
            "--longitude",
            "-117.16",
        ])
        .unwrap();
        match cli.command {
            Commands::Nearby { layer, longitude, distance_km, .. } => {
                assert_eq!(layer, "business_layer");
                assert_eq!(longitude, -117.16);
                assert_eq!(distance_km, 1.0);
            }
            _ => panic!("expected nearby"),
        }
    }
}
