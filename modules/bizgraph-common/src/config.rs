use std::path::PathBuf;

use crate::BizGraphError;

const DEFAULT_SCHEMA_PATH: &str = "config/constraints_schema.json";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_READ_CONCURRENCY: usize = 8;

/// Application configuration loaded from environment variables.
///
/// Passed explicitly into every constructor that needs a connection or a path;
/// nothing below the binary reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Upstream data
    pub database_url: Option<String>,
    pub places_api_key: Option<String>,
    pub data_dir: PathBuf,

    // Schema document
    pub schema_path: PathBuf,

    /// Bound on concurrent read-side calls (spatial predicates, place search).
    pub read_concurrency: usize,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, BizGraphError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_keys();
        Ok(config)
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, BizGraphError> {
        let required = |key: &str| {
            get(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| BizGraphError::Config(format!("{key} environment variable is required")))
        };

        let read_concurrency = match get("BIZGRAPH_READ_CONCURRENCY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    BizGraphError::Config(format!(
                        "BIZGRAPH_READ_CONCURRENCY must be a positive integer, got {raw:?}"
                    ))
                })?,
            None => DEFAULT_READ_CONCURRENCY,
        };

        Ok(Self {
            neo4j_uri: required("NEO4J_URI")?,
            neo4j_user: required("NEO4J_USER")?,
            neo4j_password: required("NEO4J_PASSWORD")?,
            database_url: get("DATABASE_URL").filter(|v| !v.is_empty()),
            places_api_key: get("GOOGLE_PLACES_API_KEY").filter(|v| !v.is_empty()),
            data_dir: get("BIZGRAPH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            schema_path: get("BIZGRAPH_SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_PATH)),
            read_concurrency,
        })
    }

    /// Raw zipcode boundary table (`ZIP`, `the_geom`).
    pub fn zipcodes_csv(&self) -> PathBuf {
        self.data_dir.join("zipcodes.csv")
    }

    /// Block-group demographic and economic metrics.
    pub fn metrics_csv(&self) -> PathBuf {
        self.data_dir.join("bgs_sd_imp.csv")
    }

    pub fn require_database_url(&self) -> Result<&str, BizGraphError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| BizGraphError::Config("DATABASE_URL is required for this component".into()))
    }

    pub fn require_places_api_key(&self) -> Result<&str, BizGraphError> {
        self.places_api_key.as_deref().ok_or_else(|| {
            BizGraphError::Config("GOOGLE_PLACES_API_KEY is required for this component".into())
        })
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{}...({} chars)", head, val.chars().count())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  NEO4J_URI: {}", self.neo4j_uri);
        tracing::info!("  NEO4J_PASSWORD: {}", preview(&self.neo4j_password));
        tracing::info!("  DATABASE_URL: {}", preview_opt(&self.database_url));
        tracing::info!("  GOOGLE_PLACES_API_KEY: {}", preview_opt(&self.places_api_key));
        tracing::info!("  schema: {}", self.schema_path.display());
        tracing::info!("  data dir: {}", self.data_dir.display());
    }
}
