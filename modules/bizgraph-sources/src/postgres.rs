use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::SourceError;
use crate::rows::{BlockGroupRow, CityRow, NeighborhoodRow};
use crate::traits::{AdministrativeSource, BlockGroupSource};

/// Spatial reference of the stored block-group geometry (NAD83 / California zone 6, US feet).
const BLOCK_GROUP_SRID: i32 = 2230;
const WGS84: i32 = 4326;

/// Reads administrative geography and block groups from the relational store.
#[derive(Clone)]
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    pub async fn connect(database_url: &str) -> Result<Self, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("Connected to Postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdministrativeSource for PostgresSource {
    async fn cities(&self) -> Result<Vec<CityRow>, SourceError> {
        let rows = sqlx::query_as::<_, CityRow>(
            "SELECT id::text AS id,
                    city,
                    state_name,
                    county,
                    COALESCE(is_unincorporated_place, false) AS is_unincorporated_place,
                    COALESCE(zipcodes::text[], '{}') AS zipcodes,
                    COALESCE(neighboring_cities::text[], '{}') AS neighboring_cities,
                    COALESCE(neighboring_unincorporated_places::text[], '{}') AS neighboring_unincorporated_places,
                    COALESCE(nearby_unincorporated_places::text[], '{}') AS nearby_unincorporated_places,
                    COALESCE(neighborhoods::text[], '{}') AS neighborhoods,
                    COALESCE(nearby_cities::text[], '{}') AS nearby_cities
             FROM city_neighborhoods
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        info!(count = rows.len(), "Read city rows");
        Ok(rows)
    }

    async fn neighborhoods(&self) -> Result<Vec<NeighborhoodRow>, SourceError> {
        let rows = sqlx::query_as::<_, NeighborhoodRow>(
            "SELECT id::text AS id,
                    community,
                    COALESCE(zipcodes::text[], '{}') AS zipcodes,
                    COALESCE(neighboring_cities::text[], '{}') AS neighboring_cities,
                    COALESCE(neighboring_unincorporated_places::text[], '{}') AS neighboring_unincorporated_places,
                    COALESCE(nearby_unincorporated_places::text[], '{}') AS nearby_unincorporated_places,
                    COALESCE(neighboring_communities::text[], '{}') AS neighboring_communities,
                    COALESCE(nearby_communities::text[], '{}') AS nearby_communities,
                    COALESCE(nearby_cities::text[], '{}') AS nearby_cities
             FROM community_neighborhoods
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        info!(count = rows.len(), "Read neighborhood rows");
        Ok(rows)
    }
}

#[async_trait]
impl BlockGroupSource for PostgresSource {
    async fn block_groups(&self) -> Result<Vec<BlockGroupRow>, SourceError> {
        let rows = sqlx::query_as::<_, BlockGroupRow>(
            "SELECT ctblockgroup::text AS ctblockgroup,
                    tract::text AS tract,
                    blockgroup::text AS blockgroup,
                    objectid::text AS objectid,
                    ST_AsText(ST_Transform(ST_SetSRID(wkb_geometry, $1), $2)) AS wkt
             FROM sandag_layer_census_block_groups
             ORDER BY ctblockgroup",
        )
        .bind(BLOCK_GROUP_SRID)
        .bind(WGS84)
        .fetch_all(&self.pool)
        .await?;
        info!(count = rows.len(), "Read block group rows");
        Ok(rows)
    }
}
