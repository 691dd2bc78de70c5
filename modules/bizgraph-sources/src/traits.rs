// Seams between the pipeline and its upstream data. Each has a Postgres,
// file or HTTP implementation and a static double in `testing`.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::rows::{BlockGroupRow, CityRow, MetricsRow, NeighborhoodRow, Place, ZipcodeRow};

/// Cities and neighborhoods with their zipcode and adjacency lists.
#[async_trait]
pub trait AdministrativeSource: Send + Sync {
    async fn cities(&self) -> Result<Vec<CityRow>, SourceError>;
    async fn neighborhoods(&self) -> Result<Vec<NeighborhoodRow>, SourceError>;
}

#[async_trait]
pub trait BlockGroupSource: Send + Sync {
    async fn block_groups(&self) -> Result<Vec<BlockGroupRow>, SourceError>;
}

#[async_trait]
pub trait ZipcodeSource: Send + Sync {
    async fn zipcodes(&self) -> Result<Vec<ZipcodeRow>, SourceError>;
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn metrics(&self) -> Result<Vec<MetricsRow>, SourceError>;
}

/// Radius search for places of one primary category.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        category: &str,
    ) -> Result<Vec<Place>, SourceError>;
}
