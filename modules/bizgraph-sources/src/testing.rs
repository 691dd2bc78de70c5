// Test doubles for the upstream seams.
//
// - StaticAdministrative / StaticBlockGroups / StaticZipcodes / StaticMetrics
//   return fixed rows
// - FailingSource errors from every source trait
// - MockPlaceSearch answers per category and records each call

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{PlacesError, SourceError};
use crate::rows::{BlockGroupRow, CityRow, MetricsRow, NeighborhoodRow, Place, ZipcodeRow};
use crate::traits::{
    AdministrativeSource, BlockGroupSource, MetricsSource, PlaceSearch, ZipcodeSource,
};

#[derive(Default)]
pub struct StaticAdministrative {
    pub cities: Vec<CityRow>,
    pub neighborhoods: Vec<NeighborhoodRow>,
}

#[async_trait]
impl AdministrativeSource for StaticAdministrative {
    async fn cities(&self) -> Result<Vec<CityRow>, SourceError> {
        Ok(self.cities.clone())
    }

    async fn neighborhoods(&self) -> Result<Vec<NeighborhoodRow>, SourceError> {
        Ok(self.neighborhoods.clone())
    }
}

#[derive(Default)]
pub struct StaticBlockGroups(pub Vec<BlockGroupRow>);

#[async_trait]
impl BlockGroupSource for StaticBlockGroups {
    async fn block_groups(&self) -> Result<Vec<BlockGroupRow>, SourceError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct StaticZipcodes(pub Vec<ZipcodeRow>);

#[async_trait]
impl ZipcodeSource for StaticZipcodes {
    async fn zipcodes(&self) -> Result<Vec<ZipcodeRow>, SourceError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct StaticMetrics(pub Vec<MetricsRow>);

#[async_trait]
impl MetricsSource for StaticMetrics {
    async fn metrics(&self) -> Result<Vec<MetricsRow>, SourceError> {
        Ok(self.0.clone())
    }
}

/// Every read fails with a file error naming `what`.
pub struct FailingSource(pub &'static str);

impl FailingSource {
    fn error(&self) -> SourceError {
        SourceError::File {
            path: self.0.to_string(),
            message: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl AdministrativeSource for FailingSource {
    async fn cities(&self) -> Result<Vec<CityRow>, SourceError> {
        Err(self.error())
    }

    async fn neighborhoods(&self) -> Result<Vec<NeighborhoodRow>, SourceError> {
        Err(self.error())
    }
}

#[async_trait]
impl BlockGroupSource for FailingSource {
    async fn block_groups(&self) -> Result<Vec<BlockGroupRow>, SourceError> {
        Err(self.error())
    }
}

#[async_trait]
impl ZipcodeSource for FailingSource {
    async fn zipcodes(&self) -> Result<Vec<ZipcodeRow>, SourceError> {
        Err(self.error())
    }
}

#[async_trait]
impl MetricsSource for FailingSource {
    async fn metrics(&self) -> Result<Vec<MetricsRow>, SourceError> {
        Err(self.error())
    }
}

/// Category-keyed place search. Unregistered categories return no places.
/// Builder pattern: `.on_category()`, `.failing()`.
#[derive(Default)]
pub struct MockPlaceSearch {
    places: HashMap<String, Vec<Place>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockPlaceSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_category(mut self, category: &str, places: Vec<Place>) -> Self {
        self.places
            .entry(category.to_string())
            .or_default()
            .extend(places);
        self
    }

    pub fn failing(mut self, category: &str) -> Self {
        self.failing.insert(category.to_string());
        self
    }

    /// Categories searched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PlaceSearch for MockPlaceSearch {
    async fn search_nearby(
        &self,
        _latitude: f64,
        _longitude: f64,
        _radius_m: f64,
        category: &str,
    ) -> Result<Vec<Place>, SourceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(category.to_string());
        }
        if self.failing.contains(category) {
            return Err(PlacesError::Api {
                status: 500,
                message: format!("{category} unavailable"),
            }
            .into());
        }
        Ok(self.places.get(category).cloned().unwrap_or_default())
    }
}

/// A place with only the fields the pipeline requires.
pub fn place(id: &str, latitude: f64, longitude: f64) -> Place {
    Place {
        id: id.to_string(),
        display_name: format!("Place {id}"),
        primary_type: None,
        latitude,
        longitude,
        address: None,
        rating: None,
        price_level: None,
    }
}
