//! Upstream records, as read. Identifiers are kept as strings.

use serde::{Deserialize, Serialize};

/// One row of `city_neighborhoods`.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct CityRow {
    pub id: String,
    pub city: String,
    pub state_name: String,
    pub county: Option<String>,
    pub is_unincorporated_place: bool,
    pub zipcodes: Vec<String>,
    pub neighboring_cities: Vec<String>,
    pub neighboring_unincorporated_places: Vec<String>,
    pub nearby_unincorporated_places: Vec<String>,
    pub neighborhoods: Vec<String>,
    pub nearby_cities: Vec<String>,
}

/// One row of `community_neighborhoods`.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct NeighborhoodRow {
    pub id: String,
    pub community: String,
    pub zipcodes: Vec<String>,
    pub neighboring_cities: Vec<String>,
    pub neighboring_unincorporated_places: Vec<String>,
    pub nearby_unincorporated_places: Vec<String>,
    pub neighboring_communities: Vec<String>,
    pub nearby_communities: Vec<String>,
    pub nearby_cities: Vec<String>,
}

/// A census block group with its boundary in WGS84 WKT.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct BlockGroupRow {
    pub ctblockgroup: String,
    pub tract: String,
    pub blockgroup: String,
    pub objectid: Option<String>,
    pub wkt: Option<String>,
}

/// One row of the zipcode boundary file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ZipcodeRow {
    #[serde(rename = "ZIP")]
    pub zip: String,
    #[serde(rename = "the_geom", default)]
    pub geometry: Option<String>,
}

pub const AGE_BRACKETS: usize = 18;

/// Block-group demographics and spending, one row per block group.
///
/// `male` and `female` hold population counts for the 5-year brackets
/// 0-4 through 85+, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsRow {
    pub tractce: String,
    pub blkgrpce: String,
    pub total_population: f64,
    pub population_growth: f64,
    pub male: [f64; AGE_BRACKETS],
    pub female: [f64; AGE_BRACKETS],
    pub wealth_index: f64,
    pub crime_index: f64,
    /// Fast-food spending columns `x1133_a`, `x1138_a`, `x1148_a`.
    pub fast_food: [f64; 3],
    pub no_high_school: f64,
    pub some_high_school: f64,
    pub high_school_graduate: f64,
    pub ged: f64,
    pub some_college: f64,
    pub associate_degree: f64,
    pub bachelor_degree: f64,
    pub graduate_degree: f64,
}

/// A place returned by nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub display_name: String,
    pub primary_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub price_level: Option<String>,
}
