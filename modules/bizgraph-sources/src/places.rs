use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlacesError, SourceError};
use crate::rows::Place;
use crate::traits::PlaceSearch;

const BASE_URL: &str = "https://places.googleapis.com/v1";

/// The API rejects circles larger than this.
pub const MAX_RADIUS_M: f64 = 50_000.0;

const FIELD_MASK: &str = "places.id,places.displayName,places.primaryType,places.location,\
places.formattedAddress,places.rating,places.priceLevel";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchNearbyRequest<'a> {
    included_primary_types: [&'a str; 1],
    language_code: &'a str,
    location_restriction: LocationRestriction,
}

#[derive(Debug, Serialize)]
struct LocationRestriction {
    circle: Circle,
}

#[derive(Debug, Serialize)]
struct Circle {
    center: LatLng,
    radius: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct SearchNearbyResponse {
    #[serde(default)]
    places: Vec<ApiPlace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPlace {
    id: String,
    #[serde(default)]
    display_name: Option<LocalizedText>,
    primary_type: Option<String>,
    location: Option<LatLng>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    price_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

impl ApiPlace {
    /// Places without a location cannot be placed in a block group.
    fn into_place(self) -> Option<Place> {
        let location = self.location?;
        Some(Place {
            display_name: self.display_name.map(|d| d.text).unwrap_or_default(),
            id: self.id,
            primary_type: self.primary_type,
            latitude: location.latitude,
            longitude: location.longitude,
            address: self.formatted_address,
            rating: self.rating,
            price_level: self.price_level,
        })
    }
}

/// Google Places "search nearby" client.
pub struct PlacesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PlacesClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn search(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        category: &str,
    ) -> Result<Vec<Place>, PlacesError> {
        let body = SearchNearbyRequest {
            included_primary_types: [category],
            language_code: "en",
            location_restriction: LocationRestriction {
                circle: Circle {
                    center: LatLng {
                        latitude,
                        longitude,
                    },
                    radius: radius_m.clamp(0.0, MAX_RADIUS_M),
                },
            },
        };

        let url = format!("{}/places:searchNearby", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlacesError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let text = resp.text().await?;
        let parsed: SearchNearbyResponse = serde_json::from_str(&text)?;
        let places: Vec<Place> = parsed
            .places
            .into_iter()
            .filter_map(ApiPlace::into_place)
            .collect();
        debug!(category, count = places.len(), "Nearby search returned");
        Ok(places)
    }
}

#[async_trait]
impl PlaceSearch for PlacesClient {
    async fn search_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        category: &str,
    ) -> Result<Vec<Place>, SourceError> {
        Ok(self.search(latitude, longitude, radius_m, category).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_key_mask_and_clamped_circle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/places:searchNearby"))
            .and(header("X-Goog-Api-Key", "k"))
            .and(header("X-Goog-FieldMask", FIELD_MASK))
            .and(body_partial_json(json!({
                "includedPrimaryTypes": ["bakery"],
                "languageCode": "en",
                "locationRestriction": {"circle": {"radius": 50000.0}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "places": [{
                    "id": "p1",
                    "displayName": {"text": "Bread Co", "languageCode": "en"},
                    "primaryType": "bakery",
                    "location": {"latitude": 32.7, "longitude": -117.1},
                    "formattedAddress": "1 Main St",
                    "rating": 4.5,
                    "priceLevel": "PRICE_LEVEL_INEXPENSIVE"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlacesClient::with_base_url("k".into(), server.uri());
        let places = client
            .search_nearby(32.7, -117.1, 80_000.0, "bakery")
            .await
            .unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].display_name, "Bread Co");
        assert_eq!(places[0].price_level.as_deref(), Some("PRICE_LEVEL_INEXPENSIVE"));
    }

    #[tokio::test]
    async fn empty_response_means_no_places() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = PlacesClient::with_base_url("k".into(), server.uri());
        let places = client.search_nearby(0.0, 0.0, 10.0, "bakery").await.unwrap();
        assert!(places.is_empty());
    }

    #[tokio::test]
    async fn error_status_surfaces_as_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let client = PlacesClient::with_base_url("k".into(), server.uri());
        let err = client
            .search_nearby(0.0, 0.0, 10.0, "bakery")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SourceError::Places(PlacesError::Api { status: 403, .. })
        ));
    }

    #[test]
    fn places_without_location_are_dropped() {
        let parsed: SearchNearbyResponse =
            serde_json::from_value(json!({"places": [{"id": "x"}]})).unwrap();
        assert!(parsed.places.into_iter().next().unwrap().into_place().is_none());
    }
}
