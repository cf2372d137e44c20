use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::ResolverConfig;
use crate::errors::{AppError, AppResult};
use crate::model::{Coordinates, PlaceCandidate, PlaceDetails};

const SEARCH_FIELD_MASK: &str = "places.id,places.displayName,places.location";
const DETAILS_FIELD_MASK: &str =
    "id,displayName,formattedAddress,location,websiteUri,regularOpeningHours";
const METERS_PER_DEGREE_LATITUDE: f64 = 111_320.0;
const PLACE_ID_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

#[derive(Debug, Clone, PartialEq)]
pub struct TextSearchRequest {
    pub query: String,
    pub bias: Option<Coordinates>,
    pub bias_radius_meters: f64,
    pub max_results: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbySearchRequest {
    pub center: Coordinates,
    pub radius_meters: f64,
    pub keyword: Option<String>,
    pub max_results: u8,
}

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    async fn text_search(&self, request: &TextSearchRequest) -> AppResult<Vec<PlaceCandidate>>;
    async fn nearby_search(&self, request: &NearbySearchRequest)
        -> AppResult<Vec<PlaceCandidate>>;
    async fn details(&self, place_id: &str) -> AppResult<PlaceDetails>;
}

#[derive(Clone)]
pub struct PlacesService {
    inner: Arc<dyn PlaceLookup>,
}

impl PlacesService {
    pub fn new(config: &ResolverConfig) -> AppResult<Self> {
        let api_key = config.google_maps_api_key.clone().ok_or_else(|| {
            AppError::Config("GOOGLE_MAPS_API_KEY is required for place lookups".into())
        })?;
        let client = HttpPlacesClient::new(config, api_key)?;
        Ok(Self {
            inner: Arc::new(client),
        })
    }

    pub fn from_lookup(lookup: Arc<dyn PlaceLookup>) -> Self {
        Self { inner: lookup }
    }

    pub async fn text_search(&self, request: &TextSearchRequest) -> AppResult<Vec<PlaceCandidate>> {
        self.inner.text_search(request).await
    }

    pub async fn nearby_search(
        &self,
        request: &NearbySearchRequest,
    ) -> AppResult<Vec<PlaceCandidate>> {
        self.inner.nearby_search(request).await
    }

    pub async fn details(&self, place_id: &str) -> AppResult<PlaceDetails> {
        self.inner.details(place_id).await
    }
}

#[derive(Serialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl From<Coordinates> for LatLng {
    fn from(value: Coordinates) -> Self {
        Self {
            latitude: value.latitude,
            longitude: value.longitude,
        }
    }
}

#[derive(Serialize)]
struct Circle {
    center: LatLng,
    radius: f64,
}

#[derive(Serialize)]
struct Rectangle {
    low: LatLng,
    high: LatLng,
}

#[derive(Deserialize)]
struct SearchResponse {
    places: Option<Vec<SearchPlace>>,
}

#[derive(Deserialize)]
struct SearchPlace {
    id: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<LocalizedText>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: Option<String>,
}

impl SearchResponse {
    fn into_candidates(self) -> Vec<PlaceCandidate> {
        self.places
            .unwrap_or_default()
            .into_iter()
            .filter_map(|place| {
                Some(PlaceCandidate {
                    place_id: place.id.filter(|id| !id.is_empty())?,
                    display_name: place
                        .display_name
                        .and_then(|name| name.text)
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}

struct HttpPlacesClient {
    http: Client,
    api_key: SecretString,
    base: String,
    language_code: String,
}

impl HttpPlacesClient {
    fn new(config: &ResolverConfig, api_key: SecretString) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            http,
            api_key,
            base: config.places_api_base.clone(),
            language_code: config.language_code.clone(),
        })
    }

    async fn search_text<B: Serialize + Sync>(&self, body: &B) -> AppResult<Vec<PlaceCandidate>> {
        let response = self
            .http
            .post(format!("{}/v1/places:searchText", self.base))
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .header("X-Goog-FieldMask", SEARCH_FIELD_MASK)
            .json(body)
            .send()
            .await?;
        let parsed: SearchResponse = ensure_success(response).await?.json().await?;
        Ok(parsed.into_candidates())
    }
}

#[async_trait]
impl PlaceLookup for HttpPlacesClient {
    async fn text_search(&self, request: &TextSearchRequest) -> AppResult<Vec<PlaceCandidate>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RequestBody<'a> {
            text_query: &'a str,
            language_code: &'a str,
            max_result_count: u8,
            #[serde(skip_serializing_if = "Option::is_none")]
            location_bias: Option<LocationBias>,
        }

        #[derive(Serialize)]
        struct LocationBias {
            circle: Circle,
        }

        let body = RequestBody {
            text_query: &request.query,
            language_code: &self.language_code,
            max_result_count: request.max_results,
            location_bias: request.bias.map(|center| LocationBias {
                circle: Circle {
                    center: center.into(),
                    radius: request.bias_radius_meters,
                },
            }),
        };

        trace!(query = %request.query, biased = request.bias.is_some(), "places text search");
        self.search_text(&body).await
    }

    async fn nearby_search(
        &self,
        request: &NearbySearchRequest,
    ) -> AppResult<Vec<PlaceCandidate>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct NearbyBody<'a> {
            location_restriction: CircleRestriction,
            language_code: &'a str,
            max_result_count: u8,
            rank_preference: &'static str,
        }

        #[derive(Serialize)]
        struct CircleRestriction {
            circle: Circle,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct KeywordBody<'a> {
            text_query: &'a str,
            location_restriction: RectangleRestriction,
            language_code: &'a str,
            max_result_count: u8,
        }

        #[derive(Serialize)]
        struct RectangleRestriction {
            rectangle: Rectangle,
        }

        // searchNearby has no keyword filter, so keyword lookups go through
        // searchText restricted to the circle's bounding box.
        if let Some(keyword) = request.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            let body = KeywordBody {
                text_query: keyword,
                location_restriction: RectangleRestriction {
                    rectangle: bounding_box(request.center, request.radius_meters),
                },
                language_code: &self.language_code,
                max_result_count: request.max_results,
            };
            trace!(keyword, radius = request.radius_meters, "places keyword nearby search");
            return self.search_text(&body).await;
        }

        let body = NearbyBody {
            location_restriction: CircleRestriction {
                circle: Circle {
                    center: request.center.into(),
                    radius: request.radius_meters,
                },
            },
            language_code: &self.language_code,
            max_result_count: request.max_results,
            rank_preference: "DISTANCE",
        };

        trace!(radius = request.radius_meters, "places nearby search");
        let response = self
            .http
            .post(format!("{}/v1/places:searchNearby", self.base))
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .header("X-Goog-FieldMask", SEARCH_FIELD_MASK)
            .json(&body)
            .send()
            .await?;
        let parsed: SearchResponse = ensure_success(response).await?.json().await?;
        Ok(parsed.into_candidates())
    }

    async fn details(&self, place_id: &str) -> AppResult<PlaceDetails> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct DetailsResponse {
            id: Option<String>,
            display_name: Option<LocalizedText>,
            formatted_address: Option<String>,
            location: Option<ResponseLocation>,
            website_uri: Option<String>,
            regular_opening_hours: Option<OpeningHours>,
        }

        #[derive(Deserialize)]
        struct ResponseLocation {
            latitude: Option<f64>,
            longitude: Option<f64>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct OpeningHours {
            #[serde(default)]
            weekday_descriptions: Vec<String>,
        }

        let url = format!(
            "{}/v1/places/{}",
            self.base,
            utf8_percent_encode(place_id, PLACE_ID_SEGMENT)
        );
        let response = self
            .http
            .get(url)
            .query(&[("languageCode", self.language_code.as_str())])
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await?;
        let parsed: DetailsResponse = ensure_success(response).await?.json().await?;

        let coordinates = parsed
            .location
            .and_then(|loc| Coordinates::new(loc.latitude?, loc.longitude?));
        Ok(PlaceDetails {
            place_id: parsed
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| place_id.to_string()),
            display_name: parsed
                .display_name
                .and_then(|name| name.text)
                .filter(|text| !text.trim().is_empty()),
            formatted_address: parsed
                .formatted_address
                .filter(|address| !address.trim().is_empty()),
            coordinates,
            website_uri: parsed.website_uri.filter(|uri| !uri.trim().is_empty()),
            weekday_descriptions: parsed
                .regular_opening_hours
                .map(|hours| hours.weekday_descriptions)
                .unwrap_or_default(),
        })
    }
}

async fn ensure_success(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    trace!(status = status.as_u16(), body = %body, "places api rejected request");
    Err(AppError::UpstreamStatus {
        service: "places api",
        status: status.as_u16(),
    })
}

fn bounding_box(center: Coordinates, radius_meters: f64) -> Rectangle {
    let lat_delta = radius_meters / METERS_PER_DEGREE_LATITUDE;
    let lng_scale = center.latitude.to_radians().cos().abs().max(f64::EPSILON);
    let lng_delta = radius_meters / (METERS_PER_DEGREE_LATITUDE * lng_scale);
    Rectangle {
        low: LatLng {
            latitude: (center.latitude - lat_delta).max(-90.0),
            longitude: (center.longitude - lng_delta).max(-180.0),
        },
        high: LatLng {
            latitude: (center.latitude + lat_delta).min(90.0),
            longitude: (center.longitude + lng_delta).min(180.0),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_api_key() {
        let err = PlacesService::new(&ResolverConfig::default())
            .err()
            .expect("missing key must fail");
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn bounding_box_contains_center_and_widens_longitude_away_from_equator() {
        let center = Coordinates::new(35.6762, 139.6503).unwrap();
        let rect = bounding_box(center, 50.0);
        assert!(rect.low.latitude < center.latitude && center.latitude < rect.high.latitude);
        assert!(rect.low.longitude < center.longitude && center.longitude < rect.high.longitude);

        let lat_span = rect.high.latitude - rect.low.latitude;
        let lng_span = rect.high.longitude - rect.low.longitude;
        assert!(lng_span > lat_span);
        assert!((lat_span - 100.0 / METERS_PER_DEGREE_LATITUDE).abs() < 1e-9);
    }

    #[test]
    fn search_response_skips_places_without_ids() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"places":[
                {"id":"ChIJ1","displayName":{"text":"Sample Cafe","languageCode":"en"}},
                {"displayName":{"text":"No Id"}},
                {"id":"ChIJ2"}
            ]}"#,
        )
        .unwrap();
        let candidates = parsed.into_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].display_name, "Sample Cafe");
        assert_eq!(candidates[1].display_name, "");

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.into_candidates().is_empty());
    }

    #[test]
    fn place_ids_are_path_encoded() {
        assert_eq!(
            utf8_percent_encode("ChIJ_ab-c", PLACE_ID_SEGMENT).to_string(),
            "ChIJ_ab-c"
        );
        assert_eq!(
            utf8_percent_encode("a/b?c", PLACE_ID_SEGMENT).to_string(),
            "a%2Fb%3Fc"
        );
    }
}
