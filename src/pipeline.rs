use std::sync::Arc;

use regex::Regex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::ResolverConfig;
use crate::coordinates::{coordinates_from_url, scan_page};
use crate::details::{classify_website, fetch_details, strip_country};
use crate::errors::{AppError, AppResult, Degradation};
use crate::geocode::{NominatimClient, ReverseGeocoder};
use crate::hours::parse_weekly_hours;
use crate::model::{CanonicalPlace, Coordinates, Resolution};
use crate::name::extract_name;
use crate::normalize::{LinkExpander, MapsWebClient, PageFetcher, UrlNormalizer};
use crate::places::PlacesService;
use crate::resolver::{detect_identifier, plan, PlaceResolver};

#[derive(Clone)]
pub struct PlacePipeline {
    normalizer: UrlNormalizer,
    pages: Arc<dyn PageFetcher>,
    places: PlacesService,
    resolver: PlaceResolver,
    geocoder: Arc<dyn ReverseGeocoder>,
    postal_code: Regex,
}

impl PlacePipeline {
    pub fn new(config: &ResolverConfig) -> AppResult<Self> {
        let web = Arc::new(MapsWebClient::new(config)?);
        let places = PlacesService::new(config)?;
        let geocoder = Arc::new(NominatimClient::new(config)?);
        Self::with_services(config, web.clone(), web, places, geocoder)
    }

    pub fn with_services(
        config: &ResolverConfig,
        expander: Arc<dyn LinkExpander>,
        pages: Arc<dyn PageFetcher>,
        places: PlacesService,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> AppResult<Self> {
        let postal_code = Regex::new(&config.postal_code_pattern).map_err(|err| {
            AppError::Config(format!(
                "invalid POSTAL_CODE_PATTERN {:?}: {err}",
                config.postal_code_pattern
            ))
        })?;
        Ok(Self {
            normalizer: UrlNormalizer::new(expander, &config.short_link_patterns),
            pages,
            resolver: PlaceResolver::new(places.clone(), config),
            places,
            geocoder,
            postal_code,
        })
    }

    pub async fn resolve(&self, url: &str) -> AppResult<Resolution> {
        let span = info_span!("resolve_place", url = %url);
        self.resolve_inner(url).instrument(span).await
    }

    pub async fn resolve_before(&self, url: &str, deadline: Instant) -> AppResult<Resolution> {
        timeout_at(deadline, self.resolve(url))
            .await
            .map_err(|_| AppError::DeadlineExceeded)?
    }

    async fn resolve_inner(&self, url: &str) -> AppResult<Resolution> {
        let mut degradations = Vec::new();

        let normalized = self.normalizer.normalize(url).await?;
        let name = extract_name(&normalized);
        if !name.valid && !name.raw_segment.is_empty() {
            degradations.push(Degradation::NameExtractionAmbiguous {
                segment: name.raw_segment.clone(),
            });
        }

        let mut identifier = detect_identifier(&normalized.decoded);
        let mut coordinates = coordinates_from_url(&normalized.decoded);
        if identifier.is_none() && coordinates.is_none() {
            match self.pages.fetch_page(&normalized.expanded).await {
                Ok(body) => {
                    let hints = scan_page(&body);
                    coordinates = hints.coordinates;
                    identifier = hints.identifier;
                    debug!(
                        found_coordinates = coordinates.is_some(),
                        found_identifier = identifier.is_some(),
                        "scanned map page"
                    );
                }
                Err(err) => debug!(?err, "map page scan skipped"),
            }
        }

        let strategy = plan(identifier.as_ref(), &name, coordinates, &self.postal_code)?;
        let matched = self.resolver.execute(&strategy).await?;
        let details = fetch_details(&self.places, &matched.place_id).await?;

        let hours = parse_weekly_hours(&details.weekday_descriptions);
        degradations.extend(hours.degradations);

        let coordinates = details.coordinates.or(coordinates);
        let address = details
            .formatted_address
            .as_deref()
            .map(strip_country)
            .filter(|address| !address.is_empty());
        let address = match address {
            Some(address) => address,
            None => self.reverse_geocode(coordinates, &mut degradations).await,
        };

        let web = classify_website(details.website_uri.as_deref());
        let place = CanonicalPlace {
            name: details
                .display_name
                .clone()
                .or_else(|| name.usable().map(str::to_string))
                .unwrap_or_default(),
            address,
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
            business_hours: hours.schedule,
            website_url: web.website_url,
            sns_urls: web.sns_urls,
            google_map_url: normalized.expanded,
            place_id: details.place_id,
        };

        info!(
            strategy = strategy.label(),
            place_id = %place.place_id,
            score = ?matched.score,
            degradations = degradations.len(),
            "resolved place"
        );
        Ok(Resolution {
            place,
            degradations,
        })
    }

    async fn reverse_geocode(
        &self,
        coordinates: Option<Coordinates>,
        degradations: &mut Vec<Degradation>,
    ) -> String {
        let Some(coordinates) = coordinates else {
            degradations.push(Degradation::ReverseGeocodeUnavailable {
                reason: "no address and no coordinates to geocode".into(),
            });
            return String::new();
        };
        match self.geocoder.reverse(coordinates).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                degradations.push(Degradation::ReverseGeocodeUnavailable {
                    reason: "reverse geocoder returned no address".into(),
                });
                String::new()
            }
            Err(err) => {
                warn!(?err, "reverse geocoding failed");
                degradations.push(Degradation::ReverseGeocodeUnavailable {
                    reason: err.to_string(),
                });
                String::new()
            }
        }
    }
}
